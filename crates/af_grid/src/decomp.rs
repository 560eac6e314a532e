// crates/af_grid/src/decomp.rs

//! 块到进程的分区
//!
//! 贪心最长作业优先：块按单元数降序放入当前负载最小的进程。
//! 负载均衡所需的块切分由网格准备阶段完成（[`crate::plot3d`]
//! 提供 split），分区本身只做指派。

use af_foundation::{AfError, AfResult};

/// 分区结果
#[derive(Debug, Clone)]
pub struct Decomposition {
    rank_for_block: Vec<usize>,
    local_pos: Vec<usize>,
    n_ranks: usize,
}

impl Decomposition {
    /// 按单元数贪心指派
    pub fn decompose(cell_counts: &[usize], n_ranks: usize) -> AfResult<Self> {
        if n_ranks == 0 {
            return Err(AfError::decomp_mismatch("进程数为零"));
        }
        if n_ranks > cell_counts.len() {
            return Err(AfError::decomp_mismatch(format!(
                "进程数 {} 多于块数 {}，需先切分网格",
                n_ranks,
                cell_counts.len()
            )));
        }
        let mut order: Vec<usize> = (0..cell_counts.len()).collect();
        order.sort_by_key(|&b| std::cmp::Reverse(cell_counts[b]));

        let mut load = vec![0usize; n_ranks];
        let mut rank_for_block = vec![0usize; cell_counts.len()];
        for &b in &order {
            let r = (0..n_ranks).min_by_key(|&r| load[r]).unwrap_or(0);
            rank_for_block[b] = r;
            load[r] += cell_counts[b];
        }

        // 进程内局部编号按全局块号升序，保证各进程遍历顺序确定
        let mut local_pos = vec![0usize; cell_counts.len()];
        let mut counters = vec![0usize; n_ranks];
        for (b, &r) in rank_for_block.iter().enumerate() {
            local_pos[b] = counters[r];
            counters[r] += 1;
        }

        tracing::info!(
            blocks = cell_counts.len(),
            ranks = n_ranks,
            max_load = load.iter().max().copied().unwrap_or(0),
            min_load = load.iter().min().copied().unwrap_or(0),
            "分区完成"
        );
        Ok(Self {
            rank_for_block,
            local_pos,
            n_ranks,
        })
    }

    /// 单进程平凡分区
    pub fn serial(n_blocks: usize) -> Self {
        Self {
            rank_for_block: vec![0; n_blocks],
            local_pos: (0..n_blocks).collect(),
            n_ranks: 1,
        }
    }

    /// 块所属进程
    #[inline]
    pub fn rank(&self, block: usize) -> usize {
        self.rank_for_block[block]
    }

    /// 块的进程内局部编号
    #[inline]
    pub fn local_position(&self, block: usize) -> usize {
        self.local_pos[block]
    }

    /// 某进程拥有的全局块号（升序）
    pub fn blocks_on_rank(&self, rank: usize) -> Vec<usize> {
        (0..self.rank_for_block.len())
            .filter(|&b| self.rank_for_block[b] == rank)
            .collect()
    }

    /// 进程数
    pub fn num_ranks(&self) -> usize {
        self.n_ranks
    }

    /// 块总数
    pub fn num_blocks(&self) -> usize {
        self.rank_for_block.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_decomposition() {
        let d = Decomposition::serial(3);
        assert_eq!(d.rank(2), 0);
        assert_eq!(d.local_position(2), 2);
        assert_eq!(d.blocks_on_rank(0), vec![0, 1, 2]);
    }

    #[test]
    fn test_greedy_balances_load() {
        let d = Decomposition::decompose(&[100, 50, 50], 2).unwrap();
        // 大块独占一个进程，两个小块共享另一个
        let r_big = d.rank(0);
        assert_eq!(d.rank(1), d.rank(2));
        assert_ne!(r_big, d.rank(1));
    }

    #[test]
    fn test_local_positions_are_dense() {
        let d = Decomposition::decompose(&[10, 10, 10, 10], 2).unwrap();
        for r in 0..2 {
            let blocks = d.blocks_on_rank(r);
            for (n, &b) in blocks.iter().enumerate() {
                assert_eq!(d.local_position(b), n);
            }
        }
    }

    #[test]
    fn test_more_ranks_than_blocks_rejected() {
        assert!(Decomposition::decompose(&[10], 2).is_err());
    }
}
