// crates/af_io/src/gather.rs

//! 输出重组：根进程聚合
//!
//! 各进程把本地块的场数据按全局位置升序发送，根进程按
//! 全局块号重组为完整序列。先排序再发送避免标签错配与死锁。

use af_foundation::{AfError, AfResult};
use af_grid::Comm;

/// 聚合标签空间
const GATHER_BASE: u64 = 1 << 28;

/// 把各进程的 `(全局块号, 数据)` 聚到根进程
///
/// 根进程返回按全局块号排列的全部数据；其余进程返回 `None`。
/// `total_blocks` 是全局块数（各进程一致）。
pub fn gather_to_root(
    comm: &dyn Comm,
    mut local: Vec<(usize, Vec<f64>)>,
    total_blocks: usize,
) -> AfResult<Option<Vec<Vec<f64>>>> {
    // 按全局位置排序后发送
    local.sort_by_key(|(g, _)| *g);

    if comm.rank() == 0 {
        let mut out: Vec<Option<Vec<f64>>> = vec![None; total_blocks];
        for (g, data) in local {
            out[g] = Some(data);
        }
        // 其余进程逐块收取：先收块号清单长度，再逐块收数据
        for peer in 1..comm.size() {
            let index = comm.recv(peer, GATHER_BASE)?;
            for g in index {
                let g = g as usize;
                let data = comm.recv(peer, GATHER_BASE + 1 + g as u64)?;
                out[g] = Some(data);
            }
        }
        let mut full = Vec::with_capacity(total_blocks);
        for (g, slot) in out.into_iter().enumerate() {
            full.push(slot.ok_or_else(|| {
                AfError::internal(format!("全局块 {} 未聚合到根进程", g))
            })?);
        }
        Ok(Some(full))
    } else {
        let index: Vec<f64> = local.iter().map(|(g, _)| *g as f64).collect();
        comm.send(0, GATHER_BASE, &index)?;
        for (g, data) in local {
            comm.send(0, GATHER_BASE + 1 + g as u64, &data)?;
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use af_grid::{SingleComm, ThreadComm};

    #[test]
    fn test_gather_single_rank() {
        let comm = SingleComm::new();
        let local = vec![(1, vec![10.0]), (0, vec![5.0])];
        let full = gather_to_root(&comm, local, 2).unwrap().unwrap();
        assert_eq!(full, vec![vec![5.0], vec![10.0]]);
    }

    #[test]
    fn test_gather_two_ranks() {
        let mut mesh = ThreadComm::mesh(2);
        let c1 = mesh.pop().unwrap();
        let c0 = mesh.pop().unwrap();
        let h = std::thread::spawn(move || {
            gather_to_root(&c1, vec![(1, vec![1.0, 1.5])], 3).unwrap()
        });
        let full = gather_to_root(&c0, vec![(0, vec![0.0]), (2, vec![2.0])], 3)
            .unwrap()
            .unwrap();
        assert!(h.join().unwrap().is_none());
        assert_eq!(full, vec![vec![0.0], vec![1.0, 1.5], vec![2.0]]);
    }

    #[test]
    fn test_gather_missing_block_is_error() {
        let comm = SingleComm::new();
        assert!(gather_to_root(&comm, vec![(0, vec![1.0])], 2).is_err());
    }
}
