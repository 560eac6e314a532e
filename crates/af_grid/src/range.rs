// crates/af_grid/src/range.rs

//! 轴与三维索引范围

use serde::{Deserialize, Serialize};

/// 结构网格的三个索引方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    /// i 方向
    I,
    /// j 方向
    J,
    /// k 方向
    K,
}

impl Axis {
    /// 三个方向的固定顺序
    pub const ALL: [Axis; 3] = [Axis::I, Axis::J, Axis::K];

    /// 该轴在 (i, j, k) 元组中的位置
    #[inline]
    pub fn ord(&self) -> usize {
        match self {
            Axis::I => 0,
            Axis::J => 1,
            Axis::K => 2,
        }
    }

    /// 与该轴正交的两个方向（面内 d1、d2 约定序）
    #[inline]
    pub fn transverse(&self) -> (Axis, Axis) {
        match self {
            Axis::I => (Axis::J, Axis::K),
            Axis::J => (Axis::K, Axis::I),
            Axis::K => (Axis::I, Axis::J),
        }
    }
}

/// 半开三维索引范围 `[start, end)`，允许落入幽灵域
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range3 {
    /// i 范围
    pub i: (isize, isize),
    /// j 范围
    pub j: (isize, isize),
    /// k 范围
    pub k: (isize, isize),
}

impl Range3 {
    /// 创建范围
    pub fn new(i: (isize, isize), j: (isize, isize), k: (isize, isize)) -> Self {
        debug_assert!(i.0 <= i.1 && j.0 <= j.1 && k.0 <= k.1);
        Self { i, j, k }
    }

    /// i 跨度
    #[inline]
    pub fn len_i(&self) -> usize {
        (self.i.1 - self.i.0) as usize
    }

    /// j 跨度
    #[inline]
    pub fn len_j(&self) -> usize {
        (self.j.1 - self.j.0) as usize
    }

    /// k 跨度
    #[inline]
    pub fn len_k(&self) -> usize {
        (self.k.1 - self.k.0) as usize
    }

    /// 总单元数
    #[inline]
    pub fn len(&self) -> usize {
        self.len_i() * self.len_j() * self.len_k()
    }

    /// 是否为空
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 按轴取范围
    #[inline]
    pub fn along(&self, axis: Axis) -> (isize, isize) {
        match axis {
            Axis::I => self.i,
            Axis::J => self.j,
            Axis::K => self.k,
        }
    }

    /// 迭代范围内全部索引（k 最外层，i 最内层）
    pub fn iter(&self) -> impl Iterator<Item = (isize, isize, isize)> + '_ {
        let (i0, i1) = self.i;
        let (j0, j1) = self.j;
        let (k0, k1) = self.k;
        (k0..k1).flat_map(move |k| (j0..j1).flat_map(move |j| (i0..i1).map(move |i| (i, j, k))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_lengths() {
        let r = Range3::new((-2, 4), (0, 3), (1, 2));
        assert_eq!(r.len_i(), 6);
        assert_eq!(r.len_j(), 3);
        assert_eq!(r.len_k(), 1);
        assert_eq!(r.len(), 18);
    }

    #[test]
    fn test_range_iter_order() {
        let r = Range3::new((0, 2), (0, 2), (0, 1));
        let cells: Vec<_> = r.iter().collect();
        // i 最内层
        assert_eq!(cells[0], (0, 0, 0));
        assert_eq!(cells[1], (1, 0, 0));
        assert_eq!(cells[2], (0, 1, 0));
        assert_eq!(cells.len(), 4);
    }

    #[test]
    fn test_axis_transverse() {
        assert_eq!(Axis::I.transverse(), (Axis::J, Axis::K));
        assert_eq!(Axis::K.transverse(), (Axis::I, Axis::J));
    }
}
