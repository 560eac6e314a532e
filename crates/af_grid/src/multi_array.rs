// crates/af_grid/src/multi_array.rs

//! 带幽灵层的稠密三维数组
//!
//! [`MultiArray3d`] 是核心的基础容器：物理域 `[0, N)` 外包裹 G 层
//! 幽灵单元，索引用有符号 `isize` 表示，合法域 `[-G, N+G)`。
//! 存储按 i 最快、k 最慢的行优先顺序连续排布。
//!
//! 切片的提取与回写要求尺寸精确匹配，不匹配立即报
//! [`AfError::SizeMismatch`]，不做任何隐式截断。

use af_foundation::{AfError, AfResult};

use crate::range::{Axis, Range3};

/// 带幽灵层的稠密三维数组
#[derive(Debug, Clone, PartialEq)]
pub struct MultiArray3d<T> {
    ni: usize,
    nj: usize,
    nk: usize,
    g: usize,
    data: Vec<T>,
}

impl<T: Clone> MultiArray3d<T> {
    /// 创建数组，所有元素初始化为 `init`
    pub fn new(ni: usize, nj: usize, nk: usize, g: usize, init: T) -> Self {
        let total = (ni + 2 * g) * (nj + 2 * g) * (nk + 2 * g);
        Self {
            ni,
            nj,
            nk,
            g,
            data: vec![init; total],
        }
    }

    /// 全部元素置为 `value`
    pub fn fill(&mut self, value: T) {
        for v in &mut self.data {
            *v = value.clone();
        }
    }

    /// 提取子数组（结果无幽灵层）
    ///
    /// 范围可以伸入幽灵域。
    pub fn slice(&self, r: Range3) -> Self {
        let mut out = Self::new(r.len_i(), r.len_j(), r.len_k(), 0, self.data[0].clone());
        for (i, j, k) in r.iter() {
            let (li, lj, lk) = (i - r.i.0, j - r.j.0, k - r.k.0);
            *out.get_mut(li, lj, lk) = self.get(i, j, k).clone();
        }
        out
    }

    /// 将切片写回范围 `r`
    ///
    /// 切片的物理尺寸必须与 `r` 精确一致。
    pub fn insert(&mut self, r: Range3, src: &Self) -> AfResult<()> {
        AfError::check_size("insert.i", r.len_i(), src.ni)?;
        AfError::check_size("insert.j", r.len_j(), src.nj)?;
        AfError::check_size("insert.k", r.len_k(), src.nk)?;
        for (i, j, k) in r.iter() {
            let (li, lj, lk) = (i - r.i.0, j - r.j.0, k - r.k.0);
            *self.get_mut(i, j, k) = src.get(li, lj, lk).clone();
        }
        Ok(())
    }

    /// 沿某轴拼接另一数组（幽灵层数必须一致，横向尺寸必须一致）
    pub fn grow(&mut self, axis: Axis, other: &Self) -> AfResult<()> {
        AfError::check_size("grow.ghosts", self.g, other.g)?;
        let (ni, nj, nk) = match axis {
            Axis::I => {
                AfError::check_size("grow.j", self.nj, other.nj)?;
                AfError::check_size("grow.k", self.nk, other.nk)?;
                (self.ni + other.ni, self.nj, self.nk)
            }
            Axis::J => {
                AfError::check_size("grow.i", self.ni, other.ni)?;
                AfError::check_size("grow.k", self.nk, other.nk)?;
                (self.ni, self.nj + other.nj, self.nk)
            }
            Axis::K => {
                AfError::check_size("grow.i", self.ni, other.ni)?;
                AfError::check_size("grow.j", self.nj, other.nj)?;
                (self.ni, self.nj, self.nk + other.nk)
            }
        };
        let mut merged = Self::new(ni, nj, nk, self.g, self.data[0].clone());
        // 下侧（含幽灵）来自 self，上侧（含接缝幽灵）来自 other
        for (i, j, k) in merged.range_all().iter() {
            let (si, sj, sk) = (i, j, k);
            let from_other = match axis {
                Axis::I => si >= self.ni as isize,
                Axis::J => sj >= self.nj as isize,
                Axis::K => sk >= self.nk as isize,
            };
            let value = if from_other {
                let (oi, oj, ok) = match axis {
                    Axis::I => (si - self.ni as isize, sj, sk),
                    Axis::J => (si, sj - self.nj as isize, sk),
                    Axis::K => (si, sj, sk - self.nk as isize),
                };
                other.get(oi, oj, ok).clone()
            } else {
                self.get(si, sj, sk).clone()
            };
            *merged.get_mut(i, j, k) = value;
        }
        *self = merged;
        Ok(())
    }
}

impl<T> MultiArray3d<T> {
    /// 物理 i 尺寸
    #[inline]
    pub fn num_i(&self) -> usize {
        self.ni
    }

    /// 物理 j 尺寸
    #[inline]
    pub fn num_j(&self) -> usize {
        self.nj
    }

    /// 物理 k 尺寸
    #[inline]
    pub fn num_k(&self) -> usize {
        self.nk
    }

    /// 按轴取物理尺寸
    #[inline]
    pub fn num_along(&self, axis: Axis) -> usize {
        match axis {
            Axis::I => self.ni,
            Axis::J => self.nj,
            Axis::K => self.nk,
        }
    }

    /// 幽灵层数
    #[inline]
    pub fn ghosts(&self) -> usize {
        self.g
    }

    /// 物理单元总数
    #[inline]
    pub fn num_physical(&self) -> usize {
        self.ni * self.nj * self.nk
    }

    #[inline]
    fn index(&self, i: isize, j: isize, k: isize) -> usize {
        let g = self.g as isize;
        debug_assert!(
            i >= -g
                && i < self.ni as isize + g
                && j >= -g
                && j < self.nj as isize + g
                && k >= -g
                && k < self.nk as isize + g,
            "索引越界: ({}, {}, {})",
            i,
            j,
            k
        );
        let si = (self.ni + 2 * self.g) as isize;
        let sj = (self.nj + 2 * self.g) as isize;
        (((k + g) * sj + (j + g)) * si + (i + g)) as usize
    }

    /// 只读访问
    #[inline]
    pub fn get(&self, i: isize, j: isize, k: isize) -> &T {
        &self.data[self.index(i, j, k)]
    }

    /// 可写访问
    #[inline]
    pub fn get_mut(&mut self, i: isize, j: isize, k: isize) -> &mut T {
        let idx = self.index(i, j, k);
        &mut self.data[idx]
    }

    /// 索引是否落在物理域内
    #[inline]
    pub fn is_physical(&self, i: isize, j: isize, k: isize) -> bool {
        i >= 0
            && i < self.ni as isize
            && j >= 0
            && j < self.nj as isize
            && k >= 0
            && k < self.nk as isize
    }

    /// 物理域范围
    pub fn range_physical(&self) -> Range3 {
        Range3::new(
            (0, self.ni as isize),
            (0, self.nj as isize),
            (0, self.nk as isize),
        )
    }

    /// 含幽灵层的完整范围
    pub fn range_all(&self) -> Range3 {
        let g = self.g as isize;
        Range3::new(
            (-g, self.ni as isize + g),
            (-g, self.nj as isize + g),
            (-g, self.nk as isize + g),
        )
    }

    /// 底层数据（测试与序列化用）
    pub fn raw(&self) -> &[T] {
        &self.data
    }
}

impl<T> std::ops::Index<(isize, isize, isize)> for MultiArray3d<T> {
    type Output = T;

    #[inline]
    fn index(&self, (i, j, k): (isize, isize, isize)) -> &T {
        self.get(i, j, k)
    }
}

impl<T> std::ops::IndexMut<(isize, isize, isize)> for MultiArray3d<T> {
    #[inline]
    fn index_mut(&mut self, (i, j, k): (isize, isize, isize)) -> &mut T {
        self.get_mut(i, j, k)
    }
}
