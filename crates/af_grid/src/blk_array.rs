// crates/af_grid/src/blk_array.rs

//! 每单元定长记录的三维数组
//!
//! [`BlkMultiArray3d`] 在 [`MultiArray3d`] 的索引约定上增加每单元
//! 记录步长 m（方程数）。解状态、残差、梯度分量都存放在这种
//! 数组里；记录以 `&[f64]` 借出，物理层的视图类型零拷贝地
//! 解释其角色布局。

use af_foundation::{AfError, AfResult};

use crate::range::{Axis, Range3};

/// 每单元定长 f64 记录的三维数组
#[derive(Debug, Clone, PartialEq)]
pub struct BlkMultiArray3d {
    ni: usize,
    nj: usize,
    nk: usize,
    g: usize,
    m: usize,
    data: Vec<f64>,
}

impl BlkMultiArray3d {
    /// 创建数组，记录全零
    pub fn new(ni: usize, nj: usize, nk: usize, g: usize, m: usize) -> Self {
        let total = (ni + 2 * g) * (nj + 2 * g) * (nk + 2 * g) * m;
        Self {
            ni,
            nj,
            nk,
            g,
            m,
            data: vec![0.0; total],
        }
    }

    /// 创建数组，每单元记录初始化为 `init`
    pub fn filled(ni: usize, nj: usize, nk: usize, g: usize, init: &[f64]) -> Self {
        let mut out = Self::new(ni, nj, nk, g, init.len());
        for chunk in out.data.chunks_exact_mut(init.len()) {
            chunk.copy_from_slice(init);
        }
        out
    }

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

    /// 记录长度（方程数）
    #[inline]
    pub fn record_len(&self) -> usize {
        self.m
    }

    #[inline]
    fn offset(&self, i: isize, j: isize, k: isize) -> usize {
        let g = self.g as isize;
        debug_assert!(
            i >= -g
                && i < self.ni as isize + g
                && j >= -g
                && j < self.nj as isize + g
                && k >= -g
                && k < self.nk as isize + g,
            "记录索引越界: ({}, {}, {})",
            i,
            j,
            k
        );
        let si = (self.ni + 2 * self.g) as isize;
        let sj = (self.nj + 2 * self.g) as isize;
        ((((k + g) * sj + (j + g)) * si + (i + g)) as usize) * self.m
    }

    /// 借出单元记录
    #[inline]
    pub fn record(&self, i: isize, j: isize, k: isize) -> &[f64] {
        let off = self.offset(i, j, k);
        &self.data[off..off + self.m]
    }

    /// 可写借出单元记录
    #[inline]
    pub fn record_mut(&mut self, i: isize, j: isize, k: isize) -> &mut [f64] {
        let off = self.offset(i, j, k);
        &mut self.data[off..off + self.m]
    }

    /// 写入单元记录
    #[inline]
    pub fn set_record(&mut self, i: isize, j: isize, k: isize, rec: &[f64]) {
        debug_assert_eq!(rec.len(), self.m);
        let off = self.offset(i, j, k);
        self.data[off..off + self.m].copy_from_slice(rec);
    }

    /// 记录逐元素累加
    #[inline]
    pub fn add_to_record(&mut self, i: isize, j: isize, k: isize, rec: &[f64]) {
        debug_assert_eq!(rec.len(), self.m);
        let off = self.offset(i, j, k);
        for (dst, src) in self.data[off..off + self.m].iter_mut().zip(rec) {
            *dst += src;
        }
    }

    /// 记录逐元素减
    #[inline]
    pub fn subtract_from_record(&mut self, i: isize, j: isize, k: isize, rec: &[f64]) {
        debug_assert_eq!(rec.len(), self.m);
        let off = self.offset(i, j, k);
        for (dst, src) in self.data[off..off + self.m].iter_mut().zip(rec) {
            *dst -= src;
        }
    }

    /// 全零
    pub fn zero(&mut self) {
        self.data.fill(0.0);
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

    /// 提取子数组（无幽灵层）
    pub fn slice(&self, r: Range3) -> Self {
        let mut out = Self::new(r.len_i(), r.len_j(), r.len_k(), 0, self.m);
        for (i, j, k) in r.iter() {
            let rec = self.record(i, j, k).to_vec();
            out.set_record(i - r.i.0, j - r.j.0, k - r.k.0, &rec);
        }
        out
    }

    /// 将切片写回范围 `r`（尺寸与记录长度必须精确匹配）
    pub fn insert(&mut self, r: Range3, src: &Self) -> AfResult<()> {
        AfError::check_size("insert.i", r.len_i(), src.ni)?;
        AfError::check_size("insert.j", r.len_j(), src.nj)?;
        AfError::check_size("insert.k", r.len_k(), src.nk)?;
        AfError::check_size("insert.m", self.m, src.m)?;
        for (i, j, k) in r.iter() {
            let rec = src.record(i - r.i.0, j - r.j.0, k - r.k.0).to_vec();
            self.set_record(i, j, k, &rec);
        }
        Ok(())
    }

    /// 底层数据
    pub fn raw(&self) -> &[f64] {
        &self.data
    }

    /// 底层可写数据
    pub fn raw_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_access() {
        let mut a = BlkMultiArray3d::new(2, 2, 1, 1, 3);
        a.set_record(0, 0, 0, &[1.0, 2.0, 3.0]);
        a.set_record(-1, 1, 0, &[4.0, 5.0, 6.0]);
        assert_eq!(a.record(0, 0, 0), &[1.0, 2.0, 3.0]);
        assert_eq!(a.record(-1, 1, 0), &[4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_add_subtract() {
        let mut a = BlkMultiArray3d::new(1, 1, 1, 0, 2);
        a.add_to_record(0, 0, 0, &[1.0, 2.0]);
        a.add_to_record(0, 0, 0, &[0.5, -1.0]);
        a.subtract_from_record(0, 0, 0, &[0.5, 0.0]);
        assert_eq!(a.record(0, 0, 0), &[1.0, 1.0]);
    }

    #[test]
    fn test_slice_insert_record() {
        let mut a = BlkMultiArray3d::new(3, 2, 1, 1, 2);
        for (n, (i, j, k)) in a.range_physical().iter().enumerate().collect::<Vec<_>>() {
            a.set_record(i, j, k, &[n as f64, -(n as f64)]);
        }
        let r = Range3::new((1, 3), (0, 2), (0, 1));
        let s = a.slice(r);
        let mut b = BlkMultiArray3d::new(3, 2, 1, 1, 2);
        b.insert(r, &s).unwrap();
        assert_eq!(b.record(2, 1, 0), a.record(2, 1, 0));
    }

    #[test]
    fn test_filled() {
        let a = BlkMultiArray3d::filled(2, 1, 1, 1, &[3.0, 1.0]);
        assert_eq!(a.record(-1, -1, -1), &[3.0, 1.0]);
        assert_eq!(a.record_len(), 2);
    }
}
