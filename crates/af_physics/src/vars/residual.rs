// crates/af_physics/src/vars/residual.rs

//! 残差记录与范数累加
//!
//! [`Residual`] 与状态记录同布局，用作逐方程残差累加器；
//! [`ResidNorms`] 聚合整层的 L₂ 与 L∞（带块号、单元、方程定位）。

use super::{zip_apply, RecordData, VarLayout};

/// 残差记录
#[derive(Debug, Clone, PartialEq)]
pub struct Residual {
    layout: VarLayout,
    data: RecordData,
}

impl Residual {
    /// 全零
    pub fn zeros(layout: VarLayout) -> Self {
        Self {
            layout,
            data: smallvec::smallvec![0.0; layout.n_eqns()],
        }
    }

    /// 从切片拷贝构造
    pub fn from_slice(layout: VarLayout, data: &[f64]) -> Self {
        debug_assert_eq!(data.len(), layout.n_eqns());
        Self {
            layout,
            data: RecordData::from_slice(data),
        }
    }

    /// 布局
    #[inline]
    pub fn layout(&self) -> VarLayout {
        self.layout
    }

    /// 底层数据
    #[inline]
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// 可写数据
    #[inline]
    pub fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// 累加
    pub fn add(&mut self, other: &[f64]) {
        zip_apply(&mut self.data, other, |a, b| a + b);
    }

    /// 减
    pub fn subtract(&mut self, other: &[f64]) {
        zip_apply(&mut self.data, other, |a, b| a - b);
    }
}

/// L∞ 定位
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinfLocation {
    /// 残差绝对值
    pub value: f64,
    /// 父块全局编号
    pub block: usize,
    /// 单元索引
    pub cell: (isize, isize, isize),
    /// 方程索引
    pub eqn: usize,
}

impl Default for LinfLocation {
    fn default() -> Self {
        Self {
            value: 0.0,
            block: 0,
            cell: (0, 0, 0),
            eqn: 0,
        }
    }
}

/// 整层残差范数累加器
#[derive(Debug, Clone)]
pub struct ResidNorms {
    layout: VarLayout,
    /// 逐方程残差平方和
    pub l2_sq: RecordData,
    /// 全场 L∞ 及定位
    pub linf: LinfLocation,
}

impl ResidNorms {
    /// 全零
    pub fn new(layout: VarLayout) -> Self {
        Self {
            layout,
            l2_sq: smallvec::smallvec![0.0; layout.n_eqns()],
            linf: LinfLocation::default(),
        }
    }

    /// 累加一个单元的残差
    pub fn accumulate(&mut self, resid: &[f64], block: usize, cell: (isize, isize, isize)) {
        for (eqn, &r) in resid.iter().enumerate() {
            self.l2_sq[eqn] += r * r;
            if r.abs() > self.linf.value {
                self.linf = LinfLocation {
                    value: r.abs(),
                    block,
                    cell,
                    eqn,
                };
            }
        }
    }

    /// 合并另一累加器（跨块）
    pub fn merge(&mut self, other: &ResidNorms) {
        for (a, b) in self.l2_sq.iter_mut().zip(&other.l2_sq) {
            *a += b;
        }
        if other.linf.value > self.linf.value {
            self.linf = other.linf;
        }
    }

    /// 逐方程 L₂（开方后）
    pub fn l2(&self) -> RecordData {
        self.l2_sq.iter().map(|v| v.sqrt()).collect()
    }

    /// 全方程 L₂ 合计
    pub fn l2_total(&self) -> f64 {
        self.l2_sq.iter().sum::<f64>().sqrt()
    }

    /// L∞ 所在方程的角色名
    pub fn linf_eqn_name(&self) -> &'static str {
        self.layout.eqn_name(self.linf.eqn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vars::VarLayout;

    #[test]
    fn test_accumulate_tracks_linf_location() {
        let layout = VarLayout::new(1, 0);
        let mut norms = ResidNorms::new(layout);
        norms.accumulate(&[0.1, 0.0, 0.0, 0.0, 0.2], 0, (1, 1, 0));
        norms.accumulate(&[0.05, -0.9, 0.0, 0.0, 0.1], 2, (3, 0, 1));
        assert_eq!(norms.linf.block, 2);
        assert_eq!(norms.linf.cell, (3, 0, 1));
        assert_eq!(norms.linf.eqn, 1);
        assert_eq!(norms.linf_eqn_name(), "mom_x");
        assert!((norms.linf.value - 0.9).abs() < 1e-15);
    }

    #[test]
    fn test_l2_accumulation() {
        let layout = VarLayout::new(1, 0);
        let mut norms = ResidNorms::new(layout);
        norms.accumulate(&[3.0, 0.0, 0.0, 0.0, 0.0], 0, (0, 0, 0));
        norms.accumulate(&[4.0, 0.0, 0.0, 0.0, 0.0], 0, (1, 0, 0));
        assert!((norms.l2()[0] - 5.0).abs() < 1e-14);
    }

    #[test]
    fn test_merge() {
        let layout = VarLayout::new(1, 0);
        let mut a = ResidNorms::new(layout);
        let mut b = ResidNorms::new(layout);
        a.accumulate(&[1.0, 0.0, 0.0, 0.0, 0.0], 0, (0, 0, 0));
        b.accumulate(&[0.0, 2.0, 0.0, 0.0, 0.0], 1, (5, 5, 5));
        a.merge(&b);
        assert_eq!(a.linf.block, 1);
        assert!((a.l2_total() - (1.0f64 + 4.0).sqrt()).abs() < 1e-14);
    }
}
