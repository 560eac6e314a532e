// crates/af_physics/src/vars/mod.rs

//! 变量记录
//!
//! 所有携带解的记录都是定长 f64 元组，连续布局：
//!
//! ```text
//! [ρ_s …, ρu|u, ρv|v, ρw|w, ρE|P, ρk|k, ρω|ω]
//! ```
//!
//! [`VarLayout`] 是索引→角色的纯函数表，只由组分数与湍流方程数
//! 决定。三个特化（[`Primitive`]、[`Conserved`]、[`Residual`]）
//! 共享这一布局；视图类型借用块存储避免交换与求解途中的拷贝。

mod conserved;
mod primitive;
mod residual;

pub use conserved::{Conserved, ConservedView};
pub use primitive::{Primitive, PrimitiveView};
pub use residual::{LinfLocation, ResidNorms, Residual};

use smallvec::SmallVec;

/// 记录的内联容量（组分 1 + RANS 的常见情形不落堆）
pub type RecordData = SmallVec<[f64; 8]>;

/// 索引→角色表
///
/// 不变量：组分数 ≥ 1；方程数 = N_s + 4 + N_turb；
/// 布局一经构造不可变。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarLayout {
    n_species: usize,
    n_turb: usize,
}

impl VarLayout {
    /// 创建布局
    pub fn new(n_species: usize, n_turb: usize) -> Self {
        assert!(n_species >= 1, "至少一个组分");
        assert!(n_turb == 0 || n_turb == 2, "湍流方程数只能为 0 或 2");
        Self { n_species, n_turb }
    }

    /// 组分数
    #[inline]
    pub fn n_species(&self) -> usize {
        self.n_species
    }

    /// 湍流方程数
    #[inline]
    pub fn n_turb(&self) -> usize {
        self.n_turb
    }

    /// 是否 RANS
    #[inline]
    pub fn is_rans(&self) -> bool {
        self.n_turb > 0
    }

    /// 方程总数
    #[inline]
    pub fn n_eqns(&self) -> usize {
        self.n_species + 4 + self.n_turb
    }

    /// x 动量（或速度 u）索引
    #[inline]
    pub fn mx(&self) -> usize {
        self.n_species
    }

    /// y 动量索引
    #[inline]
    pub fn my(&self) -> usize {
        self.n_species + 1
    }

    /// z 动量索引
    #[inline]
    pub fn mz(&self) -> usize {
        self.n_species + 2
    }

    /// 能量（或压力）索引
    #[inline]
    pub fn energy(&self) -> usize {
        self.n_species + 3
    }

    /// 第 n 个湍流量索引
    #[inline]
    pub fn turb(&self, n: usize) -> usize {
        debug_assert!(n < self.n_turb);
        self.n_species + 4 + n
    }

    /// 方程索引的角色名（残差报表）
    pub fn eqn_name(&self, idx: usize) -> &'static str {
        if idx < self.n_species {
            "mass"
        } else if idx == self.mx() {
            "mom_x"
        } else if idx == self.my() {
            "mom_y"
        } else if idx == self.mz() {
            "mom_z"
        } else if idx == self.energy() {
            "energy"
        } else {
            "turbulence"
        }
    }
}

/// 逐元素二元运算（+、− 与标量 × 的公共实现）
#[inline]
pub(crate) fn zip_apply(a: &mut RecordData, b: &[f64], op: impl Fn(f64, f64) -> f64) {
    debug_assert_eq!(a.len(), b.len());
    for (x, y) in a.iter_mut().zip(b) {
        *x = op(*x, *y);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_indices_single_species() {
        let l = VarLayout::new(1, 0);
        assert_eq!(l.n_eqns(), 5);
        assert_eq!(l.mx(), 1);
        assert_eq!(l.energy(), 4);
    }

    #[test]
    fn test_layout_indices_multispecies_rans() {
        let l = VarLayout::new(3, 2);
        assert_eq!(l.n_eqns(), 9);
        assert_eq!(l.mx(), 3);
        assert_eq!(l.energy(), 6);
        assert_eq!(l.turb(0), 7);
        assert_eq!(l.turb(1), 8);
    }

    #[test]
    #[should_panic]
    fn test_zero_species_panics() {
        VarLayout::new(0, 0);
    }

    #[test]
    fn test_eqn_names() {
        let l = VarLayout::new(2, 2);
        assert_eq!(l.eqn_name(0), "mass");
        assert_eq!(l.eqn_name(1), "mass");
        assert_eq!(l.eqn_name(2), "mom_x");
        assert_eq!(l.eqn_name(5), "energy");
        assert_eq!(l.eqn_name(6), "turbulence");
    }
}
