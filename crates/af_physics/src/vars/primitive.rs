// crates/af_physics/src/vars/primitive.rs

//! 原始变量记录
//!
//! 布局 `[ρ_s …, u, v, w, P, k, ω]`。与状态方程相关的转换在
//! `models` 模块实现，这里只有纯布局运算。

use glam::DVec3;
use smallvec::SmallVec;

use super::{zip_apply, RecordData, VarLayout};

/// 原始变量（拥有存储）
#[derive(Debug, Clone, PartialEq)]
pub struct Primitive {
    layout: VarLayout,
    data: RecordData,
}

/// 原始变量视图（借用块存储）
#[derive(Debug, Clone, Copy)]
pub struct PrimitiveView<'a> {
    layout: VarLayout,
    data: &'a [f64],
}

macro_rules! primitive_accessors {
    ($ty:ty) => {
        impl $ty {
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

            /// 组分密度
            #[inline]
            pub fn rho_species(&self, s: usize) -> f64 {
                self.data[s]
            }

            /// 混合密度 Σρ_s
            #[inline]
            pub fn rho(&self) -> f64 {
                self.data[..self.layout.n_species()].iter().sum()
            }

            /// 组分质量分数
            #[inline]
            pub fn mass_fraction(&self, s: usize) -> f64 {
                self.data[s] / self.rho()
            }

            /// 全部质量分数
            pub fn mass_fractions(&self) -> SmallVec<[f64; 4]> {
                let rho = self.rho();
                self.data[..self.layout.n_species()]
                    .iter()
                    .map(|r| r / rho)
                    .collect()
            }

            /// 速度
            #[inline]
            pub fn velocity(&self) -> DVec3 {
                DVec3::new(
                    self.data[self.layout.mx()],
                    self.data[self.layout.my()],
                    self.data[self.layout.mz()],
                )
            }

            /// 压力
            #[inline]
            pub fn p(&self) -> f64 {
                self.data[self.layout.energy()]
            }

            /// 湍动能（无湍流方程时为 0）
            #[inline]
            pub fn tke(&self) -> f64 {
                if self.layout.is_rans() {
                    self.data[self.layout.turb(0)]
                } else {
                    0.0
                }
            }

            /// 比耗散率（无湍流方程时为 0）
            #[inline]
            pub fn sdr(&self) -> f64 {
                if self.layout.is_rans() {
                    self.data[self.layout.turb(1)]
                } else {
                    0.0
                }
            }

            /// 状态是否物理（ρ > 0 且 P > 0，无 NaN）
            pub fn is_physical(&self) -> bool {
                self.rho() > 0.0 && self.p() > 0.0 && self.data.iter().all(|v| v.is_finite())
            }
        }
    };
}

primitive_accessors!(Primitive);
primitive_accessors!(PrimitiveView<'_>);

impl Primitive {
    /// 从切片拷贝构造
    pub fn from_slice(layout: VarLayout, data: &[f64]) -> Self {
        debug_assert_eq!(data.len(), layout.n_eqns());
        Self {
            layout,
            data: RecordData::from_slice(data),
        }
    }

    /// 全零记录
    pub fn zeros(layout: VarLayout) -> Self {
        Self {
            layout,
            data: smallvec::smallvec![0.0; layout.n_eqns()],
        }
    }

    /// 由成分组装
    #[allow(clippy::too_many_arguments)]
    pub fn assemble(
        layout: VarLayout,
        rho_species: &[f64],
        velocity: DVec3,
        pressure: f64,
        tke: f64,
        sdr: f64,
    ) -> Self {
        let mut out = Self::zeros(layout);
        out.data[..layout.n_species()].copy_from_slice(rho_species);
        out.data[layout.mx()] = velocity.x;
        out.data[layout.my()] = velocity.y;
        out.data[layout.mz()] = velocity.z;
        out.data[layout.energy()] = pressure;
        if layout.is_rans() {
            out.data[layout.turb(0)] = tke;
            out.data[layout.turb(1)] = sdr;
        }
        out
    }

    /// 可写数据
    #[inline]
    pub fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// 置速度
    pub fn set_velocity(&mut self, v: DVec3) {
        self.data[self.layout.mx()] = v.x;
        self.data[self.layout.my()] = v.y;
        self.data[self.layout.mz()] = v.z;
    }

    /// 置压力
    pub fn set_p(&mut self, p: f64) {
        let idx = self.layout.energy();
        self.data[idx] = p;
    }

    /// 置湍流量
    pub fn set_turb(&mut self, tke: f64, sdr: f64) {
        if self.layout.is_rans() {
            let (t0, t1) = (self.layout.turb(0), self.layout.turb(1));
            self.data[t0] = tke;
            self.data[t1] = sdr;
        }
    }

    /// 按质量分数缩放组分密度到给定混合密度
    pub fn set_rho(&mut self, rho: f64) {
        let old = self.rho();
        for s in 0..self.layout.n_species() {
            self.data[s] *= rho / old;
        }
    }
}

impl<'a> PrimitiveView<'a> {
    /// 借用构造
    pub fn new(layout: VarLayout, data: &'a [f64]) -> Self {
        debug_assert_eq!(data.len(), layout.n_eqns());
        Self { layout, data }
    }

    /// 拷贝为拥有记录
    pub fn to_owned(&self) -> Primitive {
        Primitive::from_slice(self.layout, self.data)
    }
}

// ============================================================
// 逐元素运算
// ============================================================

impl std::ops::Add<&Primitive> for Primitive {
    type Output = Primitive;

    fn add(mut self, rhs: &Primitive) -> Primitive {
        zip_apply(&mut self.data, rhs.data(), |a, b| a + b);
        self
    }
}

impl std::ops::Sub<&Primitive> for Primitive {
    type Output = Primitive;

    fn sub(mut self, rhs: &Primitive) -> Primitive {
        zip_apply(&mut self.data, rhs.data(), |a, b| a - b);
        self
    }
}

impl std::ops::Mul<f64> for Primitive {
    type Output = Primitive;

    fn mul(mut self, rhs: f64) -> Primitive {
        for v in self.data.iter_mut() {
            *v *= rhs;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Primitive {
        let layout = VarLayout::new(2, 2);
        Primitive::assemble(
            layout,
            &[0.75, 0.25],
            DVec3::new(10.0, -2.0, 0.5),
            101325.0,
            1.5,
            100.0,
        )
    }

    #[test]
    fn test_accessors() {
        let w = sample();
        assert!((w.rho() - 1.0).abs() < 1e-14);
        assert!((w.mass_fraction(0) - 0.75).abs() < 1e-14);
        assert_eq!(w.velocity(), DVec3::new(10.0, -2.0, 0.5));
        assert_eq!(w.p(), 101325.0);
        assert_eq!(w.tke(), 1.5);
        assert_eq!(w.sdr(), 100.0);
        assert!(w.is_physical());
    }

    #[test]
    fn test_view_matches_owned() {
        let w = sample();
        let v = PrimitiveView::new(w.layout(), w.data());
        assert_eq!(v.rho(), w.rho());
        assert_eq!(v.velocity(), w.velocity());
        assert_eq!(v.to_owned(), w);
    }

    #[test]
    fn test_elementwise_ops() {
        let w = sample();
        let sum = w.clone() + &w;
        assert!((sum.rho() - 2.0).abs() < 1e-14);
        let diff = sum - &w;
        assert!((diff.rho() - 1.0).abs() < 1e-14);
        let scaled = diff * 3.0;
        assert!((scaled.p() - 3.0 * 101325.0).abs() < 1e-9);
    }

    #[test]
    fn test_nonphysical_detection() {
        let layout = VarLayout::new(1, 0);
        let w = Primitive::assemble(layout, &[-1.0], DVec3::ZERO, 100.0, 0.0, 0.0);
        assert!(!w.is_physical());
    }
}
