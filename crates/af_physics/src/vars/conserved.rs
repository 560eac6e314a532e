// crates/af_physics/src/vars/conserved.rs

//! 守恒变量记录
//!
//! 布局 `[ρ_s …, ρu, ρv, ρw, ρE, ρk, ρω]`。

use glam::DVec3;
use smallvec::SmallVec;

use super::{zip_apply, RecordData, VarLayout};

/// 守恒变量（拥有存储）
#[derive(Debug, Clone, PartialEq)]
pub struct Conserved {
    layout: VarLayout,
    data: RecordData,
}

/// 守恒变量视图
#[derive(Debug, Clone, Copy)]
pub struct ConservedView<'a> {
    layout: VarLayout,
    data: &'a [f64],
}

macro_rules! conserved_accessors {
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

            /// 混合密度
            #[inline]
            pub fn rho(&self) -> f64 {
                self.data[..self.layout.n_species()].iter().sum()
            }

            /// 动量
            #[inline]
            pub fn momentum(&self) -> DVec3 {
                DVec3::new(
                    self.data[self.layout.mx()],
                    self.data[self.layout.my()],
                    self.data[self.layout.mz()],
                )
            }

            /// 速度
            #[inline]
            pub fn velocity(&self) -> DVec3 {
                self.momentum() / self.rho()
            }

            /// 总能 ρE
            #[inline]
            pub fn rho_e(&self) -> f64 {
                self.data[self.layout.energy()]
            }

            /// ρk
            #[inline]
            pub fn rho_tke(&self) -> f64 {
                if self.layout.is_rans() {
                    self.data[self.layout.turb(0)]
                } else {
                    0.0
                }
            }

            /// ρω
            #[inline]
            pub fn rho_sdr(&self) -> f64 {
                if self.layout.is_rans() {
                    self.data[self.layout.turb(1)]
                } else {
                    0.0
                }
            }

            /// 质量分数
            pub fn mass_fractions(&self) -> SmallVec<[f64; 4]> {
                let rho = self.rho();
                self.data[..self.layout.n_species()]
                    .iter()
                    .map(|r| r / rho)
                    .collect()
            }
        }
    };
}

conserved_accessors!(Conserved);
conserved_accessors!(ConservedView<'_>);

impl Conserved {
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

    /// 可写数据
    #[inline]
    pub fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// 组分密度限零并按原质量分数比例归一
    ///
    /// 幽灵与更新路径的约定：负的组分密度截断为零，
    /// 再缩放使总密度不变。
    pub fn clamp_species(&mut self) {
        let ns = self.layout.n_species();
        if ns == 1 {
            return;
        }
        let total: f64 = self.data[..ns].iter().sum();
        let mut clipped: f64 = 0.0;
        for s in 0..ns {
            if self.data[s] < 0.0 {
                self.data[s] = 0.0;
            }
            clipped += self.data[s];
        }
        if clipped > 0.0 && total > 0.0 {
            let scale = total / clipped;
            for s in 0..ns {
                self.data[s] *= scale;
            }
        }
    }
}

impl<'a> ConservedView<'a> {
    /// 借用构造
    pub fn new(layout: VarLayout, data: &'a [f64]) -> Self {
        debug_assert_eq!(data.len(), layout.n_eqns());
        Self { layout, data }
    }

    /// 拷贝为拥有记录
    pub fn to_owned(&self) -> Conserved {
        Conserved::from_slice(self.layout, self.data)
    }
}

impl std::ops::Add<&Conserved> for Conserved {
    type Output = Conserved;

    fn add(mut self, rhs: &Conserved) -> Conserved {
        zip_apply(&mut self.data, rhs.data(), |a, b| a + b);
        self
    }
}

impl std::ops::Sub<&Conserved> for Conserved {
    type Output = Conserved;

    fn sub(mut self, rhs: &Conserved) -> Conserved {
        zip_apply(&mut self.data, rhs.data(), |a, b| a - b);
        self
    }
}

impl std::ops::Mul<f64> for Conserved {
    type Output = Conserved;

    fn mul(mut self, rhs: f64) -> Conserved {
        for v in self.data.iter_mut() {
            *v *= rhs;
        }
        self
    }
}
