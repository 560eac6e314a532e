// crates/af_config/src/schemes.rs

//! 数值格式枚举
//!
//! 通量函数、重构格式、限制器、时间推进与隐式矩阵模式。
//! 全部实现 serde，配置文件中以小驼峰字符串出现。

use serde::{Deserialize, Serialize};

/// 无黏通量函数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FluxFunction {
    /// Roe 通量差分裂（带熵修正）
    #[default]
    Roe,
    /// AUSM+ 对流迎风分裂
    Ausm,
    /// HLL 双波近似
    Hll,
    /// Rusanov（局部 Lax-Friedrichs）
    Rusanov,
}

/// 空间重构格式
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum Reconstruction {
    /// 一阶常量重构
    FirstOrder,
    /// 二阶 MUSCL（κ 控制中心/迎风权重）
    #[default]
    Muscl,
    /// 五单元 WENO
    Weno,
    /// 五单元 WENO-Z
    WenoZ,
}

impl Reconstruction {
    /// 是否为二阶及以上
    pub fn is_higher_order(&self) -> bool {
        !matches!(self, Self::FirstOrder)
    }

    /// 重构所需的单侧幽灵层数
    pub fn required_ghost_layers(&self) -> usize {
        match self {
            Self::FirstOrder => 1,
            Self::Muscl => 2,
            Self::Weno | Self::WenoZ => 3,
        }
    }
}

/// 斜率限制器（MUSCL 专用）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Limiter {
    /// 不限制
    None,
    /// Minmod
    #[default]
    Minmod,
    /// Van Albada
    VanAlbada,
}

/// 黏性面状态插值
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ViscousFaceInterp {
    /// 两点中心
    #[default]
    Central,
    /// 四点中心（高阶）
    CentralFourth,
}

/// 时间推进格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimeIntegration {
    /// 显式欧拉
    #[default]
    ExplicitEuler,
    /// 低存储四级 Runge-Kutta
    Rk4,
    /// 隐式欧拉（BDF1）
    ImplicitEuler,
    /// 二阶后向差分（BDF2）
    Bdf2,
}

impl TimeIntegration {
    /// 是否隐式
    pub fn is_implicit(&self) -> bool {
        matches!(self, Self::ImplicitEuler | Self::Bdf2)
    }

    /// Beam-Warming θ 参数
    pub fn theta(&self) -> f64 {
        match self {
            Self::ImplicitEuler | Self::Bdf2 => 1.0,
            _ => 0.0,
        }
    }

    /// Beam-Warming ζ 参数
    ///
    /// ζ ≠ 0 时需要保存 n-1 时间层（多层时间格式）。
    pub fn zeta(&self) -> f64 {
        match self {
            Self::Bdf2 => 0.5,
            _ => 0.0,
        }
    }

    /// 是否需要 n-1 层守恒量
    pub fn needs_nm1(&self) -> bool {
        self.zeta() != 0.0
    }
}

/// 隐式主对角存储模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MatrixMode {
    /// 谱半径标量对角
    #[default]
    Scalar,
    /// 近似 Jacobian 块对角
    Block,
}

/// 方程组
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EquationSet {
    /// 无黏 Euler
    #[default]
    Euler,
    /// 层流 Navier-Stokes
    NavierStokes,
    /// RANS（两方程湍流模型）
    Rans,
}

impl EquationSet {
    /// 是否包含黏性通量
    pub fn is_viscous(&self) -> bool {
        !matches!(self, Self::Euler)
    }

    /// 是否求解湍流方程
    pub fn is_rans(&self) -> bool {
        matches!(self, Self::Rans)
    }

    /// 湍流方程数
    pub fn n_turb(&self) -> usize {
        if self.is_rans() {
            2
        } else {
            0
        }
    }
}

/// 湍流闭合模型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TurbulenceKind {
    /// 无模型（Euler / 层流）
    #[default]
    None,
    /// SST k-ω
    SstKw,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_implicit_theta_zeta() {
        assert_eq!(TimeIntegration::ImplicitEuler.theta(), 1.0);
        assert_eq!(TimeIntegration::ImplicitEuler.zeta(), 0.0);
        assert_eq!(TimeIntegration::Bdf2.zeta(), 0.5);
        assert!(TimeIntegration::Bdf2.needs_nm1());
        assert!(!TimeIntegration::Rk4.is_implicit());
    }

    #[test]
    fn test_ghost_layers_by_reconstruction() {
        assert_eq!(Reconstruction::FirstOrder.required_ghost_layers(), 1);
        assert_eq!(Reconstruction::Muscl.required_ghost_layers(), 2);
        assert_eq!(Reconstruction::WenoZ.required_ghost_layers(), 3);
    }

    #[test]
    fn test_equation_set_flags() {
        assert!(!EquationSet::Euler.is_viscous());
        assert!(EquationSet::Rans.is_viscous());
        assert_eq!(EquationSet::Rans.n_turb(), 2);
        assert_eq!(EquationSet::NavierStokes.n_turb(), 0);
    }

    #[test]
    fn test_serde_camel_case() {
        let flux: FluxFunction = serde_json::from_str("\"rusanov\"").unwrap();
        assert_eq!(flux, FluxFunction::Rusanov);
        let ti: TimeIntegration = serde_json::from_str("\"implicitEuler\"").unwrap();
        assert_eq!(ti, TimeIntegration::ImplicitEuler);
    }
}
