// crates/af_physics/src/models/transport.rs

//! 输运模型契约
//!
//! 黏性以 μRef 为单位返回（与重启文件约定一致）；换算到
//! 流动单位（ρRef·aRef·LRef）时乘 1/Re_ref，由
//! [`crate::models::PhysicsSet::mu_flow`] 统一完成。

/// 输运模型契约
pub trait Transport: Send + Sync {
    /// 层流黏性 μ~(T~)（μRef 单位）
    fn viscosity(&self, temperature: f64, mf: &[f64]) -> f64;

    /// 层流 Prandtl 数
    fn prandtl(&self) -> f64;

    /// 湍流 Prandtl 数
    fn turb_prandtl(&self) -> f64;

    /// 层流 Schmidt 数（组分扩散）
    fn schmidt(&self) -> f64;

    /// 湍流 Schmidt 数
    fn turb_schmidt(&self) -> f64;
}

/// Sutherland 黏性律
#[derive(Debug, Clone)]
pub struct Sutherland {
    /// 无量纲 Sutherland 常数 S/TRef
    s: f64,
    /// 将 μ(TRef) 归一到 μRef 的系数
    scale: f64,
    pr: f64,
    pr_t: f64,
    sc: f64,
    sc_t: f64,
}

impl Sutherland {
    /// 空气的 Sutherland 常数 [K]
    pub const S_AIR: f64 = 110.4;

    /// 构造：`mu_t_ref` 是 μ(TRef) 的量纲值，`mu_ref` 是参考黏性
    pub fn new(t_ref: f64, mu_t_ref: f64, mu_ref: f64) -> Self {
        Self {
            s: Self::S_AIR / t_ref,
            scale: mu_t_ref / mu_ref,
            pr: 0.72,
            pr_t: 0.9,
            sc: 0.7,
            sc_t: 0.9,
        }
    }

    /// 空气的默认构造（μ(TRef) = μRef）
    pub fn air(t_ref: f64) -> Self {
        Self::new(t_ref, 1.0, 1.0)
    }
}

impl Transport for Sutherland {
    fn viscosity(&self, temperature: f64, _mf: &[f64]) -> f64 {
        let t = temperature.max(1.0e-8);
        self.scale * t.powf(1.5) * (1.0 + self.s) / (t + self.s)
    }

    fn prandtl(&self) -> f64 {
        self.pr
    }

    fn turb_prandtl(&self) -> f64 {
        self.pr_t
    }

    fn schmidt(&self) -> f64 {
        self.sc
    }

    fn turb_schmidt(&self) -> f64 {
        self.sc_t
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_temperature_viscosity_unity() {
        let tr = Sutherland::air(288.15);
        assert!((tr.viscosity(1.0, &[1.0]) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_viscosity_increases_with_temperature() {
        let tr = Sutherland::air(288.15);
        assert!(tr.viscosity(2.0, &[1.0]) > tr.viscosity(1.0, &[1.0]));
        assert!(tr.viscosity(0.5, &[1.0]) < 1.0);
    }
}
