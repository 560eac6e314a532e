// crates/af_physics/src/models/turbulence.rs

//! 湍流闭合契约
//!
//! 两方程 RANS 模型的最小接口：涡黏、混合函数 f1/f2、
//! 点隐式源项（含对角 Jacobian 与谱半径）、扩散系数 σ 与
//! 壁面 ω 条件。SST k-ω 是参考实现；Euler/层流用 [`NoModel`]。
//!
//! 单位约定：涡黏与层流黏性同样以 μRef 为单位；公式中
//! μ 与 ρ·k/ω 混合处通过 `re_ref`（= ρRef·aRef·LRef/μRef）换算。

use glam::{DMat3, DVec3};

use crate::vars::Primitive;

/// 湍流源项结果
#[derive(Debug, Clone, Copy, Default)]
pub struct TurbSource {
    /// 单位体积源项 [k 方程, ω 方程]
    pub src: [f64; 2],
    /// 点隐式对角 Jacobian（对 ρk、ρω 的导数，非负）
    pub jac_diag: [f64; 2],
    /// 源项谱半径（移到 LHS 的量）
    pub spec_rad: f64,
}

/// 湍流模型契约
pub trait TurbulenceModel: Send + Sync {
    /// 是否求解湍流方程
    fn is_rans(&self) -> bool;

    /// 未限制涡黏 μt~（μRef 单位）——初始化路径
    fn eddy_viscosity_unlimited(&self, w: &Primitive) -> f64;

    /// 带应变率限制的涡黏 μt~
    fn eddy_viscosity(&self, w: &Primitive, vel_grad: &DMat3, f2: f64) -> f64;

    /// 混合函数 (f1, f2)
    fn blending(&self, w: &Primitive, mu: f64, wall_dist: f64, cross_diff: f64) -> (f64, f64);

    /// 交叉扩散项 CD_kω
    fn cross_diffusion(&self, w: &Primitive, tke_grad: DVec3, sdr_grad: DVec3) -> f64;

    /// 单位体积源项（生成 − 耗散 + 交叉扩散）
    #[allow(clippy::too_many_arguments)]
    fn source(
        &self,
        w: &Primitive,
        vel_grad: &DMat3,
        tke_grad: DVec3,
        sdr_grad: DVec3,
        mu: f64,
        mu_t: f64,
        f1: f64,
    ) -> TurbSource;

    /// k 方程扩散系数 σ_k(f1)
    fn sigma_k(&self, f1: f64) -> f64;

    /// ω 方程扩散系数 σ_ω(f1)
    fn sigma_w(&self, f1: f64) -> f64;

    /// 壁面 ω 条件（第一层网格）
    fn wall_sdr(&self, w: &Primitive, mu: f64, wall_dist: f64) -> f64;

    /// 湍流自由流衰减下限 (k_min, ω_min)
    fn far_field_floor(&self) -> (f64, f64);
}

// ============================================================
// 无模型（Euler / 层流）
// ============================================================

/// 无湍流模型
#[derive(Debug, Clone, Copy, Default)]
pub struct NoModel;

impl TurbulenceModel for NoModel {
    fn is_rans(&self) -> bool {
        false
    }

    fn eddy_viscosity_unlimited(&self, _w: &Primitive) -> f64 {
        0.0
    }

    fn eddy_viscosity(&self, _w: &Primitive, _vel_grad: &DMat3, _f2: f64) -> f64 {
        0.0
    }

    fn blending(&self, _w: &Primitive, _mu: f64, _wall_dist: f64, _cd: f64) -> (f64, f64) {
        (0.0, 0.0)
    }

    fn cross_diffusion(&self, _w: &Primitive, _tg: DVec3, _sg: DVec3) -> f64 {
        0.0
    }

    fn source(
        &self,
        _w: &Primitive,
        _vel_grad: &DMat3,
        _tg: DVec3,
        _sg: DVec3,
        _mu: f64,
        _mu_t: f64,
        _f1: f64,
    ) -> TurbSource {
        TurbSource::default()
    }

    fn sigma_k(&self, _f1: f64) -> f64 {
        0.0
    }

    fn sigma_w(&self, _f1: f64) -> f64 {
        0.0
    }

    fn wall_sdr(&self, _w: &Primitive, _mu: f64, _wall_dist: f64) -> f64 {
        0.0
    }

    fn far_field_floor(&self) -> (f64, f64) {
        (0.0, 0.0)
    }
}

// ============================================================
// SST k-ω
// ============================================================

/// Menter SST k-ω（2003 版常数）
#[derive(Debug, Clone)]
pub struct SstKw {
    /// Re_ref = ρRef·aRef·LRef/μRef，μ 与 ρk/ω 的换算
    re_ref: f64,
}

impl SstKw {
    const BETA_STAR: f64 = 0.09;
    const A1: f64 = 0.31;
    const SIGMA_K1: f64 = 0.85;
    const SIGMA_K2: f64 = 1.0;
    const SIGMA_W1: f64 = 0.5;
    const SIGMA_W2: f64 = 0.856;
    const BETA_1: f64 = 0.075;
    const BETA_2: f64 = 0.0828;
    const KAPPA: f64 = 0.41;

    /// 创建
    pub fn new(re_ref: f64) -> Self {
        Self { re_ref }
    }

    fn gamma_1() -> f64 {
        Self::BETA_1 / Self::BETA_STAR
            - Self::SIGMA_W1 * Self::KAPPA * Self::KAPPA / Self::BETA_STAR.sqrt()
    }

    fn gamma_2() -> f64 {
        Self::BETA_2 / Self::BETA_STAR
            - Self::SIGMA_W2 * Self::KAPPA * Self::KAPPA / Self::BETA_STAR.sqrt()
    }

    fn blend(f1: f64, v1: f64, v2: f64) -> f64 {
        f1 * v1 + (1.0 - f1) * v2
    }

    /// 应变率模 √(2 S:S)
    fn strain_rate(vel_grad: &DMat3) -> f64 {
        let mut ss = 0.0;
        for r in 0..3 {
            for c in 0..3 {
                let s = 0.5 * (vel_grad.col(c)[r] + vel_grad.col(r)[c]);
                ss += s * s;
            }
        }
        (2.0 * ss).sqrt()
    }
}

impl TurbulenceModel for SstKw {
    fn is_rans(&self) -> bool {
        true
    }

    fn eddy_viscosity_unlimited(&self, w: &Primitive) -> f64 {
        let omega = w.sdr().max(1.0e-12);
        self.re_ref * w.rho() * w.tke() / omega
    }

    fn eddy_viscosity(&self, w: &Primitive, vel_grad: &DMat3, f2: f64) -> f64 {
        let s = Self::strain_rate(vel_grad);
        let denom = (Self::A1 * w.sdr()).max(s * f2).max(1.0e-12);
        self.re_ref * w.rho() * Self::A1 * w.tke() / denom
    }

    fn blending(&self, w: &Primitive, mu: f64, wall_dist: f64, cross_diff: f64) -> (f64, f64) {
        let d = wall_dist.max(1.0e-12);
        let rho = w.rho();
        let k = w.tke().max(0.0);
        let omega = w.sdr().max(1.0e-12);
        // 运动黏性换算到流动单位
        let nu = mu / (rho * self.re_ref);

        let arg_a = k.sqrt() / (Self::BETA_STAR * omega * d);
        let arg_b = 500.0 * nu / (d * d * omega);
        let cd = cross_diff.max(1.0e-10);
        let arg_c = 4.0 * rho * Self::SIGMA_W2 * k / (cd * d * d);

        let arg1 = arg_a.max(arg_b).min(arg_c);
        let f1 = (arg1.powi(4)).min(700.0).tanh();
        let arg2 = (2.0 * arg_a).max(arg_b);
        let f2 = (arg2 * arg2).min(700.0).tanh();
        (f1, f2)
    }

    fn cross_diffusion(&self, w: &Primitive, tke_grad: DVec3, sdr_grad: DVec3) -> f64 {
        let omega = w.sdr().max(1.0e-12);
        2.0 * w.rho() * Self::SIGMA_W2 / omega * tke_grad.dot(sdr_grad)
    }

    fn source(
        &self,
        w: &Primitive,
        vel_grad: &DMat3,
        tke_grad: DVec3,
        sdr_grad: DVec3,
        _mu: f64,
        mu_t: f64,
        f1: f64,
    ) -> TurbSource {
        let rho = w.rho();
        let k = w.tke().max(0.0);
        let omega = w.sdr().max(1.0e-12);
        let s = Self::strain_rate(vel_grad);

        // 生成（应变率形式，按 Menter 限制 20·β*·ρ·k·ω）
        let mu_t_flow = mu_t / self.re_ref;
        let prod_k = (mu_t_flow * s * s).min(20.0 * Self::BETA_STAR * rho * k * omega);
        let dest_k = Self::BETA_STAR * rho * k * omega;

        let gamma = Self::blend(f1, Self::gamma_1(), Self::gamma_2());
        let beta = Self::blend(f1, Self::BETA_1, Self::BETA_2);
        let prod_w = if mu_t_flow > 0.0 {
            gamma * rho / mu_t_flow * prod_k
        } else {
            0.0
        };
        let dest_w = beta * rho * omega * omega;
        let cd = (1.0 - f1) * self.cross_diffusion(w, tke_grad, sdr_grad);

        // 点隐式：只保留耗散的对角导数（非负，加到 LHS 稳定）
        let jac_k = Self::BETA_STAR * omega;
        let jac_w = 2.0 * beta * omega;
        TurbSource {
            src: [prod_k - dest_k, prod_w - dest_w + cd],
            jac_diag: [jac_k, jac_w],
            spec_rad: jac_k.max(jac_w),
        }
    }

    fn sigma_k(&self, f1: f64) -> f64 {
        Self::blend(f1, Self::SIGMA_K1, Self::SIGMA_K2)
    }

    fn sigma_w(&self, f1: f64) -> f64 {
        Self::blend(f1, Self::SIGMA_W1, Self::SIGMA_W2)
    }

    fn wall_sdr(&self, w: &Primitive, mu: f64, wall_dist: f64) -> f64 {
        // Menter: ω_wall = 60 ν / (β1 d²)
        let d = wall_dist.max(1.0e-12);
        let nu = mu / (w.rho() * self.re_ref);
        60.0 * nu / (Self::BETA_1 * d * d)
    }

    fn far_field_floor(&self) -> (f64, f64) {
        (1.0e-10, 1.0e-6)
    }
}
