// crates/af_physics/src/flux/viscous.rs

//! 黏性通量
//!
//! 由面梯度与面状态组装全黏性算子：应力张量、层流/湍流热传导、
//! 组分扩散（含组分焓输运）与湍流量扩散。薄剪切层（TSL）谱半径
//! 作为隐式对角与黏性时间步限制的来源。
//!
//! 速度梯度张量约定：列 j 为速度分量 u_j 的梯度，
//! 即 `grad.col(j)[i] = ∂u_j/∂x_i`。

use glam::{DMat3, DVec3};
use smallvec::SmallVec;

use crate::models::PhysicsSet;
use crate::vars::{Primitive, RecordData};

/// 面梯度集合
#[derive(Debug, Clone)]
pub struct FaceGradients {
    /// 速度梯度张量
    pub velocity: DMat3,
    /// 温度梯度
    pub temperature: DVec3,
    /// 密度梯度
    pub density: DVec3,
    /// 压力梯度
    pub pressure: DVec3,
    /// 湍动能梯度
    pub tke: DVec3,
    /// 比耗散率梯度
    pub sdr: DVec3,
    /// 组分质量分数梯度
    pub mass_fractions: SmallVec<[DVec3; 4]>,
}

impl FaceGradients {
    /// 全零
    pub fn zeros(n_species: usize) -> Self {
        Self {
            velocity: DMat3::ZERO,
            temperature: DVec3::ZERO,
            density: DVec3::ZERO,
            pressure: DVec3::ZERO,
            tke: DVec3::ZERO,
            sdr: DVec3::ZERO,
            mass_fractions: smallvec::smallvec![DVec3::ZERO; n_species],
        }
    }
}

/// 黏性应力张量 τ = μ_eff (∇u + ∇uᵀ − 2/3 (∇·u) I)
fn stress_tensor(vel_grad: &DMat3, mu_eff: f64) -> DMat3 {
    let div = vel_grad.col(0)[0] + vel_grad.col(1)[1] + vel_grad.col(2)[2];
    let mut tau = [[0.0; 3]; 3];
    for i in 0..3 {
        for j in 0..3 {
            // ∂u_i/∂x_j = col(i)[j]
            let sym = vel_grad.col(i)[j] + vel_grad.col(j)[i];
            tau[i][j] = mu_eff * (sym - if i == j { 2.0 / 3.0 * div } else { 0.0 });
        }
    }
    DMat3::from_cols(
        DVec3::new(tau[0][0], tau[1][0], tau[2][0]),
        DVec3::new(tau[0][1], tau[1][1], tau[2][1]),
        DVec3::new(tau[0][2], tau[1][2], tau[2][2]),
    )
}

/// 黏性通量 F_v·n（流动单位，含 1/Re 因子）
///
/// `mu`、`mu_t` 以 μRef 为单位。
#[allow(clippy::too_many_arguments)]
pub fn viscous_flux(
    w_face: &Primitive,
    grads: &FaceGradients,
    normal: DVec3,
    mu: f64,
    mu_t: f64,
    f1: f64,
    phys: &PhysicsSet,
) -> RecordData {
    let layout = w_face.layout();
    let tr = phys.transport.as_ref();
    let mu_l = phys.mu_flow(mu);
    let mu_turb = phys.mu_flow(mu_t);
    let mu_eff = mu_l + mu_turb;

    let tau = stress_tensor(&grads.velocity, mu_eff);
    // τ·n（τ 行 i 点乘 n）
    let tau_n = DVec3::new(
        tau.col(0)[0] * normal.x + tau.col(1)[0] * normal.y + tau.col(2)[0] * normal.z,
        tau.col(0)[1] * normal.x + tau.col(1)[1] * normal.y + tau.col(2)[1] * normal.z,
        tau.col(0)[2] * normal.x + tau.col(1)[2] * normal.y + tau.col(2)[2] * normal.z,
    );

    let mf = w_face.mass_fractions();
    let t_face = phys.temperature(w_face);
    let cp = phys.thermo.cp(t_face, &mf);
    let conductivity = cp * (mu_l / tr.prandtl() + mu_turb / tr.turb_prandtl());
    let rho_d = mu_l / tr.schmidt() + mu_turb / tr.turb_schmidt();

    let mut f: RecordData = smallvec::smallvec![0.0; layout.n_eqns()];
    // 组分扩散 + 组分焓输运
    let mut enthalpy_diffusion = 0.0;
    if layout.n_species() > 1 {
        for s in 0..layout.n_species() {
            let j_s = rho_d * grads.mass_fractions[s].dot(normal);
            f[s] = j_s;
            let mut one_hot = vec![0.0; layout.n_species()];
            one_hot[s] = 1.0;
            let h_s = phys.thermo.cp(t_face, &one_hot) * t_face;
            enthalpy_diffusion += h_s * j_s;
        }
    }
    // 动量
    f[layout.mx()] = tau_n.x;
    f[layout.my()] = tau_n.y;
    f[layout.mz()] = tau_n.z;
    // 能量：黏性耗散 + 热传导 + 组分焓扩散 + 湍动能扩散
    let turb = phys.turbulence.as_ref();
    let k_diff_coeff = mu_l + turb.sigma_k(f1) * mu_turb;
    f[layout.energy()] = tau_n.dot(w_face.velocity())
        + conductivity * grads.temperature.dot(normal)
        + enthalpy_diffusion
        + k_diff_coeff * grads.tke.dot(normal);
    // 湍流量扩散
    if layout.is_rans() {
        f[layout.turb(0)] = k_diff_coeff * grads.tke.dot(normal);
        f[layout.turb(1)] = (mu_l + turb.sigma_w(f1) * mu_turb) * grads.sdr.dot(normal);
    }
    f
}

/// 薄剪切层黏性谱半径 (Blazek 6.19)
pub fn viscous_spec_rad(
    w: &Primitive,
    mu: f64,
    mu_t: f64,
    area: f64,
    vol: f64,
    phys: &PhysicsSet,
) -> f64 {
    let mf = w.mass_fractions();
    let gamma = phys.eos.gamma(&mf);
    let rho = w.rho();
    let tr = phys.transport.as_ref();
    let coeff = (4.0 / (3.0 * rho)).max(gamma / rho);
    let mu_term = phys.mu_flow(mu) / tr.prandtl() + phys.mu_flow(mu_t) / tr.turb_prandtl();
    coeff * mu_term * area * area / vol
}

#[cfg(test)]
mod tests {
    use super::*;
    use af_config::{EquationSet, Input, TurbulenceKind};
    use glam::DVec3;

    fn physics() -> PhysicsSet {
        let mut inp = Input::default();
        inp.fluid.equation_set = EquationSet::NavierStokes;
        PhysicsSet::from_input(&inp)
    }

    fn rans_physics() -> PhysicsSet {
        let mut inp = Input::default();
        inp.fluid.equation_set = EquationSet::Rans;
        inp.fluid.turbulence = TurbulenceKind::SstKw;
        PhysicsSet::from_input(&inp)
    }

    #[test]
    fn test_zero_gradient_zero_flux() {
        let phys = physics();
        let w = Primitive::assemble(phys.layout, &[1.0], DVec3::ZERO, 0.7, 0.0, 0.0);
        let f = viscous_flux(
            &w,
            &FaceGradients::zeros(1),
            DVec3::X,
            1.0,
            0.0,
            0.0,
            &phys,
        );
        assert!(f.iter().all(|v| v.abs() < 1e-16));
    }

    #[test]
    fn test_pure_shear_stress() {
        let phys = physics();
        let w = Primitive::assemble(phys.layout, &[1.0], DVec3::ZERO, 0.7, 0.0, 0.0);
        // ∂u/∂y = 1：列 0（u 分量梯度）= (0, 1, 0)
        let mut g = FaceGradients::zeros(1);
        g.velocity = DMat3::from_cols(DVec3::new(0.0, 1.0, 0.0), DVec3::ZERO, DVec3::ZERO);
        let f = viscous_flux(&w, &g, DVec3::Y, 1.0, 0.0, 0.0, &phys);
        // τ_xy = μ_flow·1；法向 y → x 动量通量 = τ_xy
        let expect = phys.mu_flow(1.0);
        assert!((f[phys.layout.mx()] - expect).abs() < 1e-18);
        // 无剪胀：对角通量为零
        assert!(f[phys.layout.my()].abs() < 1e-18);
    }

    #[test]
    fn test_heat_conduction_direction() {
        let phys = physics();
        let w = Primitive::assemble(phys.layout, &[1.0], DVec3::ZERO, 0.7, 0.0, 0.0);
        let mut g = FaceGradients::zeros(1);
        g.temperature = DVec3::new(2.0, 0.0, 0.0);
        let f = viscous_flux(&w, &g, DVec3::X, 1.0, 0.0, 0.0, &phys);
        // 能量通量与 ∇T·n 同号
        assert!(f[phys.layout.energy()] > 0.0);
    }

    #[test]
    fn test_turbulence_diffusion_terms() {
        let phys = rans_physics();
        let w = Primitive::assemble(
            phys.layout,
            &[1.0],
            DVec3::ZERO,
            0.7,
            1.0e-4,
            10.0,
        );
        let mut g = FaceGradients::zeros(1);
        g.tke = DVec3::new(1.0, 0.0, 0.0);
        g.sdr = DVec3::new(-1.0, 0.0, 0.0);
        let f = viscous_flux(&w, &g, DVec3::X, 1.0, 2.0, 0.5, &phys);
        assert!(f[phys.layout.turb(0)] > 0.0);
        assert!(f[phys.layout.turb(1)] < 0.0);
    }

    #[test]
    fn test_viscous_spec_rad_scaling() {
        let phys = physics();
        let w = Primitive::assemble(phys.layout, &[1.0], DVec3::ZERO, 0.7, 0.0, 0.0);
        let base = viscous_spec_rad(&w, 1.0, 0.0, 1.0, 1.0, &phys);
        // 面积翻倍 → 谱半径 ×4；体积翻倍 → 谱半径 ÷2
        assert!((viscous_spec_rad(&w, 1.0, 0.0, 2.0, 1.0, &phys) - 4.0 * base).abs() < 1e-15);
        assert!((viscous_spec_rad(&w, 1.0, 0.0, 1.0, 2.0, &phys) - 0.5 * base).abs() < 1e-15);
    }
}
