// crates/af_physics/src/block/implicit.rs

//! 隐式非对角作用
//!
//! LU-SGS 扫掠中单元从六个邻居收到的非对角贡献：
//! Rusanov 形式的无黏 Jacobian 作用（精确通量差 ± λ·du）
//! 加近似 TSL 黏性项。下/上邻居的符号相反。

use af_config::Input;
use af_grid::FaceArea;

use super::ProcBlock;
use crate::flux::euler_flux;
use crate::models::PhysicsSet;
use crate::vars::{Conserved, Primitive, RecordData};

impl ProcBlock {
    /// 邻居非对角贡献
    ///
    /// `w_nbr`/`du_nbr`：邻居状态与当前解更新；`proj_dist`：
    /// 面心到邻居中心的投影距离；`is_lower`：邻居位于本单元
    /// 下侧（面法向从邻居指向本单元）。
    #[allow(clippy::too_many_arguments)]
    pub fn off_diagonal(
        &self,
        physics: &PhysicsSet,
        _inp: &Input,
        w_nbr: &Primitive,
        du_nbr: &[f64],
        area: FaceArea,
        mu: f64,
        mu_t: f64,
        _f1: f64,
        proj_dist: f64,
        is_lower: bool,
    ) -> RecordData {
        let layout = self.layout;
        let normal = area.unit;

        // 精确通量差 ΔF = F(U + du)·n − F(U)·n
        let u_n = physics.prim_to_cons(w_nbr);
        let mut u_pert = Conserved::from_slice(layout, u_n.data());
        for (e, d) in du_nbr.iter().enumerate() {
            u_pert.data_mut()[e] += d;
        }
        let w_pert = physics.cons_to_prim(&u_pert);
        let f_base = euler_flux(w_nbr, normal, physics);
        let f_pert = if w_pert.is_physical() {
            euler_flux(&w_pert, normal, physics)
        } else {
            f_base.clone()
        };

        // 谱半径：对流 + TSL 黏性
        let lambda_c = w_nbr.velocity().dot(normal).abs() + physics.sound_speed(w_nbr);
        let rho = w_nbr.rho();
        let gamma = physics.eos.gamma(&w_nbr.mass_fractions());
        let tr = physics.transport.as_ref();
        let lambda_v = (4.0 / (3.0 * rho)).max(gamma / rho)
            * (physics.mu_flow(mu) / tr.prandtl() + physics.mu_flow(mu_t) / tr.turb_prandtl())
            / proj_dist.max(1.0e-30);
        let lambda = lambda_c + lambda_v;

        let sign = if is_lower { -1.0 } else { 1.0 };
        (0..layout.n_eqns())
            .map(|e| {
                let df = f_pert[e] - f_base[e];
                sign * 0.5 * area.mag * (df - sign * lambda * du_nbr[e])
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::tests::build_block_with;
    use af_config::EquationSet;
    use glam::DVec3;

    #[test]
    fn test_zero_du_zero_contribution() {
        let (b, inp, phys) = build_block_with((2, 2, 2), EquationSet::Euler);
        let w = Primitive::assemble(phys.layout, &[1.0], DVec3::new(0.2, 0.0, 0.0), 0.7, 0.0, 0.0);
        let du = vec![0.0; phys.layout.n_eqns()];
        let area = FaceArea::from_vector(DVec3::X * 0.1);
        let c = b.off_diagonal(&phys, &inp, &w, &du, area, 0.0, 0.0, 0.0, 0.1, true);
        assert!(c.iter().all(|v| v.abs() < 1e-16));
    }

    #[test]
    fn test_lower_upper_antisymmetry_of_flux_part() {
        // ΔF 部分符号相反，λ·du 部分同号（稳定化）
        let (b, inp, phys) = build_block_with((2, 2, 2), EquationSet::Euler);
        let w = Primitive::assemble(phys.layout, &[1.0], DVec3::new(0.2, 0.0, 0.0), 0.7, 0.0, 0.0);
        let mut du = vec![0.0; phys.layout.n_eqns()];
        du[0] = 1.0e-4;
        let area = FaceArea::from_vector(DVec3::X * 0.1);
        let lo = b.off_diagonal(&phys, &inp, &w, &du, area, 0.0, 0.0, 0.0, 0.1, true);
        let up = b.off_diagonal(&phys, &inp, &w, &du, area, 0.0, 0.0, 0.0, 0.1, false);
        // lo + up = −λ·A·du（通量差相消，耗散项叠加）
        let lambda = w.velocity().x.abs() + phys.sound_speed(&w);
        let expect = -lambda * 0.1 * du[0];
        assert!(((lo[0] + up[0]) - expect).abs() < 1e-12);
    }

    #[test]
    fn test_viscous_term_increases_magnitude() {
        let (b, inp, phys) = build_block_with((2, 2, 2), EquationSet::NavierStokes);
        let w = Primitive::assemble(phys.layout, &[1.0], DVec3::ZERO, 0.7, 0.0, 0.0);
        let mut du = vec![0.0; phys.layout.n_eqns()];
        du[0] = 1.0e-4;
        let area = FaceArea::from_vector(DVec3::X * 0.1);
        let inviscid = b.off_diagonal(&phys, &inp, &w, &du, area, 0.0, 0.0, 0.0, 0.01, true);
        let viscous = b.off_diagonal(&phys, &inp, &w, &du, area, 1.0, 0.0, 0.0, 0.01, true);
        assert!(viscous[0].abs() > inviscid[0].abs());
    }
}
