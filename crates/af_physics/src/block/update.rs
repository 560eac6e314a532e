// crates/af_physics/src/block/update.rs

//! 状态推进与时间步
//!
//! - 显式欧拉：`U^{n+1} = U^n − (Δt/V)·R`
//! - 低存储 RK4：四级系数 [1/4, 1/3, 1/2, 1]，基态存于 `consvars_n`
//! - 隐式：套用求解器产出的 `du`，组分限零并归一
//!
//! 每个单元更新后把 `R·R` 累进 L₂，并跟踪带定位的 L∞。

use af_config::{Input, TimeIntegration};
use af_foundation::{AfError, AfResult};
use af_grid::BlkMultiArray3d;

use super::ProcBlock;
use crate::models::PhysicsSet;
use crate::vars::{Conserved, ResidNorms};

/// RK4 四级系数
const RK4_COEFFS: [f64; 4] = [0.25, 1.0 / 3.0, 0.5, 1.0];

impl ProcBlock {
    /// 局部/全局时间步
    ///
    /// 全局 Δt 已在输入侧量纲化：Δt~ = Dt·aRef/LRef。
    /// 局部：Δt = CFL·V/λ，黏性谱半径按输入系数加权 (Blazek 6.18)。
    pub fn calc_block_time_step(&mut self, inp: &Input) {
        let r = &inp.reference;
        if inp.time.is_global_dt() {
            let dt_nd = inp.time.dt * r.sound_speed / r.length;
            self.dt.fill(dt_nd);
            return;
        }
        let c_visc = inp.time.viscous_cfl_coeff;
        for (i, j, k) in self.range_physical().iter() {
            let sr = self.spec_radius(i, j, k);
            let lambda = sr.flow
                + if self.is_viscous {
                    c_visc * *self.visc_radius.get(i, j, k)
                } else {
                    0.0
                };
            *self.dt.get_mut(i, j, k) = inp.time.cfl * self.volume(i, j, k) / lambda.max(1.0e-30);
        }
    }

    /// 保存当前守恒状态到时间层 n（推进前调用）
    pub fn save_time_n(&mut self, physics: &PhysicsSet) {
        if self.consvars_n.is_none() {
            return;
        }
        let range = self.range_physical();
        let mut cons = Vec::with_capacity(range.len());
        for (i, j, k) in range.iter() {
            cons.push(physics.prim_to_cons(&self.primitive(i, j, k)));
        }
        let arr = self.consvars_n.as_mut().expect("已判空");
        for ((i, j, k), u) in range.iter().zip(cons) {
            arr.set_record(i, j, k, u.data());
        }
    }

    /// 时间层轮换 n → n−1（最后一个非线性迭代末尾调用）
    pub fn rotate_time_levels(&mut self) {
        if let (Some(n), Some(nm1)) = (&self.consvars_n, &mut self.consvars_nm1) {
            *nm1 = n.clone();
        }
    }

    /// 推进一个显式/隐式步
    ///
    /// `du`：隐式解更新（`Some` 时走隐式路径）。
    /// `stage`：RK4 的级号（0..4）；欧拉与隐式传 0。
    pub fn update_block(
        &mut self,
        inp: &Input,
        physics: &PhysicsSet,
        du: Option<&BlkMultiArray3d>,
        stage: usize,
        norms: &mut ResidNorms,
    ) -> AfResult<()> {
        match (inp.time.integration, du) {
            (TimeIntegration::ExplicitEuler, None) => self.explicit_euler_update(physics, norms),
            (TimeIntegration::Rk4, None) => self.rk4_stage_update(physics, stage, norms),
            (_, Some(du)) => self.implicit_update(physics, du, norms),
            (ti, None) => Err(AfError::internal(format!(
                "时间格式 {:?} 需要隐式解更新",
                ti
            ))),
        }
    }

    fn explicit_euler_update(
        &mut self,
        physics: &PhysicsSet,
        norms: &mut ResidNorms,
    ) -> AfResult<()> {
        for (i, j, k) in self.range_physical().iter() {
            let w = self.primitive(i, j, k);
            let mut u = physics.prim_to_cons(&w);
            let scale = self.time_step(i, j, k) / self.volume(i, j, k);
            let resid = self.residual.record(i, j, k).to_vec();
            for (e, r) in resid.iter().enumerate() {
                u.data_mut()[e] -= scale * r;
            }
            self.finish_cell_update(physics, u, i, j, k)?;
            norms.accumulate(&resid, self.id.parent, (i, j, k));
        }
        Ok(())
    }

    fn rk4_stage_update(
        &mut self,
        physics: &PhysicsSet,
        stage: usize,
        norms: &mut ResidNorms,
    ) -> AfResult<()> {
        let alpha = RK4_COEFFS[stage.min(3)];
        for (i, j, k) in self.range_physical().iter() {
            let base = {
                let arr = self
                    .consvars_n
                    .as_ref()
                    .ok_or_else(|| AfError::internal("RK4 缺少时间层 n"))?;
                Conserved::from_slice(self.layout, arr.record(i, j, k))
            };
            let scale = alpha * self.time_step(i, j, k) / self.volume(i, j, k);
            let resid = self.residual.record(i, j, k).to_vec();
            let mut u = base;
            for (e, r) in resid.iter().enumerate() {
                u.data_mut()[e] -= scale * r;
            }
            self.finish_cell_update(physics, u, i, j, k)?;
            if stage == 3 {
                norms.accumulate(&resid, self.id.parent, (i, j, k));
            }
        }
        Ok(())
    }

    fn implicit_update(
        &mut self,
        physics: &PhysicsSet,
        du: &BlkMultiArray3d,
        norms: &mut ResidNorms,
    ) -> AfResult<()> {
        for (i, j, k) in self.range_physical().iter() {
            let w = self.primitive(i, j, k);
            let mut u = physics.prim_to_cons(&w);
            let delta = du.record(i, j, k);
            for (e, d) in delta.iter().enumerate() {
                u.data_mut()[e] += d;
            }
            self.finish_cell_update(physics, u, i, j, k)?;
            let resid = self.residual.record(i, j, k).to_vec();
            norms.accumulate(&resid, self.id.parent, (i, j, k));
        }
        Ok(())
    }

    /// 守恒 → 原始并写回；非物理立即致命
    fn finish_cell_update(
        &mut self,
        physics: &PhysicsSet,
        u: Conserved,
        i: isize,
        j: isize,
        k: isize,
    ) -> AfResult<()> {
        let w = physics.cons_to_prim(&u);
        if !w.is_physical() {
            return Err(AfError::nonphysical(
                format!("更新后 ρ={:e} P={:e}", w.rho(), w.p()),
                self.id.parent,
                (i, j, k),
            ));
        }
        self.set_primitive(i, j, k, &w);
        Ok(())
    }

    // ---- Beam-Warming 多层时间项 ----

    /// LHS 对角时间项 (1 + ζ)·V/(Δt·θ)
    pub fn time_term_diagonal(&self, inp: &Input, i: isize, j: isize, k: isize) -> f64 {
        let theta = inp.time.integration.theta();
        let zeta = inp.time.integration.zeta();
        (1.0 + zeta) * self.volume(i, j, k) / (self.time_step(i, j, k) * theta.max(1.0e-30))
    }

    /// RHS 多层项 ζ·V/(Δt·θ)·(Uⁿ − Uⁿ⁻¹)
    pub fn sol_delta_nm1(&self, inp: &Input, i: isize, j: isize, k: isize) -> Vec<f64> {
        let zeta = inp.time.integration.zeta();
        let m = self.layout.n_eqns();
        if zeta == 0.0 {
            return vec![0.0; m];
        }
        let (Some(un), Some(unm1)) = (&self.consvars_n, &self.consvars_nm1) else {
            return vec![0.0; m];
        };
        let theta = inp.time.integration.theta();
        let factor = zeta * self.volume(i, j, k) / (self.time_step(i, j, k) * theta);
        un.record(i, j, k)
            .iter()
            .zip(unm1.record(i, j, k))
            .map(|(a, b)| factor * (a - b))
            .collect()
    }

    /// RHS 当前解与时间层 n 的差 V/(Δt·θ)·(Uᵐ − Uⁿ)
    pub fn sol_delta_mmn(
        &self,
        inp: &Input,
        physics: &PhysicsSet,
        i: isize,
        j: isize,
        k: isize,
    ) -> Vec<f64> {
        let m = self.layout.n_eqns();
        let Some(un) = &self.consvars_n else {
            return vec![0.0; m];
        };
        let theta = inp.time.integration.theta();
        let factor = self.volume(i, j, k) / (self.time_step(i, j, k) * theta);
        let u_m = physics.prim_to_cons(&self.primitive(i, j, k));
        u_m.data()
            .iter()
            .zip(un.record(i, j, k))
            .map(|(a, b)| factor * (a - b))
            .collect()
    }
}
