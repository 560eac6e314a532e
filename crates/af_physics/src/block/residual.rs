// crates/af_physics/src/block/residual.rs

//! 块内残差装配
//!
//! 三个面族共用同一驱动：重构 → 无黏通量 → 残差分配 →
//! 谱半径 → （黏性时）交替控制体 Green-Gauss 面梯度与黏性通量。
//! 面梯度算一次、按 1/6 权重分给两侧单元，单元最终得到六个
//! 面梯度的面积加权平均。源项在梯度（与块间交换）完成后单独
//! 累加。
//!
//! 残差符号约定：`U^{n+1} = U^n − (Δt/V)·R`，通过上侧面的
//! 外流为正，源项以 `R −= S·V` 进入。

use af_config::{Input, Reconstruction, ViscousFaceInterp};
use af_foundation::{AfError, AfResult};
use af_grid::{Axis, BlkMultiArray3d};
use glam::{DMat3, DVec3};
use smallvec::SmallVec;

use super::ProcBlock;
use crate::flux::{
    inviscid_flux, max_wave_speed, muscl_face_state, viscous_flux, viscous_spec_rad,
    weno_face_state, FaceGradients,
};
use crate::models::PhysicsSet;
use crate::spec_rad::SpecRad;
use crate::vars::{Primitive, RecordData};

#[inline]
fn shift(axis: Axis, (i, j, k): (isize, isize, isize), d: isize) -> (isize, isize, isize) {
    match axis {
        Axis::I => (i + d, j, k),
        Axis::J => (i, j + d, k),
        Axis::K => (i, j, k + d),
    }
}

impl ProcBlock {
    /// 清零残差、谱半径与梯度累加器
    pub fn zero_accumulators(&mut self) {
        self.residual.zero();
        self.spec_radius.fill(SpecRad::ZERO);
        self.visc_radius.fill(0.0);
        self.vel_grad.fill(DMat3::ZERO);
        self.temp_grad.fill(DVec3::ZERO);
        self.dens_grad.fill(DVec3::ZERO);
        self.press_grad.fill(DVec3::ZERO);
        self.tke_grad.fill(DVec3::ZERO);
        self.sdr_grad.fill(DVec3::ZERO);
        for grad in &mut self.mf_grad {
            grad.fill(DVec3::ZERO);
        }
    }

    /// 无源项残差装配（无黏 + 黏性 + 谱半径 + 可选隐式对角）
    pub fn calc_residual_no_source(
        &mut self,
        physics: &PhysicsSet,
        inp: &Input,
        mut diag: Option<&mut BlkMultiArray3d>,
    ) -> AfResult<()> {
        self.zero_accumulators();
        for axis in Axis::ALL {
            self.calc_flux_family(axis, physics, inp, diag.as_deref_mut())?;
        }
        Ok(())
    }

    /// 单个面族的通量装配
    fn calc_flux_family(
        &mut self,
        axis: Axis,
        physics: &PhysicsSet,
        inp: &Input,
        mut diag: Option<&mut BlkMultiArray3d>,
    ) -> AfResult<()> {
        let (t1, t2) = axis.transverse();
        let n3 = self.num_along(axis) as isize;
        let n1 = self.num_along(t1) as isize;
        let n2 = self.num_along(t2) as isize;

        for d2 in 0..n2 {
            for d1 in 0..n1 {
                for f in 0..=n3 {
                    // 面索引与两侧单元
                    let fidx = {
                        let mut out = [0isize; 3];
                        out[t1.ord()] = d1;
                        out[t2.ord()] = d2;
                        out[axis.ord()] = f;
                        (out[0], out[1], out[2])
                    };
                    let c0 = shift(axis, fidx, -1);
                    let c1 = fidx;
                    let lower_physical = f > 0;
                    let upper_physical = f < n3;

                    let area = self.face_area(axis, fidx.0, fidx.1, fidx.2);
                    let normal = area.unit;

                    // 重构
                    let (wl, wr) = self.face_states(axis, fidx, inp)?;
                    if !wl.is_physical() || !wr.is_physical() {
                        return Err(AfError::reconstruction(format!(
                            "块 {} {:?} 族面 ({}, {}, {}) 界面状态非物理: ρL={:e} PL={:e} ρR={:e} PR={:e}",
                            self.id.parent,
                            axis,
                            fidx.0,
                            fidx.1,
                            fidx.2,
                            wl.rho(),
                            wl.p(),
                            wr.rho(),
                            wr.p()
                        )));
                    }

                    // 无黏通量
                    let flux = inviscid_flux(inp.schemes.inviscid_flux, &wl, &wr, normal, physics);
                    let lambda_face = max_wave_speed(&wl, &wr, normal, physics) * area.mag;
                    let turb_lambda = 0.5
                        * (wl.velocity().dot(normal).abs() + wr.velocity().dot(normal).abs())
                        * area.mag;

                    let scaled: RecordData = flux.iter().map(|v| v * area.mag).collect();
                    if lower_physical {
                        self.residual.add_to_record(c0.0, c0.1, c0.2, &scaled);
                        *self.spec_radius.get_mut(c0.0, c0.1, c0.2) += SpecRad::new(
                            0.5 * lambda_face,
                            if self.is_rans { turb_lambda } else { 0.0 },
                        );
                    }
                    if upper_physical {
                        self.residual
                            .subtract_from_record(c1.0, c1.1, c1.2, &scaled);
                        *self.spec_radius.get_mut(c1.0, c1.1, c1.2) += SpecRad::new(
                            0.5 * lambda_face,
                            if self.is_rans { turb_lambda } else { 0.0 },
                        );
                    }

                    // 隐式主对角：Rusanov 形式 0.5·λ·A
                    if let Some(d) = diag.as_deref_mut() {
                        let add = 0.5 * lambda_face;
                        if lower_physical {
                            for v in d.record_mut(c0.0, c0.1, c0.2) {
                                *v += add;
                            }
                        }
                        if upper_physical {
                            for v in d.record_mut(c1.0, c1.1, c1.2) {
                                *v += add;
                            }
                        }
                    }

                    // 黏性
                    if self.is_viscous {
                        self.calc_viscous_face(
                            axis,
                            fidx,
                            c0,
                            c1,
                            lower_physical,
                            upper_physical,
                            physics,
                            inp,
                            diag.as_deref_mut(),
                        )?;
                    }
                }
            }
        }
        Ok(())
    }

    /// 界面左右状态
    fn face_states(
        &self,
        axis: Axis,
        fidx: (isize, isize, isize),
        inp: &Input,
    ) -> AfResult<(Primitive, Primitive)> {
        let layout = self.layout;
        let cell = |d: isize| {
            let c = shift(axis, fidx, d);
            self.state.record(c.0, c.1, c.2)
        };
        let width = |d: isize| {
            let c = shift(axis, fidx, d);
            *self.cell_width[axis.ord()].get(c.0, c.1, c.2)
        };
        match inp.schemes.reconstruction {
            Reconstruction::FirstOrder => Ok((
                Primitive::from_slice(layout, cell(-1)),
                Primitive::from_slice(layout, cell(0)),
            )),
            Reconstruction::Muscl => {
                let left = muscl_face_state(
                    cell(-2),
                    cell(-1),
                    cell(0),
                    (width(-2), width(-1), width(0)),
                    inp.schemes.kappa,
                    inp.schemes.limiter,
                    true,
                );
                let right = muscl_face_state(
                    cell(-1),
                    cell(0),
                    cell(1),
                    (width(-1), width(0), width(1)),
                    inp.schemes.kappa,
                    inp.schemes.limiter,
                    false,
                );
                Ok((
                    Primitive::from_slice(layout, &left),
                    Primitive::from_slice(layout, &right),
                ))
            }
            Reconstruction::Weno | Reconstruction::WenoZ => {
                let z = inp.schemes.reconstruction == Reconstruction::WenoZ;
                let left = weno_face_state([cell(-3), cell(-2), cell(-1), cell(0), cell(1)], z);
                let right = weno_face_state([cell(2), cell(1), cell(0), cell(-1), cell(-2)], z);
                Ok((
                    Primitive::from_slice(layout, &left),
                    Primitive::from_slice(layout, &right),
                ))
            }
        }
    }

    /// 黏性面：交替控制体梯度 + 黏性通量 + TSL 谱半径
    #[allow(clippy::too_many_arguments)]
    fn calc_viscous_face(
        &mut self,
        axis: Axis,
        fidx: (isize, isize, isize),
        c0: (isize, isize, isize),
        c1: (isize, isize, isize),
        lower_physical: bool,
        upper_physical: bool,
        physics: &PhysicsSet,
        inp: &Input,
        diag: Option<&mut BlkMultiArray3d>,
    ) -> AfResult<()> {
        let grads = self.face_gradients(axis, fidx, physics);
        let w_face = self.viscous_face_state(axis, fidx, inp.schemes.viscous_face);
        let area = self.face_area(axis, fidx.0, fidx.1, fidx.2);
        let normal = area.unit;

        let avg = |arr: &af_grid::MultiArray3d<f64>| {
            0.5 * (*arr.get(c0.0, c0.1, c0.2) + *arr.get(c1.0, c1.1, c1.2))
        };
        let mu = avg(&self.viscosity);
        let mu_t = avg(&self.eddy_visc);
        let f1 = avg(&self.f1);

        let fv = viscous_flux(&w_face, &grads, normal, mu, mu_t, f1, physics);
        let scaled: RecordData = fv.iter().map(|v| v * area.mag).collect();

        let vol_face = 0.5
            * (*self.vol.get(c0.0, c0.1, c0.2) + *self.vol.get(c1.0, c1.1, c1.2));
        let lam_v = viscous_spec_rad(&w_face, mu, mu_t, area.mag, vol_face, physics);

        if lower_physical {
            self.residual
                .subtract_from_record(c0.0, c0.1, c0.2, &scaled);
            *self.visc_radius.get_mut(c0.0, c0.1, c0.2) += 0.5 * lam_v * vol_face
                / *self.vol.get(c0.0, c0.1, c0.2);
            self.accumulate_cell_gradient(c0, &grads);
        }
        if upper_physical {
            self.residual.add_to_record(c1.0, c1.1, c1.2, &scaled);
            *self.visc_radius.get_mut(c1.0, c1.1, c1.2) += 0.5 * lam_v * vol_face
                / *self.vol.get(c1.0, c1.1, c1.2);
            self.accumulate_cell_gradient(c1, &grads);
        }

        // 隐式对角：近似 TSL 项
        if let Some(d) = diag {
            let add = 0.5 * lam_v;
            if lower_physical {
                for v in d.record_mut(c0.0, c0.1, c0.2) {
                    *v += add;
                }
            }
            if upper_physical {
                for v in d.record_mut(c1.0, c1.1, c1.2) {
                    *v += add;
                }
            }
        }
        Ok(())
    }

    /// 面梯度按 1/6 权重分给单元
    fn accumulate_cell_gradient(&mut self, c: (isize, isize, isize), g: &FaceGradients) {
        const W: f64 = 1.0 / 6.0;
        *self.vel_grad.get_mut(c.0, c.1, c.2) =
            *self.vel_grad.get(c.0, c.1, c.2) + g.velocity * W;
        *self.temp_grad.get_mut(c.0, c.1, c.2) += g.temperature * W;
        *self.dens_grad.get_mut(c.0, c.1, c.2) += g.density * W;
        *self.press_grad.get_mut(c.0, c.1, c.2) += g.pressure * W;
        *self.tke_grad.get_mut(c.0, c.1, c.2) += g.tke * W;
        *self.sdr_grad.get_mut(c.0, c.1, c.2) += g.sdr * W;
        for (s, grad) in self.mf_grad.iter_mut().enumerate() {
            *grad.get_mut(c.0, c.1, c.2) += g.mass_fractions[s] * W;
        }
    }

    /// 黏性面状态（两点/四点中心）
    fn viscous_face_state(
        &self,
        axis: Axis,
        fidx: (isize, isize, isize),
        interp: ViscousFaceInterp,
    ) -> Primitive {
        let layout = self.layout;
        let cell = |d: isize| {
            let c = shift(axis, fidx, d);
            self.state.record(c.0, c.1, c.2)
        };
        let n = layout.n_eqns();
        let mut out = RecordData::with_capacity(n);
        match interp {
            ViscousFaceInterp::Central => {
                let (a, b) = (cell(-1), cell(0));
                for e in 0..n {
                    out.push(0.5 * (a[e] + b[e]));
                }
            }
            ViscousFaceInterp::CentralFourth => {
                let (m2, m1, p1, p2) = (cell(-2), cell(-1), cell(0), cell(1));
                for e in 0..n {
                    out.push((-m2[e] + 9.0 * m1[e] + 9.0 * p1[e] - p2[e]) / 16.0);
                }
            }
        }
        Primitive::from_slice(layout, &out)
    }

    /// 交替控制体 Green-Gauss 面梯度（10 单元模板）
    ///
    /// 控制体取跨面的中心-中心板：体积 = 两单元体积之和的一半；
    /// 法向两端用两单元的外侧面向量、取单元中心值；
    /// 四个侧向面用两单元侧面向量的平均、取四个棱邻单元均值。
    pub(crate) fn face_gradients(
        &self,
        axis: Axis,
        fidx: (isize, isize, isize),
        physics: &PhysicsSet,
    ) -> FaceGradients {
        let ns = self.layout.n_species();
        let c0 = shift(axis, fidx, -1);
        let c1 = fidx;
        let vol_cv = 0.5
            * (*self.vol.get(c0.0, c0.1, c0.2) + *self.vol.get(c1.0, c1.1, c1.2));

        let mut g = FaceGradients::zeros(ns);
        let mut add_face = |area_out: DVec3, vals: &FaceVals| {
            // 列 j = ∇u_j 的累加：外法向面积 ⊗ 标量
            let cols = [
                g.velocity.col(0) + area_out * vals.v.x,
                g.velocity.col(1) + area_out * vals.v.y,
                g.velocity.col(2) + area_out * vals.v.z,
            ];
            g.velocity = DMat3::from_cols(cols[0], cols[1], cols[2]);
            g.temperature += area_out * vals.t;
            g.density += area_out * vals.rho;
            g.pressure += area_out * vals.p;
            g.tke += area_out * vals.tke;
            g.sdr += area_out * vals.sdr;
            for s in 0..ns {
                g.mass_fractions[s] += area_out * vals.mf[s];
            }
        };

        // 法向两端
        let f_low = shift(axis, fidx, -1);
        let f_high = shift(axis, fidx, 1);
        let a_low = self.face_area(axis, f_low.0, f_low.1, f_low.2).vector();
        let a_high = self.face_area(axis, f_high.0, f_high.1, f_high.2).vector();
        add_face(-a_low, &self.cell_vals(c0, physics));
        add_face(a_high, &self.cell_vals(c1, physics));

        // 侧向四面
        let (t1, t2) = axis.transverse();
        for ta in [t1, t2] {
            for side in 0..2isize {
                // side 0 = 低侧，1 = 高侧
                let off = side; // 面索引偏移
                let fa0 = {
                    let c = shift(ta, c0, off);
                    self.farea[ta.ord()].get(c.0, c.1, c.2).vector()
                };
                let fa1 = {
                    let c = shift(ta, c1, off);
                    self.farea[ta.ord()].get(c.0, c.1, c.2).vector()
                };
                let area = 0.5 * (fa0 + fa1);
                let sign = if side == 0 { -1.0 } else { 1.0 };
                let d = if side == 0 { -1 } else { 1 };
                let vals = FaceVals::average(&[
                    self.cell_vals(c0, physics),
                    self.cell_vals(c1, physics),
                    self.cell_vals(shift(ta, c0, d), physics),
                    self.cell_vals(shift(ta, c1, d), physics),
                ]);
                add_face(area * sign, &vals);
            }
        }

        // 除以控制体体积
        let inv_v = 1.0 / vol_cv;
        g.velocity = g.velocity * inv_v;
        g.temperature *= inv_v;
        g.density *= inv_v;
        g.pressure *= inv_v;
        g.tke *= inv_v;
        g.sdr *= inv_v;
        for s in 0..ns {
            g.mass_fractions[s] *= inv_v;
        }
        g
    }

    fn cell_vals(&self, c: (isize, isize, isize), _physics: &PhysicsSet) -> FaceVals {
        let w = Primitive::from_slice(self.layout, self.state.record(c.0, c.1, c.2));
        FaceVals {
            v: w.velocity(),
            t: *self.temperature.get(c.0, c.1, c.2),
            rho: w.rho(),
            p: w.p(),
            tke: w.tke(),
            sdr: w.sdr(),
            mf: w.mass_fractions(),
        }
    }

    /// 湍流派生量更新（混合函数 + 限制后的涡黏）——梯度就绪后调用
    pub fn update_turbulence_quantities(&mut self, physics: &PhysicsSet) {
        if !self.is_rans {
            return;
        }
        for (i, j, k) in self.range_physical().iter() {
            let w = self.primitive(i, j, k);
            let mu = *self.viscosity.get(i, j, k);
            let cd = physics.turbulence.cross_diffusion(
                &w,
                *self.tke_grad.get(i, j, k),
                *self.sdr_grad.get(i, j, k),
            );
            let dist = *self.wall_dist.get(i, j, k);
            let (f1, f2) = physics.turbulence.blending(&w, mu, dist, cd);
            *self.f1.get_mut(i, j, k) = f1;
            *self.f2.get_mut(i, j, k) = f2;
            *self.eddy_visc.get_mut(i, j, k) =
                physics
                    .turbulence
                    .eddy_viscosity(&w, self.vel_grad.get(i, j, k), f2);
        }
    }

    /// 源项累加（湍流 + 化学），谱半径移入 LHS
    pub fn calc_source_terms(
        &mut self,
        physics: &PhysicsSet,
        mut diag: Option<&mut BlkMultiArray3d>,
    ) {
        if !self.is_rans && !self.reacting {
            return;
        }
        let layout = self.layout;
        for (i, j, k) in self.range_physical().iter() {
            let w = self.primitive(i, j, k);
            let vol = self.volume(i, j, k);

            if self.is_rans {
                let src = physics.turbulence.source(
                    &w,
                    self.vel_grad.get(i, j, k),
                    *self.tke_grad.get(i, j, k),
                    *self.sdr_grad.get(i, j, k),
                    *self.viscosity.get(i, j, k),
                    *self.eddy_visc.get(i, j, k),
                    *self.f1.get(i, j, k),
                );
                let rec = self.residual.record_mut(i, j, k);
                rec[layout.turb(0)] -= src.src[0] * vol;
                rec[layout.turb(1)] -= src.src[1] * vol;
                // 源项谱半径进入 LHS；jac_diag 按构造非负，
                // 强失稳源不会削减对角
                self.spec_radius.get_mut(i, j, k).turb += src.spec_rad * vol;
                if let Some(d) = diag.as_deref_mut() {
                    let drec = d.record_mut(i, j, k);
                    drec[layout.turb(0)] += src.jac_diag[0] * vol;
                    drec[layout.turb(1)] += src.jac_diag[1] * vol;
                }
            }

            if self.reacting {
                let t = *self.temperature.get(i, j, k);
                let src = physics.chemistry.source(&w, t);
                let rec = self.residual.record_mut(i, j, k);
                for s in 0..layout.n_species() {
                    rec[s] -= src.src[s] * vol;
                }
                self.spec_radius.get_mut(i, j, k).flow += src.spec_rad * vol;
                if let Some(d) = diag.as_deref_mut() {
                    let drec = d.record_mut(i, j, k);
                    for s in 0..layout.n_species() {
                        drec[s] += src.jac_diag[s] * vol;
                    }
                }
            }
        }
    }
}

/// 控制体面上的标量集合
struct FaceVals {
    v: DVec3,
    t: f64,
    rho: f64,
    p: f64,
    tke: f64,
    sdr: f64,
    mf: SmallVec<[f64; 4]>,
}

impl FaceVals {
    fn average(vals: &[FaceVals]) -> FaceVals {
        let n = vals.len() as f64;
        let ns = vals[0].mf.len();
        let mut mf: SmallVec<[f64; 4]> = smallvec::smallvec![0.0; ns];
        for v in vals {
            for s in 0..ns {
                mf[s] += v.mf[s] / n;
            }
        }
        FaceVals {
            v: vals.iter().map(|v| v.v).sum::<DVec3>() / n,
            t: vals.iter().map(|v| v.t).sum::<f64>() / n,
            rho: vals.iter().map(|v| v.rho).sum::<f64>() / n,
            p: vals.iter().map(|v| v.p).sum::<f64>() / n,
            tke: vals.iter().map(|v| v.tke).sum::<f64>() / n,
            sdr: vals.iter().map(|v| v.sdr).sum::<f64>() / n,
            mf,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::tests::build_block_with;
    use af_config::EquationSet;

    #[test]
    fn test_uniform_state_zero_residual() {
        // 封闭滑移壁盒 + 均匀静止状态：残差必须为机器零
        let (mut b, inp, phys) = build_block_with((4, 3, 2), EquationSet::Euler);
        b.initialize_states(&inp, &phys).unwrap();
        crate::ghost::assign_ghost_cells(&mut b, &inp, &phys).unwrap();
        b.calc_residual_no_source(&phys, &inp, None).unwrap();
        for (i, j, k) in b.range_physical().iter() {
            for &r in b.residual.record(i, j, k) {
                assert!(r.abs() < 1e-12, "残差非零: {:e} @ ({}, {}, {})", r, i, j, k);
            }
        }
    }

    #[test]
    fn test_spectral_radius_positive() {
        let (mut b, inp, phys) = build_block_with((3, 3, 3), EquationSet::Euler);
        b.initialize_states(&inp, &phys).unwrap();
        crate::ghost::assign_ghost_cells(&mut b, &inp, &phys).unwrap();
        b.calc_residual_no_source(&phys, &inp, None).unwrap();
        // 静止声场：λ = a·ΣA/2 > 0
        for (i, j, k) in b.range_physical().iter() {
            assert!(b.spec_radius(i, j, k).flow > 0.0);
        }
    }

    #[test]
    fn test_linear_velocity_gradient_recovered() {
        // u = x 的线性场：面梯度 Green-Gauss 应精确恢复 ∂u/∂x = 1
        let (mut b, inp, phys) = build_block_with((4, 4, 4), EquationSet::NavierStokes);
        b.initialize_states(&inp, &phys).unwrap();
        let range = b.state.range_all();
        for (i, j, k) in range.iter() {
            let c = b.cell_center(i, j, k);
            let mut w = b.primitive(i, j, k);
            w.set_velocity(glam::DVec3::new(c.x, 0.0, 0.0));
            b.set_primitive(i, j, k, &w);
        }
        let g = b.face_gradients(Axis::I, (2, 2, 2), &phys);
        assert!((g.velocity.col(0).x - 1.0).abs() < 1e-10, "∂u/∂x = {}", g.velocity.col(0).x);
        assert!(g.velocity.col(0).y.abs() < 1e-10);
        // 横向方向的线性场
        let g_j = b.face_gradients(Axis::J, (2, 2, 2), &phys);
        assert!((g_j.velocity.col(0).x - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_reconstruction_failure_detected() {
        let (mut b, mut inp, phys) = build_block_with((3, 2, 2), EquationSet::Euler);
        inp.schemes.reconstruction = Reconstruction::FirstOrder;
        b.initialize_states(&inp, &phys).unwrap();
        crate::ghost::assign_ghost_cells(&mut b, &inp, &phys).unwrap();
        // 人为放入负压力单元
        let mut w = b.primitive(1, 1, 1);
        w.set_p(-0.5);
        b.set_primitive(1, 1, 1, &w);
        let err = b.calc_residual_no_source(&phys, &inp, None).unwrap_err();
        assert!(matches!(err, AfError::Reconstruction { .. }));
    }
}
