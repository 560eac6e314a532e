// crates/af_physics/src/models/mod.rs

//! 物理模型集合
//!
//! [`PhysicsSet`] 把状态方程、热力学、输运、湍流与化学模型
//! 捆绑为核心消费的单一协作者，并集中原始↔守恒转换与
//! 无量纲化约定：
//!
//! ```text
//! ρ~ = ρ/ρRef   V~ = V/aRef   P~ = P/(ρRef·aRef²)   T~ = T/TRef
//! μ~ = μ/μRef   x~ = x/LRef   t~ = t·aRef/LRef      ω~ = ω·LRef/aRef
//! ```
//!
//! 黏性通量与谱半径中 μ~ 需换算到流动单位：乘 1/Re_ref。

pub mod chemistry;
pub mod eos;
pub mod transport;
pub mod turbulence;

pub use chemistry::{ChemSource, Chemistry, Frozen};
pub use eos::{EquationOfState, IdealGasMix, Thermodynamic};
pub use transport::{Sutherland, Transport};
pub use turbulence::{NoModel, SstKw, TurbSource, TurbulenceModel};

use std::sync::Arc;

use af_config::{Input, TurbulenceKind};
use glam::DVec3;

use crate::vars::{Conserved, Primitive, VarLayout};

/// 物理模型集合
#[derive(Clone)]
pub struct PhysicsSet {
    /// 状态方程
    pub eos: Arc<dyn EquationOfState>,
    /// 热力学
    pub thermo: Arc<dyn Thermodynamic>,
    /// 输运
    pub transport: Arc<dyn Transport>,
    /// 湍流闭合
    pub turbulence: Arc<dyn TurbulenceModel>,
    /// 化学
    pub chemistry: Arc<dyn Chemistry>,
    /// 记录布局
    pub layout: VarLayout,
    /// 1/Re_ref = μRef/(ρRef·aRef·LRef)
    pub inv_reynolds: f64,
}

impl PhysicsSet {
    /// 由输入构造参考模型组
    pub fn from_input(inp: &Input) -> Self {
        let layout = VarLayout::new(inp.n_species(), inp.fluid.equation_set.n_turb());
        let r = &inp.reference;
        let gas_constants: Vec<f64> = inp.fluid.species.iter().map(|s| s.gas_constant).collect();
        let gammas: Vec<f64> = inp.fluid.species.iter().map(|s| s.gamma).collect();
        let gas = Arc::new(IdealGasMix::new(
            &gas_constants,
            &gammas,
            r.temperature,
            r.sound_speed,
        ));
        let re_ref = r.reynolds();
        let turbulence: Arc<dyn TurbulenceModel> = match inp.fluid.turbulence {
            TurbulenceKind::None => Arc::new(NoModel),
            TurbulenceKind::SstKw => Arc::new(SstKw::new(re_ref)),
        };
        Self {
            eos: gas.clone(),
            thermo: gas,
            transport: Arc::new(Sutherland::air(r.temperature)),
            turbulence,
            chemistry: Arc::new(Frozen),
            layout,
            inv_reynolds: 1.0 / re_ref,
        }
    }

    /// μ~（μRef 单位）换算到流动单位
    #[inline]
    pub fn mu_flow(&self, mu: f64) -> f64 {
        mu * self.inv_reynolds
    }

    /// 温度 T~(W)
    pub fn temperature(&self, w: &Primitive) -> f64 {
        self.eos
            .temperature(w.rho(), w.p(), &w.mass_fractions())
    }

    /// 声速 a~(W)
    pub fn sound_speed(&self, w: &Primitive) -> f64 {
        self.eos.sound_speed(w.p(), w.rho(), &w.mass_fractions())
    }

    /// 比总焓 H~ = e + P/ρ + V²/2 + k
    pub fn total_enthalpy(&self, w: &Primitive) -> f64 {
        let mf = w.mass_fractions();
        let t = self.eos.temperature(w.rho(), w.p(), &mf);
        let e = self.thermo.internal_energy(t, &mf);
        e + w.p() / w.rho() + 0.5 * w.velocity().length_squared() + w.tke()
    }

    /// 原始 → 守恒
    pub fn prim_to_cons(&self, w: &Primitive) -> Conserved {
        let layout = w.layout();
        let mf = w.mass_fractions();
        let t = self.eos.temperature(w.rho(), w.p(), &mf);
        let e = self.thermo.internal_energy(t, &mf);
        let rho = w.rho();
        let v = w.velocity();

        let mut u = Conserved::zeros(layout);
        let data = u.data_mut();
        for s in 0..layout.n_species() {
            data[s] = w.rho_species(s);
        }
        data[layout.mx()] = rho * v.x;
        data[layout.my()] = rho * v.y;
        data[layout.mz()] = rho * v.z;
        data[layout.energy()] = rho * (e + 0.5 * v.length_squared() + w.tke());
        if layout.is_rans() {
            data[layout.turb(0)] = rho * w.tke();
            data[layout.turb(1)] = rho * w.sdr();
        }
        u
    }

    /// 守恒 → 原始
    ///
    /// 负组分密度截断为零并按比例归一（幽灵/更新路径约定）。
    pub fn cons_to_prim(&self, u: &Conserved) -> Primitive {
        let layout = u.layout();
        let mut u = u.clone();
        u.clamp_species();
        let rho = u.rho();
        let v = u.momentum() / rho;
        let mf = u.mass_fractions();
        let tke = u.rho_tke() / rho;
        let e = u.rho_e() / rho - 0.5 * v.length_squared() - tke;
        let t = self.thermo.temperature_from_energy(e, &mf);
        let p = self.eos.pressure(rho, t, &mf);

        let mut w = Primitive::zeros(layout);
        let data = w.data_mut();
        for s in 0..layout.n_species() {
            data[s] = u.rho_species(s);
        }
        data[layout.mx()] = v.x;
        data[layout.my()] = v.y;
        data[layout.mz()] = v.z;
        data[layout.energy()] = p;
        if layout.is_rans() {
            data[layout.turb(0)] = tke;
            data[layout.turb(1)] = u.rho_sdr() / rho;
        }
        w
    }

    /// 量纲原始量 → 无量纲记录（初始条件与边界标签数据）
    #[allow(clippy::too_many_arguments)]
    pub fn nondimensionalize(
        &self,
        inp: &Input,
        density: f64,
        velocity: [f64; 3],
        pressure: f64,
        tke: f64,
        sdr: f64,
        mass_fractions: &[f64],
    ) -> Primitive {
        let r = &inp.reference;
        let rho = density / r.rho;
        let a = r.sound_speed;
        let mut mf = vec![0.0; self.layout.n_species()];
        if mass_fractions.is_empty() {
            mf[0] = 1.0;
        } else {
            mf[..mass_fractions.len()].copy_from_slice(mass_fractions);
        }
        let rho_species: Vec<f64> = mf.iter().map(|y| y * rho).collect();
        Primitive::assemble(
            self.layout,
            &rho_species,
            DVec3::new(velocity[0] / a, velocity[1] / a, velocity[2] / a),
            pressure / r.pressure(),
            tke / (a * a),
            sdr * r.length / a,
        )
    }
}
