// crates/af_physics/src/models/eos.rs

//! 状态方程与热力学契约
//!
//! 核心只依赖这里的 trait；理想气体混合物与量热完全气体是
//! 测试与 CLI 使用的参考实现。全部量为无量纲：
//! P~ = ρ~·R~·T~，R~ = R·TRef/aRef²，e~ = cv~·T~。

use smallvec::SmallVec;

/// 状态方程契约
pub trait EquationOfState: Send + Sync {
    /// 压力 P~(ρ~, T~, Y)
    fn pressure(&self, rho: f64, temperature: f64, mf: &[f64]) -> f64;

    /// 温度 T~(ρ~, P~, Y)
    fn temperature(&self, rho: f64, pressure: f64, mf: &[f64]) -> f64;

    /// 声速 a~(P~, ρ~, Y)
    fn sound_speed(&self, pressure: f64, rho: f64, mf: &[f64]) -> f64;

    /// 混合气体常数 R~(Y)
    fn gas_constant(&self, mf: &[f64]) -> f64;

    /// 混合比热比 γ(Y)
    fn gamma(&self, mf: &[f64]) -> f64;
}

/// 热力学契约
pub trait Thermodynamic: Send + Sync {
    /// 定压比热 cp~(T~, Y)
    fn cp(&self, temperature: f64, mf: &[f64]) -> f64;

    /// 定容比热 cv~(T~, Y)
    fn cv(&self, temperature: f64, mf: &[f64]) -> f64;

    /// 比内能 e~(T~, Y)
    fn internal_energy(&self, temperature: f64, mf: &[f64]) -> f64;

    /// 由比内能反解温度
    fn temperature_from_energy(&self, energy: f64, mf: &[f64]) -> f64;
}

// ============================================================
// 参考实现：理想气体混合物
// ============================================================

/// 单组分无量纲参数
#[derive(Debug, Clone, Copy)]
pub struct SpeciesGas {
    /// 无量纲气体常数 R·TRef/aRef²
    pub r: f64,
    /// 比热比
    pub gamma: f64,
}

/// 理想气体混合物（质量分数加权）
#[derive(Debug, Clone)]
pub struct IdealGasMix {
    species: SmallVec<[SpeciesGas; 4]>,
}

impl IdealGasMix {
    /// 由每组分的量纲气体常数与 γ 构造
    pub fn new(gas_constants: &[f64], gammas: &[f64], t_ref: f64, a_ref: f64) -> Self {
        let scale = t_ref / (a_ref * a_ref);
        let species = gas_constants
            .iter()
            .zip(gammas)
            .map(|(&r, &g)| SpeciesGas {
                r: r * scale,
                gamma: g,
            })
            .collect();
        Self { species }
    }

    fn mix_r(&self, mf: &[f64]) -> f64 {
        self.species
            .iter()
            .zip(mf)
            .map(|(s, &y)| y * s.r)
            .sum()
    }

    /// 混合 cp~、cv~（质量分数加权）
    fn mix_cp_cv(&self, mf: &[f64]) -> (f64, f64) {
        let mut cp = 0.0;
        let mut cv = 0.0;
        for (s, &y) in self.species.iter().zip(mf) {
            cp += y * s.gamma * s.r / (s.gamma - 1.0);
            cv += y * s.r / (s.gamma - 1.0);
        }
        (cp, cv)
    }
}

impl EquationOfState for IdealGasMix {
    fn pressure(&self, rho: f64, temperature: f64, mf: &[f64]) -> f64 {
        rho * self.mix_r(mf) * temperature
    }

    fn temperature(&self, rho: f64, pressure: f64, mf: &[f64]) -> f64 {
        pressure / (rho * self.mix_r(mf))
    }

    fn sound_speed(&self, pressure: f64, rho: f64, mf: &[f64]) -> f64 {
        (self.gamma(mf) * pressure / rho).sqrt()
    }

    fn gas_constant(&self, mf: &[f64]) -> f64 {
        self.mix_r(mf)
    }

    fn gamma(&self, mf: &[f64]) -> f64 {
        let (cp, cv) = self.mix_cp_cv(mf);
        cp / cv
    }
}

impl Thermodynamic for IdealGasMix {
    fn cp(&self, _temperature: f64, mf: &[f64]) -> f64 {
        self.mix_cp_cv(mf).0
    }

    fn cv(&self, _temperature: f64, mf: &[f64]) -> f64 {
        self.mix_cp_cv(mf).1
    }

    fn internal_energy(&self, temperature: f64, mf: &[f64]) -> f64 {
        self.mix_cp_cv(mf).1 * temperature
    }

    fn temperature_from_energy(&self, energy: f64, mf: &[f64]) -> f64 {
        energy / self.mix_cp_cv(mf).1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn air() -> IdealGasMix {
        // aRef = sqrt(γ R TRef) → 参考态 T~=1, ρ~=1 时 a~=1
        let t_ref = 288.15;
        let a_ref = (1.4_f64 * 287.058 * t_ref).sqrt();
        IdealGasMix::new(&[287.058], &[1.4], t_ref, a_ref)
    }

    #[test]
    fn test_reference_state_sound_speed_unity() {
        let eos = air();
        let p = eos.pressure(1.0, 1.0, &[1.0]);
        assert!((p - 1.0 / 1.4).abs() < 1e-12);
        assert!((eos.sound_speed(p, 1.0, &[1.0]) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_pressure_temperature_inverse() {
        let eos = air();
        let t = eos.temperature(0.5, 0.3, &[1.0]);
        assert!((eos.pressure(0.5, t, &[1.0]) - 0.3).abs() < 1e-14);
    }

    #[test]
    fn test_energy_temperature_round_trip() {
        let eos = air();
        let e = eos.internal_energy(1.2, &[1.0]);
        assert!((eos.temperature_from_energy(e, &[1.0]) - 1.2).abs() < 1e-13);
    }

    #[test]
    fn test_two_species_mixture_gamma() {
        let t_ref = 288.15;
        let a_ref = (1.4_f64 * 287.058 * t_ref).sqrt();
        // 空气 + 单原子气体
        let eos = IdealGasMix::new(&[287.058, 208.13], &[1.4, 1.667], t_ref, a_ref);
        let g = eos.gamma(&[0.5, 0.5]);
        assert!(g > 1.4 && g < 1.667);
    }
}
