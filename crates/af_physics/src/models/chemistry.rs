// crates/af_physics/src/models/chemistry.rs

//! 化学反应源项契约
//!
//! 有限速率化学以点隐式对角 Jacobian 进入隐式系统；
//! 非反应流使用 [`Frozen`]。

use smallvec::SmallVec;

use crate::vars::Primitive;

/// 化学源项结果
#[derive(Debug, Clone, Default)]
pub struct ChemSource {
    /// 单位体积组分生成率（逐组分）
    pub src: SmallVec<[f64; 4]>,
    /// 点隐式对角 Jacobian（对 ρ_s 的导数绝对值）
    pub jac_diag: SmallVec<[f64; 4]>,
    /// 源项谱半径
    pub spec_rad: f64,
}

/// 化学模型契约
pub trait Chemistry: Send + Sync {
    /// 是否反应
    fn is_reacting(&self) -> bool;

    /// 组分源项
    fn source(&self, w: &Primitive, temperature: f64) -> ChemSource;
}

/// 冻结化学（无反应）
#[derive(Debug, Clone, Copy, Default)]
pub struct Frozen;

impl Chemistry for Frozen {
    fn is_reacting(&self) -> bool {
        false
    }

    fn source(&self, w: &Primitive, _temperature: f64) -> ChemSource {
        ChemSource {
            src: smallvec::smallvec![0.0; w.layout().n_species()],
            jac_diag: smallvec::smallvec![0.0; w.layout().n_species()],
            spec_rad: 0.0,
        }
    }
}
