// crates/af_physics/src/flux/mod.rs

//! 通量与重构核
//!
//! - [`reconstruction`]: 一阶 / MUSCL / WENO 界面重构
//! - [`inviscid`]: Roe / AUSM+ / HLL / Rusanov 无黏通量
//! - [`viscous`]: 全黏性算子与 TSL 谱半径

pub mod inviscid;
pub mod reconstruction;
pub mod viscous;

pub use inviscid::{euler_flux, inviscid_flux, max_wave_speed};
pub use reconstruction::{muscl_face_state, weno_face_state};
pub use viscous::{viscous_flux, viscous_spec_rad, FaceGradients};
