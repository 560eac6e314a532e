// crates/af_physics/src/solver/mod.rs

//! 网格层级、线性求解器与多重网格驱动
//!
//! - [`linear`]: 线性求解器契约与 LU-SGS 参考实现
//! - [`level`]: 单层的块集合、连接表与单步控制流
//! - [`multigrid`]: 粗化、限制（FAS 强迫项）与延拓
//! - [`march`]: 外层非线性/时间推进

pub mod level;
pub mod linear;
pub mod march;
pub mod multigrid;

pub use level::{GridLevel, MgData};
pub use linear::{LinearSolver, LuSgs};
pub use march::{march, MarchSummary};
