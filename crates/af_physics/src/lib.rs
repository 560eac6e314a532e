// crates/af_physics/src/lib.rs

//! AeroFlux 物理层
//!
//! 有限体积残差装配、幽灵单元协议与隐式时间推进的全部核心：
//!
//! - [`vars`]: 定长变量记录（原始/守恒/残差）与角色索引表
//! - [`models`]: 物理模型契约（状态方程、输运、湍流、化学）
//! - [`flux`]: 重构、无黏/黏性通量核
//! - [`block`]: procBlock —— 单块上的几何、状态、梯度与残差装配
//! - [`ghost`]: 边界条件调度、几何幽灵与棱幽灵延拓
//! - [`exchange`]: 块间切片交换（同进程直接交换 / 跨进程通道交换）
//! - [`solver`]: 网格层级、线性求解器契约与多重网格驱动
//!
//! 核心内部全部采用无量纲量，见 [`models::PhysicsSet`] 的约定。

#![warn(clippy::all)]

pub mod block;
pub mod exchange;
pub mod flux;
pub mod ghost;
pub mod models;
pub mod solver;
pub mod spec_rad;
pub mod vars;

pub use block::ProcBlock;
pub use models::PhysicsSet;
pub use spec_rad::SpecRad;
pub use vars::{Conserved, Primitive, Residual, VarLayout};
