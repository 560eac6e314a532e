// crates/af_foundation/src/lib.rs

//! AeroFlux Foundation Layer
//!
//! 零依赖基础层，提供整个项目的基础抽象。
//!
//! # 模块概览
//!
//! - [`error`]: 统一错误类型（物理状态、几何、重构、边界条件、IO）
//! - [`tolerance`]: 数值容差常量
//!
//! # 设计原则
//!
//! 1. **零外部依赖**: 不依赖任何第三方 crate
//! 2. **可多次构造**: 无全局单例，核心可在同一进程内多次实例化
//! 3. **错误即诊断**: 每个致命错误携带定位信息（块号、单元索引）

#![warn(clippy::all)]

pub mod error;
pub mod tolerance;

pub use error::{AfError, AfResult};

/// Prelude 模块，包含常用类型
pub mod prelude {
    pub use crate::error::{AfError, AfResult};
    pub use crate::tolerance::Tolerance;
}
