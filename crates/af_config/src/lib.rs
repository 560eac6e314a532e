// crates/af_config/src/lib.rs

//! AeroFlux 配置层
//!
//! 求解器输入协作者：核心只消费一个填充完整的 [`Input`]。
//! 配置文件为 JSON，字段级默认值，加载时校验。
//!
//! # 架构层级
//!
//! 本 crate 属于 Layer 2，仅依赖 foundation 层与 serde。

#![warn(clippy::all)]

pub mod error;
pub mod input;
pub mod schemes;

pub use error::ConfigError;
pub use input::{
    BcTagData, BlockBcConfig, BlockSide, FluidConfig, InitialCondition, InletTagData, Input,
    MultigridConfig, OutputConfig, PeriodicTagData, ReferenceState, SchemeConfig, SpeciesDef,
    StagnationTagData, SurfaceConfig, TimeConfig, WallTagData,
};
pub use schemes::{
    EquationSet, FluxFunction, Limiter, MatrixMode, Reconstruction, TimeIntegration,
    TurbulenceKind, ViscousFaceInterp,
};
