// crates/af_io/src/lib.rs

//! AeroFlux IO 层
//!
//! 核心消费/产出的全部磁盘格式：
//!
//! - [`plot3d_file`]: 多块二进制网格（节点/单元心/壁面心变体）
//! - [`function_file`]: 每块多变量的函数文件
//! - [`restart`]: 重启文件（位级约定见模块文档）
//! - [`meta`]: 伴随场序列的 JSON 元数据
//! - [`gather`]: 输出重组的根进程聚合（按全局位置排序）
//!
//! 磁盘上的场数据一律为量纲量；读写时经参考量换算。

#![warn(clippy::all)]

pub mod function_file;
pub mod gather;
pub mod meta;
pub mod plot3d_file;
pub mod restart;

pub use restart::{read_restart, write_restart, RestartBlock, RestartData};
