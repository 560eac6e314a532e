// crates/af_grid/src/lib.rs

//! AeroFlux 网格层
//!
//! 块结构网格的全部元数据与容器：
//!
//! - [`multi_array`]: 带幽灵层的稠密三维数组 [`MultiArray3d`]
//! - [`blk_array`]: 每单元定长记录的数组 [`BlkMultiArray3d`]
//! - [`plot3d`]: 节点坐标块与派生几何（体积、面积、形心）
//! - [`boundary`]: 边界面与块边界条件集合
//! - [`connection`]: 块间连接与 8 种方位码的查表映射
//! - [`decomp`]: 块到进程的分区
//! - [`comm`]: 进程间交换抽象（串行退化与线程网格实现）
//!
//! # 索引约定
//!
//! 单元索引为有符号 `isize`，物理域 `[0, N)`，幽灵域 `[-G, 0)` 与
//! `[N, N+G)`。面族 i/j/k 的第 `i` 个面位于单元 `i-1` 与 `i` 之间。

#![warn(clippy::all)]

pub mod blk_array;
pub mod boundary;
pub mod comm;
pub mod connection;
pub mod decomp;
pub mod multi_array;
pub mod plot3d;
pub mod range;

pub use blk_array::BlkMultiArray3d;
pub use boundary::{BcType, BoundaryConditions, BoundarySurface};
pub use comm::{Comm, SingleComm, ThreadComm};
pub use connection::{find_connections, inverse_code, orient, Connection, PatchSpec};
pub use decomp::Decomposition;
pub use multi_array::MultiArray3d;
pub use plot3d::{FaceArea, Plot3dBlock};
pub use range::{Axis, Range3};
