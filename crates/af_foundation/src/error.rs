// crates/af_foundation/src/error.rs

//! 基础错误类型
//!
//! 定义求解器核心的错误分类，与 spec 无关的基础设施错误
//! （IO、尺寸、索引）和数值致命错误（非物理状态、退化几何、
//! 重构失败）统一在 [`AfError`] 中。
//!
//! # 错误策略
//!
//! 求解过程中的错误一律致命：错误沿 `?` 向外层驱动传播，
//! 驱动打印诊断并以非零码退出。块间 "T" 型交汇的延迟填充
//! 不是错误，由 `PutGeomSlice` 的返回值在调用方本地消化。

use std::{fmt, io, sync::mpsc::SendError, sync::PoisonError};

/// 统一结果类型别名
pub type AfResult<T> = Result<T, AfError>;

/// 核心错误
///
/// 数值致命错误携带块号与单元索引，便于直接定位发散单元。
#[derive(Debug)]
pub enum AfError {
    /// 非物理状态（ρ ≤ 0、P ≤ 0、T ≤ 0、μ < 0 等）
    NonphysicalState {
        /// 违反的量与数值
        message: String,
        /// 块号（父块全局编号）
        block: usize,
        /// 单元索引 (i, j, k)，含幽灵层的有符号索引
        cell: (isize, isize, isize),
    },

    /// 退化几何（体积非正、面积向量退化）
    InvalidGeometry {
        /// 描述
        message: String,
    },

    /// 界面重构失败（界面出现 NaN 或负的强度量）
    Reconstruction {
        /// 描述
        message: String,
    },

    /// 未知边界条件名
    UnknownBc {
        /// 配置中出现的名称
        name: String,
    },

    /// 重启文件与当前网格分区不匹配
    DecompMismatch {
        /// 描述（块数、尺寸差异）
        message: String,
    },

    /// IO 操作失败
    Io {
        /// 描述性错误信息
        message: String,
        /// 底层 IO 错误源
        source: Option<io::Error>,
    },

    /// 数组或切片尺寸不匹配
    SizeMismatch {
        /// 数据名称
        name: &'static str,
        /// 期望大小
        expected: usize,
        /// 实际大小
        actual: usize,
    },

    /// 内部实现错误（不变量被破坏）
    Internal {
        /// 描述
        message: String,
    },

    /// 通道发送失败（线程化交换层对端已退出）
    ChannelSend,

    /// 通道接收失败
    ChannelRecv,

    /// 锁获取失败
    Lock,
}

// ============================================================
// 便捷构造
// ============================================================

impl AfError {
    /// 创建非物理状态错误
    #[inline]
    pub fn nonphysical(
        message: impl Into<String>,
        block: usize,
        cell: (isize, isize, isize),
    ) -> Self {
        Self::NonphysicalState {
            message: message.into(),
            block,
            cell,
        }
    }

    /// 创建退化几何错误
    #[inline]
    pub fn invalid_geometry(message: impl Into<String>) -> Self {
        Self::InvalidGeometry {
            message: message.into(),
        }
    }

    /// 创建重构失败错误
    #[inline]
    pub fn reconstruction(message: impl Into<String>) -> Self {
        Self::Reconstruction {
            message: message.into(),
        }
    }

    /// 创建未知边界条件错误
    #[inline]
    pub fn unknown_bc(name: impl Into<String>) -> Self {
        Self::UnknownBc { name: name.into() }
    }

    /// 创建分区不匹配错误
    #[inline]
    pub fn decomp_mismatch(message: impl Into<String>) -> Self {
        Self::DecompMismatch {
            message: message.into(),
        }
    }

    /// 创建 IO 错误
    #[inline]
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带源的 IO 错误
    #[inline]
    pub fn io_with_source(message: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source: Some(source),
        }
    }

    /// 创建尺寸不匹配错误
    #[inline]
    pub fn size_mismatch(name: &'static str, expected: usize, actual: usize) -> Self {
        Self::SizeMismatch {
            name,
            expected,
            actual,
        }
    }

    /// 创建内部错误
    #[inline]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// 验证尺寸一致，否则返回 [`AfError::SizeMismatch`]
    #[inline]
    pub fn check_size(name: &'static str, expected: usize, actual: usize) -> AfResult<()> {
        if expected != actual {
            Err(Self::size_mismatch(name, expected, actual))
        } else {
            Ok(())
        }
    }
}

// ============================================================
// 标准库错误转换
// ============================================================

impl From<io::Error> for AfError {
    fn from(err: io::Error) -> Self {
        Self::io_with_source("IO 操作失败", err)
    }
}

impl<T> From<SendError<T>> for AfError {
    fn from(_: SendError<T>) -> Self {
        Self::ChannelSend
    }
}

impl From<std::sync::mpsc::RecvError> for AfError {
    fn from(_: std::sync::mpsc::RecvError) -> Self {
        Self::ChannelRecv
    }
}

impl<T> From<PoisonError<T>> for AfError {
    fn from(_: PoisonError<T>) -> Self {
        Self::Lock
    }
}

// ============================================================
// 核心 Trait 实现
// ============================================================

impl fmt::Display for AfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonphysicalState {
                message,
                block,
                cell,
            } => write!(
                f,
                "非物理状态: {} (块 {}, 单元 ({}, {}, {}))",
                message, block, cell.0, cell.1, cell.2
            ),
            Self::InvalidGeometry { message } => write!(f, "退化几何: {}", message),
            Self::Reconstruction { message } => write!(f, "界面重构失败: {}", message),
            Self::UnknownBc { name } => write!(f, "未知边界条件: {}", name),
            Self::DecompMismatch { message } => write!(f, "分区不匹配: {}", message),
            Self::Io { message, .. } => write!(f, "IO错误: {}", message),
            Self::SizeMismatch {
                name,
                expected,
                actual,
            } => write!(f, "尺寸不匹配: {} 期望{}, 实际{}", name, expected, actual),
            Self::Internal { message } => write!(f, "内部错误: {}", message),
            Self::ChannelSend => write!(f, "通道发送失败"),
            Self::ChannelRecv => write!(f, "通道接收失败"),
            Self::Lock => write!(f, "锁获取失败"),
        }
    }
}

impl std::error::Error for AfError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => source.as_ref().map(|e| e as _),
            _ => None,
        }
    }
}

// ============================================================
// 测试
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nonphysical_carries_cell_index() {
        let err = AfError::nonphysical("rho = -0.3", 2, (4, -1, 7));
        let text = err.to_string();
        assert!(text.contains("块 2"));
        assert!(text.contains("(4, -1, 7)"));
    }

    #[test]
    fn test_check_size_success() {
        assert!(AfError::check_size("slice", 12, 12).is_ok());
    }

    #[test]
    fn test_check_size_failure() {
        let result = AfError::check_size("slice", 12, 8);
        assert!(matches!(result.unwrap_err(), AfError::SizeMismatch { .. }));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "缺失");
        let err: AfError = io_err.into();
        assert!(matches!(err, AfError::Io { .. }));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_unknown_bc_display() {
        let err = AfError::unknown_bc("slipperyWall");
        assert!(err.to_string().contains("slipperyWall"));
    }
}
