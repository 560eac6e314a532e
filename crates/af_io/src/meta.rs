// crates/af_io/src/meta.rs

//! 场序列 JSON 元数据
//!
//! 每个时间序列输出伴随一个元数据文件，供下游查看器解析：
//! 变量表、参考量（量纲化约定）、序列时间戳。

use std::path::Path;

use af_config::ReferenceState;
use af_foundation::{AfError, AfResult};
use serde::{Deserialize, Serialize};

/// 序列中的一帧
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetaFrame {
    /// 迭代号
    pub iteration: usize,
    /// 无量纲时间
    pub time: f64,
    /// 场文件名
    pub file: String,
}

/// 元数据
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeriesMeta {
    /// 算例名
    pub name: String,
    /// 生成时间（UTC RFC 3339）
    pub created: String,
    /// 输出变量表（与函数文件变量序一致）
    pub variables: Vec<String>,
    /// 参考密度 [kg/m³]
    pub rho_ref: f64,
    /// 参考声速 [m/s]
    pub a_ref: f64,
    /// 参考温度 [K]
    pub t_ref: f64,
    /// 参考长度 [m]
    pub l_ref: f64,
    /// 帧序列
    pub frames: Vec<MetaFrame>,
}

impl SeriesMeta {
    /// 创建
    pub fn new(name: &str, variables: Vec<String>, reference: &ReferenceState) -> Self {
        Self {
            name: name.to_string(),
            created: chrono::Utc::now().to_rfc3339(),
            variables,
            rho_ref: reference.rho,
            a_ref: reference.sound_speed,
            t_ref: reference.temperature,
            l_ref: reference.length,
            frames: Vec::new(),
        }
    }

    /// 追加一帧
    pub fn push_frame(&mut self, iteration: usize, time: f64, file: &str) {
        self.frames.push(MetaFrame {
            iteration,
            time,
            file: file.to_string(),
        });
    }

    /// 写出
    pub fn save(&self, path: &Path) -> AfResult<()> {
        let text =
            serde_json::to_string_pretty(self).map_err(|e| AfError::internal(e.to_string()))?;
        std::fs::write(path, text)
            .map_err(|e| AfError::io_with_source(format!("元数据 {}", path.display()), e))?;
        Ok(())
    }

    /// 读入
    pub fn load(path: &Path) -> AfResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| AfError::io_with_source(format!("元数据 {}", path.display()), e))?;
        serde_json::from_str(&text).map_err(|e| AfError::io(e.to_string()))
    }
}
