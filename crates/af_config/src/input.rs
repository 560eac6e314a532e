// crates/af_config/src/input.rs

//! 求解器输入
//!
//! [`Input`] 是核心消费的完整配置协作者：网格文件、时间推进与 CFL、
//! 参考量、数值格式、流体方程组、多重网格、初始条件与边界标签表。
//! 使用纯 f64 存储，JSON 序列化，字段级默认值。

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::schemes::{
    EquationSet, FluxFunction, Limiter, MatrixMode, Reconstruction, TimeIntegration,
    TurbulenceKind, ViscousFaceInterp,
};

/// 求解器输入（全 f64）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Input {
    /// plot3d 多块网格文件
    pub grid_file: PathBuf,

    /// 重启文件（可选，续算时给出）
    #[serde(default)]
    pub restart_file: Option<PathBuf>,

    /// 时间推进配置
    #[serde(default)]
    pub time: TimeConfig,

    /// 参考量（量纲化/无量纲化）
    #[serde(default)]
    pub reference: ReferenceState,

    /// 数值格式
    #[serde(default)]
    pub schemes: SchemeConfig,

    /// 流体与方程组
    #[serde(default)]
    pub fluid: FluidConfig,

    /// 多重网格
    #[serde(default)]
    pub multigrid: MultigridConfig,

    /// 初始条件
    #[serde(default)]
    pub initial: InitialCondition,

    /// 输出配置
    #[serde(default)]
    pub output: OutputConfig,

    /// 边界标签表（按 tag 查询的外部数据）
    #[serde(default)]
    pub bc_tags: Vec<BcTagData>,

    /// 各块边界面定义（与网格文件块序一致）
    #[serde(default)]
    pub boundaries: Vec<BlockBcConfig>,
}

// ============================================================
// 边界面定义
// ============================================================

/// 块的六个面
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BlockSide {
    /// i 下侧
    ILow,
    /// i 上侧
    IHigh,
    /// j 下侧
    JLow,
    /// j 上侧
    JHigh,
    /// k 下侧
    KLow,
    /// k 上侧
    KHigh,
}

/// 单个边界面配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurfaceConfig {
    /// 所在侧
    pub side: BlockSide,
    /// 边界条件名（由网格层的调度器解析，未知名致命）
    pub bc: String,
    /// 标签号（索引 [`BcTagData`]）
    #[serde(default)]
    pub tag: u32,
    /// 面内第一方向单元范围 [start, end)；None = 整侧
    #[serde(default)]
    pub range1: Option<[usize; 2]>,
    /// 面内第二方向单元范围 [start, end)；None = 整侧
    #[serde(default)]
    pub range2: Option<[usize; 2]>,
}

/// 单块的边界面集合
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockBcConfig {
    /// 块号（网格文件中的顺序）
    pub block: usize,
    /// 面列表
    pub surfaces: Vec<SurfaceConfig>,
}

// ============================================================
// 时间推进
// ============================================================

/// 时间推进配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeConfig {
    /// 全局时间步 [s]；≤ 0 表示使用局部 CFL 时间步
    #[serde(default)]
    pub dt: f64,

    /// CFL 数
    #[serde(default = "default_cfl")]
    pub cfl: f64,

    /// 黏性谱半径的 CFL 加权系数 (Blazek 6.18)
    #[serde(default = "default_viscous_cfl")]
    pub viscous_cfl_coeff: f64,

    /// 时间积分格式
    #[serde(default)]
    pub integration: TimeIntegration,

    /// 外层（时间步）迭代数
    #[serde(default = "default_iterations")]
    pub iterations: usize,

    /// 起始迭代号（重启时由重启文件覆盖）
    #[serde(default)]
    pub iteration_start: usize,

    /// 每个时间步内的非线性迭代数
    #[serde(default = "default_nonlinear")]
    pub nonlinear_iterations: usize,
}

fn default_cfl() -> f64 {
    0.8
}
fn default_viscous_cfl() -> f64 {
    4.0
}
fn default_iterations() -> usize {
    1000
}
fn default_nonlinear() -> usize {
    1
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            dt: 0.0,
            cfl: default_cfl(),
            viscous_cfl_coeff: default_viscous_cfl(),
            integration: TimeIntegration::default(),
            iterations: default_iterations(),
            iteration_start: 0,
            nonlinear_iterations: default_nonlinear(),
        }
    }
}

impl TimeConfig {
    /// 是否使用全局时间步
    pub fn is_global_dt(&self) -> bool {
        self.dt > 0.0
    }
}

// ============================================================
// 参考量
// ============================================================

/// 参考量
///
/// 核心内部全部无量纲：ρ/ρRef、u/aRef、P/(ρRef·aRef²)、T/TRef、
/// μ/μRef、x/LRef、t·aRef/LRef。磁盘上的场数据为量纲量。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceState {
    /// 参考密度 [kg/m³]
    #[serde(default = "default_rho_ref")]
    pub rho: f64,
    /// 参考温度 [K]
    #[serde(default = "default_t_ref")]
    pub temperature: f64,
    /// 参考长度 [m]
    #[serde(default = "default_l_ref")]
    pub length: f64,
    /// 参考声速 [m/s]
    #[serde(default = "default_a_ref")]
    pub sound_speed: f64,
    /// 参考黏性 [Pa·s]
    #[serde(default = "default_mu_ref")]
    pub viscosity: f64,
}

fn default_rho_ref() -> f64 {
    1.225
}
fn default_t_ref() -> f64 {
    288.15
}
fn default_l_ref() -> f64 {
    1.0
}
fn default_a_ref() -> f64 {
    340.294
}
fn default_mu_ref() -> f64 {
    1.7894e-5
}

impl Default for ReferenceState {
    fn default() -> Self {
        Self {
            rho: default_rho_ref(),
            temperature: default_t_ref(),
            length: default_l_ref(),
            sound_speed: default_a_ref(),
            viscosity: default_mu_ref(),
        }
    }
}

impl ReferenceState {
    /// 参考压力 ρRef·aRef² [Pa]
    pub fn pressure(&self) -> f64 {
        self.rho * self.sound_speed * self.sound_speed
    }

    /// 参考时间 LRef/aRef [s]
    pub fn time(&self) -> f64 {
        self.length / self.sound_speed
    }

    /// 流动雷诺数尺度 ρRef·aRef·LRef/μRef
    pub fn reynolds(&self) -> f64 {
        self.rho * self.sound_speed * self.length / self.viscosity
    }
}

// ============================================================
// 数值格式
// ============================================================

/// 数值格式配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemeConfig {
    /// 空间重构
    #[serde(default)]
    pub reconstruction: Reconstruction,

    /// MUSCL κ 参数 ∈ [-1, 1]
    #[serde(default = "default_kappa")]
    pub kappa: f64,

    /// 斜率限制器
    #[serde(default)]
    pub limiter: Limiter,

    /// 无黏通量函数
    #[serde(default)]
    pub inviscid_flux: FluxFunction,

    /// 黏性面插值
    #[serde(default)]
    pub viscous_face: ViscousFaceInterp,

    /// 隐式对角存储模式
    #[serde(default)]
    pub matrix_mode: MatrixMode,

    /// 定常迭代（矩阵松弛）扫掠次数
    #[serde(default = "default_sweeps")]
    pub relax_sweeps: usize,
}

fn default_kappa() -> f64 {
    1.0 / 3.0
}
fn default_sweeps() -> usize {
    4
}

impl Default for SchemeConfig {
    fn default() -> Self {
        Self {
            reconstruction: Reconstruction::default(),
            kappa: default_kappa(),
            limiter: Limiter::default(),
            inviscid_flux: FluxFunction::default(),
            viscous_face: ViscousFaceInterp::default(),
            matrix_mode: MatrixMode::default(),
            relax_sweeps: default_sweeps(),
        }
    }
}

// ============================================================
// 流体与方程组
// ============================================================

/// 组分定义
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeciesDef {
    /// 名称（出现在重启文件中）
    pub name: String,
    /// 气体常数 R/M [J/(kg·K)]
    #[serde(default = "default_gas_constant")]
    pub gas_constant: f64,
    /// 比热比 γ
    #[serde(default = "default_gamma")]
    pub gamma: f64,
}

fn default_gas_constant() -> f64 {
    287.058
}
fn default_gamma() -> f64 {
    1.4
}

impl Default for SpeciesDef {
    fn default() -> Self {
        Self {
            name: "air".to_string(),
            gas_constant: default_gas_constant(),
            gamma: default_gamma(),
        }
    }
}

/// 流体配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FluidConfig {
    /// 方程组
    #[serde(default)]
    pub equation_set: EquationSet,

    /// 组分列表（≥ 1）
    #[serde(default = "default_species")]
    pub species: Vec<SpeciesDef>,

    /// 湍流模型
    #[serde(default)]
    pub turbulence: TurbulenceKind,

    /// 是否含有限速率化学反应源项
    #[serde(default)]
    pub reacting: bool,
}

fn default_species() -> Vec<SpeciesDef> {
    vec![SpeciesDef::default()]
}

impl Default for FluidConfig {
    fn default() -> Self {
        Self {
            equation_set: EquationSet::default(),
            species: default_species(),
            turbulence: TurbulenceKind::default(),
            reacting: false,
        }
    }
}

// ============================================================
// 多重网格
// ============================================================

/// 多重网格配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultigridConfig {
    /// 网格层数（1 = 单层网格）
    #[serde(default = "default_mg_levels")]
    pub levels: usize,

    /// 每层粗网格上的非线性迭代数
    #[serde(default = "default_mg_coarse_iters")]
    pub coarse_iterations: usize,
}

fn default_mg_levels() -> usize {
    1
}
fn default_mg_coarse_iters() -> usize {
    1
}

impl Default for MultigridConfig {
    fn default() -> Self {
        Self {
            levels: default_mg_levels(),
            coarse_iterations: default_mg_coarse_iters(),
        }
    }
}

// ============================================================
// 初始条件
// ============================================================

/// 初始条件
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum InitialCondition {
    /// 全场均匀原始变量（量纲量）
    #[serde(rename_all = "camelCase")]
    Uniform {
        /// 密度 [kg/m³]
        density: f64,
        /// 速度 [m/s]
        velocity: [f64; 3],
        /// 压力 [Pa]
        pressure: f64,
        /// 湍动能 [m²/s²]（RANS）
        #[serde(default)]
        tke: f64,
        /// 比耗散率 [1/s]（RANS）
        #[serde(default)]
        sdr: f64,
        /// 质量分数（与组分表同序，缺省为首组分 1.0）
        #[serde(default)]
        mass_fractions: Vec<f64>,
    },
    /// 点云最近邻初始化
    #[serde(rename_all = "camelCase")]
    PointCloud {
        /// 点云文件
        file: PathBuf,
    },
}

impl Default for InitialCondition {
    fn default() -> Self {
        Self::Uniform {
            density: default_rho_ref(),
            velocity: [0.0, 0.0, 0.0],
            pressure: 101325.0,
            tke: 0.0,
            sdr: 0.0,
            mass_fractions: Vec::new(),
        }
    }
}

// ============================================================
// 输出
// ============================================================

/// 输出配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// 输出文件名前缀
    #[serde(default = "default_base_name")]
    pub base_name: String,

    /// 场输出间隔（迭代数）
    #[serde(default = "default_output_freq")]
    pub frequency: usize,

    /// 重启输出间隔（迭代数；0 = 不写）
    #[serde(default)]
    pub restart_frequency: usize,

    /// 输出变量列表
    #[serde(default = "default_variables")]
    pub variables: Vec<String>,
}

fn default_base_name() -> String {
    "aeroflux".to_string()
}
fn default_output_freq() -> usize {
    100
}
fn default_variables() -> Vec<String> {
    ["density", "vel_x", "vel_y", "vel_z", "pressure"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            base_name: default_base_name(),
            frequency: default_output_freq(),
            restart_frequency: 0,
            variables: default_variables(),
        }
    }
}

// ============================================================
// 边界标签表
// ============================================================

/// 壁面标签数据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WallTagData {
    /// 等温壁温度 [K]；None 表示绝热
    #[serde(default)]
    pub temperature: Option<f64>,
    /// 给定热流 [W/m²]（绝热时可非零）
    #[serde(default)]
    pub heat_flux: f64,
    /// 是否启用壁面律闭合
    #[serde(default)]
    pub wall_law: bool,
    /// 壁面速度 [m/s]（移动壁）
    #[serde(default)]
    pub velocity: [f64; 3],
}

/// 入口标签数据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InletTagData {
    /// 密度 [kg/m³]
    pub density: f64,
    /// 速度 [m/s]
    pub velocity: [f64; 3],
    /// 压力 [Pa]
    pub pressure: f64,
    /// 湍动能
    #[serde(default)]
    pub tke: f64,
    /// 比耗散率
    #[serde(default)]
    pub sdr: f64,
    /// 质量分数
    #[serde(default)]
    pub mass_fractions: Vec<f64>,
    /// 出口/入口为非反射特征处理
    #[serde(default)]
    pub nonreflecting: bool,
    /// 非反射长度尺度 [m]
    #[serde(default = "default_l_ref")]
    pub length_scale: f64,
}

/// 驻点入口标签数据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagnationTagData {
    /// 总压 [Pa]
    pub p0: f64,
    /// 总温 [K]
    pub t0: f64,
    /// 流动方向（单位化前）
    pub direction: [f64; 3],
}

/// 周期边界标签数据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodicTagData {
    /// 平移向量 [m]（从低侧面到配对面）
    pub translation: [f64; 3],
}

/// 单个边界标签条目
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BcTagData {
    /// 标签号
    pub tag: u32,
    /// 壁面数据
    #[serde(default)]
    pub wall: Option<WallTagData>,
    /// 入口/出口数据
    #[serde(default)]
    pub inlet: Option<InletTagData>,
    /// 驻点入口数据
    #[serde(default)]
    pub stagnation: Option<StagnationTagData>,
    /// 出口背压 [Pa]（pressureOutlet）
    #[serde(default)]
    pub back_pressure: Option<f64>,
    /// 周期平移数据
    #[serde(default)]
    pub periodic: Option<PeriodicTagData>,
}

// ============================================================
// Input 查询接口
// ============================================================

impl Input {
    /// 从 JSON 文件加载并校验
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let input: Input = serde_json::from_str(&text)?;
        input.validate()?;
        Ok(input)
    }

    /// 校验配置一致性
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.time.cfl <= 0.0 {
            return Err(ConfigError::invalid("time.cfl", self.time.cfl, "必须为正"));
        }
        if self.fluid.species.is_empty() {
            return Err(ConfigError::Missing("fluid.species".to_string()));
        }
        if !(-1.0..=1.0).contains(&self.schemes.kappa) {
            return Err(ConfigError::invalid(
                "schemes.kappa",
                self.schemes.kappa,
                "κ ∈ [-1, 1]",
            ));
        }
        if self.multigrid.levels == 0 {
            return Err(ConfigError::invalid(
                "multigrid.levels",
                self.multigrid.levels,
                "至少一层",
            ));
        }
        if self.fluid.equation_set.is_rans() && self.fluid.turbulence == TurbulenceKind::None {
            return Err(ConfigError::invalid(
                "fluid.turbulence",
                "none",
                "RANS 方程组需要湍流模型",
            ));
        }
        if self.fluid.reacting {
            // 参考模型组只含冻结化学
            return Err(ConfigError::invalid(
                "fluid.reacting",
                true,
                "参考实现只含冻结化学，有限速率模型需另行注入",
            ));
        }
        Ok(())
    }

    /// 组分数
    pub fn n_species(&self) -> usize {
        self.fluid.species.len()
    }

    /// 是否黏性
    pub fn is_viscous(&self) -> bool {
        self.fluid.equation_set.is_viscous()
    }

    /// 是否 RANS
    pub fn is_rans(&self) -> bool {
        self.fluid.equation_set.is_rans()
    }

    /// 是否多组分
    pub fn is_multi_species(&self) -> bool {
        self.n_species() > 1
    }

    /// 方程数 N_s + 4 + (RANS ? 2 : 0)
    pub fn n_equations(&self) -> usize {
        self.n_species() + 4 + self.fluid.equation_set.n_turb()
    }

    /// 幽灵层数：重构格式决定，棱梯度模板至少需要 2 层
    pub fn ghost_layers(&self) -> usize {
        self.schemes.reconstruction.required_ghost_layers().max(2)
    }

    /// 按标签查询边界数据
    pub fn bc_tag(&self, tag: u32) -> Option<&BcTagData> {
        self.bc_tags.iter().find(|t| t.tag == tag)
    }
}

impl Default for Input {
    fn default() -> Self {
        Self {
            grid_file: PathBuf::from("grid.p3d"),
            restart_file: None,
            time: TimeConfig::default(),
            reference: ReferenceState::default(),
            schemes: SchemeConfig::default(),
            fluid: FluidConfig::default(),
            multigrid: MultigridConfig::default(),
            initial: InitialCondition::default(),
            output: OutputConfig::default(),
            bc_tags: Vec::new(),
            boundaries: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_input_is_valid() {
        let input = Input::default();
        assert!(input.validate().is_ok());
        assert_eq!(input.n_species(), 1);
        assert_eq!(input.n_equations(), 5);
    }

    #[test]
    fn test_rans_equation_count() {
        let mut input = Input::default();
        input.fluid.equation_set = EquationSet::Rans;
        input.fluid.turbulence = TurbulenceKind::SstKw;
        assert!(input.validate().is_ok());
        assert_eq!(input.n_equations(), 7);
    }

    #[test]
    fn test_rans_without_model_rejected() {
        let mut input = Input::default();
        input.fluid.equation_set = EquationSet::Rans;
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_reacting_without_chemistry_rejected() {
        // 冻结化学下 reacting 开关在校验期拒绝，不得静默空转
        let mut input = Input::default();
        input.fluid.reacting = true;
        let err = input.validate().unwrap_err();
        assert!(err.to_string().contains("fluid.reacting"));
    }

    #[test]
    fn test_reference_derived_quantities() {
        let r = ReferenceState::default();
        // pRef = ρ·a²
        assert!((r.pressure() - 1.225 * 340.294 * 340.294).abs() < 1e-6);
        assert!(r.reynolds() > 1e6);
    }

    #[test]
    fn test_json_round_trip() {
        let mut input = Input::default();
        input.bc_tags.push(BcTagData {
            tag: 3,
            wall: Some(WallTagData {
                temperature: Some(350.0),
                heat_flux: 0.0,
                wall_law: false,
                velocity: [0.0; 3],
            }),
            inlet: None,
            stagnation: None,
            back_pressure: None,
            periodic: None,
        });
        let text = serde_json::to_string(&input).unwrap();
        let back: Input = serde_json::from_str(&text).unwrap();
        assert_eq!(back.bc_tag(3).unwrap().wall.as_ref().unwrap().temperature, Some(350.0));
        assert!(back.bc_tag(7).is_none());
    }
}
