// crates/af_physics/src/ghost/wall.rs

//! 壁面数据
//!
//! 每个壁面类边界面携带一块 [`WallVars`] 网格：剪应力、热流、
//! y⁺、摩擦速度与壁面热力学状态，由黏性壁边界条件在幽灵赋值
//! 时填充，供输出与壁面律闭合使用。
//!
//! 壁面律：Spalding 单层律的牛顿迭代解 u⁺(y⁺)，
//! 返回摩擦速度 u_τ。

use af_grid::BoundarySurface;
use glam::DVec3;
use smallvec::SmallVec;

/// 单个壁面面元的数据
#[derive(Debug, Clone)]
pub struct WallVars {
    /// 壁面剪应力向量（流动单位）
    pub shear: DVec3,
    /// 壁面热流 q_w
    pub heat_flux: f64,
    /// y⁺（第一层网格中心）
    pub yplus: f64,
    /// 摩擦速度 u_τ
    pub friction_velocity: f64,
    /// 壁面温度
    pub temperature: f64,
    /// 壁面密度
    pub density: f64,
    /// 壁面黏性（μRef 单位）
    pub viscosity: f64,
    /// 壁面涡黏（μRef 单位）
    pub eddy_viscosity: f64,
    /// 壁面湍动能
    pub tke: f64,
    /// 壁面比耗散率
    pub sdr: f64,
    /// 壁面质量分数
    pub mass_fractions: SmallVec<[f64; 4]>,
}

impl WallVars {
    /// 全零
    pub fn zeros(n_species: usize) -> Self {
        Self {
            shear: DVec3::ZERO,
            heat_flux: 0.0,
            yplus: 0.0,
            friction_velocity: 0.0,
            temperature: 0.0,
            density: 0.0,
            viscosity: 0.0,
            eddy_viscosity: 0.0,
            tke: 0.0,
            sdr: 0.0,
            mass_fractions: smallvec::smallvec![0.0; n_species],
        }
    }
}

/// 一个壁面边界面的数据网格
#[derive(Debug, Clone)]
pub struct WallData {
    /// 所属边界面
    pub surface: BoundarySurface,
    len1: usize,
    vars: Vec<WallVars>,
}

impl WallData {
    /// 按面范围分配
    pub fn new(surface: BoundarySurface, n_species: usize) -> Self {
        let len1 = surface.r1.1 - surface.r1.0;
        let len2 = surface.r2.1 - surface.r2.0;
        Self {
            surface,
            len1,
            vars: vec![WallVars::zeros(n_species); len1 * len2],
        }
    }

    /// 面内坐标（全块坐标）取数据
    pub fn at(&self, d1: usize, d2: usize) -> &WallVars {
        let (l1, l2) = (d1 - self.surface.r1.0, d2 - self.surface.r2.0);
        &self.vars[l2 * self.len1 + l1]
    }

    /// 面内坐标取可写数据
    pub fn at_mut(&mut self, d1: usize, d2: usize) -> &mut WallVars {
        let (l1, l2) = (d1 - self.surface.r1.0, d2 - self.surface.r2.0);
        &mut self.vars[l2 * self.len1 + l1]
    }

    /// 全部面元
    pub fn iter(&self) -> impl Iterator<Item = &WallVars> {
        self.vars.iter()
    }
}

// ============================================================
// 壁面律
// ============================================================

/// Spalding 律 y⁺(u⁺) = u⁺ + e^{-κB}(e^{κu⁺} − 1 − κu⁺ − (κu⁺)²/2 − (κu⁺)³/6)
fn spalding_yplus(uplus: f64) -> (f64, f64) {
    const KAPPA: f64 = 0.41;
    const B: f64 = 5.5;
    let ku = KAPPA * uplus;
    let e = (-KAPPA * B).exp();
    let y = uplus + e * (ku.exp() - 1.0 - ku - ku * ku / 2.0 - ku * ku * ku / 6.0);
    let dy = 1.0 + e * KAPPA * (ku.exp() - 1.0 - ku - ku * ku / 2.0);
    (y, dy)
}

/// 壁面律：由第一层切向速度、壁距与运动黏性迭代求 u_τ
///
/// `u_tan` 是第一层网格中心的切向速度模，`dist` 是壁距，
/// `nu` 是运动黏性（流动单位）。返回摩擦速度。
pub fn wall_law_friction_velocity(u_tan: f64, dist: f64, nu: f64) -> f64 {
    if u_tan <= 0.0 || dist <= 0.0 || nu <= 0.0 {
        return 0.0;
    }
    // 初值：层流关系 u_τ = sqrt(ν u / y)
    let mut utau = (nu * u_tan / dist).sqrt().max(1.0e-12);
    for _ in 0..30 {
        let uplus = u_tan / utau;
        let yplus = dist * utau / nu;
        let (y_model, dy_du) = spalding_yplus(uplus);
        // f(u_τ) = y⁺(u⁺) − y·u_τ/ν
        let f = y_model - yplus;
        let df = dy_du * (-u_tan / (utau * utau)) - dist / nu;
        let step = f / df;
        utau -= step;
        if utau <= 0.0 {
            utau = 1.0e-12;
        }
        if step.abs() < 1.0e-12 * utau {
            break;
        }
    }
    utau
}
