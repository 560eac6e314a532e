// crates/af_foundation/src/tolerance.rs

//! 数值容差配置
//!
//! 包含核心各处使用的容差阈值。通过参数注入传递，
//! 不使用全局静态变量。

/// 数值容差配置
#[derive(Debug, Clone)]
pub struct Tolerance {
    /// 无量纲密度下限（低于视为非物理）
    pub rho_min: f64,
    /// 无量纲压力下限
    pub p_min: f64,
    /// 体积最小值（网格质量检查）
    pub vol_min: f64,
    /// 面积向量模最小值
    pub area_min: f64,
    /// 安全除法阈值
    pub safe_div: f64,
    /// 壁面距离负值容忍（投影误差）
    pub wall_dist_neg: f64,
    /// 残差发散判定倍数（相对首步 L2）
    pub divergence_factor: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            rho_min: 1.0e-12,
            p_min: 1.0e-12,
            vol_min: 1.0e-14,
            area_min: 1.0e-14,
            safe_div: 1.0e-30,
            wall_dist_neg: -1.0e-10,
            divergence_factor: 1.0e4,
        }
    }
}

impl Tolerance {
    /// 安全除法：分母过小时返回零
    #[inline]
    pub fn safe_div(&self, num: f64, den: f64) -> f64 {
        if den.abs() < self.safe_div {
            0.0
        } else {
            num / den
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_div_zero_denominator() {
        let tol = Tolerance::default();
        assert_eq!(tol.safe_div(1.0, 0.0), 0.0);
        assert!((tol.safe_div(1.0, 2.0) - 0.5).abs() < 1e-15);
    }
}
