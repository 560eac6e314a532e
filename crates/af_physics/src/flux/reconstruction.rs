// crates/af_physics/src/flux/reconstruction.rs

//! 界面重构
//!
//! 一阶常量、MUSCL κ 格式（限制器：none / minmod / van Albada，
//! 宽度加权的非均匀差分）与五单元 WENO / WENO-Z。
//! 全部逐方程标量重构；界面状态的物理性（ρ > 0、P > 0）由
//! 调用方校验并以 [`af_foundation::AfError::Reconstruction`] 上抛。

use af_config::Limiter;

use crate::vars::RecordData;

/// 限制器函数 φ(r)
#[inline]
fn limiter_phi(limiter: Limiter, r: f64) -> f64 {
    match limiter {
        Limiter::None => 1.0,
        Limiter::Minmod => r.clamp(0.0, 1.0),
        Limiter::VanAlbada => {
            if r > 0.0 {
                (r * r + r) / (r * r + 1.0)
            } else {
                0.0
            }
        }
    }
}

/// MUSCL 单侧重构
///
/// `w0` 是做重构的单元，`wm1`/`wp1` 是它沿轴的两个邻居，
/// `widths` 是三个单元宽度。`toward_upper` 为 true 时给出
/// `w0` 上侧面的状态（面左值），false 时给出下侧面的状态
/// （面右值），κ 权重相应互换。
pub fn muscl_face_state(
    wm1: &[f64],
    w0: &[f64],
    wp1: &[f64],
    widths: (f64, f64, f64),
    kappa: f64,
    limiter: Limiter,
    toward_upper: bool,
) -> RecordData {
    let (hm, h0, hp) = widths;
    // 宽度加权：把单元间差分换算成以 h0 为步长的等效差分
    let scale_m = h0 / (0.5 * (hm + h0));
    let scale_p = h0 / (0.5 * (h0 + hp));

    let mut out = RecordData::with_capacity(w0.len());
    for e in 0..w0.len() {
        let dm = (w0[e] - wm1[e]) * scale_m;
        let dp = (wp1[e] - w0[e]) * scale_p;
        let (toward, away) = if toward_upper { (dp, dm) } else { (dm, dp) };
        let r = if toward.abs() > 1.0e-30 {
            away / toward
        } else {
            0.0
        };
        let phi = limiter_phi(limiter, r);
        let sign = if toward_upper { 1.0 } else { -1.0 };
        let increment = 0.25 * phi * ((1.0 - kappa) * away + (1.0 + kappa) * toward);
        out.push(w0[e] + sign * increment);
    }
    out
}

/// WENO / WENO-Z 单侧重构
///
/// `cells` 按"轴指向待重构面"的次序给出五个单元：
/// `[w_{-2}, w_{-1}, w_0, w_{+1}, w_{+2}]`，`w_0` 为做重构的单元。
/// 面右值直接传入反序模板即可。
pub fn weno_face_state(cells: [&[f64]; 5], z_version: bool) -> RecordData {
    const EPS: f64 = 1.0e-6;
    const GAMMA: [f64; 3] = [0.1, 0.6, 0.3];

    let n = cells[2].len();
    let mut out = RecordData::with_capacity(n);
    for e in 0..n {
        let (m2, m1, c0, p1, p2) = (
            cells[0][e],
            cells[1][e],
            cells[2][e],
            cells[3][e],
            cells[4][e],
        );
        // 三个候选模板
        let q = [
            (2.0 * m2 - 7.0 * m1 + 11.0 * c0) / 6.0,
            (-m1 + 5.0 * c0 + 2.0 * p1) / 6.0,
            (2.0 * c0 + 5.0 * p1 - p2) / 6.0,
        ];
        // 光滑度指示
        let beta = [
            13.0 / 12.0 * (m2 - 2.0 * m1 + c0).powi(2)
                + 0.25 * (m2 - 4.0 * m1 + 3.0 * c0).powi(2),
            13.0 / 12.0 * (m1 - 2.0 * c0 + p1).powi(2) + 0.25 * (m1 - p1).powi(2),
            13.0 / 12.0 * (c0 - 2.0 * p1 + p2).powi(2)
                + 0.25 * (3.0 * c0 - 4.0 * p1 + p2).powi(2),
        ];
        let mut alpha = [0.0; 3];
        if z_version {
            let tau = (beta[0] - beta[2]).abs();
            for k in 0..3 {
                alpha[k] = GAMMA[k] * (1.0 + tau / (beta[k] + EPS));
            }
        } else {
            for k in 0..3 {
                alpha[k] = GAMMA[k] / (beta[k] + EPS).powi(2);
            }
        }
        let wsum: f64 = alpha.iter().sum();
        out.push((alpha[0] * q[0] + alpha[1] * q[1] + alpha[2] * q[2]) / wsum);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNIT: (f64, f64, f64) = (1.0, 1.0, 1.0);

    #[test]
    fn test_muscl_linear_exact() {
        // 线性场上二阶重构精确到面值（无限制器触发）
        let wm1 = [1.0];
        let w0 = [2.0];
        let wp1 = [3.0];
        for kappa in [-1.0, 0.0, 1.0 / 3.0, 1.0] {
            let left = muscl_face_state(&wm1, &w0, &wp1, UNIT, kappa, Limiter::Minmod, true);
            assert!((left[0] - 2.5).abs() < 1e-14, "κ = {}", kappa);
            let right = muscl_face_state(&wm1, &w0, &wp1, UNIT, kappa, Limiter::Minmod, false);
            assert!((right[0] - 1.5).abs() < 1e-14);
        }
    }

    #[test]
    fn test_muscl_limiter_clips_extremum() {
        // 局部极值处 minmod 限制器退化为一阶
        let left = muscl_face_state(&[1.0], &[3.0], &[2.0], UNIT, 0.0, Limiter::Minmod, true);
        assert!((left[0] - 3.0).abs() < 1e-14);
        // 不限制时越过单元值
        let unlimited = muscl_face_state(&[1.0], &[3.0], &[2.0], UNIT, 0.0, Limiter::None, true);
        assert!(unlimited[0] != 3.0);
    }

    #[test]
    fn test_muscl_nonuniform_widths_linear() {
        // 非均匀网格上的线性场：单元平均即中心值，宽度加权保持精确
        // 单元中心 x = 0.5, 1.5, 3.0，宽度 1, 1, 2，φ = x
        let left = muscl_face_state(
            &[0.5],
            &[1.5],
            &[3.0],
            (1.0, 1.0, 2.0),
            1.0 / 3.0,
            Limiter::None,
            true,
        );
        // 面位于 x = 2.0
        assert!((left[0] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_weno_smooth_high_order() {
        // 光滑线性场：WENO 恢复面值
        let c: Vec<[f64; 1]> = (0..5).map(|i| [i as f64]).collect();
        let cells = [
            c[0].as_slice(),
            c[1].as_slice(),
            c[2].as_slice(),
            c[3].as_slice(),
            c[4].as_slice(),
        ];
        let v = weno_face_state(cells, false);
        assert!((v[0] - 2.5).abs() < 1e-10);
        let vz = weno_face_state(cells, true);
        assert!((vz[0] - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_weno_shock_essentially_non_oscillatory() {
        // 阶跃：重构值保持在数据范围内
        let lo = [0.0];
        let hi = [1.0];
        let cells = [
            lo.as_slice(),
            lo.as_slice(),
            lo.as_slice(),
            hi.as_slice(),
            hi.as_slice(),
        ];
        let v = weno_face_state(cells, false);
        assert!(v[0] >= -1.0e-10 && v[0] <= 1.0 + 1.0e-10);
        // 下风模板权重被压制，面值靠近本单元值
        assert!(v[0] < 0.5);
    }
}
