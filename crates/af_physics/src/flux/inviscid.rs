// crates/af_physics/src/flux/inviscid.rs

//! 无黏通量函数
//!
//! 四种通量：Roe（熵修正的通量差分裂）、AUSM+、HLL、Rusanov。
//! 统一签名：左右界面原始状态 + 单位法向 → 逐方程通量记录。
//!
//! 共同性质（测试保证）：
//! - 一致性 F(W, W, n) = F(W)·n
//! - 跨界面守恒（同一通量加到左单元、减自右单元）
//! - 迎风方向良定（超声速时取上游通量）

use af_config::FluxFunction;
use glam::DVec3;

use crate::models::PhysicsSet;
use crate::vars::{Primitive, RecordData};

/// Euler 通量 F(W)·n
pub fn euler_flux(w: &Primitive, normal: DVec3, phys: &PhysicsSet) -> RecordData {
    let layout = w.layout();
    let v = w.velocity();
    let vn = v.dot(normal);
    let h = phys.total_enthalpy(w);
    let rho = w.rho();

    let mut f: RecordData = smallvec::smallvec![0.0; layout.n_eqns()];
    for s in 0..layout.n_species() {
        f[s] = w.rho_species(s) * vn;
    }
    f[layout.mx()] = rho * v.x * vn + w.p() * normal.x;
    f[layout.my()] = rho * v.y * vn + w.p() * normal.y;
    f[layout.mz()] = rho * v.z * vn + w.p() * normal.z;
    f[layout.energy()] = rho * h * vn;
    if layout.is_rans() {
        f[layout.turb(0)] = rho * w.tke() * vn;
        f[layout.turb(1)] = rho * w.sdr() * vn;
    }
    f
}

/// 按配置选择的界面通量
pub fn inviscid_flux(
    kind: FluxFunction,
    wl: &Primitive,
    wr: &Primitive,
    normal: DVec3,
    phys: &PhysicsSet,
) -> RecordData {
    match kind {
        FluxFunction::Roe => roe_flux(wl, wr, normal, phys),
        FluxFunction::Ausm => ausm_flux(wl, wr, normal, phys),
        FluxFunction::Hll => hll_flux(wl, wr, normal, phys),
        FluxFunction::Rusanov => rusanov_flux(wl, wr, normal, phys),
    }
}

/// 界面（对流）谱半径 |v·n| + a，取两侧最大
pub fn max_wave_speed(wl: &Primitive, wr: &Primitive, normal: DVec3, phys: &PhysicsSet) -> f64 {
    let sl = wl.velocity().dot(normal).abs() + phys.sound_speed(wl);
    let sr = wr.velocity().dot(normal).abs() + phys.sound_speed(wr);
    sl.max(sr)
}

// ============================================================
// Roe
// ============================================================

/// Harten 熵修正
#[inline]
fn entropy_fix(lambda: f64, a_hat: f64) -> f64 {
    let delta = 0.1 * a_hat;
    let l = lambda.abs();
    if l < delta {
        0.5 * (l * l / delta + delta)
    } else {
        l
    }
}

/// Roe 通量差分裂
///
/// 组分密度与湍流量作为熵波族随 |v̂·n| 对流；三个声学/熵波
/// 采用标准 α 分解。
pub fn roe_flux(wl: &Primitive, wr: &Primitive, normal: DVec3, phys: &PhysicsSet) -> RecordData {
    let layout = wl.layout();
    let (rho_l, rho_r) = (wl.rho(), wr.rho());
    let r = (rho_r / rho_l).sqrt();
    let denom = 1.0 + r;

    let v_hat = (wl.velocity() + wr.velocity() * r) / denom;
    let h_hat = (phys.total_enthalpy(wl) + phys.total_enthalpy(wr) * r) / denom;
    let k_hat = (wl.tke() + wr.tke() * r) / denom;
    let rho_hat = r * rho_l;
    let mf_l = wl.mass_fractions();
    let mf_r = wr.mass_fractions();
    let mf_hat: Vec<f64> = mf_l
        .iter()
        .zip(&mf_r)
        .map(|(yl, yr)| (yl + yr * r) / denom)
        .collect();
    let gamma_hat = phys.eos.gamma(&mf_hat);
    let q2 = v_hat.length_squared();
    let a2 = (gamma_hat - 1.0) * (h_hat - 0.5 * q2 - k_hat);
    let a_hat = a2.max(1.0e-14).sqrt();
    let vn_hat = v_hat.dot(normal);

    let d_p = wr.p() - wl.p();
    let d_rho = rho_r - rho_l;
    let d_v = wr.velocity() - wl.velocity();
    let d_vn = d_v.dot(normal);

    let l1 = entropy_fix(vn_hat - a_hat, a_hat);
    let lm = vn_hat.abs();
    let l5 = entropy_fix(vn_hat + a_hat, a_hat);

    let alpha1 = (d_p - rho_hat * a_hat * d_vn) / (2.0 * a2);
    let alpha5 = (d_p + rho_hat * a_hat * d_vn) / (2.0 * a2);
    let alpha2 = d_rho - d_p / a2;

    let mut diss: RecordData = smallvec::smallvec![0.0; layout.n_eqns()];
    // 组分：声学波按 Ŷ 分配，熵波附加 ρ̂ΔY 的对流
    for s in 0..layout.n_species() {
        let d_y = mf_r[s] - mf_l[s];
        diss[s] = l1 * alpha1 * mf_hat[s]
            + lm * (alpha2 * mf_hat[s] + rho_hat * d_y)
            + l5 * alpha5 * mf_hat[s];
    }
    // 动量
    let d_vt = d_v - normal * d_vn;
    let m1 = v_hat - normal * a_hat;
    let m5 = v_hat + normal * a_hat;
    for axis in 0..3 {
        let idx = layout.mx() + axis;
        diss[idx] = l1 * alpha1 * m1[axis]
            + lm * (alpha2 * v_hat[axis] + rho_hat * d_vt[axis])
            + l5 * alpha5 * m5[axis];
    }
    // 能量
    diss[layout.energy()] = l1 * alpha1 * (h_hat - a_hat * vn_hat)
        + lm * (alpha2 * (0.5 * q2 + k_hat) + rho_hat * (v_hat.dot(d_v) - vn_hat * d_vn))
        + l5 * alpha5 * (h_hat + a_hat * vn_hat);
    // 湍流量：随熵波对流
    if layout.is_rans() {
        let q_hat = [k_hat, (wl.sdr() + wr.sdr() * r) / denom];
        let d_q = [wr.tke() - wl.tke(), wr.sdr() - wl.sdr()];
        for n in 0..2 {
            diss[layout.turb(n)] = l1 * alpha1 * q_hat[n]
                + lm * (alpha2 * q_hat[n] + rho_hat * d_q[n])
                + l5 * alpha5 * q_hat[n];
        }
    }

    let fl = euler_flux(wl, normal, phys);
    let fr = euler_flux(wr, normal, phys);
    (0..layout.n_eqns())
        .map(|e| 0.5 * (fl[e] + fr[e]) - 0.5 * diss[e])
        .collect()
}

// ============================================================
// AUSM+
// ============================================================

fn mach_split_plus(m: f64) -> f64 {
    const BETA: f64 = 1.0 / 8.0;
    if m.abs() >= 1.0 {
        0.5 * (m + m.abs())
    } else {
        0.25 * (m + 1.0).powi(2) + BETA * (m * m - 1.0).powi(2)
    }
}

fn mach_split_minus(m: f64) -> f64 {
    const BETA: f64 = 1.0 / 8.0;
    if m.abs() >= 1.0 {
        0.5 * (m - m.abs())
    } else {
        -0.25 * (m - 1.0).powi(2) - BETA * (m * m - 1.0).powi(2)
    }
}

fn pressure_split_plus(m: f64) -> f64 {
    const ALPHA: f64 = 3.0 / 16.0;
    if m.abs() >= 1.0 {
        if m > 0.0 {
            1.0
        } else {
            0.0
        }
    } else {
        0.25 * (m + 1.0).powi(2) * (2.0 - m) + ALPHA * m * (m * m - 1.0).powi(2)
    }
}

fn pressure_split_minus(m: f64) -> f64 {
    const ALPHA: f64 = 3.0 / 16.0;
    if m.abs() >= 1.0 {
        if m < 0.0 {
            1.0
        } else {
            0.0
        }
    } else {
        0.25 * (m - 1.0).powi(2) * (2.0 + m) - ALPHA * m * (m * m - 1.0).powi(2)
    }
}

/// AUSM+ 对流迎风分裂
pub fn ausm_flux(wl: &Primitive, wr: &Primitive, normal: DVec3, phys: &PhysicsSet) -> RecordData {
    let layout = wl.layout();
    let a_half = 0.5 * (phys.sound_speed(wl) + phys.sound_speed(wr));
    let ml = wl.velocity().dot(normal) / a_half;
    let mr = wr.velocity().dot(normal) / a_half;

    let m_half = mach_split_plus(ml) + mach_split_minus(mr);
    let p_half = pressure_split_plus(ml) * wl.p() + pressure_split_minus(mr) * wr.p();

    // 质量通量迎风，被携带量 Ψ = [Y_s, v, H, q]
    let mass = a_half
        * (m_half.max(0.0) * wl.rho() + m_half.min(0.0) * wr.rho());
    let up = if m_half >= 0.0 { wl } else { wr };
    let h_up = phys.total_enthalpy(up);

    let mut f: RecordData = smallvec::smallvec![0.0; layout.n_eqns()];
    let mf_up = up.mass_fractions();
    for s in 0..layout.n_species() {
        f[s] = mass * mf_up[s];
    }
    let v_up = up.velocity();
    f[layout.mx()] = mass * v_up.x + p_half * normal.x;
    f[layout.my()] = mass * v_up.y + p_half * normal.y;
    f[layout.mz()] = mass * v_up.z + p_half * normal.z;
    f[layout.energy()] = mass * h_up;
    if layout.is_rans() {
        f[layout.turb(0)] = mass * up.tke();
        f[layout.turb(1)] = mass * up.sdr();
    }
    f
}

// ============================================================
// HLL 与 Rusanov
// ============================================================

/// HLL 双波近似
pub fn hll_flux(wl: &Primitive, wr: &Primitive, normal: DVec3, phys: &PhysicsSet) -> RecordData {
    let layout = wl.layout();
    let (rho_l, rho_r) = (wl.rho(), wr.rho());
    let r = (rho_r / rho_l).sqrt();
    let denom = 1.0 + r;
    let v_hat = (wl.velocity() + wr.velocity() * r) / denom;
    let h_hat = (phys.total_enthalpy(wl) + phys.total_enthalpy(wr) * r) / denom;
    let mf_hat: Vec<f64> = wl
        .mass_fractions()
        .iter()
        .zip(&wr.mass_fractions())
        .map(|(yl, yr)| (yl + yr * r) / denom)
        .collect();
    let gamma_hat = phys.eos.gamma(&mf_hat);
    let a_hat = ((gamma_hat - 1.0) * (h_hat - 0.5 * v_hat.length_squared()))
        .max(1.0e-14)
        .sqrt();
    let vn_hat = v_hat.dot(normal);

    let vn_l = wl.velocity().dot(normal);
    let vn_r = wr.velocity().dot(normal);
    let sl = (vn_l - phys.sound_speed(wl)).min(vn_hat - a_hat);
    let sr = (vn_r + phys.sound_speed(wr)).max(vn_hat + a_hat);

    if sl >= 0.0 {
        return euler_flux(wl, normal, phys);
    }
    if sr <= 0.0 {
        return euler_flux(wr, normal, phys);
    }
    let fl = euler_flux(wl, normal, phys);
    let fr = euler_flux(wr, normal, phys);
    let ul = phys.prim_to_cons(wl);
    let ur = phys.prim_to_cons(wr);
    (0..layout.n_eqns())
        .map(|e| {
            (sr * fl[e] - sl * fr[e] + sl * sr * (ur.data()[e] - ul.data()[e])) / (sr - sl)
        })
        .collect()
}

/// Rusanov（局部 Lax-Friedrichs）
pub fn rusanov_flux(
    wl: &Primitive,
    wr: &Primitive,
    normal: DVec3,
    phys: &PhysicsSet,
) -> RecordData {
    let layout = wl.layout();
    let lambda = max_wave_speed(wl, wr, normal, phys);
    let fl = euler_flux(wl, normal, phys);
    let fr = euler_flux(wr, normal, phys);
    let ul = phys.prim_to_cons(wl);
    let ur = phys.prim_to_cons(wr);
    (0..layout.n_eqns())
        .map(|e| 0.5 * (fl[e] + fr[e]) - 0.5 * lambda * (ur.data()[e] - ul.data()[e]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use af_config::Input;

    fn physics() -> PhysicsSet {
        PhysicsSet::from_input(&Input::default())
    }

    fn state(phys: &PhysicsSet, rho: f64, u: f64, p: f64) -> Primitive {
        Primitive::assemble(phys.layout, &[rho], DVec3::new(u, 0.0, 0.0), p, 0.0, 0.0)
    }

    const ALL: [FluxFunction; 4] = [
        FluxFunction::Roe,
        FluxFunction::Ausm,
        FluxFunction::Hll,
        FluxFunction::Rusanov,
    ];

    #[test]
    fn test_consistency_all_fluxes() {
        let phys = physics();
        let w = state(&phys, 0.9, 0.35, 0.68);
        let n = DVec3::new(0.6, 0.8, 0.0);
        let exact = euler_flux(&w, n, &phys);
        for kind in ALL {
            let f = inviscid_flux(kind, &w, &w, n, &phys);
            for (a, b) in f.iter().zip(&exact) {
                assert!(
                    (a - b).abs() < 1e-12,
                    "{:?} 不一致: {} vs {}",
                    kind,
                    a,
                    b
                );
            }
        }
    }

    #[test]
    fn test_supersonic_upwind_direction() {
        let phys = physics();
        // 右行超声速：通量 = 左状态通量
        let wl = state(&phys, 1.0, 2.5, 0.7);
        let wr = state(&phys, 0.5, 2.0, 0.3);
        let n = DVec3::X;
        let exact = euler_flux(&wl, n, &phys);
        for kind in ALL {
            let f = inviscid_flux(kind, &wl, &wr, n, &phys);
            for (a, b) in f.iter().zip(&exact) {
                assert!((a - b).abs() < 1e-10, "{:?} 迎风错误", kind);
            }
        }
    }

    #[test]
    fn test_roe_captures_stationary_contact() {
        let phys = physics();
        // 等压等速、密度间断：接触面无压力/速度跳动
        let wl = state(&phys, 1.0, 0.0, 0.5);
        let wr = state(&phys, 0.5, 0.0, 0.5);
        let f = roe_flux(&wl, &wr, DVec3::X, &phys);
        // 静止接触面的质量通量为零
        assert!(f[0].abs() < 1e-12);
        // 动量通量只剩压力项
        assert!((f[phys.layout.mx()] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_rusanov_dissipation_sign() {
        let phys = physics();
        let wl = state(&phys, 1.0, 0.1, 0.7);
        let wr = state(&phys, 0.9, 0.1, 0.6);
        let f = rusanov_flux(&wl, &wr, DVec3::X, &phys);
        let central: Vec<f64> = euler_flux(&wl, DVec3::X, &phys)
            .iter()
            .zip(&euler_flux(&wr, DVec3::X, &phys))
            .map(|(a, b)| 0.5 * (a + b))
            .collect();
        // ρR < ρL → 耗散给质量通量加正贡献
        assert!(f[0] > central[0]);
    }
}
