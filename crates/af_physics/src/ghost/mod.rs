// crates/af_physics/src/ghost/mod.rs

//!幽灵单元协议
//!
//! 非连接边界的状态幽灵赋值：按边界面的 BC 类型调度，首层幽灵
//! 取真实边界条件，深层线性延拓。壁面类边界同时填充壁面数据。
//!
//! 棱幽灵延拓规则（两个相邻侧面 b₂、b₃）：
//! - 恰有一侧是壁面：以壁面侧法向把壁面条件延拓进棱单元
//! - 两侧同为壁面或同为非壁面：层数相等取两常规幽灵的平均，
//!   否则取深侧值
//! - 角幽灵只服务单元到节点插值，取三个相邻棱幽灵的算术平均
//!
//! 连接类边界（interblock / periodic）由交换层填充，这里跳过。

pub mod wall;

use af_config::Input;
use af_foundation::{AfError, AfResult};
use af_grid::{Axis, BcType, BoundarySurface};
use glam::DVec3;

use crate::block::ProcBlock;
use crate::models::PhysicsSet;
use crate::vars::Primitive;
use wall::wall_law_friction_velocity;

/// 边界条件上下文（调度器合同的参数包）
pub struct BcCtx<'a> {
    /// 输入
    pub inp: &'a Input,
    /// 物理模型
    pub physics: &'a PhysicsSet,
    /// 面外法向（单位）
    pub normal: DVec3,
    /// 第一层内部单元壁距
    pub wall_dist: f64,
    /// 面类型 1..=6
    pub surface_type: u8,
    /// 标签号
    pub tag: u32,
    /// 面片平均马赫数（非反射出口）
    pub avg_mach: f64,
    /// 面片最大马赫数（非反射出口）
    pub max_mach: f64,
    /// 当前单元时间步（非反射松弛）
    pub dt: f64,
}

/// 给整块的非连接边界赋幽灵状态
pub fn assign_ghost_cells(
    block: &mut ProcBlock,
    inp: &Input,
    physics: &PhysicsSet,
) -> AfResult<()> {
    let surfaces: Vec<BoundarySurface> = block
        .bc()
        .surfaces()
        .iter()
        .filter(|s| !s.bc.is_connection())
        .copied()
        .collect();

    for surf in &surfaces {
        // 面片马赫统计（非反射出口的素材；跨进程归约由调用方自选）
        let (avg_mach, max_mach) = patch_mach(block, surf, physics);
        assign_surface_ghosts(block, surf, inp, physics, avg_mach, max_mach)?;
    }
    assign_edge_ghost_states(block, inp, physics)?;
    assign_corner_ghost_states(block);
    block.update_derived(physics);
    Ok(())
}

/// 面片上内部单元的平均/最大法向马赫数
fn patch_mach(block: &ProcBlock, surf: &BoundarySurface, physics: &PhysicsSet) -> (f64, f64) {
    let mut sum = 0.0;
    let mut max = 0.0_f64;
    let mut count = 0usize;
    for d2 in surf.r2.0..surf.r2.1 {
        for d1 in surf.r1.0..surf.r1.1 {
            let ci = surf.interior_cell(d1, d2);
            let w = block.primitive(ci.0, ci.1, ci.2);
            let fi = surf.assemble(d1 as isize, d2 as isize, surf.d3_face as isize);
            let n = block.face_area(surf.direction3(), fi.0, fi.1, fi.2).unit;
            let m = w.velocity().dot(n).abs() / physics.sound_speed(&w);
            sum += m;
            max = max.max(m);
            count += 1;
        }
    }
    (sum / count.max(1) as f64, max)
}

fn assign_surface_ghosts(
    block: &mut ProcBlock,
    surf: &BoundarySurface,
    inp: &Input,
    physics: &PhysicsSet,
    avg_mach: f64,
    max_mach: f64,
) -> AfResult<()> {
    let g = block.ghosts() as isize;
    let d3 = surf.direction3();
    for d2 in surf.r2.0..surf.r2.1 {
        for d1 in surf.r1.0..surf.r1.1 {
            let ci = surf.interior_cell(d1, d2);
            let w_int = block.primitive(ci.0, ci.1, ci.2);
            let fi = surf.assemble(d1 as isize, d2 as isize, surf.d3_face as isize);
            let normal = block.face_area(d3, fi.0, fi.1, fi.2).unit * surf.outward_sign();
            let ctx = BcCtx {
                inp,
                physics,
                normal,
                wall_dist: block.wall_distance(ci.0, ci.1, ci.2),
                surface_type: surf.side,
                tag: surf.tag,
                avg_mach,
                max_mach,
                dt: block.time_step(ci.0.clamp(0, block.dims().0 as isize - 1),
                                    ci.1.clamp(0, block.dims().1 as isize - 1),
                                    ci.2.clamp(0, block.dims().2 as isize - 1)),
            };
            let ghost1 = ghost_state(surf.bc, &w_int, &ctx, block, surf, d1, d2)?;

            // 首层真实边界条件，深层线性延拓
            for l in 1..=g {
                let gi = ghost_index(surf, d1, d2, l, block);
                let w_l = extend_ghost(&w_int, &ghost1, l);
                block.set_primitive(gi.0, gi.1, gi.2, &w_l);
            }
        }
    }
    Ok(())
}

/// 幽灵索引（层 l ≥ 1）
fn ghost_index(
    surf: &BoundarySurface,
    d1: usize,
    d2: usize,
    l: isize,
    block: &ProcBlock,
) -> (isize, isize, isize) {
    let n3 = block.num_along(surf.direction3()) as isize;
    let d3 = if surf.is_lower() { -l } else { n3 + l - 1 };
    surf.assemble(d1 as isize, d2 as isize, d3)
}

/// 线性延拓第 l 层幽灵：W_l = l·W₁ − (l−1)·W_int，ρ、P 保持正
fn extend_ghost(w_int: &Primitive, ghost1: &Primitive, l: isize) -> Primitive {
    if l == 1 {
        return ghost1.clone();
    }
    let lf = l as f64;
    let mut out = ghost1.clone() * lf - &(w_int.clone() * (lf - 1.0));
    let layout = out.layout();
    let floor_rho = 1.0e-10;
    // 密度与压力下限保护
    for s in 0..layout.n_species() {
        let v = out.data()[s];
        if v < 0.0 {
            out.data_mut()[s] = 0.0;
        }
    }
    if out.rho() < floor_rho {
        let w = ghost1.clone();
        return w;
    }
    if out.p() < 1.0e-10 {
        out.set_p(ghost1.p());
    }
    out
}

// ============================================================
// BC 调度
// ============================================================

#[allow(clippy::too_many_arguments)]
fn ghost_state(
    bc: BcType,
    w_int: &Primitive,
    ctx: &BcCtx<'_>,
    block: &mut ProcBlock,
    surf: &BoundarySurface,
    d1: usize,
    d2: usize,
) -> AfResult<Primitive> {
    match bc {
        BcType::SlipWall => Ok(slip_wall_ghost(w_int, ctx)),
        BcType::ViscousWall => Ok(viscous_wall_ghost(w_int, ctx, block, surf, d1, d2)),
        BcType::Characteristic => Ok(characteristic_ghost(w_int, ctx)),
        BcType::PressureOutlet => pressure_outlet_ghost(w_int, ctx),
        BcType::SubsonicInflow => inflow_ghost(w_int, ctx, false),
        BcType::SupersonicInflow => inflow_ghost(w_int, ctx, true),
        BcType::StagnationInlet => stagnation_ghost(w_int, ctx),
        BcType::Inlet => inlet_ghost(w_int, ctx),
        BcType::Periodic | BcType::Interblock => Ok(w_int.clone()),
    }
}

/// 滑移壁：法向速度反号，切向、密度、压力保持
fn slip_wall_ghost(w_int: &Primitive, ctx: &BcCtx<'_>) -> Primitive {
    let mut out = w_int.clone();
    let v = w_int.velocity();
    let vn = v.dot(ctx.normal);
    out.set_velocity(v - 2.0 * vn * ctx.normal);
    out
}

/// 黏性壁：无滑移 + 表面热条件，同时填充壁面数据
fn viscous_wall_ghost(
    w_int: &Primitive,
    ctx: &BcCtx<'_>,
    block: &mut ProcBlock,
    surf: &BoundarySurface,
    d1: usize,
    d2: usize,
) -> Primitive {
    let physics = ctx.physics;
    let tag = ctx.inp.bc_tag(ctx.tag).and_then(|t| t.wall.as_ref());
    let v_wall = tag
        .map(|w| {
            DVec3::new(w.velocity[0], w.velocity[1], w.velocity[2])
                / ctx.inp.reference.sound_speed
        })
        .unwrap_or(DVec3::ZERO);
    let t_wall_spec = tag
        .and_then(|w| w.temperature)
        .map(|t| t / ctx.inp.reference.temperature);
    let use_wall_law = tag.map(|w| w.wall_law).unwrap_or(false);

    let mut out = w_int.clone();
    out.set_velocity(2.0 * v_wall - w_int.velocity());

    let t_int = physics.temperature(w_int);
    let t_ghost = match t_wall_spec {
        Some(tw) => 2.0 * tw - t_int,
        None => t_int, // 绝热
    };
    let t_ghost = t_ghost.max(1.0e-4);
    // 压力零法向梯度；密度由状态方程回算
    let mf = w_int.mass_fractions();
    let rho_ghost = w_int.p() / (physics.eos.gas_constant(&mf) * t_ghost);
    out.set_rho(rho_ghost);

    // 湍流壁条件：k 反号清零，ω 取壁面值
    let mu_int = physics.transport.viscosity(t_int, &mf);
    if w_int.layout().is_rans() {
        let sdr_wall = physics.turbulence.wall_sdr(w_int, mu_int, ctx.wall_dist);
        out.set_turb(-w_int.tke(), (2.0 * sdr_wall - w_int.sdr()).max(sdr_wall));
    }

    // 壁面数据
    let t_wall = t_wall_spec.unwrap_or(t_int);
    let rho_wall = w_int.p() / (physics.eos.gas_constant(&mf) * t_wall);
    let mu_wall = physics.transport.viscosity(t_wall, &mf);
    let v_rel = w_int.velocity() - v_wall;
    let u_tan_vec = v_rel - v_rel.dot(ctx.normal) * ctx.normal;
    let u_tan = u_tan_vec.length();
    let nu_wall = physics.mu_flow(mu_wall) / rho_wall;
    let utau = if use_wall_law {
        wall_law_friction_velocity(u_tan, ctx.wall_dist, nu_wall)
    } else {
        (nu_wall * u_tan / ctx.wall_dist.max(1.0e-30)).max(0.0).sqrt()
    };
    let cp = physics.thermo.cp(t_wall, &mf);
    let conductivity = cp * physics.mu_flow(mu_wall) / physics.transport.prandtl();
    let q_wall = match t_wall_spec {
        Some(tw) => conductivity * (t_int - tw) / ctx.wall_dist.max(1.0e-30),
        None => tag.map(|w| w.heat_flux).unwrap_or(0.0),
    };
    let shear = if u_tan > 0.0 {
        u_tan_vec / u_tan * rho_wall * utau * utau
    } else {
        DVec3::ZERO
    };
    let yplus = ctx.wall_dist * utau / nu_wall.max(1.0e-30);

    let layout = w_int.layout();
    if let Some(wd) = block
        .wall_data
        .iter_mut()
        .find(|wd| wd.surface == *surf)
    {
        let vars = wd.at_mut(d1, d2);
        vars.shear = shear;
        vars.heat_flux = q_wall;
        vars.yplus = yplus;
        vars.friction_velocity = utau;
        vars.temperature = t_wall;
        vars.density = rho_wall;
        vars.viscosity = mu_wall;
        vars.eddy_viscosity = 0.0;
        vars.tke = 0.0;
        vars.sdr = if layout.is_rans() {
            ctx.physics.turbulence.wall_sdr(w_int, mu_int, ctx.wall_dist)
        } else {
            0.0
        };
        vars.mass_fractions = mf.clone();
    }
    out
}

/// 特征远场：按法向马赫数分四种情形
fn characteristic_ghost(w_int: &Primitive, ctx: &BcCtx<'_>) -> Primitive {
    let physics = ctx.physics;
    let free = external_state(ctx).unwrap_or_else(|| w_int.clone());
    let a_int = physics.sound_speed(w_int);
    let vn_int = w_int.velocity().dot(ctx.normal);
    let m = vn_int / a_int;

    if m >= 1.0 {
        // 超声速出流：全部外推
        return w_int.clone();
    }
    if m <= -1.0 {
        // 超声速入流：全部给定
        return free;
    }
    let gamma = physics.eos.gamma(&w_int.mass_fractions());
    let a_free = physics.sound_speed(&free);
    let vn_free = free.velocity().dot(ctx.normal);
    // 出入特征
    let r_plus = vn_int + 2.0 * a_int / (gamma - 1.0);
    let r_minus = vn_free - 2.0 * a_free / (gamma - 1.0);
    let vn_b = 0.5 * (r_plus + r_minus);
    let a_b = 0.25 * (gamma - 1.0) * (r_plus - r_minus);

    // 亚声速：熵与切向取上游
    let upstream = if vn_b >= 0.0 { w_int } else { &free };
    let v_b = upstream.velocity() + (vn_b - upstream.velocity().dot(ctx.normal)) * ctx.normal;
    let s = upstream.p() / upstream.rho().powf(gamma);
    let rho_b = (a_b * a_b / (gamma * s)).powf(1.0 / (gamma - 1.0));
    let p_b = s * rho_b.powf(gamma);

    let rho_species: Vec<f64> = upstream
        .mass_fractions()
        .iter()
        .map(|y| y * rho_b)
        .collect();
    Primitive::assemble(
        w_int.layout(),
        &rho_species,
        v_b,
        p_b,
        upstream.tke(),
        upstream.sdr(),
    )
}

/// 压力出口：背压给定，其余外推
fn pressure_outlet_ghost(w_int: &Primitive, ctx: &BcCtx<'_>) -> AfResult<Primitive> {
    let p_back = ctx
        .inp
        .bc_tag(ctx.tag)
        .and_then(|t| t.back_pressure)
        .ok_or_else(|| AfError::unknown_bc(format!("pressureOutlet 标签 {} 缺背压", ctx.tag)))?
        / ctx.inp.reference.pressure();
    let mut out = w_int.clone();
    out.set_p((2.0 * p_back - w_int.p()).max(0.01 * p_back));
    Ok(out)
}

/// 标签表中的入口外部状态
fn external_state(ctx: &BcCtx<'_>) -> Option<Primitive> {
    let tag = ctx.inp.bc_tag(ctx.tag)?;
    let inlet = tag.inlet.as_ref()?;
    Some(ctx.physics.nondimensionalize(
        ctx.inp,
        inlet.density,
        inlet.velocity,
        inlet.pressure,
        inlet.tke,
        inlet.sdr,
        &inlet.mass_fractions,
    ))
}

/// 入口：亚声速给定 ρ、v、湍流量而压力外推，超声速全部给定
fn inflow_ghost(w_int: &Primitive, ctx: &BcCtx<'_>, supersonic: bool) -> AfResult<Primitive> {
    let spec = external_state(ctx).ok_or_else(|| {
        AfError::unknown_bc(format!("入口标签 {} 缺入口状态", ctx.tag))
    })?;
    if supersonic {
        return Ok(spec);
    }
    // 线性写出使面值等于给定值；压力从内部外推
    let mut out = spec.clone() * 2.0 - w_int;
    out.set_p(w_int.p());
    let layout = out.layout();
    for s in 0..layout.n_species() {
        if out.data()[s] < 0.0 {
            out.data_mut()[s] = spec.data()[s];
        }
    }
    Ok(out)
}

/// 驻点入口：总压/总温 + 方向，静态量按等熵关系
fn stagnation_ghost(w_int: &Primitive, ctx: &BcCtx<'_>) -> AfResult<Primitive> {
    let physics = ctx.physics;
    let tag = ctx
        .inp
        .bc_tag(ctx.tag)
        .and_then(|t| t.stagnation.as_ref())
        .ok_or_else(|| AfError::unknown_bc(format!("stagnationInlet 标签 {} 缺数据", ctx.tag)))?;
    let r = &ctx.inp.reference;
    let p0 = tag.p0 / r.pressure();
    let t0 = tag.t0 / r.temperature;
    let dir = DVec3::new(tag.direction[0], tag.direction[1], tag.direction[2]).normalize();

    let mf = w_int.mass_fractions();
    let gamma = physics.eos.gamma(&mf);
    // 内部声速与速度给出马赫数估计
    let m = (w_int.velocity().length() / physics.sound_speed(w_int)).min(1.0);
    let factor = 1.0 + 0.5 * (gamma - 1.0) * m * m;
    let t_s = t0 / factor;
    let p_s = p0 * factor.powf(-gamma / (gamma - 1.0));
    let rho_s = p_s / (physics.eos.gas_constant(&mf) * t_s);
    let a_s = (gamma * p_s / rho_s).sqrt();
    let v = dir * (m * a_s);

    let rho_species: Vec<f64> = mf.iter().map(|y| y * rho_s).collect();
    Ok(Primitive::assemble(
        w_int.layout(),
        &rho_species,
        v,
        p_s,
        w_int.tke(),
        w_int.sdr(),
    ))
}

/// 通用入口：可选非反射压力松弛
fn inlet_ghost(w_int: &Primitive, ctx: &BcCtx<'_>) -> AfResult<Primitive> {
    let tag = ctx
        .inp
        .bc_tag(ctx.tag)
        .and_then(|t| t.inlet.as_ref())
        .ok_or_else(|| AfError::unknown_bc(format!("inlet 标签 {} 缺数据", ctx.tag)))?;
    let mut out = inflow_ghost(w_int, ctx, false)?;
    if tag.nonreflecting {
        // 低反射松弛：K = σ·(1 − M_max²)·ā/L，面压向给定值按 K·dt 靠拢
        const SIGMA: f64 = 0.25;
        let spec = external_state(ctx).expect("入口状态已校验");
        let a_avg = ctx.physics.sound_speed(w_int);
        let l = tag.length_scale / ctx.inp.reference.length;
        let k = SIGMA * (1.0 - ctx.max_mach * ctx.max_mach).max(0.0) * a_avg / l.max(1.0e-10);
        let blend = (k * ctx.dt).min(1.0);
        let p_relaxed = w_int.p() + blend * (spec.p() - w_int.p());
        out.set_p(p_relaxed);
    }
    Ok(out)
}

// ============================================================
// 棱与角幽灵
// ============================================================

/// 棱幽灵状态延拓
fn assign_edge_ghost_states(
    block: &mut ProcBlock,
    inp: &Input,
    physics: &PhysicsSet,
) -> AfResult<()> {
    let g = block.ghosts() as isize;
    let (ni, nj, nk) = block.dims();
    let dims = [ni as isize, nj as isize, nk as isize];

    for (a, b) in [(0usize, 1usize), (0, 2), (1, 2)] {
        let c = 3 - a - b;
        for sa in 0..2usize {
            for sb in 0..2usize {
                let side_a = (2 * a + 1 + sa) as u8;
                let side_b = (2 * b + 1 + sb) as u8;
                for m in 0..dims[c] {
                    // 贴边的物理单元，用它查两侧面的 BC
                    let mut corner_cell = [0isize; 3];
                    corner_cell[a] = if sa == 0 { 0 } else { dims[a] - 1 };
                    corner_cell[b] = if sb == 0 { 0 } else { dims[b] - 1 };
                    corner_cell[c] = m;
                    let bc_a = surface_bc_at(block, side_a, corner_cell);
                    let bc_b = surface_bc_at(block, side_b, corner_cell);
                    let (Some(bc_a), Some(bc_b)) = (bc_a, bc_b) else {
                        continue;
                    };

                    for la in 1..=g {
                        for lb in 1..=g {
                            let mut edge = corner_cell;
                            edge[a] = if sa == 0 { -la } else { dims[a] + la - 1 };
                            edge[b] = if sb == 0 { -lb } else { dims[b] + lb - 1 };
                            // 两侧常规幽灵
                            let mut reg_a = edge;
                            reg_a[b] = if sb == 0 { 0 } else { dims[b] - 1 };
                            let mut reg_b = edge;
                            reg_b[a] = if sa == 0 { 0 } else { dims[a] - 1 };

                            let wall_a = bc_a.0.is_wall();
                            let wall_b = bc_b.0.is_wall();
                            let w_edge = if wall_a != wall_b {
                                // 恰一侧为壁面：以壁面侧法向延拓壁面条件，
                                // 内部源取另一侧的常规幽灵
                                let (wall_side_is_a, wall_bc, wall_tag) = if wall_a {
                                    (true, bc_a.0, bc_a.1)
                                } else {
                                    (false, bc_b.0, bc_b.1)
                                };
                                let src = if wall_side_is_a {
                                    // 内部源：壁面轴拉回内部镜像，保持另一轴幽灵
                                    let mut s = edge;
                                    s[a] = if sa == 0 { la - 1 } else { dims[a] - la };
                                    s
                                } else {
                                    let mut s = edge;
                                    s[b] = if sb == 0 { lb - 1 } else { dims[b] - lb };
                                    s
                                };
                                let w_src = block.primitive(src[0], src[1], src[2]);
                                let (axis, lower) = if wall_side_is_a {
                                    (Axis::ALL[a], sa == 0)
                                } else {
                                    (Axis::ALL[b], sb == 0)
                                };
                                let normal =
                                    edge_wall_normal(block, axis, lower, corner_cell);
                                let ctx = BcCtx {
                                    inp,
                                    physics,
                                    normal,
                                    wall_dist: 0.0,
                                    surface_type: if wall_side_is_a { side_a } else { side_b },
                                    tag: wall_tag,
                                    avg_mach: 0.0,
                                    max_mach: 0.0,
                                    dt: 0.0,
                                };
                                match wall_bc {
                                    BcType::SlipWall => slip_wall_ghost(&w_src, &ctx),
                                    _ => {
                                        // 黏性壁：无滑移反射（不重复填壁面数据）
                                        let mut out = w_src.clone();
                                        out.set_velocity(-w_src.velocity());
                                        out
                                    }
                                }
                            } else if la == lb {
                                // 对称：两常规幽灵平均
                                let wa = block.primitive(reg_a[0], reg_a[1], reg_a[2]);
                                let wb = block.primitive(reg_b[0], reg_b[1], reg_b[2]);
                                (wa + &wb) * 0.5
                            } else if la > lb {
                                block.primitive(reg_a[0], reg_a[1], reg_a[2])
                            } else {
                                block.primitive(reg_b[0], reg_b[1], reg_b[2])
                            };
                            block.set_primitive(edge[0], edge[1], edge[2], &w_edge);
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

/// 查某侧面覆盖给定单元的 BC（连接面返回 None）
fn surface_bc_at(block: &ProcBlock, side: u8, cell: [isize; 3]) -> Option<(BcType, u32)> {
    let d3 = match side {
        1 | 2 => Axis::I,
        3 | 4 => Axis::J,
        _ => Axis::K,
    };
    let (a1, a2) = d3.transverse();
    let d1 = cell[a1.ord()] as usize;
    let d2 = cell[a2.ord()] as usize;
    block
        .bc()
        .surface_at(side, d1, d2)
        .filter(|s| !s.bc.is_connection())
        .map(|s| (s.bc, s.tag))
}

/// 棱延拓用的壁面外法向
fn edge_wall_normal(block: &ProcBlock, axis: Axis, lower: bool, cell: [isize; 3]) -> DVec3 {
    let mut fidx = cell;
    if !lower {
        fidx[axis.ord()] += 1;
    }
    let unit = block.face_area(axis, fidx[0], fidx[1], fidx[2]).unit;
    if lower {
        -unit
    } else {
        unit
    }
}

/// 角幽灵：三个相邻棱幽灵的算术平均（仅节点插值使用）
fn assign_corner_ghost_states(block: &mut ProcBlock) {
    let g = block.ghosts() as isize;
    let (ni, nj, nk) = block.dims();
    let dims = [ni as isize, nj as isize, nk as isize];
    for si in 0..2 {
        for sj in 0..2 {
            for sk in 0..2 {
                for li in 1..=g {
                    for lj in 1..=g {
                        for lk in 1..=g {
                            let idx = [
                                if si == 0 { -li } else { dims[0] + li - 1 },
                                if sj == 0 { -lj } else { dims[1] + lj - 1 },
                                if sk == 0 { -lk } else { dims[2] + lk - 1 },
                            ];
                            // 三个相邻棱幽灵：分别把一个轴拉回边界单元
                            let clamp = |axis: usize| -> [isize; 3] {
                                let mut out = idx;
                                out[axis] = if [si, sj, sk][axis] == 0 {
                                    0
                                } else {
                                    dims[axis] - 1
                                };
                                out
                            };
                            let e0 = clamp(0);
                            let e1 = clamp(1);
                            let e2 = clamp(2);
                            let w = (block.primitive(e0[0], e0[1], e0[2])
                                + &block.primitive(e1[0], e1[1], e1[2])
                                + &block.primitive(e2[0], e2[1], e2[2]))
                                * (1.0 / 3.0);
                            block.set_primitive(idx[0], idx[1], idx[2], &w);
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::tests::build_block_with;
    use af_config::EquationSet;

    fn prepared_block() -> (ProcBlock, Input, PhysicsSet) {
        let (mut b, inp, phys) = build_block_with((4, 4, 4), EquationSet::Euler);
        b.initialize_states(&inp, &phys).unwrap();
        // 给内部一个斜向速度场
        for (i, j, k) in b.range_physical().iter() {
            let mut w = b.primitive(i, j, k);
            w.set_velocity(glam::DVec3::new(0.3, 0.2, -0.1));
            b.set_primitive(i, j, k, &w);
        }
        (b, inp, phys)
    }

    #[test]
    fn test_slip_wall_ghost_symmetry() {
        // 法向分量反号，切向/密度/压力保持
        let (mut b, inp, phys) = prepared_block();
        assign_ghost_cells(&mut b, &inp, &phys).unwrap();
        let w_int = b.primitive(0, 0, 0);
        let w_ghost = b.primitive(-1, 0, 0);
        // i 下侧壁面法向 −x
        assert!((w_ghost.velocity().x + w_int.velocity().x).abs() < 1e-12);
        assert!((w_ghost.velocity().y - w_int.velocity().y).abs() < 1e-12);
        assert!((w_ghost.velocity().z - w_int.velocity().z).abs() < 1e-12);
        assert!((w_ghost.rho() - w_int.rho()).abs() < 1e-12);
        assert!((w_ghost.p() - w_int.p()).abs() < 1e-12);
    }

    #[test]
    fn test_deeper_layers_linear_extension() {
        let (mut b, inp, phys) = prepared_block();
        assign_ghost_cells(&mut b, &inp, &phys).unwrap();
        let w_int = b.primitive(0, 1, 1);
        let g1 = b.primitive(-1, 1, 1);
        let g2 = b.primitive(-2, 1, 1);
        // 线性：g2 = 2·g1 − int（分量级）
        for e in 0..w_int.layout().n_eqns() {
            let expect = 2.0 * g1.data()[e] - w_int.data()[e];
            assert!((g2.data()[e] - expect).abs() < 1e-12);
        }
    }

    #[test]
    fn test_viscous_wall_no_slip_face_value() {
        let (mut b, inp, phys) = build_block_with((4, 4, 2), EquationSet::NavierStokes);
        // j 下侧换成黏性壁
        for s in b.bc.surfaces_mut() {
            if s.side == 3 {
                s.bc = BcType::ViscousWall;
            }
        }
        b.wall_data = vec![crate::ghost::wall::WallData::new(
            *b.bc.surfaces().iter().find(|s| s.side == 3).unwrap(),
            1,
        )];
        b.initialize_states(&inp, &phys).unwrap();
        for (i, j, k) in b.range_physical().iter() {
            let mut w = b.primitive(i, j, k);
            w.set_velocity(glam::DVec3::new(0.4, 0.05, 0.0));
            b.set_primitive(i, j, k, &w);
        }
        assign_ghost_cells(&mut b, &inp, &phys).unwrap();
        // 插值壁面速度 = (内部 + 幽灵)/2 ≈ 0
        let w_int = b.primitive(1, 0, 0);
        let w_g = b.primitive(1, -1, 0);
        let face_v = 0.5 * (w_int.velocity() + w_g.velocity());
        assert!(face_v.length() < 1e-10, "壁面面速度 {}", face_v.length());
        // 壁面数据已填充
        let wd = &b.wall_data()[0];
        assert!(wd.at(1, 0).friction_velocity >= 0.0);
    }

    #[test]
    fn test_edge_extension_single_wall_matches_wall_alone() {
        // i 下为滑移壁、j 下为压力出口：棱幽灵等于对 j 常规幽灵
        // 单独施加壁面反射的结果
        let (mut b, mut inp, phys) = prepared_block();
        inp.bc_tags.push(af_config::BcTagData {
            tag: 7,
            wall: None,
            inlet: None,
            stagnation: None,
            back_pressure: Some(90000.0),
            periodic: None,
        });
        for s in b.bc.surfaces_mut() {
            if s.side == 3 {
                s.bc = BcType::PressureOutlet;
                s.tag = 7;
            }
        }
        assign_ghost_cells(&mut b, &inp, &phys).unwrap();
        // 棱幽灵 (-1, -1, 1)：i 侧是壁面 → 对 (0, -1, 1) 反射
        let w_src = b.primitive(0, -1, 1);
        let w_edge = b.primitive(-1, -1, 1);
        assert!((w_edge.velocity().x + w_src.velocity().x).abs() < 1e-12);
        assert!((w_edge.velocity().y - w_src.velocity().y).abs() < 1e-12);
        assert!((w_edge.rho() - w_src.rho()).abs() < 1e-12);
    }

    #[test]
    fn test_edge_extension_symmetric_average() {
        // 两侧同为滑移壁、层数相等：取两常规幽灵平均
        let (mut b, inp, phys) = prepared_block();
        assign_ghost_cells(&mut b, &inp, &phys).unwrap();
        let wa = b.primitive(0, -1, 1);
        let wb = b.primitive(-1, 0, 1);
        let w_edge = b.primitive(-1, -1, 1);
        for e in 0..w_edge.layout().n_eqns() {
            let expect = 0.5 * (wa.data()[e] + wb.data()[e]);
            assert!((w_edge.data()[e] - expect).abs() < 1e-12);
        }
    }

    #[test]
    fn test_pressure_outlet_back_pressure() {
        let (mut b, mut inp, phys) = prepared_block();
        inp.bc_tags.push(af_config::BcTagData {
            tag: 3,
            wall: None,
            inlet: None,
            stagnation: None,
            back_pressure: Some(90000.0),
            periodic: None,
        });
        for s in b.bc.surfaces_mut() {
            if s.side == 2 {
                s.bc = BcType::PressureOutlet;
                s.tag = 3;
            }
        }
        assign_ghost_cells(&mut b, &inp, &phys).unwrap();
        let p_back = 90000.0 / inp.reference.pressure();
        let w_int = b.primitive(3, 1, 1);
        let w_g = b.primitive(4, 1, 1);
        // 面压力 = 背压
        assert!((0.5 * (w_int.p() + w_g.p()) - p_back).abs() < 1e-12);
    }
}
