// crates/af_physics/tests/two_block.rs

//! 两块等价性
//!
//! 把单块槽道在 i = 中点切开、接缝用 interblock 连接（方位码 1），
//! 推进一个显式步后两种剖分给出位级一致的解。

mod common;

use af_config::{BlockBcConfig, Input};
use af_grid::{Axis, BoundaryConditions, Plot3dBlock, SingleComm};
use af_physics::solver::march;
use af_physics::PhysicsSet;
use glam::DVec3;

const NI: usize = 8;
const NJ: usize = 4;
const NK: usize = 2;

fn channel_input() -> Input {
    let mut inp = common::channel_input(DVec3::new(1.0, 0.5, 0.25));
    inp.time.iterations = 1;
    // 初始给一个 i 方向的小扰动压力场，避免平凡等价
    inp
}

fn single_block() -> (Plot3dBlock, BoundaryConditions, Input) {
    let inp = channel_input();
    let plot3d = Plot3dBlock::uniform(DVec3::ZERO, DVec3::new(1.0, 0.5, 0.25), NI, NJ, NK);
    let surfaces = common::surfaces_of([
        ("subsonicInflow", 1),
        ("pressureOutlet", 2),
        ("slipWall", 0),
        ("slipWall", 0),
        ("periodic", 9),
        ("periodic", 9),
    ]);
    let bc =
        BoundaryConditions::from_config((NI, NJ, NK), &BlockBcConfig { block: 0, surfaces })
            .unwrap();
    (plot3d, bc, inp)
}

/// 对两个层级各推进一步并扰动同一初始场
fn run_one_iteration(
    geom: Vec<(Plot3dBlock, BoundaryConditions)>,
    inp: &Input,
    physics: &PhysicsSet,
    perturb: impl Fn(usize, (isize, isize, isize)) -> (isize, isize, isize),
) -> Vec<af_physics::Primitive> {
    let comm = SingleComm::new();
    let mut level = common::build_level(geom, inp, physics, &comm);
    // 按全局单元号施加同一压力扰动
    for b in 0..level.blocks.len() {
        let cells: Vec<_> = level.blocks[b].range_physical().iter().collect();
        for c in cells {
            let (gi, gj, gk) = perturb(b, c);
            let mut w = level.blocks[b].primitive(c.0, c.1, c.2);
            let bump = 1.0 + 0.01 * ((gi * 31 + gj * 7 + gk * 3) % 11) as f64 / 11.0;
            w.set_p(w.p() * bump);
            level.blocks[b].set_primitive(c.0, c.1, c.2, &w);
        }
    }
    let mut levels = vec![level];
    march(&mut levels, inp, physics, &comm, |_, _, _| Ok(())).unwrap();

    // 收集全局序的解
    let mut out = Vec::new();
    for gi in 0..NI as isize {
        for gj in 0..NJ as isize {
            for gk in 0..NK as isize {
                // 定位拥有该全局单元的块
                let mut found = None;
                for b in 0..levels[0].blocks.len() {
                    let cells: Vec<_> = levels[0].blocks[b].range_physical().iter().collect();
                    for c in &cells {
                        if perturb(b, *c) == (gi, gj, gk) {
                            found = Some(levels[0].blocks[b].primitive(c.0, c.1, c.2));
                        }
                    }
                }
                out.push(found.expect("全局单元必有归属"));
            }
        }
    }
    out
}

#[test]
fn test_split_channel_matches_single_block_after_one_iteration() {
    let (plot3d, bc, inp) = single_block();
    let physics = PhysicsSet::from_input(&inp);

    // 单块
    let single = run_one_iteration(
        vec![(plot3d.clone(), bc.clone())],
        &inp,
        &physics,
        |_b, c| c,
    );

    // 在 i = NI/2 处切开
    let split_at = NI / 2;
    let mut lower_geom = plot3d.clone();
    let upper_geom = lower_geom.split(Axis::I, split_at).unwrap();
    let (lower_bc, upper_bc) = bc.split(Axis::I, split_at, (NI, NJ, NK));
    let two = run_one_iteration(
        vec![(lower_geom, lower_bc), (upper_geom, upper_bc)],
        &inp,
        &physics,
        move |b, c| {
            if b == 0 {
                c
            } else {
                (c.0 + split_at as isize, c.1, c.2)
            }
        },
    );

    assert_eq!(single.len(), two.len());
    for (ws, wt) in single.iter().zip(&two) {
        for (a, b) in ws.data().iter().zip(wt.data()) {
            assert!(
                (a - b).abs() < 1e-12 * a.abs().max(1.0),
                "两块剖分结果不一致: {} vs {}",
                a,
                b
            );
        }
    }
}

#[test]
fn test_seam_connection_orientation_one() {
    // 切分产生的接缝连接必须是方位码 1 的 interblock
    let (plot3d, bc, inp) = single_block();
    let mut lower = plot3d.clone();
    let upper = lower.split(Axis::I, NI / 2).unwrap();
    let (lb, ub) = bc.split(Axis::I, NI / 2, (NI, NJ, NK));
    let l_ref = inp.reference.length;
    let conns = af_grid::find_connections(&[(lower, lb), (upper, ub)], |tag| {
        inp.bc_tag(tag)
            .and_then(|t| t.periodic.as_ref())
            .map(|p| DVec3::new(p.translation[0], p.translation[1], p.translation[2]) / l_ref)
    })
    .unwrap();
    let seam = conns
        .iter()
        .find(|c| !c.periodic)
        .expect("接缝连接存在");
    assert_eq!(seam.orientation, 1);
}
