// crates/af_physics/tests/distributed.rs

//! 跨进程一致性
//!
//! 两块槽道在 1 个与 2 个 rank（线程网格）上各推进若干步，
//! 解必须位级一致：跨进程的成对标签交换与同进程直接交换
//! 等价。

mod common;

use af_config::{BlockBcConfig, Input};
use af_grid::{Axis, BoundaryConditions, Comm, Decomposition, Plot3dBlock, SingleComm, ThreadComm};
use af_physics::solver::{march, GridLevel};
use af_physics::PhysicsSet;
use glam::DVec3;

const NI: usize = 8;
const NJ: usize = 4;
const NK: usize = 2;

fn two_block_geometry() -> Vec<(Plot3dBlock, BoundaryConditions)> {
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
    let mut lower = plot3d;
    let upper = lower.split(Axis::I, NI / 2).unwrap();
    let (lb, ub) = bc.split(Axis::I, NI / 2, (NI, NJ, NK));
    vec![(lower, lb), (upper, ub)]
}

/// 某 rank 上推进并返回 (全局块号, 状态底层数据)
fn run_on(
    comm: &dyn Comm,
    decomp: Decomposition,
    inp: &Input,
    physics: &PhysicsSet,
) -> Vec<(usize, Vec<f64>)> {
    let geom = two_block_geometry();
    let mut level = GridLevel::build(geom, decomp, inp, physics, comm).unwrap();
    // 确定性的初始扰动（按全局单元标号）
    for b in 0..level.blocks.len() {
        let parent = level.blocks[b].id().parent;
        let cells: Vec<_> = level.blocks[b].range_physical().iter().collect();
        for (i, j, k) in cells {
            let gi = i + if parent == 1 { (NI / 2) as isize } else { 0 };
            let mut w = level.blocks[b].primitive(i, j, k);
            w.set_p(w.p() * (1.0 + 0.005 * ((gi * 13 + j * 5 + k) % 7) as f64));
            level.blocks[b].set_primitive(i, j, k, &w);
        }
    }
    let mut levels = vec![level];
    march(&mut levels, inp, physics, comm, |_, _, _| Ok(())).unwrap();
    levels[0]
        .blocks
        .iter()
        .map(|b| {
            let mut flat = Vec::new();
            for c in b.range_physical().iter() {
                flat.extend_from_slice(b.state().record(c.0, c.1, c.2));
            }
            (b.id().parent, flat)
        })
        .collect()
}

#[test]
fn test_two_ranks_match_single_rank() {
    let mut inp = common::channel_input(DVec3::new(1.0, 0.5, 0.25));
    inp.time.iterations = 3;
    inp.boundaries = Vec::new(); // 几何在测试内直接装配
    let physics = PhysicsSet::from_input(&inp);

    // 单 rank 基准
    let comm = SingleComm::new();
    let mut baseline = run_on(&comm, Decomposition::serial(2), &inp, &physics);
    baseline.sort_by_key(|(g, _)| *g);

    // 双 rank
    let mesh = ThreadComm::mesh(2);
    let decomp = Decomposition::decompose(&[NI * NJ * NK / 2; 2], 2).unwrap();
    let mut handles = Vec::new();
    for comm in mesh {
        let inp = inp.clone();
        let physics = physics.clone();
        let decomp = decomp.clone();
        handles.push(std::thread::spawn(move || {
            run_on(&comm, decomp, &inp, &physics)
        }));
    }
    let mut distributed: Vec<(usize, Vec<f64>)> = Vec::new();
    for h in handles {
        distributed.extend(h.join().unwrap());
    }
    distributed.sort_by_key(|(g, _)| *g);

    assert_eq!(baseline.len(), distributed.len());
    for ((gb, base), (gd, dist)) in baseline.iter().zip(&distributed) {
        assert_eq!(gb, gd);
        assert_eq!(base.len(), dist.len());
        for (a, b) in base.iter().zip(dist) {
            assert!(
                (a - b).abs() < 1e-12 * a.abs().max(1.0),
                "块 {} 状态不一致: {} vs {}",
                gb,
                a,
                b
            );
        }
    }
}
