// crates/af_physics/tests/channel_decay.rs

//! 亚声速槽道瞬态衰减
//!
//! 均匀来流 + 中段压力扰动，一阶迎风推进后扰动被耗散、
//! 残差显著回落，全场保持物理。

mod common;

use af_config::{BlockBcConfig, Reconstruction};
use af_grid::{BoundaryConditions, Plot3dBlock, SingleComm};
use af_physics::solver::march;
use af_physics::PhysicsSet;
use glam::DVec3;

#[test]
fn test_pressure_bump_decays_in_channel() {
    let mut inp = common::channel_input(DVec3::new(1.0, 0.5, 0.25));
    inp.time.iterations = 120;
    inp.time.cfl = 0.5;
    inp.schemes.reconstruction = Reconstruction::FirstOrder;

    let (ni, nj, nk) = (16usize, 8usize, 2usize);
    let surfaces = common::surfaces_of([
        ("subsonicInflow", 1),
        ("pressureOutlet", 2),
        ("slipWall", 0),
        ("slipWall", 0),
        ("periodic", 9),
        ("periodic", 9),
    ]);
    inp.boundaries = vec![BlockBcConfig { block: 0, surfaces }];

    let physics = PhysicsSet::from_input(&inp);
    let plot3d = Plot3dBlock::uniform(DVec3::ZERO, DVec3::new(1.0, 0.5, 0.25), ni, nj, nk);
    let bc = BoundaryConditions::from_config(
        (ni, nj, nk),
        &inp.boundaries[0],
    )
    .unwrap();
    let comm = SingleComm::new();
    let mut level = common::build_level(vec![(plot3d, bc)], &inp, &physics, &comm);

    // 中段 1% 压力鼓包
    for (i, j, k) in level.blocks[0].range_physical().iter() {
        if (6..10).contains(&i) {
            let mut w = level.blocks[0].primitive(i, j, k);
            w.set_p(w.p() * 1.01);
            level.blocks[0].set_primitive(i, j, k, &w);
        }
    }

    let mut history: Vec<f64> = Vec::new();
    let mut levels = vec![level];
    let summary = march(&mut levels, &inp, &physics, &comm, |_, norms, _| {
        history.push(norms.l2_total());
        Ok(())
    })
    .unwrap();

    assert!(!summary.diverged);
    let peak = history.iter().cloned().fold(0.0f64, f64::max);
    let last = *history.last().expect("有历史");
    assert!(peak > 0.0);
    assert!(
        last < 0.5 * peak,
        "残差未衰减: 峰值 {:e}, 末值 {:e}",
        peak,
        last
    );
    // 全场物理
    for (i, j, k) in levels[0].blocks[0].range_physical().iter() {
        assert!(levels[0].blocks[0].primitive(i, j, k).is_physical());
    }
}
