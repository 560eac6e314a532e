// crates/af_physics/tests/common/mod.rs

//! 集成测试公用的算例装配

#![allow(dead_code)]

use af_config::{
    BcTagData, BlockSide, EquationSet, InitialCondition, InletTagData, Input, PeriodicTagData,
    SurfaceConfig,
};
use af_grid::{BoundaryConditions, Comm, Decomposition, Plot3dBlock};
use af_physics::solver::GridLevel;
use af_physics::PhysicsSet;
use glam::DVec3;

/// 全侧同一 BC 的面列表
pub fn uniform_surfaces(bc: &str, tag: u32) -> Vec<SurfaceConfig> {
    [
        BlockSide::ILow,
        BlockSide::IHigh,
        BlockSide::JLow,
        BlockSide::JHigh,
        BlockSide::KLow,
        BlockSide::KHigh,
    ]
    .iter()
    .map(|&side| SurfaceConfig {
        side,
        bc: bc.to_string(),
        tag,
        range1: None,
        range2: None,
    })
    .collect()
}

/// 指定各侧 BC
pub fn surfaces_of(specs: [(&str, u32); 6]) -> Vec<SurfaceConfig> {
    [
        BlockSide::ILow,
        BlockSide::IHigh,
        BlockSide::JLow,
        BlockSide::JHigh,
        BlockSide::KLow,
        BlockSide::KHigh,
    ]
    .iter()
    .zip(specs)
    .map(|(&side, (bc, tag))| SurfaceConfig {
        side,
        bc: bc.to_string(),
        tag,
        range1: None,
        range2: None,
    })
    .collect()
}

/// 亚声速槽道输入（S1 形态）：i 进出口、j 滑移壁、k 周期
pub fn channel_input(extent: DVec3) -> Input {
    let mut inp = Input::default();
    inp.fluid.equation_set = EquationSet::Euler;
    inp.initial = InitialCondition::Uniform {
        density: 1.225,
        velocity: [50.0, 0.0, 0.0],
        pressure: 101325.0,
        tke: 0.0,
        sdr: 0.0,
        mass_fractions: vec![],
    };
    inp.bc_tags = vec![
        BcTagData {
            tag: 1,
            wall: None,
            inlet: Some(InletTagData {
                density: 1.225,
                velocity: [50.0, 0.0, 0.0],
                pressure: 101325.0,
                tke: 0.0,
                sdr: 0.0,
                mass_fractions: vec![],
                nonreflecting: false,
                length_scale: 1.0,
            }),
            stagnation: None,
            back_pressure: None,
            periodic: None,
        },
        BcTagData {
            tag: 2,
            wall: None,
            inlet: None,
            stagnation: None,
            back_pressure: Some(101325.0),
            periodic: None,
        },
        BcTagData {
            tag: 9,
            wall: None,
            inlet: None,
            stagnation: None,
            back_pressure: None,
            periodic: Some(PeriodicTagData {
                translation: [0.0, 0.0, extent.z],
            }),
        },
    ];
    inp
}

/// 由全局几何/边界在单进程上装配层级
pub fn build_level(
    geom: Vec<(Plot3dBlock, BoundaryConditions)>,
    inp: &Input,
    physics: &PhysicsSet,
    comm: &dyn Comm,
) -> GridLevel {
    let n = geom.len();
    GridLevel::build(geom, Decomposition::serial(n), inp, physics, comm).unwrap()
}
