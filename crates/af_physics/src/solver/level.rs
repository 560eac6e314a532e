// crates/af_physics/src/solver/level.rs

//! 网格层级
//!
//! 一个层级持有本进程的 procBlock 向量、全局连接表、线性
//! 求解器句柄与多重网格元数据。隐式单步的控制流（§ 驱动序列）：
//!
//! 1. 边界赋值 + 块间状态交换
//! 2. 逐块残差（无源）→ 梯度/涡黏/混合函数交换 → 源项
//! 3. 时间步 → 对角装配求逆 → 初始化解更新 → 松弛扫掠
//! 4. 套用解更新；最后一个非线性迭代轮换时间层
//!
//! 显式路径跳过 3 的矩阵部分，直接 RK/欧拉推进。

use af_config::Input;
use af_foundation::{AfError, AfResult};
use af_grid::{
    find_connections, BlkMultiArray3d, BoundaryConditions, Comm, Connection, Decomposition,
    MultiArray3d, Plot3dBlock,
};
use glam::DVec3;
use rstar::RTree;

use crate::block::init::WallPoint;
use crate::block::{BlockId, ProcBlock};
use crate::exchange::{self, Field};
use crate::ghost;
use crate::models::PhysicsSet;
use crate::solver::linear::{LinearSolver, LuSgs};
use crate::vars::ResidNorms;

/// 多重网格元数据（粗层持有）
pub struct MgData {
    /// 细单元 → 粗单元（逐本地块）
    pub fine_to_coarse: Vec<MultiArray3d<(isize, isize, isize)>>,
    /// 细单元体积权重（对应粗单元内归一）
    pub vol_weight: Vec<MultiArray3d<f64>>,
    /// 细单元中心在粗单元内的三线性局部坐标 (ξ, η, ζ) ∈ [0,1]³
    pub prolong_xi: Vec<MultiArray3d<DVec3>>,
    /// 多重网格强迫项 Ax − b + R_f↓
    pub forcing: Vec<BlkMultiArray3d>,
}

/// 网格层级
pub struct GridLevel {
    /// 全局几何与边界（连接匹配与粗化的素材，各进程一致）
    pub global_geom: Vec<(Plot3dBlock, BoundaryConditions)>,
    /// 本进程的块
    pub blocks: Vec<ProcBlock>,
    /// 全局连接表
    pub connections: Vec<Connection>,
    /// 分区
    pub decomp: Decomposition,
    /// 线性求解器
    pub solver: Box<dyn LinearSolver>,
    /// 多重网格元数据（粗层为 Some）
    pub mg: Option<MgData>,
}

impl GridLevel {
    /// 由全局几何/边界装配一个层级
    ///
    /// 连接在根上匹配后广播（先广播数量再广播数组），
    /// 壁距树由全场黏性壁面心聚合。
    pub fn build(
        global_geom: Vec<(Plot3dBlock, BoundaryConditions)>,
        decomp: Decomposition,
        inp: &Input,
        physics: &PhysicsSet,
        comm: &dyn Comm,
    ) -> AfResult<Self> {
        // 连接匹配：确定性计算，根算 + 广播保证一致
        let connections = Self::broadcast_connections(&global_geom, &decomp, inp, comm)?;

        // 本进程的块
        let rank = comm.rank();
        let mut blocks = Vec::new();
        for gb in decomp.blocks_on_rank(rank) {
            let (plot3d, bc) = &global_geom[gb];
            let id = BlockId {
                parent: gb,
                global_pos: gb,
                rank,
                local_pos: decomp.local_position(gb),
            };
            let mut block = ProcBlock::from_geometry(plot3d, bc.clone(), id, inp, physics)?;
            block.initialize_states(inp, physics)?;
            blocks.push(block);
        }

        // 壁距：全局黏性壁面心建树
        if inp.is_viscous() {
            let tree = Self::gather_wall_tree(&blocks, comm)?;
            if let Some(tree) = tree {
                for block in &mut blocks {
                    block.fill_wall_distance(&tree);
                }
            }
        }

        let mut solver: Box<dyn LinearSolver> = Box::new(LuSgs::new(physics.layout.n_eqns()));
        solver.setup(&blocks);

        let mut level = Self {
            global_geom,
            blocks,
            connections,
            decomp,
            solver,
            mg: None,
        };
        // 连接侧幽灵几何
        let mut conns = std::mem::take(&mut level.connections);
        exchange::swap_geometry(&mut level.blocks, &mut conns, comm)?;
        level.connections = conns;
        Ok(level)
    }

    fn broadcast_connections(
        global_geom: &[(Plot3dBlock, BoundaryConditions)],
        decomp: &Decomposition,
        inp: &Input,
        comm: &dyn Comm,
    ) -> AfResult<Vec<Connection>> {
        let bytes = if comm.rank() == 0 {
            let l_ref = inp.reference.length;
            let mut conns = find_connections(global_geom, |tag| {
                inp.bc_tag(tag).and_then(|t| t.periodic.as_ref()).map(|p| {
                    DVec3::new(p.translation[0], p.translation[1], p.translation[2]) / l_ref
                })
            })?;
            for c in &mut conns {
                c.assign_ranks(decomp);
            }
            serde_json::to_vec(&conns).map_err(|e| AfError::internal(e.to_string()))?
        } else {
            Vec::new()
        };
        // 数量先行，数组随后
        let count = if comm.rank() == 0 {
            bytes.len() as f64
        } else {
            0.0
        };
        let mut count_buf = [count];
        comm.all_reduce_max(&mut count_buf)?;
        let bytes = comm.broadcast_bytes(0, bytes)?;
        AfError::check_size("connections.bytes", count_buf[0] as usize, bytes.len())?;
        serde_json::from_slice(&bytes).map_err(|e| AfError::internal(e.to_string()))
    }

    fn gather_wall_tree(
        blocks: &[ProcBlock],
        comm: &dyn Comm,
    ) -> AfResult<Option<RTree<WallPoint>>> {
        let mut local: Vec<f64> = Vec::new();
        for b in blocks {
            for p in b.wall_face_centers() {
                local.extend_from_slice(&p.0);
            }
        }
        // 根收集后广播
        const GATHER_TAG: u64 = 1 << 30;
        let all = if comm.rank() == 0 {
            let mut all = local.clone();
            for peer in 1..comm.size() {
                all.extend(comm.recv(peer, GATHER_TAG)?);
            }
            all
        } else {
            comm.send(0, GATHER_TAG, &local)?;
            Vec::new()
        };
        let bytes = comm.broadcast_bytes(
            0,
            all.iter().flat_map(|v| v.to_le_bytes()).collect(),
        )?;
        let points: Vec<WallPoint> = bytes
            .chunks_exact(24)
            .map(|c| {
                let f = |off: usize| {
                    f64::from_le_bytes(c[off..off + 8].try_into().expect("8 字节"))
                };
                WallPoint([f(0), f(8), f(16)])
            })
            .collect();
        if points.is_empty() {
            return Ok(None);
        }
        Ok(Some(RTree::bulk_load(points)))
    }

    /// 边界赋值 + 块间状态交换（§ 驱动序列第 1 步）
    ///
    /// 逐块边界赋值相互独立，按块并行；交换保持顺序语义。
    pub fn get_boundary_conditions(
        &mut self,
        inp: &Input,
        physics: &PhysicsSet,
        comm: &dyn Comm,
    ) -> AfResult<()> {
        use rayon::prelude::*;
        self.blocks
            .par_iter_mut()
            .try_for_each(|block| ghost::assign_ghost_cells(block, inp, physics))?;
        exchange::swap_field(&mut self.blocks, &self.connections, comm, Field::State)?;
        exchange::swap_field(&mut self.blocks, &self.connections, comm, Field::WallDist)?;
        for block in &mut self.blocks {
            block.update_derived(physics);
        }
        Ok(())
    }

    /// 残差装配（§ 驱动序列第 2 步）
    ///
    /// `implicit` 时逐块把 Rusanov/TSL 对角累进求解器。
    pub fn calc_residual(
        &mut self,
        physics: &PhysicsSet,
        inp: &Input,
        comm: &dyn Comm,
        implicit: bool,
    ) -> AfResult<()> {
        let solver = &mut self.solver;
        for (bi, block) in self.blocks.iter_mut().enumerate() {
            solver.zero_a(bi);
            let diag = if implicit {
                Some(solver.a_mut(bi))
            } else {
                None
            };
            block.calc_residual_no_source(physics, inp, diag)?;
        }
        // 湍流派生量（本地梯度）→ 跨块交换
        for block in &mut self.blocks {
            block.update_turbulence_quantities(physics);
        }
        exchange::swap_gradients_and_turbulence(&mut self.blocks, &self.connections, comm)?;
        // 源项
        let solver = &mut self.solver;
        for (bi, block) in self.blocks.iter_mut().enumerate() {
            let diag = if implicit {
                Some(solver.a_mut(bi))
            } else {
                None
            };
            block.calc_source_terms(physics, diag);
        }
        Ok(())
    }

    /// 时间步（§ 第 3 步）
    pub fn calc_time_step(&mut self, inp: &Input) {
        for block in &mut self.blocks {
            block.calc_block_time_step(inp);
        }
    }

    /// 对角装配 + 求逆（§ 第 4 步）
    pub fn invert_diagonal(&mut self, inp: &Input) -> AfResult<()> {
        self.solver.add_diagonal_terms(&self.blocks, inp);
        self.solver.invert()
    }

    /// 初始化解更新与右端项（§ 第 5 步）
    pub fn initialize_matrix_update(
        &mut self,
        inp: &Input,
        physics: &PhysicsSet,
    ) -> AfResult<()> {
        let forcing = self.mg.as_ref().map(|mg| mg.forcing.as_slice());
        self.solver
            .initialize_matrix_update(&self.blocks, inp, physics, forcing)
    }

    /// 定常松弛（§ 第 6 步，对核心不透明）
    pub fn relax(&mut self, inp: &Input, physics: &PhysicsSet, comm: &dyn Comm) -> AfResult<()> {
        self.solver.relax(
            &self.blocks,
            &self.connections,
            comm,
            inp,
            physics,
            inp.schemes.relax_sweeps,
        )
    }

    /// 隐式解更新套用（§ 第 7 步）
    pub fn update_blocks(
        &mut self,
        inp: &Input,
        physics: &PhysicsSet,
        norms: &mut ResidNorms,
        last_nonlinear: bool,
    ) -> AfResult<()> {
        for (bi, block) in self.blocks.iter_mut().enumerate() {
            let du = self.solver.x(bi).clone();
            block.update_block(inp, physics, Some(&du), 0, norms)?;
            if last_nonlinear {
                block.rotate_time_levels();
            }
        }
        Ok(())
    }

    /// 显式推进（单个 RK 级或欧拉步）
    pub fn explicit_update(
        &mut self,
        inp: &Input,
        physics: &PhysicsSet,
        stage: usize,
        norms: &mut ResidNorms,
    ) -> AfResult<()> {
        for block in &mut self.blocks {
            block.update_block(inp, physics, None, stage, norms)?;
        }
        Ok(())
    }

    /// 保存时间层 n
    pub fn save_time_n(&mut self, physics: &PhysicsSet) {
        for block in &mut self.blocks {
            block.save_time_n(physics);
        }
    }

    /// 逐块 A·x − b（多重网格强迫项素材）
    pub fn axmb(&self, inp: &Input, physics: &PhysicsSet) -> Vec<BlkMultiArray3d> {
        (0..self.blocks.len())
            .map(|b| self.solver.axmb(&self.blocks, inp, physics, b))
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use af_config::{BlockBcConfig, BlockSide, Input, SurfaceConfig};
    use af_grid::SingleComm;

    fn channel_input() -> Input {
        let mut inp = Input::default();
        inp.initial = af_config::InitialCondition::Uniform {
            density: 1.225,
            velocity: [50.0, 0.0, 0.0],
            pressure: 101325.0,
            tke: 0.0,
            sdr: 0.0,
            mass_fractions: vec![],
        };
        inp.bc_tags = vec![
            af_config::BcTagData {
                tag: 1,
                wall: None,
                inlet: Some(af_config::InletTagData {
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
            af_config::BcTagData {
                tag: 2,
                wall: None,
                inlet: None,
                stagnation: None,
                back_pressure: Some(101325.0),
                periodic: None,
            },
            af_config::BcTagData {
                tag: 9,
                wall: None,
                inlet: None,
                stagnation: None,
                back_pressure: None,
                periodic: Some(af_config::PeriodicTagData {
                    translation: [0.0, 0.0, 0.25],
                }),
            },
        ];
        let surfaces = vec![
            SurfaceConfig {
                side: BlockSide::ILow,
                bc: "subsonicInflow".to_string(),
                tag: 1,
                range1: None,
                range2: None,
            },
            SurfaceConfig {
                side: BlockSide::IHigh,
                bc: "pressureOutlet".to_string(),
                tag: 2,
                range1: None,
                range2: None,
            },
            SurfaceConfig {
                side: BlockSide::JLow,
                bc: "slipWall".to_string(),
                tag: 0,
                range1: None,
                range2: None,
            },
            SurfaceConfig {
                side: BlockSide::JHigh,
                bc: "slipWall".to_string(),
                tag: 0,
                range1: None,
                range2: None,
            },
            SurfaceConfig {
                side: BlockSide::KLow,
                bc: "periodic".to_string(),
                tag: 9,
                range1: None,
                range2: None,
            },
            SurfaceConfig {
                side: BlockSide::KHigh,
                bc: "periodic".to_string(),
                tag: 9,
                range1: None,
                range2: None,
            },
        ];
        inp.boundaries = vec![BlockBcConfig { block: 0, surfaces }];
        inp
    }

    /// 亚声速槽道单块层级（k 周期），装配前可改配置
    pub(crate) fn channel_level_with(
        tweak: impl FnOnce(&mut Input),
    ) -> (GridLevel, Input, PhysicsSet) {
        let mut inp = channel_input();
        tweak(&mut inp);
        let physics = PhysicsSet::from_input(&inp);
        let plot3d = Plot3dBlock::uniform(
            DVec3::ZERO,
            DVec3::new(1.0, 0.5, 0.25),
            8,
            4,
            2,
        );
        let bc = BoundaryConditions::from_config((8, 4, 2), &inp.boundaries[0]).unwrap();
        let comm = SingleComm::new();
        let level = GridLevel::build(
            vec![(plot3d, bc)],
            Decomposition::serial(1),
            &inp,
            &physics,
            &comm,
        )
        .unwrap();
        (level, inp, physics)
    }

    /// 默认配置的槽道层级
    pub(crate) fn channel_level() -> (GridLevel, Input, PhysicsSet) {
        channel_level_with(|_| {})
    }

    #[test]
    fn test_level_build_and_connections() {
        let (level, _inp, _phys) = channel_level();
        // k 周期给一条自连接
        assert_eq!(level.connections.len(), 1);
        assert!(level.connections[0].periodic);
        assert_eq!(level.blocks.len(), 1);
    }

    #[test]
    fn test_uniform_channel_first_residual_small() {
        // 均匀流 + 对齐网格：边界/交换后首步残差为机器零
        let (mut level, inp, phys) = channel_level();
        let comm = SingleComm::new();
        level.get_boundary_conditions(&inp, &phys, &comm).unwrap();
        level.calc_residual(&phys, &inp, &comm, false).unwrap();
        for block in &level.blocks {
            for (i, j, k) in block.range_physical().iter() {
                for &r in block.residual().record(i, j, k) {
                    assert!(r.abs() < 1e-10, "残差 {:e} @ ({}, {}, {})", r, i, j, k);
                }
            }
        }
    }

    #[test]
    fn test_explicit_iteration_stays_uniform() {
        let (mut level, inp, phys) = channel_level();
        let comm = SingleComm::new();
        let mut norms = ResidNorms::new(phys.layout);
        level.get_boundary_conditions(&inp, &phys, &comm).unwrap();
        level.calc_residual(&phys, &inp, &comm, false).unwrap();
        level.calc_time_step(&inp);
        level.explicit_update(&inp, &phys, 0, &mut norms).unwrap();
        // 均匀流保持
        let w = level.blocks[0].primitive(3, 2, 1);
        assert!((w.rho() - 1.0).abs() < 1e-10);
        assert!(norms.l2_total() < 1e-9);
    }
}
