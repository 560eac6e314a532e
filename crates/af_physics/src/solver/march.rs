// crates/af_physics/src/solver/march.rs

//! 外层非线性/时间推进循环
//!
//! 每个时间步：保存时间层 → 非线性迭代（隐式路径走残差/
//! 对角/松弛/多重网格 V 循环，显式路径走 RK 级或欧拉步）→
//! 全局残差归约与发散检测。残差发散只告警不中止。

use af_config::{Input, TimeIntegration};
use af_foundation::AfResult;
use af_grid::{BlkMultiArray3d, Comm};

use super::level::GridLevel;
use super::linear::LinearSolver;
use super::multigrid;
use crate::models::PhysicsSet;
use crate::vars::ResidNorms;

/// 推进状态摘要
pub struct MarchSummary {
    /// 实际推进的迭代数
    pub iterations: usize,
    /// 首步逐方程 L₂（重启文件素材）
    pub l2_first: Vec<f64>,
    /// 末步逐方程 L₂
    pub l2_last: Vec<f64>,
    /// 是否检测到发散
    pub diverged: bool,
}

/// 推进 `inp.time.iterations` 步
///
/// `levels[0]` 为细层；`on_iteration(迭代号, 全局范数, 细层)`
/// 在每步归约后回调（输出/重启由调用方决定节奏）。
pub fn march(
    levels: &mut [GridLevel],
    inp: &Input,
    physics: &PhysicsSet,
    comm: &dyn Comm,
    mut on_iteration: impl FnMut(usize, &ResidNorms, &GridLevel) -> AfResult<()>,
) -> AfResult<MarchSummary> {
    let implicit = inp.time.integration.is_implicit();
    let n_nonlinear = inp.time.nonlinear_iterations.max(1);
    let mut l2_first: Option<Vec<f64>> = None;
    let mut l2_last = Vec::new();
    let mut diverged = false;

    let start = inp.time.iteration_start;
    for it in start..start + inp.time.iterations {
        levels[0].save_time_n(physics);
        let mut norms = ResidNorms::new(physics.layout);

        for m in 0..n_nonlinear {
            norms = ResidNorms::new(physics.layout);
            if implicit {
                implicit_iteration(levels, inp, physics, comm, m)?;
                let last = m + 1 == n_nonlinear;
                levels[0].update_blocks(inp, physics, &mut norms, last)?;
            } else {
                explicit_iteration(&mut levels[0], inp, physics, comm, &mut norms)?;
            }
        }

        // 全局归约：逐方程 L₂ 平方和求和、L∞ 取最大
        comm.all_reduce_sum(&mut norms.l2_sq)?;
        let mut linf = [norms.linf.value];
        comm.all_reduce_max(&mut linf)?;
        norms.linf.value = linf[0];

        let l2: Vec<f64> = norms.l2().to_vec();
        if l2_first.is_none() {
            l2_first = Some(l2.clone());
        }
        let first_total: f64 = l2_first
            .as_ref()
            .expect("首步已记录")
            .iter()
            .map(|v| v * v)
            .sum::<f64>()
            .sqrt();
        let total = norms.l2_total();
        if first_total > 0.0 && total > 1.0e4 * first_total.max(1.0e-300) {
            diverged = true;
            tracing::warn!(
                iteration = it,
                l2 = total,
                l2_first = first_total,
                "残差发散，继续推进"
            );
        }
        tracing::info!(
            iteration = it,
            l2 = total,
            linf = norms.linf.value,
            linf_eqn = norms.linf_eqn_name(),
            "迭代完成"
        );
        l2_last = l2;
        on_iteration(it, &norms, &levels[0])?;
    }

    Ok(MarchSummary {
        iterations: inp.time.iterations,
        l2_first: l2_first.unwrap_or_default(),
        l2_last,
        diverged,
    })
}

/// 隐式非线性迭代（含多重网格 V 循环）
fn implicit_iteration(
    levels: &mut [GridLevel],
    inp: &Input,
    physics: &PhysicsSet,
    comm: &dyn Comm,
    m: usize,
) -> AfResult<()> {
    // 细层：边界 → 残差 → 时间步 → 对角 → 初始化 → 松弛
    let fine = &mut levels[0];
    fine.get_boundary_conditions(inp, physics, comm)?;
    fine.calc_residual(physics, inp, comm, true)?;
    fine.calc_time_step(inp);
    fine.invert_diagonal(inp)?;
    fine.initialize_matrix_update(inp, physics)?;
    fine.relax(inp, physics, comm)?;

    // V 循环下行
    let n_levels = levels.len();
    let mut du0: Vec<Vec<BlkMultiArray3d>> = Vec::with_capacity(n_levels);
    du0.push(Vec::new()); // 细层占位
    for l in 1..n_levels {
        let (fines, coarses) = levels.split_at_mut(l);
        let fine = fines.last_mut().expect("细层存在");
        let coarse = &mut coarses[0];
        multigrid::restriction(fine, coarse, m, inp, physics, comm)?;
        // 预折叠的粗层解更新快照
        let snapshot: Vec<BlkMultiArray3d> = (0..coarse.blocks.len())
            .map(|b| coarse.solver.x(b).clone())
            .collect();
        du0.push(snapshot);
        // 粗层带强迫项求解
        coarse.initialize_matrix_update(inp, physics)?;
        coarse.add_restricted_update(&du0[l])?;
        for _ in 0..inp.multigrid.coarse_iterations {
            coarse.relax(inp, physics, comm)?;
        }
    }
    // 上行：延拓修正
    for l in (1..n_levels).rev() {
        let (fines, coarses) = levels.split_at_mut(l);
        let fine = fines.last_mut().expect("细层存在");
        let coarse = &mut coarses[0];
        multigrid::prolongation(coarse, fine, &du0[l])?;
    }
    Ok(())
}

impl GridLevel {
    /// 初始化右端后恢复限制下来的解更新（FAS 基态）
    pub(crate) fn add_restricted_update(
        &mut self,
        du0: &[BlkMultiArray3d],
    ) -> AfResult<()> {
        self.solver.add_to_update(du0)
    }
}

/// 显式迭代：欧拉单步或 RK4 四级
fn explicit_iteration(
    level: &mut GridLevel,
    inp: &Input,
    physics: &PhysicsSet,
    comm: &dyn Comm,
    norms: &mut ResidNorms,
) -> AfResult<()> {
    let stages = match inp.time.integration {
        TimeIntegration::Rk4 => 4,
        _ => 1,
    };
    for stage in 0..stages {
        level.get_boundary_conditions(inp, physics, comm)?;
        level.calc_residual(physics, inp, comm, false)?;
        if stage == 0 {
            level.calc_time_step(inp);
        }
        level.explicit_update(inp, physics, stage, norms)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::level::tests::{channel_level, channel_level_with};
    use af_grid::SingleComm;

    #[test]
    fn test_explicit_march_uniform_flow_stays() {
        let (level, mut inp, phys) = channel_level();
        inp.time.iterations = 5;
        let comm = SingleComm::new();
        let mut levels = vec![level];
        let mut count = 0;
        let summary = march(&mut levels, &inp, &phys, &comm, |_, _, _| {
            count += 1;
            Ok(())
        })
        .unwrap();
        assert_eq!(count, 5);
        assert_eq!(summary.iterations, 5);
        assert!(!summary.diverged);
        // 均匀流保持均匀
        let w = levels[0].blocks[0].primitive(4, 2, 1);
        assert!((w.rho() - 1.0).abs() < 1e-8);
    }

    #[test]
    fn test_implicit_march_single_level() {
        let (level, mut inp, phys) = channel_level_with(|inp| {
            inp.time.integration = af_config::TimeIntegration::ImplicitEuler;
        });
        inp.time.iterations = 3;
        inp.time.cfl = 5.0;
        let comm = SingleComm::new();
        let mut levels = vec![level];
        let summary = march(&mut levels, &inp, &phys, &comm, |_, _, _| Ok(())).unwrap();
        assert!(!summary.diverged);
        let w = levels[0].blocks[0].primitive(4, 2, 1);
        assert!(w.is_physical());
        assert!((w.rho() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_implicit_march_two_level_vcycle() {
        let (level, mut inp, phys) = channel_level_with(|inp| {
            inp.time.integration = af_config::TimeIntegration::ImplicitEuler;
        });
        inp.time.iterations = 2;
        inp.multigrid.levels = 2;
        let comm = SingleComm::new();
        let coarse = crate::solver::multigrid::coarsen(&level, &inp, &phys, &comm).unwrap();
        let mut levels = vec![level, coarse];
        let summary = march(&mut levels, &inp, &phys, &comm, |_, _, _| Ok(())).unwrap();
        assert!(!summary.diverged);
        // 均匀流在 V 循环下保持
        let w = levels[0].blocks[0].primitive(2, 1, 0);
        assert!((w.rho() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_rk4_march() {
        let (level, mut inp, phys) = channel_level_with(|inp| {
            inp.time.integration = af_config::TimeIntegration::Rk4;
        });
        inp.time.iterations = 2;
        let comm = SingleComm::new();
        let mut levels = vec![level];
        let summary = march(&mut levels, &inp, &phys, &comm, |_, _, _| Ok(())).unwrap();
        assert!(!summary.diverged);
        assert!(!summary.l2_first.is_empty());
    }
}
