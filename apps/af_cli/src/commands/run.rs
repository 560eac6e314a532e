// apps/af_cli/src/commands/run.rs

//! 运行模拟
//!
//! 组装流程：配置 → 网格 → 边界 → 分区 →（可选重启）→
//! 层级（多重网格）→ 推进 → 输出/重启。`--ranks N` 用线程
//! 网格模拟 N 个进程，rank 0 聚合输出。

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Args;

use af_config::Input;
use af_foundation::AfResult;
use af_grid::{BoundaryConditions, Comm, Decomposition, Plot3dBlock, SingleComm, ThreadComm};
use af_io::function_file::FunctionBlock;
use af_io::meta::SeriesMeta;
use af_io::restart::{check_decomposition, RestartBlock, RestartData};
use af_physics::solver::{march, multigrid, GridLevel};
use af_physics::{PhysicsSet, ProcBlock};

/// run 参数
#[derive(Args)]
pub struct RunArgs {
    /// 配置文件（JSON）
    #[arg(short, long)]
    pub config: PathBuf,

    /// 模拟进程数（线程网格）
    #[arg(short, long, default_value_t = 1)]
    pub ranks: usize,

    /// 输出目录
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,
}

pub fn execute(args: RunArgs) -> anyhow::Result<()> {
    let inp = Input::from_file(&args.config)
        .with_context(|| format!("加载配置 {}", args.config.display()))?;
    let inp = Arc::new(inp);

    // 网格 + 边界（全局，各 rank 一致）
    let grid = af_io::plot3d_file::read_grid(&inp.grid_file, inp.reference.length)?;
    let mut global_geom = Vec::with_capacity(grid.len());
    for (n, block) in grid.into_iter().enumerate() {
        let cfg = inp
            .boundaries
            .iter()
            .find(|b| b.block == n)
            .ok_or_else(|| anyhow::anyhow!("块 {} 缺少边界定义", n))?;
        let dims = (
            block.num_cells_i(),
            block.num_cells_j(),
            block.num_cells_k(),
        );
        let bc = BoundaryConditions::from_config(dims, cfg)?;
        global_geom.push((block, bc));
    }
    let cell_counts: Vec<usize> = global_geom.iter().map(|(b, _)| b.num_cells()).collect();
    let decomp = if args.ranks == 1 {
        Decomposition::serial(global_geom.len())
    } else {
        Decomposition::decompose(&cell_counts, args.ranks)?
    };

    // 重启数据（根读取，后续按块散用；线程网格下全局共享即可）
    let restart = match &inp.restart_file {
        Some(path) => {
            let data = af_io::read_restart(path, &inp.reference)?;
            let dims: Vec<_> = global_geom
                .iter()
                .map(|(b, _)| (b.num_cells_i(), b.num_cells_j(), b.num_cells_k()))
                .collect();
            check_decomposition(&data, &dims)?;
            tracing::info!(iter = data.iter, "从重启文件续算");
            Some(Arc::new(data))
        }
        None => None,
    };

    let global_geom = Arc::new(global_geom);
    let output_dir = Arc::new(args.output_dir);
    std::fs::create_dir_all(output_dir.as_path())?;

    if args.ranks == 1 {
        let comm = SingleComm::new();
        run_rank(&inp, &global_geom, decomp, restart, &comm, &output_dir)?;
    } else {
        let mesh = ThreadComm::mesh(args.ranks);
        let mut handles = Vec::new();
        for comm in mesh {
            let inp = inp.clone();
            let geom = global_geom.clone();
            let decomp = decomp.clone();
            let restart = restart.clone();
            let out = output_dir.clone();
            handles.push(std::thread::spawn(move || {
                run_rank(&inp, &geom, decomp, restart, &comm, &out)
            }));
        }
        for h in handles {
            h.join()
                .map_err(|_| anyhow::anyhow!("rank 线程崩溃"))??;
        }
    }
    Ok(())
}

/// 单个 rank 的完整求解流程
fn run_rank(
    inp: &Input,
    global_geom: &[(Plot3dBlock, BoundaryConditions)],
    decomp: Decomposition,
    restart: Option<Arc<RestartData>>,
    comm: &dyn Comm,
    output_dir: &std::path::Path,
) -> anyhow::Result<()> {
    let physics = PhysicsSet::from_input(inp);
    let mut inp = inp.clone();

    let mut fine = GridLevel::build(
        global_geom.to_vec(),
        decomp,
        &inp,
        &physics,
        comm,
    )?;

    // 重启：覆盖本地块状态与起始迭代号
    if let Some(data) = &restart {
        for block in &mut fine.blocks {
            apply_restart_block(block, &data.blocks[block.id().parent], &physics);
        }
        inp.time.iteration_start = data.iter;
    }

    // 多重网格层级
    let mut levels = vec![fine];
    for _ in 1..inp.multigrid.levels {
        let coarse = multigrid::coarsen(levels.last().expect("细层存在"), &inp, &physics, comm)?;
        levels.push(coarse);
    }

    // 输出节奏
    let total_blocks = global_geom.len();
    let mut meta = SeriesMeta::new(
        &inp.output.base_name,
        inp.output.variables.clone(),
        &inp.reference,
    );
    let out_freq = inp.output.frequency.max(1);
    let rst_freq = inp.output.restart_frequency;
    let mut l2_first: Vec<f64> = Vec::new();

    let inp_cb = inp.clone();
    let physics_cb = physics.clone();
    let summary = march(&mut levels, &inp, &physics, comm, |it, norms, level| {
        if l2_first.is_empty() {
            l2_first = norms.l2().to_vec();
        }
        if (it + 1) % out_freq == 0 {
            write_fields(
                level,
                &inp_cb,
                &physics_cb,
                comm,
                total_blocks,
                output_dir,
                it,
                &mut meta,
            )?;
        }
        if rst_freq > 0 && (it + 1) % rst_freq == 0 {
            write_restart_snapshot(
                level,
                &inp_cb,
                &physics_cb,
                comm,
                total_blocks,
                output_dir,
                it + 1,
                &l2_first,
            )?;
        }
        Ok(())
    })?;

    // 收尾输出
    let it_end = inp.time.iteration_start + summary.iterations;
    write_restart_snapshot(
        &levels[0],
        &inp,
        &physics,
        comm,
        total_blocks,
        output_dir,
        it_end,
        &summary.l2_first,
    )?;
    if comm.rank() == 0 {
        meta.save(&output_dir.join(format!("{}.json", inp.output.base_name)))?;
        let grids: Vec<Plot3dBlock> = global_geom.iter().map(|(b, _)| b.clone()).collect();
        af_io::plot3d_file::write_grid(
            &output_dir.join(format!("{}.p3d", inp.output.base_name)),
            &grids,
            inp.reference.length,
        )?;
        tracing::info!(
            iterations = summary.iterations,
            diverged = summary.diverged,
            "模拟完成"
        );
    }
    Ok(())
}

/// 把重启块场写入本地块状态
fn apply_restart_block(block: &mut ProcBlock, data: &RestartBlock, physics: &PhysicsSet) {
    let layout = block.layout();
    let ns = layout.n_species();
    let mut idx = 0;
    let range = block.range_physical();
    for (i, j, k) in range.iter() {
        let rho = data.fields[0][idx];
        let v = glam::DVec3::new(
            data.fields[1][idx],
            data.fields[2][idx],
            data.fields[3][idx],
        );
        let p = data.fields[4][idx];
        let (tke, sdr, mf_off) = if layout.is_rans() {
            (data.fields[5][idx], data.fields[6][idx], 7)
        } else {
            (0.0, 0.0, 5)
        };
        let rho_species: Vec<f64> = (0..ns)
            .map(|s| data.fields[mf_off + s][idx] * rho)
            .collect();
        let w = af_physics::Primitive::assemble(layout, &rho_species, v, p, tke, sdr);
        block.set_primitive(i, j, k, &w);
        idx += 1;
    }
    block.update_derived(physics);
}

/// 输出变量求值
fn eval_variable(
    block: &ProcBlock,
    physics: &PhysicsSet,
    name: &str,
    c: (isize, isize, isize),
) -> f64 {
    let w = block.primitive(c.0, c.1, c.2);
    match name {
        "density" => w.rho(),
        "vel_x" => w.velocity().x,
        "vel_y" => w.velocity().y,
        "vel_z" => w.velocity().z,
        "pressure" => w.p(),
        "temperature" => physics.temperature(&w),
        "mach" => w.velocity().length() / physics.sound_speed(&w),
        "tke" => w.tke(),
        "sdr" => w.sdr(),
        "viscosity" => block.laminar_viscosity(c.0, c.1, c.2),
        "eddy_viscosity" => block.eddy_viscosity(c.0, c.1, c.2),
        "wall_distance" => block.wall_distance(c.0, c.1, c.2),
        _ => {
            // mf_<n> 组分质量分数
            name.strip_prefix("mf_")
                .and_then(|s| s.parse::<usize>().ok())
                .map(|s| w.mass_fraction(s))
                .unwrap_or(0.0)
        }
    }
}

/// 变量的量纲化系数
fn variable_scale(inp: &Input, name: &str) -> f64 {
    let r = &inp.reference;
    match name {
        "density" => r.rho,
        "vel_x" | "vel_y" | "vel_z" => r.sound_speed,
        "pressure" => r.pressure(),
        "temperature" => r.temperature,
        "tke" => r.sound_speed * r.sound_speed,
        "sdr" => r.sound_speed / r.length,
        "viscosity" | "eddy_viscosity" => r.viscosity,
        "wall_distance" => r.length,
        _ => 1.0,
    }
}

/// 场输出（聚合到根后写函数文件 + 元数据帧）
#[allow(clippy::too_many_arguments)]
fn write_fields(
    level: &GridLevel,
    inp: &Input,
    physics: &PhysicsSet,
    comm: &dyn Comm,
    total_blocks: usize,
    output_dir: &std::path::Path,
    iteration: usize,
    meta: &mut SeriesMeta,
) -> AfResult<()> {
    let vars = &inp.output.variables;
    let local: Vec<(usize, Vec<f64>)> = level
        .blocks
        .iter()
        .map(|b| {
            let mut flat = Vec::new();
            for name in vars {
                let scale = variable_scale(inp, name);
                for c in b.range_physical().iter() {
                    flat.push(eval_variable(b, physics, name, c) * scale);
                }
            }
            (b.id().global_pos, flat)
        })
        .collect();
    let gathered = af_io::gather::gather_to_root(comm, local, total_blocks)?;
    if let Some(full) = gathered {
        let blocks: Vec<FunctionBlock> = full
            .into_iter()
            .enumerate()
            .map(|(g, flat)| {
                let dims = (
                    level.global_geom[g].0.num_cells_i(),
                    level.global_geom[g].0.num_cells_j(),
                    level.global_geom[g].0.num_cells_k(),
                );
                let n = dims.0 * dims.1 * dims.2;
                let fields = flat.chunks(n).map(|c| c.to_vec()).collect();
                FunctionBlock { dims, fields }
            })
            .collect();
        let file = format!("{}_{}.fun", inp.output.base_name, iteration);
        af_io::function_file::write_function_file(&output_dir.join(&file), &blocks)?;
        meta.push_frame(iteration, 0.0, &file);
    }
    Ok(())
}

/// 重启输出
#[allow(clippy::too_many_arguments)]
fn write_restart_snapshot(
    level: &GridLevel,
    inp: &Input,
    physics: &PhysicsSet,
    comm: &dyn Comm,
    total_blocks: usize,
    output_dir: &std::path::Path,
    iteration: usize,
    l2_first: &[f64],
) -> AfResult<()> {
    let layout = physics.layout;
    let ns = layout.n_species();
    let n_vars = 5 + layout.n_turb() + ns;
    let local: Vec<(usize, Vec<f64>)> = level
        .blocks
        .iter()
        .map(|b| {
            let mut flat = Vec::new();
            let mut names: Vec<String> = vec![
                "density".into(),
                "vel_x".into(),
                "vel_y".into(),
                "vel_z".into(),
                "pressure".into(),
            ];
            if layout.is_rans() {
                names.push("tke".into());
                names.push("sdr".into());
            }
            for s in 0..ns {
                names.push(format!("mf_{}", s));
            }
            for name in &names {
                for c in b.range_physical().iter() {
                    flat.push(eval_variable(b, physics, name, c));
                }
            }
            (b.id().global_pos, flat)
        })
        .collect();
    let gathered = af_io::gather::gather_to_root(comm, local, total_blocks)?;
    if let Some(full) = gathered {
        let blocks: Vec<RestartBlock> = full
            .into_iter()
            .enumerate()
            .map(|(g, flat)| {
                let dims = (
                    level.global_geom[g].0.num_cells_i(),
                    level.global_geom[g].0.num_cells_j(),
                    level.global_geom[g].0.num_cells_k(),
                );
                let n = dims.0 * dims.1 * dims.2;
                let fields = flat.chunks(n).map(|c| c.to_vec()).collect();
                RestartBlock { dims, fields }
            })
            .collect();
        debug_assert!(blocks.iter().all(|b| b.fields.len() == n_vars));
        let mut l2 = l2_first.to_vec();
        l2.resize(layout.n_eqns(), 0.0);
        let data = RestartData {
            iter: iteration,
            species: inp.fluid.species.iter().map(|s| s.name.clone()).collect(),
            l2_first: l2,
            blocks,
            conserved: None,
        };
        let file = output_dir.join(format!("{}_{}.rst", inp.output.base_name, iteration));
        af_io::write_restart(&file, &data, &inp.reference)?;
    }
    Ok(())
}
