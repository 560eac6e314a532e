// apps/af_cli/src/commands/validate.rs

//! 校验配置
//!
//! 加载配置并做结构校验；给定网格时进一步检查每块的边界
//! 覆盖与连接面配对。

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use glam::DVec3;

use af_config::Input;
use af_grid::{find_connections, BoundaryConditions};

/// validate 参数
#[derive(Args)]
pub struct ValidateArgs {
    /// 配置文件（JSON）
    #[arg(short, long)]
    pub config: PathBuf,

    /// 同时校验网格与边界的一致性
    #[arg(short, long, default_value_t = false)]
    pub with_grid: bool,
}

pub fn execute(args: ValidateArgs) -> anyhow::Result<()> {
    let inp = Input::from_file(&args.config)
        .with_context(|| format!("加载配置 {}", args.config.display()))?;
    println!("配置有效: {}", args.config.display());
    println!("  方程组: {:?}", inp.fluid.equation_set);
    println!("  组分数: {}", inp.n_species());
    println!("  方程数: {}", inp.n_equations());
    println!("  时间格式: {:?}", inp.time.integration);
    println!("  重构: {:?} / 限制器 {:?}", inp.schemes.reconstruction, inp.schemes.limiter);
    println!("  通量: {:?}", inp.schemes.inviscid_flux);
    println!("  多重网格层数: {}", inp.multigrid.levels);

    if args.with_grid {
        let grid = af_io::plot3d_file::read_grid(&inp.grid_file, inp.reference.length)?;
        let mut geom = Vec::with_capacity(grid.len());
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
            let bc = BoundaryConditions::from_config(dims, cfg)
                .with_context(|| format!("块 {} 边界覆盖检查失败", n))?;
            geom.push((block, bc));
        }
        let l_ref = inp.reference.length;
        let conns = find_connections(&geom, |tag| {
            inp.bc_tag(tag).and_then(|t| t.periodic.as_ref()).map(|p| {
                DVec3::new(p.translation[0], p.translation[1], p.translation[2]) / l_ref
            })
        })?;
        println!("  网格: {} 块, {} 条连接", geom.len(), conns.len());
        for (n, c) in conns.iter().enumerate() {
            println!(
                "    连接 {}: 块 {} 侧 {} ↔ 块 {} 侧 {} (方位码 {}{})",
                n,
                c.first.block,
                c.first.side,
                c.second.block,
                c.second.side,
                c.orientation,
                if c.periodic { ", 周期" } else { "" }
            );
        }
    }
    Ok(())
}
