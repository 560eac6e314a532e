// apps/af_cli/src/commands/info.rs

//! 显示网格信息

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;

/// info 参数
#[derive(Args)]
pub struct InfoArgs {
    /// plot3d 网格文件
    #[arg(short, long)]
    pub grid: PathBuf,

    /// 参考长度 [m]
    #[arg(short, long, default_value_t = 1.0)]
    pub length_ref: f64,
}

pub fn execute(args: InfoArgs) -> anyhow::Result<()> {
    let blocks = af_io::plot3d_file::read_grid(&args.grid, args.length_ref)
        .with_context(|| format!("读取网格 {}", args.grid.display()))?;

    println!("网格文件: {}", args.grid.display());
    println!("块数: {}", blocks.len());
    let mut total_cells = 0usize;
    for (n, b) in blocks.iter().enumerate() {
        let dims = (b.num_cells_i(), b.num_cells_j(), b.num_cells_k());
        let vol = b.volume()?;
        let mut min_v = f64::MAX;
        let mut max_v: f64 = 0.0;
        let mut sum_v = 0.0;
        for (i, j, k) in vol.range_physical().iter() {
            let v = *vol.get(i, j, k);
            min_v = min_v.min(v);
            max_v = max_v.max(v);
            sum_v += v;
        }
        total_cells += b.num_cells();
        println!(
            "  块 {}: {}×{}×{} = {} 单元, 体积 [{:.3e}, {:.3e}], 合计 {:.6e}",
            n,
            dims.0,
            dims.1,
            dims.2,
            b.num_cells(),
            min_v,
            max_v,
            sum_v
        );
    }
    println!("总单元数: {}", total_cells);
    Ok(())
}
