// crates/af_io/src/restart.rs

//! 重启文件
//!
//! 位级布局（小端、本机 f64/i32）：
//!
//! ```text
//! [numSols:i32][iter:i32][numEqns:i32][numSpec:i32]
//! ([nameSize:u64][name:u8×nameSize])×numSpec
//! [residL2First:f64×numEqns]
//! [numBlks:i32]
//! ([Ni,Nj,Nk,numVars:i32×4])×numBlks
//! (逐变量、单元 i 最快: [density, vel_x, vel_y, vel_z, pressure,
//!   (tke, sdr)?, mf_s×numSpec] f64×单元数)×numBlks
//! [守恒量解，布局同上，仅当 numSols == 2]
//! ```
//!
//! 磁盘为量纲量（ρ×ρRef、v×aRef、P×ρRef·aRef²、k×aRef²、
//! ω×aRef/LRef，质量分数无量纲）。读入集中在根进程，随后
//! 分区散发由调用方完成；块数/尺寸与当前网格不符立即
//! [`AfError::DecompMismatch`]。

use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use af_config::ReferenceState;
use af_foundation::{AfError, AfResult};

/// 单块的重启场（无量纲，逐变量存放，单元 i 最快）
#[derive(Debug, Clone, PartialEq)]
pub struct RestartBlock {
    /// 物理单元数
    pub dims: (usize, usize, usize),
    /// 变量数组：`[ρ, u, v, w, P, (k, ω)?, Y_s…]`
    pub fields: Vec<Vec<f64>>,
}

impl RestartBlock {
    /// 单元数
    pub fn num_cells(&self) -> usize {
        self.dims.0 * self.dims.1 * self.dims.2
    }
}

/// 重启文件内容（无量纲）
#[derive(Debug, Clone, PartialEq)]
pub struct RestartData {
    /// 起始迭代号
    pub iter: usize,
    /// 组分名
    pub species: Vec<String>,
    /// 首步逐方程 L₂
    pub l2_first: Vec<f64>,
    /// 原始变量解
    pub blocks: Vec<RestartBlock>,
    /// 守恒变量解（多层时间格式时为 Some）
    pub conserved: Option<Vec<RestartBlock>>,
}

impl RestartData {
    /// 变量数 5 + 湍流 + 组分
    pub fn num_vars(&self) -> usize {
        self.blocks
            .first()
            .map(|b| b.fields.len())
            .unwrap_or(0)
    }

    fn n_turb(&self) -> usize {
        let nv = self.num_vars();
        nv - 5 - self.species.len()
    }
}

/// 变量的量纲化系数表
fn scales(reference: &ReferenceState, n_turb: usize, n_species: usize) -> Vec<f64> {
    let a = reference.sound_speed;
    let mut out = vec![
        reference.rho,
        a,
        a,
        a,
        reference.pressure(),
    ];
    if n_turb > 0 {
        out.push(a * a);
        out.push(a / reference.length);
    }
    out.extend(std::iter::repeat(1.0).take(n_species));
    out
}

fn write_i32(w: &mut impl Write, v: i32) -> AfResult<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

fn read_i32(r: &mut impl Read) -> AfResult<i32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

fn read_u64(r: &mut impl Read) -> AfResult<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn write_solution(
    w: &mut impl Write,
    blocks: &[RestartBlock],
    scale: &[f64],
) -> AfResult<()> {
    for block in blocks {
        AfError::check_size("restart.vars", scale.len(), block.fields.len())?;
        for (var, field) in block.fields.iter().enumerate() {
            AfError::check_size("restart.cells", block.num_cells(), field.len())?;
            let vals: Vec<f64> = field.iter().map(|v| v * scale[var]).collect();
            let bytes: &[u8] = bytemuck::cast_slice(&vals);
            w.write_all(bytes)?;
        }
    }
    Ok(())
}

fn read_solution(
    r: &mut impl Read,
    dims: &[(usize, usize, usize, usize)],
    scale: &[f64],
) -> AfResult<Vec<RestartBlock>> {
    let mut out = Vec::with_capacity(dims.len());
    for &(ni, nj, nk, num_vars) in dims {
        let n = ni * nj * nk;
        let mut fields = Vec::with_capacity(num_vars);
        for var in 0..num_vars {
            let mut bytes = vec![0u8; n * 8];
            r.read_exact(&mut bytes)?;
            fields.push(
                bytes
                    .chunks_exact(8)
                    .map(|c| f64::from_le_bytes(c.try_into().expect("8 字节")) / scale[var])
                    .collect(),
            );
        }
        out.push(RestartBlock {
            dims: (ni, nj, nk),
            fields,
        });
    }
    Ok(out)
}

/// 写重启文件
pub fn write_restart(
    path: &Path,
    data: &RestartData,
    reference: &ReferenceState,
) -> AfResult<()> {
    let file = std::fs::File::create(path)
        .map_err(|e| AfError::io_with_source(format!("重启文件 {}", path.display()), e))?;
    let mut w = BufWriter::new(file);

    let num_sols = if data.conserved.is_some() { 2 } else { 1 };
    let n_species = data.species.len();
    let n_eqns = n_species + 4 + data.n_turb();
    write_i32(&mut w, num_sols)?;
    write_i32(&mut w, data.iter as i32)?;
    write_i32(&mut w, n_eqns as i32)?;
    write_i32(&mut w, n_species as i32)?;
    for name in &data.species {
        w.write_all(&(name.len() as u64).to_le_bytes())?;
        w.write_all(name.as_bytes())?;
    }
    AfError::check_size("restart.l2", n_eqns, data.l2_first.len())?;
    let l2_bytes: &[u8] = bytemuck::cast_slice(&data.l2_first);
    w.write_all(l2_bytes)?;

    write_i32(&mut w, data.blocks.len() as i32)?;
    for block in &data.blocks {
        write_i32(&mut w, block.dims.0 as i32)?;
        write_i32(&mut w, block.dims.1 as i32)?;
        write_i32(&mut w, block.dims.2 as i32)?;
        write_i32(&mut w, block.fields.len() as i32)?;
    }

    let scale = scales(reference, data.n_turb(), n_species);
    write_solution(&mut w, &data.blocks, &scale)?;
    if let Some(cons) = &data.conserved {
        write_solution(&mut w, cons, &scale)?;
    }
    tracing::info!(path = %path.display(), iter = data.iter, "重启文件写出");
    Ok(())
}

/// 读重启文件（根进程集中读取）
pub fn read_restart(path: &Path, reference: &ReferenceState) -> AfResult<RestartData> {
    let file = std::fs::File::open(path)
        .map_err(|e| AfError::io_with_source(format!("重启文件 {}", path.display()), e))?;
    let mut r = BufReader::new(file);

    let num_sols = read_i32(&mut r)?;
    if !(1..=2).contains(&num_sols) {
        return Err(AfError::io(format!("numSols 非法: {}", num_sols)));
    }
    let iter = read_i32(&mut r)? as usize;
    let n_eqns = read_i32(&mut r)? as usize;
    let n_species = read_i32(&mut r)? as usize;
    if n_species == 0 || n_eqns < n_species + 4 {
        return Err(AfError::io(format!(
            "方程/组分数不自洽: {} / {}",
            n_eqns, n_species
        )));
    }
    let n_turb = n_eqns - n_species - 4;

    let mut species = Vec::with_capacity(n_species);
    for _ in 0..n_species {
        let len = read_u64(&mut r)? as usize;
        let mut name = vec![0u8; len];
        r.read_exact(&mut name)?;
        species.push(String::from_utf8(name).map_err(|_| AfError::io("组分名非 UTF-8"))?);
    }
    let mut l2_bytes = vec![0u8; n_eqns * 8];
    r.read_exact(&mut l2_bytes)?;
    let l2_first: Vec<f64> = l2_bytes
        .chunks_exact(8)
        .map(|c| f64::from_le_bytes(c.try_into().expect("8 字节")))
        .collect();

    let num_blocks = read_i32(&mut r)? as usize;
    let mut dims = Vec::with_capacity(num_blocks);
    for _ in 0..num_blocks {
        let ni = read_i32(&mut r)? as usize;
        let nj = read_i32(&mut r)? as usize;
        let nk = read_i32(&mut r)? as usize;
        let nv = read_i32(&mut r)? as usize;
        if nv != 5 + n_turb + n_species {
            return Err(AfError::decomp_mismatch(format!(
                "块变量数 {} 与方程组 {} 不符",
                nv,
                5 + n_turb + n_species
            )));
        }
        dims.push((ni, nj, nk, nv));
    }

    let scale = scales(reference, n_turb, n_species);
    let blocks = read_solution(&mut r, &dims, &scale)?;
    let conserved = if num_sols == 2 {
        Some(read_solution(&mut r, &dims, &scale)?)
    } else {
        None
    };
    Ok(RestartData {
        iter,
        species,
        l2_first,
        blocks,
        conserved,
    })
}

/// 重启数据与当前网格一致性检查
pub fn check_decomposition(data: &RestartData, dims: &[(usize, usize, usize)]) -> AfResult<()> {
    if data.blocks.len() != dims.len() {
        return Err(AfError::decomp_mismatch(format!(
            "重启块数 {} 与网格 {} 不符",
            data.blocks.len(),
            dims.len()
        )));
    }
    for (n, (block, &d)) in data.blocks.iter().zip(dims).enumerate() {
        if block.dims != d {
            return Err(AfError::decomp_mismatch(format!(
                "块 {} 尺寸 {:?} 与网格 {:?} 不符",
                n, block.dims, d
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join("af_restart_test");
        std::fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    fn sample_rans_two_species() -> RestartData {
        // 2 组分 + RANS：numVars = 5 + 2 + 2 = 9，numEqns = 8
        let dims = (3, 2, 1);
        let n = 6;
        let mk = |seed: f64| -> Vec<f64> {
            (0..n).map(|c| seed + 0.01 * c as f64).collect()
        };
        let block = RestartBlock {
            dims,
            fields: vec![
                mk(1.0),  // ρ
                mk(0.3),  // u
                mk(-0.1), // v
                mk(0.0),  // w
                mk(0.7),  // P
                mk(1e-4), // k
                mk(5.0),  // ω
                mk(0.6),  // Y₀
                mk(0.4),  // Y₁
            ],
        };
        RestartData {
            iter: 42,
            species: vec!["n2".to_string(), "o2".to_string()],
            l2_first: vec![0.1; 8],
            blocks: vec![block.clone()],
            conserved: Some(vec![block]),
        }
    }

    #[test]
    fn test_restart_round_trip_rans_multispecies() {
        let reference = ReferenceState::default();
        let data = sample_rans_two_species();
        let path = tmp("rt.rst");
        write_restart(&path, &data, &reference).unwrap();
        let back = read_restart(&path, &reference).unwrap();
        assert_eq!(back.iter, 42);
        assert_eq!(back.species, data.species);
        assert!(back.conserved.is_some());
        for (a, b) in data.blocks[0]
            .fields
            .iter()
            .flatten()
            .zip(back.blocks[0].fields.iter().flatten())
        {
            // 量纲化往返 < 1e-14 相对误差
            assert!((a - b).abs() <= 1e-14 * a.abs().max(1.0), "{} vs {}", a, b);
        }
    }

    #[test]
    fn test_restart_bytes_deterministic() {
        let reference = ReferenceState::default();
        let data = sample_rans_two_species();
        let p1 = tmp("det1.rst");
        let p2 = tmp("det2.rst");
        write_restart(&p1, &data, &reference).unwrap();
        write_restart(&p2, &data, &reference).unwrap();
        assert_eq!(std::fs::read(&p1).unwrap(), std::fs::read(&p2).unwrap());
    }

    #[test]
    fn test_decomposition_mismatch() {
        let data = sample_rans_two_species();
        assert!(check_decomposition(&data, &[(3, 2, 1)]).is_ok());
        let err = check_decomposition(&data, &[(4, 2, 1)]).unwrap_err();
        assert!(matches!(err, AfError::DecompMismatch { .. }));
        assert!(check_decomposition(&data, &[(3, 2, 1), (3, 2, 1)]).is_err());
    }

    #[test]
    fn test_single_solution_no_conserved() {
        let reference = ReferenceState::default();
        let mut data = sample_rans_two_species();
        data.conserved = None;
        let path = tmp("single.rst");
        write_restart(&path, &data, &reference).unwrap();
        let back = read_restart(&path, &reference).unwrap();
        assert!(back.conserved.is_none());
    }
}
