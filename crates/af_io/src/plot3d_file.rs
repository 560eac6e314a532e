// crates/af_io/src/plot3d_file.rs

//! plot3d 多块二进制网格
//!
//! 布局（小端、本机 f64/i32）：
//!
//! ```text
//! [numBlocks:i32] ([Ni,Nj,Nk]:i32×3)×numBlocks
//! ([x:f64×N][y:f64×N][z:f64×N])×numBlocks   N = Ni·Nj·Nk（节点数）
//! ```
//!
//! 读入时坐标除以 LRef 无量纲化；写出网格变体（节点/单元心/
//! 壁面心）共用同一结构，仅坐标来源不同。

use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use af_foundation::{AfError, AfResult};
use af_grid::{MultiArray3d, Plot3dBlock};
use glam::DVec3;

fn read_i32(r: &mut impl Read) -> AfResult<i32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

fn read_f64_vec(r: &mut impl Read, n: usize) -> AfResult<Vec<f64>> {
    let mut bytes = vec![0u8; n * 8];
    r.read_exact(&mut bytes)?;
    Ok(bytes
        .chunks_exact(8)
        .map(|c| f64::from_le_bytes(c.try_into().expect("8 字节")))
        .collect())
}

fn write_i32(w: &mut impl Write, v: i32) -> AfResult<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

fn write_f64_slice(w: &mut impl Write, vals: &[f64]) -> AfResult<()> {
    let bytes: &[u8] = bytemuck::cast_slice(vals);
    w.write_all(bytes)?;
    Ok(())
}

/// 读多块网格，坐标按 LRef 无量纲化
pub fn read_grid(path: &Path, l_ref: f64) -> AfResult<Vec<Plot3dBlock>> {
    let file = std::fs::File::open(path)
        .map_err(|e| AfError::io_with_source(format!("网格文件 {}", path.display()), e))?;
    let mut r = BufReader::new(file);

    let num_blocks = read_i32(&mut r)? as usize;
    if num_blocks == 0 {
        return Err(AfError::io("网格文件没有块"));
    }
    let mut dims = Vec::with_capacity(num_blocks);
    for _ in 0..num_blocks {
        let ni = read_i32(&mut r)? as usize;
        let nj = read_i32(&mut r)? as usize;
        let nk = read_i32(&mut r)? as usize;
        if ni < 2 || nj < 2 || nk < 2 {
            return Err(AfError::invalid_geometry(format!(
                "块节点数非法: {}×{}×{}",
                ni, nj, nk
            )));
        }
        dims.push((ni, nj, nk));
    }

    let mut blocks = Vec::with_capacity(num_blocks);
    for &(ni, nj, nk) in &dims {
        let n = ni * nj * nk;
        let xs = read_f64_vec(&mut r, n)?;
        let ys = read_f64_vec(&mut r, n)?;
        let zs = read_f64_vec(&mut r, n)?;
        let mut coords = MultiArray3d::new(ni, nj, nk, 0, DVec3::ZERO);
        let mut idx = 0;
        for k in 0..nk as isize {
            for j in 0..nj as isize {
                for i in 0..ni as isize {
                    *coords.get_mut(i, j, k) =
                        DVec3::new(xs[idx], ys[idx], zs[idx]) / l_ref;
                    idx += 1;
                }
            }
        }
        blocks.push(Plot3dBlock::new(coords));
    }
    tracing::info!(blocks = blocks.len(), "网格读入完成");
    Ok(blocks)
}

/// 按坐标点集写网格（节点/单元心/壁面心变体共用）
pub fn write_points(
    path: &Path,
    blocks: &[(usize, usize, usize, Vec<DVec3>)],
    l_ref: f64,
) -> AfResult<()> {
    let file = std::fs::File::create(path)
        .map_err(|e| AfError::io_with_source(format!("网格文件 {}", path.display()), e))?;
    let mut w = BufWriter::new(file);
    write_i32(&mut w, blocks.len() as i32)?;
    for (ni, nj, nk, pts) in blocks {
        AfError::check_size("plot3d.points", ni * nj * nk, pts.len())?;
        write_i32(&mut w, *ni as i32)?;
        write_i32(&mut w, *nj as i32)?;
        write_i32(&mut w, *nk as i32)?;
    }
    for (_, _, _, pts) in blocks {
        for pick in [0usize, 1, 2] {
            let vals: Vec<f64> = pts
                .iter()
                .map(|p| {
                    let c = match pick {
                        0 => p.x,
                        1 => p.y,
                        _ => p.z,
                    };
                    c * l_ref
                })
                .collect();
            write_f64_slice(&mut w, &vals)?;
        }
    }
    Ok(())
}

/// 写节点网格
pub fn write_grid(path: &Path, blocks: &[Plot3dBlock], l_ref: f64) -> AfResult<()> {
    let data: Vec<(usize, usize, usize, Vec<DVec3>)> = blocks
        .iter()
        .map(|b| {
            let c = b.coords();
            let (ni, nj, nk) = (c.num_i(), c.num_j(), c.num_k());
            let mut pts = Vec::with_capacity(ni * nj * nk);
            for k in 0..nk as isize {
                for j in 0..nj as isize {
                    for i in 0..ni as isize {
                        pts.push(*c.get(i, j, k));
                    }
                }
            }
            (ni, nj, nk, pts)
        })
        .collect();
    write_points(path, &data, l_ref)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join("af_io_test");
        std::fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    #[test]
    fn test_grid_round_trip() {
        let block = Plot3dBlock::uniform(DVec3::ZERO, DVec3::new(2.0, 1.0, 1.0), 4, 2, 2);
        let path = tmp("grid_rt.p3d");
        write_grid(&path, std::slice::from_ref(&block), 1.0).unwrap();
        let back = read_grid(&path, 1.0).unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back[0], block);
    }

    #[test]
    fn test_grid_reference_length_scaling() {
        let block = Plot3dBlock::uniform(DVec3::ZERO, DVec3::ONE, 2, 2, 2);
        let path = tmp("grid_lref.p3d");
        // 写出量纲坐标 ×2，读入除以 2 还原
        write_grid(&path, std::slice::from_ref(&block), 2.0).unwrap();
        let back = read_grid(&path, 2.0).unwrap();
        assert_eq!(back[0], block);
        // 用错误参考长度读，坐标缩放
        let wrong = read_grid(&path, 1.0).unwrap();
        let c = *wrong[0].coords().get(2, 2, 2);
        assert!((c - DVec3::splat(2.0)).length() < 1e-14);
    }

    #[test]
    fn test_degenerate_grid_rejected() {
        let path = tmp("grid_bad.p3d");
        let mut bytes = Vec::new();
        bytes.extend(1i32.to_le_bytes());
        bytes.extend(1i32.to_le_bytes()); // Ni = 1 非法
        bytes.extend(2i32.to_le_bytes());
        bytes.extend(2i32.to_le_bytes());
        std::fs::write(&path, bytes).unwrap();
        assert!(read_grid(&path, 1.0).is_err());
    }
}
