// crates/af_io/src/function_file.rs

//! plot3d 函数文件
//!
//! 网格文件的块维前导多一个 numVars，随后每块逐变量写
//! `numVars × N` 个 f64（单元心或节点插值变体共用结构）。
//!
//! ```text
//! [numBlocks:i32] ([Ni,Nj,Nk,numVars]:i32×4)×numBlocks
//! ([var₀:f64×N]…[var_{numVars−1}:f64×N])×numBlocks
//! ```

use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use af_foundation::{AfError, AfResult};

/// 单块的函数数据
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionBlock {
    /// 点数（单元或节点）
    pub dims: (usize, usize, usize),
    /// 变量数组
    pub fields: Vec<Vec<f64>>,
}

/// 写函数文件
pub fn write_function_file(path: &Path, blocks: &[FunctionBlock]) -> AfResult<()> {
    let file = std::fs::File::create(path)
        .map_err(|e| AfError::io_with_source(format!("函数文件 {}", path.display()), e))?;
    let mut w = BufWriter::new(file);
    w.write_all(&(blocks.len() as i32).to_le_bytes())?;
    for b in blocks {
        w.write_all(&(b.dims.0 as i32).to_le_bytes())?;
        w.write_all(&(b.dims.1 as i32).to_le_bytes())?;
        w.write_all(&(b.dims.2 as i32).to_le_bytes())?;
        w.write_all(&(b.fields.len() as i32).to_le_bytes())?;
    }
    for b in blocks {
        let n = b.dims.0 * b.dims.1 * b.dims.2;
        for field in &b.fields {
            AfError::check_size("function.cells", n, field.len())?;
            let bytes: &[u8] = bytemuck::cast_slice(field.as_slice());
            w.write_all(bytes)?;
        }
    }
    Ok(())
}

/// 读函数文件
pub fn read_function_file(path: &Path) -> AfResult<Vec<FunctionBlock>> {
    let file = std::fs::File::open(path)
        .map_err(|e| AfError::io_with_source(format!("函数文件 {}", path.display()), e))?;
    let mut r = BufReader::new(file);
    let mut i32buf = [0u8; 4];
    let mut read_i32 = |r: &mut BufReader<std::fs::File>| -> AfResult<usize> {
        r.read_exact(&mut i32buf)?;
        Ok(i32::from_le_bytes(i32buf) as usize)
    };
    let num_blocks = read_i32(&mut r)?;
    let mut dims = Vec::with_capacity(num_blocks);
    for _ in 0..num_blocks {
        let ni = read_i32(&mut r)?;
        let nj = read_i32(&mut r)?;
        let nk = read_i32(&mut r)?;
        let nv = read_i32(&mut r)?;
        dims.push((ni, nj, nk, nv));
    }
    let mut out = Vec::with_capacity(num_blocks);
    for (ni, nj, nk, nv) in dims {
        let n = ni * nj * nk;
        let mut fields = Vec::with_capacity(nv);
        for _ in 0..nv {
            let mut bytes = vec![0u8; n * 8];
            r.read_exact(&mut bytes)?;
            fields.push(
                bytes
                    .chunks_exact(8)
                    .map(|c| f64::from_le_bytes(c.try_into().expect("8 字节")))
                    .collect(),
            );
        }
        out.push(FunctionBlock {
            dims: (ni, nj, nk),
            fields,
        });
    }
    Ok(out)
}
