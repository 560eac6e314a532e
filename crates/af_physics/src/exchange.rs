// crates/af_physics/src/exchange.rs

//! 块间切片交换
//!
//! 每条连接本质是一对双向通道：两侧同进程时退化为直接内存
//! 交换（恰好执行一次），跨进程时序列化为连续缓冲、以连接序号
//! 导出的成对标签做 send/recv，接收侧按逆方位码写回。
//!
//! 同一套机制服务于：原始状态、混合函数 f1/f2、壁距、涡黏、
//! 速度梯度张量（块间隐式非对角一致性的前提）。
//!
//! 几何交换额外携带逐单元有效标记（UNINIT/VALID 三态中的前
//! 两态，代替体积置零的魔数约定）："T" 型交汇处来自未填充
//! 连接的棱单元被跳过，四个面片边的跳过标记记入连接，后续
//! 轮次重试。

use af_foundation::{AfError, AfResult};
use af_grid::{inverse_code, Comm, Connection, FaceArea, PatchSpec};
use glam::{DMat3, DVec3};

use crate::block::ProcBlock;

/// 可交换的场
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// 原始状态记录
    State,
    /// 混合函数 f1
    F1,
    /// 混合函数 f2
    F2,
    /// 壁面距离
    WallDist,
    /// 涡黏
    EddyVisc,
    /// 速度梯度张量
    VelGrad,
}

impl Field {
    fn width(&self, block: &ProcBlock) -> usize {
        match self {
            Field::State => block.layout().n_eqns(),
            Field::VelGrad => 9,
            _ => 1,
        }
    }
}

fn read_field(block: &ProcBlock, field: Field, c: (isize, isize, isize)) -> Vec<f64> {
    match field {
        Field::State => block.state().record(c.0, c.1, c.2).to_vec(),
        Field::F1 => vec![*block.f1.get(c.0, c.1, c.2)],
        Field::F2 => vec![*block.f2.get(c.0, c.1, c.2)],
        Field::WallDist => vec![*block.wall_dist.get(c.0, c.1, c.2)],
        Field::EddyVisc => vec![*block.eddy_visc.get(c.0, c.1, c.2)],
        Field::VelGrad => {
            let m = block.vel_grad.get(c.0, c.1, c.2);
            let mut out = Vec::with_capacity(9);
            for col in 0..3 {
                let v = m.col(col);
                out.extend_from_slice(&[v.x, v.y, v.z]);
            }
            out
        }
    }
}

fn write_field(block: &mut ProcBlock, field: Field, c: (isize, isize, isize), data: &[f64]) {
    match field {
        Field::State => block.state_mut().set_record(c.0, c.1, c.2, data),
        Field::F1 => *block.f1.get_mut(c.0, c.1, c.2) = data[0],
        Field::F2 => *block.f2.get_mut(c.0, c.1, c.2) = data[0],
        Field::WallDist => *block.wall_dist.get_mut(c.0, c.1, c.2) = data[0],
        Field::EddyVisc => *block.eddy_visc.get_mut(c.0, c.1, c.2) = data[0],
        Field::VelGrad => {
            *block.vel_grad.get_mut(c.0, c.1, c.2) = DMat3::from_cols(
                DVec3::new(data[0], data[1], data[2]),
                DVec3::new(data[3], data[4], data[5]),
                DVec3::new(data[6], data[7], data[8]),
            );
        }
    }
}

/// 交换一个场的全部连接
///
/// 本进程同时拥有两侧的连接恰好交换一次；跨进程连接两侧各自
/// 调用，以连接序号导出的标签配对。
pub fn swap_field(
    blocks: &mut [ProcBlock],
    connections: &[Connection],
    comm: &dyn Comm,
    field: Field,
) -> AfResult<()> {
    let rank = comm.rank();
    for (idx, conn) in connections.iter().enumerate() {
        let first_local = conn.first.rank == rank;
        let second_local = conn.second.rank == rank;
        if first_local && second_local {
            swap_slice(blocks, conn, field)?;
        } else if first_local || second_local {
            swap_slice_comm(blocks, conn, idx, comm, field)?;
        }
    }
    Ok(())
}

/// 同进程直接交换
///
/// 交换域在面内两个方向各向外延伸 G 层：接收块的棱幽灵由
/// 供体侧已赋好的边界幽灵填充（黏性交叉梯度模板的前提）。
/// 先缓冲再写回，自连接（单块周期）同样成立。
fn swap_slice(blocks: &mut [ProcBlock], conn: &Connection, field: Field) -> AfResult<()> {
    let g = blocks[conn.first.local_block].ghosts() as isize;
    let (len1, len2) = (conn.first.len1() as isize, conn.first.len2() as isize);
    let (slen1, slen2) = (conn.second.len1() as isize, conn.second.len2() as isize);
    let mut writes: Vec<(usize, (isize, isize, isize), Vec<f64>)> = Vec::new();
    for l in 1..=g {
        for d2 in -g..len2 + g {
            for d1 in -g..len1 + g {
                if skip_extended(conn, d1, d2, len1, len2) {
                    continue;
                }
                let (m1, m2) = orient_ext(conn.orientation, d1, d2, slen1, slen2);
                let donor_second = cell_ext(&conn.second, m1, m2, l - 1);
                let donor_first = cell_ext(&conn.first, d1, d2, l - 1);
                writes.push((
                    conn.first.local_block,
                    cell_ext(&conn.first, d1, d2, -l),
                    read_field(&blocks[conn.second.local_block], field, donor_second),
                ));
                writes.push((
                    conn.second.local_block,
                    cell_ext(&conn.second, m1, m2, -l),
                    read_field(&blocks[conn.first.local_block], field, donor_first),
                ));
            }
        }
    }
    for (b, c, data) in writes {
        write_field(&mut blocks[b], field, c, &data);
    }
    Ok(())
}

/// 延伸域内被 "T" 交汇标记跳过的面片坐标
#[inline]
fn skip_extended(conn: &Connection, d1: isize, d2: isize, len1: isize, len2: isize) -> bool {
    (conn.adj_edge[0] && d1 < 0)
        || (conn.adj_edge[1] && d1 >= len1)
        || (conn.adj_edge[2] && d2 < 0)
        || (conn.adj_edge[3] && d2 >= len2)
}

/// 跨进程成对交换
fn swap_slice_comm(
    blocks: &mut [ProcBlock],
    conn: &Connection,
    idx: usize,
    comm: &dyn Comm,
    field: Field,
) -> AfResult<()> {
    let rank = comm.rank();
    let (local, remote) = conn.local_and_remote(rank);
    let is_first = conn.first.rank == rank;
    let (t1, t2) = conn.tags(idx);
    let (send_tag, recv_tag) = if is_first { (t1, t2) } else { (t2, t1) };

    let block = &blocks[local.local_block];
    let g = block.ghosts() as isize;
    let width = field.width(block);
    let (len1, len2) = (conn.first.len1() as isize, conn.first.len2() as isize);
    let (slen1, slen2) = (conn.second.len1() as isize, conn.second.len2() as isize);

    // 规范遍历序：第一面片坐标 (layer, d2, d1)，含 G 层延伸
    let mut send = Vec::new();
    for l in 1..=g {
        for d2 in -g..len2 + g {
            for d1 in -g..len1 + g {
                let c = if is_first {
                    cell_ext(&conn.first, d1, d2, l - 1)
                } else {
                    let (m1, m2) = orient_ext(conn.orientation, d1, d2, slen1, slen2);
                    cell_ext(&conn.second, m1, m2, l - 1)
                };
                send.extend_from_slice(&read_field(block, field, c));
            }
        }
    }

    let recv = comm.sendrecv(remote.rank, send_tag, recv_tag, &send)?;
    AfError::check_size("exchange.slice", send.len(), recv.len())?;

    let block = &mut blocks[local.local_block];
    let mut off = 0;
    for l in 1..=g {
        for d2 in -g..len2 + g {
            for d1 in -g..len1 + g {
                let data = &recv[off..off + width];
                off += width;
                if skip_extended(conn, d1, d2, len1, len2) {
                    continue;
                }
                let c = if is_first {
                    cell_ext(&conn.first, d1, d2, -l)
                } else {
                    let (m1, m2) = orient_ext(conn.orientation, d1, d2, slen1, slen2);
                    cell_ext(&conn.second, m1, m2, -l)
                };
                write_field(block, field, c, data);
            }
        }
    }
    Ok(())
}

// ============================================================
// 几何交换（三态 + "T" 交汇延迟）
// ============================================================

/// 每单元几何载荷：有效标记 + 体积 + 中心 + 三个宽度
/// + 供体深侧 d3 族面的面积向量与面心
const GEOM_WIDTH: usize = 14;

/// 供体侧读取：单元量 + 背离界面一侧的 d3 族面
///
/// 供体第 `layer` 层内部单元的深侧面对应接收块第 `layer+1` 层
/// 幽灵的外侧面。
fn read_geom(
    block: &ProcBlock,
    patch: &PatchSpec,
    d1: isize,
    d2: isize,
    layer: isize,
) -> [f64; GEOM_WIDTH] {
    let c = cell_ext(patch, d1, d2, layer);
    let vol = *block.vol.get(c.0, c.1, c.2);
    let cen = *block.center.get(c.0, c.1, c.2);
    // 深侧面索引：下侧面片向 +d3 深入，上侧面片向 −d3 深入
    let f3 = if patch.is_lower() {
        patch.d3_face as isize + layer + 1
    } else {
        patch.d3_face as isize - 1 - layer
    };
    let fi = face_ext(patch, d1, d2, f3);
    let area = block.farea[patch.direction3().ord()]
        .get(fi.0, fi.1, fi.2)
        .vector();
    let fc = *block.fcenter[patch.direction3().ord()].get(fi.0, fi.1, fi.2);
    [
        if vol > 0.0 { 1.0 } else { 0.0 }, // VALID / UNINIT
        vol,
        cen.x,
        cen.y,
        cen.z,
        *block.cell_width[0].get(c.0, c.1, c.2),
        *block.cell_width[1].get(c.0, c.1, c.2),
        *block.cell_width[2].get(c.0, c.1, c.2),
        area.x,
        area.y,
        area.z,
        fc.x,
        fc.y,
        fc.z,
    ]
}

/// 接收侧写几何；UNINIT 跳过并返回 false
///
/// 第 `l` 层幽灵的外侧 d3 族面取自供体深侧面；两侧 d3 同侧
/// （低-低 / 高-高）时索引方向在界面处反转，面积向量取反以
/// 维持"面积向量从低索引指向高索引"的不变量。
fn put_geom(
    block: &mut ProcBlock,
    patch: &PatchSpec,
    d1: isize,
    d2: isize,
    l: isize,
    data: &[f64],
    flip_normal: bool,
) -> bool {
    if data[0] < 0.5 {
        return false;
    }
    let c = cell_ext(patch, d1, d2, -l);
    *block.vol.get_mut(c.0, c.1, c.2) = data[1];
    *block.center.get_mut(c.0, c.1, c.2) = DVec3::new(data[2], data[3], data[4]);
    for d in 0..3 {
        *block.cell_width[d].get_mut(c.0, c.1, c.2) = data[5 + d];
    }
    // 幽灵外侧面：下侧面片在 d3_face − l，上侧在 d3_face + l
    let f3 = if patch.is_lower() {
        patch.d3_face as isize - l
    } else {
        patch.d3_face as isize + l
    };
    let fi = face_ext(patch, d1, d2, f3);
    let mut area = FaceArea::from_vector(DVec3::new(data[8], data[9], data[10]));
    if flip_normal {
        area = area.flipped();
    }
    let fam = patch.direction3().ord();
    *block.farea[fam].get_mut(fi.0, fi.1, fi.2) = area;
    *block.fcenter[fam].get_mut(fi.0, fi.1, fi.2) = DVec3::new(data[11], data[12], data[13]);
    true
}

/// 带边界延伸的方位映射（isize 版，允许越出面片）
fn orient_ext(code: u8, d1: isize, d2: isize, n1s: isize, n2s: isize) -> (isize, isize) {
    let bits = code - 1;
    let swap = bits & 1 != 0;
    let rev1 = bits & 2 != 0;
    let rev2 = bits & 4 != 0;
    let (mut a, mut b) = if swap { (d2, d1) } else { (d1, d2) };
    if rev1 {
        a = n1s - 1 - a;
    }
    if rev2 {
        b = n2s - 1 - b;
    }
    (a, b)
}

/// 几何交换单条连接（同进程），返回第一面片坐标系下的
/// 四个未填充边标记 [d1 低, d1 高, d2 低, d2 高]
///
/// 交换域在面内两个方向各向外延伸 G 层，使接收块的棱幽灵
/// 几何来自供体；供体尚未填充的单元（UNINIT）被跳过并记边。
pub fn swap_geom_slice(blocks: &mut [ProcBlock], conn: &Connection) -> AfResult<[bool; 4]> {
    let g = blocks[conn.first.local_block].ghosts() as isize;
    let (len1, len2) = (conn.first.len1() as isize, conn.first.len2() as isize);
    let (slen1, slen2) = (conn.second.len1() as isize, conn.second.len2() as isize);
    let mut adj = [false; 4];

    // (写往第一侧?, 该侧面片坐标 (d1, d2, 层), 载荷)
    let mut writes: Vec<(bool, (isize, isize, isize), [f64; GEOM_WIDTH])> = Vec::new();
    for l in 1..=g {
        for d2 in -g..len2 + g {
            for d1 in -g..len1 + g {
                if skip_extended(conn, d1, d2, len1, len2) {
                    continue;
                }
                let (m1, m2) = orient_ext(conn.orientation, d1, d2, slen1, slen2);
                writes.push((
                    true,
                    (d1, d2, l),
                    read_geom(&blocks[conn.second.local_block], &conn.second, m1, m2, l - 1),
                ));
                writes.push((
                    false,
                    (m1, m2, l),
                    read_geom(&blocks[conn.first.local_block], &conn.first, d1, d2, l - 1),
                ));
            }
        }
    }
    let flip = conn.flips_normal();
    for (to_first, (w1, w2, l), data) in writes {
        let (block_idx, patch) = if to_first {
            (conn.first.local_block, &conn.first)
        } else {
            (conn.second.local_block, &conn.second)
        };
        if !put_geom(&mut blocks[block_idx], patch, w1, w2, l, &data, flip) {
            // 未填充边按第一面片坐标记录
            let (d1, d2) = if to_first {
                (w1, w2)
            } else {
                orient_ext(inverse_code(conn.orientation), w1, w2, len1, len2)
            };
            if d1 < 0 {
                adj[0] = true;
            }
            if d1 >= len1 {
                adj[1] = true;
            }
            if d2 < 0 {
                adj[2] = true;
            }
            if d2 >= len2 {
                adj[3] = true;
            }
        }
    }
    Ok(adj)
}

/// 跨进程几何交换（单条连接的本进程侧）
///
/// 载荷布局与本地交换一致；标签在连接标签对上叠加轮次偏移，
/// 避免与场交换冲突。
fn swap_geom_slice_comm(
    blocks: &mut [ProcBlock],
    conn: &Connection,
    idx: usize,
    pass: usize,
    comm: &dyn Comm,
) -> AfResult<[bool; 4]> {
    let rank = comm.rank();
    let (local, remote) = conn.local_and_remote(rank);
    let is_first = conn.first.rank == rank;
    let (t1, t2) = conn.tags(idx);
    let offset = (1 << 20) * (1 + pass as u64);
    let (send_tag, recv_tag) = if is_first {
        (t1 + offset, t2 + offset)
    } else {
        (t2 + offset, t1 + offset)
    };

    let g = blocks[local.local_block].ghosts() as isize;
    let (len1, len2) = (conn.first.len1() as isize, conn.first.len2() as isize);
    let (slen1, slen2) = (conn.second.len1() as isize, conn.second.len2() as isize);

    let block = &blocks[local.local_block];
    let mut send = Vec::new();
    for l in 1..=g {
        for d2 in -g..len2 + g {
            for d1 in -g..len1 + g {
                if is_first {
                    send.extend_from_slice(&read_geom(block, &conn.first, d1, d2, l - 1));
                } else {
                    let (m1, m2) = orient_ext(conn.orientation, d1, d2, slen1, slen2);
                    send.extend_from_slice(&read_geom(block, &conn.second, m1, m2, l - 1));
                }
            }
        }
    }
    let recv = comm.sendrecv(remote.rank, send_tag, recv_tag, &send)?;
    AfError::check_size("exchange.geom", send.len(), recv.len())?;

    let block = &mut blocks[local.local_block];
    let flip = conn.flips_normal();
    let mut adj = [false; 4];
    let mut off = 0;
    for l in 1..=g {
        for d2 in -g..len2 + g {
            for d1 in -g..len1 + g {
                let data = &recv[off..off + GEOM_WIDTH];
                off += GEOM_WIDTH;
                if skip_extended(conn, d1, d2, len1, len2) {
                    continue;
                }
                let filled = if is_first {
                    put_geom(block, &conn.first, d1, d2, l, data, flip)
                } else {
                    let (m1, m2) = orient_ext(conn.orientation, d1, d2, slen1, slen2);
                    put_geom(block, &conn.second, m1, m2, l, data, flip)
                };
                if !filled {
                    if d1 < 0 {
                        adj[0] = true;
                    }
                    if d1 >= len1 {
                        adj[1] = true;
                    }
                    if d2 < 0 {
                        adj[2] = true;
                    }
                    if d2 >= len2 {
                        adj[3] = true;
                    }
                }
            }
        }
    }
    Ok(adj)
}

/// 面片坐标（isize，可越界进入幽灵）组装单元索引
fn cell_ext(p: &PatchSpec, d1: isize, d2: isize, layer: isize) -> (isize, isize, isize) {
    let d3 = if p.is_lower() {
        p.d3_face as isize + layer
    } else {
        p.d3_face as isize - 1 - layer
    };
    let (a1, a2) = p.direction3().transverse();
    let mut out = [0isize; 3];
    out[a1.ord()] = p.r1.0 as isize + d1;
    out[a2.ord()] = p.r2.0 as isize + d2;
    out[p.direction3().ord()] = d3;
    (out[0], out[1], out[2])
}

/// 面片坐标组装 d3 族面索引（d3 为面索引而非单元索引）
fn face_ext(p: &PatchSpec, d1: isize, d2: isize, d3_face: isize) -> (isize, isize, isize) {
    let (a1, a2) = p.direction3().transverse();
    let mut out = [0isize; 3];
    out[a1.ord()] = p.r1.0 as isize + d1;
    out[a2.ord()] = p.r2.0 as isize + d2;
    out[p.direction3().ord()] = d3_face;
    (out[0], out[1], out[2])
}

/// 全部连接的几何交换（含 "T" 交汇重试）
///
/// 若某连接出现未填充边，标记写回连接并在后续轮次重试，
/// 直至不再有新填充。
pub fn swap_geometry(
    blocks: &mut [ProcBlock],
    connections: &mut [Connection],
    comm: &dyn Comm,
) -> AfResult<()> {
    let rank = comm.rank();
    // 两轮足以让单个 "T" 交汇收敛；更深的链再加一轮
    for pass in 0..3 {
        let mut deferred = false;
        for (idx, conn) in connections.iter_mut().enumerate() {
            let first_local = conn.first.rank == rank;
            let second_local = conn.second.rank == rank;
            let adj = if first_local && second_local {
                swap_geom_slice(blocks, conn)?
            } else if first_local || second_local {
                swap_geom_slice_comm(blocks, conn, idx, pass, comm)?
            } else {
                [false; 4]
            };
            if adj.iter().any(|&b| b) {
                conn.set_adj_edge(adj);
                deferred = true;
            }
        }
        // 跨进程时所有 rank 必须同步重试轮数
        let mut flag = [if deferred { 1.0 } else { 0.0 }];
        comm.all_reduce_max(&mut flag)?;
        if flag[0] < 0.5 {
            break;
        }
        tracing::debug!(pass, "几何交换出现 T 型交汇延迟，重试");
    }
    // 交换后重建面几何近似：连接侧幽灵的横向面积由内侧延拓
    for block in blocks.iter_mut() {
        block.extend_connection_face_geometry();
    }
    Ok(())
}

/// 按连接交换派生量与梯度（残差装配后的标准序列）
pub fn swap_gradients_and_turbulence(
    blocks: &mut [ProcBlock],
    connections: &[Connection],
    comm: &dyn Comm,
) -> AfResult<()> {
    swap_field(blocks, connections, comm, Field::VelGrad)?;
    swap_field(blocks, connections, comm, Field::EddyVisc)?;
    if blocks.iter().any(|b| b.layout().is_rans()) {
        swap_field(blocks, connections, comm, Field::F1)?;
        swap_field(blocks, connections, comm, Field::F2)?;
    }
    Ok(())
}

impl ProcBlock {
    /// 连接侧幽灵的横向面几何延拓
    ///
    /// d3 族面已随几何交换从供体获得（含同侧配对的法向取反）；
    /// 横向两族的面积向量与面心在光滑网格上由最近的内部面
    /// 延拓（非连接侧由镜像赋值覆盖）。
    pub(crate) fn extend_connection_face_geometry(&mut self) {
        let g = self.g as isize;
        let dims = [self.ni as isize, self.nj as isize, self.nk as isize];
        for side in 1u8..=6 {
            if !self.bc.side_is_connection(side) {
                continue;
            }
            let axis = match side {
                1 | 2 => af_grid::Axis::I,
                3 | 4 => af_grid::Axis::J,
                _ => af_grid::Axis::K,
            };
            let lower = side % 2 == 1;
            let (t1, t2) = axis.transverse();
            let n3 = dims[axis.ord()];
            for l in 1..=g {
                for d2 in 0..dims[t2.ord()] {
                    for d1 in 0..dims[t1.ord()] {
                        let d3_ghost = if lower { -l } else { n3 + l - 1 };
                        let d3_src = if lower { 0 } else { n3 - 1 };
                        let mut gi = [0isize; 3];
                        gi[t1.ord()] = d1;
                        gi[t2.ord()] = d2;
                        gi[axis.ord()] = d3_ghost;
                        let mut si = [0isize; 3];
                        si[t1.ord()] = d1;
                        si[t2.ord()] = d2;
                        si[axis.ord()] = d3_src;
                        let shift = *self.center.get(gi[0], gi[1], gi[2])
                            - *self.center.get(si[0], si[1], si[2]);
                        for fam in 0..3 {
                            if fam == axis.ord() {
                                continue;
                            }
                            for up in 0..2isize {
                                let mut gf = gi;
                                let mut sf = si;
                                gf[fam] += up;
                                sf[fam] += up;
                                let area: FaceArea = *self.farea[fam].get(sf[0], sf[1], sf[2]);
                                *self.farea[fam].get_mut(gf[0], gf[1], gf[2]) = area;
                                let c = *self.fcenter[fam].get(sf[0], sf[1], sf[2]);
                                *self.fcenter[fam].get_mut(gf[0], gf[1], gf[2]) = c + shift;
                            }
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use af_config::{BlockBcConfig, BlockSide, EquationSet, SurfaceConfig};
    use af_grid::{
        find_connections, BoundaryConditions, Comm, Decomposition, Plot3dBlock, SingleComm,
    };
    use glam::DVec3;

    use crate::block::BlockId;
    use crate::models::PhysicsSet;

    /// 两块沿 i 相接的算例（i 低/高滑移壁，接缝 interblock）
    fn two_block_setup() -> (Vec<ProcBlock>, Vec<Connection>, af_config::Input, PhysicsSet) {
        let mut inp = af_config::Input::default();
        inp.fluid.equation_set = EquationSet::Euler;
        let mk_surfaces = |iface: BlockSide| -> Vec<SurfaceConfig> {
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
                bc: if side == iface {
                    "interblock".to_string()
                } else {
                    "slipWall".to_string()
                },
                tag: 0,
                range1: None,
                range2: None,
            })
            .collect()
        };
        inp.boundaries = vec![
            BlockBcConfig {
                block: 0,
                surfaces: mk_surfaces(BlockSide::IHigh),
            },
            BlockBcConfig {
                block: 1,
                surfaces: mk_surfaces(BlockSide::ILow),
            },
        ];
        let physics = PhysicsSet::from_input(&inp);

        let p0 = Plot3dBlock::uniform(DVec3::ZERO, DVec3::new(1.0, 1.0, 1.0), 2, 2, 2);
        let p1 = Plot3dBlock::uniform(DVec3::new(1.0, 0.0, 0.0), DVec3::ONE, 2, 2, 2);
        let bc0 = BoundaryConditions::from_config((2, 2, 2), &inp.boundaries[0]).unwrap();
        let bc1 = BoundaryConditions::from_config((2, 2, 2), &inp.boundaries[1]).unwrap();

        let mut conns =
            find_connections(&[(p0.clone(), bc0.clone()), (p1.clone(), bc1.clone())], |_| {
                None
            })
            .unwrap();
        let decomp = Decomposition::serial(2);
        for c in &mut conns {
            c.assign_ranks(&decomp);
        }

        let mk_block = |p: &Plot3dBlock, bc: BoundaryConditions, n: usize| {
            ProcBlock::from_geometry(
                p,
                bc,
                BlockId {
                    parent: n,
                    global_pos: n,
                    rank: 0,
                    local_pos: n,
                },
                &inp,
                &physics,
            )
            .unwrap()
        };
        let blocks = vec![mk_block(&p0, bc0, 0), mk_block(&p1, bc1, 1)];
        (blocks, conns, inp, physics)
    }

    #[test]
    fn test_state_swap_fills_ghosts_from_neighbor() {
        let (mut blocks, conns, inp, phys) = two_block_setup();
        for (n, b) in blocks.iter_mut().enumerate() {
            b.initialize_states(&inp, &phys).unwrap();
            // 左右块给不同密度
            let range = b.state().range_all();
            for (i, j, k) in range.iter() {
                let mut w = b.primitive(i, j, k);
                w.set_rho(1.0 + n as f64);
                b.set_primitive(i, j, k, &w);
            }
        }
        let comm = SingleComm::new();
        swap_field(&mut blocks, &conns, &comm, Field::State).unwrap();
        // 块 0 的 i 高侧幽灵来自块 1 内部
        let w = blocks[0].primitive(2, 0, 0);
        assert!((w.rho() - 2.0).abs() < 1e-12);
        let w2 = blocks[0].primitive(3, 1, 1);
        assert!((w2.rho() - 2.0).abs() < 1e-12);
        // 块 1 的 i 低侧幽灵来自块 0
        let w3 = blocks[1].primitive(-1, 1, 0);
        assert!((w3.rho() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_swap_twice_is_stable() {
        // 性质：交换后再交换，幽灵不变（双射 + 供体为内部单元）
        let (mut blocks, conns, inp, phys) = two_block_setup();
        for b in blocks.iter_mut() {
            b.initialize_states(&inp, &phys).unwrap();
        }
        // 标记场：每单元唯一值
        for (n, b) in blocks.iter_mut().enumerate() {
            let range = b.state().range_physical();
            for (i, j, k) in range.iter() {
                let mut w = b.primitive(i, j, k);
                w.set_p(0.5 + 0.001 * (n * 100 + (i * 9 + j * 3 + k) as usize) as f64);
                b.set_primitive(i, j, k, &w);
            }
        }
        let comm = SingleComm::new();
        swap_field(&mut blocks, &conns, &comm, Field::State).unwrap();
        let snapshot: Vec<f64> = blocks[0].state().raw().to_vec();
        swap_field(&mut blocks, &conns, &comm, Field::State).unwrap();
        assert_eq!(snapshot, blocks[0].state().raw());
    }

    #[test]
    fn test_scalar_field_swap() {
        let (mut blocks, conns, inp, phys) = two_block_setup();
        for (n, b) in blocks.iter_mut().enumerate() {
            b.initialize_states(&inp, &phys).unwrap();
            b.eddy_visc.fill(10.0 * (n + 1) as f64);
        }
        let comm = SingleComm::new();
        swap_field(&mut blocks, &conns, &comm, Field::EddyVisc).unwrap();
        assert!((blocks[0].eddy_viscosity(2, 1, 1) - 20.0).abs() < 1e-12);
        assert!((blocks[1].eddy_viscosity(-2, 0, 0) - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_geometry_swap_matches_physical_continuation() {
        let (mut blocks, mut conns, _inp, _phys) = two_block_setup();
        let comm = SingleComm::new();
        swap_geometry(&mut blocks, &mut conns, &comm).unwrap();
        // 块 0 的 i 高侧幽灵中心 = 块 1 的第一列内部中心
        let ghost_center = blocks[0].cell_center(2, 0, 0);
        let donor_center = blocks[1].cell_center(0, 0, 0);
        assert!((ghost_center - donor_center).length() < 1e-14);
        // 体积连续
        assert!((blocks[0].volume(2, 0, 0) - blocks[1].volume(0, 0, 0)).abs() < 1e-14);
        // 无 T 型交汇：连接不带跳过标记
        assert!(conns.iter().all(|c| c.adj_edge.iter().all(|&b| !b)));
    }

    #[test]
    fn test_same_side_pairing_flips_face_normals() {
        // 镜像块：块 1 的 i 沿 −x、j 沿 −y（右手系保持），
        // 两块的 i 下侧在 x = 0 相遇 → 低-低配对，方位码 3，
        // 供体面积向量取反后保持"从低索引指向高索引"
        let mut inp = af_config::Input::default();
        inp.fluid.equation_set = EquationSet::Euler;
        let physics = PhysicsSet::from_input(&inp);

        let b0 = Plot3dBlock::uniform(DVec3::ZERO, DVec3::ONE, 2, 2, 2);
        let mut coords = af_grid::MultiArray3d::new(3, 3, 3, 0, DVec3::ZERO);
        for k in 0..3isize {
            for j in 0..3isize {
                for i in 0..3isize {
                    *coords.get_mut(i, j, k) = DVec3::new(
                        -(i as f64) * 0.5,
                        1.0 - j as f64 * 0.5,
                        k as f64 * 0.5,
                    );
                }
            }
        }
        let b1 = Plot3dBlock::new(coords);

        let mk_surfaces = || -> Vec<SurfaceConfig> {
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
                bc: if side == BlockSide::ILow {
                    "interblock".to_string()
                } else {
                    "slipWall".to_string()
                },
                tag: 0,
                range1: None,
                range2: None,
            })
            .collect()
        };
        let bc0 = af_grid::BoundaryConditions::from_config(
            (2, 2, 2),
            &BlockBcConfig {
                block: 0,
                surfaces: mk_surfaces(),
            },
        )
        .unwrap();
        let bc1 = af_grid::BoundaryConditions::from_config(
            (2, 2, 2),
            &BlockBcConfig {
                block: 1,
                surfaces: mk_surfaces(),
            },
        )
        .unwrap();

        let mut conns =
            find_connections(&[(b0.clone(), bc0.clone()), (b1.clone(), bc1.clone())], |_| {
                None
            })
            .unwrap();
        let decomp = Decomposition::serial(2);
        for c in &mut conns {
            c.assign_ranks(&decomp);
        }
        assert_eq!(conns.len(), 1);
        assert_eq!(conns[0].orientation, 3); // j 反转
        assert!(conns[0].flips_normal()); // 低-低配对

        let mk_block = |p: &Plot3dBlock, bc: af_grid::BoundaryConditions, n: usize| {
            ProcBlock::from_geometry(
                p,
                bc,
                BlockId {
                    parent: n,
                    global_pos: n,
                    rank: 0,
                    local_pos: n,
                },
                &inp,
                &physics,
            )
            .unwrap()
        };
        let mut blocks = vec![mk_block(&b0, bc0, 0), mk_block(&b1, bc1, 1)];
        let comm = SingleComm::new();
        swap_geometry(&mut blocks, &mut conns, &comm).unwrap();

        // 幽灵单元几何是对面块的物理延拓
        let ghost_center = blocks[0].cell_center(-1, 0, 0);
        assert!((ghost_center - DVec3::new(-0.25, 0.25, 0.25)).length() < 1e-14);
        assert!((blocks[0].volume(-1, 0, 0) - 0.125).abs() < 1e-14);

        // 块 0 幽灵外侧 i 面：供体向量（−x 朝向）取反后为 +x，模不变
        let fa = blocks[0].face_area(af_grid::Axis::I, -1, 0, 0);
        assert!((fa.unit - DVec3::X).length() < 1e-12, "unit = {:?}", fa.unit);
        assert!((fa.mag - 0.25).abs() < 1e-13);
        let fa2 = blocks[0].face_area(af_grid::Axis::I, -2, 1, 1);
        assert!((fa2.unit - DVec3::X).length() < 1e-12);

        // 对侧对称：块 1 的低→高索引方向是 −x
        let fb = blocks[1].face_area(af_grid::Axis::I, -1, 0, 0);
        assert!((fb.unit + DVec3::X).length() < 1e-12, "unit = {:?}", fb.unit);
        assert!((fb.mag - 0.25).abs() < 1e-13);
    }

    #[test]
    fn test_low_high_pairing_keeps_face_normals() {
        // 常规高-低配对不取反：交换后的幽灵外侧面保持 +x
        let (mut blocks, mut conns, _inp, _phys) = two_block_setup();
        assert!(!conns[0].flips_normal());
        let comm = SingleComm::new();
        swap_geometry(&mut blocks, &mut conns, &comm).unwrap();
        // 块 0 的 i 高侧幽灵外侧面（面索引 3）来自块 1 的面 1
        let fa = blocks[0].face_area(af_grid::Axis::I, 3, 0, 0);
        assert!((fa.unit - DVec3::X).length() < 1e-12);
        assert!((fa.mag - 0.25).abs() < 1e-13);
    }

    #[test]
    fn test_velocity_gradient_tensor_swap_round_trip() {
        let (mut blocks, conns, inp, phys) = two_block_setup();
        for b in blocks.iter_mut() {
            b.initialize_states(&inp, &phys).unwrap();
        }
        let m = DMat3::from_cols(
            DVec3::new(1.0, 2.0, 3.0),
            DVec3::new(4.0, 5.0, 6.0),
            DVec3::new(7.0, 8.0, 9.0),
        );
        *blocks[1].vel_grad.get_mut(0, 1, 1) = m;
        let comm = SingleComm::new();
        swap_field(&mut blocks, &conns, &comm, Field::VelGrad).unwrap();
        let got = blocks[0].velocity_gradient(2, 1, 1);
        assert!((got.col(0) - m.col(0)).length() < 1e-14);
        assert!((got.col(2) - m.col(2)).length() < 1e-14);
    }
}
