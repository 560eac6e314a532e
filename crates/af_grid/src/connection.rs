// crates/af_grid/src/connection.rs

//! 块间连接
//!
//! 一条连接描述两个块面片（patch）之间的一一对应：两侧的块号、
//! 进程号、面片范围，以及 1..=8 的方位码。方位码编码三个布尔量
//! （d1/d2 交换、d1 反转、d2 反转），由一个查表纯函数
//! [`orient`] 实现全部八种映射，不再按方向组合展开分支。
//!
//! 连接由几何匹配产生：所有 interblock / periodic 面按角点坐标
//! 两两配对（periodic 附加标签表中的平移向量）。
//!
//! # 不变量
//!
//! 方位码与两侧面片范围共同决定面片单元间的双射；
//! [`inverse_code`] 给出反向映射的方位码。

use af_foundation::{AfError, AfResult};
use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::boundary::{BcType, BoundaryConditions, BoundarySurface};
use crate::decomp::Decomposition;
use crate::plot3d::Plot3dBlock;
use crate::range::Axis;

/// 几何匹配容差
const MATCH_TOL: f64 = 1.0e-8;

/// 方位码映射：第一面片单元坐标 (d1, d2) → 第二面片坐标
///
/// `n1s`、`n2s` 为第二面片的两个方向跨度。
/// 码 = 1 + swap + 2·rev1 + 4·rev2。
#[inline]
pub fn orient(code: u8, d1: usize, d2: usize, n1s: usize, n2s: usize) -> (usize, usize) {
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

/// 反向映射的方位码
///
/// 交换存在时两个反转位互换角色，否则码自逆。
#[inline]
pub fn inverse_code(code: u8) -> u8 {
    let bits = code - 1;
    let swap = bits & 1;
    if swap != 0 {
        let rev1 = (bits >> 1) & 1;
        let rev2 = (bits >> 2) & 1;
        1 + swap + 2 * rev2 + 4 * rev1
    } else {
        code
    }
}

/// 连接的一侧面片
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PatchSpec {
    /// 全局块号
    pub block: usize,
    /// 所属进程
    pub rank: usize,
    /// 进程内局部块号
    pub local_block: usize,
    /// 侧面 1..=6
    pub side: u8,
    /// 常值方向面索引
    pub d3_face: usize,
    /// 面内第一方向单元范围
    pub r1: (usize, usize),
    /// 面内第二方向单元范围
    pub r2: (usize, usize),
}

impl PatchSpec {
    fn from_surface(block: usize, s: &BoundarySurface) -> Self {
        Self {
            block,
            rank: 0,
            local_block: block,
            side: s.side,
            d3_face: s.d3_face,
            r1: s.r1,
            r2: s.r2,
        }
    }

    /// 常值方向
    pub fn direction3(&self) -> Axis {
        match self.side {
            1 | 2 => Axis::I,
            3 | 4 => Axis::J,
            _ => Axis::K,
        }
    }

    /// 是否下侧
    pub fn is_lower(&self) -> bool {
        self.side % 2 == 1
    }

    /// d1 跨度
    pub fn len1(&self) -> usize {
        self.r1.1 - self.r1.0
    }

    /// d2 跨度
    pub fn len2(&self) -> usize {
        self.r2.1 - self.r2.0
    }

    /// 将面片坐标 (d1, d2, 深度 layer) 组装为单元索引 (i, j, k)
    ///
    /// `layer` 0 为紧贴界面的内部单元，负值进入幽灵域。
    pub fn cell(&self, d1: usize, d2: usize, layer: isize) -> (isize, isize, isize) {
        let d3 = if self.is_lower() {
            self.d3_face as isize + layer
        } else {
            self.d3_face as isize - 1 - layer
        };
        let (a1, a2) = self.direction3().transverse();
        let mut out = [0isize; 3];
        out[a1.ord()] = (self.r1.0 + d1) as isize;
        out[a2.ord()] = (self.r2.0 + d2) as isize;
        out[self.direction3().ord()] = d3;
        (out[0], out[1], out[2])
    }
}

/// 块间连接
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    /// 第一侧
    pub first: PatchSpec,
    /// 第二侧
    pub second: PatchSpec,
    /// 方位码 1..=8
    pub orientation: u8,
    /// 是否周期连接
    pub periodic: bool,
    /// "T" 型交汇时待跳过的面片边：
    /// [d1 低, d1 高, d2 低, d2 高]（以第一面片坐标计）
    pub adj_edge: [bool; 4],
}

impl Connection {
    /// 第一面片坐标 → 第二面片坐标
    #[inline]
    pub fn map_to_second(&self, d1: usize, d2: usize) -> (usize, usize) {
        orient(
            self.orientation,
            d1,
            d2,
            self.second.len1(),
            self.second.len2(),
        )
    }

    /// 第二面片坐标 → 第一面片坐标
    #[inline]
    pub fn map_to_first(&self, d1: usize, d2: usize) -> (usize, usize) {
        orient(
            inverse_code(self.orientation),
            d1,
            d2,
            self.first.len1(),
            self.first.len2(),
        )
    }

    /// 本连接是否跨进程
    pub fn is_distributed(&self) -> bool {
        self.first.rank != self.second.rank
    }

    /// 由连接序号导出的一对通信标签
    ///
    /// 低块号一侧用偶标签发送，另一侧相反，保证两侧约定一致。
    pub fn tags(&self, index: usize) -> (u64, u64) {
        ((2 * index) as u64, (2 * index + 1) as u64)
    }

    /// 指定 rank 所见的本地面片与对端面片
    pub fn local_and_remote(&self, rank: usize) -> (&PatchSpec, &PatchSpec) {
        if self.first.rank == rank {
            (&self.first, &self.second)
        } else {
            (&self.second, &self.first)
        }
    }

    /// 两侧 d3 同侧（低-低或高-高）时面法向在交换时需要取反
    pub fn flips_normal(&self) -> bool {
        self.first.is_lower() == self.second.is_lower()
    }

    /// 按 decomposition 填充 rank 与局部块号
    pub fn assign_ranks(&mut self, decomp: &Decomposition) {
        self.first.rank = decomp.rank(self.first.block);
        self.first.local_block = decomp.local_position(self.first.block);
        self.second.rank = decomp.rank(self.second.block);
        self.second.local_block = decomp.local_position(self.second.block);
    }

    /// 记录待跳过的面片边（T 型交汇延迟填充后由调用方设置）
    pub fn set_adj_edge(&mut self, edges: [bool; 4]) {
        for (dst, src) in self.adj_edge.iter_mut().zip(edges) {
            *dst = *dst || src;
        }
    }
}

// ============================================================
// 几何匹配
// ============================================================

/// 面片四角点的节点坐标
fn patch_corners(block: &Plot3dBlock, s: &BoundarySurface) -> [DVec3; 4] {
    let corner = |d1: usize, d2: usize| -> DVec3 {
        let (i, j, k) = s.assemble(d1 as isize, d2 as isize, s.d3_face as isize);
        *block.coords().get(i, j, k)
    };
    [
        corner(s.r1.0, s.r2.0),
        corner(s.r1.1, s.r2.0),
        corner(s.r1.0, s.r2.1),
        corner(s.r1.1, s.r2.1),
    ]
}

/// 尝试以全部 8 个方位码匹配两个面片的角点
///
/// `shift` 施加在第一面片上（periodic 的平移）。
fn try_match(a: &[DVec3; 4], b: &[DVec3; 4], shift: DVec3) -> Option<u8> {
    // 角点以 (c1, c2) ∈ {0,1}² 标号：索引 = c1 + 2·c2
    for code in 1u8..=8 {
        let bits = code - 1;
        let swap = bits & 1 != 0;
        let rev1 = bits & 2 != 0;
        let rev2 = bits & 4 != 0;
        let mapped = |c1: usize, c2: usize| -> usize {
            let (mut a1, mut a2) = if swap { (c2, c1) } else { (c1, c2) };
            if rev1 {
                a1 = 1 - a1;
            }
            if rev2 {
                a2 = 1 - a2;
            }
            a1 + 2 * a2
        };
        let ok = (0..4).all(|n| {
            let (c1, c2) = (n % 2, n / 2);
            (a[n] + shift - b[mapped(c1, c2)]).length() < MATCH_TOL
        });
        if ok {
            return Some(code);
        }
    }
    None
}

/// 在全部块间寻找连接
///
/// `periodic_shift` 按标签号给出周期平移向量（无量纲坐标）。
pub fn find_connections(
    blocks: &[(Plot3dBlock, BoundaryConditions)],
    periodic_shift: impl Fn(u32) -> Option<DVec3>,
) -> AfResult<Vec<Connection>> {
    // 收集全部连接面
    let mut patches: Vec<(usize, BoundarySurface)> = Vec::new();
    for (b, (_, bc)) in blocks.iter().enumerate() {
        for s in bc.surfaces() {
            if s.bc.is_connection() {
                patches.push((b, *s));
            }
        }
    }

    let mut used = vec![false; patches.len()];
    let mut connections = Vec::new();
    for a in 0..patches.len() {
        if used[a] {
            continue;
        }
        let (blk_a, surf_a) = &patches[a];
        let corners_a = patch_corners(&blocks[*blk_a].0, surf_a);
        let shifts: Vec<DVec3> = if surf_a.bc == BcType::Periodic {
            match periodic_shift(surf_a.tag) {
                Some(t) => vec![t, -t],
                None => {
                    return Err(AfError::unknown_bc(format!(
                        "periodic 标签 {} 缺少平移数据",
                        surf_a.tag
                    )))
                }
            }
        } else {
            vec![DVec3::ZERO]
        };

        let mut matched = None;
        'search: for b in (a + 1)..patches.len() {
            if used[b] {
                continue;
            }
            let (blk_b, surf_b) = &patches[b];
            if surf_a.bc != surf_b.bc {
                continue;
            }
            let corners_b = patch_corners(&blocks[*blk_b].0, surf_b);
            for shift in &shifts {
                if let Some(code) = try_match(&corners_a, &corners_b, *shift) {
                    matched = Some((b, code));
                    break 'search;
                }
            }
        }

        let (b, code) = matched.ok_or_else(|| {
            AfError::invalid_geometry(format!(
                "块 {} 侧面 {} 的 {} 面未找到配对",
                blk_a,
                surf_a.side,
                surf_a.bc.name()
            ))
        })?;
        used[a] = true;
        used[b] = true;
        let (blk_b, surf_b) = &patches[b];
        connections.push(Connection {
            first: PatchSpec::from_surface(*blk_a, surf_a),
            second: PatchSpec::from_surface(*blk_b, surf_b),
            orientation: code,
            periodic: surf_a.bc == BcType::Periodic,
            adj_edge: [false; 4],
        });
    }

    tracing::debug!(count = connections.len(), "块间连接匹配完成");
    Ok(connections)
}
