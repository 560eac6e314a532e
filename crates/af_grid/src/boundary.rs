// crates/af_grid/src/boundary.rs

//! 边界面与块边界条件集合
//!
//! [`BoundarySurface`] 是块六个侧面之一上的轴对齐单元面范围，
//! 携带边界条件类型与标签。[`BoundaryConditions`] 持有一个块的
//! 全部边界面，并支持块切分/拼接时的范围裁剪。
//!
//! 侧面编号沿用 1..=6：i 下、i 上、j 下、j 上、k 下、k 上。

use af_foundation::{AfError, AfResult};
use serde::{Deserialize, Serialize};

use af_config::{BlockBcConfig, BlockSide, SurfaceConfig};

use crate::range::Axis;

/// 边界条件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BcType {
    /// 滑移壁（无穿透）
    SlipWall,
    /// 无滑移黏性壁
    ViscousWall,
    /// 特征远场
    Characteristic,
    /// 压力出口
    PressureOutlet,
    /// 亚声速入口
    SubsonicInflow,
    /// 超声速入口
    SupersonicInflow,
    /// 驻点（总压/总温）入口
    StagnationInlet,
    /// 通用入口（可配非反射）
    Inlet,
    /// 周期边界
    Periodic,
    /// 块间连接
    Interblock,
}

impl BcType {
    /// 由名称解析；未知名返回 [`AfError::UnknownBc`]
    pub fn from_name(name: &str) -> AfResult<Self> {
        match name {
            "slipWall" => Ok(Self::SlipWall),
            "viscousWall" => Ok(Self::ViscousWall),
            "characteristic" => Ok(Self::Characteristic),
            "pressureOutlet" => Ok(Self::PressureOutlet),
            "subsonicInflow" => Ok(Self::SubsonicInflow),
            "supersonicInflow" => Ok(Self::SupersonicInflow),
            "stagnationInlet" => Ok(Self::StagnationInlet),
            "inlet" => Ok(Self::Inlet),
            "periodic" => Ok(Self::Periodic),
            "interblock" => Ok(Self::Interblock),
            _ => Err(AfError::unknown_bc(name)),
        }
    }

    /// 规范名称
    pub fn name(&self) -> &'static str {
        match self {
            Self::SlipWall => "slipWall",
            Self::ViscousWall => "viscousWall",
            Self::Characteristic => "characteristic",
            Self::PressureOutlet => "pressureOutlet",
            Self::SubsonicInflow => "subsonicInflow",
            Self::SupersonicInflow => "supersonicInflow",
            Self::StagnationInlet => "stagnationInlet",
            Self::Inlet => "inlet",
            Self::Periodic => "periodic",
            Self::Interblock => "interblock",
        }
    }

    /// 是否为块间连接类（状态由交换而非边界条件赋值）
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Periodic | Self::Interblock)
    }

    /// 是否为壁面类
    pub fn is_wall(&self) -> bool {
        matches!(self, Self::SlipWall | Self::ViscousWall)
    }
}

/// 单个边界面
///
/// `d3_face` 是常值方向上的面索引（下侧 0，上侧 N）；
/// `r1`、`r2` 是面内两个方向的半开单元范围，顺序按
/// [`Axis::transverse`] 约定。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundarySurface {
    /// 边界条件
    pub bc: BcType,
    /// 标签号
    pub tag: u32,
    /// 侧面 1..=6
    pub side: u8,
    /// 常值方向面索引
    pub d3_face: usize,
    /// 面内第一方向单元范围
    pub r1: (usize, usize),
    /// 面内第二方向单元范围
    pub r2: (usize, usize),
}

impl BoundarySurface {
    /// 常值方向
    pub fn direction3(&self) -> Axis {
        match self.side {
            1 | 2 => Axis::I,
            3 | 4 => Axis::J,
            _ => Axis::K,
        }
    }

    /// 面内两个方向
    pub fn directions12(&self) -> (Axis, Axis) {
        self.direction3().transverse()
    }

    /// 是否为下侧面（1、3、5）
    pub fn is_lower(&self) -> bool {
        self.side % 2 == 1
    }

    /// 面类型 1..=6
    pub fn surface_type(&self) -> u8 {
        self.side
    }

    /// 面内单元数
    pub fn num_faces(&self) -> usize {
        (self.r1.1 - self.r1.0) * (self.r2.1 - self.r2.0)
    }

    /// 面内坐标是否属于本面
    pub fn contains(&self, d1: usize, d2: usize) -> bool {
        d1 >= self.r1.0 && d1 < self.r1.1 && d2 >= self.r2.0 && d2 < self.r2.1
    }

    /// 由面内坐标得到块单元索引 (i, j, k)（紧贴边界的内部单元）
    pub fn interior_cell(&self, d1: usize, d2: usize) -> (isize, isize, isize) {
        let d3_cell = if self.is_lower() {
            self.d3_face as isize
        } else {
            self.d3_face as isize - 1
        };
        self.assemble(d1 as isize, d2 as isize, d3_cell)
    }

    /// 将 (d1, d2, d3) 组装为 (i, j, k)
    pub fn assemble(&self, d1: isize, d2: isize, d3: isize) -> (isize, isize, isize) {
        let (a1, a2) = self.directions12();
        let mut out = [0isize; 3];
        out[a1.ord()] = d1;
        out[a2.ord()] = d2;
        out[self.direction3().ord()] = d3;
        (out[0], out[1], out[2])
    }

    /// 边界面外法向的符号：下侧 -1，上侧 +1
    pub fn outward_sign(&self) -> f64 {
        if self.is_lower() {
            -1.0
        } else {
            1.0
        }
    }
}

/// 块的边界条件集合
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundaryConditions {
    surfaces: Vec<BoundarySurface>,
}

fn side_code(side: BlockSide) -> u8 {
    match side {
        BlockSide::ILow => 1,
        BlockSide::IHigh => 2,
        BlockSide::JLow => 3,
        BlockSide::JHigh => 4,
        BlockSide::KLow => 5,
        BlockSide::KHigh => 6,
    }
}

impl BoundaryConditions {
    /// 直接由面列表构造
    pub fn new(mut surfaces: Vec<BoundarySurface>) -> Self {
        surfaces.sort_by_key(|s| (s.side, s.r1.0, s.r2.0));
        Self { surfaces }
    }

    /// 由配置构造并校验覆盖完整
    pub fn from_config(
        dims: (usize, usize, usize),
        cfg: &BlockBcConfig,
    ) -> AfResult<Self> {
        let mut surfaces = Vec::with_capacity(cfg.surfaces.len());
        for sc in &cfg.surfaces {
            surfaces.push(Self::surface_from_config(dims, sc)?);
        }
        let bc = Self::new(surfaces);
        bc.validate_coverage(dims)?;
        Ok(bc)
    }

    fn surface_from_config(
        dims: (usize, usize, usize),
        sc: &SurfaceConfig,
    ) -> AfResult<BoundarySurface> {
        let bc = BcType::from_name(&sc.bc)?;
        let side = side_code(sc.side);
        let d3_axis = match side {
            1 | 2 => Axis::I,
            3 | 4 => Axis::J,
            _ => Axis::K,
        };
        let dim_along = |a: Axis| match a {
            Axis::I => dims.0,
            Axis::J => dims.1,
            Axis::K => dims.2,
        };
        let (a1, a2) = d3_axis.transverse();
        let r1 = sc.range1.map(|r| (r[0], r[1])).unwrap_or((0, dim_along(a1)));
        let r2 = sc.range2.map(|r| (r[0], r[1])).unwrap_or((0, dim_along(a2)));
        let d3_face = if side % 2 == 1 { 0 } else { dim_along(d3_axis) };
        if r1.1 > dim_along(a1) || r2.1 > dim_along(a2) || r1.0 >= r1.1 || r2.0 >= r2.1 {
            return Err(AfError::invalid_geometry(format!(
                "边界面范围非法: side {} r1 {:?} r2 {:?}",
                side, r1, r2
            )));
        }
        Ok(BoundarySurface {
            bc,
            tag: sc.tag,
            side,
            d3_face,
            r1,
            r2,
        })
    }

    /// 每个侧面必须被边界面精确覆盖
    pub fn validate_coverage(&self, dims: (usize, usize, usize)) -> AfResult<()> {
        for side in 1u8..=6 {
            let d3_axis = match side {
                1 | 2 => Axis::I,
                3 | 4 => Axis::J,
                _ => Axis::K,
            };
            let dim_along = |a: Axis| match a {
                Axis::I => dims.0,
                Axis::J => dims.1,
                Axis::K => dims.2,
            };
            let (a1, a2) = d3_axis.transverse();
            let expect = dim_along(a1) * dim_along(a2);
            let got: usize = self
                .surfaces
                .iter()
                .filter(|s| s.side == side)
                .map(|s| s.num_faces())
                .sum();
            if got != expect {
                return Err(AfError::invalid_geometry(format!(
                    "侧面 {} 覆盖不完整: {} / {}",
                    side, got, expect
                )));
            }
        }
        Ok(())
    }

    /// 面列表
    pub fn surfaces(&self) -> &[BoundarySurface] {
        &self.surfaces
    }

    /// 可写面列表（连接装配时原位改写 bc 类型）
    pub fn surfaces_mut(&mut self) -> &mut [BoundarySurface] {
        &mut self.surfaces
    }

    /// 侧面 `side` 上含面内坐标 (d1, d2) 的面
    pub fn surface_at(&self, side: u8, d1: usize, d2: usize) -> Option<&BoundarySurface> {
        self.surfaces
            .iter()
            .find(|s| s.side == side && s.contains(d1, d2))
    }

    /// 某侧面是否全部为连接
    pub fn side_is_connection(&self, side: u8) -> bool {
        let mut any = false;
        for s in self.surfaces.iter().filter(|s| s.side == side) {
            any = true;
            if !s.bc.is_connection() {
                return false;
            }
        }
        any
    }

    /// 侧面上任一面的 BC 类型集合（诊断输出用）
    pub fn bc_types(&self) -> Vec<BcType> {
        let mut types: Vec<BcType> = self.surfaces.iter().map(|s| s.bc).collect();
        types.dedup();
        types
    }

    /// 沿 `dir` 在单元索引 `ind` 处切分
    ///
    /// 返回 (下块边界, 上块边界)。切出的接缝两侧补 Interblock 面。
    pub fn split(&self, dir: Axis, ind: usize, dims: (usize, usize, usize)) -> (Self, Self) {
        let mut lower = Vec::new();
        let mut upper = Vec::new();
        let dim_along = |a: Axis| match a {
            Axis::I => dims.0,
            Axis::J => dims.1,
            Axis::K => dims.2,
        };
        for s in &self.surfaces {
            if s.direction3() == dir {
                // 切分轴两端的面原样归属低/高块；高块面索引平移
                if s.is_lower() {
                    lower.push(*s);
                } else {
                    let mut up = *s;
                    up.d3_face = dim_along(dir) - ind;
                    upper.push(up);
                }
            } else {
                // 横向面按切分位置裁剪；d1/d2 中与 dir 对应的范围调整
                let (a1, _a2) = s.directions12();
                let split_on_r1 = a1 == dir;
                let lo_r = if split_on_r1 { s.r1 } else { s.r2 };
                let clip = |r: (usize, usize)| -> (Option<(usize, usize)>, Option<(usize, usize)>) {
                    let lo = (r.0.min(ind), r.1.min(ind));
                    let hi = (r.0.max(ind) - ind, r.1.max(ind) - ind);
                    (
                        (lo.0 < lo.1).then_some(lo),
                        (hi.0 < hi.1).then_some(hi),
                    )
                };
                let (lo_part, hi_part) = clip(lo_r);
                if let Some(rr) = lo_part {
                    let mut sl = *s;
                    if split_on_r1 {
                        sl.r1 = rr;
                    } else {
                        sl.r2 = rr;
                    }
                    lower.push(sl);
                }
                if let Some(rr) = hi_part {
                    let mut su = *s;
                    if split_on_r1 {
                        su.r1 = rr;
                    } else {
                        su.r2 = rr;
                    }
                    upper.push(su);
                }
            }
        }
        // 接缝：低块的上侧面 + 高块的下侧面
        let (a1, a2) = dir.transverse();
        let r1 = (0, dim_along(a1));
        let r2 = (0, dim_along(a2));
        let (low_side, high_side) = match dir {
            Axis::I => (2u8, 1u8),
            Axis::J => (4, 3),
            Axis::K => (6, 5),
        };
        lower.push(BoundarySurface {
            bc: BcType::Interblock,
            tag: 0,
            side: low_side,
            d3_face: ind,
            r1,
            r2,
        });
        upper.push(BoundarySurface {
            bc: BcType::Interblock,
            tag: 0,
            side: high_side,
            d3_face: 0,
            r1,
            r2,
        });
        (Self::new(lower), Self::new(upper))
    }

    /// 沿 `dir` 拼接（接缝 Interblock 面成对消去，横向面合并）
    pub fn join(&self, other: &Self, dir: Axis, lower_dim: usize, upper_dim: usize) -> Self {
        let mut merged: Vec<BoundarySurface> = Vec::new();
        let seam = |s: &BoundarySurface, from_lower: bool| -> bool {
            s.direction3() == dir
                && s.bc == BcType::Interblock
                && ((from_lower && !s.is_lower()) || (!from_lower && s.is_lower()))
        };
        for s in &self.surfaces {
            if !seam(s, true) {
                merged.push(*s);
            }
        }
        for s in &other.surfaces {
            if seam(s, false) {
                continue;
            }
            let mut m = *s;
            if s.direction3() == dir {
                if !s.is_lower() {
                    m.d3_face = lower_dim + upper_dim;
                }
                merged.push(m);
            } else {
                let (a1, _) = s.directions12();
                if a1 == dir {
                    m.r1 = (s.r1.0 + lower_dim, s.r1.1 + lower_dim);
                } else {
                    m.r2 = (s.r2.0 + lower_dim, s.r2.1 + lower_dim);
                }
                merged.push(m);
            }
        }
        Self::new(Self::coalesce(merged))
    }

    /// 合并同侧、同类型、范围相接的面（拼接后消除切分痕迹）
    fn coalesce(mut surfs: Vec<BoundarySurface>) -> Vec<BoundarySurface> {
        loop {
            let mut merged_any = false;
            'outer: for a in 0..surfs.len() {
                for b in (a + 1)..surfs.len() {
                    let (x, y) = (surfs[a], surfs[b]);
                    if x.bc != y.bc || x.tag != y.tag || x.side != y.side || x.d3_face != y.d3_face
                    {
                        continue;
                    }
                    let joined = if x.r2 == y.r2 && x.r1.1 == y.r1.0 {
                        Some(((x.r1.0, y.r1.1), x.r2))
                    } else if x.r2 == y.r2 && y.r1.1 == x.r1.0 {
                        Some(((y.r1.0, x.r1.1), x.r2))
                    } else if x.r1 == y.r1 && x.r2.1 == y.r2.0 {
                        Some((x.r1, (x.r2.0, y.r2.1)))
                    } else if x.r1 == y.r1 && y.r2.1 == x.r2.0 {
                        Some((x.r1, (y.r2.0, x.r2.1)))
                    } else {
                        None
                    };
                    if let Some((r1, r2)) = joined {
                        surfs[a].r1 = r1;
                        surfs[a].r2 = r2;
                        surfs.remove(b);
                        merged_any = true;
                        break 'outer;
                    }
                }
            }
            if !merged_any {
                return surfs;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn whole_side(side: u8, bc: BcType, dims: (usize, usize, usize)) -> BoundarySurface {
        let d3_axis = match side {
            1 | 2 => Axis::I,
            3 | 4 => Axis::J,
            _ => Axis::K,
        };
        let dim = |a: Axis| match a {
            Axis::I => dims.0,
            Axis::J => dims.1,
            Axis::K => dims.2,
        };
        let (a1, a2) = d3_axis.transverse();
        BoundarySurface {
            bc,
            tag: 0,
            side,
            d3_face: if side % 2 == 1 { 0 } else { dim(d3_axis) },
            r1: (0, dim(a1)),
            r2: (0, dim(a2)),
        }
    }

    fn box_bc(dims: (usize, usize, usize)) -> BoundaryConditions {
        BoundaryConditions::new(
            (1..=6)
                .map(|s| whole_side(s, BcType::SlipWall, dims))
                .collect(),
        )
    }

    #[test]
    fn test_unknown_bc_name() {
        assert!(BcType::from_name("slipWall").is_ok());
        let err = BcType::from_name("bounceBack").unwrap_err();
        assert!(err.to_string().contains("bounceBack"));
    }

    #[test]
    fn test_coverage_validation() {
        let dims = (4, 3, 2);
        let bc = box_bc(dims);
        assert!(bc.validate_coverage(dims).is_ok());

        // 缺一个侧面
        let partial = BoundaryConditions::new(
            (1..=5)
                .map(|s| whole_side(s, BcType::SlipWall, dims))
                .collect(),
        );
        assert!(partial.validate_coverage(dims).is_err());
    }

    #[test]
    fn test_surface_lookup() {
        let dims = (4, 3, 2);
        let bc = box_bc(dims);
        // j 下侧面：d1 = k, d2 = i
        let s = bc.surface_at(3, 1, 2).unwrap();
        assert_eq!(s.side, 3);
        assert!(bc.surface_at(3, 5, 0).is_none());
    }

    #[test]
    fn test_split_adds_seam_interblock() {
        let dims = (4, 3, 2);
        let bc = box_bc(dims);
        let (lower, upper) = bc.split(Axis::I, 2, dims);
        assert!(lower
            .surfaces()
            .iter()
            .any(|s| s.side == 2 && s.bc == BcType::Interblock && s.d3_face == 2));
        assert!(upper
            .surfaces()
            .iter()
            .any(|s| s.side == 1 && s.bc == BcType::Interblock));
        // 横向面（j 侧）被裁剪：下块 i 范围 [0,2)
        let jl = lower
            .surfaces()
            .iter()
            .find(|s| s.side == 3 && s.bc == BcType::SlipWall)
            .unwrap();
        // j 侧 d1 = k, d2 = i
        assert_eq!(jl.r2, (0, 2));
        assert!(lower.validate_coverage((2, 3, 2)).is_ok());
        assert!(upper.validate_coverage((2, 3, 2)).is_ok());
    }

    #[test]
    fn test_split_join_round_trip() {
        let dims = (4, 3, 2);
        let bc = box_bc(dims);
        let (lower, upper) = bc.split(Axis::I, 1, dims);
        let joined = lower.join(&upper, Axis::I, 1, 3);
        assert_eq!(joined, bc);
    }

    #[test]
    fn test_interior_cell_on_high_side() {
        let dims = (4, 3, 2);
        let s = whole_side(2, BcType::PressureOutlet, dims);
        // i 上侧: d1 = j, d2 = k，内部单元 i = 3
        assert_eq!(s.interior_cell(1, 0), (3, 1, 0));
        assert_eq!(s.outward_sign(), 1.0);
    }
}
