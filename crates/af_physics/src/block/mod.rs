// crates/af_physics/src/block/mod.rs

//! procBlock —— 单块上的全部数据
//!
//! 几何（含幽灵）、原始状态（含幽灵）、派生标量、逐单元梯度、
//! 残差/谱半径/时间步累加器、边界元数据与壁面数据。
//! 所有数组共享同一幽灵层数 G（由输入的重构格式决定）。
//!
//! 子模块：
//! - [`init`]: 状态初始化（均匀场 / 点云最近邻）
//! - [`residual`]: 无黏/黏性残差装配与源项
//! - [`update`]: 显式/隐式状态推进与时间步
//! - [`implicit`]: 隐式非对角作用与时间项

pub mod implicit;
pub mod init;
pub mod residual;
pub mod update;

use af_config::Input;
use af_foundation::AfResult;
use af_grid::{
    Axis, BlkMultiArray3d, BoundaryConditions, FaceArea, MultiArray3d, Plot3dBlock, Range3,
};
use glam::{DMat3, DVec3};

use crate::ghost::wall::WallData;
use crate::models::PhysicsSet;
use crate::spec_rad::SpecRad;
use crate::vars::{Primitive, VarLayout};

/// 块身份：父块号、全局位置、进程与进程内局部位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockId {
    /// 父块全局编号
    pub parent: usize,
    /// 全局位置（输出重组时的排序键）
    pub global_pos: usize,
    /// 所属进程
    pub rank: usize,
    /// 进程内局部位置
    pub local_pos: usize,
}

/// 单块数据
pub struct ProcBlock {
    // ---- 身份与尺寸 ----
    pub(crate) id: BlockId,
    pub(crate) ni: usize,
    pub(crate) nj: usize,
    pub(crate) nk: usize,
    pub(crate) g: usize,
    pub(crate) layout: VarLayout,
    pub(crate) is_viscous: bool,
    pub(crate) is_rans: bool,
    pub(crate) reacting: bool,

    // ---- 几何（幽灵层 G）----
    pub(crate) vol: MultiArray3d<f64>,
    pub(crate) center: MultiArray3d<DVec3>,
    /// i/j/k 族面积向量（各自法向维度多一）
    pub(crate) farea: [MultiArray3d<FaceArea>; 3],
    pub(crate) fcenter: [MultiArray3d<DVec3>; 3],
    pub(crate) cell_width: [MultiArray3d<f64>; 3],

    // ---- 状态 ----
    pub(crate) state: BlkMultiArray3d,
    pub(crate) consvars_n: Option<BlkMultiArray3d>,
    pub(crate) consvars_nm1: Option<BlkMultiArray3d>,

    // ---- 派生标量（幽灵层 G）----
    pub(crate) temperature: MultiArray3d<f64>,
    pub(crate) viscosity: MultiArray3d<f64>,
    pub(crate) eddy_visc: MultiArray3d<f64>,
    pub(crate) f1: MultiArray3d<f64>,
    pub(crate) f2: MultiArray3d<f64>,
    pub(crate) wall_dist: MultiArray3d<f64>,

    // ---- 梯度（幽灵层 G，交换后跨块一致）----
    pub(crate) vel_grad: MultiArray3d<DMat3>,
    pub(crate) temp_grad: MultiArray3d<DVec3>,
    pub(crate) dens_grad: MultiArray3d<DVec3>,
    pub(crate) press_grad: MultiArray3d<DVec3>,
    pub(crate) tke_grad: MultiArray3d<DVec3>,
    pub(crate) sdr_grad: MultiArray3d<DVec3>,
    pub(crate) mf_grad: Vec<MultiArray3d<DVec3>>,

    // ---- 累加器（无幽灵）----
    pub(crate) residual: BlkMultiArray3d,
    pub(crate) spec_radius: MultiArray3d<SpecRad>,
    pub(crate) visc_radius: MultiArray3d<f64>,
    pub(crate) dt: MultiArray3d<f64>,

    // ---- 边界 ----
    pub(crate) bc: BoundaryConditions,
    pub(crate) wall_data: Vec<WallData>,
}

impl ProcBlock {
    /// 由 plot3d 块、边界与身份构造
    pub fn from_geometry(
        plot3d: &Plot3dBlock,
        bc: BoundaryConditions,
        id: BlockId,
        inp: &Input,
        physics: &PhysicsSet,
    ) -> AfResult<Self> {
        let (ni, nj, nk) = (
            plot3d.num_cells_i(),
            plot3d.num_cells_j(),
            plot3d.num_cells_k(),
        );
        let g = inp.ghost_layers();
        let layout = physics.layout;
        let m = layout.n_eqns();
        let ns = layout.n_species();

        // 内部几何装入带幽灵数组
        let vol_in = plot3d.volume()?;
        let cen_in = plot3d.centroid();
        let fa = [
            plot3d.face_area_i(),
            plot3d.face_area_j(),
            plot3d.face_area_k(),
        ];
        let fc = [
            plot3d.face_center_i(),
            plot3d.face_center_j(),
            plot3d.face_center_k(),
        ];

        let mut vol = MultiArray3d::new(ni, nj, nk, g, 0.0);
        let mut center = MultiArray3d::new(ni, nj, nk, g, DVec3::ZERO);
        vol.insert(vol_in.range_physical(), &vol_in)?;
        center.insert(cen_in.range_physical(), &cen_in)?;

        let mut farea = [
            MultiArray3d::new(ni + 1, nj, nk, g, FaceArea::ZERO),
            MultiArray3d::new(ni, nj + 1, nk, g, FaceArea::ZERO),
            MultiArray3d::new(ni, nj, nk + 1, g, FaceArea::ZERO),
        ];
        let mut fcenter = [
            MultiArray3d::new(ni + 1, nj, nk, g, DVec3::ZERO),
            MultiArray3d::new(ni, nj + 1, nk, g, DVec3::ZERO),
            MultiArray3d::new(ni, nj, nk + 1, g, DVec3::ZERO),
        ];
        for d in 0..3 {
            farea[d].insert(fa[d].range_physical(), &fa[d])?;
            fcenter[d].insert(fc[d].range_physical(), &fc[d])?;
        }

        // 单元宽度：对向面心距离
        let mut cell_width = [
            MultiArray3d::new(ni, nj, nk, g, 0.0),
            MultiArray3d::new(ni, nj, nk, g, 0.0),
            MultiArray3d::new(ni, nj, nk, g, 0.0),
        ];
        for (i, j, k) in vol.range_physical().iter() {
            *cell_width[0].get_mut(i, j, k) =
                (*fcenter[0].get(i + 1, j, k) - *fcenter[0].get(i, j, k)).length();
            *cell_width[1].get_mut(i, j, k) =
                (*fcenter[1].get(i, j + 1, k) - *fcenter[1].get(i, j, k)).length();
            *cell_width[2].get_mut(i, j, k) =
                (*fcenter[2].get(i, j, k + 1) - *fcenter[2].get(i, j, k)).length();
        }

        let wall_data = bc
            .surfaces()
            .iter()
            .filter(|s| s.bc.is_wall())
            .map(|s| WallData::new(*s, ns))
            .collect();

        let needs_nm1 = inp.time.integration.needs_nm1();
        let needs_n = inp.time.integration.is_implicit()
            || matches!(inp.time.integration, af_config::TimeIntegration::Rk4)
            || needs_nm1;

        let mut block = Self {
            id,
            ni,
            nj,
            nk,
            g,
            layout,
            is_viscous: inp.is_viscous(),
            is_rans: inp.is_rans(),
            // 以化学模型为准，而非配置开关
            reacting: physics.chemistry.is_reacting(),
            vol,
            center,
            farea,
            fcenter,
            cell_width,
            state: BlkMultiArray3d::new(ni, nj, nk, g, m),
            consvars_n: needs_n.then(|| BlkMultiArray3d::new(ni, nj, nk, 0, m)),
            consvars_nm1: needs_nm1.then(|| BlkMultiArray3d::new(ni, nj, nk, 0, m)),
            temperature: MultiArray3d::new(ni, nj, nk, g, 1.0),
            viscosity: MultiArray3d::new(ni, nj, nk, g, 0.0),
            eddy_visc: MultiArray3d::new(ni, nj, nk, g, 0.0),
            f1: MultiArray3d::new(ni, nj, nk, g, 0.0),
            f2: MultiArray3d::new(ni, nj, nk, g, 0.0),
            wall_dist: MultiArray3d::new(ni, nj, nk, g, 1.0e30),
            vel_grad: MultiArray3d::new(ni, nj, nk, g, DMat3::ZERO),
            temp_grad: MultiArray3d::new(ni, nj, nk, g, DVec3::ZERO),
            dens_grad: MultiArray3d::new(ni, nj, nk, g, DVec3::ZERO),
            press_grad: MultiArray3d::new(ni, nj, nk, g, DVec3::ZERO),
            tke_grad: MultiArray3d::new(ni, nj, nk, g, DVec3::ZERO),
            sdr_grad: MultiArray3d::new(ni, nj, nk, g, DVec3::ZERO),
            mf_grad: vec![MultiArray3d::new(ni, nj, nk, g, DVec3::ZERO); ns],
            residual: BlkMultiArray3d::new(ni, nj, nk, 0, m),
            spec_radius: MultiArray3d::new(ni, nj, nk, 0, SpecRad::ZERO),
            visc_radius: MultiArray3d::new(ni, nj, nk, 0, 0.0),
            dt: MultiArray3d::new(ni, nj, nk, 0, 0.0),
            bc,
            wall_data,
        };
        block.assign_geom_ghosts();
        Ok(block)
    }

    // ---- 尺寸与身份 ----

    /// 身份
    pub fn id(&self) -> BlockId {
        self.id
    }

    /// 物理单元数 (ni, nj, nk)
    pub fn dims(&self) -> (usize, usize, usize) {
        (self.ni, self.nj, self.nk)
    }

    /// 按轴取单元数
    pub fn num_along(&self, axis: Axis) -> usize {
        match axis {
            Axis::I => self.ni,
            Axis::J => self.nj,
            Axis::K => self.nk,
        }
    }

    /// 幽灵层数
    pub fn ghosts(&self) -> usize {
        self.g
    }

    /// 记录布局
    pub fn layout(&self) -> VarLayout {
        self.layout
    }

    /// 物理域范围
    pub fn range_physical(&self) -> Range3 {
        self.vol.range_physical()
    }

    /// 边界条件
    pub fn bc(&self) -> &BoundaryConditions {
        &self.bc
    }

    /// 壁面数据
    pub fn wall_data(&self) -> &[WallData] {
        &self.wall_data
    }

    // ---- 状态访问 ----

    /// 单元原始状态（拥有拷贝）
    pub fn primitive(&self, i: isize, j: isize, k: isize) -> Primitive {
        Primitive::from_slice(self.layout, self.state.record(i, j, k))
    }

    /// 写入单元原始状态
    pub fn set_primitive(&mut self, i: isize, j: isize, k: isize, w: &Primitive) {
        self.state.set_record(i, j, k, w.data());
    }

    /// 状态数组
    pub fn state(&self) -> &BlkMultiArray3d {
        &self.state
    }

    /// 可写状态数组（交换层）
    pub fn state_mut(&mut self) -> &mut BlkMultiArray3d {
        &mut self.state
    }

    /// 残差数组
    pub fn residual(&self) -> &BlkMultiArray3d {
        &self.residual
    }

    /// 谱半径
    pub fn spec_radius(&self, i: isize, j: isize, k: isize) -> SpecRad {
        *self.spec_radius.get(i, j, k)
    }

    /// 单元体积
    pub fn volume(&self, i: isize, j: isize, k: isize) -> f64 {
        *self.vol.get(i, j, k)
    }

    /// 单元时间步
    pub fn time_step(&self, i: isize, j: isize, k: isize) -> f64 {
        *self.dt.get(i, j, k)
    }

    /// 面积向量（d 族，面索引）
    pub fn face_area(&self, d: Axis, i: isize, j: isize, k: isize) -> FaceArea {
        *self.farea[d.ord()].get(i, j, k)
    }

    /// 面心
    pub fn face_center(&self, d: Axis, i: isize, j: isize, k: isize) -> DVec3 {
        *self.fcenter[d.ord()].get(i, j, k)
    }

    /// 单元中心
    pub fn cell_center(&self, i: isize, j: isize, k: isize) -> DVec3 {
        *self.center.get(i, j, k)
    }

    /// 壁面距离
    pub fn wall_distance(&self, i: isize, j: isize, k: isize) -> f64 {
        *self.wall_dist.get(i, j, k)
    }

    /// 置壁面距离（k-d 树协作者回填）
    pub fn set_wall_distance(&mut self, i: isize, j: isize, k: isize, d: f64) {
        *self.wall_dist.get_mut(i, j, k) = d;
    }

    /// 速度梯度
    pub fn velocity_gradient(&self, i: isize, j: isize, k: isize) -> DMat3 {
        *self.vel_grad.get(i, j, k)
    }

    /// 涡黏
    pub fn eddy_viscosity(&self, i: isize, j: isize, k: isize) -> f64 {
        *self.eddy_visc.get(i, j, k)
    }

    /// 层流黏性
    pub fn laminar_viscosity(&self, i: isize, j: isize, k: isize) -> f64 {
        *self.viscosity.get(i, j, k)
    }

    // ---- 幽灵几何 ----

    /// 非连接边界的几何幽灵赋值
    ///
    /// 第 ℓ 层幽灵复制镜像内部单元的体积与面宽；中心沿外法向
    /// 平移（首层用内部单元宽度，深层用前一层幽灵宽度）；
    /// 最后做棱幽灵延拓（层数相等取对称平均，否则深侧优先）。
    pub fn assign_geom_ghosts(&mut self) {
        let sides: Vec<u8> = (1..=6).collect();
        for side in sides {
            if self.bc.side_is_connection(side) {
                continue;
            }
            self.assign_side_geom_ghosts(side);
        }
        self.assign_edge_geom_ghosts();
    }

    fn side_axes(side: u8) -> (Axis, Axis, Axis) {
        let d3 = match side {
            1 | 2 => Axis::I,
            3 | 4 => Axis::J,
            _ => Axis::K,
        };
        let (d1, d2) = d3.transverse();
        (d1, d2, d3)
    }

    fn assemble_idx(d1a: Axis, d2a: Axis, d3a: Axis, d1: isize, d2: isize, d3: isize) -> (isize, isize, isize) {
        let mut out = [0isize; 3];
        out[d1a.ord()] = d1;
        out[d2a.ord()] = d2;
        out[d3a.ord()] = d3;
        (out[0], out[1], out[2])
    }

    fn assign_side_geom_ghosts(&mut self, side: u8) {
        let (d1a, d2a, d3a) = Self::side_axes(side);
        let lower = side % 2 == 1;
        let n3 = self.num_along(d3a) as isize;
        let n1 = self.num_along(d1a) as isize;
        let n2 = self.num_along(d2a) as isize;
        let g = self.g as isize;

        for l in 1..=g {
            for d2 in 0..n2 {
                for d1 in 0..n1 {
                    let d3_ghost = if lower { -l } else { n3 + l - 1 };
                    let d3_mirror = if lower { l - 1 } else { n3 - l };
                    let d3_prev = if lower { d3_ghost + 1 } else { d3_ghost - 1 };
                    let gi = Self::assemble_idx(d1a, d2a, d3a, d1, d2, d3_ghost);
                    let mi = Self::assemble_idx(d1a, d2a, d3a, d1, d2, d3_mirror);
                    let pi = Self::assemble_idx(d1a, d2a, d3a, d1, d2, d3_prev);

                    // 体积与宽度镜像
                    *self.vol.get_mut(gi.0, gi.1, gi.2) = *self.vol.get(mi.0, mi.1, mi.2);
                    for d in 0..3 {
                        let w = *self.cell_width[d].get(mi.0, mi.1, mi.2);
                        *self.cell_width[d].get_mut(gi.0, gi.1, gi.2) = w;
                    }

                    // 边界面外法向
                    let bface = if lower { 0 } else { n3 };
                    let bf = Self::assemble_idx(d1a, d2a, d3a, d1, d2, bface);
                    let unit = self.farea[d3a.ord()].get(bf.0, bf.1, bf.2).unit;
                    let outward = if lower { -unit } else { unit };

                    // 中心平移：前一单元中心 + 宽度·外法向
                    let w3 = *self.cell_width[d3a.ord()].get(pi.0, pi.1, pi.2);
                    let prev_center = *self.center.get(pi.0, pi.1, pi.2);
                    let new_center = prev_center + outward * w3;
                    *self.center.get_mut(gi.0, gi.1, gi.2) = new_center;
                    let shift = new_center - *self.center.get(mi.0, mi.1, mi.2);

                    // d3 族面：幽灵外侧面镜像面积、面心外推
                    let (gface, mface, pface) = if lower {
                        (-l, l, -l + 1)
                    } else {
                        (n3 + l, n3 - l, n3 + l - 1)
                    };
                    let gf = Self::assemble_idx(d1a, d2a, d3a, d1, d2, gface);
                    let mf = Self::assemble_idx(d1a, d2a, d3a, d1, d2, mface);
                    let pf = Self::assemble_idx(d1a, d2a, d3a, d1, d2, pface);
                    let area = *self.farea[d3a.ord()].get(mf.0, mf.1, mf.2);
                    *self.farea[d3a.ord()].get_mut(gf.0, gf.1, gf.2) = area;
                    let prev_fc = *self.fcenter[d3a.ord()].get(pf.0, pf.1, pf.2);
                    *self.fcenter[d3a.ord()].get_mut(gf.0, gf.1, gf.2) = prev_fc + outward * w3;

                    // 横向族面：镜像面积，面心随单元中心平移
                    for ta in [d1a, d2a] {
                        let t = ta.ord();
                        for up in 0..2isize {
                            let mut gidx = [gi.0, gi.1, gi.2];
                            let mut midx = [mi.0, mi.1, mi.2];
                            gidx[t] += up;
                            midx[t] += up;
                            let a = *self.farea[t].get(midx[0], midx[1], midx[2]);
                            *self.farea[t].get_mut(gidx[0], gidx[1], gidx[2]) = a;
                            let c = *self.fcenter[t].get(midx[0], midx[1], midx[2]);
                            *self.fcenter[t].get_mut(gidx[0], gidx[1], gidx[2]) = c + shift;
                        }
                    }
                }
            }
        }
    }

    /// 棱幽灵几何：深侧优先，层数相等取平均
    fn assign_edge_geom_ghosts(&mut self) {
        let g = self.g as isize;
        let dims = [self.ni as isize, self.nj as isize, self.nk as isize];
        // 12 条棱 = 3 个轴对中的每一对两侧组合
        for (a, b) in [(0usize, 1usize), (0, 2), (1, 2)] {
            let c = 3 - a - b;
            for la in 1..=g {
                for lb in 1..=g {
                    for sa in 0..2 {
                        for sb in 0..2 {
                            for m in 0..dims[c] {
                                let ia = if sa == 0 { -la } else { dims[a] + la - 1 };
                                let ib = if sb == 0 { -lb } else { dims[b] + lb - 1 };
                                // 深侧保持幽灵索引，浅侧回拉到边界单元
                                let clamp_a = if sa == 0 { 0 } else { dims[a] - 1 };
                                let clamp_b = if sb == 0 { 0 } else { dims[b] - 1 };
                                let mut edge = [0isize; 3];
                                edge[a] = ia;
                                edge[b] = ib;
                                edge[c] = m;
                                let mut src_a = edge;
                                src_a[b] = clamp_b; // a 侧的常规幽灵
                                let mut src_b = edge;
                                src_b[a] = clamp_a; // b 侧的常规幽灵

                                let (vol_v, cen_v, w) = if la > lb {
                                    self.edge_geom_from(src_a)
                                } else if lb > la {
                                    self.edge_geom_from(src_b)
                                } else {
                                    let (v1, c1, w1) = self.edge_geom_from(src_a);
                                    let (v2, c2, w2) = self.edge_geom_from(src_b);
                                    (
                                        0.5 * (v1 + v2),
                                        0.5 * (c1 + c2),
                                        [
                                            0.5 * (w1[0] + w2[0]),
                                            0.5 * (w1[1] + w2[1]),
                                            0.5 * (w1[2] + w2[2]),
                                        ],
                                    )
                                };
                                *self.vol.get_mut(edge[0], edge[1], edge[2]) = vol_v;
                                *self.center.get_mut(edge[0], edge[1], edge[2]) = cen_v;
                                for d in 0..3 {
                                    *self.cell_width[d].get_mut(edge[0], edge[1], edge[2]) = w[d];
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    fn edge_geom_from(&self, src: [isize; 3]) -> (f64, DVec3, [f64; 3]) {
        (
            *self.vol.get(src[0], src[1], src[2]),
            *self.center.get(src[0], src[1], src[2]),
            [
                *self.cell_width[0].get(src[0], src[1], src[2]),
                *self.cell_width[1].get(src[0], src[1], src[2]),
                *self.cell_width[2].get(src[0], src[1], src[2]),
            ],
        )
    }

    /// 更新派生标量（温度、黏性、未限制涡黏）——含幽灵域
    pub fn update_derived(&mut self, physics: &PhysicsSet) {
        for (i, j, k) in self.state.range_all().iter() {
            let w = Primitive::from_slice(self.layout, self.state.record(i, j, k));
            if w.rho() <= 0.0 || w.p() <= 0.0 {
                // 未初始化的角幽灵跳过
                continue;
            }
            let t = physics.temperature(&w);
            *self.temperature.get_mut(i, j, k) = t;
            if self.is_viscous {
                *self.viscosity.get_mut(i, j, k) =
                    physics.transport.viscosity(t, &w.mass_fractions());
            }
            if self.is_rans {
                *self.eddy_visc.get_mut(i, j, k) =
                    physics.turbulence.eddy_viscosity_unlimited(&w);
            }
        }
    }
}
