// crates/af_physics/src/solver/multigrid.rs

//! 几何多重网格
//!
//! 粗化：每个方向隔一保留节点索引，落在任何边界面端点上的
//! 索引强制保留（粗层边界几何可表示）。细→粗单元映射、体积
//! 权重与细中心在粗单元内的三线性局部坐标在粗化时一并预计算。
//!
//! FAS 约定：限制把体积加权的细解与细残差带下去，强迫项
//! `Ax − b + R_f↓` 记入粗层；延拓把粗层解更新的增量三线性
//! 插值加回细层。

use std::collections::BTreeSet;

use af_config::Input;
use af_foundation::{AfError, AfResult};
use af_grid::{
    BlkMultiArray3d, BoundaryConditions, BoundarySurface, Comm, MultiArray3d, Plot3dBlock,
};
use glam::DVec3;

use super::level::{GridLevel, MgData};
use super::linear::LinearSolver;
use crate::models::PhysicsSet;

/// 单方向的保留索引表
fn kept_indices(n_cells: usize, boundary_marks: &BTreeSet<usize>) -> Vec<usize> {
    let mut kept: BTreeSet<usize> = (0..=n_cells).step_by(2).collect();
    kept.insert(n_cells);
    for &m in boundary_marks {
        kept.insert(m);
    }
    kept.into_iter().filter(|&i| i <= n_cells).collect()
}

/// 块三个方向的边界面端点标记
fn boundary_marks(bc: &BoundaryConditions) -> [BTreeSet<usize>; 3] {
    let mut marks = [BTreeSet::new(), BTreeSet::new(), BTreeSet::new()];
    for s in bc.surfaces() {
        let (a1, a2) = s.directions12();
        marks[a1.ord()].insert(s.r1.0);
        marks[a1.ord()].insert(s.r1.1);
        marks[a2.ord()].insert(s.r2.0);
        marks[a2.ord()].insert(s.r2.1);
        marks[s.direction3().ord()].insert(s.d3_face);
    }
    marks
}

/// 细索引 → 粗区间位置
fn coarse_cell_of(kept: &[usize], fine_cell: usize) -> usize {
    // kept 是节点索引；细单元 c ∈ [kept[p], kept[p+1]) → 粗单元 p
    match kept.binary_search(&fine_cell) {
        Ok(p) => p.min(kept.len().saturating_sub(2)),
        Err(p) => p - 1,
    }
}

/// 粗化一个块的几何与边界
fn coarsen_block(
    plot3d: &Plot3dBlock,
    bc: &BoundaryConditions,
) -> AfResult<(Plot3dBlock, BoundaryConditions, [Vec<usize>; 3])> {
    let dims = [
        plot3d.num_cells_i(),
        plot3d.num_cells_j(),
        plot3d.num_cells_k(),
    ];
    let marks = boundary_marks(bc);
    let kept = [
        kept_indices(dims[0], &marks[0]),
        kept_indices(dims[1], &marks[1]),
        kept_indices(dims[2], &marks[2]),
    ];

    // 粗节点
    let (cni, cnj, cnk) = (kept[0].len(), kept[1].len(), kept[2].len());
    let mut coords = MultiArray3d::new(cni, cnj, cnk, 0, DVec3::ZERO);
    for (kk, &fk) in kept[2].iter().enumerate() {
        for (jj, &fj) in kept[1].iter().enumerate() {
            for (ii, &fi) in kept[0].iter().enumerate() {
                *coords.get_mut(ii as isize, jj as isize, kk as isize) =
                    *plot3d.coords().get(fi as isize, fj as isize, fk as isize);
            }
        }
    }
    let coarse_plot3d = Plot3dBlock::new(coords);

    // 粗边界：范围端点都被保留，映射精确
    let map_idx = |axis: usize, fine: usize| -> usize {
        kept[axis]
            .binary_search(&fine)
            .expect("边界端点必在保留表中")
    };
    let surfaces: Vec<BoundarySurface> = bc
        .surfaces()
        .iter()
        .map(|s| {
            let (a1, a2) = s.directions12();
            BoundarySurface {
                bc: s.bc,
                tag: s.tag,
                side: s.side,
                d3_face: map_idx(s.direction3().ord(), s.d3_face),
                r1: (map_idx(a1.ord(), s.r1.0), map_idx(a1.ord(), s.r1.1)),
                r2: (map_idx(a2.ord(), s.r2.0), map_idx(a2.ord(), s.r2.1)),
            }
        })
        .collect();
    let coarse_bc = BoundaryConditions::new(surfaces);
    Ok((coarse_plot3d, coarse_bc, kept))
}

/// 三线性局部坐标：细中心在粗单元八节点内的 (ξ, η, ζ)
///
/// 牛顿迭代求逆三线性映射；光滑网格三步内收敛。
fn trilinear_local_coords(corners: &[DVec3; 8], point: DVec3) -> DVec3 {
    let value = |xi: DVec3| -> DVec3 {
        let (a, b, c) = (xi.x, xi.y, xi.z);
        let mut out = DVec3::ZERO;
        for (n, corner) in corners.iter().enumerate() {
            let wa = if n & 1 != 0 { a } else { 1.0 - a };
            let wb = if n & 2 != 0 { b } else { 1.0 - b };
            let wc = if n & 4 != 0 { c } else { 1.0 - c };
            out += *corner * (wa * wb * wc);
        }
        out
    };
    let mut xi = DVec3::splat(0.5);
    for _ in 0..5 {
        let f = value(xi) - point;
        if f.length() < 1.0e-13 {
            break;
        }
        // 数值 Jacobian
        let h = 1.0e-6;
        let jx = (value(xi + DVec3::X * h) - value(xi - DVec3::X * h)) / (2.0 * h);
        let jy = (value(xi + DVec3::Y * h) - value(xi - DVec3::Y * h)) / (2.0 * h);
        let jz = (value(xi + DVec3::Z * h) - value(xi - DVec3::Z * h)) / (2.0 * h);
        let jac = glam::DMat3::from_cols(jx, jy, jz);
        let det = jac.determinant();
        if det.abs() < 1.0e-30 {
            break;
        }
        xi -= jac.inverse() * f;
    }
    xi.clamp(DVec3::ZERO, DVec3::ONE)
}

/// 产出粗一层
pub fn coarsen(
    fine: &GridLevel,
    inp: &Input,
    physics: &PhysicsSet,
    comm: &dyn Comm,
) -> AfResult<GridLevel> {
    // 全局粗几何（各进程一致的确定性计算）
    let mut coarse_geom = Vec::with_capacity(fine.global_geom.len());
    let mut kept_all = Vec::with_capacity(fine.global_geom.len());
    for (plot3d, bc) in &fine.global_geom {
        let (cp, cb, kept) = coarsen_block(plot3d, bc)?;
        coarse_geom.push((cp, cb));
        kept_all.push(kept);
    }

    let mut coarse = GridLevel::build(
        coarse_geom,
        fine.decomp.clone(),
        inp,
        physics,
        comm,
    )?;

    // 本地块的映射、权重与延拓坐标
    let mut fine_to_coarse = Vec::new();
    let mut vol_weight = Vec::new();
    let mut prolong_xi = Vec::new();
    let mut forcing = Vec::new();
    for (lb, fblock) in fine.blocks.iter().enumerate() {
        let gb = fblock.id().parent;
        let kept = &kept_all[gb];
        let (ni, nj, nk) = fblock.dims();
        let mut map = MultiArray3d::new(ni, nj, nk, 0, (0isize, 0isize, 0isize));
        let mut weight = MultiArray3d::new(ni, nj, nk, 0, 0.0);
        let mut xi = MultiArray3d::new(ni, nj, nk, 0, DVec3::ZERO);

        // 粗单元体积和
        let cblock = &coarse.blocks[lb];
        let mut coarse_vol_sum =
            MultiArray3d::new(cblock.dims().0, cblock.dims().1, cblock.dims().2, 0, 0.0);
        for (i, j, k) in fblock.range_physical().iter() {
            let c = (
                coarse_cell_of(&kept[0], i as usize) as isize,
                coarse_cell_of(&kept[1], j as usize) as isize,
                coarse_cell_of(&kept[2], k as usize) as isize,
            );
            *map.get_mut(i, j, k) = c;
            *coarse_vol_sum.get_mut(c.0, c.1, c.2) += fblock.volume(i, j, k);
        }
        for (i, j, k) in fblock.range_physical().iter() {
            let c = *map.get(i, j, k);
            *weight.get_mut(i, j, k) =
                fblock.volume(i, j, k) / *coarse_vol_sum.get(c.0, c.1, c.2);
            // 粗单元八节点
            let (cp, _) = &coarse.global_geom[gb];
            let mut corners = [DVec3::ZERO; 8];
            for (n, corner) in corners.iter_mut().enumerate() {
                let di = (n & 1) as isize;
                let dj = ((n >> 1) & 1) as isize;
                let dk = ((n >> 2) & 1) as isize;
                *corner = *cp.coords().get(c.0 + di, c.1 + dj, c.2 + dk);
            }
            *xi.get_mut(i, j, k) =
                trilinear_local_coords(&corners, fblock.cell_center(i, j, k));
        }

        let (cni, cnj, cnk) = coarse.blocks[lb].dims();
        forcing.push(BlkMultiArray3d::new(
            cni,
            cnj,
            cnk,
            0,
            physics.layout.n_eqns(),
        ));
        fine_to_coarse.push(map);
        vol_weight.push(weight);
        prolong_xi.push(xi);
    }

    coarse.mg = Some(MgData {
        fine_to_coarse,
        vol_weight,
        prolong_xi,
        forcing,
    });
    tracing::info!(
        blocks = coarse.blocks.len(),
        cells = coarse
            .blocks
            .iter()
            .map(|b| b.range_physical().len())
            .sum::<usize>(),
        "粗层装配完成"
    );
    Ok(coarse)
}

/// 体积加权限制细解到粗层状态
pub fn restrict_states(fine: &GridLevel, coarse: &mut GridLevel) -> AfResult<()> {
    let mg = coarse
        .mg
        .as_ref()
        .ok_or_else(|| AfError::internal("粗层缺少多重网格元数据"))?;
    for (lb, fblock) in fine.blocks.iter().enumerate() {
        let map = &mg.fine_to_coarse[lb];
        let weight = &mg.vol_weight[lb];
        let cblock = &mut coarse.blocks[lb];
        let m = fblock.layout().n_eqns();
        // 清零后加权累加
        let range = cblock.range_physical();
        for (i, j, k) in range.iter() {
            cblock.state_mut().set_record(i, j, k, &vec![0.0; m]);
        }
        for (i, j, k) in fblock.range_physical().iter() {
            let c = *map.get(i, j, k);
            let w = *weight.get(i, j, k);
            let rec: Vec<f64> = fblock
                .state()
                .record(i, j, k)
                .iter()
                .map(|v| v * w)
                .collect();
            cblock.state_mut().add_to_record(c.0, c.1, c.2, &rec);
        }
    }
    Ok(())
}

/// 限制（FAS）：粗层状态、边界、残差、对角与强迫项
#[allow(clippy::too_many_arguments)]
pub fn restriction(
    fine: &mut GridLevel,
    coarse: &mut GridLevel,
    m_iter: usize,
    inp: &Input,
    physics: &PhysicsSet,
    comm: &dyn Comm,
) -> AfResult<()> {
    // 1. 体积加权限制解
    restrict_states(fine, coarse)?;
    for block in &mut coarse.blocks {
        block.update_derived(physics);
    }

    // 2. 首个多重网格扫掠保存时间层 n（粗层多层时间）
    if m_iter == 0 {
        coarse.save_time_n(physics);
    }

    // 3. 粗层边界、残差、时间步、对角
    coarse.get_boundary_conditions(inp, physics, comm)?;
    coarse.calc_residual(physics, inp, comm, true)?;
    coarse.calc_time_step(inp);
    coarse.invert_diagonal(inp)?;

    // 右端项先装配（此步清零粗层 du，为限制让位）
    coarse.initialize_matrix_update_without_forcing(inp, physics)?;

    // 4. 限制线性解更新
    {
        let mg = coarse.mg.as_ref().expect("粗层元数据已装配");
        fine.solver
            .restriction(coarse.solver.as_mut(), &mg.fine_to_coarse, &mg.vol_weight)?;
    }

    // 5. 强迫项 Ax − b + R_f↓
    let axmb = coarse.axmb(inp, physics);
    let mg = coarse.mg.as_mut().expect("粗层元数据已装配");
    for (lb, fblock) in fine.blocks.iter().enumerate() {
        let map = &mg.fine_to_coarse[lb];
        let f = &mut mg.forcing[lb];
        f.zero();
        // Ax − b
        for (i, j, k) in axmb[lb].range_physical().iter() {
            f.add_to_record(i, j, k, axmb[lb].record(i, j, k));
        }
        // + 限制的细残差（广延量直接求和）
        for (i, j, k) in fblock.range_physical().iter() {
            let c = *map.get(i, j, k);
            f.add_to_record(c.0, c.1, c.2, fblock.residual().record(i, j, k));
        }
    }
    Ok(())
}

impl GridLevel {
    /// 不带强迫项的右端装配（强迫项自身的 b 素材）
    pub(crate) fn initialize_matrix_update_without_forcing(
        &mut self,
        inp: &Input,
        physics: &PhysicsSet,
    ) -> AfResult<()> {
        self.solver
            .initialize_matrix_update(&self.blocks, inp, physics, None)
    }
}

/// 延拓：粗层解更新增量三线性插值加回细层
///
/// `coarse_du0` 是限制后、松弛前的粗层解更新（预折叠量），
/// 其贡献先从粗层更新中减除（FAS 约定）。
pub fn prolongation(
    coarse: &mut GridLevel,
    fine: &mut GridLevel,
    coarse_du0: &[BlkMultiArray3d],
) -> AfResult<()> {
    coarse.solver.subtract_from_update(coarse_du0)?;

    let mg = coarse
        .mg
        .as_ref()
        .ok_or_else(|| AfError::internal("粗层缺少多重网格元数据"))?;
    let m = fine
        .blocks
        .first()
        .map(|b| b.layout().n_eqns())
        .unwrap_or(0);
    let mut corrections = Vec::with_capacity(fine.blocks.len());
    for (lb, fblock) in fine.blocks.iter().enumerate() {
        let map = &mg.fine_to_coarse[lb];
        let xi = &mg.prolong_xi[lb];
        let cblock = &coarse.blocks[lb];
        let cdims = cblock.dims();
        let (ni, nj, nk) = fblock.dims();
        let mut corr = BlkMultiArray3d::new(ni, nj, nk, 0, m);
        for (i, j, k) in fblock.range_physical().iter() {
            let c = *map.get(i, j, k);
            let local = *xi.get(i, j, k);
            // 单元中心网格上的帽权插值：ξ < ½ 用低邻，> ½ 用高邻
            let mut val = vec![0.0; m];
            let axes = [
                (local.x, c.0, cdims.0 as isize),
                (local.y, c.1, cdims.1 as isize),
                (local.z, c.2, cdims.2 as isize),
            ];
            // 逐轴一维插值级联
            let mut stencil: Vec<(f64, (isize, isize, isize))> = vec![(1.0, c)];
            for (axis, &(t, base, n)) in axes.iter().enumerate() {
                let (nbr, w_nbr) = if t < 0.5 {
                    ((base - 1).max(0), 0.5 - t)
                } else {
                    ((base + 1).min(n - 1), t - 0.5)
                };
                let mut next = Vec::with_capacity(stencil.len() * 2);
                for &(w, cell) in &stencil {
                    let mut shifted = cell;
                    match axis {
                        0 => shifted.0 = nbr,
                        1 => shifted.1 = nbr,
                        _ => shifted.2 = nbr,
                    }
                    next.push((w * (1.0 - w_nbr), cell));
                    next.push((w * w_nbr, shifted));
                }
                stencil = next;
            }
            for (w, cell) in stencil {
                if w == 0.0 {
                    continue;
                }
                let du = coarse.solver.x(lb).record(cell.0, cell.1, cell.2);
                for (v, d) in val.iter_mut().zip(du) {
                    *v += w * d;
                }
            }
            corr.set_record(i, j, k, &val);
        }
        corrections.push(corr);
    }
    fine.solver.add_to_update(&corrections)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::level::tests::channel_level;
    use af_grid::SingleComm;

    #[test]
    fn test_kept_indices_every_other_plus_boundary() {
        let marks: BTreeSet<usize> = [3].into_iter().collect();
        let kept = kept_indices(8, &marks);
        assert_eq!(kept, vec![0, 2, 3, 4, 6, 8]);
    }

    #[test]
    fn test_coarse_cell_lookup() {
        let kept = vec![0, 2, 4, 6, 8];
        assert_eq!(coarse_cell_of(&kept, 0), 0);
        assert_eq!(coarse_cell_of(&kept, 1), 0);
        assert_eq!(coarse_cell_of(&kept, 2), 1);
        assert_eq!(coarse_cell_of(&kept, 7), 3);
    }

    #[test]
    fn test_trilinear_unit_cube() {
        let corners = [
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(0.0, 1.0, 0.0),
            DVec3::new(1.0, 1.0, 0.0),
            DVec3::new(0.0, 0.0, 1.0),
            DVec3::new(1.0, 0.0, 1.0),
            DVec3::new(0.0, 1.0, 1.0),
            DVec3::new(1.0, 1.0, 1.0),
        ];
        let xi = trilinear_local_coords(&corners, DVec3::new(0.25, 0.75, 0.5));
        assert!((xi - DVec3::new(0.25, 0.75, 0.5)).length() < 1e-9);
    }

    #[test]
    fn test_coarsen_halves_dimensions() {
        let (fine, inp, phys) = channel_level();
        let comm = SingleComm::new();
        let coarse = coarsen(&fine, &inp, &phys, &comm).unwrap();
        // 8×4×2 → 4×2×1
        assert_eq!(coarse.blocks[0].dims(), (4, 2, 1));
        // 周期连接在粗层保持
        assert_eq!(coarse.connections.len(), 1);
    }

    #[test]
    fn test_restrict_states_volume_weighted_average() {
        // 性质 8 的核心：限制-延拓的偏差是体积加权平均的偏差
        let (mut fine, inp, phys) = channel_level();
        let comm = SingleComm::new();
        let mut coarse = coarsen(&fine, &inp, &phys, &comm).unwrap();
        // 细层给 i 线性的密度场
        for (i, j, k) in fine.blocks[0].range_physical().iter() {
            let mut w = fine.blocks[0].primitive(i, j, k);
            w.set_rho(1.0 + 0.1 * i as f64);
            fine.blocks[0].set_primitive(i, j, k, &w);
        }
        restrict_states(&fine, &mut coarse).unwrap();
        // 均匀网格：粗单元 0 覆盖细单元 i ∈ {0,1} × j ∈ {0,1} × k ∈ {0,1}
        let w_c = coarse.blocks[0].primitive(0, 0, 0);
        assert!((w_c.rho() - (1.0 + 0.05)).abs() < 1e-12);
    }

    #[test]
    fn test_mg_forcing_zero_when_coarse_consistent() {
        // 解处处均匀时：限制后粗残差 ≈ 0，细残差 ≈ 0，
        // du = 0 → 强迫项 = −b_coarse ≈ 0
        let (mut fine, inp, phys) = channel_level();
        let comm = SingleComm::new();
        let mut coarse = coarsen(&fine, &inp, &phys, &comm).unwrap();
        let mut inp_impl = inp.clone();
        inp_impl.time.integration = af_config::TimeIntegration::ImplicitEuler;
        fine.save_time_n(&phys);
        fine.get_boundary_conditions(&inp_impl, &phys, &comm).unwrap();
        fine.calc_residual(&phys, &inp_impl, &comm, true).unwrap();
        fine.calc_time_step(&inp_impl);
        restriction(&mut fine, &mut coarse, 0, &inp_impl, &phys, &comm).unwrap();
        let mg = coarse.mg.as_ref().unwrap();
        for (i, j, k) in mg.forcing[0].range_physical().iter() {
            for &f in mg.forcing[0].record(i, j, k) {
                assert!(f.abs() < 1e-8, "强迫项 {:e}", f);
            }
        }
    }
}
