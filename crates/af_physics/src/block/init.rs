// crates/af_physics/src/block/init.rs

//! 状态初始化
//!
//! 两种路径：
//! - 均匀无量纲原始场（含全部幽灵单元，保证首步边界赋值前状态物理）
//! - 点云最近邻：R* 树（`rstar`）作最近邻协作者，同时播种
//!   温度、黏性与未限制涡黏
//!
//! 壁面距离同样经 R* 树查询：全场黏性壁面心建树，逐单元取最近。

use std::io::BufRead;
use std::path::Path;

use af_config::{InitialCondition, Input};
use af_foundation::{AfError, AfResult};
use rstar::{PointDistance, RTree};

use super::ProcBlock;
use crate::models::PhysicsSet;

/// 点云条目：位置 + 无量纲原始记录
#[derive(Debug, Clone)]
pub struct CloudPoint {
    /// 位置（无量纲坐标）
    pub position: [f64; 3],
    /// 原始记录
    pub record: Vec<f64>,
}

impl rstar::RTreeObject for CloudPoint {
    type Envelope = rstar::AABB<[f64; 3]>;

    fn envelope(&self) -> Self::Envelope {
        rstar::AABB::from_point(self.position)
    }
}

impl PointDistance for CloudPoint {
    fn distance_2(&self, point: &[f64; 3]) -> f64 {
        self.position
            .iter()
            .zip(point)
            .map(|(a, b)| (a - b) * (a - b))
            .sum()
    }
}

/// 读取点云文件
///
/// 文本格式：首行点数，其后每行
/// `x y z density vel_x vel_y vel_z pressure [tke sdr] [mf…]`（量纲量）。
pub fn read_cloud(path: &Path, inp: &Input, physics: &PhysicsSet) -> AfResult<RTree<CloudPoint>> {
    let file = std::fs::File::open(path)
        .map_err(|e| AfError::io_with_source(format!("点云文件 {}", path.display()), e))?;
    let reader = std::io::BufReader::new(file);
    let mut lines = reader.lines();
    let count: usize = lines
        .next()
        .ok_or_else(|| AfError::io("点云文件为空"))??
        .trim()
        .parse()
        .map_err(|_| AfError::io("点云首行应为点数"))?;

    let n_turb = physics.layout.n_turb();
    let ns = physics.layout.n_species();
    let mut points = Vec::with_capacity(count);
    for line in lines.take(count) {
        let line = line?;
        let vals: Vec<f64> = line
            .split_whitespace()
            .map(|t| t.parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|_| AfError::io("点云行解析失败"))?;
        let expect = 8 + if n_turb > 0 { 2 } else { 0 } + if ns > 1 { ns } else { 0 };
        AfError::check_size("cloud.row", expect, vals.len())?;

        let (tke, sdr, mf_start) = if n_turb > 0 {
            (vals[8], vals[9], 10)
        } else {
            (0.0, 0.0, 8)
        };
        let mf: Vec<f64> = if ns > 1 {
            vals[mf_start..mf_start + ns].to_vec()
        } else {
            vec![1.0]
        };
        let w = physics.nondimensionalize(
            inp,
            vals[3],
            [vals[4], vals[5], vals[6]],
            vals[7],
            tke,
            sdr,
            &mf,
        );
        let l_ref = inp.reference.length;
        points.push(CloudPoint {
            position: [vals[0] / l_ref, vals[1] / l_ref, vals[2] / l_ref],
            record: w.data().to_vec(),
        });
    }
    if points.is_empty() {
        return Err(AfError::io("点云没有数据点"));
    }
    Ok(RTree::bulk_load(points))
}

/// 壁面点（壁距查询）
#[derive(Debug, Clone, PartialEq)]
pub struct WallPoint(pub [f64; 3]);

impl rstar::RTreeObject for WallPoint {
    type Envelope = rstar::AABB<[f64; 3]>;

    fn envelope(&self) -> Self::Envelope {
        rstar::AABB::from_point(self.0)
    }
}

impl PointDistance for WallPoint {
    fn distance_2(&self, point: &[f64; 3]) -> f64 {
        self.0
            .iter()
            .zip(point)
            .map(|(a, b)| (a - b) * (a - b))
            .sum()
    }
}

impl ProcBlock {
    /// 初始化状态
    pub fn initialize_states(&mut self, inp: &Input, physics: &PhysicsSet) -> AfResult<()> {
        match &inp.initial {
            InitialCondition::Uniform {
                density,
                velocity,
                pressure,
                tke,
                sdr,
                mass_fractions,
            } => {
                let w = physics.nondimensionalize(
                    inp,
                    *density,
                    *velocity,
                    *pressure,
                    *tke,
                    *sdr,
                    mass_fractions,
                );
                let range = self.state.range_all();
                for (i, j, k) in range.iter() {
                    self.state.set_record(i, j, k, w.data());
                }
            }
            InitialCondition::PointCloud { file } => {
                let tree = read_cloud(file, inp, physics)?;
                let range = self.state.range_all();
                for (i, j, k) in range.iter() {
                    let c = self.cell_center(i, j, k);
                    let nearest = tree
                        .nearest_neighbor(&[c.x, c.y, c.z])
                        .ok_or_else(|| AfError::internal("点云树为空"))?;
                    self.state.set_record(i, j, k, &nearest.record);
                }
            }
        }
        self.update_derived(physics);
        Ok(())
    }

    /// 收集本块的黏性壁面心（建壁距树的素材）
    pub fn wall_face_centers(&self) -> Vec<WallPoint> {
        let mut out = Vec::new();
        for s in self.bc.surfaces() {
            if s.bc != af_grid::BcType::ViscousWall {
                continue;
            }
            let d3 = s.direction3();
            for d2 in s.r2.0..s.r2.1 {
                for d1 in s.r1.0..s.r1.1 {
                    let fi = s.assemble(d1 as isize, d2 as isize, s.d3_face as isize);
                    let c = self.face_center(d3, fi.0, fi.1, fi.2);
                    out.push(WallPoint([c.x, c.y, c.z]));
                }
            }
        }
        out
    }

    /// 用壁面树回填全部单元（含幽灵）的壁面距离
    pub fn fill_wall_distance(&mut self, tree: &RTree<WallPoint>) {
        let range = self.state.range_all();
        for (i, j, k) in range.iter() {
            let c = self.cell_center(i, j, k);
            if let Some(p) = tree.nearest_neighbor(&[c.x, c.y, c.z]) {
                let d2 = p.distance_2(&[c.x, c.y, c.z]);
                self.set_wall_distance(i, j, k, d2.sqrt());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::tests::build_block_with;
    use af_config::EquationSet;
    use glam::DVec3;

    #[test]
    fn test_uniform_initialization_fills_ghosts() {
        let (mut b, inp, phys) = build_block_with((4, 2, 2), EquationSet::Euler);
        b.initialize_states(&inp, &phys).unwrap();
        let w = b.primitive(-2, 0, 0);
        assert!((w.rho() - 1.0).abs() < 1e-12);
        let w_in = b.primitive(2, 1, 1);
        assert!(w_in.is_physical());
        // 派生温度已更新
        assert!((*b.temperature.get(1, 1, 1) - phys.temperature(&w_in)).abs() < 1e-12);
    }

    #[test]
    fn test_wall_distance_from_tree() {
        let (mut b, _inp, _phys) = build_block_with((4, 4, 1), EquationSet::NavierStokes);
        // 人工壁面：y = 0 平面
        let pts: Vec<WallPoint> = (0..16)
            .map(|n| WallPoint([n as f64 / 16.0, 0.0, 0.125]))
            .collect();
        let tree = RTree::bulk_load(pts);
        b.fill_wall_distance(&tree);
        let c = b.cell_center(1, 2, 0);
        let d = b.wall_distance(1, 2, 0);
        assert!((d - c.y).abs() < 0.1, "d = {}, y = {}", d, c.y);
    }

    #[test]
    fn test_cloud_round_trip() {
        let (mut b, mut inp, phys) = build_block_with((2, 2, 2), EquationSet::Euler);
        // 写一个两点点云文件
        let dir = std::env::temp_dir().join("af_cloud_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("cloud.dat");
        std::fs::write(
            &path,
            "2\n0.0 0.0 0.0 1.225 34.0 0.0 0.0 101325.0\n10.0 10.0 10.0 0.6 68.0 0.0 0.0 50000.0\n",
        )
        .unwrap();
        inp.initial = InitialCondition::PointCloud { file: path };
        b.initialize_states(&inp, &phys).unwrap();
        // 块在单位立方内，全部单元取第一个点
        let w = b.primitive(0, 0, 0);
        assert!((w.rho() - 1.0).abs() < 1e-12);
        assert!((w.velocity() - DVec3::new(34.0 / 340.294, 0.0, 0.0)).length() < 1e-10);
    }
}
