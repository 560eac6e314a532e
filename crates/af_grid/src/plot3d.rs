// crates/af_grid/src/plot3d.rs

//! plot3d 节点块与派生几何
//!
//! [`Plot3dBlock`] 持有 `(Ni+1, Nj+1, Nk+1)` 个节点坐标。派生量：
//!
//! - 单元体积：以单元形心为顶点对六个面做金字塔分解求和，
//!   等价于散度定理 `V = (1/3) Σ_f A_f · (x_f − x_c)`
//! - 面积向量：面对角线叉积的一半，同时携带模与单位法向
//! - 面心、单元形心、单元宽度
//!
//! # 方向不变量
//!
//! 面积向量一律从低索引单元指向高索引单元；体积必须为正，
//! 否则返回 [`AfError::InvalidGeometry`]。

use af_foundation::{AfError, AfResult};
use glam::DVec3;

use crate::multi_array::MultiArray3d;
use crate::range::{Axis, Range3};

/// 面积向量：单位法向 + 模
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceArea {
    /// 单位法向
    pub unit: DVec3,
    /// 面积模
    pub mag: f64,
}

impl FaceArea {
    /// 零面积
    pub const ZERO: FaceArea = FaceArea {
        unit: DVec3::ZERO,
        mag: 0.0,
    };

    /// 从面积向量构造
    pub fn from_vector(v: DVec3) -> Self {
        let mag = v.length();
        if mag > 0.0 {
            Self { unit: v / mag, mag }
        } else {
            Self::ZERO
        }
    }

    /// 面积向量
    #[inline]
    pub fn vector(&self) -> DVec3 {
        self.unit * self.mag
    }

    /// 法向取反
    #[inline]
    pub fn flipped(&self) -> Self {
        Self {
            unit: -self.unit,
            mag: self.mag,
        }
    }
}

/// plot3d 节点坐标块
///
/// `coords` 的"物理"尺寸是节点数 `(Ni+1, Nj+1, Nk+1)`，无幽灵层。
#[derive(Debug, Clone, PartialEq)]
pub struct Plot3dBlock {
    coords: MultiArray3d<DVec3>,
}

impl Plot3dBlock {
    /// 从节点数组构造
    pub fn new(coords: MultiArray3d<DVec3>) -> Self {
        Self { coords }
    }

    /// 均匀长方体网格（测试与算例生成）
    pub fn uniform(
        origin: DVec3,
        extent: DVec3,
        ni: usize,
        nj: usize,
        nk: usize,
    ) -> Self {
        let mut coords = MultiArray3d::new(ni + 1, nj + 1, nk + 1, 0, DVec3::ZERO);
        for k in 0..=nk {
            for j in 0..=nj {
                for i in 0..=ni {
                    let f = DVec3::new(
                        i as f64 / ni as f64,
                        j as f64 / nj as f64,
                        k as f64 / nk as f64,
                    );
                    *coords.get_mut(i as isize, j as isize, k as isize) = origin + extent * f;
                }
            }
        }
        Self { coords }
    }

    /// 节点数组
    pub fn coords(&self) -> &MultiArray3d<DVec3> {
        &self.coords
    }

    /// i 方向单元数
    pub fn num_cells_i(&self) -> usize {
        self.coords.num_i() - 1
    }

    /// j 方向单元数
    pub fn num_cells_j(&self) -> usize {
        self.coords.num_j() - 1
    }

    /// k 方向单元数
    pub fn num_cells_k(&self) -> usize {
        self.coords.num_k() - 1
    }

    /// 按轴取单元数
    pub fn num_cells_along(&self, axis: Axis) -> usize {
        match axis {
            Axis::I => self.num_cells_i(),
            Axis::J => self.num_cells_j(),
            Axis::K => self.num_cells_k(),
        }
    }

    /// 总单元数
    pub fn num_cells(&self) -> usize {
        self.num_cells_i() * self.num_cells_j() * self.num_cells_k()
    }

    #[inline]
    fn node(&self, i: isize, j: isize, k: isize) -> DVec3 {
        *self.coords.get(i, j, k)
    }

    /// i 族面积向量，尺寸 `(Ni+1, Nj, Nk)`
    pub fn face_area_i(&self) -> MultiArray3d<FaceArea> {
        let (ni, nj, nk) = (self.num_cells_i(), self.num_cells_j(), self.num_cells_k());
        let mut out = MultiArray3d::new(ni + 1, nj, nk, 0, FaceArea::ZERO);
        for k in 0..nk as isize {
            for j in 0..nj as isize {
                for i in 0..=ni as isize {
                    // 对角线叉积的一半，法向指向 +i
                    let d1 = self.node(i, j + 1, k + 1) - self.node(i, j, k);
                    let d2 = self.node(i, j, k + 1) - self.node(i, j + 1, k);
                    *out.get_mut(i, j, k) = FaceArea::from_vector(0.5 * d1.cross(d2));
                }
            }
        }
        out
    }

    /// j 族面积向量，尺寸 `(Ni, Nj+1, Nk)`
    pub fn face_area_j(&self) -> MultiArray3d<FaceArea> {
        let (ni, nj, nk) = (self.num_cells_i(), self.num_cells_j(), self.num_cells_k());
        let mut out = MultiArray3d::new(ni, nj + 1, nk, 0, FaceArea::ZERO);
        for k in 0..nk as isize {
            for j in 0..=nj as isize {
                for i in 0..ni as isize {
                    let d1 = self.node(i + 1, j, k + 1) - self.node(i, j, k);
                    let d2 = self.node(i + 1, j, k) - self.node(i, j, k + 1);
                    *out.get_mut(i, j, k) = FaceArea::from_vector(0.5 * d1.cross(d2));
                }
            }
        }
        out
    }

    /// k 族面积向量，尺寸 `(Ni, Nj, Nk+1)`
    pub fn face_area_k(&self) -> MultiArray3d<FaceArea> {
        let (ni, nj, nk) = (self.num_cells_i(), self.num_cells_j(), self.num_cells_k());
        let mut out = MultiArray3d::new(ni, nj, nk + 1, 0, FaceArea::ZERO);
        for k in 0..=nk as isize {
            for j in 0..nj as isize {
                for i in 0..ni as isize {
                    let d1 = self.node(i + 1, j + 1, k) - self.node(i, j, k);
                    let d2 = self.node(i, j + 1, k) - self.node(i + 1, j, k);
                    *out.get_mut(i, j, k) = FaceArea::from_vector(0.5 * d1.cross(d2));
                }
            }
        }
        out
    }

    /// i 族面心，尺寸 `(Ni+1, Nj, Nk)`
    pub fn face_center_i(&self) -> MultiArray3d<DVec3> {
        let (ni, nj, nk) = (self.num_cells_i(), self.num_cells_j(), self.num_cells_k());
        let mut out = MultiArray3d::new(ni + 1, nj, nk, 0, DVec3::ZERO);
        for k in 0..nk as isize {
            for j in 0..nj as isize {
                for i in 0..=ni as isize {
                    *out.get_mut(i, j, k) = 0.25
                        * (self.node(i, j, k)
                            + self.node(i, j + 1, k)
                            + self.node(i, j, k + 1)
                            + self.node(i, j + 1, k + 1));
                }
            }
        }
        out
    }

    /// j 族面心，尺寸 `(Ni, Nj+1, Nk)`
    pub fn face_center_j(&self) -> MultiArray3d<DVec3> {
        let (ni, nj, nk) = (self.num_cells_i(), self.num_cells_j(), self.num_cells_k());
        let mut out = MultiArray3d::new(ni, nj + 1, nk, 0, DVec3::ZERO);
        for k in 0..nk as isize {
            for j in 0..=nj as isize {
                for i in 0..ni as isize {
                    *out.get_mut(i, j, k) = 0.25
                        * (self.node(i, j, k)
                            + self.node(i + 1, j, k)
                            + self.node(i, j, k + 1)
                            + self.node(i + 1, j, k + 1));
                }
            }
        }
        out
    }

    /// k 族面心，尺寸 `(Ni, Nj, Nk+1)`
    pub fn face_center_k(&self) -> MultiArray3d<DVec3> {
        let (ni, nj, nk) = (self.num_cells_i(), self.num_cells_j(), self.num_cells_k());
        let mut out = MultiArray3d::new(ni, nj, nk + 1, 0, DVec3::ZERO);
        for k in 0..=nk as isize {
            for j in 0..nj as isize {
                for i in 0..ni as isize {
                    *out.get_mut(i, j, k) = 0.25
                        * (self.node(i, j, k)
                            + self.node(i + 1, j, k)
                            + self.node(i, j + 1, k)
                            + self.node(i + 1, j + 1, k));
                }
            }
        }
        out
    }

    /// 单元形心（八节点平均），尺寸 `(Ni, Nj, Nk)`
    pub fn centroid(&self) -> MultiArray3d<DVec3> {
        let (ni, nj, nk) = (self.num_cells_i(), self.num_cells_j(), self.num_cells_k());
        let mut out = MultiArray3d::new(ni, nj, nk, 0, DVec3::ZERO);
        for k in 0..nk as isize {
            for j in 0..nj as isize {
                for i in 0..ni as isize {
                    let mut c = DVec3::ZERO;
                    for dk in 0..2 {
                        for dj in 0..2 {
                            for di in 0..2 {
                                c += self.node(i + di, j + dj, k + dk);
                            }
                        }
                    }
                    *out.get_mut(i, j, k) = c / 8.0;
                }
            }
        }
        out
    }

    /// 单元体积（六面金字塔分解求和）
    pub fn volume(&self) -> AfResult<MultiArray3d<f64>> {
        let (ni, nj, nk) = (self.num_cells_i(), self.num_cells_j(), self.num_cells_k());
        let fa_i = self.face_area_i();
        let fa_j = self.face_area_j();
        let fa_k = self.face_area_k();
        let fc_i = self.face_center_i();
        let fc_j = self.face_center_j();
        let fc_k = self.face_center_k();
        let centers = self.centroid();

        let mut out = MultiArray3d::new(ni, nj, nk, 0, 0.0);
        for k in 0..nk as isize {
            for j in 0..nj as isize {
                for i in 0..ni as isize {
                    let xc = *centers.get(i, j, k);
                    // 上侧面法向朝外，下侧面需取反
                    let mut v = 0.0;
                    v += fa_i.get(i + 1, j, k).vector().dot(*fc_i.get(i + 1, j, k) - xc);
                    v -= fa_i.get(i, j, k).vector().dot(*fc_i.get(i, j, k) - xc);
                    v += fa_j.get(i, j + 1, k).vector().dot(*fc_j.get(i, j + 1, k) - xc);
                    v -= fa_j.get(i, j, k).vector().dot(*fc_j.get(i, j, k) - xc);
                    v += fa_k.get(i, j, k + 1).vector().dot(*fc_k.get(i, j, k + 1) - xc);
                    v -= fa_k.get(i, j, k).vector().dot(*fc_k.get(i, j, k) - xc);
                    v /= 3.0;
                    if v <= 0.0 {
                        return Err(AfError::invalid_geometry(format!(
                            "单元 ({}, {}, {}) 体积非正: {:e}",
                            i, j, k, v
                        )));
                    }
                    *out.get_mut(i, j, k) = v;
                }
            }
        }
        Ok(out)
    }

    /// 沿 `dir` 在单元索引 `ind` 处切分
    ///
    /// 接收者保留下块（单元 `[0, ind)`），返回上块（单元 `[ind, N)`）。
    /// 界面节点两侧各保留一份。
    pub fn split(&mut self, dir: Axis, ind: usize) -> AfResult<Plot3dBlock> {
        let n = self.num_cells_along(dir);
        if ind == 0 || ind >= n {
            return Err(AfError::invalid_geometry(format!(
                "切分位置 {} 超出单元范围 (0, {})",
                ind, n
            )));
        }
        let (ni, nj, nk) = (
            self.coords.num_i() as isize,
            self.coords.num_j() as isize,
            self.coords.num_k() as isize,
        );
        let s = ind as isize;
        let (lower_r, upper_r) = match dir {
            Axis::I => (
                Range3::new((0, s + 1), (0, nj), (0, nk)),
                Range3::new((s, ni), (0, nj), (0, nk)),
            ),
            Axis::J => (
                Range3::new((0, ni), (0, s + 1), (0, nk)),
                Range3::new((0, ni), (s, nj), (0, nk)),
            ),
            Axis::K => (
                Range3::new((0, ni), (0, nj), (0, s + 1)),
                Range3::new((0, ni), (0, nj), (s, nk)),
            ),
        };
        let upper = Plot3dBlock::new(self.coords.slice(upper_r));
        self.coords = self.coords.slice(lower_r);
        Ok(upper)
    }

    /// 沿 `dir` 与上块拼接
    ///
    /// 要求界面节点逐点一致、横向尺寸一致。
    pub fn join(&mut self, other: &Plot3dBlock, dir: Axis) -> AfResult<()> {
        let (t1, t2) = dir.transverse();
        if self.num_cells_along(t1) != other.num_cells_along(t1)
            || self.num_cells_along(t2) != other.num_cells_along(t2)
        {
            return Err(AfError::invalid_geometry("拼接的横向尺寸不一致"));
        }
        // 界面节点一致性检查
        let n_hi = self.num_cells_along(dir) as isize;
        let iter_r = match dir {
            Axis::I => Range3::new(
                (n_hi, n_hi + 1),
                (0, self.coords.num_j() as isize),
                (0, self.coords.num_k() as isize),
            ),
            Axis::J => Range3::new(
                (0, self.coords.num_i() as isize),
                (n_hi, n_hi + 1),
                (0, self.coords.num_k() as isize),
            ),
            Axis::K => Range3::new(
                (0, self.coords.num_i() as isize),
                (0, self.coords.num_j() as isize),
                (n_hi, n_hi + 1),
            ),
        };
        for (i, j, k) in iter_r.iter() {
            let (oi, oj, ok) = match dir {
                Axis::I => (0, j, k),
                Axis::J => (i, 0, k),
                Axis::K => (i, j, 0),
            };
            if self.node(i, j, k) != *other.coords.get(oi, oj, ok) {
                return Err(AfError::invalid_geometry("拼接的界面节点不重合"));
            }
        }
        // 跳过上块的界面节点平面后拼接
        let (oni, onj, onk) = (
            other.coords.num_i() as isize,
            other.coords.num_j() as isize,
            other.coords.num_k() as isize,
        );
        let rest = match dir {
            Axis::I => Range3::new((1, oni), (0, onj), (0, onk)),
            Axis::J => Range3::new((0, oni), (1, onj), (0, onk)),
            Axis::K => Range3::new((0, oni), (0, onj), (1, onk)),
        };
        self.coords.grow(dir, &other.coords.slice(rest))?;
        Ok(())
    }
}
