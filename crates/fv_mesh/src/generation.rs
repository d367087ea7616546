// crates/fv_mesh/src/generation.rs

//! 网格生成模块
//!
//! 提供简单的结构化六面体块网格，用于测试和演示算例：
//!
//! - 单元编号 `i + nx*(j + ny*k)`，内部面按 owner 递增、同 owner 按 +x/+y/+z 顺序生成，
//!   天然满足上三角顺序
//! - 边界面片依次为 xMin, xMax, yMin, yMax, zMin, zMax
//!
//! # 使用示例
//!
//! ```rust
//! use fv_mesh::generation::BlockMeshGenerator;
//!
//! // 单单元立方体，全部边界面归入一个面片
//! let mesh = BlockMeshGenerator::new([1, 1, 1], [1.0, 1.0, 1.0])
//!     .with_single_patch("walls")
//!     .build()
//!     .unwrap();
//! assert_eq!(mesh.n_points(), 8);
//! assert_eq!(mesh.n_internal_faces(), 0);
//! assert_eq!(mesh.n_patches(), 1);
//! ```

use fv_foundation::{FvError, FvResult};
use glam::DVec3;

use crate::patch::{CyclicInfo, Patch, PatchKind};
use crate::poly_mesh::PolyMesh;

/// 块网格边界面片名称
pub const BLOCK_PATCH_NAMES: [&str; 6] = ["xMin", "xMax", "yMin", "yMax", "zMin", "zMax"];

/// 结构化六面体块网格生成器
#[derive(Debug, Clone)]
pub struct BlockMeshGenerator {
    cells: [usize; 3],
    lengths: [f64; 3],
    origin: DVec3,
    single_patch: Option<String>,
    cyclic_x: bool,
}

impl BlockMeshGenerator {
    /// 创建块网格生成器
    ///
    /// # 参数
    ///
    /// - `cells`: 三个方向的单元数
    /// - `lengths`: 三个方向的域长度
    pub fn new(cells: [usize; 3], lengths: [f64; 3]) -> Self {
        Self {
            cells,
            lengths,
            origin: DVec3::ZERO,
            single_patch: None,
            cyclic_x: false,
        }
    }

    /// 一维链：沿 x 排列的 n 个单元
    pub fn chain(n: usize, length: f64) -> Self {
        Self::new([n, 1, 1], [length, 1.0, 1.0])
    }

    /// 设置原点偏移
    pub fn with_origin(mut self, origin: DVec3) -> Self {
        self.origin = origin;
        self
    }

    /// 全部边界面归入一个壁面面片
    pub fn with_single_patch(mut self, name: impl Into<String>) -> Self {
        self.single_patch = Some(name.into());
        self
    }

    /// xMin 与 xMax 配对为平移周期面片
    pub fn with_cyclic_x(mut self) -> Self {
        self.cyclic_x = true;
        self
    }

    /// 单元总数
    pub fn n_cells(&self) -> usize {
        self.cells.iter().product()
    }

    /// 构建网格
    pub fn build(&self) -> FvResult<PolyMesh> {
        let [nx, ny, nz] = self.cells;
        if nx == 0 || ny == 0 || nz == 0 {
            return Err(FvError::topology(
                "block_mesh",
                format!("单元数必须为正: {:?}", self.cells),
            ));
        }
        if self.cyclic_x && self.single_patch.is_some() {
            return Err(FvError::topology("block_mesh", "周期面片与单一面片不能同时使用"));
        }

        let dx = self.lengths[0] / nx as f64;
        let dy = self.lengths[1] / ny as f64;
        let dz = self.lengths[2] / nz as f64;

        let mut points = Vec::with_capacity((nx + 1) * (ny + 1) * (nz + 1));
        for k in 0..=nz {
            for j in 0..=ny {
                for i in 0..=nx {
                    points.push(
                        self.origin + DVec3::new(i as f64 * dx, j as f64 * dy, k as f64 * dz),
                    );
                }
            }
        }

        let p = |i: usize, j: usize, k: usize| i + (nx + 1) * (j + (ny + 1) * k);
        let cell = |i: usize, j: usize, k: usize| i + nx * (j + ny * k);
        // 法向分别沿 +x, +y, +z
        let x_face = |i, j, k| vec![p(i, j, k), p(i, j + 1, k), p(i, j + 1, k + 1), p(i, j, k + 1)];
        let y_face = |i, j, k| vec![p(i, j, k), p(i, j, k + 1), p(i + 1, j, k + 1), p(i + 1, j, k)];
        let z_face = |i, j, k| vec![p(i, j, k), p(i + 1, j, k), p(i + 1, j + 1, k), p(i, j + 1, k)];
        let reversed = |mut f: Vec<usize>| {
            f.reverse();
            f
        };

        let mut faces = Vec::new();
        let mut owner = Vec::new();
        let mut neighbour = Vec::new();

        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    let c = cell(i, j, k);
                    if i + 1 < nx {
                        faces.push(x_face(i + 1, j, k));
                        owner.push(c);
                        neighbour.push(cell(i + 1, j, k));
                    }
                    if j + 1 < ny {
                        faces.push(y_face(i, j + 1, k));
                        owner.push(c);
                        neighbour.push(cell(i, j + 1, k));
                    }
                    if k + 1 < nz {
                        faces.push(z_face(i, j, k + 1));
                        owner.push(c);
                        neighbour.push(cell(i, j, k + 1));
                    }
                }
            }
        }

        let mut sizes = [0usize; 6];
        for k in 0..nz {
            for j in 0..ny {
                faces.push(reversed(x_face(0, j, k)));
                owner.push(cell(0, j, k));
            }
        }
        sizes[0] = ny * nz;
        for k in 0..nz {
            for j in 0..ny {
                faces.push(x_face(nx, j, k));
                owner.push(cell(nx - 1, j, k));
            }
        }
        sizes[1] = ny * nz;
        for k in 0..nz {
            for i in 0..nx {
                faces.push(reversed(y_face(i, 0, k)));
                owner.push(cell(i, 0, k));
            }
        }
        sizes[2] = nx * nz;
        for k in 0..nz {
            for i in 0..nx {
                faces.push(y_face(i, ny, k));
                owner.push(cell(i, ny - 1, k));
            }
        }
        sizes[3] = nx * nz;
        for j in 0..ny {
            for i in 0..nx {
                faces.push(reversed(z_face(i, j, 0)));
                owner.push(cell(i, j, 0));
            }
        }
        sizes[4] = nx * ny;
        for j in 0..ny {
            for i in 0..nx {
                faces.push(z_face(i, j, nz));
                owner.push(cell(i, j, nz - 1));
            }
        }
        sizes[5] = nx * ny;

        let n_internal = neighbour.len();
        let patches = match &self.single_patch {
            Some(name) => vec![Patch::new(
                name.clone(),
                n_internal,
                sizes.iter().sum(),
                PatchKind::Wall,
            )],
            None => {
                let mut start = n_internal;
                let mut patches = Vec::with_capacity(6);
                for (patchi, (&name, &size)) in BLOCK_PATCH_NAMES.iter().zip(&sizes).enumerate() {
                    let kind = match (self.cyclic_x, patchi) {
                        (true, 0) => PatchKind::Cyclic(CyclicInfo { neighbour_patch: 1 }),
                        (true, 1) => PatchKind::Cyclic(CyclicInfo { neighbour_patch: 0 }),
                        _ => PatchKind::Patch,
                    };
                    patches.push(Patch::new(name, start, size, kind));
                    start += size;
                }
                patches
            }
        };

        log::debug!(
            "块网格: {}x{}x{} 单元, {} 内部面, {} 面片",
            nx,
            ny,
            nz,
            n_internal,
            patches.len()
        );
        PolyMesh::new(points, faces, owner, neighbour, self.n_cells(), patches)
    }
}
