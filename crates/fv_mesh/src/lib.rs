// crates/fv_mesh/src/lib.rs

//! Finvol 网格模块
//!
//! 提供有限体积离散所需的多面体面网格。
//!
//! # 核心类型
//!
//! - [`PolyMesh`]: 面为中心的网格拓扑（owner/neighbour + 面片），构造时校验
//! - [`MeshGeometry`]: 面/单元几何量与插值系数
//! - [`BlockMeshGenerator`]: 结构化块网格生成器
//! - [`decompose`](decompose::decompose): 按单元归属的区域分解
//!
//! # 示例
//!
//! ```rust
//! use fv_mesh::{BlockMeshGenerator, MeshGeometry};
//!
//! let mesh = BlockMeshGenerator::chain(10, 1.0).build().unwrap();
//! let geom = MeshGeometry::compute(&mesh).unwrap();
//! assert_eq!(mesh.n_internal_faces(), 9);
//! assert!((geom.cell_volumes.iter().sum::<f64>() - 1.0).abs() < 1e-12);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod decompose;
pub mod generation;
pub mod geometry;
pub mod patch;
pub mod poly_mesh;

/// 层级标识
pub const LAYER: u8 = 2;

pub use decompose::{decompose, reconstruct_cell_field, simple_distribution, SubDomain};
pub use generation::{BlockMeshGenerator, BLOCK_PATCH_NAMES};
pub use geometry::MeshGeometry;
pub use patch::{CyclicInfo, Patch, PatchKind, ProcessorInfo};
pub use poly_mesh::PolyMesh;
