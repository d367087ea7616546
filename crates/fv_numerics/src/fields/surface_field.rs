// crates/fv_numerics/src/fields/surface_field.rs

//! 面标量场（通量、扩散系数的面值等）

use fv_foundation::{FvError, FvResult};
use glam::DVec3;

use crate::mesh::FvMesh;

/// 面标量场
///
/// 内部面按内部面编号存放，边界面按面片分组。
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceScalarField {
    name: String,
    internal: Vec<f64>,
    boundary: Vec<Vec<f64>>,
    epoch: u64,
}

impl SurfaceScalarField {
    /// 由内部面值与各面片值创建
    pub fn new(name: impl Into<String>, mesh: &FvMesh, internal: Vec<f64>, boundary: Vec<Vec<f64>>) -> FvResult<Self> {
        FvError::check_size("internal faces", mesh.n_internal_faces(), internal.len())?;
        FvError::check_size("patches", mesh.n_patches(), boundary.len())?;
        for (patch, values) in mesh.poly().patches().iter().zip(&boundary) {
            if values.len() != patch.size {
                return Err(FvError::boundary_condition(
                    patch.name.clone(),
                    format!("面值长度 {} 与面数 {} 不一致", values.len(), patch.size),
                ));
            }
        }
        Ok(Self {
            name: name.into(),
            internal,
            boundary,
            epoch: mesh.topology_epoch(),
        })
    }

    /// 均匀值
    pub fn uniform(name: impl Into<String>, mesh: &FvMesh, value: f64) -> Self {
        Self::from_face_fn(name, mesh, |_| value)
    }

    /// 按全局面编号逐面求值
    pub fn from_face_fn(name: impl Into<String>, mesh: &FvMesh, f: impl Fn(usize) -> f64) -> Self {
        let internal = (0..mesh.n_internal_faces()).map(&f).collect();
        let boundary = mesh.poly().patches().iter().map(|p| p.range().map(&f).collect()).collect();
        Self {
            name: name.into(),
            internal,
            boundary,
            epoch: mesh.topology_epoch(),
        }
    }

    /// 均匀速度场的体积通量 `U · Sf`
    pub fn flux(name: impl Into<String>, mesh: &FvMesh, velocity: DVec3) -> Self {
        let sf = &mesh.geometry().face_areas;
        Self::from_face_fn(name, mesh, |facei| velocity.dot(sf[facei]))
    }

    /// 场名
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 内部面值
    #[inline]
    pub fn internal(&self) -> &[f64] {
        &self.internal
    }

    /// 内部面值（可写）
    #[inline]
    pub fn internal_mut(&mut self) -> &mut [f64] {
        &mut self.internal
    }

    /// 面片面值
    #[inline]
    pub fn boundary(&self, patchi: usize) -> &[f64] {
        &self.boundary[patchi]
    }

    /// 面片面值（可写）
    #[inline]
    pub fn boundary_mut(&mut self, patchi: usize) -> &mut [f64] {
        &mut self.boundary[patchi]
    }

    /// 创建时的拓扑纪元
    #[inline]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// 检查是否定义在给定网格上
    pub fn check_mesh(&self, mesh: &FvMesh, operation: &'static str) -> FvResult<()> {
        mesh.check_epoch(self.epoch, operation)?;
        let same_shape = self.internal.len() == mesh.n_internal_faces()
            && self.boundary.len() == mesh.n_patches()
            && self
                .boundary
                .iter()
                .zip(mesh.poly().patches())
                .all(|(values, patch)| values.len() == patch.size);
        if same_shape {
            return Ok(());
        }
        Err(FvError::assembly_mismatch(
            operation,
            format!("面场 '{}' 的面数与网格不一致", self.name),
        ))
    }

    /// 逐面相乘
    pub fn multiply(&mut self, other: &SurfaceScalarField) -> FvResult<()> {
        FvError::check_size("internal faces", self.internal.len(), other.internal.len())?;
        FvError::check_size("patches", self.boundary.len(), other.boundary.len())?;
        for (a, &b) in self.internal.iter_mut().zip(&other.internal) {
            *a *= b;
        }
        for (pa, pb) in self.boundary.iter_mut().zip(&other.boundary) {
            FvError::check_size("patch faces", pa.len(), pb.len())?;
            for (a, &b) in pa.iter_mut().zip(pb) {
                *a *= b;
            }
        }
        Ok(())
    }
}
