// crates/fv_numerics/src/mesh.rs

//! 有限体积网格
//!
//! [`FvMesh`] 把拓扑、几何与 LDU 视图放在一起，并按纪元判断是否需要重建：
//!
//! ```text
//! PolyMesh.topology_epoch ≠ LduMesh.epoch      ──> 重建寻址、界面与调度
//! PolyMesh.geometry_epoch ≠ MeshGeometry.epoch ──> 重算几何
//! ```

use std::sync::Arc;

use fv_config::CommsType;
use fv_foundation::{FvError, FvResult};
use fv_mesh::{MeshGeometry, PolyMesh};

use crate::fields::PatchContext;
use crate::ldu::{LduAddressing, LduMesh};
use crate::parallel::Communicator;

/// 有限体积网格
#[derive(Debug, Clone)]
pub struct FvMesh {
    poly: PolyMesh,
    geometry: MeshGeometry,
    ldu: LduMesh,
    comms_type: CommsType,
}

impl FvMesh {
    /// 构建几何与 LDU 视图
    ///
    /// `Scheduled` 通信方式下所有分区必须同时调用。
    pub fn new(poly: PolyMesh, comm: &dyn Communicator, comms_type: CommsType) -> FvResult<Self> {
        poly.check_topology()?;
        let geometry = MeshGeometry::compute(&poly)?;
        let ldu = LduMesh::build(&poly, comm, comms_type)?;
        Ok(Self {
            poly,
            geometry,
            ldu,
            comms_type,
        })
    }

    /// 拓扑
    #[inline]
    pub fn poly(&self) -> &PolyMesh {
        &self.poly
    }

    /// 可修改的拓扑，修改后需调用 [`update`](Self::update)
    pub fn poly_mut(&mut self) -> &mut PolyMesh {
        &mut self.poly
    }

    /// 几何
    #[inline]
    pub fn geometry(&self) -> &MeshGeometry {
        &self.geometry
    }

    /// LDU 视图
    #[inline]
    pub fn ldu(&self) -> &LduMesh {
        &self.ldu
    }

    /// LDU 寻址
    #[inline]
    pub fn addressing(&self) -> &Arc<LduAddressing> {
        self.ldu.addressing()
    }

    /// 通信方式
    #[inline]
    pub fn comms_type(&self) -> CommsType {
        self.comms_type
    }

    /// 单元数
    #[inline]
    pub fn n_cells(&self) -> usize {
        self.poly.n_cells()
    }

    /// 内部面数
    #[inline]
    pub fn n_internal_faces(&self) -> usize {
        self.poly.n_internal_faces()
    }

    /// 面片数
    #[inline]
    pub fn n_patches(&self) -> usize {
        self.poly.n_patches()
    }

    /// 单元体积
    #[inline]
    pub fn volumes(&self) -> &[f64] {
        &self.geometry.cell_volumes
    }

    /// 拓扑纪元
    #[inline]
    pub fn topology_epoch(&self) -> u64 {
        self.poly.topology_epoch()
    }

    /// LDU 视图或几何是否过期
    pub fn is_stale(&self) -> bool {
        self.ldu.is_stale(&self.poly) || !self.geometry.is_current(&self.poly)
    }

    /// 按纪元重建过期部分，返回是否重建了 LDU 视图
    ///
    /// 拓扑变化后所有分区必须同时调用。
    pub fn update(&mut self, comm: &dyn Communicator) -> FvResult<bool> {
        if !self.geometry.is_current(&self.poly) {
            self.geometry = MeshGeometry::compute(&self.poly)?;
        }
        if self.ldu.is_stale(&self.poly) {
            log::info!(
                "拓扑纪元 {} → {}，重建 LDU 寻址",
                self.ldu.epoch(),
                self.poly.topology_epoch()
            );
            self.ldu = LduMesh::build(&self.poly, comm, self.comms_type)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// 检查场或矩阵所基于的纪元是否与网格一致
    pub fn check_epoch(&self, epoch: u64, operation: &'static str) -> FvResult<()> {
        if epoch == self.ldu.epoch() && !self.is_stale() {
            return Ok(());
        }
        Err(FvError::assembly_mismatch(
            operation,
            format!(
                "对象基于拓扑纪元 {}，网格当前纪元 {}（LDU 纪元 {}）",
                epoch,
                self.poly.topology_epoch(),
                self.ldu.epoch()
            ),
        ))
    }

    /// 面片几何视图
    pub fn patch_context(&self, patchi: usize) -> FvResult<PatchContext<'_>> {
        FvError::check_index("patch", patchi, self.poly.n_patches())?;
        let patch = &self.poly.patches()[patchi];
        let range = patch.range();
        Ok(PatchContext {
            index: patchi,
            patch,
            face_cells: self.poly.patch_face_cells(patchi),
            delta_coeffs: &self.geometry.non_orth_delta_coeffs[range.clone()],
            weights: &self.geometry.weights[range.clone()],
            mag_sf: &self.geometry.mag_face_areas[range],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::SerialComm;
    use fv_mesh::BlockMeshGenerator;

    #[test]
    fn test_update_rebuilds_only_when_stale() {
        let poly = BlockMeshGenerator::chain(4, 1.0).build().unwrap();
        let mut mesh = FvMesh::new(poly, &SerialComm, CommsType::NonBlocking).unwrap();
        let epoch = mesh.topology_epoch();
        assert!(!mesh.is_stale());
        assert!(!mesh.update(&SerialComm).unwrap());
        mesh.check_epoch(epoch, "test").unwrap();

        mesh.poly_mut().bump_topology_epoch();
        assert!(mesh.is_stale());
        assert!(mesh.check_epoch(epoch, "test").is_err());
        assert!(mesh.update(&SerialComm).unwrap());
        assert_eq!(mesh.ldu().epoch(), epoch + 1);
        assert!(!mesh.is_stale());
    }

    #[test]
    fn test_patch_context_slices() {
        let poly = BlockMeshGenerator::chain(3, 3.0).build().unwrap();
        let mesh = FvMesh::new(poly, &SerialComm, CommsType::NonBlocking).unwrap();
        let xmin = mesh.poly().find_patch("xMin").unwrap();
        let ctx = mesh.patch_context(xmin).unwrap();
        assert_eq!(ctx.size(), 1);
        assert_eq!(ctx.face_cells, &[0]);
        // 单元中心到 xMin 面的距离为 0.5
        assert!((ctx.delta_coeffs[0] - 2.0).abs() < 1e-12);
        assert!(mesh.patch_context(99).is_err());
    }
}
