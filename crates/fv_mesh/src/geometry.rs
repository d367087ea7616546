// crates/fv_mesh/src/geometry.rs

//! 网格几何量
//!
//! 面中心与面积矢量采用绕面平均点的三角剖分，单元中心与体积采用
//! 以估计中心为顶点的棱锥剖分。插值权重与 delta 系数对所有面（含边界面）
//! 按全局面编号存储。
//!
//! 耦合面片的对侧单元中心：
//! - 处理器面片取分区时记录的邻居单元中心
//! - 循环面片取配对面片对应面的 owner 中心，再平移两面中心之差

use fv_foundation::{FvError, FvResult};
use glam::DVec3;

use crate::patch::PatchKind;
use crate::poly_mesh::PolyMesh;

const VSMALL: f64 = 1e-300;

/// 非正交 delta 系数中 `n·d` 的下限比例
const NON_ORTH_LIMIT: f64 = 0.05;

/// 网格几何量
#[derive(Debug, Clone)]
pub struct MeshGeometry {
    /// 面中心
    pub face_centres: Vec<DVec3>,
    /// 面积矢量（指向 owner 外侧）
    pub face_areas: Vec<DVec3>,
    /// 面积大小
    pub mag_face_areas: Vec<f64>,
    /// 单元中心
    pub cell_centres: Vec<DVec3>,
    /// 单元体积
    pub cell_volumes: Vec<f64>,
    /// 线性插值权重（owner 侧），非耦合边界面为 1
    pub weights: Vec<f64>,
    /// owner 中心到对侧中心（或边界面法向投影）的矢量
    pub deltas: Vec<DVec3>,
    /// `1 / |delta|`
    pub delta_coeffs: Vec<f64>,
    /// `1 / max(n·delta, 0.05|delta|)`
    pub non_orth_delta_coeffs: Vec<f64>,
    /// 非正交修正矢量 `n - delta * nonOrthDeltaCoeff`，边界面为零
    pub non_orth_correction_vectors: Vec<DVec3>,
    /// 计算所基于的拓扑纪元
    pub topology_epoch: u64,
    /// 计算所基于的几何纪元
    pub geometry_epoch: u64,
}

impl MeshGeometry {
    /// 计算全部几何量
    pub fn compute(mesh: &PolyMesh) -> FvResult<Self> {
        let (face_centres, face_areas) = face_centres_and_areas(mesh);
        let mag_face_areas: Vec<f64> = face_areas.iter().map(|s| s.length()).collect();
        let (cell_centres, cell_volumes) = cell_centres_and_volumes(mesh, &face_centres, &face_areas);

        if let Some(celli) = cell_volumes.iter().position(|&v| !(v > 0.0)) {
            return Err(FvError::topology(
                "compute_geometry",
                format!("单元 {} 体积非正: {}", celli, cell_volumes[celli]),
            ));
        }

        let mut geom = Self {
            face_centres,
            face_areas,
            mag_face_areas,
            cell_centres,
            cell_volumes,
            weights: Vec::new(),
            deltas: Vec::new(),
            delta_coeffs: Vec::new(),
            non_orth_delta_coeffs: Vec::new(),
            non_orth_correction_vectors: Vec::new(),
            topology_epoch: mesh.topology_epoch(),
            geometry_epoch: mesh.geometry_epoch(),
        };
        geom.compute_interpolation(mesh)?;

        log::debug!(
            "几何量计算完成: {} 单元, {} 面, 总体积 {:.6e}",
            mesh.n_cells(),
            mesh.n_faces(),
            geom.cell_volumes.iter().sum::<f64>()
        );
        Ok(geom)
    }

    /// 是否与网格当前状态一致
    pub fn is_current(&self, mesh: &PolyMesh) -> bool {
        self.topology_epoch == mesh.topology_epoch() && self.geometry_epoch == mesh.geometry_epoch()
    }

    /// 面单位法向
    #[inline]
    pub fn unit_normal(&self, facei: usize) -> DVec3 {
        self.face_areas[facei] / self.mag_face_areas[facei].max(VSMALL)
    }

    /// 插值权重与 delta 系数
    fn compute_interpolation(&mut self, mesh: &PolyMesh) -> FvResult<()> {
        let n_faces = mesh.n_faces();
        let owner = mesh.owner();
        let neighbour = mesh.neighbour();

        self.weights = vec![1.0; n_faces];
        self.deltas = vec![DVec3::ZERO; n_faces];
        self.delta_coeffs = vec![0.0; n_faces];
        self.non_orth_delta_coeffs = vec![0.0; n_faces];
        self.non_orth_correction_vectors = vec![DVec3::ZERO; n_faces];

        for facei in 0..mesh.n_internal_faces() {
            let cn = self.cell_centres[neighbour[facei]];
            self.set_coupled_face(facei, self.cell_centres[owner[facei]], cn, true);
        }

        for (patchi, patch) in mesh.patches().iter().enumerate() {
            match &patch.kind {
                PatchKind::Processor(info) => {
                    for (i, facei) in patch.range().enumerate() {
                        let co = self.cell_centres[owner[facei]];
                        self.set_coupled_face(facei, co, info.neighbour_cell_centres[i], false);
                    }
                }
                PatchKind::Cyclic(info) => {
                    let nbr = &mesh.patches()[info.neighbour_patch];
                    for (i, facei) in patch.range().enumerate() {
                        let nbr_face = nbr.start + i;
                        let shift = self.face_centres[facei] - self.face_centres[nbr_face];
                        let cn = self.cell_centres[owner[nbr_face]] + shift;
                        let co = self.cell_centres[owner[facei]];
                        self.set_coupled_face(facei, co, cn, false);
                    }
                }
                PatchKind::Patch | PatchKind::Wall => {
                    for facei in patch.range() {
                        let n = self.unit_normal(facei);
                        let d = n * n.dot(self.face_centres[facei] - self.cell_centres[owner[facei]]);
                        let nd = d.length();
                        if !(nd > VSMALL) {
                            return Err(FvError::topology(
                                "compute_geometry",
                                format!("面片 {} 的面 {} 与单元中心重合", patchi, facei),
                            ));
                        }
                        self.weights[facei] = 1.0;
                        self.deltas[facei] = d;
                        self.delta_coeffs[facei] = 1.0 / nd;
                        self.non_orth_delta_coeffs[facei] = 1.0 / nd;
                    }
                }
            }
        }
        Ok(())
    }

    fn set_coupled_face(&mut self, facei: usize, co: DVec3, cn: DVec3, internal: bool) {
        let sf = self.face_areas[facei];
        let cf = self.face_centres[facei];
        let sfd_own = sf.dot(cf - co).abs();
        let sfd_nei = sf.dot(cn - cf).abs();
        let w = sfd_nei / (sfd_own + sfd_nei).max(VSMALL);

        let d = cn - co;
        let mag_d = d.length().max(VSMALL);
        let n = self.unit_normal(facei);
        let non_orth = 1.0 / n.dot(d).max(NON_ORTH_LIMIT * mag_d);

        self.weights[facei] = w;
        self.deltas[facei] = d;
        self.delta_coeffs[facei] = 1.0 / mag_d;
        self.non_orth_delta_coeffs[facei] = non_orth;
        if internal {
            self.non_orth_correction_vectors[facei] = n - d * non_orth;
        }
    }
}

/// 面中心与面积矢量
fn face_centres_and_areas(mesh: &PolyMesh) -> (Vec<DVec3>, Vec<DVec3>) {
    let points = mesh.points();
    let mut centres = Vec::with_capacity(mesh.n_faces());
    let mut areas = Vec::with_capacity(mesh.n_faces());

    for face in mesh.faces() {
        let n = face.len();
        if n == 3 {
            let (p0, p1, p2) = (points[face[0]], points[face[1]], points[face[2]]);
            centres.push((p0 + p1 + p2) / 3.0);
            areas.push(0.5 * (p1 - p0).cross(p2 - p0));
            continue;
        }

        let estimate = face.iter().map(|&p| points[p]).sum::<DVec3>() / n as f64;
        let mut sum_n = DVec3::ZERO;
        let mut sum_a = 0.0;
        let mut sum_ac = DVec3::ZERO;
        for pi in 0..n {
            let this = points[face[pi]];
            let next = points[face[(pi + 1) % n]];
            let c = this + next + estimate;
            let tri_n = (next - this).cross(estimate - this);
            let a = tri_n.length();
            sum_n += tri_n;
            sum_a += a;
            sum_ac += a * c;
        }

        if sum_a < VSMALL {
            centres.push(estimate);
        } else {
            centres.push(sum_ac / (3.0 * sum_a));
        }
        areas.push(0.5 * sum_n);
    }
    (centres, areas)
}

/// 单元中心与体积
fn cell_centres_and_volumes(
    mesh: &PolyMesh,
    face_centres: &[DVec3],
    face_areas: &[DVec3],
) -> (Vec<DVec3>, Vec<f64>) {
    let n_cells = mesh.n_cells();
    let owner = mesh.owner();
    let neighbour = mesh.neighbour();

    let mut estimate = vec![DVec3::ZERO; n_cells];
    let mut n_cell_faces = vec![0usize; n_cells];
    for (facei, &own) in owner.iter().enumerate() {
        estimate[own] += face_centres[facei];
        n_cell_faces[own] += 1;
    }
    for (facei, &nei) in neighbour.iter().enumerate() {
        estimate[nei] += face_centres[facei];
        n_cell_faces[nei] += 1;
    }
    for (c, n) in estimate.iter_mut().zip(&n_cell_faces) {
        *c /= (*n).max(1) as f64;
    }

    let mut centres = vec![DVec3::ZERO; n_cells];
    let mut volumes = vec![0.0; n_cells];

    for (facei, &own) in owner.iter().enumerate() {
        let pyr3_vol = face_areas[facei].dot(face_centres[facei] - estimate[own]).max(VSMALL);
        let pc = 0.75 * face_centres[facei] + 0.25 * estimate[own];
        centres[own] += pyr3_vol * pc;
        volumes[own] += pyr3_vol;
    }
    for (facei, &nei) in neighbour.iter().enumerate() {
        let pyr3_vol = face_areas[facei].dot(estimate[nei] - face_centres[facei]).max(VSMALL);
        let pc = 0.75 * face_centres[facei] + 0.25 * estimate[nei];
        centres[nei] += pyr3_vol * pc;
        volumes[nei] += pyr3_vol;
    }

    for celli in 0..n_cells {
        if volumes[celli] > VSMALL {
            centres[celli] /= volumes[celli];
        } else {
            centres[celli] = estimate[celli];
        }
        volumes[celli] /= 3.0;
    }
    (centres, volumes)
}
