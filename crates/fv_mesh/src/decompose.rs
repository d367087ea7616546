// crates/fv_mesh/src/decompose.rs

//! 区域分解
//!
//! 将全局网格按单元归属切分为多个子网格。跨分区的内部面在两侧各成为一个
//! 处理器面片的面，两侧按全局面编号排序，因此第 i 个面彼此对应。
//! neighbour 位于本分区的跨分区面会翻转点顺序，使法向指向本地 owner 外侧。

use std::collections::BTreeMap;

use fv_foundation::{FvError, FvResult};
use glam::DVec3;

use crate::geometry::MeshGeometry;
use crate::patch::{Patch, PatchKind, ProcessorInfo};
use crate::poly_mesh::PolyMesh;

/// 一个分区的子网格及其到全局网格的映射
#[derive(Debug, Clone)]
pub struct SubDomain {
    /// 分区编号
    pub proc: usize,
    /// 子网格
    pub mesh: PolyMesh,
    /// 本地单元 → 全局单元
    pub cell_map: Vec<usize>,
    /// 本地面 → 全局面
    pub face_map: Vec<usize>,
}

/// 按坐标方向均匀切分单元
///
/// 单元按 `(坐标, 全局编号)` 排序后依次分成 `n_procs` 段。
pub fn simple_distribution(geometry: &MeshGeometry, n_procs: usize, axis: usize) -> FvResult<Vec<usize>> {
    let n_cells = geometry.cell_centres.len();
    if n_procs == 0 || n_procs > n_cells {
        return Err(FvError::invalid_config(
            "decomposition.nProcs",
            n_procs.to_string(),
            format!("分区数必须在 1..={} 范围内", n_cells),
        ));
    }
    if axis > 2 {
        return Err(FvError::invalid_config("decomposition.axis", axis.to_string(), "方向必须为 0, 1 或 2"));
    }

    let mut order: Vec<usize> = (0..n_cells).collect();
    order.sort_by(|&a, &b| {
        geometry.cell_centres[a][axis]
            .total_cmp(&geometry.cell_centres[b][axis])
            .then(a.cmp(&b))
    });

    let mut cell_proc = vec![0usize; n_cells];
    for (rank, &celli) in order.iter().enumerate() {
        cell_proc[celli] = rank * n_procs / n_cells;
    }
    Ok(cell_proc)
}

/// 按单元归属分解网格
pub fn decompose(
    mesh: &PolyMesh,
    geometry: &MeshGeometry,
    cell_proc: &[usize],
    n_procs: usize,
) -> FvResult<Vec<SubDomain>> {
    const OP: &str = "decompose";
    FvError::check_size("cell_proc", mesh.n_cells(), cell_proc.len())?;
    if let Some(&bad) = cell_proc.iter().find(|&&p| p >= n_procs) {
        return Err(FvError::index_out_of_bounds("proc", bad, n_procs));
    }
    if let Some(patch) = mesh.patches().iter().find(|p| p.is_coupled()) {
        return Err(FvError::topology(
            OP,
            format!("不支持分解含耦合面片 '{}' 的网格", patch.name),
        ));
    }

    let mut domains = Vec::with_capacity(n_procs);
    for proc in 0..n_procs {
        domains.push(extract_domain(mesh, geometry, cell_proc, proc)?);
    }
    log::info!(
        "网格分解为 {} 个分区, 单元数 {:?}",
        n_procs,
        domains.iter().map(|d| d.mesh.n_cells()).collect::<Vec<_>>()
    );
    Ok(domains)
}

fn extract_domain(
    mesh: &PolyMesh,
    geometry: &MeshGeometry,
    cell_proc: &[usize],
    proc: usize,
) -> FvResult<SubDomain> {
    let owner = mesh.owner();
    let neighbour = mesh.neighbour();
    let global_faces = mesh.faces();

    let cell_map: Vec<usize> = (0..mesh.n_cells()).filter(|&c| cell_proc[c] == proc).collect();
    if cell_map.is_empty() {
        return Err(FvError::topology("decompose", format!("分区 {} 没有单元", proc)));
    }
    let mut local_cell = vec![usize::MAX; mesh.n_cells()];
    for (local, &global) in cell_map.iter().enumerate() {
        local_cell[global] = local;
    }

    let mut faces: Vec<Vec<usize>> = Vec::new();
    let mut face_owner = Vec::new();
    let mut face_neighbour = Vec::new();
    let mut face_map = Vec::new();

    // 邻居分区 -> (全局面, 翻转, 本地 owner, 对侧中心)
    let mut proc_faces: BTreeMap<usize, Vec<(usize, bool, usize, DVec3)>> = BTreeMap::new();

    for facei in 0..mesh.n_internal_faces() {
        let (own, nei) = (owner[facei], neighbour[facei]);
        match (cell_proc[own] == proc, cell_proc[nei] == proc) {
            (true, true) => {
                faces.push(global_faces[facei].clone());
                face_owner.push(local_cell[own]);
                face_neighbour.push(local_cell[nei]);
                face_map.push(facei);
            }
            (true, false) => proc_faces.entry(cell_proc[nei]).or_default().push((
                facei,
                false,
                local_cell[own],
                geometry.cell_centres[nei],
            )),
            (false, true) => proc_faces.entry(cell_proc[own]).or_default().push((
                facei,
                true,
                local_cell[nei],
                geometry.cell_centres[own],
            )),
            (false, false) => {}
        }
    }

    let mut patches = Vec::new();
    for patch in mesh.patches() {
        let start = faces.len();
        for facei in patch.range() {
            if cell_proc[owner[facei]] == proc {
                faces.push(global_faces[facei].clone());
                face_owner.push(local_cell[owner[facei]]);
                face_map.push(facei);
            }
        }
        patches.push(Patch::new(patch.name.clone(), start, faces.len() - start, patch.kind.clone()));
    }

    for (nbr_proc, entries) in proc_faces {
        let start = faces.len();
        let mut centres = Vec::with_capacity(entries.len());
        for (facei, flip, local_own, centre) in entries {
            let mut f = global_faces[facei].clone();
            if flip {
                f.reverse();
            }
            faces.push(f);
            face_owner.push(local_own);
            face_map.push(facei);
            centres.push(centre);
        }
        patches.push(Patch::new(
            format!("proc{}to{}", proc, nbr_proc),
            start,
            faces.len() - start,
            PatchKind::Processor(ProcessorInfo {
                my_proc: proc,
                neighb_proc: nbr_proc,
                neighbour_cell_centres: centres,
            }),
        ));
    }

    // 只保留用到的点，保持全局顺序
    let mut used = vec![false; mesh.n_points()];
    for f in &faces {
        for &p in f {
            used[p] = true;
        }
    }
    let mut local_point = vec![usize::MAX; mesh.n_points()];
    let mut points = Vec::new();
    for (global, _) in used.iter().enumerate().filter(|&(_, &u)| u) {
        local_point[global] = points.len();
        points.push(mesh.points()[global]);
    }
    for f in faces.iter_mut() {
        for p in f.iter_mut() {
            *p = local_point[*p];
        }
    }

    let sub = PolyMesh::new(points, faces, face_owner, face_neighbour, cell_map.len(), patches)?;
    Ok(SubDomain {
        proc,
        mesh: sub,
        cell_map,
        face_map,
    })
}

/// 将各分区的单元场拼回全局单元场
pub fn reconstruct_cell_field(
    n_global_cells: usize,
    domains: &[SubDomain],
    values: &[Vec<f64>],
) -> FvResult<Vec<f64>> {
    FvError::check_size("values", domains.len(), values.len())?;
    let mut global = vec![f64::NAN; n_global_cells];
    for (domain, local) in domains.iter().zip(values) {
        FvError::check_size("local_values", domain.cell_map.len(), local.len())?;
        for (&g, &v) in domain.cell_map.iter().zip(local) {
            FvError::check_index("cell", g, n_global_cells)?;
            global[g] = v;
        }
    }
    if let Some(celli) = global.iter().position(|v| v.is_nan()) {
        return Err(FvError::not_found(format!("单元 {} 未被任何分区覆盖", celli)));
    }
    Ok(global)
}
