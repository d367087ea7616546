// crates/fv_mesh/src/poly_mesh.rs

//! 多面体面网格
//!
//! 以面为中心的网格表示：每个面有一个 owner 单元，内部面另有一个 neighbour 单元。
//!
//! # 不变量
//!
//! - 内部面在前，`[0, n_internal_faces)`；边界面按面片连续存放在其后
//! - 内部面满足 `owner < neighbour`
//! - 内部面按上三角顺序排列：owner 非递减，owner 相同时 neighbour 非递减
//! - 所有单元索引 `< n_cells`，所有点索引 `< n_points`
//!
//! 违反任何不变量都会在构造时返回 [`FvError::Topology`]，不会自动重排。
//!
//! # 纪元
//!
//! `topology_epoch` 在每次拓扑变化时递增，寻址与调度据此判断是否过期；
//! `geometry_epoch` 在点坐标变化时递增。

use fv_foundation::{FvError, FvResult};
use glam::DVec3;

use crate::patch::{Patch, PatchKind};

/// 多面体面网格
#[derive(Debug, Clone)]
pub struct PolyMesh {
    points: Vec<DVec3>,
    faces: Vec<Vec<usize>>,
    owner: Vec<usize>,
    neighbour: Vec<usize>,
    n_cells: usize,
    patches: Vec<Patch>,
    topology_epoch: u64,
    geometry_epoch: u64,
}

impl PolyMesh {
    /// 创建网格并校验拓扑
    ///
    /// # 参数
    ///
    /// - `points`: 点坐标
    /// - `faces`: 每个面的点索引（右手法则法向指向 owner 外侧）
    /// - `owner`: 每个面的 owner 单元
    /// - `neighbour`: 每个内部面的 neighbour 单元，长度即内部面数
    /// - `n_cells`: 单元数
    /// - `patches`: 边界面片
    pub fn new(
        points: Vec<DVec3>,
        faces: Vec<Vec<usize>>,
        owner: Vec<usize>,
        neighbour: Vec<usize>,
        n_cells: usize,
        patches: Vec<Patch>,
    ) -> FvResult<Self> {
        let mesh = Self {
            points,
            faces,
            owner,
            neighbour,
            n_cells,
            patches,
            topology_epoch: 1,
            geometry_epoch: 1,
        };
        mesh.check_topology()?;
        Ok(mesh)
    }

    // =========================================================================
    // 尺寸
    // =========================================================================

    /// 点数
    #[inline]
    pub fn n_points(&self) -> usize {
        self.points.len()
    }

    /// 面总数
    #[inline]
    pub fn n_faces(&self) -> usize {
        self.faces.len()
    }

    /// 内部面数
    #[inline]
    pub fn n_internal_faces(&self) -> usize {
        self.neighbour.len()
    }

    /// 单元数
    #[inline]
    pub fn n_cells(&self) -> usize {
        self.n_cells
    }

    /// 面片数
    #[inline]
    pub fn n_patches(&self) -> usize {
        self.patches.len()
    }

    // =========================================================================
    // 访问
    // =========================================================================

    /// 点坐标
    #[inline]
    pub fn points(&self) -> &[DVec3] {
        &self.points
    }

    /// 面的点列表
    #[inline]
    pub fn faces(&self) -> &[Vec<usize>] {
        &self.faces
    }

    /// 面 owner
    #[inline]
    pub fn owner(&self) -> &[usize] {
        &self.owner
    }

    /// 内部面 neighbour
    #[inline]
    pub fn neighbour(&self) -> &[usize] {
        &self.neighbour
    }

    /// 边界面片
    #[inline]
    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }

    /// 按名称查找面片编号
    pub fn find_patch(&self, name: &str) -> Option<usize> {
        self.patches.iter().position(|p| p.name == name)
    }

    /// 面片的面到单元寻址（owner 的切片）
    #[inline]
    pub fn patch_face_cells(&self, patchi: usize) -> &[usize] {
        &self.owner[self.patches[patchi].range()]
    }

    /// 拓扑纪元
    #[inline]
    pub fn topology_epoch(&self) -> u64 {
        self.topology_epoch
    }

    /// 几何纪元
    #[inline]
    pub fn geometry_epoch(&self) -> u64 {
        self.geometry_epoch
    }

    /// 每个单元的面列表（CSR 格式：offsets, indices）
    pub fn cell_faces(&self) -> (Vec<usize>, Vec<usize>) {
        let mut counts = vec![0usize; self.n_cells + 1];
        for &c in &self.owner {
            counts[c + 1] += 1;
        }
        for &c in &self.neighbour {
            counts[c + 1] += 1;
        }
        for i in 0..self.n_cells {
            counts[i + 1] += counts[i];
        }
        let mut fill = counts.clone();
        let mut indices = vec![0usize; counts[self.n_cells]];
        for (facei, &c) in self.owner.iter().enumerate() {
            indices[fill[c]] = facei;
            fill[c] += 1;
        }
        for (facei, &c) in self.neighbour.iter().enumerate() {
            indices[fill[c]] = facei;
            fill[c] += 1;
        }
        (counts, indices)
    }

    // =========================================================================
    // 修改
    // =========================================================================

    /// 替换拓扑并递增拓扑纪元
    ///
    /// 校验失败时网格保持原状。
    pub fn reset_topology(
        &mut self,
        faces: Vec<Vec<usize>>,
        owner: Vec<usize>,
        neighbour: Vec<usize>,
        n_cells: usize,
        patches: Vec<Patch>,
    ) -> FvResult<()> {
        let candidate = Self {
            points: std::mem::take(&mut self.points),
            faces,
            owner,
            neighbour,
            n_cells,
            patches,
            topology_epoch: self.topology_epoch + 1,
            geometry_epoch: self.geometry_epoch + 1,
        };
        if let Err(e) = candidate.check_topology() {
            self.points = candidate.points;
            return Err(e);
        }
        *self = candidate;
        log::debug!("网格拓扑已更新, 纪元 {}", self.topology_epoch);
        Ok(())
    }

    /// 移动点坐标（不改变拓扑）
    pub fn move_points(&mut self, points: Vec<DVec3>) -> FvResult<()> {
        FvError::check_size("points", self.points.len(), points.len())?;
        self.points = points;
        self.geometry_epoch += 1;
        Ok(())
    }

    /// 标记拓扑已变化（例如外部修改了面片的耦合关系）
    pub fn bump_topology_epoch(&mut self) {
        self.topology_epoch += 1;
        self.geometry_epoch += 1;
    }

    // =========================================================================
    // 拓扑校验
    // =========================================================================

    /// 校验全部拓扑不变量
    pub fn check_topology(&self) -> FvResult<()> {
        const OP: &str = "check_topology";
        let n_faces = self.faces.len();
        let n_internal = self.neighbour.len();

        if self.owner.len() != n_faces {
            return Err(FvError::topology(
                OP,
                format!("owner 长度 {} 与面数 {} 不一致", self.owner.len(), n_faces),
            ));
        }
        if n_internal > n_faces {
            return Err(FvError::topology(
                OP,
                format!("内部面数 {} 超过面总数 {}", n_internal, n_faces),
            ));
        }

        for (facei, face) in self.faces.iter().enumerate() {
            if face.len() < 3 {
                return Err(FvError::topology(
                    OP,
                    format!("面 {} 只有 {} 个点", facei, face.len()),
                ));
            }
            if let Some(&p) = face.iter().find(|&&p| p >= self.points.len()) {
                return Err(FvError::topology(
                    OP,
                    format!("面 {} 引用了越界点 {} (点数 {})", facei, p, self.points.len()),
                ));
            }
        }

        for (facei, &own) in self.owner.iter().enumerate() {
            if own >= self.n_cells {
                return Err(FvError::topology(
                    OP,
                    format!("面 {} 的 owner {} 越界 (单元数 {})", facei, own, self.n_cells),
                ));
            }
        }

        let mut prev = (0usize, 0usize);
        for (facei, &nei) in self.neighbour.iter().enumerate() {
            let own = self.owner[facei];
            if nei >= self.n_cells {
                return Err(FvError::topology(
                    OP,
                    format!("面 {} 的 neighbour {} 越界 (单元数 {})", facei, nei, self.n_cells),
                ));
            }
            if own >= nei {
                return Err(FvError::topology(
                    OP,
                    format!("内部面 {} 违反 owner < neighbour: {} >= {}", facei, own, nei),
                ));
            }
            if facei > 0 && (own, nei) < prev {
                return Err(FvError::topology(
                    OP,
                    format!("内部面 {} 不满足上三角顺序: ({}, {}) 在 {:?} 之后", facei, own, nei, prev),
                ));
            }
            prev = (own, nei);
        }

        let mut expected_start = n_internal;
        for (patchi, patch) in self.patches.iter().enumerate() {
            if patch.start != expected_start {
                return Err(FvError::topology(
                    OP,
                    format!(
                        "面片 {} '{}' 起始面 {} 应为 {}",
                        patchi, patch.name, patch.start, expected_start
                    ),
                ));
            }
            expected_start += patch.size;

            if let PatchKind::Cyclic(info) = &patch.kind {
                let other = self.patches.get(info.neighbour_patch).ok_or_else(|| {
                    FvError::topology(
                        OP,
                        format!("循环面片 '{}' 的配对面片 {} 不存在", patch.name, info.neighbour_patch),
                    )
                })?;
                let back = match &other.kind {
                    PatchKind::Cyclic(o) => o.neighbour_patch,
                    _ => usize::MAX,
                };
                if back != patchi || other.size != patch.size || info.neighbour_patch == patchi {
                    return Err(FvError::topology(
                        OP,
                        format!("循环面片 '{}' 与 '{}' 配对不一致", patch.name, other.name),
                    ));
                }
            }
            if let PatchKind::Processor(info) = &patch.kind {
                if info.neighbour_cell_centres.len() != patch.size || info.my_proc == info.neighb_proc {
                    return Err(FvError::topology(
                        OP,
                        format!("处理器面片 '{}' 的邻居信息不一致", patch.name),
                    ));
                }
            }
        }
        if expected_start != n_faces {
            return Err(FvError::topology(
                OP,
                format!("面片覆盖到面 {}，但面总数为 {}", expected_start, n_faces),
            ));
        }

        let mut touched = vec![false; self.n_cells];
        for &c in self.owner.iter().chain(self.neighbour.iter()) {
            touched[c] = true;
        }
        if let Some(celli) = touched.iter().position(|t| !t) {
            return Err(FvError::topology(OP, format!("单元 {} 没有任何面", celli)));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 两个单元沿 x 排列的最小网格
    fn two_cells() -> (Vec<DVec3>, Vec<Vec<usize>>, Vec<usize>, Vec<usize>, Vec<Patch>) {
        let mut points = Vec::new();
        for k in 0..2 {
            for j in 0..2 {
                for i in 0..3 {
                    points.push(DVec3::new(i as f64, j as f64, k as f64));
                }
            }
        }
        let p = |i: usize, j: usize, k: usize| i + 3 * (j + 2 * k);
        let faces = vec![
            vec![p(1, 0, 0), p(1, 1, 0), p(1, 1, 1), p(1, 0, 1)],
            vec![p(0, 0, 0), p(0, 0, 1), p(0, 1, 1), p(0, 1, 0)],
            vec![p(2, 0, 0), p(2, 1, 0), p(2, 1, 1), p(2, 0, 1)],
        ];
        let owner = vec![0, 0, 1];
        let neighbour = vec![1];
        let patches = vec![Patch::new("ends", 1, 2, PatchKind::Patch)];
        (points, faces, owner, neighbour, patches)
    }

    #[test]
    fn test_valid_mesh() {
        let (pts, faces, own, nei, patches) = two_cells();
        let mesh = PolyMesh::new(pts, faces, own, nei, 2, patches).unwrap();
        assert_eq!(mesh.n_internal_faces(), 1);
        assert_eq!(mesh.patch_face_cells(0), &[0, 1]);
        assert_eq!(mesh.topology_epoch(), 1);

        let (offsets, indices) = mesh.cell_faces();
        assert_eq!(offsets, vec![0, 2, 4]);
        assert_eq!(&indices[0..2], &[0, 1]);
    }

    #[test]
    fn test_owner_not_less_than_neighbour_is_fatal() {
        let (pts, faces, _, _, patches) = two_cells();
        let err = PolyMesh::new(pts, faces, vec![1, 0, 1], vec![0], 2, patches).unwrap_err();
        assert!(matches!(err, FvError::Topology { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_out_of_range_cell_is_fatal() {
        let (pts, faces, _, _, patches) = two_cells();
        let err = PolyMesh::new(pts, faces, vec![0, 0, 5], vec![1], 2, patches).unwrap_err();
        assert!(err.to_string().contains("越界"));
    }

    #[test]
    fn test_patch_gap_is_fatal() {
        let (pts, faces, own, nei, _) = two_cells();
        let patches = vec![Patch::new("ends", 1, 1, PatchKind::Patch)];
        assert!(PolyMesh::new(pts, faces, own, nei, 2, patches).is_err());
    }

    #[test]
    fn test_reset_topology_bumps_epoch_and_rolls_back_on_error() {
        let (pts, faces, own, nei, patches) = two_cells();
        let mut mesh = PolyMesh::new(pts, faces.clone(), own.clone(), nei.clone(), 2, patches.clone())
            .unwrap();

        let bad = mesh.reset_topology(faces.clone(), vec![1, 0, 1], vec![0], 2, patches.clone());
        assert!(bad.is_err());
        assert_eq!(mesh.topology_epoch(), 1);
        assert_eq!(mesh.n_points(), 12);

        mesh.reset_topology(faces, own, nei, 2, patches).unwrap();
        assert_eq!(mesh.topology_epoch(), 2);
    }
}
