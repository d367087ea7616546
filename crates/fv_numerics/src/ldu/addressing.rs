// crates/fv_numerics/src/ldu/addressing.rs

//! LDU 寻址
//!
//! 内部面 `f` 连接 `lower[f] < upper[f]` 两个单元，面按上三角顺序排列：
//! `lower` 非递减，`lower` 相同的面 `upper` 非递减。由此派生：
//!
//! - `owner_start`: 单元作为 lower 的面区间起点（长度 `n_cells + 1`）
//! - `losort`: 按 upper 稳定排序后的面编号
//! - `losort_start`: 单元作为 upper 的面在 `losort` 中的区间起点
//!
//! 违反上三角顺序的输入是拓扑错误，这里不做重排。

use fv_foundation::{FvError, FvResult};
use fv_mesh::PolyMesh;

/// LDU 寻址
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LduAddressing {
    n_cells: usize,
    lower: Vec<usize>,
    upper: Vec<usize>,
    patch_addr: Vec<Vec<usize>>,
    losort: Vec<usize>,
    owner_start: Vec<usize>,
    losort_start: Vec<usize>,
    epoch: u64,
}

impl LduAddressing {
    /// 由原始数组构建并校验
    ///
    /// # 错误
    ///
    /// 长度不一致、单元越界、`lower >= upper` 或违反上三角顺序时返回拓扑错误。
    pub fn new(
        n_cells: usize,
        lower: Vec<usize>,
        upper: Vec<usize>,
        patch_addr: Vec<Vec<usize>>,
        epoch: u64,
    ) -> FvResult<Self> {
        const OP: &str = "ldu_addressing";
        if lower.len() != upper.len() {
            return Err(FvError::topology(
                OP,
                format!("lower 长度 {} 与 upper 长度 {} 不一致", lower.len(), upper.len()),
            ));
        }
        for (facei, (&l, &u)) in lower.iter().zip(&upper).enumerate() {
            if u >= n_cells {
                return Err(FvError::topology(OP, format!("面 {} 的 upper {} 越界 ({} 单元)", facei, u, n_cells)));
            }
            if l >= u {
                return Err(FvError::topology(OP, format!("面 {} 的 lower {} 不小于 upper {}", facei, l, u)));
            }
        }
        for facei in 1..lower.len() {
            let prev = (lower[facei - 1], upper[facei - 1]);
            let cur = (lower[facei], upper[facei]);
            if cur < prev {
                return Err(FvError::topology(
                    OP,
                    format!("面 {} {:?} 排在面 {} {:?} 之后，不满足上三角顺序", facei, cur, facei - 1, prev),
                ));
            }
        }
        for (patchi, cells) in patch_addr.iter().enumerate() {
            if let Some(&c) = cells.iter().find(|&&c| c >= n_cells) {
                return Err(FvError::topology(OP, format!("面片 {} 引用越界单元 {}", patchi, c)));
            }
        }

        let owner_start = Self::calc_start(n_cells, &lower);

        let mut losort: Vec<usize> = (0..upper.len()).collect();
        losort.sort_by_key(|&f| upper[f]);
        let sorted_upper: Vec<usize> = losort.iter().map(|&f| upper[f]).collect();
        let losort_start = Self::calc_start(n_cells, &sorted_upper);

        Ok(Self {
            n_cells,
            lower,
            upper,
            patch_addr,
            losort,
            owner_start,
            losort_start,
            epoch,
        })
    }

    /// 由网格构建，纪元取网格拓扑纪元
    pub fn from_mesh(mesh: &PolyMesh) -> FvResult<Self> {
        let n_internal = mesh.n_internal_faces();
        let patch_addr = (0..mesh.n_patches())
            .map(|patchi| mesh.patch_face_cells(patchi).to_vec())
            .collect();
        Self::new(
            mesh.n_cells(),
            mesh.owner()[..n_internal].to_vec(),
            mesh.neighbour().to_vec(),
            patch_addr,
            mesh.topology_epoch(),
        )
    }

    /// 有序数组中每个值的区间起点
    fn calc_start(n_cells: usize, sorted: &[usize]) -> Vec<usize> {
        let mut start = vec![0usize; n_cells + 1];
        for &c in sorted {
            start[c + 1] += 1;
        }
        for c in 0..n_cells {
            start[c + 1] += start[c];
        }
        start
    }

    /// 单元数（矩阵维数）
    #[inline]
    pub fn size(&self) -> usize {
        self.n_cells
    }

    /// 内部面数（非对角系数个数）
    #[inline]
    pub fn n_faces(&self) -> usize {
        self.lower.len()
    }

    /// 面片数
    #[inline]
    pub fn n_patches(&self) -> usize {
        self.patch_addr.len()
    }

    /// lower 寻址
    #[inline]
    pub fn lower_addr(&self) -> &[usize] {
        &self.lower
    }

    /// upper 寻址
    #[inline]
    pub fn upper_addr(&self) -> &[usize] {
        &self.upper
    }

    /// 面片的面相邻单元
    #[inline]
    pub fn patch_addr(&self, patchi: usize) -> &[usize] {
        &self.patch_addr[patchi]
    }

    /// 按 upper 排序的面编号
    #[inline]
    pub fn losort_addr(&self) -> &[usize] {
        &self.losort
    }

    /// 单元作为 lower 的面区间起点
    #[inline]
    pub fn owner_start_addr(&self) -> &[usize] {
        &self.owner_start
    }

    /// 单元在 losort 中的区间起点
    #[inline]
    pub fn losort_start_addr(&self) -> &[usize] {
        &self.losort_start
    }

    /// 构建时的拓扑纪元
    #[inline]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// 单元作为 lower 的面
    #[inline]
    pub fn owned_faces(&self, celli: usize) -> std::ops::Range<usize> {
        self.owner_start[celli]..self.owner_start[celli + 1]
    }

    /// 单元作为 upper 的面
    pub fn neighbour_faces(&self, celli: usize) -> impl Iterator<Item = usize> + '_ {
        self.losort[self.losort_start[celli]..self.losort_start[celli + 1]]
            .iter()
            .copied()
    }

    /// 两个寻址的面连接关系是否相同
    pub fn same_structure(&self, other: &LduAddressing) -> bool {
        self.n_cells == other.n_cells && self.lower == other.lower && self.upper == other.upper
    }

    /// 矩阵带宽（最大 `upper - lower`）
    pub fn bandwidth(&self) -> usize {
        self.lower
            .iter()
            .zip(&self.upper)
            .map(|(&l, &u)| u - l)
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(n: usize) -> LduAddressing {
        let lower: Vec<usize> = (0..n - 1).collect();
        let upper: Vec<usize> = (1..n).collect();
        LduAddressing::new(n, lower, upper, vec![vec![0], vec![n - 1]], 1).unwrap()
    }

    #[test]
    fn test_chain_starts() {
        let addr = chain(4);
        assert_eq!(addr.owner_start_addr(), &[0, 1, 2, 3, 3]);
        assert_eq!(addr.losort_addr(), &[0, 1, 2]);
        assert_eq!(addr.losort_start_addr(), &[0, 0, 1, 2, 3]);
        assert_eq!(addr.bandwidth(), 1);
    }

    #[test]
    fn test_losort_groups_by_upper() {
        // 0-1, 0-3, 1-2, 2-3
        let addr = LduAddressing::new(4, vec![0, 0, 1, 2], vec![1, 3, 2, 3], vec![], 1).unwrap();
        assert_eq!(addr.losort_addr(), &[0, 2, 1, 3]);
        assert_eq!(addr.losort_start_addr(), &[0, 0, 1, 2, 4]);
        assert_eq!(addr.neighbour_faces(3).collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(addr.owned_faces(0), 0..2);
    }

    #[test]
    fn test_out_of_order_rejected() {
        let err = LduAddressing::new(3, vec![1, 0], vec![2, 1], vec![], 1).unwrap_err();
        assert!(matches!(err, FvError::Topology { .. }));
        let err = LduAddressing::new(3, vec![0, 0], vec![2, 1], vec![], 1).unwrap_err();
        assert!(matches!(err, FvError::Topology { .. }));
    }

    #[test]
    fn test_invalid_faces_rejected() {
        assert!(LduAddressing::new(2, vec![1], vec![1], vec![], 1).is_err());
        assert!(LduAddressing::new(2, vec![0], vec![2], vec![], 1).is_err());
        assert!(LduAddressing::new(2, vec![0, 0], vec![1], vec![], 1).is_err());
        assert!(LduAddressing::new(2, vec![], vec![], vec![vec![5]], 1).is_err());
    }

    #[test]
    fn test_no_faces() {
        let addr = LduAddressing::new(1, vec![], vec![], vec![vec![0; 6]], 1).unwrap();
        assert_eq!(addr.n_faces(), 0);
        assert_eq!(addr.owner_start_addr(), &[0, 0]);
        assert_eq!(addr.patch_addr(0).len(), 6);
    }
}
