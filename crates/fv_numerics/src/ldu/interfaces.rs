// crates/fv_numerics/src/ldu/interfaces.rs

//! 耦合界面
//!
//! 耦合面片上的每个面把本侧单元与对侧单元（另一分区或配对周期面片）相连。
//! 交换分两步：
//!
//! 1. [`LduInterface::init_transfer`]: 发送本侧 `face_cells` 上的单元值
//! 2. [`LduInterface::transfer`]: 取得对侧单元值，第 i 个值对应本侧第 i 个面
//!
//! 周期界面在同一分区内直接读取，`init_transfer` 不做任何事。

use bytemuck::Pod;
use fv_foundation::{FvError, FvResult};
use fv_mesh::{PatchKind, PolyMesh};

use crate::parallel::comm::{recv_vec, send_slice, Communicator, TAG_INTERFACE};

/// 处理器界面
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorInterface {
    face_cells: Vec<usize>,
    my_proc: usize,
    neighb_proc: usize,
}

impl ProcessorInterface {
    /// 由面相邻单元与分区对创建
    pub fn new(face_cells: Vec<usize>, my_proc: usize, neighb_proc: usize) -> Self {
        Self {
            face_cells,
            my_proc,
            neighb_proc,
        }
    }

    /// 本分区编号
    pub fn my_proc(&self) -> usize {
        self.my_proc
    }

    /// 对侧分区编号
    pub fn neighb_proc(&self) -> usize {
        self.neighb_proc
    }
}

/// 周期界面
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CyclicInterface {
    face_cells: Vec<usize>,
    nbr_face_cells: Vec<usize>,
    neighbour_patch: usize,
}

impl CyclicInterface {
    /// 配对面片编号
    pub fn neighbour_patch(&self) -> usize {
        self.neighbour_patch
    }
}

/// 耦合界面
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LduInterface {
    /// 跨分区
    Processor(ProcessorInterface),
    /// 同分区周期配对
    Cyclic(CyclicInterface),
}

impl LduInterface {
    /// 为耦合面片创建界面，非耦合面片返回 `None`
    pub fn from_patch(mesh: &PolyMesh, patchi: usize) -> Option<Self> {
        let patch = &mesh.patches()[patchi];
        let face_cells = mesh.patch_face_cells(patchi).to_vec();
        match &patch.kind {
            PatchKind::Processor(info) => Some(LduInterface::Processor(ProcessorInterface {
                face_cells,
                my_proc: info.my_proc,
                neighb_proc: info.neighb_proc,
            })),
            PatchKind::Cyclic(info) => Some(LduInterface::Cyclic(CyclicInterface {
                face_cells,
                nbr_face_cells: mesh.patch_face_cells(info.neighbour_patch).to_vec(),
                neighbour_patch: info.neighbour_patch,
            })),
            PatchKind::Patch | PatchKind::Wall => None,
        }
    }

    /// 本侧面相邻单元
    pub fn face_cells(&self) -> &[usize] {
        match self {
            LduInterface::Processor(p) => &p.face_cells,
            LduInterface::Cyclic(c) => &c.face_cells,
        }
    }

    /// 面数
    pub fn size(&self) -> usize {
        self.face_cells().len()
    }

    /// 对侧分区（周期界面为 `None`）
    pub fn neighb_proc(&self) -> Option<usize> {
        match self {
            LduInterface::Processor(p) => Some(p.neighb_proc),
            LduInterface::Cyclic(_) => None,
        }
    }

    /// 发送阶段：把本侧单元值发往对侧
    pub fn init_transfer<T: Pod>(&self, comm: &dyn Communicator, internal: &[T]) -> FvResult<()> {
        match self {
            LduInterface::Processor(p) => {
                let values = gather(&p.face_cells, internal)?;
                send_slice(comm, p.neighb_proc, TAG_INTERFACE, &values)
            }
            LduInterface::Cyclic(_) => Ok(()),
        }
    }

    /// 接收阶段：返回对侧单元值
    pub fn transfer<T: Pod>(&self, comm: &dyn Communicator, internal: &[T]) -> FvResult<Vec<T>> {
        match self {
            LduInterface::Processor(p) => {
                let values: Vec<T> = recv_vec(comm, p.neighb_proc, TAG_INTERFACE)?;
                if values.len() != p.face_cells.len() {
                    return Err(FvError::communication(format!(
                        "分区 {} 从分区 {} 收到 {} 个界面值，期望 {}",
                        p.my_proc,
                        p.neighb_proc,
                        values.len(),
                        p.face_cells.len()
                    )));
                }
                Ok(values)
            }
            LduInterface::Cyclic(c) => gather(&c.nbr_face_cells, internal),
        }
    }
}

fn gather<T: Pod>(cells: &[usize], internal: &[T]) -> FvResult<Vec<T>> {
    cells
        .iter()
        .map(|&c| {
            internal
                .get(c)
                .copied()
                .ok_or_else(|| FvError::index_out_of_bounds("cell", c, internal.len()))
        })
        .collect()
}
