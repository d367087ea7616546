// crates/fv_mesh/src/patch.rs

//! 边界面片定义
//!
//! 边界面在面列表中按面片连续存放：`[n_internal_faces, n_faces)` 依次划分给各面片。

use glam::DVec3;
use std::ops::Range;

/// 处理器面片信息（邻居单元位于另一个分区）
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessorInfo {
    /// 本分区编号
    pub my_proc: usize,
    /// 邻居分区编号
    pub neighb_proc: usize,
    /// 每个面对侧单元的中心坐标
    pub neighbour_cell_centres: Vec<DVec3>,
}

/// 循环面片信息（邻居单元位于同一分区中配对面片的对应面）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CyclicInfo {
    /// 配对面片的编号
    pub neighbour_patch: usize,
}

/// 面片类型
#[derive(Debug, Clone, PartialEq)]
pub enum PatchKind {
    /// 普通边界
    Patch,
    /// 壁面
    Wall,
    /// 处理器间耦合面片
    Processor(ProcessorInfo),
    /// 平移周期耦合面片
    Cyclic(CyclicInfo),
}

impl PatchKind {
    /// 类型名
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Patch => "patch",
            Self::Wall => "wall",
            Self::Processor(_) => "processor",
            Self::Cyclic(_) => "cyclic",
        }
    }

    /// 是否为耦合面片
    #[inline]
    pub fn is_coupled(&self) -> bool {
        matches!(self, Self::Processor(_) | Self::Cyclic(_))
    }
}

/// 边界面片
#[derive(Debug, Clone, PartialEq)]
pub struct Patch {
    /// 名称
    pub name: String,
    /// 第一个面的全局编号
    pub start: usize,
    /// 面数
    pub size: usize,
    /// 类型
    pub kind: PatchKind,
}

impl Patch {
    /// 创建面片
    pub fn new(name: impl Into<String>, start: usize, size: usize, kind: PatchKind) -> Self {
        Self {
            name: name.into(),
            start,
            size,
            kind,
        }
    }

    /// 面的全局编号范围
    #[inline]
    pub fn range(&self) -> Range<usize> {
        self.start..self.start + self.size
    }

    /// 是否为耦合面片
    #[inline]
    pub fn is_coupled(&self) -> bool {
        self.kind.is_coupled()
    }
}
