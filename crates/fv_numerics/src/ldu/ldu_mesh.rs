// crates/fv_numerics/src/ldu/ldu_mesh.rs

//! LDU 网格视图
//!
//! 把寻址、耦合界面与调度打包在一起，三者共享同一个拓扑纪元。
//! 内容通过 `Arc` 共享，克隆很廉价；矩阵持有寻址的 `Arc` 用于装配一致性检查。

use std::sync::Arc;

use fv_config::CommsType;
use fv_foundation::FvResult;
use fv_mesh::PolyMesh;

use super::addressing::LduAddressing;
use super::interfaces::LduInterface;
use super::schedule::InterfaceSchedule;
use crate::parallel::comm::{Communicator, SerialComm};

/// LDU 网格视图
#[derive(Debug, Clone)]
pub struct LduMesh {
    addressing: Arc<LduAddressing>,
    interfaces: Arc<Vec<Option<LduInterface>>>,
    schedule: Arc<InterfaceSchedule>,
}

impl LduMesh {
    /// 由网格构建
    ///
    /// `Scheduled` 模式下所有分区必须同时调用。
    pub fn build(mesh: &PolyMesh, comm: &dyn Communicator, comms_type: CommsType) -> FvResult<Self> {
        let addressing = LduAddressing::from_mesh(mesh)?;
        let interfaces: Vec<Option<LduInterface>> = (0..mesh.n_patches())
            .map(|patchi| LduInterface::from_patch(mesh, patchi))
            .collect();
        let schedule = InterfaceSchedule::build(comms_type, &interfaces, comm, addressing.epoch())?;
        log::debug!(
            "LDU 网格: {} 单元, {} 内部面, {} 耦合界面, 纪元 {}",
            addressing.size(),
            addressing.n_faces(),
            interfaces.iter().filter(|i| i.is_some()).count(),
            addressing.epoch()
        );
        Ok(Self {
            addressing: Arc::new(addressing),
            interfaces: Arc::new(interfaces),
            schedule: Arc::new(schedule),
        })
    }

    /// 不含耦合界面的视图（代数测试与多重网格粗层）
    pub fn uncoupled(addressing: LduAddressing) -> FvResult<Self> {
        let interfaces = vec![None; addressing.n_patches()];
        let schedule = InterfaceSchedule::build(CommsType::NonBlocking, &interfaces, &SerialComm, addressing.epoch())?;
        Ok(Self {
            addressing: Arc::new(addressing),
            interfaces: Arc::new(interfaces),
            schedule: Arc::new(schedule),
        })
    }

    /// 寻址
    #[inline]
    pub fn addressing(&self) -> &Arc<LduAddressing> {
        &self.addressing
    }

    /// 每个面片的耦合界面（非耦合面片为 `None`）
    #[inline]
    pub fn interfaces(&self) -> &[Option<LduInterface>] {
        &self.interfaces
    }

    /// 界面调度
    #[inline]
    pub fn schedule(&self) -> &InterfaceSchedule {
        &self.schedule
    }

    /// 单元数
    #[inline]
    pub fn n_cells(&self) -> usize {
        self.addressing.size()
    }

    /// 拓扑纪元
    #[inline]
    pub fn epoch(&self) -> u64 {
        self.addressing.epoch()
    }

    /// 是否存在耦合界面
    pub fn has_interfaces(&self) -> bool {
        self.interfaces.iter().any(Option::is_some)
    }

    /// 与网格当前拓扑相比是否过期
    pub fn is_stale(&self, mesh: &PolyMesh) -> bool {
        self.epoch() != mesh.topology_epoch()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fv_mesh::BlockMeshGenerator;

    #[test]
    fn test_rebuild_is_identical() {
        let mesh = BlockMeshGenerator::new([3, 2, 2], [1.0; 3]).build().unwrap();
        let a = LduMesh::build(&mesh, &SerialComm, CommsType::NonBlocking).unwrap();
        let b = LduMesh::build(&mesh, &SerialComm, CommsType::NonBlocking).unwrap();
        assert_eq!(*a.addressing(), *b.addressing());
        assert!(!a.has_interfaces());
        assert!(a.schedule().is_empty());
    }

    #[test]
    fn test_stale_after_topology_change() {
        let mut mesh = BlockMeshGenerator::chain(4, 1.0).build().unwrap();
        let ldu = LduMesh::build(&mesh, &SerialComm, CommsType::Blocking).unwrap();
        assert!(!ldu.is_stale(&mesh));
        mesh.bump_topology_epoch();
        assert!(ldu.is_stale(&mesh));
    }

    #[test]
    fn test_cyclic_schedule_serial() {
        let mesh = BlockMeshGenerator::chain(4, 1.0).with_cyclic_x().build().unwrap();
        for comms in [CommsType::Blocking, CommsType::Scheduled, CommsType::NonBlocking] {
            let ldu = LduMesh::build(&mesh, &SerialComm, comms).unwrap();
            assert_eq!(ldu.schedule().len(), 4);
            assert!(ldu.has_interfaces());
        }
    }
}
