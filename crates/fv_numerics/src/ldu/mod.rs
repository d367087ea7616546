// crates/fv_numerics/src/ldu/mod.rs

//! LDU 寻址与耦合界面
//!
//! # 架构设计
//!
//! ```text
//! PolyMesh ──> LduAddressing (lower/upper/losort/ownerStart)
//!          ──> LduInterface  (processor / cyclic)
//!          ──> InterfaceSchedule (init/update 条目序列)
//!                    │
//!                    └──> LduMesh (Arc 共享，按拓扑纪元失效)
//! ```

pub mod addressing;
pub mod interfaces;
pub mod ldu_mesh;
pub mod schedule;

pub use addressing::LduAddressing;
pub use interfaces::{CyclicInterface, LduInterface, ProcessorInterface};
pub use ldu_mesh::LduMesh;
pub use schedule::{comm_rounds, InterfaceSchedule, ScheduleEntry};
