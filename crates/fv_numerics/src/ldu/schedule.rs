// crates/fv_numerics/src/ldu/schedule.rs

//! 界面更新调度
//!
//! 调度是一串 `(面片, 阶段)` 条目，阶段为发送（init）或接收更新（update）。
//! 矩阵乘与边界条件更新都按条目顺序执行，因此所有分区的消息顺序一致。
//!
//! - `Blocking` / `NonBlocking`: 先全部发送，再按面片顺序全部接收
//! - `Scheduled`: 分区对图按贪心边着色分成若干轮，每轮每个分区最多与一个
//!   邻居通信；编号较小的分区先发后收，较大的先收后发。周期界面排在最前

use std::collections::BTreeSet;

use fv_config::CommsType;
use fv_foundation::{FvError, FvResult};

use super::interfaces::LduInterface;
use crate::parallel::comm::{all_gather, Communicator};

/// 调度条目
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleEntry {
    /// 面片编号
    pub patch: usize,
    /// `true` 为发送阶段，`false` 为接收更新阶段
    pub init: bool,
}

impl ScheduleEntry {
    fn init(patch: usize) -> Self {
        Self { patch, init: true }
    }

    fn update(patch: usize) -> Self {
        Self { patch, init: false }
    }
}

/// 界面更新调度
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceSchedule {
    comms_type: CommsType,
    entries: Vec<ScheduleEntry>,
    epoch: u64,
}

impl InterfaceSchedule {
    /// 为本分区的界面构建调度
    ///
    /// `Scheduled` 模式需要所有分区同时调用（内部收集分区对图）。
    pub fn build(
        comms_type: CommsType,
        interfaces: &[Option<LduInterface>],
        comm: &dyn Communicator,
        epoch: u64,
    ) -> FvResult<Self> {
        let entries = match comms_type {
            CommsType::Blocking | CommsType::NonBlocking => Self::all_then_all(interfaces),
            CommsType::Scheduled => Self::scheduled(interfaces, comm)?,
        };
        log::debug!(
            "分区 {} 界面调度 ({}): {} 条目",
            comm.rank(),
            comms_type,
            entries.len()
        );
        Ok(Self {
            comms_type,
            entries,
            epoch,
        })
    }

    fn all_then_all(interfaces: &[Option<LduInterface>]) -> Vec<ScheduleEntry> {
        let coupled: Vec<usize> = interfaces
            .iter()
            .enumerate()
            .filter_map(|(patchi, iface)| iface.as_ref().map(|_| patchi))
            .collect();
        coupled
            .iter()
            .map(|&p| ScheduleEntry::init(p))
            .chain(coupled.iter().map(|&p| ScheduleEntry::update(p)))
            .collect()
    }

    fn scheduled(interfaces: &[Option<LduInterface>], comm: &dyn Communicator) -> FvResult<Vec<ScheduleEntry>> {
        let me = comm.rank();
        let mut entries = Vec::new();

        for (patchi, iface) in interfaces.iter().enumerate() {
            if let Some(LduInterface::Cyclic(_)) = iface {
                entries.push(ScheduleEntry::init(patchi));
                entries.push(ScheduleEntry::update(patchi));
            }
        }

        let local: Vec<(usize, usize)> = interfaces
            .iter()
            .enumerate()
            .filter_map(|(patchi, iface)| iface.as_ref()?.neighb_proc().map(|nbr| (nbr, patchi)))
            .collect();
        let nbrs: Vec<usize> = local.iter().map(|&(nbr, _)| nbr).collect();
        let graph = all_gather(comm, &nbrs)?;

        let mut edges = BTreeSet::new();
        for (p, list) in graph.iter().enumerate() {
            for &q in list {
                let forward = list.iter().filter(|&&n| n == q).count();
                let backward = graph.get(q).map_or(0, |back| back.iter().filter(|&&n| n == p).count());
                if forward != backward {
                    return Err(FvError::topology(
                        "comm_schedule",
                        format!("分区 {} 有 {} 个界面指向分区 {}，对方有 {} 个反向界面", p, forward, q, backward),
                    ));
                }
                edges.insert((p.min(q), p.max(q)));
            }
        }
        let edges: Vec<(usize, usize)> = edges.into_iter().collect();

        // 同一对分区之间的多个界面按面片顺序依次配对
        for round in comm_rounds(comm.n_procs(), &edges) {
            for edge in round {
                let (a, b) = edges[edge];
                let other = match me {
                    m if m == a => b,
                    m if m == b => a,
                    _ => continue,
                };
                for &(_, patchi) in local.iter().filter(|&&(nbr, _)| nbr == other) {
                    if me < other {
                        entries.push(ScheduleEntry::init(patchi));
                        entries.push(ScheduleEntry::update(patchi));
                    } else {
                        entries.push(ScheduleEntry::update(patchi));
                        entries.push(ScheduleEntry::init(patchi));
                    }
                }
            }
        }

        let n_coupled = interfaces.iter().filter(|i| i.is_some()).count();
        if entries.len() != 2 * n_coupled {
            return Err(FvError::topology(
                "comm_schedule",
                format!("分区 {} 调度覆盖 {} 个条目，期望 {}", me, entries.len(), 2 * n_coupled),
            ));
        }
        Ok(entries)
    }

    /// 通信方式
    pub fn comms_type(&self) -> CommsType {
        self.comms_type
    }

    /// 调度条目
    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.entries
    }

    /// 构建时的拓扑纪元
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// 条目数
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 是否没有耦合界面
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 分区对图的贪心边着色
///
/// 按边顺序依次放入第一个两端都空闲的轮次。返回每轮的边编号。
/// 所有分区输入相同则输出相同。
pub fn comm_rounds(n_procs: usize, edges: &[(usize, usize)]) -> Vec<Vec<usize>> {
    let mut rounds: Vec<Vec<usize>> = Vec::new();
    let mut busy: Vec<Vec<bool>> = Vec::new();
    for (edgei, &(a, b)) in edges.iter().enumerate() {
        let slot = busy.iter().position(|used| !used[a] && !used[b]);
        let r = match slot {
            Some(r) => r,
            None => {
                rounds.push(Vec::new());
                busy.push(vec![false; n_procs]);
                rounds.len() - 1
            }
        };
        busy[r][a] = true;
        busy[r][b] = true;
        rounds[r].push(edgei);
    }
    rounds
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ldu::ProcessorInterface;
    use crate::parallel::comm::run_partitioned;

    #[test]
    fn test_rounds_are_matchings() {
        // 环 0-1-2-3-0 加对角 0-2
        let edges = vec![(0, 1), (0, 2), (0, 3), (1, 2), (2, 3)];
        let rounds = comm_rounds(4, &edges);
        let mut seen = vec![false; edges.len()];
        for round in &rounds {
            let mut used = [false; 4];
            for &e in round {
                let (a, b) = edges[e];
                assert!(!used[a] && !used[b]);
                used[a] = true;
                used[b] = true;
                seen[e] = true;
            }
        }
        assert!(seen.iter().all(|&s| s));
        assert_eq!(rounds[0], vec![0, 4]);
    }

    #[test]
    fn test_no_edges() {
        assert!(comm_rounds(3, &[]).is_empty());
    }

    fn processor(face_cells: Vec<usize>, me: usize, nbr: usize) -> Option<LduInterface> {
        Some(LduInterface::Processor(ProcessorInterface::new(face_cells, me, nbr)))
    }

    #[test]
    fn test_scheduled_pairs_several_patches_to_one_neighbour() {
        let results = run_partitioned(2, |comm| {
            let me = comm.rank();
            let other = 1 - me;
            // 面片 0 与 2 都连到对侧，面片 1 为普通边界
            let interfaces = vec![processor(vec![0], me, other), None, processor(vec![1], me, other)];
            let schedule = InterfaceSchedule::build(CommsType::Scheduled, &interfaces, &comm, 1)?;

            let internal = [10.0 * me as f64, 10.0 * me as f64 + 1.0];
            let mut received = vec![Vec::new(); interfaces.len()];
            for entry in schedule.entries() {
                let Some(iface) = &interfaces[entry.patch] else {
                    continue;
                };
                if entry.init {
                    iface.init_transfer(&comm, &internal)?;
                } else {
                    received[entry.patch] = iface.transfer(&comm, &internal)?;
                }
            }
            Ok((schedule.entries().to_vec(), received))
        })
        .unwrap();

        let (entries0, received0) = &results[0];
        assert_eq!(
            entries0,
            &vec![
                ScheduleEntry::init(0),
                ScheduleEntry::update(0),
                ScheduleEntry::init(2),
                ScheduleEntry::update(2)
            ]
        );
        assert_eq!(results[1].0[0], ScheduleEntry::update(0));
        // 第 k 个界面与对侧第 k 个界面交换
        assert_eq!(received0[0], vec![10.0]);
        assert_eq!(received0[2], vec![11.0]);
        assert_eq!(results[1].1[0], vec![0.0]);
        assert_eq!(results[1].1[2], vec![1.0]);
    }

    #[test]
    fn test_scheduled_rejects_unmatched_interface_count() {
        let results = run_partitioned(2, |comm| {
            let me = comm.rank();
            let interfaces = if me == 0 {
                vec![processor(vec![0], 0, 1), processor(vec![1], 0, 1)]
            } else {
                vec![processor(vec![0], 1, 0)]
            };
            let built = InterfaceSchedule::build(CommsType::Scheduled, &interfaces, &comm, 1);
            Ok(matches!(built, Err(FvError::Topology { .. })))
        })
        .unwrap();
        assert_eq!(results, vec![true, true]);
    }
}
