// crates/fv_numerics/src/parallel/comm.rs

//! 分区间通信
//!
//! [`Communicator`] 只暴露按字节的点对点收发，类型化传输与全局归约都建立在其上：
//!
//! - [`SerialComm`]: 单分区，归约即本地值，任何点对点操作都是错误
//! - [`ThreadComm`]: 同进程多线程分区，每个有序分区对一条无界通道
//!
//! 归约在 0 号分区按分区编号顺序合并后广播，因此所有分区得到逐位相同的结果，
//! 与调度方式无关。
//!
//! # 示例
//!
//! ```rust
//! use fv_numerics::parallel::{reduce_sum, run_partitioned, Communicator};
//!
//! let sums = run_partitioned(3, |comm| reduce_sum(&comm, comm.rank() as f64 + 1.0)).unwrap();
//! assert_eq!(sums, vec![6.0; 3]);
//! ```

use std::time::Duration;

use bytemuck::Pod;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use fv_foundation::{FvError, FvResult, KahanSum, RuntimeScalar};

/// 界面交换消息标签
pub const TAG_INTERFACE: u32 = 1;
/// 归约消息标签
pub const TAG_REDUCE: u32 = 2;
/// 收集消息标签
pub const TAG_GATHER: u32 = 3;
/// 广播消息标签
pub const TAG_BROADCAST: u32 = 4;

/// 默认接收超时
pub const DEFAULT_RECV_TIMEOUT: Duration = Duration::from_secs(60);

/// 分区间通信器
///
/// 消息在每个有序分区对之间按发送顺序到达。发送不阻塞。
pub trait Communicator: Send + Sync {
    /// 本分区编号
    fn rank(&self) -> usize;

    /// 分区总数
    fn n_procs(&self) -> usize;

    /// 向 `to` 发送字节消息
    fn send_bytes(&self, to: usize, tag: u32, data: Vec<u8>) -> FvResult<()>;

    /// 从 `from` 接收下一条字节消息，标签必须匹配
    fn recv_bytes(&self, from: usize, tag: u32) -> FvResult<Vec<u8>>;

    /// 是否多分区
    fn is_parallel(&self) -> bool {
        self.n_procs() > 1
    }

    /// 是否为主分区
    fn is_master(&self) -> bool {
        self.rank() == 0
    }
}

// ============================================================
// 串行通信器
// ============================================================

/// 单分区通信器
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialComm;

impl Communicator for SerialComm {
    fn rank(&self) -> usize {
        0
    }

    fn n_procs(&self) -> usize {
        1
    }

    fn send_bytes(&self, to: usize, _tag: u32, _data: Vec<u8>) -> FvResult<()> {
        Err(FvError::communication(format!("串行通信器不能向分区 {} 发送", to)))
    }

    fn recv_bytes(&self, from: usize, _tag: u32) -> FvResult<Vec<u8>> {
        Err(FvError::communication(format!("串行通信器不能从分区 {} 接收", from)))
    }
}

// ============================================================
// 线程通信器
// ============================================================

#[derive(Debug)]
struct Message {
    tag: u32,
    payload: Vec<u8>,
}

/// 同进程线程分区通信器
///
/// 由 [`ThreadComm::world`] 成组创建，每个成员移交给一个分区线程。
#[derive(Debug)]
pub struct ThreadComm {
    rank: usize,
    n_procs: usize,
    senders: Vec<Sender<Message>>,
    receivers: Vec<Receiver<Message>>,
    timeout: Duration,
}

impl ThreadComm {
    /// 创建 `n_procs` 个互联的通信器
    pub fn world(n_procs: usize) -> Vec<ThreadComm> {
        let mut senders: Vec<Vec<Sender<Message>>> = (0..n_procs).map(|_| Vec::with_capacity(n_procs)).collect();
        let mut receivers: Vec<Vec<Receiver<Message>>> =
            (0..n_procs).map(|_| Vec::with_capacity(n_procs)).collect();
        for from in 0..n_procs {
            for to in 0..n_procs {
                let (tx, rx) = unbounded();
                senders[from].push(tx);
                receivers[to].push(rx);
            }
        }
        senders
            .into_iter()
            .zip(receivers)
            .enumerate()
            .map(|(rank, (senders, receivers))| ThreadComm {
                rank,
                n_procs,
                senders,
                receivers,
                timeout: DEFAULT_RECV_TIMEOUT,
            })
            .collect()
    }

    /// 设置接收超时
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn check_peer(&self, peer: usize) -> FvResult<()> {
        if peer >= self.n_procs {
            return Err(FvError::index_out_of_bounds("proc", peer, self.n_procs));
        }
        Ok(())
    }
}

impl Communicator for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn n_procs(&self) -> usize {
        self.n_procs
    }

    fn send_bytes(&self, to: usize, tag: u32, data: Vec<u8>) -> FvResult<()> {
        self.check_peer(to)?;
        self.senders[to]
            .send(Message { tag, payload: data })
            .map_err(|_| FvError::communication(format!("分区 {} -> {} 通道已关闭", self.rank, to)))
    }

    fn recv_bytes(&self, from: usize, tag: u32) -> FvResult<Vec<u8>> {
        self.check_peer(from)?;
        let msg = self.receivers[from].recv_timeout(self.timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout => FvError::communication(format!(
                "分区 {} 等待分区 {} 的消息 (标签 {}) 超时",
                self.rank, from, tag
            )),
            RecvTimeoutError::Disconnected => {
                FvError::communication(format!("分区 {} <- {} 通道已关闭", self.rank, from))
            }
        })?;
        if msg.tag != tag {
            return Err(FvError::communication(format!(
                "分区 {} 从分区 {} 收到标签 {}，期望 {}",
                self.rank, from, msg.tag, tag
            )));
        }
        Ok(msg.payload)
    }
}

/// 在 `n_procs` 个线程上运行同一分区程序，按分区编号返回结果
pub fn run_partitioned<T, F>(n_procs: usize, f: F) -> FvResult<Vec<T>>
where
    T: Send,
    F: Fn(ThreadComm) -> FvResult<T> + Sync,
{
    if n_procs == 0 {
        return Err(FvError::invalid_config("nProcs", "0", "分区数必须为正"));
    }
    let comms = ThreadComm::world(n_procs);
    std::thread::scope(|scope| {
        let f = &f;
        let handles: Vec<_> = comms
            .into_iter()
            .map(|comm| scope.spawn(move || f(comm)))
            .collect();
        handles
            .into_iter()
            .map(|h| {
                h.join()
                    .map_err(|_| FvError::communication("分区线程异常退出"))
                    .and_then(|r| r)
            })
            .collect()
    })
}

// ============================================================
// 类型化传输
// ============================================================

/// 发送 Pod 切片
pub fn send_slice<T: Pod>(comm: &dyn Communicator, to: usize, tag: u32, data: &[T]) -> FvResult<()> {
    comm.send_bytes(to, tag, bytemuck::cast_slice(data).to_vec())
}

/// 接收 Pod 向量
pub fn recv_vec<T: Pod>(comm: &dyn Communicator, from: usize, tag: u32) -> FvResult<Vec<T>> {
    let bytes = comm.recv_bytes(from, tag)?;
    let size = std::mem::size_of::<T>();
    if size == 0 || bytes.len() % size != 0 {
        return Err(FvError::communication(format!(
            "消息长度 {} 不是元素大小 {} 的整数倍",
            bytes.len(),
            size
        )));
    }
    let mut out = vec![T::zeroed(); bytes.len() / size];
    bytemuck::cast_slice_mut::<T, u8>(&mut out).copy_from_slice(&bytes);
    Ok(out)
}

// ============================================================
// 归约
// ============================================================

/// 逐元素全局归约，0 号分区按分区顺序合并
fn all_reduce<T: Pod>(comm: &dyn Communicator, local: &[T], combine: impl Fn(&mut [T], &[T])) -> FvResult<Vec<T>> {
    let n = comm.n_procs();
    if n == 1 {
        return Ok(local.to_vec());
    }
    if comm.is_master() {
        let mut acc = local.to_vec();
        for from in 1..n {
            let part: Vec<T> = recv_vec(comm, from, TAG_REDUCE)?;
            FvError::check_size("reduce", acc.len(), part.len())?;
            combine(&mut acc, &part);
        }
        for to in 1..n {
            send_slice(comm, to, TAG_BROADCAST, &acc)?;
        }
        Ok(acc)
    } else {
        send_slice(comm, 0, TAG_REDUCE, local)?;
        recv_vec(comm, 0, TAG_BROADCAST)
    }
}

/// 全局求和
pub fn reduce_sum<S: RuntimeScalar>(comm: &dyn Communicator, value: S) -> FvResult<S> {
    let parts = all_gather(comm, &[value])?;
    Ok(KahanSum::sum_iter(parts.into_iter().flatten()))
}

/// 多个量同时全局求和
pub fn reduce_sum_many<S: RuntimeScalar>(comm: &dyn Communicator, values: &[S]) -> FvResult<Vec<S>> {
    all_reduce(comm, values, |acc, part| {
        for (a, &p) in acc.iter_mut().zip(part) {
            *a += p;
        }
    })
}

/// 全局最大值
pub fn reduce_max<S: RuntimeScalar>(comm: &dyn Communicator, value: S) -> FvResult<S> {
    let out = all_reduce(comm, &[value], |acc, part| {
        if part[0] > acc[0] || part[0].is_nan() {
            acc[0] = part[0];
        }
    })?;
    Ok(out[0])
}

/// 全局整数求和
pub fn reduce_sum_usize(comm: &dyn Communicator, value: usize) -> FvResult<usize> {
    let out = all_reduce(comm, &[value], |acc, part| acc[0] += part[0])?;
    Ok(out[0])
}

/// 收集各分区的变长数组，所有分区得到按分区编号排列的结果
pub fn all_gather<T: Pod>(comm: &dyn Communicator, local: &[T]) -> FvResult<Vec<Vec<T>>> {
    let n = comm.n_procs();
    if n == 1 {
        return Ok(vec![local.to_vec()]);
    }
    if comm.is_master() {
        let mut parts = Vec::with_capacity(n);
        parts.push(local.to_vec());
        for from in 1..n {
            parts.push(recv_vec::<T>(comm, from, TAG_GATHER)?);
        }
        let lengths: Vec<usize> = parts.iter().map(Vec::len).collect();
        let flat: Vec<T> = parts.iter().flatten().copied().collect();
        for to in 1..n {
            send_slice(comm, to, TAG_BROADCAST, &lengths)?;
            send_slice(comm, to, TAG_BROADCAST, &flat)?;
        }
        Ok(parts)
    } else {
        send_slice(comm, 0, TAG_GATHER, local)?;
        let lengths: Vec<usize> = recv_vec(comm, 0, TAG_BROADCAST)?;
        let flat: Vec<T> = recv_vec(comm, 0, TAG_BROADCAST)?;
        FvError::check_size("all_gather", lengths.iter().sum(), flat.len())?;
        let mut parts = Vec::with_capacity(n);
        let mut offset = 0;
        for len in lengths {
            parts.push(flat[offset..offset + len].to_vec());
            offset += len;
        }
        Ok(parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_reductions() {
        let comm = SerialComm;
        assert_eq!(reduce_sum(&comm, 2.5f64).unwrap(), 2.5);
        assert_eq!(reduce_max(&comm, -1.0f32).unwrap(), -1.0);
        assert_eq!(all_gather(&comm, &[1usize, 2]).unwrap(), vec![vec![1, 2]]);
        assert!(comm.send_bytes(0, TAG_INTERFACE, vec![]).is_err());
    }

    #[test]
    fn test_thread_reductions_identical_on_all_ranks() {
        let results = run_partitioned(4, |comm| {
            let x = 0.1f64 * (comm.rank() as f64 + 1.0);
            let s = reduce_sum(&comm, x)?;
            let m = reduce_max(&comm, x)?;
            let many = reduce_sum_many(&comm, &[x, 1.0])?;
            Ok((s, m, many))
        })
        .unwrap();
        for r in &results {
            assert_eq!(r.0.to_bits(), results[0].0.to_bits());
            assert_eq!(r.1, 0.4);
            assert_eq!(r.2[1], 4.0);
        }
    }

    #[test]
    fn test_all_gather_variable_lengths() {
        let results = run_partitioned(3, |comm| {
            let local: Vec<usize> = (0..comm.rank()).collect();
            all_gather(&comm, &local)
        })
        .unwrap();
        for r in results {
            assert_eq!(r, vec![vec![], vec![0], vec![0, 1]]);
        }
    }

    #[test]
    fn test_point_to_point_and_tag_mismatch() {
        let results = run_partitioned(2, |comm| {
            let other = 1 - comm.rank();
            send_slice(&comm, other, TAG_INTERFACE, &[comm.rank() as f64])?;
            let got: Vec<f64> = recv_vec(&comm, other, TAG_INTERFACE)?;
            send_slice(&comm, other, TAG_REDUCE, &[0u8])?;
            let wrong = comm.recv_bytes(other, TAG_INTERFACE);
            Ok((got[0], wrong.is_err()))
        })
        .unwrap();
        assert_eq!(results, vec![(1.0, true), (0.0, true)]);
    }
}
