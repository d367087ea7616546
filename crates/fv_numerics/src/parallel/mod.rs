// crates/fv_numerics/src/parallel/mod.rs

//! 并行支持
//!
//! 每个分区在自己的线程上运行同一程序，分区之间只通过 [`Communicator`] 交换数据。

pub mod comm;

pub use comm::{
    all_gather, recv_vec, reduce_max, reduce_sum, reduce_sum_many, reduce_sum_usize, run_partitioned,
    send_slice, Communicator, SerialComm, ThreadComm, TAG_INTERFACE,
};
