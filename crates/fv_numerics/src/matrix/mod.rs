// crates/fv_numerics/src/matrix/mod.rs

//! LDU 矩阵与线性系统

pub mod ldu_matrix;
pub mod linear_system;

pub use ldu_matrix::LduMatrix;
pub use linear_system::LinearSystem;
