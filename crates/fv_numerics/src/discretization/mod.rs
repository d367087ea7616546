// crates/fv_numerics/src/discretization/mod.rs

//! 有限体积离散
//!
//! - [`fvm`]: 隐式算子，生成 [`FvMatrix`]
//! - [`fvc`]: 显式算子，直接计算导出场
//!
//! ```text
//! let mut eqn = fvm::ddt(&T, &mesh, dt)?;
//! eqn.sub_assign(&fvm::laplacian(&Diffusivity::Uniform(k), &T, &mesh, scheme)?)?;
//! eqn.solve(&mut T, &mesh, comm, &controls, precision)?;
//! ```

pub mod fv_matrix;
pub mod fvc;
pub mod fvm;

pub use fv_matrix::FvMatrix;
pub use fvm::{ConvectionScheme, Diffusivity, LaplacianScheme};
