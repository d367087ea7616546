// crates/fv_numerics/src/linear_algebra/smoother.rs

//! 光顺器
//!
//! 光顺器对 `A ψ = b` 做若干次廉价的不动点扫掠，供 smoothSolver 与 GAMG 使用。
//! 每次扫掠前都会做一次界面交换，使耦合系数作用在最新的对侧值上。

use fv_foundation::{FvResult, RuntimeScalar};

use super::preconditioner::{DicPreconditioner, DiluPreconditioner, LduPreconditioner};
use crate::matrix::LinearSystem;

/// 光顺器接口
pub trait LduSmoother<S: RuntimeScalar> {
    /// 名称
    fn name(&self) -> &'static str;

    /// 执行 `n_sweeps` 次扫掠
    fn smooth(&mut self, system: &LinearSystem<'_, S>, psi: &mut [S], source: &[S], n_sweeps: usize)
        -> FvResult<()>;
}

/// 界面对右端项的贡献：`b' = b + Σ bou * ψ_nbr`
fn interface_source<S: RuntimeScalar>(
    system: &LinearSystem<'_, S>,
    neg_bou: &[Vec<S>],
    psi: &[S],
    source: &[S],
    b_prime: &mut [S],
) -> FvResult<()> {
    b_prime.copy_from_slice(source);
    system.update_interfaces(neg_bou, psi, b_prime)
}

fn negated<S: RuntimeScalar>(coeffs: &[Vec<S>]) -> Vec<Vec<S>> {
    coeffs.iter().map(|c| c.iter().map(|&v| -v).collect()).collect()
}

// ============================================================
// Gauss-Seidel
// ============================================================

/// Gauss-Seidel 光顺
#[derive(Debug, Clone)]
pub struct GaussSeidelSmoother<S: RuntimeScalar> {
    neg_bou: Vec<Vec<S>>,
    b_prime: Vec<S>,
}

impl<S: RuntimeScalar> GaussSeidelSmoother<S> {
    /// 创建
    pub fn new(system: &LinearSystem<'_, S>) -> Self {
        Self {
            neg_bou: negated(system.interface_bou_coeffs()),
            b_prime: vec![S::ZERO; system.n_cells()],
        }
    }

    /// 按单元递增顺序扫掠一次
    fn forward_sweep(system: &LinearSystem<'_, S>, psi: &mut [S], b_prime: &mut [S]) {
        let matrix = system.matrix();
        let addr = matrix.addressing();
        let u = addr.upper_addr();
        let (diag, upper, lower) = (matrix.diag(), matrix.upper(), matrix.lower());
        for celli in 0..addr.size() {
            let faces = addr.owned_faces(celli);
            let mut psii = b_prime[celli];
            for f in faces.clone() {
                psii -= upper[f] * psi[u[f]];
            }
            psii /= diag[celli];
            for f in faces {
                b_prime[u[f]] -= lower[f] * psii;
            }
            psi[celli] = psii;
        }
    }
}

impl<S: RuntimeScalar> LduSmoother<S> for GaussSeidelSmoother<S> {
    fn name(&self) -> &'static str {
        "GaussSeidel"
    }

    fn smooth(&mut self, system: &LinearSystem<'_, S>, psi: &mut [S], source: &[S], n_sweeps: usize) -> FvResult<()> {
        for _ in 0..n_sweeps {
            interface_source(system, &self.neg_bou, psi, source, &mut self.b_prime)?;
            Self::forward_sweep(system, psi, &mut self.b_prime);
        }
        Ok(())
    }
}

/// 对称 Gauss-Seidel 光顺（正向后接反向）
#[derive(Debug, Clone)]
pub struct SymGaussSeidelSmoother<S: RuntimeScalar> {
    neg_bou: Vec<Vec<S>>,
    b_prime: Vec<S>,
}

impl<S: RuntimeScalar> SymGaussSeidelSmoother<S> {
    /// 创建
    pub fn new(system: &LinearSystem<'_, S>) -> Self {
        Self {
            neg_bou: negated(system.interface_bou_coeffs()),
            b_prime: vec![S::ZERO; system.n_cells()],
        }
    }

    fn backward_sweep(system: &LinearSystem<'_, S>, psi: &mut [S], b_prime: &[S]) {
        let matrix = system.matrix();
        let addr = matrix.addressing();
        let (l, u) = (addr.lower_addr(), addr.upper_addr());
        let (diag, upper, lower) = (matrix.diag(), matrix.upper(), matrix.lower());
        for celli in (0..addr.size()).rev() {
            let mut psii = b_prime[celli];
            for f in addr.owned_faces(celli) {
                psii -= upper[f] * psi[u[f]];
            }
            for f in addr.neighbour_faces(celli) {
                psii -= lower[f] * psi[l[f]];
            }
            psi[celli] = psii / diag[celli];
        }
    }
}

impl<S: RuntimeScalar> LduSmoother<S> for SymGaussSeidelSmoother<S> {
    fn name(&self) -> &'static str {
        "symGaussSeidel"
    }

    fn smooth(&mut self, system: &LinearSystem<'_, S>, psi: &mut [S], source: &[S], n_sweeps: usize) -> FvResult<()> {
        for _ in 0..n_sweeps {
            interface_source(system, &self.neg_bou, psi, source, &mut self.b_prime)?;
            GaussSeidelSmoother::forward_sweep(system, psi, &mut self.b_prime);

            interface_source(system, &self.neg_bou, psi, source, &mut self.b_prime)?;
            Self::backward_sweep(system, psi, &self.b_prime);
        }
        Ok(())
    }
}

// ============================================================
// 基于预条件器的光顺
// ============================================================

/// DIC 光顺
pub type DicSmoother<'a, S> = CorrectionSmoother<DicPreconditioner<'a, S>, S>;
/// DILU 光顺
pub type DiluSmoother<'a, S> = CorrectionSmoother<DiluPreconditioner<'a, S>, S>;

/// `ψ += M⁻¹ (b - Aψ)` 形式的光顺
#[derive(Debug, Clone)]
pub struct CorrectionSmoother<P, S: RuntimeScalar> {
    preconditioner: P,
    r: Vec<S>,
    w: Vec<S>,
}

impl<P: LduPreconditioner<S>, S: RuntimeScalar> CorrectionSmoother<P, S> {
    /// 以预条件器创建
    pub fn new(preconditioner: P, n_cells: usize) -> Self {
        Self {
            preconditioner,
            r: vec![S::ZERO; n_cells],
            w: vec![S::ZERO; n_cells],
        }
    }
}

impl<P: LduPreconditioner<S>, S: RuntimeScalar> LduSmoother<S> for CorrectionSmoother<P, S> {
    fn name(&self) -> &'static str {
        self.preconditioner.name()
    }

    fn smooth(&mut self, system: &LinearSystem<'_, S>, psi: &mut [S], source: &[S], n_sweeps: usize) -> FvResult<()> {
        for _ in 0..n_sweeps {
            system.residual(psi, source, &mut self.r)?;
            self.preconditioner.precondition(&mut self.w, &self.r);
            for (p, &w) in psi.iter_mut().zip(&self.w) {
                *p += w;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ldu::{LduAddressing, LduMesh};
    use crate::matrix::LduMatrix;
    use crate::parallel::SerialComm;

    fn system_parts(n: usize) -> (LduMatrix, LduMesh) {
        let addr = LduAddressing::new(n, (0..n - 1).collect(), (1..n).collect(), vec![], 1).unwrap();
        let mesh = LduMesh::uncoupled(addr).unwrap();
        let m = LduMatrix::from_coeffs(mesh.addressing().clone(), vec![4.0; n], vec![-1.0; n - 1], None).unwrap();
        (m, mesh)
    }

    fn residual_norm(sys: &LinearSystem<'_, f64>, psi: &[f64], b: &[f64]) -> f64 {
        let mut r = vec![0.0; psi.len()];
        sys.residual(psi, b, &mut r).unwrap();
        r.iter().map(|x| x.abs()).sum()
    }

    #[test]
    fn test_smoothers_reduce_residual() {
        let (m, mesh) = system_parts(8);
        let comm = SerialComm;
        let sys = LinearSystem::uncoupled(&m, &mesh, &comm).unwrap();
        let b = vec![1.0; 8];
        let r0 = residual_norm(&sys, &vec![0.0; 8], &b);

        let mut smoothers: Vec<Box<dyn LduSmoother<f64> + '_>> = vec![
            Box::new(GaussSeidelSmoother::new(&sys)),
            Box::new(SymGaussSeidelSmoother::new(&sys)),
            Box::new(DicSmoother::new(DicPreconditioner::new(&m), 8)),
            Box::new(DiluSmoother::new(DiluPreconditioner::new(&m), 8)),
        ];
        for s in smoothers.iter_mut() {
            let mut psi = vec![0.0; 8];
            s.smooth(&sys, &mut psi, &b, 3).unwrap();
            let r = residual_norm(&sys, &psi, &b);
            assert!(r < 0.1 * r0, "{} 残差 {} / {}", s.name(), r, r0);
        }
    }

    #[test]
    fn test_gauss_seidel_fixed_point() {
        let (m, mesh) = system_parts(4);
        let comm = SerialComm;
        let sys = LinearSystem::uncoupled(&m, &mesh, &comm).unwrap();
        let exact = [1.0, 2.0, 3.0, 4.0];
        let mut b = vec![0.0; 4];
        sys.amul(&exact, &mut b).unwrap();
        let mut psi = exact.to_vec();
        GaussSeidelSmoother::new(&sys).smooth(&sys, &mut psi, &b, 2).unwrap();
        for (p, e) in psi.iter().zip(&exact) {
            assert!((p - e).abs() < 1e-12);
        }
    }
}
