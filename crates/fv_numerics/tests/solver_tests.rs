// crates/fv_numerics/tests/solver_tests.rs
//!
//! 线性求解器测试
//!
//! 在代数系统与离散方程上检查各求解器的收敛、终止状态与名称解析。

use std::collections::BTreeMap;

use approx::assert_relative_eq;
use fv_config::{BoundarySpec, CommsType, LinearSolverControls, Precision};
use fv_foundation::FvError;
use fv_mesh::BlockMeshGenerator;
use fv_numerics::discretization::{fvm, ConvectionScheme, Diffusivity, FvMatrix, LaplacianScheme};
use fv_numerics::fields::{PatchFieldRegistry, SurfaceScalarField, VolScalarField};
use fv_numerics::ldu::{LduAddressing, LduMesh};
use fv_numerics::linear_algebra::{create_solver, resolve_controls, SolverStatus};
use fv_numerics::matrix::{LduMatrix, LinearSystem};
use fv_numerics::parallel::SerialComm;
use fv_numerics::FvMesh;
use glam::DVec3;

/// 两端固定值、其余零梯度
fn dirichlet_specs(mesh: &FvMesh, left: f64, right: f64) -> BTreeMap<String, BoundarySpec> {
    let mut specs: BTreeMap<String, BoundarySpec> = mesh
        .poly()
        .patches()
        .iter()
        .map(|p| (p.name.clone(), BoundarySpec::zero_gradient()))
        .collect();
    specs.insert("xMin".to_string(), BoundarySpec::fixed_value(left));
    specs.insert("xMax".to_string(), BoundarySpec::fixed_value(right));
    specs
}

fn block_mesh(cells: [usize; 3], lengths: [f64; 3]) -> FvMesh {
    let poly = BlockMeshGenerator::new(cells, lengths).build().unwrap();
    FvMesh::new(poly, &SerialComm, CommsType::NonBlocking).unwrap()
}

fn field(mesh: &FvMesh, left: f64, right: f64) -> VolScalarField {
    VolScalarField::uniform("T", mesh, 0.0, &dirichlet_specs(mesh, left, right), &PatchFieldRegistry::with_builtins())
        .unwrap()
}

/// `-∇²T = 0`
fn laplace_equation(psi: &VolScalarField, mesh: &FvMesh) -> FvMatrix {
    let mut eqn = fvm::laplacian(&Diffusivity::Uniform(1.0), psi, mesh, LaplacianScheme::Uncorrected).unwrap();
    eqn.negate();
    eqn
}

fn tridiagonal(n: usize) -> (LduMatrix, LduMesh) {
    let lower: Vec<usize> = (0..n - 1).collect();
    let upper: Vec<usize> = (1..n).collect();
    let mesh = LduMesh::uncoupled(LduAddressing::new(n, lower, upper, vec![], 0).unwrap()).unwrap();
    let m = LduMatrix::from_coeffs(mesh.addressing().clone(), vec![2.0; n], vec![-1.0; n - 1], None).unwrap();
    (m, mesh)
}

/// 初始残差已满足容差时不做迭代，迭代次数记为 0
#[test]
fn test_zero_source_zero_guess_converges_without_iterating() {
    let (m, mesh) = tridiagonal(8);
    let comm = SerialComm;
    let system = LinearSystem::uncoupled(&m, &mesh, &comm).unwrap();
    for name in ["PCG", "PBiCGStab", "smoothSolver", "GAMG"] {
        let controls = resolve_controls(&LinearSolverControls::new(name, 1e-8, 100)).unwrap();
        let mut psi = vec![0.0; 8];
        let perf = create_solver(&controls, &m)
            .unwrap()
            .solve("x", &system, &mut psi, &[0.0; 8])
            .unwrap();
        assert!(perf.converged(), "{}: {:?}", name, perf);
        assert_eq!(perf.n_iterations, 0, "{}", name);
        assert_eq!(perf.final_residual, 0.0, "{}", name);
        assert!(psi.iter().all(|&v| v == 0.0));
    }
}

#[test]
fn test_max_iter_zero_returns_guess_unchanged() {
    let (m, mesh) = tridiagonal(6);
    let comm = SerialComm;
    let system = LinearSystem::uncoupled(&m, &mesh, &comm).unwrap();
    for name in ["PCG", "smoothSolver"] {
        let controls = resolve_controls(&LinearSolverControls::new(name, 1e-8, 0)).unwrap();
        let guess: Vec<f64> = (0..6).map(|i| 0.1 * i as f64).collect();
        let mut psi = guess.clone();
        let perf = create_solver(&controls, &m)
            .unwrap()
            .solve("x", &system, &mut psi, &[1.0; 6])
            .unwrap();
        assert_eq!(perf.status, SolverStatus::MaxIterationsReached);
        assert_eq!(perf.n_iterations, 0);
        assert_eq!(psi, guess);
    }
}

#[test]
fn test_gauss_seidel_on_indefinite_matrix_diverges() {
    // [[0.1, 1], [1, 0.1]]：Gauss-Seidel 迭代矩阵谱半径为 100
    let mesh = LduMesh::uncoupled(LduAddressing::new(2, vec![0], vec![1], vec![], 0).unwrap()).unwrap();
    let m = LduMatrix::from_coeffs(mesh.addressing().clone(), vec![0.1, 0.1], vec![1.0], None).unwrap();
    let comm = SerialComm;
    let system = LinearSystem::uncoupled(&m, &mesh, &comm).unwrap();
    let controls = resolve_controls(
        &LinearSolverControls::new("smoothSolver", 1e-6, 100)
            .with_smoother("GaussSeidel")
            .with_divergence(10.0, 2),
    )
    .unwrap();

    let mut psi = vec![0.0; 2];
    let perf = create_solver(&controls, &m)
        .unwrap()
        .solve("x", &system, &mut psi, &[1.0, 1.0])
        .unwrap();
    assert_eq!(perf.status, SolverStatus::Diverged);
    assert!(perf.n_iterations < 100);
    assert!(perf.final_residual > 10.0 * perf.initial_residual);
    assert!(!perf.converged());
}

#[test]
fn test_unknown_names_list_valid_choices() {
    match resolve_controls(&LinearSolverControls::new("ICCG", 1e-6, 10)) {
        Err(FvError::UnknownSelection { kind, name, valid }) => {
            assert_eq!(kind, "solver");
            assert_eq!(name, "ICCG");
            for expected in ["GAMG", "PBiCG", "PBiCGStab", "PCG", "diagonal", "smoothSolver"] {
                assert!(valid.iter().any(|v| v == expected), "缺少 {}", expected);
            }
        }
        other => panic!("意外结果: {:?}", other),
    }

    match resolve_controls(&LinearSolverControls::new("PCG", 1e-6, 10).with_preconditioner("ILU0")) {
        Err(FvError::UnknownSelection { kind, valid, .. }) => {
            assert_eq!(kind, "preconditioner");
            assert!(valid.iter().any(|v| v == "DIC"));
            assert!(valid.iter().any(|v| v == "DILU"));
        }
        other => panic!("意外结果: {:?}", other),
    }

    match resolve_controls(&LinearSolverControls::new("smoothSolver", 1e-6, 10).with_smoother("Jacobi")) {
        Err(FvError::UnknownSelection { kind, valid, .. }) => {
            assert_eq!(kind, "smoother");
            assert!(valid.iter().any(|v| v == "GaussSeidel"));
        }
        other => panic!("意外结果: {:?}", other),
    }
}

#[test]
fn test_pcg_rejects_asymmetric_matrix() {
    let mesh = block_mesh([5, 1, 1], [5.0, 1.0, 1.0]);
    let psi = field(&mesh, 0.0, 1.0);
    let phi = SurfaceScalarField::flux("phi", &mesh, DVec3::X);
    let m = fvm::div(&phi, &psi, &mesh, ConvectionScheme::Upwind).unwrap();
    let controls = resolve_controls(&LinearSolverControls::new("PCG", 1e-6, 10)).unwrap();
    let mut t = field(&mesh, 0.0, 1.0);
    let err = m.solve(&mut t, &mesh, &SerialComm, &controls, Precision::F64);
    assert!(matches!(err, Err(FvError::UnknownSelection { kind: "solver", .. })));
}

#[test]
fn test_chain_dirichlet_linear_profile() {
    let mesh = block_mesh([10, 1, 1], [1.0, 0.1, 0.1]);
    let mut psi = field(&mesh, 1.0, 3.0);
    let eqn = laplace_equation(&psi, &mesh);
    let controls = resolve_controls(&LinearSolverControls::new("PCG", 1e-12, 200)).unwrap();
    let perf = eqn.solve(&mut psi, &mesh, &SerialComm, &controls, Precision::F64).unwrap();
    assert!(perf.converged());
    assert!(perf.n_iterations <= 10);

    for (&t, c) in psi.internal().iter().zip(&mesh.geometry().cell_centres) {
        assert_relative_eq!(t, 1.0 + 2.0 * c.x, epsilon = 1e-6);
    }
}

/// `-∇²T + kT = k(a + b x)` 的精确解为 `T = a + b x`，线性剖面在均匀网格上离散无误差
#[test]
fn test_chain_linear_source_reproduces_profile() {
    let (a, b, k) = (1.0, 2.0, 5.0);
    let mesh = block_mesh([10, 1, 1], [1.0, 0.1, 0.1]);
    let rhs: Vec<f64> = mesh.geometry().cell_centres.iter().map(|c| k * (a + b * c.x)).collect();
    let reaction = vec![k; mesh.n_cells()];

    for name in ["PCG", "GAMG"] {
        let psi = field(&mesh, a, a + b);
        let mut by_term = laplace_equation(&psi, &mesh);
        by_term.add_assign(&fvm::sp(&reaction, &psi, &mesh).unwrap()).unwrap();
        let mut by_source = by_term.clone();
        by_term.sub_assign(&fvm::su(&rhs, &psi, &mesh).unwrap()).unwrap();
        by_source.sub_explicit(&rhs, &mesh).unwrap();
        assert!(by_term.ldu().is_symmetric());

        let controls = resolve_controls(&LinearSolverControls::new(name, 1e-12, 500)).unwrap();
        for eqn in [by_term, by_source] {
            let mut t = field(&mesh, a, a + b);
            let perf = eqn.solve(&mut t, &mesh, &SerialComm, &controls, Precision::F64).unwrap();
            assert!(perf.converged(), "{}: {:?}", name, perf);
            assert!(perf.n_iterations > 0);
            for (&v, c) in t.internal().iter().zip(&mesh.geometry().cell_centres) {
                assert_relative_eq!(v, a + b * c.x, epsilon = 1e-6);
            }
        }
    }
}

#[test]
fn test_zero_convection_term_keeps_laplacian_symmetric() {
    let mesh = block_mesh([10, 1, 1], [1.0, 0.1, 0.1]);
    let psi = field(&mesh, 1.0, 3.0);
    let phi = SurfaceScalarField::flux("phi", &mesh, DVec3::ZERO);
    let mut eqn = laplace_equation(&psi, &mesh);
    let diag_before = eqn.ldu().diag().to_vec();
    let upper_before = eqn.ldu().upper().to_vec();
    assert!(eqn.ldu().is_symmetric());

    eqn.add_assign(&fvm::div(&phi, &psi, &mesh, ConvectionScheme::Upwind).unwrap())
        .unwrap();
    assert!(eqn.ldu().is_symmetric());
    assert_eq!(eqn.ldu().diag(), &diag_before[..]);
    assert_eq!(eqn.ldu().upper(), &upper_before[..]);

    let controls = resolve_controls(&LinearSolverControls::new("PCG", 1e-12, 200)).unwrap();
    let mut t = field(&mesh, 1.0, 3.0);
    let perf = eqn.solve(&mut t, &mesh, &SerialComm, &controls, Precision::F64).unwrap();
    assert!(perf.converged());
    for (&v, c) in t.internal().iter().zip(&mesh.geometry().cell_centres) {
        assert_relative_eq!(v, 1.0 + 2.0 * c.x, epsilon = 1e-6);
    }
}

#[test]
fn test_convection_diffusion_with_asymmetric_solvers() {
    let mesh = block_mesh([20, 1, 1], [1.0, 0.05, 0.05]);
    let psi = field(&mesh, 0.0, 1.0);
    let phi = SurfaceScalarField::flux("phi", &mesh, DVec3::new(2.0, 0.0, 0.0));

    // ∇·(φT) - ∇·(Γ∇T) = 0
    let mut eqn = fvm::div(&phi, &psi, &mesh, ConvectionScheme::Upwind).unwrap();
    eqn.sub_assign(&fvm::laplacian(&Diffusivity::Uniform(0.1), &psi, &mesh, LaplacianScheme::Uncorrected).unwrap())
        .unwrap();
    assert!(eqn.ldu().is_asymmetric());

    let mut solutions = Vec::new();
    for controls in [
        LinearSolverControls::new("PBiCG", 1e-12, 500).with_preconditioner("DILU"),
        LinearSolverControls::new("PBiCGStab", 1e-12, 500).with_preconditioner("DILU"),
        LinearSolverControls::new("PBiCGStab", 1e-12, 500).with_preconditioner("diagonal"),
    ] {
        let mut t = field(&mesh, 0.0, 1.0);
        let resolved = resolve_controls(&controls).unwrap();
        let perf = eqn.solve(&mut t, &mesh, &SerialComm, &resolved, Precision::F64).unwrap();
        assert!(perf.converged(), "{}: {:?}", controls.solver, perf);

        // 迎风格式有界且沿流向单调
        let values = t.internal();
        assert!(values.iter().all(|&v| (0.0..=1.0).contains(&v)));
        assert!(values.windows(2).all(|w| w[0] <= w[1] + 1e-12));
        solutions.push(values.to_vec());
    }
    for other in &solutions[1..] {
        for (a, b) in solutions[0].iter().zip(other) {
            assert_relative_eq!(*a, *b, epsilon = 1e-8);
        }
    }
}

#[test]
fn test_gamg_and_smooth_solver_match_pcg() {
    let mesh = block_mesh([8, 6, 1], [2.0, 1.5, 0.25]);
    let psi = field(&mesh, 0.0, 1.0);
    let eqn = laplace_equation(&psi, &mesh);

    let solve = |controls: LinearSolverControls| {
        let mut t = field(&mesh, 0.0, 1.0);
        let resolved = resolve_controls(&controls).unwrap();
        let perf = eqn.solve(&mut t, &mesh, &SerialComm, &resolved, Precision::F64).unwrap();
        assert!(perf.converged(), "{}: {:?}", controls.solver, perf);
        (t.internal().to_vec(), perf)
    };

    let (reference, _) = solve(LinearSolverControls::new("PCG", 1e-12, 500));
    let (gamg, gamg_perf) = solve(LinearSolverControls::new("GAMG", 1e-10, 200));
    let (smooth, _) = solve(LinearSolverControls::new("smoothSolver", 1e-10, 20_000).with_smoother("symGaussSeidel"));
    assert_eq!(gamg_perf.solver_name, "GAMG");

    for ((r, g), s) in reference.iter().zip(&gamg).zip(&smooth) {
        assert_relative_eq!(*r, *g, epsilon = 1e-6);
        assert_relative_eq!(*r, *s, epsilon = 1e-6);
    }
}

#[test]
fn test_single_precision_solve_close_to_double() {
    let mesh = block_mesh([6, 4, 1], [3.0, 2.0, 1.0]);
    let psi = field(&mesh, -1.0, 2.0);
    let mut eqn = laplace_equation(&psi, &mesh);
    eqn.sub_explicit(&vec![0.5; mesh.n_cells()], &mesh).unwrap();

    let mut t64 = field(&mesh, -1.0, 2.0);
    let c64 = resolve_controls(&LinearSolverControls::new("PCG", 1e-12, 200)).unwrap();
    eqn.solve(&mut t64, &mesh, &SerialComm, &c64, Precision::F64).unwrap();

    let mut t32 = field(&mesh, -1.0, 2.0);
    let c32 = resolve_controls(&LinearSolverControls::new("PCG", 1e-5, 200)).unwrap();
    let perf = eqn.solve(&mut t32, &mesh, &SerialComm, &c32, Precision::F32).unwrap();
    assert!(perf.converged());
    for (a, b) in t64.internal().iter().zip(t32.internal()) {
        assert_relative_eq!(*a, *b, epsilon = 1e-3);
    }
}
