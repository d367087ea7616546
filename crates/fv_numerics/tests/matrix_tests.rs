// crates/fv_numerics/tests/matrix_tests.rs
//!
//! 矩阵装配测试
//!
//! 验证乘法线性、零项恒等、周期界面行和与纪元失效检测。

use std::collections::BTreeMap;

use approx::assert_relative_eq;
use fv_config::{BoundarySpec, CommsType, LinearSolverControls, Precision};
use fv_foundation::FvError;
use fv_mesh::BlockMeshGenerator;
use fv_numerics::discretization::{fvm, ConvectionScheme, Diffusivity, FvMatrix, LaplacianScheme};
use fv_numerics::fields::{PatchFieldRegistry, SurfaceScalarField, VolScalarField};
use fv_numerics::linear_algebra::resolve_controls;
use fv_numerics::matrix::{LduMatrix, LinearSystem};
use fv_numerics::parallel::SerialComm;
use fv_numerics::FvMesh;
use glam::DVec3;

fn walls(mesh: &FvMesh) -> BTreeMap<String, BoundarySpec> {
    mesh.poly()
        .patches()
        .iter()
        .filter(|p| !p.is_coupled())
        .map(|p| (p.name.clone(), BoundarySpec::zero_gradient()))
        .collect()
}

fn cyclic_mesh(n: usize) -> FvMesh {
    let poly = BlockMeshGenerator::new([n, 2, 1], [n as f64, 2.0, 1.0])
        .with_cyclic_x()
        .build()
        .unwrap();
    FvMesh::new(poly, &SerialComm, CommsType::NonBlocking).unwrap()
}

/// 求解器看到的矩阵与界面系数
fn solver_view(m: &FvMatrix, mesh: &FvMesh) -> (LduMatrix, Vec<Vec<f64>>, Vec<Vec<f64>>) {
    let mut diag = m.ldu().diag().to_vec();
    let addr = mesh.addressing();
    let mut bou = Vec::new();
    let mut int = Vec::new();
    for (patchi, patch) in mesh.poly().patches().iter().enumerate() {
        for (&c, &ic) in addr.patch_addr(patchi).iter().zip(&m.internal_coeffs()[patchi]) {
            diag[c] += ic;
        }
        if patch.is_coupled() {
            bou.push(m.boundary_coeffs()[patchi].clone());
            int.push(m.internal_coeffs()[patchi].clone());
        } else {
            bou.push(Vec::new());
            int.push(Vec::new());
        }
    }
    let lower = m.ldu().is_asymmetric().then(|| m.ldu().lower().to_vec());
    let matrix = LduMatrix::from_coeffs(addr.clone(), diag, m.ldu().upper().to_vec(), lower).unwrap();
    (matrix, bou, int)
}

#[test]
fn test_amul_is_linear() {
    let mesh = cyclic_mesh(5);
    let psi = VolScalarField::uniform("T", &mesh, 0.0, &walls(&mesh), &PatchFieldRegistry::with_builtins()).unwrap();
    let phi = SurfaceScalarField::flux("phi", &mesh, DVec3::new(1.0, 0.3, 0.0));
    let mut m = fvm::laplacian(&Diffusivity::Uniform(0.7), &psi, &mesh, LaplacianScheme::Uncorrected).unwrap();
    m.sub_assign(&fvm::div(&phi, &psi, &mesh, ConvectionScheme::Upwind).unwrap())
        .unwrap();
    let (matrix, bou, int) = solver_view(&m, &mesh);
    let system = LinearSystem::new(&matrix, &bou, &int, mesh.ldu(), &SerialComm).unwrap();

    let n = mesh.n_cells();
    let x: Vec<f64> = (0..n).map(|i| (i as f64 * 0.37).sin()).collect();
    let y: Vec<f64> = (0..n).map(|i| (i as f64 * 1.3).cos() + 0.5).collect();
    let xy: Vec<f64> = x.iter().zip(&y).map(|(a, b)| a + b).collect();

    let (mut ax, mut ay, mut axy) = (vec![0.0; n], vec![0.0; n], vec![0.0; n]);
    system.amul(&x, &mut ax).unwrap();
    system.amul(&y, &mut ay).unwrap();
    system.amul(&xy, &mut axy).unwrap();
    for c in 0..n {
        assert_relative_eq!(axy[c], ax[c] + ay[c], epsilon = 1e-12);
    }
}

#[test]
fn test_adding_zero_term_is_identity() {
    let poly = BlockMeshGenerator::new([3, 3, 1], [1.0; 3]).build().unwrap();
    let mesh = FvMesh::new(poly, &SerialComm, CommsType::NonBlocking).unwrap();
    let psi = VolScalarField::uniform("T", &mesh, 1.0, &walls(&mesh), &PatchFieldRegistry::with_builtins()).unwrap();
    let mut m = fvm::laplacian(&Diffusivity::Uniform(1.0), &psi, &mesh, LaplacianScheme::Corrected).unwrap();
    let reference = m.clone();

    m.add_assign(&fvm::laplacian(&Diffusivity::Uniform(0.0), &psi, &mesh, LaplacianScheme::Uncorrected).unwrap())
        .unwrap();
    m.add_assign(&fvm::sp(&vec![0.0; mesh.n_cells()], &psi, &mesh).unwrap())
        .unwrap();
    m.add_assign(&fvm::su(&vec![0.0; mesh.n_cells()], &psi, &mesh).unwrap())
        .unwrap();

    assert_eq!(m.ldu().diag(), reference.ldu().diag());
    assert_eq!(m.ldu().upper(), reference.ldu().upper());
    assert_eq!(m.ldu().lower(), reference.ldu().lower());
    assert_eq!(m.source(), reference.source());
    assert_eq!(m.internal_coeffs(), reference.internal_coeffs());
    assert_eq!(m.boundary_coeffs(), reference.boundary_coeffs());
}

#[test]
fn test_cyclic_laplacian_row_sums_vanish() {
    let mesh = cyclic_mesh(6);
    let psi = VolScalarField::uniform("T", &mesh, 0.0, &walls(&mesh), &PatchFieldRegistry::with_builtins()).unwrap();
    let m = fvm::laplacian(&Diffusivity::Uniform(3.0), &psi, &mesh, LaplacianScheme::Uncorrected).unwrap();
    let (matrix, bou, int) = solver_view(&m, &mesh);
    let system = LinearSystem::new(&matrix, &bou, &int, mesh.ldu(), &SerialComm).unwrap();

    let ones = vec![1.0; mesh.n_cells()];
    let mut a1 = vec![0.0; mesh.n_cells()];
    system.amul(&ones, &mut a1).unwrap();
    assert!(a1.iter().all(|v| v.abs() < 1e-12));

    // 每个单元两个 x 向邻居（内部面或周期面）加一个 y 向邻居
    assert!(matrix.diag().iter().all(|&d| (d + 3.0 * 3.0).abs() < 1e-12));
}

#[test]
fn test_mismatched_term_is_assembly_error() {
    let a = FvMesh::new(BlockMeshGenerator::chain(4, 1.0).build().unwrap(), &SerialComm, CommsType::NonBlocking)
        .unwrap();
    let b = FvMesh::new(BlockMeshGenerator::chain(5, 1.0).build().unwrap(), &SerialComm, CommsType::NonBlocking)
        .unwrap();
    let reg = PatchFieldRegistry::with_builtins();
    let ta = VolScalarField::uniform("T", &a, 0.0, &walls(&a), &reg).unwrap();
    let tb = VolScalarField::uniform("T", &b, 0.0, &walls(&b), &reg).unwrap();
    let mut ma = fvm::laplacian(&Diffusivity::Uniform(1.0), &ta, &a, LaplacianScheme::Uncorrected).unwrap();
    let mb = fvm::laplacian(&Diffusivity::Uniform(1.0), &tb, &b, LaplacianScheme::Uncorrected).unwrap();
    let err = ma.add_assign(&mb).unwrap_err();
    assert!(matches!(err, FvError::AssemblyMismatch { .. }));
    assert!(err.is_fatal());

    // 面场来自另一网格
    let phi_b = SurfaceScalarField::uniform("phi", &b, 1.0);
    assert!(fvm::div(&phi_b, &ta, &a, ConvectionScheme::Upwind).is_err());
}

#[test]
fn test_stale_addressing_detected_and_rebuilt() {
    let poly = BlockMeshGenerator::chain(4, 4.0).build().unwrap();
    let mut mesh = FvMesh::new(poly, &SerialComm, CommsType::NonBlocking).unwrap();
    let mut specs = walls(&mesh);
    specs.insert("xMin".to_string(), BoundarySpec::fixed_value(0.0));
    let reg = PatchFieldRegistry::with_builtins();
    let mut psi = VolScalarField::uniform("T", &mesh, 0.0, &specs, &reg).unwrap();
    let mut eqn = fvm::laplacian(&Diffusivity::Uniform(1.0), &psi, &mesh, LaplacianScheme::Uncorrected).unwrap();
    eqn.negate();

    let old_epoch = mesh.ldu().epoch();
    mesh.poly_mut().bump_topology_epoch();
    assert!(mesh.is_stale());

    let controls = resolve_controls(&LinearSolverControls::default()).unwrap();
    let err = eqn
        .solve(&mut psi, &mesh, &SerialComm, &controls, Precision::F64)
        .unwrap_err();
    assert!(matches!(err, FvError::AssemblyMismatch { .. }));

    assert!(mesh.update(&SerialComm).unwrap());
    assert_eq!(mesh.ldu().epoch(), old_epoch + 1);
    assert!(!mesh.update(&SerialComm).unwrap());

    // 新纪元上重新创建的场与矩阵可以求解
    let mut psi = VolScalarField::uniform("T", &mesh, 0.0, &specs, &reg).unwrap();
    let mut eqn = fvm::laplacian(&Diffusivity::Uniform(1.0), &psi, &mesh, LaplacianScheme::Uncorrected).unwrap();
    eqn.negate();
    eqn.sub_explicit(&vec![1.0; 4], &mesh).unwrap();
    let perf = eqn.solve(&mut psi, &mesh, &SerialComm, &controls, Precision::F64).unwrap();
    assert!(perf.converged());
}
