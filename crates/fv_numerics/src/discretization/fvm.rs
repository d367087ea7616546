// crates/fv_numerics/src/discretization/fvm.rs

//! 隐式离散算子
//!
//! 每个算子返回一个 [`FvMatrix`]，表示该项对未知量 `ψ` 的线性化：
//!
//! | 算子 | 内部面 | 面片 |
//! |------|--------|------|
//! | `laplacian` | `upper = Γ|Sf| Δ⊥` | `Γ|Sf| · gradientCoeffs` |
//! | `div` | `lower = -w φ`, `upper = (1-w) φ` | `φ · valueCoeffs` |
//! | `ddt` | - | - |
//!
//! 对角均由 `neg_sum_diag` 得到，因此内部面的贡献在每个单元上守恒。

use std::str::FromStr;

use fv_foundation::{FvError, FvResult};

use super::fv_matrix::FvMatrix;
use super::fvc;
use crate::fields::{SurfaceScalarField, VolScalarField};
use crate::mesh::FvMesh;

// ============================================================
// 格式选择
// ============================================================

/// 拉普拉斯格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LaplacianScheme {
    /// 只用非正交 delta 系数
    #[default]
    Uncorrected,
    /// 加显式非正交修正
    Corrected,
}

impl LaplacianScheme {
    /// 全部名称
    pub const NAMES: [&'static str; 2] = ["corrected", "uncorrected"];

    /// 名称
    pub fn name(&self) -> &'static str {
        match self {
            Self::Uncorrected => "uncorrected",
            Self::Corrected => "corrected",
        }
    }
}

impl FromStr for LaplacianScheme {
    type Err = FvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uncorrected" => Ok(Self::Uncorrected),
            "corrected" => Ok(Self::Corrected),
            other => Err(FvError::unknown_selection("laplacian scheme", other, Self::NAMES)),
        }
    }
}

/// 对流格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConvectionScheme {
    /// 一阶迎风
    #[default]
    Upwind,
    /// 线性插值
    Linear,
}

impl ConvectionScheme {
    /// 全部名称
    pub const NAMES: [&'static str; 2] = ["linear", "upwind"];

    /// 名称
    pub fn name(&self) -> &'static str {
        match self {
            Self::Upwind => "upwind",
            Self::Linear => "linear",
        }
    }

    /// 面插值权重（本侧单元的份额）
    #[inline]
    fn weight(&self, flux: f64, geometric: f64) -> f64 {
        match self {
            Self::Upwind => {
                if flux >= 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Self::Linear => geometric,
        }
    }
}

impl FromStr for ConvectionScheme {
    type Err = FvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upwind" => Ok(Self::Upwind),
            "linear" => Ok(Self::Linear),
            other => Err(FvError::unknown_selection("convection scheme", other, Self::NAMES)),
        }
    }
}

/// 扩散系数
#[derive(Debug, Clone, Copy)]
pub enum Diffusivity<'a> {
    /// 均匀常数
    Uniform(f64),
    /// 面值
    Face(&'a SurfaceScalarField),
}

impl Diffusivity<'_> {
    /// `Γ_f |Sf|`，按内部面与各面片分组
    fn gamma_mag_sf(&self, mesh: &FvMesh) -> FvResult<SurfaceScalarField> {
        let mag_sf = &mesh.geometry().mag_face_areas;
        let mut out = SurfaceScalarField::from_face_fn("gammaMagSf", mesh, |f| mag_sf[f]);
        match self {
            Diffusivity::Uniform(gamma) => {
                out.internal_mut().iter_mut().for_each(|v| *v *= gamma);
                for patchi in 0..mesh.n_patches() {
                    out.boundary_mut(patchi).iter_mut().for_each(|v| *v *= gamma);
                }
            }
            Diffusivity::Face(gamma) => {
                gamma.check_mesh(mesh, "fvm_laplacian")?;
                out.multiply(gamma)?;
            }
        }
        Ok(out)
    }
}

// ============================================================
// 算子
// ============================================================

/// `∇·(Γ ∇ψ)`
pub fn laplacian(
    gamma: &Diffusivity<'_>,
    psi: &VolScalarField,
    mesh: &FvMesh,
    scheme: LaplacianScheme,
) -> FvResult<FvMatrix> {
    let mut m = FvMatrix::new(psi, mesh)?;
    let gmsf = gamma.gamma_mag_sf(mesh)?;
    let dc = &mesh.geometry().non_orth_delta_coeffs;

    {
        let upper = m.ldu_mut().upper_mut();
        for (f, u) in upper.iter_mut().enumerate() {
            *u = gmsf.internal()[f] * dc[f];
        }
    }
    m.ldu_mut().neg_sum_diag();

    for patchi in 0..mesh.n_patches() {
        let ctx = mesh.patch_context(patchi)?;
        let pf = psi.patch(patchi)?;
        let g = gmsf.boundary(patchi);
        let gic = pf.gradient_internal_coeffs(&ctx)?;
        let gbc = pf.gradient_boundary_coeffs(&ctx)?;
        for i in 0..ctx.size() {
            m.internal_coeffs_mut()[patchi][i] = g[i] * gic[i];
            m.boundary_coeffs_mut()[patchi][i] = -g[i] * gbc[i];
        }
    }

    if scheme == LaplacianScheme::Corrected {
        let grad = fvc::grad(psi, mesh)?;
        let geom = mesh.geometry();
        let owner = mesh.poly().owner();
        let neighbour = mesh.poly().neighbour();
        let source = m.source_mut();
        for f in 0..mesh.n_internal_faces() {
            let (o, n) = (owner[f], neighbour[f]);
            let w = geom.weights[f];
            let grad_f = grad[o] * w + grad[n] * (1.0 - w);
            let corr = gmsf.internal()[f] * geom.non_orth_correction_vectors[f].dot(grad_f);
            source[o] -= corr;
            source[n] += corr;
        }
    }

    log::trace!("fvm::laplacian({}) [{}]", psi.name(), scheme.name());
    Ok(m)
}

/// `∇·(φ ψ)`
pub fn div(phi: &SurfaceScalarField, psi: &VolScalarField, mesh: &FvMesh, scheme: ConvectionScheme) -> FvResult<FvMatrix> {
    phi.check_mesh(mesh, "fvm_div")?;
    let mut m = FvMatrix::new(psi, mesh)?;
    let geo_w = &mesh.geometry().weights;

    let weights: Vec<f64> = phi
        .internal()
        .iter()
        .enumerate()
        .map(|(f, &flux)| scheme.weight(flux, geo_w[f]))
        .collect();
    {
        let lower = m.ldu_mut().lower_mut();
        for f in 0..lower.len() {
            lower[f] = -weights[f] * phi.internal()[f];
        }
    }
    {
        let lower = m.ldu().lower().to_vec();
        let upper = m.ldu_mut().upper_mut();
        for f in 0..upper.len() {
            upper[f] = lower[f] + phi.internal()[f];
        }
    }
    m.ldu_mut().neg_sum_diag();

    for patchi in 0..mesh.n_patches() {
        let ctx = mesh.patch_context(patchi)?;
        let pf = psi.patch(patchi)?;
        let flux = phi.boundary(patchi);
        let pw: Vec<f64> = flux
            .iter()
            .zip(ctx.weights)
            .map(|(&fl, &w)| scheme.weight(fl, w))
            .collect();
        let vic = pf.value_internal_coeffs(&ctx, &pw)?;
        let vbc = pf.value_boundary_coeffs(&ctx, &pw)?;
        for i in 0..ctx.size() {
            m.internal_coeffs_mut()[patchi][i] = flux[i] * vic[i];
            m.boundary_coeffs_mut()[patchi][i] = -flux[i] * vbc[i];
        }
    }

    log::trace!("fvm::div({}, {}) [{}]", phi.name(), psi.name(), scheme.name());
    Ok(m)
}

/// Euler 隐式时间导数 `∂ψ/∂t`
pub fn ddt(psi: &VolScalarField, mesh: &FvMesh, delta_t: f64) -> FvResult<FvMatrix> {
    if !(delta_t > 0.0) {
        return Err(FvError::invalid_config("deltaT", delta_t.to_string(), "时间步长必须为正"));
    }
    let mut m = FvMatrix::new(psi, mesh)?;
    let rdt = 1.0 / delta_t;
    let old = psi.old_time().to_vec();
    let vols = mesh.volumes().to_vec();
    for (d, &v) in m.ldu_mut().diag_mut().iter_mut().zip(&vols) {
        *d = rdt * v;
    }
    for ((s, &v), &o) in m.source_mut().iter_mut().zip(&vols).zip(&old) {
        *s = rdt * v * o;
    }
    Ok(m)
}

/// 隐式源项 `sp ψ`
pub fn sp(coeff: &[f64], psi: &VolScalarField, mesh: &FvMesh) -> FvResult<FvMatrix> {
    FvError::check_size("sp", mesh.n_cells(), coeff.len())?;
    let mut m = FvMatrix::new(psi, mesh)?;
    let vols = mesh.volumes();
    for ((d, &v), &s) in m.ldu_mut().diag_mut().iter_mut().zip(vols).zip(coeff) {
        *d += v * s;
    }
    Ok(m)
}

/// 显式源项 `su`
pub fn su(source: &[f64], psi: &VolScalarField, mesh: &FvMesh) -> FvResult<FvMatrix> {
    let mut m = FvMatrix::new(psi, mesh)?;
    m.add_explicit(source, mesh)?;
    Ok(m)
}

/// 按符号选择隐式或显式处理的源项 `s ψ`
///
/// 正系数进入对角，负系数按当前值显式处理。
pub fn susp(coeff: &[f64], psi: &VolScalarField, mesh: &FvMesh) -> FvResult<FvMatrix> {
    FvError::check_size("susp", mesh.n_cells(), coeff.len())?;
    let mut m = FvMatrix::new(psi, mesh)?;
    let vols = mesh.volumes().to_vec();
    for ((d, &v), &s) in m.ldu_mut().diag_mut().iter_mut().zip(&vols).zip(coeff) {
        *d += v * s.max(0.0);
    }
    for (((src, &v), &s), &x) in m.source_mut().iter_mut().zip(&vols).zip(coeff).zip(psi.internal()) {
        *src -= v * s.min(0.0) * x;
    }
    Ok(m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::PatchFieldRegistry;
    use crate::parallel::SerialComm;
    use fv_config::{BoundarySpec, CommsType};
    use fv_mesh::BlockMeshGenerator;
    use glam::DVec3;
    use std::collections::BTreeMap;

    fn zero_gradient_field(mesh: &FvMesh, name: &str, value: f64) -> VolScalarField {
        let mut specs = BTreeMap::new();
        for p in mesh.poly().patches() {
            if !p.is_coupled() {
                specs.insert(p.name.clone(), BoundarySpec::zero_gradient());
            }
        }
        VolScalarField::uniform(name, mesh, value, &specs, &PatchFieldRegistry::with_builtins()).unwrap()
    }

    fn mesh(cells: [usize; 3]) -> FvMesh {
        let lengths = [cells[0] as f64, cells[1] as f64, cells[2] as f64];
        let poly = BlockMeshGenerator::new(cells, lengths).build().unwrap();
        FvMesh::new(poly, &SerialComm, CommsType::NonBlocking).unwrap()
    }

    #[test]
    fn test_scheme_names() {
        assert_eq!("upwind".parse::<ConvectionScheme>().unwrap(), ConvectionScheme::Upwind);
        assert_eq!("corrected".parse::<LaplacianScheme>().unwrap(), LaplacianScheme::Corrected);
        match "QUICK".parse::<ConvectionScheme>() {
            Err(FvError::UnknownSelection { kind, valid, .. }) => {
                assert_eq!(kind, "convection scheme");
                assert_eq!(valid, vec!["linear", "upwind"]);
            }
            other => panic!("意外结果: {:?}", other),
        }
    }

    #[test]
    fn test_laplacian_row_sums_vanish_with_zero_gradient() {
        let mesh = mesh([3, 2, 1]);
        let psi = zero_gradient_field(&mesh, "T", 0.0);
        let m = laplacian(&Diffusivity::Uniform(2.0), &psi, &mesh, LaplacianScheme::Uncorrected).unwrap();
        let mut row = vec![0.0; mesh.n_cells()];
        m.ldu().amul_internal(&vec![1.0; mesh.n_cells()], &mut row);
        assert!(row.iter().all(|r| r.abs() < 1e-12));
        assert!(m.ldu().is_symmetric());
        // 单位立方单元，相邻面 Γ|Sf|/d = 2
        assert!(m.ldu().upper().iter().all(|&u| (u - 2.0).abs() < 1e-12));
    }

    #[test]
    fn test_corrected_equals_uncorrected_on_orthogonal_mesh() {
        let mesh = mesh([4, 1, 1]);
        let mut psi = zero_gradient_field(&mesh, "T", 0.0);
        psi.internal_mut().copy_from_slice(&[0.0, 1.0, 4.0, 9.0]);
        psi.correct_boundary_conditions(&mesh, &SerialComm).unwrap();
        let a = laplacian(&Diffusivity::Uniform(1.0), &psi, &mesh, LaplacianScheme::Uncorrected).unwrap();
        let b = laplacian(&Diffusivity::Uniform(1.0), &psi, &mesh, LaplacianScheme::Corrected).unwrap();
        assert_eq!(a.source(), b.source());
    }

    #[test]
    fn test_upwind_convection_is_conservative() {
        let mesh = mesh([4, 1, 1]);
        let psi = zero_gradient_field(&mesh, "T", 0.0);
        let phi = SurfaceScalarField::flux("phi", &mesh, DVec3::new(1.0, 0.0, 0.0));
        let m = div(&phi, &psi, &mesh, ConvectionScheme::Upwind).unwrap();
        assert!(m.ldu().is_asymmetric());
        // 正通量: 上游单元系数在 lower
        assert!(m.ldu().upper().iter().all(|&u| u.abs() < 1e-12));
        assert!(m.ldu().lower().iter().all(|&l| (l + 1.0).abs() < 1e-12));
        // 列和为零
        let mut col = vec![0.0; mesh.n_cells()];
        m.ldu().tmul_internal(&vec![1.0; mesh.n_cells()], &mut col);
        assert!(col.iter().all(|c| c.abs() < 1e-12));
    }

    #[test]
    fn test_ddt_and_sources() {
        let mesh = mesh([2, 1, 1]);
        let mut psi = zero_gradient_field(&mesh, "T", 2.0);
        psi.store_old_time();
        let m = ddt(&psi, &mesh, 0.5).unwrap();
        assert!(m.ldu().is_diagonal());
        assert_eq!(m.ldu().diag(), &[2.0, 2.0]);
        assert_eq!(m.source(), &[4.0, 4.0]);
        assert!(ddt(&psi, &mesh, 0.0).is_err());

        let s = susp(&[1.0, -1.0], &psi, &mesh).unwrap();
        assert_eq!(s.ldu().diag(), &[1.0, 0.0]);
        assert_eq!(s.source(), &[0.0, 2.0]);

        let u = su(&[3.0, 0.0], &psi, &mesh).unwrap();
        assert_eq!(u.source(), &[-3.0, 0.0]);
        let p = sp(&[1.5, 0.5], &psi, &mesh).unwrap();
        assert_eq!(p.ldu().diag(), &[1.5, 0.5]);
    }
}
