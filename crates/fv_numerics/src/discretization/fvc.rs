// crates/fv_numerics/src/discretization/fvc.rs

//! 显式离散算子
//!
//! 由当前场值直接计算导出场，不产生矩阵。体场的面片值取自边界场，
//! 调用前应先 [`correct_boundary_conditions`](crate::fields::VolScalarField::correct_boundary_conditions)。

use fv_foundation::{FvError, FvResult};
use glam::DVec3;

use crate::fields::{SurfaceScalarField, VolScalarField};
use crate::mesh::FvMesh;

/// 线性插值到面
pub fn interpolate(vf: &VolScalarField, mesh: &FvMesh) -> FvResult<SurfaceScalarField> {
    mesh.check_epoch(vf.epoch(), "fvc_interpolate")?;
    let w = &mesh.geometry().weights;
    let owner = mesh.poly().owner();
    let neighbour = mesh.poly().neighbour();
    let psi = vf.internal();
    let internal = (0..mesh.n_internal_faces())
        .map(|f| w[f] * psi[owner[f]] + (1.0 - w[f]) * psi[neighbour[f]])
        .collect();
    let boundary = vf.boundary().iter().map(|pf| pf.values().to_vec()).collect();
    SurfaceScalarField::new(format!("interpolate({})", vf.name()), mesh, internal, boundary)
}

/// 面值求和到单元：`Σ_f s_f`
pub fn surface_sum(ssf: &SurfaceScalarField, mesh: &FvMesh) -> FvResult<Vec<f64>> {
    accumulate(ssf, mesh, 1.0)
}

/// 面通量的单元积分：`Σ_f ±s_f`（以本侧外法向为正）
pub fn surface_integrate(ssf: &SurfaceScalarField, mesh: &FvMesh) -> FvResult<Vec<f64>> {
    let mut out = accumulate(ssf, mesh, -1.0)?;
    for (o, &v) in out.iter_mut().zip(mesh.volumes()) {
        *o /= v;
    }
    Ok(out)
}

fn accumulate(ssf: &SurfaceScalarField, mesh: &FvMesh, neighbour_sign: f64) -> FvResult<Vec<f64>> {
    ssf.check_mesh(mesh, "fvc_surface_sum")?;
    let owner = mesh.poly().owner();
    let neighbour = mesh.poly().neighbour();
    let mut out = vec![0.0; mesh.n_cells()];
    for (f, &s) in ssf.internal().iter().enumerate() {
        out[owner[f]] += s;
        out[neighbour[f]] += neighbour_sign * s;
    }
    for (patchi, patch) in mesh.poly().patches().iter().enumerate() {
        for (i, f) in patch.range().enumerate() {
            out[owner[f]] += ssf.boundary(patchi)[i];
        }
    }
    Ok(out)
}

/// 面通量的散度 `∇·φ`
pub fn div(phi: &SurfaceScalarField, mesh: &FvMesh) -> FvResult<Vec<f64>> {
    surface_integrate(phi, mesh)
}

/// 对流项的显式散度 `∇·(φ ψ_f)`，`ψ_f` 为线性插值
pub fn div_flux(phi: &SurfaceScalarField, vf: &VolScalarField, mesh: &FvMesh) -> FvResult<Vec<f64>> {
    let mut flux = interpolate(vf, mesh)?;
    flux.multiply(phi)?;
    surface_integrate(&flux, mesh)
}

/// Gauss 线性梯度
pub fn grad(vf: &VolScalarField, mesh: &FvMesh) -> FvResult<Vec<DVec3>> {
    let psi_f = interpolate(vf, mesh)?;
    let sf = &mesh.geometry().face_areas;
    let owner = mesh.poly().owner();
    let neighbour = mesh.poly().neighbour();
    let mut g = vec![DVec3::ZERO; mesh.n_cells()];
    for (f, &v) in psi_f.internal().iter().enumerate() {
        let flux = sf[f] * v;
        g[owner[f]] += flux;
        g[neighbour[f]] -= flux;
    }
    for (patchi, patch) in mesh.poly().patches().iter().enumerate() {
        for (i, f) in patch.range().enumerate() {
            g[owner[f]] += sf[f] * psi_f.boundary(patchi)[i];
        }
    }
    for (gc, &v) in g.iter_mut().zip(mesh.volumes()) {
        *gc /= v;
    }
    if let Some(c) = g.iter().position(|v| !v.is_finite()) {
        return Err(FvError::non_finite(format!("grad({}) 单元 {}", vf.name(), c)));
    }
    Ok(g)
}

/// 面法向梯度（非正交 delta 系数，不含修正）
pub fn sn_grad(vf: &VolScalarField, mesh: &FvMesh) -> FvResult<SurfaceScalarField> {
    mesh.check_epoch(vf.epoch(), "fvc_sn_grad")?;
    let dc = &mesh.geometry().non_orth_delta_coeffs;
    let owner = mesh.poly().owner();
    let neighbour = mesh.poly().neighbour();
    let psi = vf.internal();
    let internal = (0..mesh.n_internal_faces())
        .map(|f| dc[f] * (psi[neighbour[f]] - psi[owner[f]]))
        .collect();
    let mut boundary = Vec::with_capacity(mesh.n_patches());
    for patchi in 0..mesh.n_patches() {
        let ctx = mesh.patch_context(patchi)?;
        boundary.push(vf.patch(patchi)?.sn_grad(&ctx, psi)?);
    }
    SurfaceScalarField::new(format!("snGrad({})", vf.name()), mesh, internal, boundary)
}

/// 显式拉普拉斯 `∇·(Γ ∇ψ)`，`gamma` 为均匀扩散系数
pub fn laplacian(gamma: f64, vf: &VolScalarField, mesh: &FvMesh) -> FvResult<Vec<f64>> {
    let mut flux = sn_grad(vf, mesh)?;
    let mag_sf = &mesh.geometry().mag_face_areas;
    for (f, v) in flux.internal_mut().iter_mut().enumerate() {
        *v *= gamma * mag_sf[f];
    }
    for (patchi, patch) in mesh.poly().patches().iter().enumerate() {
        for (v, f) in flux.boundary_mut(patchi).iter_mut().zip(patch.range()) {
            *v *= gamma * mag_sf[f];
        }
    }
    surface_integrate(&flux, mesh)
}
