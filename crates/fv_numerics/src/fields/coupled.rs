// crates/fv_numerics/src/fields/coupled.rs

//! 耦合边界（processor / cyclic）
//!
//! 对侧单元值由 [`VolScalarField::correct_boundary_conditions`](super::VolScalarField::correct_boundary_conditions)
//! 按界面调度交换后写入。面值按插值权重混合两侧单元值；系数中的
//! `*BoundaryCoeffs` 乘在对侧单元值上，由求解器通过界面作用。

use fv_foundation::{FvError, FvResult};
use fv_mesh::PatchKind;

use super::patch_field::{check_patch_size, PatchContext, PatchField};

/// 耦合边界场
#[derive(Debug, Clone)]
pub struct CoupledPatchField {
    type_name: &'static str,
    values: Vec<f64>,
    neighbour: Vec<f64>,
}

impl CoupledPatchField {
    /// 按面片类型创建，对侧值初始为本侧单元值
    pub fn new(ctx: &PatchContext<'_>, internal: &[f64]) -> FvResult<Self> {
        let type_name = match ctx.patch.kind {
            PatchKind::Processor(_) => "processor",
            PatchKind::Cyclic(_) => "cyclic",
            _ => {
                return Err(FvError::boundary_condition(
                    ctx.name(),
                    format!("面片类型 '{}' 不是耦合面片", ctx.patch.kind.type_name()),
                ))
            }
        };
        let neighbour = ctx.patch_internal_field(internal);
        Ok(Self {
            type_name,
            values: neighbour.clone(),
            neighbour,
        })
    }
}

impl PatchField for CoupledPatchField {
    fn type_name(&self) -> &'static str {
        self.type_name
    }

    fn values(&self) -> &[f64] {
        &self.values
    }

    fn is_coupled(&self) -> bool {
        true
    }

    fn evaluate(&mut self, ctx: &PatchContext<'_>, internal: &[f64]) -> FvResult<()> {
        for i in 0..ctx.size() {
            let w = ctx.weights[i];
            self.values[i] = w * internal[ctx.face_cells[i]] + (1.0 - w) * self.neighbour[i];
        }
        Ok(())
    }

    fn sn_grad(&self, ctx: &PatchContext<'_>, internal: &[f64]) -> FvResult<Vec<f64>> {
        Ok((0..ctx.size())
            .map(|i| ctx.delta_coeffs[i] * (self.neighbour[i] - internal[ctx.face_cells[i]]))
            .collect())
    }

    fn value_internal_coeffs(&self, _ctx: &PatchContext<'_>, weights: &[f64]) -> FvResult<Vec<f64>> {
        Ok(weights.to_vec())
    }

    fn value_boundary_coeffs(&self, _ctx: &PatchContext<'_>, weights: &[f64]) -> FvResult<Vec<f64>> {
        Ok(weights.iter().map(|&w| 1.0 - w).collect())
    }

    fn gradient_internal_coeffs(&self, ctx: &PatchContext<'_>) -> FvResult<Vec<f64>> {
        Ok(ctx.delta_coeffs.iter().map(|&dc| -dc).collect())
    }

    fn gradient_boundary_coeffs(&self, ctx: &PatchContext<'_>) -> FvResult<Vec<f64>> {
        Ok(ctx.delta_coeffs.to_vec())
    }

    fn patch_neighbour_field(&self) -> Option<&[f64]> {
        Some(&self.neighbour)
    }

    fn set_patch_neighbour_field(&mut self, ctx: &PatchContext<'_>, values: Vec<f64>) -> FvResult<()> {
        check_patch_size(ctx, "neighbour", values.len())?;
        self.neighbour = values;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::patch_field::test_support::Fixture;
    use fv_mesh::{CyclicInfo, ProcessorInfo};
    use glam::DVec3;

    #[test]
    fn test_coupled_interpolates_with_neighbour() {
        let fx = Fixture::new(PatchKind::Processor(ProcessorInfo {
            my_proc: 0,
            neighb_proc: 1,
            neighbour_cell_centres: vec![DVec3::ZERO; 2],
        }));
        let ctx = fx.ctx();
        let internal = [1.0, 3.0];
        let mut pf = CoupledPatchField::new(&ctx, &internal).unwrap();
        assert_eq!(pf.type_name(), "processor");
        assert!(pf.is_coupled());

        pf.set_patch_neighbour_field(&ctx, vec![5.0, 7.0]).unwrap();
        pf.evaluate(&ctx, &internal).unwrap();
        // w = [0.5, 0.25]
        assert_eq!(pf.values(), &[3.0, 6.0]);
        assert_eq!(pf.sn_grad(&ctx, &internal).unwrap(), vec![8.0, 16.0]);
        assert!(pf.set_patch_neighbour_field(&ctx, vec![1.0]).is_err());
    }

    #[test]
    fn test_requires_coupled_patch() {
        let fx = Fixture::new(PatchKind::Wall);
        assert!(CoupledPatchField::new(&fx.ctx(), &[0.0, 0.0]).is_err());
        let fx = Fixture::new(PatchKind::Cyclic(CyclicInfo { neighbour_patch: 0 }));
        assert_eq!(CoupledPatchField::new(&fx.ctx(), &[0.0, 0.0]).unwrap().type_name(), "cyclic");
    }
}
