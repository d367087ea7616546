// crates/fv_numerics/src/fields/basic.rs

//! 非耦合边界条件
//!
//! | 类型 | 面值 | valueInternal | valueBoundary | gradInternal | gradBoundary |
//! |------|------|---------------|---------------|--------------|--------------|
//! | fixedValue | `v` | 0 | `v` | `-Δ` | `Δ v` |
//! | fixedGradient | `ψ_P + g/Δ` | 1 | `g/Δ` | 0 | `g` |
//! | zeroGradient | `ψ_P` | 1 | 0 | 0 | 0 |
//! | mixed | 见下 | `1-f` | `f v + (1-f) g/Δ` | `-f Δ` | `f Δ v + (1-f) g` |
//! | extrapolated | `ψ_P` | 1 | 0 | 0 | 0 |
//!
//! `Δ` 为面片 delta 系数。calculated 只保存外部赋予的面值，不能参与隐式装配。

use fv_foundation::{FvError, FvResult};

use super::patch_field::{check_patch_size, PatchContext, PatchField};

// ============================================================
// fixedValue
// ============================================================

/// 固定值
#[derive(Debug, Clone)]
pub struct FixedValuePatchField {
    values: Vec<f64>,
}

impl FixedValuePatchField {
    /// 以逐面值创建
    pub fn new(ctx: &PatchContext<'_>, values: Vec<f64>) -> FvResult<Self> {
        check_patch_size(ctx, "value", values.len())?;
        Ok(Self { values })
    }

    /// 均匀值
    pub fn uniform(ctx: &PatchContext<'_>, value: f64) -> Self {
        Self {
            values: vec![value; ctx.size()],
        }
    }

    /// 修改固定值
    pub fn set_values(&mut self, ctx: &PatchContext<'_>, values: Vec<f64>) -> FvResult<()> {
        check_patch_size(ctx, "value", values.len())?;
        self.values = values;
        Ok(())
    }
}

impl PatchField for FixedValuePatchField {
    fn type_name(&self) -> &'static str {
        "fixedValue"
    }

    fn values(&self) -> &[f64] {
        &self.values
    }

    fn fixes_value(&self) -> bool {
        true
    }

    fn evaluate(&mut self, _ctx: &PatchContext<'_>, _internal: &[f64]) -> FvResult<()> {
        Ok(())
    }

    fn sn_grad(&self, ctx: &PatchContext<'_>, internal: &[f64]) -> FvResult<Vec<f64>> {
        Ok(ctx
            .face_cells
            .iter()
            .zip(&self.values)
            .zip(ctx.delta_coeffs)
            .map(|((&c, &v), &dc)| dc * (v - internal[c]))
            .collect())
    }

    fn value_internal_coeffs(&self, ctx: &PatchContext<'_>, _weights: &[f64]) -> FvResult<Vec<f64>> {
        Ok(vec![0.0; ctx.size()])
    }

    fn value_boundary_coeffs(&self, _ctx: &PatchContext<'_>, _weights: &[f64]) -> FvResult<Vec<f64>> {
        Ok(self.values.clone())
    }

    fn gradient_internal_coeffs(&self, ctx: &PatchContext<'_>) -> FvResult<Vec<f64>> {
        Ok(ctx.delta_coeffs.iter().map(|&dc| -dc).collect())
    }

    fn gradient_boundary_coeffs(&self, ctx: &PatchContext<'_>) -> FvResult<Vec<f64>> {
        Ok(ctx.delta_coeffs.iter().zip(&self.values).map(|(&dc, &v)| dc * v).collect())
    }
}

// ============================================================
// fixedGradient / zeroGradient
// ============================================================

/// 固定法向梯度
#[derive(Debug, Clone)]
pub struct FixedGradientPatchField {
    gradient: Vec<f64>,
    values: Vec<f64>,
    zero: bool,
}

impl FixedGradientPatchField {
    /// 以逐面梯度创建，面值由内部场外推
    pub fn new(ctx: &PatchContext<'_>, gradient: Vec<f64>, internal: &[f64]) -> FvResult<Self> {
        check_patch_size(ctx, "gradient", gradient.len())?;
        let mut pf = Self {
            gradient,
            values: vec![0.0; ctx.size()],
            zero: false,
        };
        pf.evaluate(ctx, internal)?;
        Ok(pf)
    }

    /// 零梯度
    pub fn zero_gradient(ctx: &PatchContext<'_>, internal: &[f64]) -> Self {
        Self {
            gradient: vec![0.0; ctx.size()],
            values: ctx.patch_internal_field(internal),
            zero: true,
        }
    }

    /// 法向梯度
    pub fn gradient(&self) -> &[f64] {
        &self.gradient
    }
}

impl PatchField for FixedGradientPatchField {
    fn type_name(&self) -> &'static str {
        if self.zero {
            "zeroGradient"
        } else {
            "fixedGradient"
        }
    }

    fn values(&self) -> &[f64] {
        &self.values
    }

    fn evaluate(&mut self, ctx: &PatchContext<'_>, internal: &[f64]) -> FvResult<()> {
        for (((v, &c), &g), &dc) in self.values.iter_mut().zip(ctx.face_cells).zip(&self.gradient).zip(ctx.delta_coeffs) {
            *v = internal[c] + g / dc;
        }
        Ok(())
    }

    fn sn_grad(&self, _ctx: &PatchContext<'_>, _internal: &[f64]) -> FvResult<Vec<f64>> {
        Ok(self.gradient.clone())
    }

    fn value_internal_coeffs(&self, ctx: &PatchContext<'_>, _weights: &[f64]) -> FvResult<Vec<f64>> {
        Ok(vec![1.0; ctx.size()])
    }

    fn value_boundary_coeffs(&self, ctx: &PatchContext<'_>, _weights: &[f64]) -> FvResult<Vec<f64>> {
        Ok(self.gradient.iter().zip(ctx.delta_coeffs).map(|(&g, &dc)| g / dc).collect())
    }

    fn gradient_internal_coeffs(&self, ctx: &PatchContext<'_>) -> FvResult<Vec<f64>> {
        Ok(vec![0.0; ctx.size()])
    }

    fn gradient_boundary_coeffs(&self, _ctx: &PatchContext<'_>) -> FvResult<Vec<f64>> {
        Ok(self.gradient.clone())
    }
}

// ============================================================
// mixed
// ============================================================

/// 值与梯度的加权混合
#[derive(Debug, Clone)]
pub struct MixedPatchField {
    ref_value: Vec<f64>,
    ref_gradient: Vec<f64>,
    value_fraction: Vec<f64>,
    values: Vec<f64>,
}

impl MixedPatchField {
    /// 创建，`value_fraction` 必须在 [0, 1]
    pub fn new(
        ctx: &PatchContext<'_>,
        ref_value: Vec<f64>,
        ref_gradient: Vec<f64>,
        value_fraction: Vec<f64>,
        internal: &[f64],
    ) -> FvResult<Self> {
        check_patch_size(ctx, "refValue", ref_value.len())?;
        check_patch_size(ctx, "refGradient", ref_gradient.len())?;
        check_patch_size(ctx, "valueFraction", value_fraction.len())?;
        if let Some(f) = value_fraction.iter().find(|f| !(0.0..=1.0).contains(*f)) {
            return Err(FvError::boundary_condition(
                ctx.name(),
                format!("valueFraction {} 不在 [0, 1] 内", f),
            ));
        }
        let mut pf = Self {
            ref_value,
            ref_gradient,
            value_fraction,
            values: vec![0.0; ctx.size()],
        };
        pf.evaluate(ctx, internal)?;
        Ok(pf)
    }
}

impl PatchField for MixedPatchField {
    fn type_name(&self) -> &'static str {
        "mixed"
    }

    fn values(&self) -> &[f64] {
        &self.values
    }

    fn fixes_value(&self) -> bool {
        self.value_fraction.iter().any(|&f| f > 0.0)
    }

    fn evaluate(&mut self, ctx: &PatchContext<'_>, internal: &[f64]) -> FvResult<()> {
        for i in 0..ctx.size() {
            let f = self.value_fraction[i];
            let extrapolated = internal[ctx.face_cells[i]] + self.ref_gradient[i] / ctx.delta_coeffs[i];
            self.values[i] = f * self.ref_value[i] + (1.0 - f) * extrapolated;
        }
        Ok(())
    }

    fn sn_grad(&self, ctx: &PatchContext<'_>, internal: &[f64]) -> FvResult<Vec<f64>> {
        Ok((0..ctx.size())
            .map(|i| {
                let f = self.value_fraction[i];
                let dc = ctx.delta_coeffs[i];
                f * dc * (self.ref_value[i] - internal[ctx.face_cells[i]]) + (1.0 - f) * self.ref_gradient[i]
            })
            .collect())
    }

    fn value_internal_coeffs(&self, _ctx: &PatchContext<'_>, _weights: &[f64]) -> FvResult<Vec<f64>> {
        Ok(self.value_fraction.iter().map(|&f| 1.0 - f).collect())
    }

    fn value_boundary_coeffs(&self, ctx: &PatchContext<'_>, _weights: &[f64]) -> FvResult<Vec<f64>> {
        Ok((0..ctx.size())
            .map(|i| {
                let f = self.value_fraction[i];
                f * self.ref_value[i] + (1.0 - f) * self.ref_gradient[i] / ctx.delta_coeffs[i]
            })
            .collect())
    }

    fn gradient_internal_coeffs(&self, ctx: &PatchContext<'_>) -> FvResult<Vec<f64>> {
        Ok(self.value_fraction.iter().zip(ctx.delta_coeffs).map(|(&f, &dc)| -f * dc).collect())
    }

    fn gradient_boundary_coeffs(&self, ctx: &PatchContext<'_>) -> FvResult<Vec<f64>> {
        Ok((0..ctx.size())
            .map(|i| {
                let f = self.value_fraction[i];
                f * ctx.delta_coeffs[i] * self.ref_value[i] + (1.0 - f) * self.ref_gradient[i]
            })
            .collect())
    }
}

// ============================================================
// calculated / extrapolated
// ============================================================

/// 由外部计算赋值的面值
#[derive(Debug, Clone)]
pub struct CalculatedPatchField {
    values: Vec<f64>,
}

impl CalculatedPatchField {
    /// 以初始面值创建
    pub fn new(ctx: &PatchContext<'_>, values: Vec<f64>) -> FvResult<Self> {
        check_patch_size(ctx, "value", values.len())?;
        Ok(Self { values })
    }

    fn not_implicit(&self, ctx: &PatchContext<'_>, what: &str) -> FvError {
        FvError::boundary_condition(
            ctx.name(),
            format!("calculated 边界不能提供 {}，请改用 fixedValue 或 zeroGradient 等类型", what),
        )
    }
}

impl PatchField for CalculatedPatchField {
    fn type_name(&self) -> &'static str {
        "calculated"
    }

    fn values(&self) -> &[f64] {
        &self.values
    }

    fn evaluate(&mut self, _ctx: &PatchContext<'_>, _internal: &[f64]) -> FvResult<()> {
        Ok(())
    }

    fn sn_grad(&self, ctx: &PatchContext<'_>, internal: &[f64]) -> FvResult<Vec<f64>> {
        Ok(ctx
            .face_cells
            .iter()
            .zip(&self.values)
            .zip(ctx.delta_coeffs)
            .map(|((&c, &v), &dc)| dc * (v - internal[c]))
            .collect())
    }

    fn value_internal_coeffs(&self, ctx: &PatchContext<'_>, _weights: &[f64]) -> FvResult<Vec<f64>> {
        Err(self.not_implicit(ctx, "valueInternalCoeffs"))
    }

    fn value_boundary_coeffs(&self, ctx: &PatchContext<'_>, _weights: &[f64]) -> FvResult<Vec<f64>> {
        Err(self.not_implicit(ctx, "valueBoundaryCoeffs"))
    }

    fn gradient_internal_coeffs(&self, ctx: &PatchContext<'_>) -> FvResult<Vec<f64>> {
        Err(self.not_implicit(ctx, "gradientInternalCoeffs"))
    }

    fn gradient_boundary_coeffs(&self, ctx: &PatchContext<'_>) -> FvResult<Vec<f64>> {
        Err(self.not_implicit(ctx, "gradientBoundaryCoeffs"))
    }

    fn assign(&mut self, ctx: &PatchContext<'_>, values: &[f64]) -> FvResult<()> {
        check_patch_size(ctx, "value", values.len())?;
        self.values.copy_from_slice(values);
        Ok(())
    }
}

/// 面值取相邻单元值的被动边界
#[derive(Debug, Clone)]
pub struct ExtrapolatedPatchField {
    values: Vec<f64>,
}

impl ExtrapolatedPatchField {
    /// 由内部场创建
    pub fn new(ctx: &PatchContext<'_>, internal: &[f64]) -> Self {
        Self {
            values: ctx.patch_internal_field(internal),
        }
    }
}

impl PatchField for ExtrapolatedPatchField {
    fn type_name(&self) -> &'static str {
        "extrapolated"
    }

    fn values(&self) -> &[f64] {
        &self.values
    }

    fn evaluate(&mut self, ctx: &PatchContext<'_>, internal: &[f64]) -> FvResult<()> {
        for (v, &c) in self.values.iter_mut().zip(ctx.face_cells) {
            *v = internal[c];
        }
        Ok(())
    }

    fn sn_grad(&self, ctx: &PatchContext<'_>, _internal: &[f64]) -> FvResult<Vec<f64>> {
        Ok(vec![0.0; ctx.size()])
    }

    fn value_internal_coeffs(&self, ctx: &PatchContext<'_>, _weights: &[f64]) -> FvResult<Vec<f64>> {
        Ok(vec![1.0; ctx.size()])
    }

    fn value_boundary_coeffs(&self, ctx: &PatchContext<'_>, _weights: &[f64]) -> FvResult<Vec<f64>> {
        Ok(vec![0.0; ctx.size()])
    }

    fn gradient_internal_coeffs(&self, ctx: &PatchContext<'_>) -> FvResult<Vec<f64>> {
        Ok(vec![0.0; ctx.size()])
    }

    fn gradient_boundary_coeffs(&self, ctx: &PatchContext<'_>) -> FvResult<Vec<f64>> {
        Ok(vec![0.0; ctx.size()])
    }

    fn assign(&mut self, ctx: &PatchContext<'_>, values: &[f64]) -> FvResult<()> {
        check_patch_size(ctx, "value", values.len())?;
        self.values.copy_from_slice(values);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::patch_field::test_support::Fixture;
    use fv_mesh::PatchKind;

    const INTERNAL: [f64; 2] = [1.0, 3.0];

    /// 面值系数与梯度系数应与 evaluate / sn_grad 一致
    fn check_consistent(pf: &mut dyn PatchField, fx: &Fixture) {
        let ctx = fx.ctx();
        pf.evaluate(&ctx, &INTERNAL).unwrap();
        let vic = pf.value_internal_coeffs(&ctx, ctx.weights).unwrap();
        let vbc = pf.value_boundary_coeffs(&ctx, ctx.weights).unwrap();
        let gic = pf.gradient_internal_coeffs(&ctx).unwrap();
        let gbc = pf.gradient_boundary_coeffs(&ctx).unwrap();
        let sn = pf.sn_grad(&ctx, &INTERNAL).unwrap();
        for i in 0..2 {
            let p = INTERNAL[ctx.face_cells[i]];
            assert!((vic[i] * p + vbc[i] - pf.values()[i]).abs() < 1e-12, "{} 面值", pf.type_name());
            assert!((gic[i] * p + gbc[i] - sn[i]).abs() < 1e-12, "{} 梯度", pf.type_name());
        }
    }

    #[test]
    fn test_coefficients_match_evaluation() {
        let fx = Fixture::new(PatchKind::Wall);
        let ctx = fx.ctx();
        let mut fields: Vec<Box<dyn PatchField>> = vec![
            Box::new(FixedValuePatchField::new(&ctx, vec![5.0, -1.0]).unwrap()),
            Box::new(FixedGradientPatchField::new(&ctx, vec![2.0, 0.5], &INTERNAL).unwrap()),
            Box::new(FixedGradientPatchField::zero_gradient(&ctx, &INTERNAL)),
            Box::new(MixedPatchField::new(&ctx, vec![4.0, 4.0], vec![1.0, 1.0], vec![0.3, 1.0], &INTERNAL).unwrap()),
            Box::new(ExtrapolatedPatchField::new(&ctx, &INTERNAL)),
        ];
        for pf in fields.iter_mut() {
            check_consistent(pf.as_mut(), &fx);
        }
    }

    #[test]
    fn test_fixed_gradient_extrapolates() {
        let fx = Fixture::new(PatchKind::Patch);
        let ctx = fx.ctx();
        let pf = FixedGradientPatchField::new(&ctx, vec![2.0, 2.0], &INTERNAL).unwrap();
        assert_eq!(pf.values(), &[2.0, 3.5]);
        assert_eq!(pf.type_name(), "fixedGradient");
    }

    #[test]
    fn test_calculated_rejects_implicit_use() {
        let fx = Fixture::new(PatchKind::Patch);
        let ctx = fx.ctx();
        let mut pf = CalculatedPatchField::new(&ctx, vec![0.0, 0.0]).unwrap();
        assert!(matches!(
            pf.gradient_internal_coeffs(&ctx),
            Err(FvError::BoundaryCondition { .. })
        ));
        pf.assign(&ctx, &[1.0, 2.0]).unwrap();
        assert_eq!(pf.values(), &[1.0, 2.0]);
        assert!(FixedValuePatchField::uniform(&ctx, 1.0).assign(&ctx, &[0.0, 0.0]).is_err());
    }

    #[test]
    fn test_mixed_fraction_range() {
        let fx = Fixture::new(PatchKind::Patch);
        let ctx = fx.ctx();
        let bad = MixedPatchField::new(&ctx, vec![0.0; 2], vec![0.0; 2], vec![1.5, 0.0], &INTERNAL);
        assert!(bad.is_err());
    }
}
