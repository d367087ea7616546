// crates/fv_numerics/src/fields/registry.rs

//! 边界条件注册表
//!
//! 非耦合边界条件按名称注册构造函数，配置中的类型名在场创建时解析。
//! 耦合边界由网格面片类型决定，不经过注册表。

use std::collections::HashMap;

use fv_config::BoundarySpec;
use fv_foundation::{FvError, FvResult};

use super::basic::{
    CalculatedPatchField, ExtrapolatedPatchField, FixedGradientPatchField, FixedValuePatchField, MixedPatchField,
};
use super::coupled::CoupledPatchField;
use super::patch_field::{PatchContext, PatchField};

/// 边界场构造函数
pub type PatchFieldConstructor =
    fn(spec: &BoundarySpec, ctx: &PatchContext<'_>, internal: &[f64]) -> FvResult<Box<dyn PatchField>>;

/// 边界条件注册表
#[derive(Debug, Clone)]
pub struct PatchFieldRegistry {
    table: HashMap<String, PatchFieldConstructor>,
}

fn required(spec: &BoundarySpec, ctx: &PatchContext<'_>, key: &str, value: Option<f64>) -> FvResult<f64> {
    value.ok_or_else(|| FvError::boundary_condition(ctx.name(), format!("'{}' 缺少参数 {}", spec.kind, key)))
}

fn fixed_value(spec: &BoundarySpec, ctx: &PatchContext<'_>, _internal: &[f64]) -> FvResult<Box<dyn PatchField>> {
    let v = required(spec, ctx, "value", spec.value)?;
    Ok(Box::new(FixedValuePatchField::uniform(ctx, v)))
}

fn fixed_gradient(spec: &BoundarySpec, ctx: &PatchContext<'_>, internal: &[f64]) -> FvResult<Box<dyn PatchField>> {
    let g = required(spec, ctx, "gradient", spec.gradient)?;
    Ok(Box::new(FixedGradientPatchField::new(ctx, vec![g; ctx.size()], internal)?))
}

fn zero_gradient(_spec: &BoundarySpec, ctx: &PatchContext<'_>, internal: &[f64]) -> FvResult<Box<dyn PatchField>> {
    Ok(Box::new(FixedGradientPatchField::zero_gradient(ctx, internal)))
}

fn mixed(spec: &BoundarySpec, ctx: &PatchContext<'_>, internal: &[f64]) -> FvResult<Box<dyn PatchField>> {
    let n = ctx.size();
    let ref_value = required(spec, ctx, "refValue", spec.ref_value)?;
    let fraction = required(spec, ctx, "valueFraction", spec.value_fraction)?;
    let ref_gradient = spec.ref_gradient.unwrap_or(0.0);
    Ok(Box::new(MixedPatchField::new(
        ctx,
        vec![ref_value; n],
        vec![ref_gradient; n],
        vec![fraction; n],
        internal,
    )?))
}

fn calculated(spec: &BoundarySpec, ctx: &PatchContext<'_>, internal: &[f64]) -> FvResult<Box<dyn PatchField>> {
    let values = match spec.value {
        Some(v) => vec![v; ctx.size()],
        None => ctx.patch_internal_field(internal),
    };
    Ok(Box::new(CalculatedPatchField::new(ctx, values)?))
}

fn extrapolated(_spec: &BoundarySpec, ctx: &PatchContext<'_>, internal: &[f64]) -> FvResult<Box<dyn PatchField>> {
    Ok(Box::new(ExtrapolatedPatchField::new(ctx, internal)))
}

impl PatchFieldRegistry {
    /// 空注册表
    pub fn empty() -> Self {
        Self { table: HashMap::new() }
    }

    /// 含全部内建边界条件
    pub fn with_builtins() -> Self {
        let mut reg = Self::empty();
        reg.register("fixedValue", fixed_value);
        reg.register("fixedGradient", fixed_gradient);
        reg.register("zeroGradient", zero_gradient);
        reg.register("mixed", mixed);
        reg.register("calculated", calculated);
        reg.register("extrapolated", extrapolated);
        reg
    }

    /// 注册（同名覆盖）
    pub fn register(&mut self, name: impl Into<String>, ctor: PatchFieldConstructor) {
        self.table.insert(name.into(), ctor);
    }

    /// 全部名称（排序）
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.table.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// 是否已注册
    pub fn contains(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }

    /// 按声明创建边界场
    ///
    /// 耦合面片总是得到耦合边界场，声明可省略；若声明了类型，必须与面片类型一致。
    pub fn create(
        &self,
        spec: Option<&BoundarySpec>,
        ctx: &PatchContext<'_>,
        internal: &[f64],
    ) -> FvResult<Box<dyn PatchField>> {
        let patch_type = ctx.patch.kind.type_name();
        if ctx.patch.is_coupled() {
            if let Some(spec) = spec {
                if spec.kind != patch_type {
                    return Err(FvError::boundary_condition(
                        ctx.name(),
                        format!("耦合面片 ({}) 不能使用边界条件 '{}'", patch_type, spec.kind),
                    ));
                }
            }
            return Ok(Box::new(CoupledPatchField::new(ctx, internal)?));
        }

        let spec = spec.ok_or_else(|| FvError::boundary_condition(ctx.name(), "缺少边界条件声明"))?;
        if spec.kind == "processor" || spec.kind == "cyclic" {
            return Err(FvError::boundary_condition(
                ctx.name(),
                format!("'{}' 只能用于对应类型的耦合面片，当前面片类型为 {}", spec.kind, patch_type),
            ));
        }
        let ctor = self
            .table
            .get(&spec.kind)
            .ok_or_else(|| FvError::unknown_selection("boundary condition", spec.kind.clone(), self.names()))?;
        ctor(spec, ctx, internal)
    }
}

impl Default for PatchFieldRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
