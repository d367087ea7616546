// crates/fv_numerics/src/fields/patch_field.rs

//! 边界场能力接口
//!
//! 每种边界条件实现 [`PatchField`]，向装配提供四组系数：
//!
//! ```text
//! 面值        ψ_f      = valueInternalCoeffs    · ψ_P + valueBoundaryCoeffs
//! 法向梯度    ∂ψ/∂n|_f = gradientInternalCoeffs · ψ_P + gradientBoundaryCoeffs
//! ```
//!
//! 对耦合面片，`*BoundaryCoeffs` 是乘在对侧单元值上的系数，而不是常数项。
//! 装配与求解只通过这组接口访问边界条件，新增边界条件类型无需改动它们。

use std::fmt::Debug;

use fv_foundation::{FvError, FvResult};
use fv_mesh::Patch;

/// 面片的几何视图
#[derive(Debug, Clone, Copy)]
pub struct PatchContext<'a> {
    /// 面片编号
    pub index: usize,
    /// 网格面片
    pub patch: &'a Patch,
    /// 面 → 相邻内部单元
    pub face_cells: &'a [usize],
    /// delta 系数（边界面为 `1 / n·d`）
    pub delta_coeffs: &'a [f64],
    /// 线性插值权重（本侧）
    pub weights: &'a [f64],
    /// 面积大小
    pub mag_sf: &'a [f64],
}

impl<'a> PatchContext<'a> {
    /// 面数
    #[inline]
    pub fn size(&self) -> usize {
        self.face_cells.len()
    }

    /// 面片名称
    #[inline]
    pub fn name(&self) -> &'a str {
        &self.patch.name
    }

    /// 相邻单元的内部值
    pub fn patch_internal_field(&self, internal: &[f64]) -> Vec<f64> {
        self.face_cells.iter().map(|&c| internal[c]).collect()
    }
}

/// 边界场能力接口
pub trait PatchField: Debug + Send + Sync {
    /// 类型名（与注册表键一致）
    fn type_name(&self) -> &'static str;

    /// 面值
    fn values(&self) -> &[f64];

    /// 是否为耦合面片
    fn is_coupled(&self) -> bool {
        false
    }

    /// 面值是否由边界条件固定（决定矩阵是否需要参考值）
    fn fixes_value(&self) -> bool {
        false
    }

    /// 由内部场更新面值
    fn evaluate(&mut self, ctx: &PatchContext<'_>, internal: &[f64]) -> FvResult<()>;

    /// 面法向梯度
    fn sn_grad(&self, ctx: &PatchContext<'_>, internal: &[f64]) -> FvResult<Vec<f64>>;

    /// 面值的内部系数，`weights` 为插值格式给出的本侧权重
    fn value_internal_coeffs(&self, ctx: &PatchContext<'_>, weights: &[f64]) -> FvResult<Vec<f64>>;

    /// 面值的边界系数
    fn value_boundary_coeffs(&self, ctx: &PatchContext<'_>, weights: &[f64]) -> FvResult<Vec<f64>>;

    /// 法向梯度的内部系数
    fn gradient_internal_coeffs(&self, ctx: &PatchContext<'_>) -> FvResult<Vec<f64>>;

    /// 法向梯度的边界系数
    fn gradient_boundary_coeffs(&self, ctx: &PatchContext<'_>) -> FvResult<Vec<f64>>;

    /// 耦合面片的对侧单元值
    fn patch_neighbour_field(&self) -> Option<&[f64]> {
        None
    }

    /// 写入交换得到的对侧单元值
    fn set_patch_neighbour_field(&mut self, ctx: &PatchContext<'_>, _values: Vec<f64>) -> FvResult<()> {
        Err(FvError::boundary_condition(
            ctx.name(),
            format!("'{}' 不是耦合边界，不能接收对侧值", self.type_name()),
        ))
    }

    /// 直接指定面值（仅 calculated 等被动边界允许）
    fn assign(&mut self, ctx: &PatchContext<'_>, _values: &[f64]) -> FvResult<()> {
        Err(FvError::boundary_condition(
            ctx.name(),
            format!("'{}' 的面值由边界条件决定，不能直接赋值", self.type_name()),
        ))
    }
}

/// 按面片大小检查边界参数长度
pub(crate) fn check_patch_size(ctx: &PatchContext<'_>, what: &'static str, len: usize) -> FvResult<()> {
    if len == ctx.size() {
        return Ok(());
    }
    Err(FvError::boundary_condition(
        ctx.name(),
        format!("{} 长度 {} 与面片面数 {} 不一致", what, len, ctx.size()),
    ))
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use fv_mesh::PatchKind;

    /// 测试用的两面边界面片
    pub struct Fixture {
        pub patch: Patch,
        pub face_cells: Vec<usize>,
        pub delta_coeffs: Vec<f64>,
        pub weights: Vec<f64>,
        pub mag_sf: Vec<f64>,
    }

    impl Fixture {
        pub fn new(kind: PatchKind) -> Self {
            Self {
                patch: Patch::new("wall", 10, 2, kind),
                face_cells: vec![0, 1],
                delta_coeffs: vec![2.0, 4.0],
                weights: vec![0.5, 0.25],
                mag_sf: vec![1.0, 1.0],
            }
        }

        pub fn ctx(&self) -> PatchContext<'_> {
            PatchContext {
                index: 0,
                patch: &self.patch,
                face_cells: &self.face_cells,
                delta_coeffs: &self.delta_coeffs,
                weights: &self.weights,
                mag_sf: &self.mag_sf,
            }
        }
    }
}
