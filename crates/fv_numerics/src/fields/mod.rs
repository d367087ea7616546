// crates/fv_numerics/src/fields/mod.rs

//! 几何场与边界条件
//!
//! ```text
//! FieldConfig ──> PatchFieldRegistry ──> Box<dyn PatchField> (每个面片)
//!                                              │
//!            VolScalarField ◄──────────────────┘
//!                 │ correct_boundary_conditions (按界面调度交换)
//!                 ▼
//!            FieldRegistry
//! ```

pub mod basic;
pub mod coupled;
pub mod field_registry;
pub mod patch_field;
pub mod registry;
pub mod surface_field;
pub mod vol_field;

pub use basic::{
    CalculatedPatchField, ExtrapolatedPatchField, FixedGradientPatchField, FixedValuePatchField, MixedPatchField,
};
pub use coupled::CoupledPatchField;
pub use field_registry::FieldRegistry;
pub use patch_field::{PatchContext, PatchField};
pub use registry::{PatchFieldConstructor, PatchFieldRegistry};
pub use surface_field::SurfaceScalarField;
pub use vol_field::VolScalarField;
