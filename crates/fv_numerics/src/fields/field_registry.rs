// crates/fv_numerics/src/fields/field_registry.rs

//! 按名称存放的场集合

use std::collections::BTreeMap;

use fv_foundation::{FvError, FvResult};

use super::surface_field::SurfaceScalarField;
use super::vol_field::VolScalarField;

/// 场注册表
#[derive(Debug, Default)]
pub struct FieldRegistry {
    vol: BTreeMap<String, VolScalarField>,
    surface: BTreeMap<String, SurfaceScalarField>,
}

impl FieldRegistry {
    /// 空注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 加入体场，同名时替换并返回旧场
    pub fn insert(&mut self, field: VolScalarField) -> Option<VolScalarField> {
        self.vol.insert(field.name().to_string(), field)
    }

    /// 加入面场
    pub fn insert_surface(&mut self, field: SurfaceScalarField) -> Option<SurfaceScalarField> {
        self.surface.insert(field.name().to_string(), field)
    }

    /// 体场
    pub fn get(&self, name: &str) -> FvResult<&VolScalarField> {
        self.vol.get(name).ok_or_else(|| FvError::not_found(format!("体场 '{}'", name)))
    }

    /// 体场（可写）
    pub fn get_mut(&mut self, name: &str) -> FvResult<&mut VolScalarField> {
        self.vol.get_mut(name).ok_or_else(|| FvError::not_found(format!("体场 '{}'", name)))
    }

    /// 面场
    pub fn surface(&self, name: &str) -> FvResult<&SurfaceScalarField> {
        self.surface.get(name).ok_or_else(|| FvError::not_found(format!("面场 '{}'", name)))
    }

    /// 移除体场
    pub fn remove(&mut self, name: &str) -> FvResult<VolScalarField> {
        self.vol.remove(name).ok_or_else(|| FvError::not_found(format!("体场 '{}'", name)))
    }

    /// 是否存在体场
    pub fn contains(&self, name: &str) -> bool {
        self.vol.contains_key(name)
    }

    /// 体场名称（有序）
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.vol.keys().map(String::as_str)
    }

    /// 按名称顺序遍历体场
    pub fn iter(&self) -> impl Iterator<Item = (&str, &VolScalarField)> {
        self.vol.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// 全部体场（按名称）
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut VolScalarField> {
        self.vol.values_mut()
    }

    /// 体场数
    pub fn len(&self) -> usize {
        self.vol.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.vol.is_empty() && self.surface.is_empty()
    }

    /// 清空
    pub fn clear(&mut self) {
        self.vol.clear();
        self.surface.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::PatchFieldRegistry;
    use crate::mesh::FvMesh;
    use crate::parallel::SerialComm;
    use fv_config::{BoundarySpec, CommsType};
    use fv_mesh::BlockMeshGenerator;

    #[test]
    fn test_lookup() {
        let poly = BlockMeshGenerator::chain(2, 1.0).with_single_patch("walls").build().unwrap();
        let mesh = FvMesh::new(poly, &SerialComm, CommsType::NonBlocking).unwrap();
        let mut specs = BTreeMap::new();
        specs.insert("walls".to_string(), BoundarySpec::zero_gradient());
        let f = VolScalarField::uniform("T", &mesh, 1.0, &specs, &PatchFieldRegistry::default()).unwrap();

        let mut reg = FieldRegistry::new();
        assert!(reg.insert(f).is_none());
        assert!(reg.contains("T"));
        assert_eq!(reg.get("T").unwrap().internal(), &[1.0, 1.0]);
        assert!(matches!(reg.get("p"), Err(FvError::NotFound { .. })));
        assert_eq!(reg.names().collect::<Vec<_>>(), vec!["T"]);
        reg.remove("T").unwrap();
        assert!(reg.is_empty());
    }
}
