// crates/fv_numerics/src/fields/vol_field.rs

//! 体标量场
//!
//! 内部值按单元存放，每个面片持有一个多态的边界场。场记录创建时的拓扑纪元，
//! 网格拓扑变化后旧场不能再参与装配。

use std::collections::BTreeMap;

use fv_config::{BoundarySpec, FieldConfig};
use fv_foundation::{FvError, FvResult};

use super::patch_field::PatchField;
use super::registry::PatchFieldRegistry;
use crate::mesh::FvMesh;
use crate::parallel::Communicator;

/// 体标量场
#[derive(Debug)]
pub struct VolScalarField {
    name: String,
    internal: Vec<f64>,
    boundary: Vec<Box<dyn PatchField>>,
    old_time: Option<Vec<f64>>,
    epoch: u64,
}

impl VolScalarField {
    /// 按每个面片的声明创建
    ///
    /// 声明按面片名查找；耦合面片可以不声明。
    pub fn new(
        name: impl Into<String>,
        mesh: &FvMesh,
        internal: Vec<f64>,
        specs: &BTreeMap<String, BoundarySpec>,
        registry: &PatchFieldRegistry,
    ) -> FvResult<Self> {
        let name = name.into();
        FvError::check_size("internal", mesh.n_cells(), internal.len())?;
        let mut boundary = Vec::with_capacity(mesh.n_patches());
        for patchi in 0..mesh.n_patches() {
            let ctx = mesh.patch_context(patchi)?;
            let pf = registry.create(specs.get(ctx.name()), &ctx, &internal).map_err(|e| match e {
                FvError::BoundaryCondition { patch, message } => {
                    FvError::boundary_condition(patch, format!("场 {}: {}", name, message))
                }
                other => other,
            })?;
            boundary.push(pf);
        }
        Ok(Self {
            name,
            internal,
            boundary,
            old_time: None,
            epoch: mesh.topology_epoch(),
        })
    }

    /// 均匀内部值
    pub fn uniform(
        name: impl Into<String>,
        mesh: &FvMesh,
        value: f64,
        specs: &BTreeMap<String, BoundarySpec>,
        registry: &PatchFieldRegistry,
    ) -> FvResult<Self> {
        Self::new(name, mesh, vec![value; mesh.n_cells()], specs, registry)
    }

    /// 按配置创建
    pub fn from_config(
        name: impl Into<String>,
        config: &FieldConfig,
        mesh: &FvMesh,
        registry: &PatchFieldRegistry,
    ) -> FvResult<Self> {
        Self::uniform(name, mesh, config.initial, &config.boundary, registry)
    }

    /// 直接给定边界场
    pub fn with_patch_fields(
        name: impl Into<String>,
        mesh: &FvMesh,
        internal: Vec<f64>,
        boundary: Vec<Box<dyn PatchField>>,
    ) -> FvResult<Self> {
        FvError::check_size("internal", mesh.n_cells(), internal.len())?;
        FvError::check_size("boundary", mesh.n_patches(), boundary.len())?;
        Ok(Self {
            name: name.into(),
            internal,
            boundary,
            old_time: None,
            epoch: mesh.topology_epoch(),
        })
    }

    /// 场名
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 内部值
    #[inline]
    pub fn internal(&self) -> &[f64] {
        &self.internal
    }

    /// 内部值（可写），修改后需调用 [`correct_boundary_conditions`](Self::correct_boundary_conditions)
    #[inline]
    pub fn internal_mut(&mut self) -> &mut [f64] {
        &mut self.internal
    }

    /// 边界场
    #[inline]
    pub fn boundary(&self) -> &[Box<dyn PatchField>] {
        &self.boundary
    }

    /// 单个面片的边界场
    pub fn patch(&self, patchi: usize) -> FvResult<&dyn PatchField> {
        FvError::check_index("patch", patchi, self.boundary.len())?;
        Ok(self.boundary[patchi].as_ref())
    }

    /// 单个面片的边界场（可写）
    pub fn patch_mut(&mut self, patchi: usize) -> FvResult<&mut Box<dyn PatchField>> {
        FvError::check_index("patch", patchi, self.boundary.len())?;
        Ok(&mut self.boundary[patchi])
    }

    /// 创建时的拓扑纪元
    #[inline]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// 是否有面片固定了值
    pub fn has_fixed_value(&self) -> bool {
        self.boundary.iter().any(|pf| pf.fixes_value())
    }

    /// 保存当前值为上一时间层
    pub fn store_old_time(&mut self) {
        self.old_time = Some(self.internal.clone());
    }

    /// 上一时间层，未保存时为当前值
    pub fn old_time(&self) -> &[f64] {
        self.old_time.as_deref().unwrap_or(&self.internal)
    }

    /// 交换耦合面片的对侧值并更新全部边界面值
    ///
    /// 耦合面片按界面调度的顺序发送与接收，所有分区必须同时调用。
    pub fn correct_boundary_conditions(&mut self, mesh: &FvMesh, comm: &dyn Communicator) -> FvResult<()> {
        mesh.check_epoch(self.epoch, "correct_boundary_conditions")?;
        let ldu = mesh.ldu();
        let interfaces = ldu.interfaces();
        for entry in ldu.schedule().entries() {
            let Some(iface) = interfaces[entry.patch].as_ref() else {
                continue;
            };
            if entry.init {
                iface.init_transfer(comm, &self.internal)?;
            } else {
                let nbr = iface.transfer(comm, &self.internal)?;
                let ctx = mesh.patch_context(entry.patch)?;
                self.boundary[entry.patch].set_patch_neighbour_field(&ctx, nbr)?;
            }
        }
        for (patchi, pf) in self.boundary.iter_mut().enumerate() {
            let ctx = mesh.patch_context(patchi)?;
            pf.evaluate(&ctx, &self.internal)?;
        }
        Ok(())
    }

    /// 检查内部值是否有限
    pub fn validate(&self) -> FvResult<()> {
        match self.internal.iter().position(|v| !v.is_finite()) {
            Some(i) => Err(FvError::non_finite(format!("场 {} 单元 {} = {}", self.name, i, self.internal[i]))),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::SerialComm;
    use fv_config::CommsType;
    use fv_mesh::BlockMeshGenerator;

    fn chain_mesh(n: usize) -> FvMesh {
        let poly = BlockMeshGenerator::chain(n, n as f64).build().unwrap();
        FvMesh::new(poly, &SerialComm, CommsType::NonBlocking).unwrap()
    }

    fn specs() -> BTreeMap<String, BoundarySpec> {
        let mut s = BTreeMap::new();
        s.insert("xMin".to_string(), BoundarySpec::fixed_value(1.0));
        s.insert("xMax".to_string(), BoundarySpec::fixed_gradient(2.0));
        for p in ["yMin", "yMax", "zMin", "zMax"] {
            s.insert(p.to_string(), BoundarySpec::zero_gradient());
        }
        s
    }

    #[test]
    fn test_create_and_correct() {
        let mesh = chain_mesh(3);
        let reg = PatchFieldRegistry::with_builtins();
        let mut f = VolScalarField::new("T", &mesh, vec![0.0, 1.0, 2.0], &specs(), &reg).unwrap();
        assert!(f.has_fixed_value());
        f.internal_mut()[2] = 5.0;
        f.correct_boundary_conditions(&mesh, &SerialComm).unwrap();
        let xmax = mesh.poly().find_patch("xMax").unwrap();
        // 5 + 2 * 0.5
        assert!((f.patch(xmax).unwrap().values()[0] - 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_missing_spec_names_field() {
        let mesh = chain_mesh(2);
        let reg = PatchFieldRegistry::with_builtins();
        let mut s = specs();
        s.remove("yMin");
        let err = VolScalarField::uniform("T", &mesh, 0.0, &s, &reg).unwrap_err();
        match err {
            FvError::BoundaryCondition { patch, message } => {
                assert_eq!(patch, "yMin");
                assert!(message.contains("T"));
            }
            other => panic!("意外结果: {:?}", other),
        }
    }

    #[test]
    fn test_cyclic_neighbour_values() {
        let poly = BlockMeshGenerator::chain(4, 4.0).with_cyclic_x().build().unwrap();
        let mesh = FvMesh::new(poly, &SerialComm, CommsType::NonBlocking).unwrap();
        let reg = PatchFieldRegistry::with_builtins();
        let mut s = BTreeMap::new();
        for p in ["yMin", "yMax", "zMin", "zMax"] {
            s.insert(p.to_string(), BoundarySpec::zero_gradient());
        }
        let mut f = VolScalarField::new("T", &mesh, vec![1.0, 2.0, 3.0, 4.0], &s, &reg).unwrap();
        f.correct_boundary_conditions(&mesh, &SerialComm).unwrap();
        let xmin = mesh.poly().find_patch("xMin").unwrap();
        let pf = f.patch(xmin).unwrap();
        assert!(pf.is_coupled());
        assert_eq!(pf.patch_neighbour_field().unwrap(), &[4.0]);
        assert!((pf.values()[0] - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_old_time_and_epoch() {
        let mut mesh = chain_mesh(2);
        let reg = PatchFieldRegistry::with_builtins();
        let mut f = VolScalarField::uniform("T", &mesh, 3.0, &specs(), &reg).unwrap();
        assert_eq!(f.old_time(), &[3.0, 3.0]);
        f.store_old_time();
        f.internal_mut()[0] = 1.0;
        assert_eq!(f.old_time(), &[3.0, 3.0]);

        mesh.poly_mut().bump_topology_epoch();
        mesh.update(&SerialComm).unwrap();
        assert!(matches!(
            f.correct_boundary_conditions(&mesh, &SerialComm),
            Err(FvError::AssemblyMismatch { .. })
        ));
    }
}
