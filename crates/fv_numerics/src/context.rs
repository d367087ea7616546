// crates/fv_numerics/src/context.rs

//! 运行上下文
//!
//! [`SimulationContext`] 显式持有一次运行所需的全部状态，不使用任何进程级全局量：
//!
//! ```text
//! init(config, poly, comm)
//!   ├─ 解析全部求解控制（名称错误在此报告）
//!   ├─ 构建 FvMesh（几何 + LDU 寻址 + 界面调度）
//!   └─ 按配置创建场并修正边界
//! solve(field, eqn) ... advance_time() ... update_mesh()
//! teardown() -> PerformanceLog
//! ```

use std::collections::BTreeMap;

use fv_config::{CaseConfig, FieldConfig};
use fv_foundation::{FvError, FvResult};
use fv_mesh::PolyMesh;

use crate::discretization::{fvm, FvMatrix, LaplacianScheme};
use crate::fields::{FieldRegistry, PatchFieldRegistry, VolScalarField};
use crate::linear_algebra::{resolve_controls, ResolvedControls, SolverPerformance};
use crate::mesh::FvMesh;
use crate::parallel::Communicator;
use crate::performance_log::PerformanceLog;

/// 运行上下文
pub struct SimulationContext {
    config: CaseConfig,
    mesh: FvMesh,
    fields: FieldRegistry,
    controls: BTreeMap<String, ResolvedControls>,
    patch_fields: PatchFieldRegistry,
    comm: Box<dyn Communicator>,
    log: PerformanceLog,
    time_index: usize,
}

impl std::fmt::Debug for SimulationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationContext")
            .field("rank", &self.comm.rank())
            .field("n_cells", &self.mesh.n_cells())
            .field("fields", &self.fields.names().collect::<Vec<_>>())
            .field("time_index", &self.time_index)
            .finish()
    }
}

impl SimulationContext {
    /// 使用内置边界条件初始化
    pub fn init(config: CaseConfig, poly: PolyMesh, comm: Box<dyn Communicator>) -> FvResult<Self> {
        Self::init_with_registry(config, poly, comm, PatchFieldRegistry::with_builtins())
    }

    /// 使用给定的边界条件注册表初始化
    pub fn init_with_registry(
        config: CaseConfig,
        poly: PolyMesh,
        comm: Box<dyn Communicator>,
        patch_fields: PatchFieldRegistry,
    ) -> FvResult<Self> {
        config.validate()?;
        let mut controls = BTreeMap::new();
        for (key, c) in &config.solvers {
            controls.insert(key.clone(), resolve_controls(c)?);
        }

        let mesh = FvMesh::new(poly, comm.as_ref(), config.comms_type)?;
        let mut fields = FieldRegistry::new();
        for (name, fc) in &config.fields {
            let mut f = VolScalarField::from_config(name.as_str(), fc, &mesh, &patch_fields)?;
            f.correct_boundary_conditions(&mesh, comm.as_ref())?;
            fields.insert(f);
        }

        log::info!(
            "分区 {}/{}: {} 单元, {} 内部面, {} 面片, {} 个场, 通信方式 {}",
            comm.rank(),
            comm.n_procs(),
            mesh.n_cells(),
            mesh.n_internal_faces(),
            mesh.n_patches(),
            fields.len(),
            config.comms_type
        );

        Ok(Self {
            config,
            mesh,
            fields,
            controls,
            patch_fields,
            comm,
            log: PerformanceLog::new(),
            time_index: 0,
        })
    }

    /// 结束运行并交出性能日志
    pub fn teardown(self) -> PerformanceLog {
        log::info!(
            "分区 {} 结束: {} 个时间步, {} 次线性求解",
            self.comm.rank(),
            self.time_index,
            self.log.len()
        );
        self.log
    }

    /// 配置
    #[inline]
    pub fn config(&self) -> &CaseConfig {
        &self.config
    }

    /// 网格
    #[inline]
    pub fn mesh(&self) -> &FvMesh {
        &self.mesh
    }

    /// 网格（可写），拓扑修改后需调用 [`update_mesh`](Self::update_mesh)
    #[inline]
    pub fn mesh_mut(&mut self) -> &mut FvMesh {
        &mut self.mesh
    }

    /// 场
    #[inline]
    pub fn fields(&self) -> &FieldRegistry {
        &self.fields
    }

    /// 场（可写）
    #[inline]
    pub fn fields_mut(&mut self) -> &mut FieldRegistry {
        &mut self.fields
    }

    /// 通信器
    #[inline]
    pub fn comm(&self) -> &dyn Communicator {
        self.comm.as_ref()
    }

    /// 性能日志
    #[inline]
    pub fn performance_log(&self) -> &PerformanceLog {
        &self.log
    }

    /// 当前时间步编号
    #[inline]
    pub fn time_index(&self) -> usize {
        self.time_index
    }

    /// 场的求解控制
    pub fn controls_for(&self, field: &str) -> FvResult<&ResolvedControls> {
        lookup_controls(&self.config, &self.controls, field)
    }

    /// 场的配置
    pub fn field_config(&self, field: &str) -> FvResult<&FieldConfig> {
        self.config
            .fields
            .get(field)
            .ok_or_else(|| FvError::not_found(format!("fields.{}", field)))
    }

    /// 装配稳态扩散方程 `-∇·(Γ∇ψ) = S`，按场配置的格式与亚松弛因子
    pub fn diffusion_equation(&self, field: &str) -> FvResult<FvMatrix> {
        let fc = self.field_config(field)?;
        let scheme: LaplacianScheme = fc.laplacian_scheme.parse()?;
        let psi = self.fields.get(field)?;
        let mut eqn = fvm::laplacian(&fvm::Diffusivity::Uniform(fc.diffusivity), psi, &self.mesh, scheme)?;
        eqn.negate();
        if fc.source != 0.0 {
            eqn.sub_explicit(&vec![fc.source; self.mesh.n_cells()], &self.mesh)?;
        }
        if fc.relaxation_factor < 1.0 {
            eqn.relax(psi, fc.relaxation_factor)?;
        }
        Ok(eqn)
    }

    /// 求解方程并记录性能，所有分区必须同时调用
    pub fn solve(&mut self, field: &str, eqn: &FvMatrix) -> FvResult<SolverPerformance> {
        let controls = lookup_controls(&self.config, &self.controls, field)?;
        let psi = self.fields.get_mut(field)?;
        let perf = eqn.solve(psi, &self.mesh, self.comm.as_ref(), controls, self.config.precision)?;
        self.log.record(self.time_index, &perf);
        Ok(perf)
    }

    /// 进入下一时间步，保存各场的旧值
    pub fn advance_time(&mut self) {
        for f in self.fields.iter_mut() {
            f.store_old_time();
        }
        self.time_index += 1;
        log::debug!("时间步 {}", self.time_index);
    }

    /// 按纪元重建网格视图，返回是否重建了寻址
    ///
    /// 拓扑变化后各场按配置重新创建。所有分区必须同时调用。
    pub fn update_mesh(&mut self) -> FvResult<bool> {
        let rebuilt = self.mesh.update(self.comm.as_ref())?;
        if rebuilt {
            log::warn!("网格拓扑已变化，按配置重新创建 {} 个场", self.fields.len());
            self.fields.clear();
            for (name, fc) in &self.config.fields {
                let mut f = VolScalarField::from_config(name.as_str(), fc, &self.mesh, &self.patch_fields)?;
                f.correct_boundary_conditions(&self.mesh, self.comm.as_ref())?;
                self.fields.insert(f);
            }
        }
        Ok(rebuilt)
    }
}

fn lookup_controls<'a>(
    config: &CaseConfig,
    controls: &'a BTreeMap<String, ResolvedControls>,
    field: &str,
) -> FvResult<&'a ResolvedControls> {
    config
        .controls_key(field)
        .and_then(|key| controls.get(key))
        .ok_or_else(|| FvError::not_found(format!("solvers.{}", field)))
}
