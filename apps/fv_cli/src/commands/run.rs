// apps/fv_cli/src/commands/run.rs

//! 运行算例命令
//!
//! 按配置生成块网格，对每个场装配稳态扩散方程并求解。分区数大于 1 时
//! 先做区域分解，各分区在独立线程上运行，结果拼回全局场。

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;
use fv_config::{CaseConfig, CommsType, Precision};
use fv_foundation::FvResult;
use fv_mesh::{decompose, reconstruct_cell_field, simple_distribution, BlockMeshGenerator, MeshGeometry, PolyMesh};
use fv_numerics::linear_algebra::SolverStatus;
use fv_numerics::parallel::{run_partitioned, Communicator, SerialComm};
use fv_numerics::{PerformanceLog, SimulationContext};
use tracing::{info, warn};

/// 运行参数
#[derive(Args)]
pub struct RunArgs {
    /// 配置文件路径，缺省时使用内置算例
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 外迭代次数（每次对所有场各求解一次）
    #[arg(long, default_value = "1")]
    pub steps: usize,

    /// 覆盖分区数
    #[arg(short = 'n', long)]
    pub n_procs: Option<usize>,

    /// 覆盖通信方式 (blocking, scheduled, nonBlocking)
    #[arg(long)]
    pub comms: Option<CommsType>,

    /// 覆盖求解精度 (f32, f64)
    #[arg(long)]
    pub precision: Option<Precision>,

    /// 求解性能日志的 JSON 输出路径
    #[arg(long)]
    pub log_json: Option<PathBuf>,
}

/// 一次运行的结果
struct RunOutcome {
    fields: BTreeMap<String, Vec<f64>>,
    log: PerformanceLog,
}

/// 执行运行命令
pub fn execute(args: RunArgs) -> Result<()> {
    let mut config = super::load_case(args.config.as_deref())?;
    if let Some(n) = args.n_procs {
        config.decomposition.n_procs = n;
    }
    if let Some(comms) = args.comms {
        config.comms_type = comms;
    }
    if let Some(precision) = args.precision {
        config.precision = precision;
    }
    config.validate().context("配置无效")?;

    let poly = BlockMeshGenerator::new(config.mesh.cells, config.mesh.lengths).build()?;
    info!(
        "网格: {:?} 单元, {} 个面, 精度 {}, 通信方式 {}",
        config.mesh.cells,
        poly.n_faces(),
        config.precision,
        config.comms_type
    );

    let start = Instant::now();
    let outcome = if config.decomposition.n_procs > 1 {
        run_decomposed(&config, &poly, args.steps)?
    } else {
        let ctx = SimulationContext::init(config.clone(), poly, Box::new(SerialComm))?;
        let (fields, log) = run_steps(ctx, args.steps)?;
        RunOutcome { fields, log }
    };
    let elapsed = start.elapsed();

    println!("{}", outcome.log.render_table());
    for (name, values) in &outcome.fields {
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        println!("{}: min = {:.6e}, max = {:.6e}", name, min, max);
    }
    info!("计算时间: {:.3} s", elapsed.as_secs_f64());

    if let Some(path) = &args.log_json {
        outcome.log.write_json(path)?;
        info!("性能日志已写入 {}", path.display());
    }
    if outcome.log.has_failures() {
        warn!("存在未收敛的线性求解");
    }
    Ok(())
}

/// 对所有场循环装配并求解，返回各场的单元值与性能日志
fn run_steps(mut ctx: SimulationContext, steps: usize) -> FvResult<(BTreeMap<String, Vec<f64>>, PerformanceLog)> {
    let names: Vec<String> = ctx.config().fields.keys().cloned().collect();
    for _ in 0..steps.max(1) {
        for name in &names {
            let eqn = ctx.diffusion_equation(name)?;
            let perf = ctx.solve(name, &eqn)?;
            if perf.status == SolverStatus::Diverged {
                warn!("{} 发散，停止后续外迭代", name);
                return Ok(collect(ctx));
            }
        }
        ctx.advance_time();
    }
    Ok(collect(ctx))
}

fn collect(ctx: SimulationContext) -> (BTreeMap<String, Vec<f64>>, PerformanceLog) {
    let fields = ctx
        .fields()
        .iter()
        .map(|(name, f)| (name.to_string(), f.internal().to_vec()))
        .collect();
    (fields, ctx.teardown())
}

fn run_decomposed(config: &CaseConfig, poly: &PolyMesh, steps: usize) -> Result<RunOutcome> {
    let n_procs = config.decomposition.n_procs;
    let geometry = MeshGeometry::compute(poly)?;
    let cell_proc = simple_distribution(&geometry, n_procs, config.decomposition.axis)?;
    let domains = decompose(poly, &geometry, &cell_proc, n_procs)?;

    let results = run_partitioned(n_procs, |comm| {
        let sub = domains[comm.rank()].mesh.clone();
        let ctx = SimulationContext::init(config.clone(), sub, Box::new(comm))?;
        run_steps(ctx, steps)
    })
    .context("分区运行失败")?;

    let mut partition_fields: BTreeMap<String, Vec<Vec<f64>>> = BTreeMap::new();
    let mut logs = Vec::with_capacity(n_procs);
    for (fields, log) in results {
        for (name, values) in fields {
            partition_fields.entry(name).or_default().push(values);
        }
        logs.push(log);
    }

    let mut fields = BTreeMap::new();
    for (name, values) in partition_fields {
        let global = reconstruct_cell_field(poly.n_cells(), &domains, &values)?;
        fields.insert(name, global);
    }
    // 残差为全局归约量，各分区日志一致，取主分区
    let log = logs.into_iter().next().unwrap_or_default();
    Ok(RunOutcome { fields, log })
}
