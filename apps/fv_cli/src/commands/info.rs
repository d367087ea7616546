// apps/fv_cli/src/commands/info.rs

//! 信息显示命令
//!
//! 显示网格、LDU 寻址统计与可选的求解器/边界条件名称。

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use fv_numerics::discretization::{ConvectionScheme, LaplacianScheme};
use fv_numerics::fields::PatchFieldRegistry;
use fv_numerics::linear_algebra::{preconditioners, smoothers, solvers};
use fv_numerics::parallel::SerialComm;
use fv_numerics::FvMesh;
use fv_mesh::BlockMeshGenerator;
use tracing::info;

/// 信息显示参数
#[derive(Args)]
pub struct InfoArgs {
    /// 配置文件路径，缺省时使用内置算例
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 覆盖三个方向的单元数
    #[arg(long, num_args = 3, value_names = ["NX", "NY", "NZ"])]
    pub cells: Option<Vec<usize>>,

    /// 列出可选的求解器、预条件器、光顺器、格式与边界条件
    #[arg(long)]
    pub selections: bool,
}

/// 执行信息命令
pub fn execute(args: InfoArgs) -> Result<()> {
    info!("=== Finvol 信息 ===");
    let config = super::load_case(args.config.as_deref())?;
    let mut cells = config.mesh.cells;
    if let Some(c) = &args.cells {
        cells.copy_from_slice(c);
    }

    let poly = BlockMeshGenerator::new(cells, config.mesh.lengths).build()?;
    let mesh = FvMesh::new(poly, &SerialComm, config.comms_type)?;
    print_mesh_info(&mesh);

    if args.selections {
        println!();
        print_selections();
    }
    Ok(())
}

fn print_mesh_info(mesh: &FvMesh) {
    let poly = mesh.poly();
    let addr = mesh.addressing();
    println!("=== 网格 ===");
    println!("点数:       {}", poly.n_points());
    println!("面数:       {}", poly.n_faces());
    println!("内部面数:   {}", poly.n_internal_faces());
    println!("单元数:     {}", poly.n_cells());
    let volume: f64 = mesh.volumes().iter().sum();
    println!("总体积:     {:.6e}", volume);

    println!("\n=== 面片 ===");
    for patch in poly.patches() {
        println!("  {:<12} {:<10} {} 面", patch.name, patch.kind.type_name(), patch.size);
    }

    // 每行非零元 = 对角 + 拥有的面 + 作为邻居的面
    let max_row = (0..addr.size())
        .map(|c| 1 + addr.owned_faces(c).len() + addr.neighbour_faces(c).count())
        .max()
        .unwrap_or(0);
    println!("\n=== LDU 寻址 ===");
    println!("矩阵阶数:   {}", addr.size());
    println!("非零元:     {}", addr.size() + 2 * addr.n_faces());
    println!("带宽:       {}", addr.bandwidth());
    println!("最大行长:   {}", max_row);
    println!("拓扑纪元:   {}", addr.epoch());
    println!(
        "界面调度:   {} ({} 条目)",
        mesh.ldu().schedule().comms_type(),
        mesh.ldu().schedule().len()
    );
}

fn print_selections() {
    println!("=== 可选名称 ===");
    println!("求解器:     {}", solvers().names().join(", "));
    println!("预条件器:   {}", preconditioners().names().join(", "));
    println!("光顺器:     {}", smoothers().names().join(", "));
    println!("拉普拉斯:   {}", LaplacianScheme::NAMES.join(", "));
    println!("对流:       {}", ConvectionScheme::NAMES.join(", "));
    println!("边界条件:   {}", PatchFieldRegistry::with_builtins().names().join(", "));
}
