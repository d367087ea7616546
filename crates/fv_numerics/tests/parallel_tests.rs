// crates/fv_numerics/tests/parallel_tests.rs
//!
//! 分区求解测试
//!
//! 同一算例分别串行与分区求解，拼回后与串行结果比较；并检查各通信方式下的界面调度。

use approx::assert_relative_eq;
use fv_config::{BoundarySpec, CaseConfig, CommsType, FieldConfig, LinearSolverControls};
use fv_mesh::{decompose, reconstruct_cell_field, simple_distribution, BlockMeshGenerator, MeshGeometry, PolyMesh};
use fv_numerics::parallel::{run_partitioned, Communicator, SerialComm};
use fv_numerics::{FvMesh, SimulationContext};

const COMMS_TYPES: [CommsType; 3] = [CommsType::Blocking, CommsType::Scheduled, CommsType::NonBlocking];

fn case(comms_type: CommsType) -> CaseConfig {
    let mut config = CaseConfig {
        comms_type,
        ..Default::default()
    };
    config
        .solvers
        .insert("T".to_string(), LinearSolverControls::new("PCG", 1e-12, 500));
    let mut fc = FieldConfig {
        diffusivity: 0.5,
        source: 1.0,
        ..Default::default()
    };
    fc.boundary.insert("xMin".to_string(), BoundarySpec::fixed_value(1.0));
    fc.boundary.insert("xMax".to_string(), BoundarySpec::fixed_value(3.0));
    for p in ["yMin", "yMax", "zMin", "zMax"] {
        fc.boundary.insert(p.to_string(), BoundarySpec::zero_gradient());
    }
    config.fields.insert("T".to_string(), fc);
    config
}

fn global_mesh() -> PolyMesh {
    BlockMeshGenerator::new([6, 4, 1], [3.0, 2.0, 1.0]).build().unwrap()
}

fn solve_serial(config: &CaseConfig) -> Vec<f64> {
    let mut ctx = SimulationContext::init(config.clone(), global_mesh(), Box::new(SerialComm)).unwrap();
    let eqn = ctx.diffusion_equation("T").unwrap();
    assert!(ctx.solve("T", &eqn).unwrap().converged());
    ctx.fields().get("T").unwrap().internal().to_vec()
}

/// 按给定单元归属分区求解并拼回全局场，同时返回各分区的迭代次数
fn solve_partitioned(config: &CaseConfig, cell_proc: &[usize], n_procs: usize) -> (Vec<f64>, Vec<usize>) {
    let mesh = global_mesh();
    let geometry = MeshGeometry::compute(&mesh).unwrap();
    let domains = decompose(&mesh, &geometry, cell_proc, n_procs).unwrap();

    let results = run_partitioned(n_procs, |comm| {
        let sub = domains[comm.rank()].mesh.clone();
        let mut ctx = SimulationContext::init(config.clone(), sub, Box::new(comm))?;
        let eqn = ctx.diffusion_equation("T")?;
        let perf = ctx.solve("T", &eqn)?;
        assert!(perf.converged());
        let values = ctx.fields().get("T")?.internal().to_vec();
        Ok((values, perf.n_iterations))
    })
    .unwrap();

    let (values, iterations): (Vec<Vec<f64>>, Vec<usize>) = results.into_iter().unzip();
    let global = reconstruct_cell_field(mesh.n_cells(), &domains, &values).unwrap();
    (global, iterations)
}

#[test]
fn test_partitioned_solution_matches_serial() {
    let mesh = global_mesh();
    let geometry = MeshGeometry::compute(&mesh).unwrap();

    for comms_type in COMMS_TYPES {
        let config = case(comms_type);
        let serial = solve_serial(&config);
        for (n_procs, axis) in [(2, 0), (3, 0), (2, 1)] {
            let cell_proc = simple_distribution(&geometry, n_procs, axis).unwrap();
            let (parallel, iterations) = solve_partitioned(&config, &cell_proc, n_procs);

            // 全局归约使各分区的迭代次数一致
            assert!(iterations.windows(2).all(|w| w[0] == w[1]), "{:?}", iterations);
            for (s, p) in serial.iter().zip(&parallel) {
                assert_relative_eq!(*s, *p, epsilon = 1e-8);
            }
        }
    }
}

#[test]
fn test_four_way_block_partition_matches_serial() {
    let mesh = global_mesh();
    let geometry = MeshGeometry::compute(&mesh).unwrap();
    // 2 × 2 分块，每个分区有两个邻居
    let cell_proc: Vec<usize> = geometry
        .cell_centres
        .iter()
        .map(|c| usize::from(c.x > 1.5) + 2 * usize::from(c.y > 1.0))
        .collect();

    for comms_type in COMMS_TYPES {
        let config = case(comms_type);
        let serial = solve_serial(&config);
        let (parallel, _) = solve_partitioned(&config, &cell_proc, 4);
        for (s, p) in serial.iter().zip(&parallel) {
            assert_relative_eq!(*s, *p, epsilon = 1e-8);
        }
    }
}

#[test]
fn test_schedule_covers_each_interface_once() {
    let mesh = global_mesh();
    let geometry = MeshGeometry::compute(&mesh).unwrap();
    let cell_proc: Vec<usize> = geometry
        .cell_centres
        .iter()
        .map(|c| usize::from(c.x > 1.5) + 2 * usize::from(c.y > 1.0))
        .collect();
    let domains = decompose(&mesh, &geometry, &cell_proc, 4).unwrap();

    for comms_type in COMMS_TYPES {
        run_partitioned(4, |comm| {
            let me = comm.rank();
            let fv = FvMesh::new(domains[me].mesh.clone(), &comm, comms_type)?;
            let schedule = fv.ldu().schedule();
            assert_eq!(schedule.comms_type(), comms_type);

            for (patchi, iface) in fv.ldu().interfaces().iter().enumerate() {
                let positions: Vec<(usize, bool)> = schedule
                    .entries()
                    .iter()
                    .enumerate()
                    .filter(|(_, e)| e.patch == patchi)
                    .map(|(i, e)| (i, e.init))
                    .collect();
                let Some(iface) = iface else {
                    assert!(positions.is_empty());
                    continue;
                };
                assert_eq!(positions.len(), 2);
                let send = positions.iter().find(|p| p.1).map(|p| p.0);
                let recv = positions.iter().find(|p| !p.1).map(|p| p.0);
                let (Some(send), Some(recv)) = (send, recv) else {
                    panic!("面片 {} 缺少发送或接收条目", patchi);
                };
                let nbr = iface.neighb_proc().unwrap_or(me);
                if comms_type == CommsType::Scheduled && me > nbr {
                    // 编号较大的一侧先收后发
                    assert!(recv < send);
                } else {
                    assert!(send < recv);
                }
            }
            assert_eq!(schedule.len(), 2 * fv.ldu().interfaces().iter().flatten().count());
            Ok(())
        })
        .unwrap();
    }
}

#[test]
fn test_serial_schedule_is_empty_without_coupling() {
    let fv = FvMesh::new(global_mesh(), &SerialComm, CommsType::Scheduled).unwrap();
    assert!(fv.ldu().schedule().is_empty());
    assert!(fv.ldu().interfaces().iter().all(Option::is_none));
}
