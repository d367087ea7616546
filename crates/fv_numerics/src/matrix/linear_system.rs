// crates/fv_numerics/src/matrix/linear_system.rs

//! 带耦合界面的线性系统
//!
//! [`LinearSystem`] 把矩阵、界面系数、LDU 网格和通信器绑在一起，求解器只通过它
//! 访问矩阵。界面约定：
//!
//! - `interface_bou_coeffs[p][i]`: 乘法时 `y[face_cells[i]] -= bou[i] * x_nbr[i]`
//! - `interface_int_coeffs[p][i]`: 转置乘法使用的对应系数
//!
//! 非耦合面片对应的系数数组不被读取，可以为空。

use fv_foundation::{FvError, FvResult, RuntimeScalar};

use crate::ldu::{LduInterface, LduMesh};
use crate::linear_algebra::vector_ops::{g_average, g_sum};
use crate::matrix::LduMatrix;
use crate::parallel::comm::{reduce_sum_usize, Communicator};

/// 线性系统视图
#[derive(Clone, Copy)]
pub struct LinearSystem<'a, S: RuntimeScalar = f64> {
    matrix: &'a LduMatrix<S>,
    interface_bou_coeffs: &'a [Vec<S>],
    interface_int_coeffs: &'a [Vec<S>],
    mesh: &'a LduMesh,
    comm: &'a dyn Communicator,
}

impl<'a, S: RuntimeScalar> std::fmt::Debug for LinearSystem<'a, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinearSystem")
            .field("n_cells", &self.matrix.size())
            .field("structure", &self.matrix.structure_name())
            .field("rank", &self.comm.rank())
            .finish()
    }
}

impl<'a, S: RuntimeScalar> LinearSystem<'a, S> {
    /// 创建并检查矩阵、网格与界面系数的一致性
    pub fn new(
        matrix: &'a LduMatrix<S>,
        interface_bou_coeffs: &'a [Vec<S>],
        interface_int_coeffs: &'a [Vec<S>],
        mesh: &'a LduMesh,
        comm: &'a dyn Communicator,
    ) -> FvResult<Self> {
        const OP: &str = "linear_system";
        matrix.check_compatible(mesh.addressing(), OP)?;
        for (patchi, iface) in mesh.interfaces().iter().enumerate() {
            let Some(iface) = iface else { continue };
            for (name, coeffs) in [("bou", interface_bou_coeffs), ("int", interface_int_coeffs)] {
                let len = coeffs.get(patchi).map_or(0, Vec::len);
                if len != iface.size() {
                    return Err(FvError::assembly_mismatch(
                        OP,
                        format!("面片 {} 的界面 {} 系数长度 {}，期望 {}", patchi, name, len, iface.size()),
                    ));
                }
            }
        }
        Ok(Self {
            matrix,
            interface_bou_coeffs,
            interface_int_coeffs,
            mesh,
            comm,
        })
    }

    /// 没有界面系数的系统，网格含耦合界面时报错
    pub fn uncoupled(matrix: &'a LduMatrix<S>, mesh: &'a LduMesh, comm: &'a dyn Communicator) -> FvResult<Self> {
        Self::new(matrix, &[], &[], mesh, comm)
    }

    /// 矩阵
    #[inline]
    pub fn matrix(&self) -> &'a LduMatrix<S> {
        self.matrix
    }

    /// LDU 网格
    #[inline]
    pub fn mesh(&self) -> &'a LduMesh {
        self.mesh
    }

    /// 通信器
    #[inline]
    pub fn comm(&self) -> &'a dyn Communicator {
        self.comm
    }

    /// 界面边界系数
    #[inline]
    pub fn interface_bou_coeffs(&self) -> &'a [Vec<S>] {
        self.interface_bou_coeffs
    }

    /// 界面内部系数
    #[inline]
    pub fn interface_int_coeffs(&self) -> &'a [Vec<S>] {
        self.interface_int_coeffs
    }

    /// 本分区单元数
    #[inline]
    pub fn n_cells(&self) -> usize {
        self.matrix.size()
    }

    /// 按调度执行界面交换并累加：`result[c] -= coeffs[i] * x_nbr[i]`
    pub fn update_interfaces(&self, coeffs: &[Vec<S>], x: &[S], result: &mut [S]) -> FvResult<()> {
        for entry in self.mesh.schedule().entries() {
            if entry.init {
                self.init_matrix_interfaces(entry.patch, x)?;
            } else {
                self.update_matrix_interfaces(entry.patch, coeffs, x, result)?;
            }
        }
        Ok(())
    }

    /// 发送阶段：把本侧面邻接单元值交给耦合界面
    pub fn init_matrix_interfaces(&self, patchi: usize, x: &[S]) -> FvResult<()> {
        self.coupled(patchi, "init_matrix_interfaces")?.init_transfer(self.comm, x)
    }

    /// 接收阶段：取得对侧单元值并累加界面贡献
    pub fn update_matrix_interfaces(
        &self,
        patchi: usize,
        coeffs: &[Vec<S>],
        x: &[S],
        result: &mut [S],
    ) -> FvResult<()> {
        let iface = self.coupled(patchi, "update_matrix_interfaces")?;
        let c = coeffs.get(patchi).ok_or_else(|| {
            FvError::assembly_mismatch("update_matrix_interfaces", format!("面片 {} 缺少界面系数", patchi))
        })?;
        let nbr = iface.transfer(self.comm, x)?;
        for ((&celli, &ci), &xn) in iface.face_cells().iter().zip(c).zip(&nbr) {
            result[celli] -= ci * xn;
        }
        Ok(())
    }

    fn coupled(&self, patchi: usize, operation: &'static str) -> FvResult<&'a LduInterface> {
        self.mesh
            .interfaces()
            .get(patchi)
            .and_then(Option::as_ref)
            .ok_or_else(|| FvError::assembly_mismatch(operation, format!("面片 {} 没有耦合界面", patchi)))
    }

    fn check_len(&self, name: &'static str, v: &[S]) -> FvResult<()> {
        FvError::check_size(name, self.n_cells(), v.len())
    }

    /// `y = A x`
    pub fn amul(&self, x: &[S], y: &mut [S]) -> FvResult<()> {
        self.check_len("x", x)?;
        self.check_len("y", y)?;
        self.matrix.amul_internal(x, y);
        self.update_interfaces(self.interface_bou_coeffs, x, y)
    }

    /// `y = Aᵀ x`
    pub fn tmul(&self, x: &[S], y: &mut [S]) -> FvResult<()> {
        self.check_len("x", x)?;
        self.check_len("y", y)?;
        self.matrix.tmul_internal(x, y);
        self.update_interfaces(self.interface_int_coeffs, x, y)
    }

    /// 含界面的行和
    pub fn sum_a(&self, out: &mut [S]) -> FvResult<()> {
        self.check_len("sum_a", out)?;
        self.matrix.sum_a_internal(out);
        for (patchi, iface) in self.mesh.interfaces().iter().enumerate() {
            if let Some(iface) = iface {
                for (&celli, &c) in iface.face_cells().iter().zip(&self.interface_bou_coeffs[patchi]) {
                    out[celli] -= c;
                }
            }
        }
        Ok(())
    }

    /// `r = b - A x`
    pub fn residual(&self, x: &[S], source: &[S], r: &mut [S]) -> FvResult<()> {
        self.check_len("source", source)?;
        self.amul(x, r)?;
        for (ri, &bi) in r.iter_mut().zip(source) {
            *ri = bi - *ri;
        }
        Ok(())
    }

    /// 残差归一化因子
    ///
    /// `x_ref = sumA * mean(x)`，`factor = Σ(|Ax - x_ref| + |b - x_ref|) + SMALL`。
    /// 当和不超过 `SMALL · n` 时返回 1，残差退化为绝对残差。
    pub fn norm_factor(&self, x: &[S], source: &[S], ax: &[S], tmp: &mut [S]) -> FvResult<S> {
        self.sum_a(tmp)?;
        let avg = g_average(self.comm, x)?;
        for t in tmp.iter_mut() {
            *t *= avg;
        }
        let local: Vec<S> = ax
            .iter()
            .zip(source)
            .zip(tmp.iter())
            .map(|((&a, &b), &r)| (a - r).abs() + (b - r).abs())
            .collect();
        let total = g_sum(self.comm, &local)?;
        let n_total = reduce_sum_usize(self.comm, self.n_cells())?;
        let threshold = S::SMALL * S::from_usize(n_total.max(1)).unwrap_or(S::ONE);
        if total <= threshold {
            Ok(S::ONE)
        } else {
            Ok(total + S::SMALL)
        }
    }
}
