//! Linear solver back ends (C7): a uniform `solve(A, b) -> u` contract
//! over a direct and an iterative back end.
//!
//! Both back ends work on the densified system handed to them by
//! [`crate::bc_application`] — this crate targets demonstration-scale
//! meshes (thousands, not millions, of DOFs), so the assembly stage's
//! sparse triplet-to-CSR contract (§4.2) is kept exactly, but BC
//! application and the solve itself operate on a dense matrix. A
//! production deployment would swap the direct back end for a sparse
//! factorization without touching the assembler or the BC contract.

use nalgebra::{Cholesky, DMatrix, DVector};

use crate::error::{FeaError, Result};

/// Final iteration count and residual norm for an iterative solve,
/// reported even on success so callers can log convergence behavior.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolveInfo {
    pub iterations: usize,
    pub residual: f64,
}

/// Runtime choice of linear-solver back end, per §4.4: direct below
/// 10^5 DOFs, iterative above. [`LinearSolverKind::for_problem_size`]
/// applies that default; callers may override it explicitly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LinearSolverKind {
    Direct,
    Iterative { tolerance: f64, max_iterations: usize },
}

impl LinearSolverKind {
    pub fn for_problem_size(num_dofs: usize) -> Self {
        if num_dofs < 100_000 {
            LinearSolverKind::Direct
        } else {
            LinearSolverKind::Iterative {
                tolerance: 1e-8,
                max_iterations: 10_000,
            }
        }
    }
}

/// Symmetric-positive-definite direct solver with an explicit
/// pattern-analysis / numerical-factorization / solve three-phase
/// interface (§4.4), so repeated solves against the same equations
/// (e.g. successive non-linear iterations with an unchanged tangent
/// sparsity) can skip re-validating the pattern. The factorization
/// itself (dense Cholesky) is still recomputed on every
/// `factorize` call; only the pattern check is cached.
pub struct DirectSolver {
    n: usize,
}

impl DirectSolver {
    /// Pattern analysis: record the system size. A mismatched size on
    /// a later `factorize` call is a programming error, not a runtime
    /// `FeaError` — the caller controls both ends of that contract.
    pub fn analyze(matrix: &DMatrix<f64>) -> Self {
        assert_eq!(matrix.nrows(), matrix.ncols(), "matrix must be square");
        Self { n: matrix.nrows() }
    }

    /// Numerical factorization: Cholesky decomposition of a symmetric
    /// positive-definite matrix.
    pub fn factorize(&self, matrix: &DMatrix<f64>) -> Result<DirectFactorization> {
        assert_eq!(matrix.nrows(), self.n, "matrix size does not match analyzed pattern");
        let cholesky = Cholesky::new(matrix.clone()).ok_or(FeaError::NotPositiveDefinite)?;
        Ok(DirectFactorization { cholesky })
    }
}

pub struct DirectFactorization {
    cholesky: Cholesky<f64, nalgebra::Dyn>,
}

impl DirectFactorization {
    pub fn solve(&self, b: &DVector<f64>) -> Result<DVector<f64>> {
        Ok(self.cholesky.solve(b))
    }
}

/// One-shot direct solve: pattern-analyze, factorize, solve. Most
/// callers that do not need to reuse the symbolic phase across
/// several right-hand sides use this.
pub fn solve_direct(matrix: &DMatrix<f64>, b: &DVector<f64>) -> Result<DVector<f64>> {
    let pattern = DirectSolver::analyze(matrix);
    let factorization = pattern.factorize(matrix)?;
    factorization.solve(b)
}

/// Conjugate Gradient with Jacobi (diagonal) preconditioning, per
/// §4.4. Tolerance is on the relative residual `||r|| / ||b||`.
pub fn solve_cg(
    matrix: &DMatrix<f64>,
    b: &DVector<f64>,
    tolerance: f64,
    max_iterations: usize,
) -> Result<(DVector<f64>, SolveInfo)> {
    let n = matrix.nrows();
    let b_norm = b.norm();
    if b_norm == 0.0 {
        return Ok((
            DVector::zeros(n),
            SolveInfo {
                iterations: 0,
                residual: 0.0,
            },
        ));
    }

    let inv_diag: DVector<f64> = DVector::from_iterator(
        n,
        (0..n).map(|i| {
            let d = matrix[(i, i)];
            if d.abs() > 1e-300 {
                1.0 / d
            } else {
                1.0
            }
        }),
    );

    let mut x = DVector::<f64>::zeros(n);
    let mut r = b - matrix * &x;
    let mut z = r.component_mul(&inv_diag);
    let mut p = z.clone();
    let mut rz_old = r.dot(&z);

    let mut last_residual = r.norm() / b_norm;
    for iter in 1..=max_iterations {
        let ap = matrix * &p;
        let denom = p.dot(&ap);
        if denom.abs() < 1e-300 {
            return Err(FeaError::Singular);
        }
        let alpha = rz_old / denom;
        x += alpha * &p;
        r -= alpha * &ap;

        last_residual = r.norm() / b_norm;
        if last_residual < tolerance {
            return Ok((
                x,
                SolveInfo {
                    iterations: iter,
                    residual: last_residual,
                },
            ));
        }

        z = r.component_mul(&inv_diag);
        let rz_new = r.dot(&z);
        let beta = rz_new / rz_old;
        p = &z + beta * &p;
        rz_old = rz_new;
    }

    Err(FeaError::NotConverged {
        iters: max_iterations,
        residual: last_residual,
    })
}

/// Uniform entry point implementing the §4.4 contract: pick a back end
/// (or honor an explicit one) and solve `A u = b`.
pub fn solve(matrix: &DMatrix<f64>, b: &DVector<f64>, kind: LinearSolverKind) -> Result<DVector<f64>> {
    match kind {
        LinearSolverKind::Direct => solve_direct(matrix, b),
        LinearSolverKind::Iterative { tolerance, max_iterations } => {
            solve_cg(matrix, b, tolerance, max_iterations).map(|(x, _)| x)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spd_system() -> (DMatrix<f64>, DVector<f64>) {
        let a = DMatrix::from_row_slice(3, 3, &[4.0, 1.0, 0.0, 1.0, 3.0, 1.0, 0.0, 1.0, 2.0]);
        let b = DVector::from_vec(vec![1.0, 2.0, 3.0]);
        (a, b)
    }

    #[test]
    fn direct_solve_satisfies_equation() {
        let (a, b) = spd_system();
        let x = solve_direct(&a, &b).unwrap();
        let residual = (&a * &x - &b).norm() / b.norm();
        assert!(residual < 1e-10);
    }

    #[test]
    fn cg_solve_matches_direct() {
        let (a, b) = spd_system();
        let x_direct = solve_direct(&a, &b).unwrap();
        let (x_cg, info) = solve_cg(&a, &b, 1e-10, 1000).unwrap();
        assert!((x_direct - &x_cg).norm() < 1e-6);
        assert!(info.iterations <= 3);
    }

    #[test]
    fn indefinite_matrix_reports_not_positive_definite() {
        let a = DMatrix::from_row_slice(2, 2, &[0.0, 1.0, 1.0, 0.0]);
        let b = DVector::from_vec(vec![1.0, 1.0]);
        let err = solve_direct(&a, &b).unwrap_err();
        assert_eq!(err, FeaError::NotPositiveDefinite);
    }

    #[test]
    fn factorization_reused_across_two_right_hand_sides() {
        let (a, _) = spd_system();
        let pattern = DirectSolver::analyze(&a);
        let factorization = pattern.factorize(&a).unwrap();
        let b1 = DVector::from_vec(vec![1.0, 0.0, 0.0]);
        let b2 = DVector::from_vec(vec![0.0, 1.0, 0.0]);
        let x1 = factorization.solve(&b1).unwrap();
        let x2 = factorization.solve(&b2).unwrap();
        assert!((&a * &x1 - &b1).norm() < 1e-10);
        assert!((&a * &x2 - &b2).norm() < 1e-10);
    }
}
