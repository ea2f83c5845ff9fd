//! Crate-wide error type.
//!
//! Every public entry point in this crate returns [`Result<T>`], a thin
//! alias over `std::result::Result<T, FeaError>`. Errors are values: no
//! panics, no silent partial results.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FeaError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeaError {
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error("invalid mesh: {0}")]
    InvalidMesh(String),

    #[error("invalid boundary condition: {0}")]
    InvalidBoundaryCondition(String),

    #[error("invalid load: {0}")]
    InvalidLoad(String),

    #[error("invalid property access: {0}")]
    InvalidProperty(String),

    #[error("degenerate Jacobian (|det J| = {det_j:.3e}) in element {element_id}")]
    DegenerateJacobian { element_id: i64, det_j: f64 },

    #[error("linear solve failed: matrix is singular")]
    Singular,

    #[error("linear solve failed: matrix is not positive definite")]
    NotPositiveDefinite,

    #[error("linear solve failed: did not converge after {iters} iterations (residual {residual:.3e})")]
    NotConverged { iters: usize, residual: f64 },

    #[error("non-linear solve diverged at load factor {load_factor:.6} (iteration {iteration})")]
    NonlinearDiverged { load_factor: f64, iteration: usize },

    #[error("load-step underflow: step size fell below the floor at load factor {load_factor:.6}")]
    LoadStepUnderflow { load_factor: f64 },

    #[error("eigenproblem failed to produce the requested number of modes")]
    EigenproblemFailed,

    #[error("solve cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(String),

    #[error("result parse error: {0}")]
    ResultParse(String),
}

impl From<std::io::Error> for FeaError {
    fn from(err: std::io::Error) -> Self {
        FeaError::Io(err.to_string())
    }
}

/// Convenience constructor used throughout linear-solver back ends.
impl From<FeaError> for String {
    fn from(err: FeaError) -> Self {
        err.to_string()
    }
}
