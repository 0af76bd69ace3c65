//! Error types for the LQR solver and the closed-loop simulation.

/// Shape problems detected before any numerical work is done.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DimensionError {
    /// Returned when a matrix that must be square is not.
    #[error("{name} must be square, got {rows}x{cols}")]
    NotSquare {
        /// Name of the offending matrix.
        name: &'static str,
        rows: usize,
        cols: usize,
    },

    /// Returned when a matrix does not have the shape implied by the others.
    #[error("{name} has shape {}x{}, expected {}x{}", .found.0, .found.1, .expected.0, .expected.1)]
    Mismatch {
        /// Name of the offending matrix.
        name: &'static str,
        expected: (usize, usize),
        found: (usize, usize),
    },

    /// Returned when the initial state does not match the state dimension.
    #[error("initial state has length {found}, expected {expected}")]
    StateLength { expected: usize, found: usize },
}

/// Numerical failures of the Riccati solve and its helpers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinAlgError {
    /// Returned when the control weighting `R` cannot be inverted.
    #[error("control weighting R is singular")]
    SingularControlWeight,

    /// Returned when an intermediate matrix cannot be inverted.
    #[error("{0} is singular")]
    Singular(&'static str),

    /// Returned when an iteration hits its limit before the tolerance.
    #[error("{method} did not converge after {iterations} iterations")]
    NotConverged {
        method: &'static str,
        iterations: usize,
    },

    /// Returned when the stable-subspace least-squares solve fails.
    #[error("least-squares solve failed: {0}")]
    LeastSquares(&'static str),

    /// Returned when the Hamiltonian has no stable subspace of the form [I; X],
    /// or the computed X does not make A - B K Hurwitz. Happens when (A, B)
    /// is not stabilizable.
    #[error("Riccati equation has no stabilizing solution")]
    NoStabilizingSolution,

    /// Returned when the Riccati solution contains NaN or infinity.
    #[error("Riccati solution contains non-finite values")]
    NonFinite,

    /// Returned when the Schur decomposition used for eigenvalues fails.
    #[error("Schur decomposition did not converge")]
    Schur,
}

/// Error type for all fallible operations of the crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Dimension(#[from] DimensionError),

    #[error(transparent)]
    LinAlg(#[from] LinAlgError),

    /// Returned for a non-positive or non-finite step size or horizon, or one
    /// whose step count cannot be allocated.
    #[error("invalid simulation parameter: {0}")]
    InvalidParameter(String),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}
