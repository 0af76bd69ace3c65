use nalgebra::{Complex, DMatrix, RealField};

use crate::control::care::{check_dimensions, CareSolver, SignFunctionSolver};
use crate::error::{DimensionError, Error, LinAlgError};

/// Continuous-time linear dynamics dx/dt = A x + B u with the quadratic cost
/// weights of the regulator.
pub trait LinearModel<T: RealField + Copy> {
    fn a(&self) -> &DMatrix<T>;
    fn b(&self) -> &DMatrix<T>;
    fn q(&self) -> &DMatrix<T>;
    fn r(&self) -> &DMatrix<T>;

    fn lqr(&self) -> Result<LqrSolution<T>, Error> {
        lqr_with_solver(
            &SignFunctionSolver::default(),
            self.a(),
            self.b(),
            self.q(),
            self.r(),
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LqrSolution<T: RealField> {
    /// Feedback gain K, u = -K x
    pub gain: DMatrix<T>,
    /// Stabilizing solution X of the CARE
    pub riccati: DMatrix<T>,
}

/// Continuous-time LQR gain K such that u = -K x.
pub fn lqr<T: RealField + Copy>(
    a: &DMatrix<T>,
    b: &DMatrix<T>,
    q: &DMatrix<T>,
    r: &DMatrix<T>,
) -> Result<DMatrix<T>, Error> {
    Ok(lqr_with_solver(&SignFunctionSolver::default(), a, b, q, r)?.gain)
}

pub fn lqr_with_solver<T: RealField + Copy, S: CareSolver<T>>(
    solver: &S,
    a: &DMatrix<T>,
    b: &DMatrix<T>,
    q: &DMatrix<T>,
    r: &DMatrix<T>,
) -> Result<LqrSolution<T>, Error> {
    check_dimensions(a, b, q, r)?;
    let riccati = solver.solve_continuous_are(a, b, q, r)?;
    let gain = gain_from_riccati(b, r, &riccati)?;
    Ok(LqrSolution { gain, riccati })
}

/// K = R^-1 B^T X
pub fn gain_from_riccati<T: RealField + Copy>(
    b: &DMatrix<T>,
    r: &DMatrix<T>,
    x: &DMatrix<T>,
) -> Result<DMatrix<T>, Error> {
    if x.nrows() != b.nrows() || !x.is_square() {
        return Err(DimensionError::Mismatch {
            name: "X",
            expected: (b.nrows(), b.nrows()),
            found: x.shape(),
        }
        .into());
    }
    let r_inv = r
        .clone()
        .try_inverse()
        .ok_or(LinAlgError::SingularControlWeight)?;
    Ok(r_inv * b.transpose() * x)
}

/// A - B K
pub fn closed_loop<T: RealField + Copy>(
    a: &DMatrix<T>,
    b: &DMatrix<T>,
    k: &DMatrix<T>,
) -> DMatrix<T> {
    a - b * k
}

/// Eigenvalues of a square matrix, from its real Schur form.
pub fn poles<T: RealField + Copy>(m: &DMatrix<T>) -> Result<Vec<Complex<T>>, LinAlgError> {
    let schur = m
        .clone()
        .try_schur(T::default_epsilon(), 10_000)
        .ok_or(LinAlgError::Schur)?;
    Ok(schur.complex_eigenvalues().iter().copied().collect())
}

/// True when every eigenvalue has a strictly negative real part.
pub fn is_hurwitz<T: RealField + Copy>(m: &DMatrix<T>) -> Result<bool, LinAlgError> {
    Ok(poles(m)?.iter().all(|p| p.re < T::zero()))
}
