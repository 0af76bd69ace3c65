use nalgebra::{DMatrix, DVector, RealField};
use tracing::{debug, trace};

use crate::control::lqr::is_hurwitz;
use crate::error::{DimensionError, Error, LinAlgError};

/// Anything able to produce the stabilizing solution of the continuous-time
/// algebraic Riccati equation (CARE)
///
/// A^T X + X A - X B R^-1 B^T X + Q = 0
pub trait CareSolver<T: RealField> {
    fn solve_continuous_are(
        &self,
        a: &DMatrix<T>,
        b: &DMatrix<T>,
        q: &DMatrix<T>,
        r: &DMatrix<T>,
    ) -> Result<DMatrix<T>, Error>;
}

/// CARE solver based on the matrix sign function of the Hamiltonian,
/// followed by a few Newton-Kleinman steps to polish the result.
#[derive(Debug, Clone, Copy)]
pub struct SignFunctionSolver<T> {
    /// Maximum number of sign iterations
    pub max_iter: usize,
    /// Relative Frobenius-norm change at which the sign iteration stops
    pub tolerance: T,
    /// Number of Newton-Kleinman refinement steps
    pub refinement_steps: usize,
}

impl<T: RealField + Copy> Default for SignFunctionSolver<T> {
    fn default() -> SignFunctionSolver<T> {
        SignFunctionSolver {
            max_iter: 100,
            tolerance: nalgebra::convert(1e-10),
            refinement_steps: 2,
        }
    }
}

impl<T: RealField + Copy> SignFunctionSolver<T> {
    /// sign(Z) through the scaled Newton iteration Z <- (Z / c + c Z^-1) / 2,
    /// with c = |det Z|^(1 / dim)
    fn sign(&self, h: DMatrix<T>) -> Result<DMatrix<T>, LinAlgError> {
        let order: T = nalgebra::convert(h.nrows() as f64);
        let half: T = nalgebra::convert(0.5);

        let mut z = h;
        for iteration in 1..=self.max_iter {
            let z_inv = z
                .clone()
                .try_inverse()
                .ok_or(LinAlgError::Singular("Hamiltonian sign iterate"))?;

            let det = z.determinant().abs();
            let c = if det.is_finite() && det > T::zero() {
                det.powf(T::one() / order)
            } else {
                T::one()
            };

            let z_next = (&z / c + z_inv * c) * half;
            let change = (&z_next - &z).norm();
            z = z_next;
            trace!(iteration, "matrix sign step");

            if change <= self.tolerance * z.norm() {
                debug!(iterations = iteration, "matrix sign iteration converged");
                return Ok(z);
            }
        }
        Err(LinAlgError::NotConverged {
            method: "matrix sign iteration",
            iterations: self.max_iter,
        })
    }
}

impl<T: RealField + Copy> CareSolver<T> for SignFunctionSolver<T> {
    fn solve_continuous_are(
        &self,
        a: &DMatrix<T>,
        b: &DMatrix<T>,
        q: &DMatrix<T>,
        r: &DMatrix<T>,
    ) -> Result<DMatrix<T>, Error> {
        check_dimensions(a, b, q, r)?;
        let n = a.nrows();

        let r_inv = r
            .clone()
            .try_inverse()
            .ok_or(LinAlgError::SingularControlWeight)?;
        let g = b * &r_inv * b.transpose();

        let w = self.sign(hamiltonian(a, &g, q))?;
        let mut x = stable_subspace(&w, n)?;

        // Newton-Kleinman: only keep a step if it lowers the residual
        let mut residual = riccati_lhs(a, &g, q, &x).norm();
        for step in 0..self.refinement_steps {
            let k = &r_inv * b.transpose() * &x;
            let a_k = a - b * &k;
            let c = -(q + k.transpose() * r * &k);
            let candidate = solve_lyapunov(&a_k, &c)?;
            let candidate_residual = riccati_lhs(a, &g, q, &candidate).norm();
            if candidate_residual >= residual {
                trace!(step, "Newton-Kleinman step rejected");
                break;
            }
            x = candidate;
            residual = candidate_residual;
        }

        if x.iter().any(|v| !v.is_finite()) {
            return Err(LinAlgError::NonFinite.into());
        }

        let k = &r_inv * b.transpose() * &x;
        if !is_hurwitz(&(a - b * &k))? {
            debug!(residual = ?residual, "closed loop of the Riccati solution is not stable");
            return Err(LinAlgError::NoStabilizingSolution.into());
        }
        Ok(x)
    }
}

/// Checks that A is n x n, B is n x m, Q is n x n and R is m x m.
pub fn check_dimensions<T: RealField>(
    a: &DMatrix<T>,
    b: &DMatrix<T>,
    q: &DMatrix<T>,
    r: &DMatrix<T>,
) -> Result<(), DimensionError> {
    let (n, cols) = a.shape();
    if n != cols {
        return Err(DimensionError::NotSquare {
            name: "A",
            rows: n,
            cols,
        });
    }
    let m = b.ncols();
    if b.nrows() != n {
        return Err(DimensionError::Mismatch {
            name: "B",
            expected: (n, m),
            found: b.shape(),
        });
    }
    if q.shape() != (n, n) {
        return Err(DimensionError::Mismatch {
            name: "Q",
            expected: (n, n),
            found: q.shape(),
        });
    }
    if r.shape() != (m, m) {
        return Err(DimensionError::Mismatch {
            name: "R",
            expected: (m, m),
            found: r.shape(),
        });
    }
    Ok(())
}

/// Left-hand side of the CARE evaluated at `x`. Zero for an exact solution.
pub fn care_residual<T: RealField + Copy>(
    a: &DMatrix<T>,
    b: &DMatrix<T>,
    q: &DMatrix<T>,
    r: &DMatrix<T>,
    x: &DMatrix<T>,
) -> Result<DMatrix<T>, Error> {
    check_dimensions(a, b, q, r)?;
    if x.shape() != a.shape() {
        return Err(DimensionError::Mismatch {
            name: "X",
            expected: a.shape(),
            found: x.shape(),
        }
        .into());
    }
    let r_inv = r
        .clone()
        .try_inverse()
        .ok_or(LinAlgError::SingularControlWeight)?;
    let g = b * r_inv * b.transpose();
    Ok(riccati_lhs(a, &g, q, x))
}

fn riccati_lhs<T: RealField + Copy>(
    a: &DMatrix<T>,
    g: &DMatrix<T>,
    q: &DMatrix<T>,
    x: &DMatrix<T>,
) -> DMatrix<T> {
    a.transpose() * x + x * a - x * g * x + q
}

/// Solves A^T X + X A = C through the Kronecker form
/// (I (x) A^T + A^T (x) I) vec(X) = vec(C).
pub fn solve_lyapunov<T: RealField + Copy>(
    a: &DMatrix<T>,
    c: &DMatrix<T>,
) -> Result<DMatrix<T>, LinAlgError> {
    let n = a.nrows();
    let identity = DMatrix::<T>::identity(n, n);
    let at = a.transpose();
    let operator = identity.kronecker(&at) + at.kronecker(&identity);

    let rhs = DVector::from_column_slice(c.as_slice());
    let vec_x = operator
        .lu()
        .solve(&rhs)
        .ok_or(LinAlgError::Singular("Lyapunov operator"))?;

    Ok(symmetrize(&DMatrix::from_column_slice(
        n,
        n,
        vec_x.as_slice(),
    )))
}

/// H = [[A, -G], [-Q, -A^T]]
fn hamiltonian<T: RealField + Copy>(a: &DMatrix<T>, g: &DMatrix<T>, q: &DMatrix<T>) -> DMatrix<T> {
    let n = a.nrows();
    let mut h = DMatrix::<T>::zeros(2 * n, 2 * n);
    h.view_mut((0, 0), (n, n)).copy_from(a);
    h.view_mut((0, n), (n, n)).copy_from(&(-g.clone()));
    h.view_mut((n, 0), (n, n)).copy_from(&(-q.clone()));
    h.view_mut((n, n), (n, n)).copy_from(&(-a.transpose()));
    h
}

/// The stable invariant subspace of H is the null space of sign(H) + I and is
/// spanned by [I; X]. Solve [W12; W22 + I] X = -[W11 + I; W21] in the
/// least-squares sense. A rank-deficient left-hand side means the subspace has
/// no such basis.
fn stable_subspace<T: RealField + Copy>(
    w: &DMatrix<T>,
    n: usize,
) -> Result<DMatrix<T>, LinAlgError> {
    let identity = DMatrix::<T>::identity(n, n);
    let w11 = w.view((0, 0), (n, n)).clone_owned();
    let w12 = w.view((0, n), (n, n)).clone_owned();
    let w21 = w.view((n, 0), (n, n)).clone_owned();
    let w22 = w.view((n, n), (n, n)).clone_owned();

    let mut lhs = DMatrix::<T>::zeros(2 * n, n);
    lhs.view_mut((0, 0), (n, n)).copy_from(&w12);
    lhs.view_mut((n, 0), (n, n)).copy_from(&(w22 + &identity));

    let mut rhs = DMatrix::<T>::zeros(2 * n, n);
    rhs.view_mut((0, 0), (n, n)).copy_from(&(-(w11 + &identity)));
    rhs.view_mut((n, 0), (n, n)).copy_from(&(-w21));

    let svd = lhs.svd(true, true);
    let largest = svd.singular_values.iter().fold(T::zero(), |m, &s| m.max(s));
    let smallest = svd.singular_values.iter().fold(largest, |m, &s| m.min(s));
    if !(smallest > largest * T::default_epsilon().sqrt()) {
        debug!(smallest = ?smallest, largest = ?largest, "stable subspace is rank deficient");
        return Err(LinAlgError::NoStabilizingSolution);
    }

    let x = svd
        .solve(&rhs, T::default_epsilon())
        .map_err(LinAlgError::LeastSquares)?;
    Ok(symmetrize(&x))
}

fn symmetrize<T: RealField + Copy>(x: &DMatrix<T>) -> DMatrix<T> {
    let half: T = nalgebra::convert(0.5);
    (x + x.transpose()) * half
}
