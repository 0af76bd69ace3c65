use nalgebra::{DMatrix, RealField};

use crate::control::care::check_dimensions;
use crate::control::lqr::LinearModel;
use crate::error::DimensionError;

/// Plain (A, B, Q, R) quadruple with checked shapes.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearSystem<T: RealField> {
    a: DMatrix<T>,
    b: DMatrix<T>,
    q: DMatrix<T>,
    r: DMatrix<T>,
}

impl<T: RealField + Copy> LinearSystem<T> {
    pub fn new(
        a: DMatrix<T>,
        b: DMatrix<T>,
        q: DMatrix<T>,
        r: DMatrix<T>,
    ) -> Result<LinearSystem<T>, DimensionError> {
        check_dimensions(&a, &b, &q, &r)?;
        Ok(LinearSystem { a, b, q, r })
    }

    /// Shapes are the caller's responsibility, for models built from
    /// fixed-size formulas.
    pub(crate) fn from_parts(
        a: DMatrix<T>,
        b: DMatrix<T>,
        q: DMatrix<T>,
        r: DMatrix<T>,
    ) -> LinearSystem<T> {
        debug_assert!(check_dimensions(&a, &b, &q, &r).is_ok());
        LinearSystem { a, b, q, r }
    }

    pub fn state_dim(&self) -> usize {
        self.a.nrows()
    }

    pub fn input_dim(&self) -> usize {
        self.b.ncols()
    }

    /// Same dynamics, other cost weights.
    pub fn with_weights(
        self,
        q: DMatrix<T>,
        r: DMatrix<T>,
    ) -> Result<LinearSystem<T>, DimensionError> {
        LinearSystem::new(self.a, self.b, q, r)
    }
}

impl<T: RealField + Copy> LinearModel<T> for LinearSystem<T> {
    fn a(&self) -> &DMatrix<T> {
        &self.a
    }
    fn b(&self) -> &DMatrix<T> {
        &self.b
    }
    fn q(&self) -> &DMatrix<T> {
        &self.q
    }
    fn r(&self) -> &DMatrix<T> {
        &self.r
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::dmatrix;

    #[test]
    fn shapes_are_checked() {
        let a = DMatrix::<f64>::identity(2, 2);
        let b = dmatrix![0.0; 1.0];
        let q = DMatrix::<f64>::identity(2, 2);

        let system = LinearSystem::new(a.clone(), b.clone(), q.clone(), dmatrix![1.0]).unwrap();
        assert_eq!(system.state_dim(), 2);
        assert_eq!(system.input_dim(), 1);

        let err = LinearSystem::new(a, b, q, DMatrix::identity(2, 2)).unwrap_err();
        assert_eq!(
            err,
            DimensionError::Mismatch {
                name: "R",
                expected: (1, 1),
                found: (2, 2)
            }
        );
    }

    #[test]
    fn with_weights_keeps_dynamics() {
        let system = LinearSystem::new(
            dmatrix![0.0, 1.0; 0.0, 0.0],
            dmatrix![0.0; 1.0],
            DMatrix::identity(2, 2),
            dmatrix![1.0],
        )
        .unwrap();
        let reweighted = system
            .clone()
            .with_weights(DMatrix::identity(2, 2) * 5.0, dmatrix![0.1])
            .unwrap();
        assert_eq!(reweighted.a(), system.a());
        assert_eq!(reweighted.b(), system.b());
        assert_eq!(reweighted.r(), &dmatrix![0.1]);
    }
}
