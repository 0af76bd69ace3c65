use std::io;

use nalgebra::{DMatrix, DVector};
use serde::ser::{Serialize, SerializeTuple, Serializer};
use tracing::debug;

use crate::error::{DimensionError, Error};

/// Closed-loop run recorded by [`simulate`].
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    /// t_i = i * dt
    pub time: Vec<f64>,
    /// Row i is the state after step i (the initial state is not recorded)
    pub states: DMatrix<f64>,
    /// Row i is the control applied during step i
    pub controls: DMatrix<f64>,
}

impl Trajectory {
    pub fn len(&self) -> usize {
        self.states.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn state_dim(&self) -> usize {
        self.states.ncols()
    }

    /// History of a single state component.
    pub fn column(&self, index: usize) -> Vec<f64> {
        self.states.column(index).iter().copied().collect()
    }

    pub fn final_state(&self) -> Option<DVector<f64>> {
        if self.is_empty() {
            return None;
        }
        Some(self.states.row(self.len() - 1).transpose())
    }

    /// Writes `t,x0..,u0..` then one record per step.
    pub fn write_csv<W: io::Write>(&self, writer: W) -> Result<(), Error> {
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(writer);

        let header = std::iter::once("t".to_owned())
            .chain((0..self.state_dim()).map(|i| format!("x{i}")))
            .chain((0..self.controls.ncols()).map(|i| format!("u{i}")));
        wtr.write_record(header)?;

        for (i, &time) in self.time.iter().enumerate() {
            let state: Vec<f64> = self.states.row(i).iter().copied().collect();
            let control: Vec<f64> = self.controls.row(i).iter().copied().collect();
            wtr.serialize(Sample {
                time,
                state: &state,
                control: &control,
            })?;
        }
        wtr.flush().map_err(csv::Error::from)?;
        Ok(())
    }
}

/// One flat CSV record.
struct Sample<'a> {
    time: f64,
    state: &'a [f64],
    control: &'a [f64],
}

impl Serialize for Sample<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut record = serializer.serialize_tuple(1 + self.state.len() + self.control.len())?;
        record.serialize_element(&self.time)?;
        for value in self.state.iter().chain(self.control) {
            record.serialize_element(value)?;
        }
        record.end()
    }
}

/// floor(t_end / dt), tolerant to the rounding of decimal step sizes
/// (0.3 / 0.1 gives 3 steps, not 2). `None` when the count does not fit a
/// `usize`.
pub fn step_count(dt: f64, t_end: f64) -> Option<usize> {
    let ratio = t_end / dt;
    let nearest = ratio.round();
    let steps = if (ratio - nearest).abs() <= 4.0 * f64::EPSILON * nearest.abs().max(1.0) {
        nearest
    } else {
        ratio.floor()
    };
    // usize::MAX as f64 rounds up, so the bound is exclusive
    if !(steps >= 0.0 && steps < usize::MAX as f64) {
        return None;
    }
    Some(steps as usize)
}

/// Largest number of f64 a single buffer can hold.
const MAX_SAMPLES: usize = isize::MAX as usize / std::mem::size_of::<f64>();

/// Explicit Euler simulation of dx/dt = A x + B u under u = -K x.
pub fn simulate(
    a: &DMatrix<f64>,
    b: &DMatrix<f64>,
    k: &DMatrix<f64>,
    x0: &DVector<f64>,
    dt: f64,
    t_end: f64,
) -> Result<Trajectory, Error> {
    let (n, cols) = a.shape();
    if n != cols {
        return Err(DimensionError::NotSquare {
            name: "A",
            rows: n,
            cols,
        }
        .into());
    }
    let m = b.ncols();
    if b.nrows() != n {
        return Err(DimensionError::Mismatch {
            name: "B",
            expected: (n, m),
            found: b.shape(),
        }
        .into());
    }
    if k.shape() != (m, n) {
        return Err(DimensionError::Mismatch {
            name: "K",
            expected: (m, n),
            found: k.shape(),
        }
        .into());
    }
    if x0.len() != n {
        return Err(DimensionError::StateLength {
            expected: n,
            found: x0.len(),
        }
        .into());
    }
    if !(dt.is_finite() && dt > 0.0) {
        return Err(Error::InvalidParameter(format!("time step must be positive, got {dt}")));
    }
    if !(t_end.is_finite() && t_end > 0.0) {
        return Err(Error::InvalidParameter(format!("horizon must be positive, got {t_end}")));
    }

    let steps = step_count(dt, t_end)
        .filter(|steps| {
            steps
                .checked_mul(n.max(m).max(1))
                .map_or(false, |samples| samples <= MAX_SAMPLES)
        })
        .ok_or_else(|| {
            Error::InvalidParameter(format!(
                "horizon {t_end} with time step {dt} needs too many steps"
            ))
        })?;
    let mut states = DMatrix::zeros(steps, n);
    let mut controls = DMatrix::zeros(steps, m);
    let time = (0..steps).map(|i| i as f64 * dt).collect();

    let mut x = x0.clone();
    for i in 0..steps {
        let u = -(k * &x);
        let dx = (a * &x + b * &u) * dt;
        x += dx;
        controls.set_row(i, &u.transpose());
        states.set_row(i, &x.transpose());
    }
    debug!(steps, dt, t_end, "closed-loop simulation done");

    Ok(Trajectory {
        time,
        states,
        controls,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::lqr::lqr;
    use approx::assert_relative_eq;
    use nalgebra::{dmatrix, dvector};

    fn cart_pole() -> (DMatrix<f64>, DMatrix<f64>, DMatrix<f64>) {
        #[rustfmt::skip]
        let a = dmatrix![
            0.0, 1.0, 0.0,     0.0;
            0.0, 0.0, -0.1818, 0.0;
            0.0, 0.0, 0.0,     1.0;
            0.0, 0.0, 2.6727,  0.0
        ];
        let b = dmatrix![0.0; 1.818; 0.0; -2.727];
        let k = lqr(&a, &b, &DMatrix::identity(4, 4), &dmatrix![0.01]).unwrap();
        (a, b, k)
    }

    #[test]
    fn step_count_floors() {
        assert_eq!(step_count(0.02, 5.0), Some(250));
        assert_eq!(step_count(0.1, 0.3), Some(3));
        assert_eq!(step_count(0.3, 1.0), Some(3));
        assert_eq!(step_count(2.0, 1.0), Some(0));
        assert_eq!(step_count(1e-300, 5.0), None);
    }

    #[test]
    fn tiny_time_step_is_rejected_without_allocating() {
        let a = dmatrix![-1.0];
        let b = dmatrix![0.0];
        let k = dmatrix![0.0];
        for dt in [1e-300, f64::MIN_POSITIVE, 1e-18] {
            let err = simulate(&a, &b, &k, &dvector![1.0], dt, 5.0).unwrap_err();
            assert!(
                matches!(err, Error::InvalidParameter(ref msg) if msg.contains("too many steps")),
                "dt = {dt}: {err}"
            );
        }
    }

    #[test]
    fn cart_pole_scenario() -> Result<(), Error> {
        let (a, b, k) = cart_pole();
        let x0 = dvector![0.1, 0.0, 0.05, 0.0];
        let trajectory = simulate(&a, &b, &k, &x0, 0.02, 5.0)?;

        assert_eq!(trajectory.len(), 250);
        assert_eq!(trajectory.state_dim(), 4);
        assert_eq!(trajectory.states.shape(), (250, 4));
        assert_eq!(trajectory.controls.shape(), (250, 1));
        assert_relative_eq!(trajectory.time[1], 0.02);
        assert_relative_eq!(trajectory.time[249], 4.98, epsilon = 1e-12);

        // decays towards the origin
        let cart = trajectory.column(0);
        let angle = trajectory.column(2);
        let tail_max = |v: &[f64]| v[200..].iter().fold(0.0_f64, |m, x| m.max(x.abs()));
        assert!(tail_max(&cart) < 0.5 * x0[0]);
        assert!(tail_max(&angle) < 0.5 * x0[2]);
        Ok(())
    }

    #[test]
    fn first_sample_is_after_the_first_update() -> Result<(), Error> {
        let (a, b, k) = cart_pole();
        let x0 = dvector![0.1, 0.0, 0.05, 0.0];
        let trajectory = simulate(&a, &b, &k, &x0, 0.02, 5.0)?;

        let u0 = -(&k * &x0);
        let x1 = &x0 + (&a * &x0 + &b * &u0) * 0.02;
        assert_relative_eq!(trajectory.states.row(0).transpose(), x1, epsilon = 1e-15);
        assert_relative_eq!(trajectory.controls[(0, 0)], u0[0], epsilon = 1e-15);
        assert_ne!(trajectory.states.row(0).transpose(), x0);
        Ok(())
    }

    #[test]
    fn simulation_is_deterministic() -> Result<(), Error> {
        let (a, b, k) = cart_pole();
        let x0 = dvector![0.1, 0.0, 0.05, 0.0];
        let first = simulate(&a, &b, &k, &x0, 0.02, 1.0)?;
        let second = simulate(&a, &b, &k, &x0, 0.02, 1.0)?;
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn wrong_initial_state_length() {
        let (a, b, k) = cart_pole();
        let err = simulate(&a, &b, &k, &dvector![0.1, 0.0], 0.02, 5.0).unwrap_err();
        assert!(matches!(
            err,
            Error::Dimension(DimensionError::StateLength {
                expected: 4,
                found: 2
            })
        ));
    }

    #[test]
    fn invalid_step_and_horizon() {
        let (a, b, k) = cart_pole();
        let x0 = dvector![0.1, 0.0, 0.05, 0.0];
        for (dt, t_end) in [(0.0, 5.0), (-0.02, 5.0), (0.02, 0.0), (f64::NAN, 1.0)] {
            let err = simulate(&a, &b, &k, &x0, dt, t_end).unwrap_err();
            assert!(matches!(err, Error::InvalidParameter(_)));
        }
    }

    #[test]
    fn gain_shape_is_checked() {
        let (a, b, _) = cart_pole();
        let k = DMatrix::zeros(1, 3);
        let err = simulate(&a, &b, &k, &dvector![0.1, 0.0, 0.05, 0.0], 0.02, 1.0).unwrap_err();
        assert!(matches!(
            err,
            Error::Dimension(DimensionError::Mismatch { name: "K", .. })
        ));
    }

    #[test]
    fn final_state() -> Result<(), Error> {
        let a = dmatrix![-1.0];
        let b = dmatrix![0.0];
        let k = dmatrix![0.0];
        let trajectory = simulate(&a, &b, &k, &dvector![1.0], 0.5, 1.0)?;
        // x <- x - 0.5 x, twice
        assert_eq!(trajectory.final_state(), Some(dvector![0.25]));

        let empty = simulate(&a, &b, &k, &dvector![1.0], 2.0, 1.0)?;
        assert!(empty.is_empty());
        assert_eq!(empty.final_state(), None);
        Ok(())
    }

    #[test]
    fn csv_export() -> Result<(), Error> {
        let (a, b, k) = cart_pole();
        let trajectory = simulate(&a, &b, &k, &dvector![0.1, 0.0, 0.05, 0.0], 0.02, 0.1)?;

        let mut buffer = Vec::new();
        trajectory.write_csv(&mut buffer)?;
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "t,x0,x1,x2,x3,u0");
        assert_eq!(lines.len(), 1 + trajectory.len());
        assert!(lines[1..].iter().all(|line| line.split(',').count() == 6));
        let first: Vec<f64> = lines[1].split(',').map(|v| v.parse().unwrap()).collect();
        assert_eq!(first[0], 0.0);
        assert_relative_eq!(first[1], trajectory.states[(0, 0)], epsilon = 1e-12);
        Ok(())
    }
}
