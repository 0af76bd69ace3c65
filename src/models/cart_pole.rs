use nalgebra::{dmatrix, DMatrix, DVector};

use crate::models::LinearSystem;

/// Index of the cart position in the state [x, x_dot, theta, theta_dot]
pub const CART_POSITION: usize = 0;
/// Index of the pole angle in the state [x, x_dot, theta, theta_dot]
pub const POLE_ANGLE: usize = 2;

/// Cart with an inverted pendulum, linearized around the upright position.
/// state = [x, x_dot, theta, theta_dot], input = horizontal force on the cart
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CartPole {
    /// length of bar [m]
    pub length: f64,
    /// [kg]
    pub mass_cart: f64,
    /// [kg]
    pub mass_pole: f64,
    /// [m/s^2]
    pub gravity: f64,
}

impl Default for CartPole {
    fn default() -> CartPole {
        CartPole {
            length: 2.0,
            mass_cart: 1.0,
            mass_pole: 0.3,
            gravity: 9.8,
        }
    }
}

impl CartPole {
    pub fn new(length: f64, mass_cart: f64, mass_pole: f64, gravity: f64) -> CartPole {
        CartPole {
            length,
            mass_cart,
            mass_pole,
            gravity,
        }
    }

    pub fn a(&self) -> DMatrix<f64> {
        let (l, m_c, m_p, g) = (self.length, self.mass_cart, self.mass_pole, self.gravity);
        #[rustfmt::skip]
        let a = dmatrix![
            0.0, 1.0, 0.0,                         0.0;
            0.0, 0.0, m_p * g / m_c,               0.0;
            0.0, 0.0, 0.0,                         1.0;
            0.0, 0.0, g * (m_c + m_p) / (l * m_c), 0.0
        ];
        a
    }

    pub fn b(&self) -> DMatrix<f64> {
        dmatrix![0.0; 1.0 / self.mass_cart; 0.0; 1.0 / (self.length * self.mass_cart)]
    }

    /// Linear model with Q = diag(10, 1, 10, 1) and R = 0.01
    pub fn linearize(&self) -> LinearSystem<f64> {
        let q = DMatrix::from_diagonal(&DVector::from_vec(vec![10.0, 1.0, 10.0, 1.0]));
        let r = dmatrix![0.01];
        LinearSystem::from_parts(self.a(), self.b(), q, r)
    }
}

/// The hand-tuned toy linearization of the demo, Q = I and R = 0.01
pub fn toy_linearization() -> LinearSystem<f64> {
    #[rustfmt::skip]
    let a = dmatrix![
        0.0, 1.0, 0.0,     0.0;
        0.0, 0.0, -0.1818, 0.0;
        0.0, 0.0, 0.0,     1.0;
        0.0, 0.0, 2.6727,  0.0
    ];
    let b = dmatrix![0.0; 1.818; 0.0; -2.727];
    LinearSystem::from_parts(a, b, DMatrix::identity(4, 4), dmatrix![0.01])
}
