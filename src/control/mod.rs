pub mod care;
pub mod lqr;
pub mod simulation;

pub use care::{CareSolver, SignFunctionSolver};
pub use lqr::{lqr, LinearModel, LqrSolution};
pub use simulation::{simulate, Trajectory};
