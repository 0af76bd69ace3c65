pub mod cart_pole;
mod linear_system;

pub use cart_pole::CartPole;
pub use linear_system::LinearSystem;
