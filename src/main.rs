use std::error::Error;

use cartpole_lqr::demo::{simulate_and_plot, DemoConfig};
use cartpole_lqr::models::cart_pole::toy_linearization;
use cartpole_lqr::utils::logging;

fn main() -> Result<(), Box<dyn Error>> {
    logging::init("warn");

    let system = toy_linearization();
    simulate_and_plot(&system, &DemoConfig::default())?;
    Ok(())
}
