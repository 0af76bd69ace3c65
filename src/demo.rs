use nalgebra::{dvector, DVector};
use std::error::Error;
use std::path::PathBuf;
use tracing::info;

use crate::control::lqr::{closed_loop, poles, LinearModel, LqrSolution};
use crate::control::simulation::{simulate, Trajectory};
use crate::models::cart_pole::{CART_POSITION, POLE_ANGLE};
use crate::utils::plot::plot_states;

/// Everything the closed-loop demo needs besides the model.
#[derive(Debug, Clone, PartialEq)]
pub struct DemoConfig {
    pub x0: DVector<f64>,
    /// Euler step [s]
    pub dt: f64,
    /// Horizon [s]
    pub t_end: f64,
    pub output: PathBuf,
    /// (state index, legend label) of the plotted curves
    pub series: Vec<(usize, String)>,
    pub title: String,
}

impl Default for DemoConfig {
    fn default() -> DemoConfig {
        DemoConfig {
            x0: dvector![0.1, 0.0, 0.05, 0.0],
            dt: 0.02,
            t_end: 5.0,
            output: PathBuf::from("projects/mpc-cartpole/results_demo.png"),
            series: vec![
                (CART_POSITION, "cart pos".to_owned()),
                (POLE_ANGLE, "pole angle".to_owned()),
            ],
            title: "LQR closed-loop (toy)".to_owned(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DemoOutput {
    pub solution: LqrSolution<f64>,
    pub trajectory: Trajectory,
    pub image: PathBuf,
}

/// Computes the LQR gain, simulates the closed loop and plots it.
/// Prints the gain and the path of the written image.
pub fn simulate_and_plot(
    model: &impl LinearModel<f64>,
    config: &DemoConfig,
) -> Result<DemoOutput, Box<dyn Error>> {
    let solution = model.lqr()?;
    println!("LQR gain K = {}", solution.gain);

    let a_cl = closed_loop(model.a(), model.b(), &solution.gain);
    for pole in poles(&a_cl)? {
        info!(re = pole.re, im = pole.im, "closed-loop pole");
    }

    let trajectory = simulate(
        model.a(),
        model.b(),
        &solution.gain,
        &config.x0,
        config.dt,
        config.t_end,
    )?;

    let series: Vec<(usize, &str)> = config
        .series
        .iter()
        .map(|(column, label)| (*column, label.as_str()))
        .collect();
    plot_states(&config.output, &trajectory, &series, &config.title)?;
    println!("Saved {}", config.output.display());

    Ok(DemoOutput {
        solution,
        trajectory,
        image: config.output.clone(),
    })
}
