use plotters::prelude::*;
use std::error::Error;
use std::path::Path;

use crate::control::simulation::Trajectory;

/// Line plot of some state components against time, written as a PNG.
/// `series` pairs a state index with its legend label.
pub fn plot_states(
    path: &Path,
    trajectory: &Trajectory,
    series: &[(usize, &str)],
    title: &str,
) -> Result<(), Box<dyn Error>> {
    if let Some(&(column, _)) = series.iter().find(|(c, _)| *c >= trajectory.state_dim()) {
        return Err(format!(
            "cannot plot state {column}, trajectory has {} states",
            trajectory.state_dim()
        )
        .into());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let columns: Vec<Vec<f64>> = series.iter().map(|(c, _)| trajectory.column(*c)).collect();
    let (min_t, max_t) = time_range(&trajectory.time);
    let (min_y, max_y) = value_range(&columns);

    let root = BitMapBackend::new(path, (1024, 768)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .caption(title, ("sans-serif", 40))
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(min_t..max_t, min_y..max_y)?;

    chart.configure_mesh().x_desc("time (s)").draw()?;

    for (idx, ((_, label), values)) in series.iter().zip(columns.iter()).enumerate() {
        let color = Palette99::pick(idx).to_rgba();
        chart
            .draw_series(LineSeries::new(
                trajectory.time.iter().copied().zip(values.iter().copied()),
                color.stroke_width(2),
            ))?
            .label(*label)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

fn time_range(time: &[f64]) -> (f64, f64) {
    match (time.first(), time.last()) {
        (Some(&first), Some(&last)) if last > first => (first, last),
        (Some(&first), _) => (first, first + 1.0),
        _ => (0.0, 1.0),
    }
}

/// Bounds of all values with a 5% margin.
fn value_range(columns: &[Vec<f64>]) -> (f64, f64) {
    let (min, max) = columns
        .iter()
        .flatten()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if min > max {
        return (-1.0, 1.0);
    }
    let span = max - min;
    if span == 0.0 {
        let pad = if min == 0.0 { 1.0 } else { 0.1 * min.abs() };
        return (min - pad, max + pad);
    }
    (min - 0.05 * span, max + 0.05 * span)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::DMatrix;

    #[test]
    fn value_range_has_margin() {
        let (lo, hi) = value_range(&[vec![0.0, 1.0], vec![-1.0, 0.5]]);
        assert_relative_eq!(lo, -1.1);
        assert_relative_eq!(hi, 1.1);
    }

    #[test]
    fn value_range_degenerate() {
        assert_eq!(value_range(&[]), (-1.0, 1.0));
        assert_eq!(value_range(&[vec![0.0, 0.0]]), (-1.0, 1.0));
        let (lo, hi) = value_range(&[vec![2.0, f64::NAN]]);
        assert_relative_eq!(lo, 1.8);
        assert_relative_eq!(hi, 2.2);
    }

    #[test]
    fn time_range_of_single_sample() {
        assert_eq!(time_range(&[0.0, 0.5, 1.0]), (0.0, 1.0));
        assert_eq!(time_range(&[3.0]), (3.0, 4.0));
        assert_eq!(time_range(&[]), (0.0, 1.0));
    }

    #[test]
    fn unknown_state_is_rejected() {
        let trajectory = Trajectory {
            time: vec![0.0],
            states: DMatrix::zeros(1, 2),
            controls: DMatrix::zeros(1, 1),
        };
        let path = std::env::temp_dir().join("cartpole-lqr-never-written.png");
        let err = plot_states(&path, &trajectory, &[(5, "oops")], "bad").unwrap_err();
        assert!(err.to_string().contains("cannot plot state 5"));
        assert!(!path.exists());
    }
}
