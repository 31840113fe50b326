//! Run plotting for beacon localization results.
//!
//! The upper panel shows the particle cloud at every tick together with the true and estimated
//! positions and the beacon locations. The lower panel shows the estimation error and the
//! particle spread.

use plotters::prelude::*;
use std::error::Error;
use std::path::Path;

use beaconpf::sensing::Beacon;
use beaconpf::sim::SimulationResult;

/// Split a positional series into segments wherever consecutive values jump by more than half
/// the world, so wraparound does not draw a line across the whole panel.
pub fn split_at_wraps(points: &[(f64, f64)], world_size: f64) -> Vec<Vec<(f64, f64)>> {
    let mut segments: Vec<Vec<(f64, f64)>> = Vec::new();
    let mut current: Vec<(f64, f64)> = Vec::new();
    for &point in points {
        if let Some(&(_, last)) = current.last()
            && (point.1 - last).abs() > world_size / 2.0
        {
            segments.push(std::mem::take(&mut current));
        }
        current.push(point);
    }
    if !current.is_empty() {
        segments.push(current);
    }
    segments
}

/// Render a two-panel PNG summary of a simulated run.
///
/// # Arguments
/// * `result` - Simulation output; particle snapshots are drawn when present
/// * `beacons` - Beacons to mark on the position panel
/// * `world_size` - Circumference of the world, used as the position axis range
/// * `output_path` - Path where the plot image will be saved
pub fn plot_run(
    result: &SimulationResult,
    beacons: &[Beacon],
    world_size: f64,
    output_path: &Path,
) -> Result<(), Box<dyn Error>> {
    if result.records.is_empty() {
        return Err("No data points to plot".into());
    }

    let root = BitMapBackend::new(output_path, (1200, 800)).into_drawing_area();
    root.fill(&WHITE)?;
    let (upper, lower) = root.split_vertically(500);

    let max_tick = result.records.len() as f64 + 1.0;
    let truth: Vec<(f64, f64)> = result
        .records
        .iter()
        .map(|r| (r.tick as f64, r.true_position))
        .collect();
    let estimate: Vec<(f64, f64)> = result
        .records
        .iter()
        .map(|r| (r.tick as f64, r.estimate))
        .collect();

    let mut chart = ChartBuilder::on(&upper)
        .caption("Beacon particle filter", ("sans-serif", 16).into_font())
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0..max_tick, 0.0..world_size)?;
    chart
        .configure_mesh()
        .x_desc("Tick")
        .y_desc("Position")
        .draw()?;

    for (i, snapshot) in result.snapshots.iter().enumerate() {
        let tick = result.records.get(i).map_or(i as f64 + 1.0, |r| r.tick as f64);
        chart.draw_series(
            snapshot
                .iter()
                .map(|p| Circle::new((tick, p.position), 1, BLACK.mix(0.15).filled())),
        )?;
    }

    for (i, beacon) in beacons.iter().enumerate() {
        let series = chart.draw_series(LineSeries::new(
            vec![(0.0, beacon.x), (max_tick, beacon.x)],
            GREEN.stroke_width(1),
        ))?;
        if i == 0 {
            series
                .label("Beacon")
                .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], GREEN));
        }
    }

    for (i, segment) in split_at_wraps(&truth, world_size).into_iter().enumerate() {
        let series = chart.draw_series(LineSeries::new(segment, BLUE.stroke_width(2)))?;
        if i == 0 {
            series
                .label("Truth")
                .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE));
        }
    }
    for (i, segment) in split_at_wraps(&estimate, world_size).into_iter().enumerate() {
        let series = chart.draw_series(LineSeries::new(segment, &RED))?;
        if i == 0 {
            series
                .label("Estimate")
                .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED));
        }
    }
    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    let max_error = result
        .records
        .iter()
        .flat_map(|r| [r.error, r.spread])
        .filter(|v| v.is_finite())
        .fold(0.0f64, f64::max);
    let y_max = if max_error > 0.0 { max_error * 1.1 } else { 1.0 };

    let mut errors = ChartBuilder::on(&lower)
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0..max_tick, 0.0..y_max)?;
    errors
        .configure_mesh()
        .x_desc("Tick")
        .y_desc("Distance")
        .draw()?;
    errors
        .draw_series(LineSeries::new(
            result.records.iter().map(|r| (r.tick as f64, r.error)),
            &RED,
        ))?
        .label("Error")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED));
    errors
        .draw_series(LineSeries::new(
            result.records.iter().map(|r| (r.tick as f64, r.spread)),
            &MAGENTA,
        ))?
        .label("Spread")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], MAGENTA));
    errors
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_at_wraps_keeps_continuous_series() {
        let points = vec![(1.0, 10.0), (2.0, 11.0), (3.0, 12.0)];
        let segments = split_at_wraps(&points, 100.0);
        assert_eq!(segments, vec![points]);
    }

    #[test]
    fn test_split_at_wraps_breaks_at_edge() {
        let points = vec![(1.0, 98.0), (2.0, 99.5), (3.0, 0.5), (4.0, 1.5)];
        let segments = split_at_wraps(&points, 100.0);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0], vec![(1.0, 98.0), (2.0, 99.5)]);
        assert_eq!(segments[1], vec![(3.0, 0.5), (4.0, 1.5)]);
    }

    #[test]
    fn test_plot_run_rejects_empty_result() {
        let result = SimulationResult {
            records: Vec::new(),
            snapshots: Vec::new(),
            final_state: Vec::new(),
            seed: 0,
        };
        let dir = tempfile::tempdir().unwrap();
        assert!(plot_run(&result, &[], 100.0, &dir.path().join("run.png")).is_err());
    }
}
