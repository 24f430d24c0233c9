use crate::errors::{BenchError, Result};
use ndarray::{Array1, Array2};
use plotters::prelude::*;
use std::path::Path;

fn plot_err<E: std::fmt::Display>(e: E) -> BenchError {
    BenchError::Plot(e.to_string())
}

fn range_with_margin(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (min, max) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if !min.is_finite() || !max.is_finite() {
        return (-1.0, 1.0);
    }
    let pad = if max > min { 0.05 * (max - min) } else { 1.0 };
    (min - pad, max + pad)
}

/// observed values as markers, predicted values (if any) as lines, one colour per variable
pub fn plot_series(
    filename: &Path,
    title: &str,
    arg: &str,
    grid: &Array1<f64>,
    observed: &Array2<f64>,
    predicted: Option<&Array2<f64>>,
    labels: &[String],
) -> Result<()> {
    let x_min = grid.iter().cloned().fold(f64::INFINITY, f64::min);
    let x_max = grid.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let all_values = observed
        .iter()
        .chain(predicted.into_iter().flat_map(|p| p.iter()))
        .cloned();
    let (y_min, y_max) = range_with_margin(all_values);

    let root_area = BitMapBackend::new(filename, (800, 600)).into_drawing_area();
    root_area.fill(&WHITE).map_err(plot_err)?;
    let mut chart = ChartBuilder::on(&root_area)
        .caption(title, ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(50)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)
        .map_err(plot_err)?;
    chart
        .configure_mesh()
        .x_desc(arg)
        .draw()
        .map_err(plot_err)?;

    for (col, varname) in labels.iter().enumerate().take(observed.ncols()) {
        let points: Vec<(f64, f64)> = grid
            .iter()
            .zip(observed.column(col).iter())
            .map(|(&x, &y)| (x, y))
            .collect();
        chart
            .draw_series(
                points
                    .iter()
                    .map(|&p| Cross::new(p, 3, Palette99::pick(col).stroke_width(1))),
            )
            .map_err(plot_err)?
            .label(format!("{} observed", varname))
            .legend(move |(x, y)| Cross::new((x + 10, y), 3, Palette99::pick(col).stroke_width(1)));

        if let Some(pred) = predicted {
            if col < pred.ncols() {
                let series: Vec<(f64, f64)> = grid
                    .iter()
                    .zip(pred.column(col).iter())
                    .map(|(&x, &y)| (x, y))
                    .collect();
                chart
                    .draw_series(LineSeries::new(series, &Palette99::pick(col)))
                    .map_err(plot_err)?
                    .label(format!("{} predicted", varname))
                    .legend(move |(x, y)| {
                        PathElement::new(vec![(x, y), (x + 20, y)], &Palette99::pick(col))
                    });
            }
        }
    }

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()
        .map_err(plot_err)?;
    root_area.present().map_err(plot_err)?;
    Ok(())
}

/// diverging red-blue colour for a value scaled into [-1, 1]
fn diverging_color(s: f64) -> RGBColor {
    let s = s.clamp(-1.0, 1.0);
    if s >= 0.0 {
        let fade = (255.0 * (1.0 - s)) as u8;
        RGBColor(255, fade, fade)
    } else {
        let fade = (255.0 * (1.0 + s)) as u8;
        RGBColor(fade, fade, 255)
    }
}

/// heat map of a 2D field: rows along the first axis of `area`, columns along the second one.
/// The colour range is symmetric around zero unless `interval` is given
pub fn heatmap(
    filename: &Path,
    field: &Array2<f64>,
    area: ((f64, f64), (f64, f64)),
    interval: Option<(f64, f64)>,
    title: &str,
) -> Result<()> {
    let (n_rows, n_cols) = field.dim();
    if n_rows == 0 || n_cols == 0 {
        return Err(BenchError::ShapeMismatch("heatmap of an empty field".to_string()));
    }
    let (vmin, vmax) = interval.unwrap_or_else(|| {
        let bound = field
            .iter()
            .filter(|v| v.is_finite())
            .fold(0.0_f64, |acc, v| acc.max(v.abs()));
        (-bound, bound)
    });
    let center = 0.5 * (vmin + vmax);
    let half_width = if vmax > vmin { 0.5 * (vmax - vmin) } else { 1.0 };

    let ((r0, r1), (c0, c1)) = area;
    let dr = (r1 - r0) / n_rows as f64;
    let dc = (c1 - c0) / n_cols as f64;

    let root_area = BitMapBackend::new(filename, (800, 600)).into_drawing_area();
    root_area.fill(&WHITE).map_err(plot_err)?;
    let mut chart = ChartBuilder::on(&root_area)
        .caption(title, ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(50)
        .build_cartesian_2d(c0..c1, r0..r1)
        .map_err(plot_err)?;
    chart.configure_mesh().disable_mesh().draw().map_err(plot_err)?;

    chart
        .draw_series((0..n_rows).flat_map(|i| (0..n_cols).map(move |j| (i, j))).map(
            |(i, j)| {
                let value = field[[i, j]];
                let x0 = c0 + j as f64 * dc;
                let y0 = r0 + i as f64 * dr;
                Rectangle::new(
                    [(x0, y0), (x0 + dc, y0 + dr)],
                    diverging_color((value - center) / half_width).filled(),
                )
            },
        ))
        .map_err(plot_err)?;
    root_area.present().map_err(plot_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_with_margin() {
        let (lo, hi) = range_with_margin(vec![0.0, 10.0, f64::NAN].into_iter());
        assert!((lo + 0.5).abs() < 1e-12);
        assert!((hi - 10.5).abs() < 1e-12);
        let (lo, hi) = range_with_margin(vec![2.0, 2.0].into_iter());
        assert_eq!((lo, hi), (1.0, 3.0));
        assert_eq!(range_with_margin(std::iter::empty()), (-1.0, 1.0));
    }

    #[test]
    fn test_diverging_color() {
        let rgb = |c: RGBColor| (c.0, c.1, c.2);
        assert_eq!(rgb(diverging_color(1.0)), (255, 0, 0));
        assert_eq!(rgb(diverging_color(-1.0)), (0, 0, 255));
        assert_eq!(rgb(diverging_color(0.0)), (255, 255, 255));
        assert_eq!(rgb(diverging_color(5.0)), (255, 0, 0));
    }
}
