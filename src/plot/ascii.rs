//! ASCII plotting for terminal output.
//!
//! Fixed-size grid, deterministic output. Consecutive points are joined
//! with `-` and every sample is marked with `o`.

use crate::output::History;

/// Render `(x, y)` pairs of two history columns.
pub fn render_history_plot(history: &History, x: &str, y: &str, width: usize, height: usize) -> Option<String> {
    let xs = history.column(x)?;
    let ys = history.column(y)?;
    let points: Vec<(f64, f64)> = xs.into_iter().zip(ys).collect();
    Some(format!("{x} vs {y}\n{}", render_ascii_plot(&points, width, height)))
}

/// Render a plot of the given points; non-finite points are skipped.
pub fn render_ascii_plot(points: &[(f64, f64)], width: usize, height: usize) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let points: Vec<(f64, f64)> = points
        .iter()
        .copied()
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .collect();

    let (x_min, x_max) = pad_range(range(points.iter().map(|p| p.0)).unwrap_or((0.0, 1.0)), 0.0);
    let (y_min, y_max) = pad_range(range(points.iter().map(|p| p.1)).unwrap_or((0.0, 1.0)), 0.05);

    let mut grid = vec![vec![' '; width]; height];

    // Line first so the markers overlay it.
    let cells: Vec<(usize, usize)> = points
        .iter()
        .map(|&(x, y)| (map_x(x, x_min, x_max, width), map_y(y, y_min, y_max, height)))
        .collect();
    for pair in cells.windows(2) {
        draw_line(&mut grid, pair[0], pair[1], '-');
    }
    for &(cx, cy) in &cells {
        grid[cy][cx] = 'o';
    }

    let mut out = String::new();
    out.push_str(&format!(
        "Plot: x=[{x_min:.4e}, {x_max:.4e}] | y=[{y_min:.4e}, {y_max:.4e}]\n"
    ));
    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }
    out
}

fn range(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for v in values {
        min = min.min(v);
        max = max.max(v);
    }
    if min.is_finite() && max.is_finite() {
        Some((min, max))
    } else {
        None
    }
}

/// Pad by `frac` of the span; a degenerate range is widened by one unit.
fn pad_range((min, max): (f64, f64), frac: f64) -> (f64, f64) {
    let span = max - min;
    if span.abs() < 1e-300 {
        let pad = 0.5 * min.abs().max(1.0);
        return (min - pad, max + pad);
    }
    let pad = span * frac;
    (min - pad, max + pad)
}

fn map_x(x: f64, x_min: f64, x_max: f64, width: usize) -> usize {
    let u = ((x - x_min) / (x_max - x_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // row 0 is the top
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

/// Integer line drawing (Bresenham).
fn draw_line(grid: &mut [Vec<char>], from: (usize, usize), to: (usize, usize), ch: char) {
    let (mut x0, mut y0) = (from.0 as isize, from.1 as isize);
    let (x1, y1) = (to.0 as isize, to.1 as isize);

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if let Some(cell) = grid.get_mut(y0 as usize).and_then(|row| row.get_mut(x0 as usize)) {
            if *cell == ' ' {
                *cell = ch;
            }
        }
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plot_golden_snapshot_small() {
        let txt = render_ascii_plot(&[(0.0, 0.0), (1.0, 1.0)], 10, 5);
        let expected = concat!(
            "Plot: x=[0.0000e0, 1.0000e0] | y=[-5.0000e-2, 1.0500e0]\n",
            "        -o\n",
            "      --  \n",
            "    --    \n",
            "  --      \n",
            "o-        \n",
        );
        assert_eq!(txt, expected);
    }

    #[test]
    fn history_columns_are_looked_up_by_name() {
        let history = History {
            header: vec!["TIME".into(), "STRESS_XX".into()],
            rows: vec![vec![0.0, 0.0], vec![1.0, 2.0]],
        };
        let txt = render_history_plot(&history, "time", "stress_xx", 10, 5).unwrap();
        assert!(txt.starts_with("time vs stress_xx\nPlot:"));
        assert!(render_history_plot(&history, "TIME", "PRES", 10, 5).is_none());
    }

    #[test]
    fn degenerate_data_still_renders() {
        let txt = render_ascii_plot(&[(1.0, 5.0)], 10, 5);
        assert_eq!(txt.lines().count(), 6);
        assert_eq!(render_ascii_plot(&[], 10, 5).lines().count(), 6);
    }
}
