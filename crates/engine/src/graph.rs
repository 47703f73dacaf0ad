//! Ordinary least-squares line fitting over 2D points.

use crate::error::{EngineError, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// The centroid of a set of points and the line of best fit through them.
///
/// The fit is computed once, on construction. Predicting from an empty graph
/// or from a vertical line is an error the caller decides how to handle.
#[derive(Debug, Clone)]
pub struct Graph {
    mean: Option<Point>,
    /// (slope, intercept); `None` when empty or vertical
    line: Option<(f64, f64)>,
}

impl Graph {
    pub fn new(points: Vec<Point>) -> Self {
        let n = points.len() as f64;
        let mean = (!points.is_empty()).then(|| {
            let (sum_x, sum_y) = points
                .iter()
                .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
            Point::new(sum_x / n, sum_y / n)
        });

        let line = mean.and_then(|mean| {
            let (sxx, sxy) = points.iter().fold((0.0, 0.0), |(sxx, sxy), p| {
                let dx = p.x - mean.x;
                (sxx + dx * dx, sxy + dx * (p.y - mean.y))
            });
            if sxx == 0.0 {
                None
            } else {
                let slope = sxy / sxx;
                Some((slope, mean.y - slope * mean.x))
            }
        });

        Self { mean, line }
    }

    /// The centroid of all points, or `None` for an empty graph.
    pub fn mean_point(&self) -> Option<Point> {
        self.mean
    }

    /// Evaluate the line of best fit at `x`.
    ///
    /// # Returns
    /// * `Err(EmptyGraph)` - There are no points
    /// * `Err(VerticalLine)` - Every point has the same x
    pub fn predict_y(&self, x: f64) -> Result<f64> {
        match (self.mean, self.line) {
            (None, _) => Err(EngineError::EmptyGraph),
            (Some(_), None) => Err(EngineError::VerticalLine),
            (Some(_), Some((slope, intercept))) => Ok(slope * x + intercept),
        }
    }
}
