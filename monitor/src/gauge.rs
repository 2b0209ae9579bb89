//! Liquid gauge geometry
//!
//! The memory gauge is a circle filled from the bottom, with the fill's
//! surface drawn as a sine wave. [`GaugePathBuilder::build`] turns a fill
//! percentage into the closed boundary of that region: the wave from left to
//! right, then back along the circle. Which arcs are walked depends on
//! whether the wave ends and starts above or below the circle's horizontal
//! midline, and the order of those walks decides the rendered shape, so the
//! case split below must stay as it is.
//!
//! Coordinates live in the gauge's square box with y growing downwards; x is
//! stepped in whole units.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

/// A vertex of the gauge boundary
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Fixed shape parameters of the gauge
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaugeGeometry {
    /// Side of the square box; the circle touches all four sides
    pub size: u16,

    /// Wave amplitude
    pub amplitude: f64,

    /// Wave angular frequency, per unit of x
    pub frequency: f64,
}

impl Default for GaugeGeometry {
    fn default() -> Self {
        Self {
            size: 80,
            amplitude: 5.0,
            frequency: 0.08,
        }
    }
}

impl GaugeGeometry {
    pub fn center(&self) -> Point {
        let half = f64::from(self.size) / 2.0;
        Point::new(half, half)
    }

    pub fn radius(&self) -> f64 {
        f64::from(self.size) / 2.0
    }

    /// Half the horizontal chord at vertical offset `dy` from the center
    fn half_chord(&self, dy: f64) -> f64 {
        let r = self.radius();
        (r * r - dy * dy).max(0.0).sqrt()
    }

    /// y of the circle's upper half at column `x`
    fn upper_arc(&self, x: i32) -> f64 {
        let center = self.center();
        center.y - self.half_chord(f64::from(x) - center.x)
    }

    /// y of the circle's lower half at column `x`
    fn lower_arc(&self, x: i32) -> f64 {
        let center = self.center();
        center.y + self.half_chord(f64::from(x) - center.x)
    }

    /// y of the fill surface at column `x` for a nominal fill line `level`
    fn wave(&self, x: i32, level: f64) -> f64 {
        self.amplitude * (self.frequency * f64::from(x)).sin() + level
    }
}

/// Closed boundary of the filled region, in drawing order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaugePath {
    points: Vec<Point>,
}

impl GaugePath {
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Point> {
        self.points.iter()
    }

    /// Enclosed area (shoelace formula, closing edge included)
    pub fn area(&self) -> f64 {
        let n = self.points.len();
        if n < 3 {
            return 0.0;
        }
        let twice: f64 = (0..n)
            .map(|i| {
                let a = self.points[i];
                let b = self.points[(i + 1) % n];
                a.x * b.y - b.x * a.y
            })
            .sum();
        twice.abs() / 2.0
    }

    /// Smallest and largest coordinates over all vertices
    pub fn bounds(&self) -> Option<(Point, Point)> {
        let first = *self.points.first()?;
        Some(self.points.iter().fold((first, first), |(min, max), p| {
            (
                Point::new(min.x.min(p.x), min.y.min(p.y)),
                Point::new(max.x.max(p.x), max.y.max(p.y)),
            )
        }))
    }

    /// SVG path data (`M x y L x y … Z`) with two decimals
    pub fn to_svg_path(&self) -> String {
        let mut data = String::with_capacity(self.points.len() * 14);
        for (i, p) in self.points.iter().enumerate() {
            let command = if i == 0 { 'M' } else { 'L' };
            let _ = write!(data, "{}{:.2} {:.2} ", command, p.x, p.y);
        }
        if !self.points.is_empty() {
            data.push('Z');
        }
        data
    }
}

impl<'a> IntoIterator for &'a GaugePath {
    type Item = &'a Point;
    type IntoIter = std::slice::Iter<'a, Point>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

/// Builds gauge boundaries for a fixed geometry
#[derive(Debug, Clone, Copy, Default)]
pub struct GaugePathBuilder {
    geometry: GaugeGeometry,
}

impl GaugePathBuilder {
    pub fn new(geometry: GaugeGeometry) -> Self {
        Self { geometry }
    }

    pub fn geometry(&self) -> &GaugeGeometry {
        &self.geometry
    }

    /// Boundary of the region filled to `percent` (0..=100).
    ///
    /// 0 collapses to a degenerate path at the bottom of the circle, 100
    /// traces the whole circle.
    pub fn build(&self, percent: u8) -> GaugePath {
        debug_assert!(percent <= 100, "gauge percent must be within 0..=100, got {}", percent);
        let percent = percent.min(100);

        let g = &self.geometry;
        let size = i32::from(g.size);
        let center = g.center();

        // Nominal fill line and the column where it meets the left of the circle.
        let level = (1.0 - f64::from(percent) * 0.01) * f64::from(g.size);
        let start_x = (center.x - g.half_chord(level - center.y)) as i32;
        let end_x = size - start_x;

        let mut points = Vec::with_capacity(2 * usize::from(g.size) + 8);
        points.push(Point::new(f64::from(start_x), level));

        // Wave surface, left to right.
        for x in start_x..=end_x {
            points.push(Point::new(f64::from(x), g.wave(x, level)));
        }
        let end_y = g.wave(end_x, level);

        // A wave ending above the midline first climbs the upper right arc.
        let arc_x = if end_y < center.y {
            for x in end_x..=size {
                points.push(Point::new(f64::from(x), g.upper_arc(x)));
            }
            size
        } else {
            end_x
        };

        if level < center.y {
            // Started above the midline: whole lower half, then up the left side.
            for x in (0..=arc_x).rev() {
                points.push(Point::new(f64::from(x), g.lower_arc(x)));
            }
            for x in 0..=start_x {
                points.push(Point::new(f64::from(x), g.upper_arc(x)));
            }
        } else {
            for x in (start_x..=arc_x).rev() {
                points.push(Point::new(f64::from(x), g.lower_arc(x)));
            }
        }

        GaugePath { points }
    }
}

/// Build a gauge boundary with the default geometry
pub fn build_gauge_path(percent: u8) -> GaugePath {
    GaugePathBuilder::default().build(percent)
}
