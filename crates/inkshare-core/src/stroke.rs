//! Stroke data model.

use kurbo::{BezPath, Rect};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Drawing tool a point was captured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    #[default]
    Brush,
    Eraser,
}

/// A single captured sample of a stroke.
///
/// Color and width are carried per point so a stroke is self-describing
/// when replayed from the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub color: String,
    pub width: f64,
    #[serde(default)]
    pub tool: Tool,
}

impl Point {
    /// Create a brush point.
    pub fn new(x: f64, y: f64, color: impl Into<String>, width: f64) -> Self {
        Self {
            x,
            y,
            color: color.into(),
            width,
            tool: Tool::Brush,
        }
    }

    /// Builder-style tool override.
    pub fn with_tool(mut self, tool: Tool) -> Self {
        self.tool = tool;
        self
    }

    /// Position as a kurbo point.
    pub fn position(&self) -> kurbo::Point {
        kurbo::Point::new(self.x, self.y)
    }

    /// Reject samples that cannot be rendered.
    pub fn validate(&self) -> Result<(), StrokeError> {
        if !self.x.is_finite() || !self.y.is_finite() {
            return Err(StrokeError::NonFiniteCoordinate);
        }
        // Any finite width is drawable, including zero and negatives.
        if !self.width.is_finite() {
            return Err(StrokeError::NonFiniteWidth);
        }
        Ok(())
    }
}

/// Errors for input that must never reach the log.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StrokeError {
    #[error("stroke has no points")]
    Empty,
    #[error("point has a non-finite coordinate")]
    NonFiniteCoordinate,
    #[error("point has a non-finite width")]
    NonFiniteWidth,
}

/// One continuous line, points in drawing order.
///
/// Serialized as a bare array of points.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Stroke {
    points: Vec<Point>,
}

impl Stroke {
    /// Create an empty stroke.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from existing points.
    pub fn from_points(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Add a point to the end of the stroke.
    pub fn add_point(&mut self, point: Point) {
        self.points.push(point);
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// A stroke must have at least one point and every point must be renderable.
    ///
    /// Single-point strokes are valid; they render as a dot.
    pub fn validate(&self) -> Result<(), StrokeError> {
        if self.points.is_empty() {
            return Err(StrokeError::Empty);
        }
        self.points.iter().try_for_each(Point::validate)
    }

    /// Path connecting consecutive points with straight segments.
    pub fn to_path(&self) -> BezPath {
        let mut path = BezPath::new();
        let mut iter = self.points.iter();
        if let Some(first) = iter.next() {
            path.move_to(first.position());
            for point in iter {
                path.line_to(point.position());
            }
        }
        path
    }

    /// Bounding box of the point positions, ignoring width.
    pub fn bounds(&self) -> Option<Rect> {
        let mut iter = self.points.iter();
        let first = iter.next()?.position();
        Some(iter.fold(Rect::from_points(first, first), |rect, p| {
            rect.union_pt(p.position())
        }))
    }
}

impl From<Vec<Point>> for Stroke {
    fn from(points: Vec<Point>) -> Self {
        Self::from_points(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line() -> Stroke {
        Stroke::from_points(vec![
            Point::new(0.0, 0.0, "#000000", 2.0),
            Point::new(10.0, 5.0, "#000000", 2.0),
            Point::new(20.0, -5.0, "#000000", 2.0),
        ])
    }

    #[test]
    fn test_empty_stroke_is_invalid() {
        assert_eq!(Stroke::new().validate(), Err(StrokeError::Empty));
    }

    #[test]
    fn test_single_point_stroke_is_valid() {
        let stroke = Stroke::from_points(vec![Point::new(1.0, 1.0, "#fff", 4.0)]);
        assert!(stroke.validate().is_ok());
        assert_eq!(stroke.to_path().elements().len(), 1);
    }

    #[test]
    fn test_invalid_points_rejected() {
        let nan = Stroke::from_points(vec![Point::new(f64::NAN, 0.0, "#fff", 1.0)]);
        assert_eq!(nan.validate(), Err(StrokeError::NonFiniteCoordinate));

        let inf_width = Stroke::from_points(vec![Point::new(0.0, 0.0, "#fff", f64::INFINITY)]);
        assert_eq!(inf_width.validate(), Err(StrokeError::NonFiniteWidth));
    }

    #[test]
    fn test_finite_width_accepted() {
        for width in [0.0, -2.0, 0.5, 400.0] {
            let stroke = Stroke::from_points(vec![Point::new(0.0, 0.0, "#fff", width)]);
            assert!(stroke.validate().is_ok(), "width {width} rejected");
        }
    }

    #[test]
    fn test_path_connects_points_in_order() {
        let path = line().to_path();
        // move_to + two line_to
        assert_eq!(path.elements().len(), 3);
    }

    #[test]
    fn test_bounds() {
        let bounds = line().bounds().unwrap();
        assert_eq!(bounds, Rect::new(0.0, -5.0, 20.0, 5.0));
        assert!(Stroke::new().bounds().is_none());
    }

    #[test]
    fn test_wire_format() {
        let stroke = Stroke::from_points(vec![
            Point::new(1.0, 2.0, "#FF0000", 3.0).with_tool(Tool::Eraser),
        ]);
        let json = serde_json::to_value(&stroke).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{ "x": 1.0, "y": 2.0, "color": "#FF0000", "width": 3.0, "tool": "eraser" }])
        );
    }

    #[test]
    fn test_tool_defaults_to_brush() {
        let point: Point =
            serde_json::from_str(r##"{"x":1,"y":2,"color":"#000","width":5}"##).unwrap();
        assert_eq!(point.tool, Tool::Brush);
    }
}
