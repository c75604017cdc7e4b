//! Geometry primitives, coordinate conventions and the conversion seam.
//!
//! The library stores geometry verbatim and never does coordinate
//! mathematics itself. The three coordinate conventions a document may be
//! tagged with are described by [`CoordFormat`]; actually re-expressing
//! stored coordinates in another convention (or inventing missing
//! geometry) is delegated to a [`GeometryConverter`] implementation
//! supplied by the caller.

use crate::error::{CyberiadaError, Result};
use crate::model::Document;

/// A 2D point.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned rectangle.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// A rect with zero width and zero height stands for "no geometry".
    pub fn is_empty(&self) -> bool {
        self.width == 0.0 && self.height == 0.0
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// An ordered sequence of points describing an edge's route.
pub type Polyline = Vec<Point>;

/// Geometry attached to a node: a point for the point-like pseudostates
/// (initial, final, terminate), a rectangle for everything else.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum NodeGeometry {
    Point(Point),
    Rect(Rect),
}

/// Geometry of an edge label: a point or a bounding rectangle, never both.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LabelGeometry {
    Point(Point),
    Rect(Rect),
}

/// Origin and parent-relativity of stored coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CoordFormat {
    /// Plain document coordinates, left-to-right / top-to-bottom.
    Absolute,
    /// Relative to the top-left corner of the parent node.
    LeftTopLocal,
    /// Relative to the center of the parent node.
    #[default]
    CenterLocal,
}

/// Where edge source/target points anchor on their nodes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EdgePlacement {
    /// Relative to the node center.
    #[default]
    Center,
    /// Relative to the node border (top-left oriented).
    Border,
}

/// The four per-document geometry format descriptors.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GeometryFormats {
    /// Node coordinates convention.
    pub node_coord: CoordFormat,
    /// Edge source/target point convention.
    pub edge_coord: CoordFormat,
    /// Edge polyline point convention.
    pub edge_polyline_coord: CoordFormat,
    /// Edge endpoint placement.
    pub edge_placement: EdgePlacement,
}

impl GeometryFormats {
    /// Conventions the native dialect is written in.
    pub fn native_export() -> Self {
        Self {
            node_coord: CoordFormat::LeftTopLocal,
            edge_coord: CoordFormat::LeftTopLocal,
            edge_polyline_coord: CoordFormat::LeftTopLocal,
            edge_placement: EdgePlacement::Border,
        }
    }

    /// Conventions the legacy yEd dialect is written in.
    pub fn legacy_export() -> Self {
        Self {
            node_coord: CoordFormat::Absolute,
            edge_coord: CoordFormat::CenterLocal,
            edge_polyline_coord: CoordFormat::Absolute,
            edge_placement: EdgePlacement::Center,
        }
    }
}

/// External coordinate-conversion collaborator.
///
/// The decoder calls [`convert`](Self::convert) after reconstruction when
/// the document carries geometry, and [`reconstruct`](Self::reconstruct)
/// when the caller requested geometry reconstruction. The encoder calls
/// [`convert`](Self::convert) on a deep copy of the document with the
/// conventions of the target dialect. Implementations must update the
/// document's [`GeometryFormats`] descriptors to the target values.
pub trait GeometryConverter {
    /// Re-express every stored coordinate in the target conventions.
    fn convert(&self, doc: &mut Document, target: GeometryFormats) -> Result<()>;

    /// Invent geometry for nodes and edges that have none; when
    /// `reconstruct_sm` is set, the state-machine bounding rectangles are
    /// recomputed as well.
    fn reconstruct(&self, doc: &mut Document, reconstruct_sm: bool) -> Result<()>;
}

/// A converter that only retags the document formats without touching
/// coordinates. Suitable for geometry-agnostic callers and round-trip
/// tests where both sides use the same conventions.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullGeometry;

impl GeometryConverter for NullGeometry {
    fn convert(&self, doc: &mut Document, target: GeometryFormats) -> Result<()> {
        doc.formats = target;
        Ok(())
    }

    fn reconstruct(&self, _doc: &mut Document, _reconstruct_sm: bool) -> Result<()> {
        Err(CyberiadaError::NotImplemented(
            "geometry reconstruction requires a real geometry converter".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_rect_is_empty() {
        assert!(Rect::new(10.0, 20.0, 0.0, 0.0).is_empty());
        assert!(!Rect::new(0.0, 0.0, 5.0, 0.0).is_empty());
    }

    #[test]
    fn rect_center() {
        let c = Rect::new(10.0, 20.0, 40.0, 60.0).center();
        assert_eq!(c, Point::new(30.0, 50.0));
    }

    #[test]
    fn null_converter_retags_only() {
        let mut doc = Document::new();
        NullGeometry
            .convert(&mut doc, GeometryFormats::native_export())
            .unwrap();
        assert_eq!(doc.formats, GeometryFormats::native_export());
        assert!(NullGeometry.reconstruct(&mut doc, false).is_err());
    }
}
