//! Import/export options and the supported wire dialects.

use crate::error::{CyberiadaError, Result};
use crate::geometry::{CoordFormat, EdgePlacement, GeometryFormats};

/// The two supported GraphML dialects.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dialect {
    /// The native Cyberiada-GraphML 1.0 schema.
    Cyberiada10,
    /// The legacy yEd-based editor schema (Berloga / Ostranna).
    LegacyYed,
}

/// What to do with duplicate entry/exit actions found on one node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DoubleActionPolicy {
    /// Report a format error.
    #[default]
    Reject,
    /// Merge the duplicates, concatenating behaviors with a newline.
    Merge,
}

/// Whether legacy input uses the flattened single-line layout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FlattenHint {
    /// Scan the raw bytes: a file without any pair of adjacent
    /// whitespace characters is considered flat.
    #[default]
    Auto,
    Flattened,
    Regular,
}

impl FlattenHint {
    /// Resolve the hint against the raw input bytes.
    pub fn resolve(self, input: &[u8]) -> bool {
        match self {
            FlattenHint::Flattened => true,
            FlattenHint::Regular => false,
            FlattenHint::Auto => !input
                .windows(2)
                .any(|pair| pair[0].is_ascii_whitespace() && pair[1].is_ascii_whitespace()),
        }
    }
}

/// Options accepted by the decoder.
#[derive(Clone, Debug, Default)]
pub struct ReadOptions {
    /// Target convention for node coordinates; defaults to center-local.
    pub node_coord: Option<CoordFormat>,
    /// Target convention for edge endpoint coordinates; defaults to
    /// center-local.
    pub edge_coord: Option<CoordFormat>,
    /// Target convention for edge polyline coordinates; defaults to
    /// center-local.
    pub edge_polyline_coord: Option<CoordFormat>,
    /// Edge endpoint placement; defaults to border.
    pub edge_placement: Option<EdgePlacement>,
    /// Invent geometry for nodes and edges that carry none.
    pub reconstruct_geometry: bool,
    /// Also recompute the state-machine bounding rectangles.
    pub reconstruct_sm_geometry: bool,
    /// Drop all geometry while importing.
    pub skip_geometry: bool,
    /// Flattened-input hint for the legacy dialect.
    pub flatten: FlattenHint,
    /// Require exactly one initial pseudostate on the top level.
    pub check_initial: bool,
    /// Duplicate entry/exit handling.
    pub double_actions: DoubleActionPolicy,
}

impl ReadOptions {
    /// Reject the illegal flag combinations.
    pub fn validate(&self) -> Result<()> {
        if self.skip_geometry
            && (self.node_coord.is_some()
                || self.edge_coord.is_some()
                || self.edge_polyline_coord.is_some()
                || self.edge_placement.is_some()
                || self.reconstruct_geometry
                || self.reconstruct_sm_geometry)
        {
            return Err(CyberiadaError::bad_parameter(
                "skip-geometry is not compatible with other geometry options",
            ));
        }
        Ok(())
    }

    /// The conventions the imported document should end up in.
    pub fn target_formats(&self) -> GeometryFormats {
        GeometryFormats {
            node_coord: self.node_coord.unwrap_or(CoordFormat::CenterLocal),
            edge_coord: self.edge_coord.unwrap_or(CoordFormat::CenterLocal),
            edge_polyline_coord: self
                .edge_polyline_coord
                .unwrap_or(CoordFormat::CenterLocal),
            edge_placement: self.edge_placement.unwrap_or(EdgePlacement::Border),
        }
    }
}

/// Options accepted by the encoder.
#[derive(Clone, Debug, Default)]
pub struct WriteOptions {
    /// Drop all geometry while exporting. Not available for the legacy
    /// dialect, which always writes geometry elements.
    pub skip_geometry: bool,
    /// Round exported coordinates to integers.
    pub round_geometry: bool,
    /// Require exactly one initial pseudostate on the top level.
    pub check_initial: bool,
}

impl WriteOptions {
    pub fn validate(&self, dialect: Dialect) -> Result<()> {
        if self.skip_geometry {
            if dialect == Dialect::LegacyYed {
                return Err(CyberiadaError::bad_parameter(
                    "skip-geometry is not available for the legacy dialect",
                ));
            }
            if self.round_geometry || self.check_initial {
                return Err(CyberiadaError::bad_parameter(
                    "skip-geometry is not compatible with other export options",
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flatten_detection_scans_for_whitespace_pairs() {
        assert!(FlattenHint::Auto.resolve(b"<a><b>x y</b></a>"));
        assert!(!FlattenHint::Auto.resolve(b"<a>\n  <b/>\n</a>"));
        assert!(FlattenHint::Flattened.resolve(b"anything\n\n"));
        assert!(!FlattenHint::Regular.resolve(b"compact"));
    }

    #[test]
    fn skip_geometry_excludes_other_geometry_options() {
        let opts = ReadOptions {
            skip_geometry: true,
            reconstruct_geometry: true,
            ..ReadOptions::default()
        };
        assert!(opts.validate().is_err());

        let opts = ReadOptions {
            skip_geometry: true,
            check_initial: true,
            ..ReadOptions::default()
        };
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn legacy_export_cannot_skip_geometry() {
        let opts = WriteOptions {
            skip_geometry: true,
            ..WriteOptions::default()
        };
        assert!(opts.validate(Dialect::LegacyYed).is_err());
        assert!(opts.validate(Dialect::Cyberiada10).is_ok());
    }

    #[test]
    fn default_import_targets() {
        let formats = ReadOptions::default().target_formats();
        assert_eq!(formats.node_coord, CoordFormat::CenterLocal);
        assert_eq!(formats.edge_placement, EdgePlacement::Border);
    }
}
