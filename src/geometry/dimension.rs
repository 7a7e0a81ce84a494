use std::fmt::Display;

use crate::error::{Result, SpatialDbError};

/// The coordinate dimensionality of a geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dimension {
    /// Two-dimensional.
    #[default]
    XY,

    /// Three-dimensional.
    XYZ,

    /// XYM (2D with measure).
    XYM,

    /// XYZM (3D with measure).
    XYZM,
}

impl Dimension {
    /// Build a dimension from the presence of the Z and M axes.
    pub fn from_flags(has_z: bool, has_m: bool) -> Self {
        match (has_z, has_m) {
            (false, false) => Dimension::XY,
            (true, false) => Dimension::XYZ,
            (false, true) => Dimension::XYM,
            (true, true) => Dimension::XYZM,
        }
    }

    /// Dimension of a tuple with `size` ordinates when no explicit Z/M marker is given.
    ///
    /// Three ordinates are read as XYZ.
    pub fn from_size(size: usize) -> Result<Self> {
        match size {
            2 => Ok(Dimension::XY),
            3 => Ok(Dimension::XYZ),
            4 => Ok(Dimension::XYZM),
            _ => Err(SpatialDbError::Domain(format!(
                "Invalid number of coordinates: {size}"
            ))),
        }
    }

    /// Returns the number of ordinates in one coordinate tuple.
    pub fn size(&self) -> usize {
        match self {
            Dimension::XY => 2,
            Dimension::XYZ => 3,
            Dimension::XYM => 3,
            Dimension::XYZM => 4,
        }
    }

    pub fn has_z(&self) -> bool {
        matches!(self, Dimension::XYZ | Dimension::XYZM)
    }

    pub fn has_m(&self) -> bool {
        matches!(self, Dimension::XYM | Dimension::XYZM)
    }

    /// Index of the M ordinate inside a tuple, if any.
    pub fn m_index(&self) -> Option<usize> {
        match self {
            Dimension::XYM => Some(2),
            Dimension::XYZM => Some(3),
            _ => None,
        }
    }

    /// The WKT dimension suffix (`""`, `"Z"`, `"M"`, `"ZM"`).
    pub fn wkt_suffix(&self) -> &'static str {
        match self {
            Dimension::XY => "",
            Dimension::XYZ => "Z",
            Dimension::XYM => "M",
            Dimension::XYZM => "ZM",
        }
    }
}

/// Coordinate dimension of a coordinate kind: 2, 3 or 4.
pub fn coord_dimension(dim: Dimension) -> usize {
    dim.size()
}

impl Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dimension::XY => write!(f, "XY"),
            Dimension::XYZ => write!(f, "XYZ"),
            Dimension::XYM => write!(f, "XYM"),
            Dimension::XYZM => write!(f, "XYZM"),
        }
    }
}
