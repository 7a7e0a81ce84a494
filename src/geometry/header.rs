use crate::geometry::{Dimension, GeometryType};

/// Kind and coordinate layout of one (possibly nested) geometry in a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GeometryHeader {
    pub geom_type: GeometryType,
    pub dimension: Dimension,
    /// Number of ordinates per coordinate tuple: 2 + Z + M.
    pub coord_size: usize,
}

impl GeometryHeader {
    pub fn new(geom_type: GeometryType, dimension: Dimension) -> Self {
        Self {
            geom_type,
            dimension,
            coord_size: dimension.size(),
        }
    }

    /// The same layout for a different kind, used for nested members.
    pub fn with_type(&self, geom_type: GeometryType) -> Self {
        Self::new(geom_type, self.dimension)
    }
}
