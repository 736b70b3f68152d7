//! Area of interest predicates

use crate::error::{Result, SubVolumeError};
use serde::{Deserialize, Serialize};

/// Axis-aligned world extent
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl Extent {
    pub fn new(min_x: f64, max_x: f64, min_y: f64, max_y: f64) -> Self {
        Self {
            min_x,
            max_x,
            min_y,
            max_y,
        }
    }

    /// The four corners, counter-clockwise from (min_x, min_y)
    pub fn corners(&self) -> [(f64, f64); 4] {
        [
            (self.min_x, self.min_y),
            (self.max_x, self.min_y),
            (self.max_x, self.max_y),
            (self.min_x, self.max_y),
        ]
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }
}

/// Spatial (and optionally vertical) predicate limiting a traversal
pub trait AreaOfInterest: Send + Sync {
    /// World bounding box of the area
    fn bounding_extent(&self) -> Extent;

    /// Check if the world position lies inside the area
    fn contains(&self, x: f64, y: f64) -> bool;

    /// Vertical range overriding the volume's own, if any
    fn z_range(&self) -> Option<(f64, f64)>;

    fn has_z_range(&self) -> bool {
        self.z_range().is_some()
    }
}

/// Rectangular area of interest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RectangleAoi {
    extent: Extent,
    z_range: Option<(f64, f64)>,
}

impl RectangleAoi {
    pub fn new(extent: Extent) -> Self {
        Self {
            extent,
            z_range: None,
        }
    }

    /// Restrict the area to a vertical range
    pub fn with_z_range(mut self, z_start: f64, z_end: f64) -> Self {
        self.z_range = Some((z_start, z_end));
        self
    }
}

impl AreaOfInterest for RectangleAoi {
    fn bounding_extent(&self) -> Extent {
        self.extent
    }

    fn contains(&self, x: f64, y: f64) -> bool {
        self.extent.contains(x, y)
    }

    fn z_range(&self) -> Option<(f64, f64)> {
        self.z_range
    }
}

/// Polygonal area of interest (even-odd rule)
///
/// Deserialization goes through [`PolygonAoi::new`], so the vertex checks
/// apply and the stored extent is always recomputed from the vertices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PolygonDocument")]
pub struct PolygonAoi {
    vertices: Vec<(f64, f64)>,
    extent: Extent,
    z_range: Option<(f64, f64)>,
}

impl PolygonAoi {
    /// Create a polygon from at least three vertices; the ring is closed implicitly
    pub fn new(vertices: Vec<(f64, f64)>) -> Result<Self> {
        if vertices.len() < 3 {
            return Err(SubVolumeError::InvalidGeometry(format!(
                "Polygon needs at least 3 vertices, got {}",
                vertices.len()
            )));
        }
        if vertices.iter().any(|(x, y)| !x.is_finite() || !y.is_finite()) {
            return Err(SubVolumeError::InvalidGeometry(
                "Polygon vertices must be finite".to_string(),
            ));
        }

        let extent = vertices.iter().fold(
            Extent::new(f64::INFINITY, f64::NEG_INFINITY, f64::INFINITY, f64::NEG_INFINITY),
            |e, &(x, y)| Extent::new(e.min_x.min(x), e.max_x.max(x), e.min_y.min(y), e.max_y.max(y)),
        );

        Ok(Self {
            vertices,
            extent,
            z_range: None,
        })
    }

    /// Restrict the area to a vertical range
    pub fn with_z_range(mut self, z_start: f64, z_end: f64) -> Self {
        self.z_range = Some((z_start, z_end));
        self
    }

    pub fn vertices(&self) -> &[(f64, f64)] {
        &self.vertices
    }
}

/// Serialized form of a polygon; any stored extent is ignored
#[derive(Deserialize)]
struct PolygonDocument {
    vertices: Vec<(f64, f64)>,
    #[serde(default)]
    z_range: Option<(f64, f64)>,
}

impl TryFrom<PolygonDocument> for PolygonAoi {
    type Error = SubVolumeError;

    fn try_from(document: PolygonDocument) -> Result<Self> {
        let polygon = PolygonAoi::new(document.vertices)?;
        Ok(match document.z_range {
            Some((z_start, z_end)) => polygon.with_z_range(z_start, z_end),
            None => polygon,
        })
    }
}

impl AreaOfInterest for PolygonAoi {
    fn bounding_extent(&self) -> Extent {
        self.extent
    }

    fn contains(&self, x: f64, y: f64) -> bool {
        if !self.extent.contains(x, y) {
            return false;
        }

        // Ray casting towards +x
        let mut inside = false;
        let mut j = self.vertices.len() - 1;
        for (i, &(xi, yi)) in self.vertices.iter().enumerate() {
            let (xj, yj) = self.vertices[j];
            if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
                inside = !inside;
            }
            j = i;
        }
        inside
    }

    fn z_range(&self) -> Option<(f64, f64)> {
        self.z_range
    }
}
