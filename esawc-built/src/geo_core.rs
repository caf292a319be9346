use anyhow::{Context, Result};
use geo::{BoundingRect, Coord, Geometry, LineString, MapCoords, Polygon, Rect};
use proj::Proj;

use crate::collect::global_variables::TARGET_EPSG;

/// Base struct for CRS handling
/// Every region is normalized to the target EPSG (4326) before it is queried.
#[derive(Clone, Debug)]
pub struct GeoCore {
    /// Target EPSG code
    pub epsg: i32,
}

impl GeoCore {
    /// Create a new GeoCore with EPSG
    pub fn new(epsg: i32) -> Self {
        GeoCore { epsg }
    }

    /// Target CRS as a PROJ definition string
    pub fn target_crs(&self) -> String {
        format!("EPSG:{}", self.epsg)
    }

    /// Transformer from `source_crs` (AUTH:CODE, PROJ string or WKT) to the target CRS
    /// Axis order is normalized so coordinates are always (x=lon, y=lat).
    pub fn transformer_from(&self, source_crs: &str) -> Result<Proj> {
        Proj::new_known_crs(source_crs, &self.target_crs(), None)
            .context("Failed to create Proj transformation")
    }

    /// Reproject a geometry with a prepared transformer
    pub fn reproject(proj: &Proj, geometry: &Geometry<f64>) -> Result<Geometry<f64>> {
        geometry
            .try_map_coords(|coord| {
                proj.convert((coord.x, coord.y))
                    .map(|(x, y)| Coord { x, y })
            })
            .context("Failed to transform geometry")
    }
}

impl Default for GeoCore {
    fn default() -> Self {
        GeoCore::new(TARGET_EPSG)
    }
}

/// Bounding box structure
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64, // min longitude
    pub min_y: f64, // min latitude
    pub max_x: f64, // max longitude
    pub max_y: f64, // max latitude
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        BoundingBox {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Coordinate extent of a geometry, None when it has no coordinates
    pub fn extent_of<G>(geometry: &G) -> Option<Self>
    where
        G: BoundingRect<f64, Output = Option<Rect<f64>>>,
    {
        geometry.bounding_rect().map(Self::from)
    }

    /// Midpoint of the latitude range
    pub fn mid_lat(&self) -> f64 {
        (self.max_y + self.min_y) / 2.0
    }

    /// Midpoint of the longitude range
    pub fn mid_lon(&self) -> f64 {
        (self.max_x + self.min_x) / 2.0
    }

    /// Envelope sent to Earth Engine to clip the WorldCover image
    ///
    /// Rebuilt from the midpoint and the half-span of each axis. This is the
    /// extent itself, not a padded square: the clip must match the region's
    /// extent.
    pub fn envelope(&self) -> Self {
        let delta_lat = self.max_y - self.min_y;
        let delta_lon = self.max_x - self.min_x;

        let mid_lat = self.mid_lat();
        let mid_lon = self.mid_lon();

        BoundingBox {
            min_x: mid_lon - delta_lon / 2.0,
            min_y: mid_lat - delta_lat / 2.0,
            max_x: mid_lon + delta_lon / 2.0,
            max_y: mid_lat + delta_lat / 2.0,
        }
    }

    /// Corners counter-clockwise, starting at (lon_min, lat_min)
    pub fn vertices(&self) -> [Coord<f64>; 4] {
        [
            Coord {
                x: self.min_x,
                y: self.min_y,
            },
            Coord {
                x: self.max_x,
                y: self.min_y,
            },
            Coord {
                x: self.max_x,
                y: self.max_y,
            },
            Coord {
                x: self.min_x,
                y: self.max_y,
            },
        ]
    }

    /// Closed rectangle polygon (the closing vertex is added by LineString)
    pub fn to_polygon(&self) -> Polygon<f64> {
        let mut ring = LineString::from(self.vertices().to_vec());
        ring.close();
        Polygon::new(ring, vec![])
    }
}

impl From<Rect<f64>> for BoundingBox {
    fn from(rect: Rect<f64>) -> Self {
        BoundingBox::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
    }
}
