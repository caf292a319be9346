use geo::Point;
use log::info;

use crate::collect::ee::expression::Expression;
use crate::collect::ee::{ComputeBackend, MapRequest, VisRange, VisualizationOptions};
use crate::collect::global_variables::MAP_ZOOM;
use crate::error::{BuiltupError, Result};
use crate::geometric::builtup::BuiltupExtractor;
use crate::geometric::region::Region;

/// Map tiles showing built-up pixels (black) over a region
#[derive(Debug, Clone, PartialEq)]
pub struct MapTiles {
    /// XYZ template with `{z}`, `{x}`, `{y}` placeholders
    pub tile_url: String,
    /// Region centroid (lon, lat)
    pub center: Point<f64>,
    pub zoom: u8,
}

/// Visualization: band Map, 0..1, white to black
pub fn builtup_visualization() -> VisualizationOptions {
    VisualizationOptions {
        ranges: vec![VisRange { min: 0.0, max: 1.0 }],
        palette_colors: vec!["FFFFFF".to_string(), "000000".to_string()],
    }
}

impl BuiltupExtractor {
    /// Register the built-up raster of a region as a map and return its tiles
    pub fn plot_builtup<B: ComputeBackend + ?Sized>(
        &self,
        backend: &B,
        region: &Region,
    ) -> Result<MapTiles> {
        let center = region
            .centroid()
            .ok_or_else(|| BuiltupError::DataUnavailable("region has no centroid".to_string()))?;

        let request = MapRequest {
            expression: Expression::new(self.builtup_raster(region)?),
            file_format: "AUTO_JPEG_PNG".to_string(),
            band_ids: vec![self.band.clone()],
            visualization_options: builtup_visualization(),
        };

        let map_name = backend.create_map(&request)?;
        info!("Built-up map registered: {}", map_name);

        Ok(MapTiles {
            tile_url: backend.tile_url(&map_name),
            center,
            zoom: MAP_ZOOM,
        })
    }
}
