use std::path::PathBuf;

/// Input vector dataset (any CRS, reprojected to EPSG:4326 on load)
pub const INPUT_PATH: &str = "./input/metropoli.shp";

/// Output GeoJSON written after a successful run
pub const OUTPUT_PATH: &str = "./output/output.geojson";

/// Name of the column holding built-up area in m²
pub const BUILTUP_COLUMN: &str = "esa_builtup";

/// A progress line is printed every PROGRESS_EVERY regions
pub const PROGRESS_EVERY: usize = 25;

/// Geographic CRS every region is reprojected to before querying
pub const TARGET_EPSG: i32 = 4326;

/// ESA WorldCover 10 m land-cover collection
pub const WORLDCOVER_DATASET: &str = "ESA/WorldCover/v100";

/// Classification band of WorldCover images
pub const WORLDCOVER_BAND: &str = "Map";

/// WorldCover class code for built-up surfaces
pub const BUILTUP_CLASS: u8 = 50;

/// Nominal scale of the reduction, in meters
pub const PIXEL_SCALE_M: f64 = 10.0;

/// Area of one 10 m x 10 m pixel, in m²
pub const PIXEL_AREA_M2: f64 = 100.0;

/// Pixel ceiling for reduceRegion so large regions are not truncated
pub const MAX_PIXELS: f64 = 1e12;

/// Zoom level used for built-up map previews
pub const MAP_ZOOM: u8 = 10;

pub fn get_input_path() -> PathBuf {
    PathBuf::from(INPUT_PATH)
}

pub fn get_output_path() -> PathBuf {
    PathBuf::from(OUTPUT_PATH)
}
