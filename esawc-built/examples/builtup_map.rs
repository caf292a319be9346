use anyhow::Result;
use esawc_built::collect::ee::EeSession;
use esawc_built::{BuiltupExtractor, Region};
use geo::polygon;

/// Example: built-up area and map tiles for one region
fn main() -> Result<()> {
    env_logger::init();
    println!("=== Example: ESA WorldCover built-up area ===\n");

    let session = EeSession::initialize()?;
    println!("Earth Engine project: {}", session.project());

    // La Rochelle, France (WGS84)
    let region = Region::Polygon(polygon![
        (x: -1.152704, y: 46.181627),
        (x: -1.139893, y: 46.181627),
        (x: -1.139893, y: 46.18699),
        (x: -1.152704, y: 46.18699),
    ]);

    let extractor = BuiltupExtractor::default();
    match extractor.get_builtup(&session, &region) {
        Ok(area) => println!("Built-up area: {:.0} m²", area),
        Err(e) if e.is_data_unavailable() => println!("No WorldCover data for this region"),
        Err(e) => return Err(e.into()),
    }

    let tiles = extractor.plot_builtup(&session, &region)?;
    println!("\nTiles: {}", tiles.tile_url);
    println!(
        "Center: {:.5}, {:.5} (zoom {})",
        tiles.center.y(),
        tiles.center.x(),
        tiles.zoom
    );

    Ok(())
}
