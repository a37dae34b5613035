use gdal::spatial_ref::{AxisMappingStrategy, CoordTransform, SpatialRef};

use crate::error::{Error, Result};
use crate::model::Point;

pub const WGS84: u32 = 4326;

/// Transforms `point` from `source_epsg` to `target_epsg`.
///
/// Both sides use traditional GIS axis order, so `x` is always easting or
/// longitude and `y` northing or latitude, whatever the EPSG definition says.
pub fn reproject(point: Point, source_epsg: u32, target_epsg: u32) -> Result<Point> {
    if source_epsg == target_epsg {
        return Ok(point);
    }

    let fail = |reason: String| Error::Reproject {
        source_epsg,
        target_epsg,
        reason,
    };

    let source = spatial_ref(source_epsg).map_err(|e| fail(e.to_string()))?;
    let target = spatial_ref(target_epsg).map_err(|e| fail(e.to_string()))?;
    let transform = CoordTransform::new(&source, &target).map_err(|e| fail(e.to_string()))?;

    let mut xs = [point.x];
    let mut ys = [point.y];
    transform
        .transform_coords(&mut xs, &mut ys, &mut [])
        .map_err(|e| fail(e.to_string()))?;

    if !xs[0].is_finite() || !ys[0].is_finite() {
        return Err(fail(format!("{point} is outside the valid area")));
    }

    Ok(Point::new(xs[0], ys[0]))
}

fn spatial_ref(epsg: u32) -> gdal::errors::Result<SpatialRef> {
    let mut srs = SpatialRef::from_epsg(epsg)?;
    srs.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);
    Ok(srs)
}
