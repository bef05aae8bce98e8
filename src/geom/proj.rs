use anyhow::{anyhow, Context, Result};
use geo::{Coord, MapCoords, MultiPolygon, Rect};
use proj4rs::{proj::Proj as Proj4, transform::transform};

/// Lambert azimuthal equal-area projection centred on a dataset.
///
/// Areas of projected shapes are in m² and comparable across the whole extent,
/// which the overlap weights depend on.
pub(crate) struct EqualAreaProjection {
    from: Proj4,
    to: Proj4,
}

impl EqualAreaProjection {
    /// Build PROJ.4 string for the source geographic CRS (degrees → radians handled in code).
    #[inline]
    fn source_geog_proj4(epsg: u32) -> &'static str {
        match epsg {
            4269 | 4937 => "+proj=longlat +datum=NAD83 +no_defs +type=crs",
            _            => "+proj=longlat +datum=WGS84 +no_defs +type=crs",
        }
    }

    /// Build PROJ.4 string for a LAEA CRS centred on `center`, keeping the source datum
    /// so no datum shift is applied.
    #[inline]
    fn laea_proj4(epsg: u32, center: Coord<f64>) -> String {
        let datum = if matches!(epsg, 4269 | 4937) { "NAD83" } else { "WGS84" };
        format!(
            "+proj=laea +lat_0={:.6} +lon_0={:.6} +x_0=0 +y_0=0 +datum={datum} +units=m +no_defs +type=crs",
            center.y, center.x,
        )
    }

    /// Projection for lon/lat data in `epsg`, centred on `bounds`.
    pub(crate) fn centered_on(bounds: Rect<f64>, epsg: u32) -> Result<Self> {
        let from = {
            let proj_string = Self::source_geog_proj4(epsg);
            Proj4::from_proj_string(proj_string)
                .with_context(|| anyhow!("failed to build source PROJ.4: {proj_string}"))?
        };

        let to = {
            let proj_string = Self::laea_proj4(epsg, bounds.center());
            Proj4::from_proj_string(&proj_string)
                .with_context(|| anyhow!("failed to build target PROJ.4: {proj_string}"))?
        };

        Ok(Self { from, to })
    }

    /// Reproject one shape from lon/lat degrees to projected meters.
    pub(crate) fn project(&self, shape: &MultiPolygon<f64>) -> Result<MultiPolygon<f64>> {
        shape.try_map_coords(|coord: Coord<f64>| {
            let mut point = (coord.x.to_radians(), coord.y.to_radians(), 0.0);
            transform(&self.from, &self.to, &mut point)?;
            Ok(Coord { x: point.0, y: point.1 })
        })
        .map_err(|e: proj4rs::errors::Error| anyhow!("CRS transform failed: {e}"))
    }
}
