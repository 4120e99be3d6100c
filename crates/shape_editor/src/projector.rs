use std::f64::consts::PI;

use model::{GeoPoint, PixelPoint};

/// Converts between geographic coordinates and the host map's pixel space.
///
/// Implementations are only valid for the viewport they were taken from; the
/// editor never caches projected coordinates across calls.
pub trait CoordinateProjector {
    fn project_to_pixel(&self, point: GeoPoint) -> PixelPoint;
    fn unproject_from_pixel(&self, pixel: PixelPoint) -> GeoPoint;
}

impl<P> CoordinateProjector for &P
where
    P: CoordinateProjector + ?Sized,
{
    fn project_to_pixel(&self, point: GeoPoint) -> PixelPoint {
        (**self).project_to_pixel(point)
    }

    fn unproject_from_pixel(&self, pixel: PixelPoint) -> GeoPoint {
        (**self).unproject_from_pixel(pixel)
    }
}

/// Latitude limit of the square Web Mercator world.
pub const MAX_MERCATOR_LATITUDE: f64 = 85.051_128_779_806_59;

pub const TILE_SIZE: f64 = 256.0;

/// A slippy-map viewport in spherical Web Mercator (EPSG:3857), as used by
/// common tile based map hosts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WebMercatorViewport {
    zoom: f64,
    /// World pixel coordinate of the viewport's top left corner.
    origin: PixelPoint,
}

impl WebMercatorViewport {
    pub fn new(zoom: f64, origin: PixelPoint) -> Self {
        Self { zoom, origin }
    }

    /// A viewport of `width` x `height` pixels centered on `center`.
    pub fn centered(center: GeoPoint, zoom: f64, width: f64, height: f64) -> Self {
        let world = project_world(center, world_size(zoom));
        Self::new(zoom, world - PixelPoint::new(width / 2.0, height / 2.0))
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn origin(&self) -> PixelPoint {
        self.origin
    }
}

impl CoordinateProjector for WebMercatorViewport {
    fn project_to_pixel(&self, point: GeoPoint) -> PixelPoint {
        project_world(point, world_size(self.zoom)) - self.origin
    }

    fn unproject_from_pixel(&self, pixel: PixelPoint) -> GeoPoint {
        let size = world_size(self.zoom);
        let world = pixel + self.origin;
        let longitude = world.x / size * 360.0 - 180.0;
        let latitude = (PI * (1.0 - 2.0 * world.y / size))
            .sinh()
            .atan()
            .to_degrees();
        GeoPoint::new(latitude, longitude)
    }
}

fn world_size(zoom: f64) -> f64 {
    TILE_SIZE * 2f64.powf(zoom)
}

fn project_world(point: GeoPoint, size: f64) -> PixelPoint {
    let latitude = point
        .latitude
        .clamp(-MAX_MERCATOR_LATITUDE, MAX_MERCATOR_LATITUDE)
        .to_radians();
    let x = (point.longitude + 180.0) / 360.0 * size;
    let y = (1.0 - (latitude.tan() + 1.0 / latitude.cos()).ln() / PI) / 2.0 * size;
    PixelPoint::new(x, y)
}
