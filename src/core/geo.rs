use crate::core::bounds::Rect;
use crate::{MapError, Result};
use serde::{Deserialize, Serialize};

/// Represents a geographical coordinate with latitude and longitude
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    /// Creates a new LatLng coordinate
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Validates that the coordinates are within valid ranges
    pub fn is_valid(&self) -> bool {
        self.lat >= -90.0 && self.lat <= 90.0 && self.lng >= -180.0 && self.lng <= 180.0
    }
}

impl Default for LatLng {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Represents a point in screen or pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl Default for Point {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// An immutable rectangular area bound by GPS coordinates, with a linear
/// mapping of those coordinates onto an arbitrary pixel-space rectangle.
///
/// Rectangles are always specified top-left to bottom-right: the north
/// latitude is the start edge and must not be below the south latitude, and
/// the east longitude must not be left of the west longitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoRect {
    north_west: LatLng,
    south_east: LatLng,
    width: f64,
    height: f64,
}

impl GeoRect {
    /// Creates a new geographic rectangle from its four bounding edges.
    ///
    /// Fails with [`MapError::Validation`] when a latitude or longitude is
    /// outside its domain, or when the edges are inverted.
    pub fn new(north: f64, west: f64, south: f64, east: f64) -> Result<Self> {
        if !(-90.0..=90.0).contains(&north) || !(-90.0..=90.0).contains(&south) {
            return Err(MapError::Validation(
                "latitudes must be between -90.0 and 90.0 (inclusive)".into(),
            ));
        }
        if !(-180.0..=180.0).contains(&west) || !(-180.0..=180.0).contains(&east) {
            return Err(MapError::Validation(
                "longitudes must be between -180.0 and 180.0 (inclusive)".into(),
            ));
        }
        if east < west {
            return Err(MapError::Validation(
                "east longitude must not be left of west longitude".into(),
            ));
        }
        if north < south {
            return Err(MapError::Validation(
                "north latitude must not be below south latitude".into(),
            ));
        }

        Ok(Self {
            north_west: LatLng::new(north, west),
            south_east: LatLng::new(south, east),
            width: east - west,
            height: north - south,
        })
    }

    pub fn north(&self) -> f64 {
        self.north_west.lat
    }

    pub fn west(&self) -> f64 {
        self.north_west.lng
    }

    pub fn south(&self) -> f64 {
        self.south_east.lat
    }

    pub fn east(&self) -> f64 {
        self.south_east.lng
    }

    /// Width in degrees of longitude
    pub fn width(&self) -> f64 {
        self.width
    }

    /// Height in degrees of latitude
    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn center(&self) -> LatLng {
        LatLng::new(
            self.north_west.lat - self.height / 2.0,
            self.north_west.lng + self.width / 2.0,
        )
    }

    /// Checks if a coordinate is contained by this rectangle (closed bounds).
    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        lat <= self.north_west.lat
            && lat >= self.south_east.lat
            && lng >= self.north_west.lng
            && lng <= self.south_east.lng
    }

    pub fn contains_point(&self, point: &LatLng) -> bool {
        self.contains(point.lat, point.lng)
    }

    /// Checks if this rectangle overlaps another geographic rectangle.
    pub fn intersects(&self, other: &GeoRect) -> bool {
        !(other.east() < self.west()
            || other.west() > self.east()
            || other.north() < self.south()
            || other.south() > self.north())
    }

    /// Linearly maps a geographic position into a destination pixel
    /// rectangle. The north-west corner maps onto the rectangle's top-left
    /// corner and the south-east corner onto its bottom-right. Pure function;
    /// positions outside the bounds extrapolate.
    pub fn to_pixel(&self, target: &Rect, lat: f64, lng: f64) -> Point {
        Point::new(
            target.x + ((lng - self.north_west.lng) / self.width) * target.w,
            target.y + ((self.north_west.lat - lat) / self.height) * target.h,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adelaide_rect() -> GeoRect {
        GeoRect::new(-34.88, 138.5, -34.92, 138.7).unwrap()
    }

    #[test]
    fn test_valid_construction() {
        let rect = adelaide_rect();
        assert!((rect.width() - 0.2).abs() < 1e-9);
        assert!((rect.height() - 0.04).abs() < 1e-9);
        let center = rect.center();
        assert!((center.lat - -34.9).abs() < 1e-9);
        assert!((center.lng - 138.6).abs() < 1e-9);
    }

    #[test]
    fn test_out_of_domain_fails() {
        assert!(matches!(
            GeoRect::new(91.0, 0.0, 0.0, 1.0),
            Err(MapError::Validation(_))
        ));
        assert!(matches!(
            GeoRect::new(1.0, -181.0, 0.0, 1.0),
            Err(MapError::Validation(_))
        ));
        assert!(matches!(
            GeoRect::new(1.0, 0.0, -91.0, 1.0),
            Err(MapError::Validation(_))
        ));
        assert!(matches!(
            GeoRect::new(1.0, 0.0, 0.0, 180.5),
            Err(MapError::Validation(_))
        ));
    }

    #[test]
    fn test_inverted_edges_fail() {
        // east < west
        assert!(GeoRect::new(1.0, 10.0, 0.0, 5.0).is_err());
        // north < south
        assert!(GeoRect::new(0.0, 0.0, 1.0, 1.0).is_err());
    }

    #[test]
    fn test_degenerate_edges_allowed() {
        assert!(GeoRect::new(1.0, 5.0, 1.0, 5.0).is_ok());
    }

    #[test]
    fn test_contains_corners_and_center() {
        let rect = adelaide_rect();
        assert!(rect.contains(rect.north(), rect.west()));
        assert!(rect.contains(rect.north(), rect.east()));
        assert!(rect.contains(rect.south(), rect.west()));
        assert!(rect.contains(rect.south(), rect.east()));
        assert!(rect.contains_point(&rect.center()));

        assert!(!rect.contains(rect.north() + 0.001, 138.6));
        assert!(!rect.contains(rect.south() - 0.001, 138.6));
        assert!(!rect.contains(-34.9, rect.west() - 0.001));
        assert!(!rect.contains(-34.9, rect.east() + 0.001));
    }

    #[test]
    fn test_to_pixel_is_affine() {
        let rect = adelaide_rect();
        let target = Rect::new(40.0, 60.0, 200.0, 100.0);

        let top_left = rect.to_pixel(&target, rect.north(), rect.west());
        assert!((top_left.x - 40.0).abs() < 1e-9);
        assert!((top_left.y - 60.0).abs() < 1e-9);

        let bottom_right = rect.to_pixel(&target, rect.south(), rect.east());
        assert!((bottom_right.x - 240.0).abs() < 1e-9);
        assert!((bottom_right.y - 160.0).abs() < 1e-9);

        let center = rect.center();
        let mid = rect.to_pixel(&target, center.lat, center.lng);
        assert!((mid.x - 140.0).abs() < 1e-9);
        assert!((mid.y - 110.0).abs() < 1e-9);
    }

    #[test]
    fn test_intersects() {
        let a = GeoRect::new(1.0, 0.0, 0.0, 1.0).unwrap();
        let b = GeoRect::new(1.5, 0.5, 0.5, 1.5).unwrap();
        let c = GeoRect::new(5.0, 4.0, 4.0, 5.0).unwrap();
        assert!(a.intersects(&b));
        assert!(b.intersects(&a));
        assert!(!a.intersects(&c));
    }
}
