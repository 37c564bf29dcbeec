//! Geographic primitives: points, axis-aligned rectangles, bbox parsing.

use crate::config::Limits;
use crate::error::{MapError, Result};

/// Number of decimal digits kept for storage coordinates.
pub const COORD_PRECISION: u32 = 7;

fn round_coord(value: f64) -> f64 {
    let scale = 10f64.powi(COORD_PRECISION as i32);
    (value * scale).round() / scale
}

/// A WGS84 point, rounded to [`COORD_PRECISION`] decimal digits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub lon: f64,
    pub lat: f64,
}

impl Point {
    /// Builds a point, validating coordinate ranges and rounding to
    /// storage precision.
    pub fn new(lon: f64, lat: f64) -> Result<Point> {
        if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
            return Err(MapError::BadBoundingBox(format!(
                "longitude out of range: {lon}"
            )));
        }
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(MapError::BadBoundingBox(format!(
                "latitude out of range: {lat}"
            )));
        }
        Ok(Point {
            lon: round_coord(lon),
            lat: round_coord(lat),
        })
    }
}

/// An axis-aligned rectangle in lon/lat space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl Rect {
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Rect {
        Rect {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }

    /// Degenerate rectangle covering a single point.
    pub fn from_point(p: Point) -> Rect {
        Rect::new(p.lon, p.lat, p.lon, p.lat)
    }

    /// Parses the `minlon,minlat,maxlon,maxlat` query form.
    pub fn parse_bbox(s: &str) -> Result<Rect> {
        let bad = |detail: &str| MapError::BadBoundingBox(format!("{detail}: {s}"));
        let parts: Vec<&str> = s.split(',').collect();
        if parts.len() != 4 {
            return Err(bad("expected four comma-separated values"));
        }
        let mut vals = [0f64; 4];
        for (slot, part) in vals.iter_mut().zip(&parts) {
            *slot = part
                .trim()
                .parse()
                .map_err(|_| bad("invalid coordinate"))?;
        }
        let min = Point::new(vals[0], vals[1])?;
        let max = Point::new(vals[2], vals[3])?;
        if min.lon > max.lon || min.lat > max.lat {
            return Err(bad("minimum corner exceeds maximum corner"));
        }
        Ok(Rect::new(min.lon, min.lat, max.lon, max.lat))
    }

    pub fn width(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    pub fn height(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    /// Area in square degrees.
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn contains(&self, p: Point) -> bool {
        p.lon >= self.min_lon && p.lon <= self.max_lon && p.lat >= self.min_lat && p.lat <= self.max_lat
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.min_lon <= other.max_lon
            && self.max_lon >= other.min_lon
            && self.min_lat <= other.max_lat
            && self.max_lat >= other.min_lat
    }

    pub fn union(&self, other: &Rect) -> Rect {
        Rect::new(
            self.min_lon.min(other.min_lon),
            self.min_lat.min(other.min_lat),
            self.max_lon.max(other.max_lon),
            self.max_lat.max(other.max_lat),
        )
    }

    pub fn expand_to(&mut self, p: Point) {
        self.min_lon = self.min_lon.min(p.lon);
        self.min_lat = self.min_lat.min(p.lat);
        self.max_lon = self.max_lon.max(p.lon);
        self.max_lat = self.max_lat.max(p.lat);
    }

    /// Rectangle grown on each side by `max(floor, ratio * side_len)`.
    pub fn buffered(&self, limits: &Limits) -> Rect {
        let dx = (self.width() * limits.bbox_merge_ratio).max(limits.bbox_merge_distance);
        let dy = (self.height() * limits.bbox_merge_ratio).max(limits.bbox_merge_distance);
        Rect::new(
            self.min_lon - dx,
            self.min_lat - dy,
            self.max_lon + dx,
            self.max_lat + dy,
        )
    }

    /// Chebyshev gap between this rectangle and a point; zero when inside.
    pub fn chebyshev_to(&self, p: Point) -> f64 {
        let dx = (self.min_lon - p.lon).max(p.lon - self.max_lon).max(0.0);
        let dy = (self.min_lat - p.lat).max(p.lat - self.max_lat).max(0.0);
        dx.max(dy)
    }
}
