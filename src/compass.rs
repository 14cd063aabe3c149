//! Azimuth compass geometry.
//!
//! Computes the far end of a pointer line drawn from a map centre along a
//! panel azimuth, and the inverse (azimuth from two picked points). Angles
//! are degrees clockwise from north.

use serde::Serialize;
use std::f64::consts::PI;
use thiserror::Error;

/// Mean Earth radius (IUGG) in metres.
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Default pointer length, long enough to see at roof-level zoom.
pub const DEFAULT_POINTER_LENGTH_M: f64 = 50.0;

#[derive(Debug, Error, PartialEq)]
pub enum CompassError {
    #[error("latitude {0} is outside -90..=90")]
    Latitude(f64),
    #[error("longitude {0} is outside -180..=180")]
    Longitude(f64),
    #[error("{0} must be a finite number")]
    NotFinite(&'static str),
    #[error("pointer length must be positive, got {0}")]
    Length(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub fn new(lat: f64, lon: f64) -> Result<Self, CompassError> {
        if !lat.is_finite() {
            return Err(CompassError::NotFinite("latitude"));
        }
        if !lon.is_finite() {
            return Err(CompassError::NotFinite("longitude"));
        }
        if !(-90.0..=90.0).contains(&lat) {
            return Err(CompassError::Latitude(lat));
        }
        if !(-180.0..=180.0).contains(&lon) {
            return Err(CompassError::Longitude(lon));
        }
        Ok(Self { lat, lon })
    }
}

fn deg2rad(d: f64) -> f64 {
    d * PI / 180.0
}

fn rad2deg(r: f64) -> f64 {
    r * 180.0 / PI
}

/// Normalize an angle to the range [0, 360).
pub fn normalize_azimuth(a: f64) -> f64 {
    let n = ((a % 360.0) + 360.0) % 360.0;
    // -0.0 % 360 and tiny negatives can land exactly on 360.0
    if n >= 360.0 {
        0.0
    } else {
        n
    }
}

/// Normalize a longitude to [-180, 180).
fn normalize_lon(lon: f64) -> f64 {
    ((lon + 540.0) % 360.0) - 180.0
}

/// Point reached by travelling `distance_m` from `center` along `azimuth_deg`.
pub fn pointer_end(
    center: LatLon,
    azimuth_deg: f64,
    distance_m: f64,
) -> Result<LatLon, CompassError> {
    if !azimuth_deg.is_finite() {
        return Err(CompassError::NotFinite("azimuth"));
    }
    if !distance_m.is_finite() || distance_m <= 0.0 {
        return Err(CompassError::Length(distance_m));
    }

    let brg = deg2rad(normalize_azimuth(azimuth_deg));
    let delta = distance_m / EARTH_RADIUS_M;
    let lat1 = deg2rad(center.lat);
    let lon1 = deg2rad(center.lon);

    let lat2 = (lat1.sin() * delta.cos() + lat1.cos() * delta.sin() * brg.cos()).asin();
    let lon2 = lon1
        + (brg.sin() * delta.sin() * lat1.cos()).atan2(delta.cos() - lat1.sin() * lat2.sin());

    Ok(LatLon {
        lat: rad2deg(lat2),
        lon: normalize_lon(rad2deg(lon2)),
    })
}

/// Initial great-circle bearing from `from` to `to`, in [0, 360).
pub fn azimuth_between(from: LatLon, to: LatLon) -> f64 {
    let lat1 = deg2rad(from.lat);
    let lat2 = deg2rad(to.lat);
    let dlon = deg2rad(to.lon - from.lon);

    let x = dlon.sin() * lat2.cos();
    let y = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
    normalize_azimuth(rad2deg(x.atan2(y)))
}

/// Haversine distance in metres.
pub fn distance_m(a: LatLon, b: LatLon) -> f64 {
    let dlat = deg2rad(b.lat - a.lat);
    let dlon = deg2rad(b.lon - a.lon);
    let h = (dlat / 2.0).sin().powi(2)
        + deg2rad(a.lat).cos() * deg2rad(b.lat).cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().atan2((1.0 - h).sqrt())
}

/// GeoJSON feature for the pointer line. Coordinates are `[lon, lat]`.
pub fn pointer_line_geojson(
    center: LatLon,
    end: LatLon,
    azimuth_deg: f64,
) -> serde_json::Value {
    serde_json::json!({
        "type": "Feature",
        "properties": { "azimuth": normalize_azimuth(azimuth_deg) },
        "geometry": {
            "type": "LineString",
            "coordinates": [[center.lon, center.lat], [end.lon, end.lat]],
        },
    })
}
