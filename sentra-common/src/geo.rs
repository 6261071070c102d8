//! Geographic proximity resolution
//!
//! Pure functions: given an origin and a candidate population,
//! return the responders within a radius, ranked by great-circle
//! distance. No I/O; callers supply the population (a raw coordinate
//! read), and distances are computed in-process.

use crate::db::models::{Responder, Role};

/// Mean Earth radius in kilometres
const EARTH_RADIUS_KM: f64 = 6371.0;

/// A point in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub long: f64,
}

/// A responder matched within the search radius
#[derive(Debug, Clone)]
pub struct ResponderDistance {
    pub responder: Responder,
    /// Great-circle distance from the origin, rounded to 2 decimals
    pub distance_km: f64,
}

/// Great-circle distance between two points (haversine)
pub fn haversine_km(a: Coordinates, b: Coordinates) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_long = (b.long - a.long).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_long / 2.0).sin().powi(2);

    // Floating error can push h fractionally past 1 for
    // near-antipodal points; clamp so asin stays defined.
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

/// Parse a responder's stored coordinates
///
/// Coordinates are both-or-neither: a record with only one field set,
/// or with a field that fails numeric parsing, has no usable position.
pub fn coordinates_of(responder: &Responder) -> Option<Coordinates> {
    let lat = responder.lat.as_deref()?.trim().parse::<f64>().ok()?;
    let long = responder.long.as_deref()?.trim().parse::<f64>().ok()?;
    Some(Coordinates { lat, long })
}

/// Find population members of `role` within `radius_km` of `origin`
///
/// Records without usable coordinates are skipped, never an error.
/// The radius boundary is inclusive and the result is sorted
/// ascending by distance. An empty result is a valid outcome; callers
/// decide whether it constitutes a failure.
pub fn find_within(
    origin: Coordinates,
    radius_km: f64,
    role: Role,
    population: &[Responder],
) -> Vec<ResponderDistance> {
    let mut matches: Vec<ResponderDistance> = population
        .iter()
        .filter(|r| r.role == role)
        .filter_map(|r| {
            let coords = coordinates_of(r)?;
            let distance = haversine_km(origin, coords);
            (distance <= radius_km).then(|| ResponderDistance {
                responder: r.clone(),
                distance_km: round2(distance),
            })
        })
        .collect();

    matches.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    matches
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
