// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Great-circle helpers on a spherical Earth, used to draw the antenna
//! beam on a map.
//!
//! Everything here is pure; angles go in and out in degrees, distances in
//! kilometres.

use serde::{Deserialize, Serialize};

use crate::rotator::state::normalize_azimuth;

/// Mean Earth radius.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Initial great-circle bearing from `from` to `to`, rounded to a whole
/// degree in `[0, 360)`.
pub fn bearing(from: GeoPoint, to: GeoPoint) -> f64 {
    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();
    let dlon = (to.lon - from.lon).to_radians();

    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();

    normalize_azimuth(normalize_azimuth(y.atan2(x).to_degrees()).round())
}

/// Point reached by travelling `distance_km` from `origin` on the initial
/// bearing `bearing_deg`.
pub fn destination(origin: GeoPoint, bearing_deg: f64, distance_km: f64) -> GeoPoint {
    destination_on_sphere(origin, bearing_deg, distance_km, EARTH_RADIUS_KM)
}

pub fn destination_on_sphere(
    origin: GeoPoint,
    bearing_deg: f64,
    distance_km: f64,
    radius_km: f64,
) -> GeoPoint {
    let lat1 = origin.lat.to_radians();
    let lon1 = origin.lon.to_radians();
    let theta = bearing_deg.to_radians();
    let delta = distance_km / radius_km;

    let lat2 = (lat1.sin() * delta.cos() + lat1.cos() * delta.sin() * theta.cos()).asin();
    let lon2 = lon1
        + (theta.sin() * delta.sin() * lat1.cos()).atan2(delta.cos() - lat1.sin() * lat2.sin());

    GeoPoint {
        lat: lat2.to_degrees(),
        lon: normalize_longitude(lon2.to_degrees()),
    }
}

/// Wrap a longitude into `(-180, 180]`.
pub fn normalize_longitude(lon: f64) -> f64 {
    let wrapped = (lon + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped <= -180.0 {
        wrapped + 360.0
    } else {
        wrapped
    }
}

/// Beam geometry: a cone that starts narrow at the station and widens with
/// distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeamShape {
    pub segments: usize,
    pub max_distance_km: f64,
    pub start_half_width_deg: f64,
    pub end_half_width_deg: f64,
}

impl Default for BeamShape {
    fn default() -> Self {
        Self {
            segments: 50,
            max_distance_km: 18_000.0,
            start_half_width_deg: 1.0,
            end_half_width_deg: 20.0,
        }
    }
}

impl BeamShape {
    /// Distance and half-width at step `i` of `segments`.
    pub fn step(&self, i: usize) -> (f64, f64) {
        let fraction = if self.segments == 0 {
            0.0
        } else {
            i as f64 / self.segments as f64
        };
        let distance = self.max_distance_km * fraction;
        let half_width = self.start_half_width_deg
            + (self.end_half_width_deg - self.start_half_width_deg) * fraction;
        (distance, half_width)
    }
}

/// The three polylines of a beam, each ordered from the station outward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeamPolygon {
    pub left: Vec<GeoPoint>,
    pub right: Vec<GeoPoint>,
    pub center: Vec<GeoPoint>,
}

pub fn beam_polygon(origin: GeoPoint, center_bearing: f64, shape: &BeamShape) -> BeamPolygon {
    let points = shape.segments + 1;
    let mut beam = BeamPolygon {
        left: Vec::with_capacity(points),
        right: Vec::with_capacity(points),
        center: Vec::with_capacity(points),
    };

    for i in 0..=shape.segments {
        let (distance, half_width) = shape.step(i);
        beam.left.push(destination(
            origin,
            normalize_azimuth(center_bearing - half_width),
            distance,
        ));
        beam.right.push(destination(
            origin,
            normalize_azimuth(center_bearing + half_width),
            distance,
        ));
        beam.center.push(destination(origin, center_bearing, distance));
    }
    beam
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMERICK: GeoPoint = GeoPoint::new(52.6667, -8.6333);

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn due_east_on_equator() {
        assert_eq!(bearing(GeoPoint::new(0.0, 0.0), GeoPoint::new(0.0, 90.0)), 90.0);
    }

    #[test]
    fn cardinal_bearings() {
        let origin = GeoPoint::new(0.0, 0.0);
        assert_eq!(bearing(origin, GeoPoint::new(10.0, 0.0)), 0.0);
        assert_eq!(bearing(origin, GeoPoint::new(-10.0, 0.0)), 180.0);
        assert_eq!(bearing(origin, GeoPoint::new(0.0, -10.0)), 270.0);
    }

    #[test]
    fn zero_distance_is_identity() {
        for az in [0.0, 45.0, 180.0, 359.0] {
            let p = destination(LIMERICK, az, 0.0);
            assert!(close(p.lat, LIMERICK.lat), "lat for {az}");
            assert!(close(p.lon, LIMERICK.lon), "lon for {az}");
        }
    }

    #[test]
    fn short_hop_keeps_bearing() {
        for az in [0.0, 10.0, 135.0, 270.0, 359.0, 400.0] {
            let p = destination(LIMERICK, az, 10.0);
            let back = bearing(LIMERICK, p);
            assert_eq!(back, normalize_azimuth(az).round() % 360.0, "az {az}");
        }
    }

    #[test]
    fn longitude_wraps_into_half_open_range() {
        assert_eq!(normalize_longitude(180.0), 180.0);
        assert_eq!(normalize_longitude(-180.0), 180.0);
        assert!(close(normalize_longitude(190.0), -170.0));
        assert!(close(normalize_longitude(-190.0), 170.0));
        assert!(close(normalize_longitude(540.0), 180.0));
    }

    #[test]
    fn crossing_antimeridian_wraps() {
        let p = destination(GeoPoint::new(0.0, 179.0), 90.0, 500.0);
        assert!(p.lon < -170.0 && p.lon > -180.0, "lon {}", p.lon);
    }

    #[test]
    fn beam_starts_at_origin() {
        let beam = beam_polygon(LIMERICK, 90.0, &BeamShape::default());
        assert_eq!(beam.center.len(), 51);
        for line in [&beam.left, &beam.right, &beam.center] {
            assert!(close(line[0].lat, LIMERICK.lat));
            assert!(close(line[0].lon, LIMERICK.lon));
        }
    }

    #[test]
    fn beam_edges_diverge_by_final_half_width() {
        let shape = BeamShape::default();
        let beam = beam_polygon(LIMERICK, 90.0, &shape);
        let (_, half_width) = shape.step(shape.segments);
        assert!(close(half_width, 20.0));

        // Check the edges a short hop out on the final headings.
        let left = destination(LIMERICK, 90.0 - half_width, 50.0);
        let right = destination(LIMERICK, 90.0 + half_width, 50.0);
        assert_eq!(bearing(LIMERICK, left), 70.0);
        assert_eq!(bearing(LIMERICK, right), 110.0);

        let last = shape.segments;
        assert_eq!(
            *beam.left.last().expect("left"),
            destination(LIMERICK, 70.0, 18_000.0)
        );
        assert_eq!(
            *beam.right.last().expect("right"),
            destination(LIMERICK, 110.0, 18_000.0)
        );
        assert_eq!(beam.center[last], destination(LIMERICK, 90.0, 18_000.0));
    }

    #[test]
    fn beam_wraps_through_north() {
        let beam = beam_polygon(LIMERICK, 5.0, &BeamShape::default());
        assert_eq!(
            *beam.left.last().expect("left"),
            destination(LIMERICK, 345.0, 18_000.0)
        );
    }
}
