//! Great-circle distance for ranking donors by proximity.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

pub const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Haversine distance in kilometres.
pub fn haversine_km(from: Coordinates, to: Coordinates) -> f64 {
    let d_lat = (to.lat - from.lat).to_radians();
    let d_lng = (to.lng - from.lng).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + from.lat.to_radians().cos() * to.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Pairs each item with its distance from `origin` and sorts nearest first.
///
/// Items without a location keep their relative order and go last with
/// `None`. The sort is stable, so equal distances keep input order.
pub fn rank_by_distance<T, F>(items: Vec<T>, origin: Coordinates, location: F) -> Vec<(T, Option<f64>)>
where
    F: Fn(&T) -> Option<Coordinates>,
{
    let mut ranked: Vec<(T, Option<f64>)> = items
        .into_iter()
        .map(|item| {
            let distance = location(&item)
                .map(|at| haversine_km(origin, at))
                .filter(|d| d.is_finite());
            (item, distance)
        })
        .collect();

    ranked.sort_by(|(_, a), (_, b)| match (a, b) {
        (Some(a), Some(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });

    ranked
}
