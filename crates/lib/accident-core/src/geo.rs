//! Great-circle distance and bounding boxes for radius and corridor lookups.

/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0088;
// Derived from the haversine radius so the prefilter never undercuts it.
const KM_PER_DEGREE_LAT: f64 = EARTH_RADIUS_KM * std::f64::consts::PI / 180.0;
// Float slack on the box edges; the haversine predicate trims the surplus.
const BOX_MARGIN: f64 = 1.001;

/// Great-circle distance between two points, in kilometres.
#[must_use]
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lng2 - lng1).to_radians();
    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().min(1.0).asin()
}

/// Axis-aligned latitude/longitude box used as an index prefilter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl BoundingBox {
    /// Smallest box containing every point within `radius_km` of the centre.
    ///
    /// Boxes that would cross a pole or the antimeridian widen to the full
    /// longitude range; the exact distance filter trims the surplus.
    #[must_use]
    pub fn around(lat: f64, lng: f64, radius_km: f64) -> Self {
        let d_lat = radius_km * BOX_MARGIN / KM_PER_DEGREE_LAT;
        let min_lat = (lat - d_lat).max(-90.0);
        let max_lat = (lat + d_lat).min(90.0);

        let widest = lat.abs().max(min_lat.abs()).max(max_lat.abs());
        let cos_lat = widest.to_radians().cos();
        let (min_lng, max_lng) = if cos_lat <= f64::EPSILON {
            (-180.0, 180.0)
        } else {
            let d_lng = radius_km * BOX_MARGIN / (KM_PER_DEGREE_LAT * cos_lat);
            if lng - d_lng < -180.0 || lng + d_lng > 180.0 {
                (-180.0, 180.0)
            } else {
                (lng - d_lng, lng + d_lng)
            }
        };

        Self {
            min_lat,
            max_lat,
            min_lng,
            max_lng,
        }
    }

    /// Box spanning a route segment, padded by `padding_deg` on every side.
    #[must_use]
    pub fn segment(from: (f64, f64), to: (f64, f64), padding_deg: f64) -> Self {
        Self {
            min_lat: (from.0.min(to.0) - padding_deg).max(-90.0),
            max_lat: (from.0.max(to.0) + padding_deg).min(90.0),
            min_lng: (from.1.min(to.1) - padding_deg).max(-180.0),
            max_lng: (from.1.max(to.1) + padding_deg).min(180.0),
        }
    }

    #[must_use]
    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        (self.min_lat..=self.max_lat).contains(&lat) && (self.min_lng..=self.max_lng).contains(&lng)
    }
}
