use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::MeetlyError;

/// Mean radius of the Earth, in metres.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Kilometres spanned by one degree of latitude.
pub const KM_PER_DEGREE: f64 = 111.0;

/// Bounding boxes are derived from latitudes inside this range; beyond
/// it the longitude span is unbounded.
pub const MAX_BOX_LATITUDE: f64 = 89.9;

/// A point on the Earth, in degrees.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
}

impl Coordinate {
    /// Creates a coordinate, rejecting values outside
    /// [-90, 90] × [-180, 180] (and NaN).
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, MeetlyError> {
        let coordinate = Coordinate {
            latitude,
            longitude,
        };

        coordinate.validate()?;

        Ok(coordinate)
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Checks the range invariant. Deserialized coordinates bypass
    /// `new`, so every engine entry point calls this again.
    pub fn validate(&self) -> Result<(), MeetlyError> {
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(MeetlyError::invalid(format!(
                "latitude {} is outside [-90, 90]",
                self.latitude
            )));
        }

        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(MeetlyError::invalid(format!(
                "longitude {} is outside [-180, 180]",
                self.longitude
            )));
        }

        Ok(())
    }

    /// Great-circle distance to `other`, in metres.
    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        distance(self, other)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.latitude, self.longitude)
    }
}

/// Haversine distance between two coordinates, in metres.
///
/// ```
/// use meetly::geo::{distance, Coordinate};
///
/// let origin = Coordinate::new(0.0, 0.0).unwrap();
/// assert_eq!(distance(&origin, &origin), 0.0);
///
/// let north = Coordinate::new(0.5, 0.0).unwrap();
/// assert!((distance(&origin, &north) - 55_597.5).abs() < 1.0);
/// ```
pub fn distance(origin: &Coordinate, destination: &Coordinate) -> f64 {
    let delta_latitude = (destination.latitude - origin.latitude).to_radians();
    let delta_longitude = (destination.longitude - origin.longitude).to_radians();

    let origin_latitude = origin.latitude.to_radians();
    let destination_latitude = destination.latitude.to_radians();

    let a = (delta_latitude / 2.0).sin().powi(2)
        + origin_latitude.cos() * destination_latitude.cos() * (delta_longitude / 2.0).sin().powi(2);

    // rounding can push `a` a hair above 1 for antipodal points
    let c = 2.0 * a.min(1.0).sqrt().asin();

    EARTH_RADIUS_M * c
}

/// The longitude extent of a bounding box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LongitudeSpan {
    /// Every longitude; the box reaches a pole.
    All,
    /// An inclusive range whose ends may lie beyond ±180 when the box
    /// crosses the antimeridian.
    Range(f64, f64),
}

/// An inclusive latitude/longitude rectangle around an origin.
///
/// The rectangle over-approximates the circle of the requested radius:
/// every point inside the circle is inside the box, but the corners
/// reach up to `radius · √2` away.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub min_latitude: f64,
    pub max_latitude: f64,
    pub longitude: LongitudeSpan,
}

impl BoundingBox {
    /// Derives the box for `radius_km` around `origin`.
    ///
    /// The latitude delta uses the fixed 111 km per degree. The
    /// longitude delta is `radius / (111 / cos(latitude))`, widened to
    /// the exact spherical extent of the circle where that is larger
    /// (high latitudes with wide radii). Origins closer to a pole than
    /// `MAX_BOX_LATITUDE`, and circles that contain a pole, leave the
    /// longitude unbounded.
    pub fn around(origin: &Coordinate, radius_km: f64) -> Result<Self, MeetlyError> {
        origin.validate()?;
        validate_radius(radius_km)?;

        let delta_latitude = radius_km / KM_PER_DEGREE;
        let min_latitude = origin.latitude - delta_latitude;
        let max_latitude = origin.latitude + delta_latitude;

        let unbounded = BoundingBox {
            min_latitude,
            max_latitude,
            longitude: LongitudeSpan::All,
        };

        if origin.latitude.abs() > MAX_BOX_LATITUDE {
            return Ok(unbounded);
        }

        let cos_latitude = origin.latitude.to_radians().cos();
        let approximate = radius_km / (KM_PER_DEGREE / cos_latitude);

        let angular_radius = radius_km * 1000.0 / EARTH_RADIUS_M;
        let ratio = angular_radius.sin() / cos_latitude;

        if angular_radius >= std::f64::consts::FRAC_PI_2 || ratio >= 1.0 {
            return Ok(unbounded);
        }

        let exact = ratio.asin().to_degrees();
        let delta_longitude = approximate.max(exact);

        if delta_longitude >= 180.0 {
            return Ok(unbounded);
        }

        Ok(BoundingBox {
            min_latitude,
            max_latitude,
            longitude: LongitudeSpan::Range(
                origin.longitude - delta_longitude,
                origin.longitude + delta_longitude,
            ),
        })
    }

    /// The longitude ranges to query, each within [-180, 180]. A box
    /// crossing the antimeridian yields two ranges; an unbounded box
    /// yields none.
    pub fn longitude_ranges(&self) -> Vec<(f64, f64)> {
        match self.longitude {
            LongitudeSpan::All => vec![],
            LongitudeSpan::Range(min, max) if min < -180.0 => {
                vec![(-180.0, max), (min + 360.0, 180.0)]
            }
            LongitudeSpan::Range(min, max) if max > 180.0 => {
                vec![(min, 180.0), (-180.0, max - 360.0)]
            }
            LongitudeSpan::Range(min, max) => vec![(min, max)],
        }
    }

    /// Whether the point lies inside the box, bounds included.
    pub fn contains(&self, point: &Coordinate) -> bool {
        let latitude_ok =
            point.latitude >= self.min_latitude && point.latitude <= self.max_latitude;

        let longitude_ok = match self.longitude {
            LongitudeSpan::All => true,
            LongitudeSpan::Range(..) => self
                .longitude_ranges()
                .iter()
                .any(|(min, max)| point.longitude >= *min && point.longitude <= *max),
        };

        latitude_ok && longitude_ok
    }
}

/// Rejects radii that are negative, zero, infinite or NaN.
pub fn validate_radius(radius_km: f64) -> Result<(), MeetlyError> {
    if radius_km.is_finite() && radius_km > 0.0 {
        Ok(())
    } else {
        Err(MeetlyError::invalid(format!(
            "radius {} km must be a positive number",
            radius_km
        )))
    }
}
