use std::collections::BTreeSet;

use serde::Deserialize;

use crate::category::Category;
use crate::errors::MeetlyError;
use crate::friends::RelationState;
use crate::geo::Coordinate;
use crate::location::{OriginSource, ReportedLocation};

#[derive(Debug, Deserialize)]
pub struct NearbyQuery {
    pub radius_km: f64,

    /// Comma-separated category names.
    #[serde(default)]
    pub categories: Option<String>,

    #[serde(default)]
    pub origin: Option<OriginSource>,

    /// The device's position, if the client has one.
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

impl NearbyQuery {
    pub fn categories(&self) -> Result<BTreeSet<Category>, MeetlyError> {
        self.categories
            .iter()
            .flat_map(|list| list.split(','))
            .filter(|name| !name.trim().is_empty())
            .map(str::parse)
            .collect()
    }

    pub fn reported_location(&self) -> Result<ReportedLocation, MeetlyError> {
        match (self.lat, self.lon) {
            (Some(latitude), Some(longitude)) => {
                Ok(ReportedLocation(Some(Coordinate::new(latitude, longitude)?)))
            }
            (None, None) => Ok(ReportedLocation(None)),
            _ => Err(MeetlyError::invalid("lat and lon must be given together")),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DistanceQuery {
    pub from_lat: f64,
    pub from_lon: f64,
    pub to_lat: f64,
    pub to_lon: f64,
}

impl DistanceQuery {
    pub fn endpoints(&self) -> Result<(Coordinate, Coordinate), MeetlyError> {
        Ok((
            Coordinate::new(self.from_lat, self.from_lon)?,
            Coordinate::new(self.to_lat, self.to_lon)?,
        ))
    }
}

/// Body of a repair request: the state the caller's side should end in.
#[derive(Debug, Deserialize)]
pub struct RepairRequest {
    pub target: RelationState,
}
