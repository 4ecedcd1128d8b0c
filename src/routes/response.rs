use serde::Serialize;
use url::Url;

use crate::category::CategoryInfo;
use crate::discovery::NearbyMeeting;
use crate::friends::{Desync, Relationship, TransitionOutcome};
use crate::geo::Coordinate;
use crate::meeting::Meeting;
use crate::profile::Profile;

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum SuccessResponse<'a> {
    Categories {
        categories: Vec<CategoryInfo>,
    },
    Distance {
        distance_m: f64,
    },
    Healthz {
        revision: Option<&'a str>,
        timestamp: Option<&'a str>,
        version: &'a str,
        store_reachable: bool,
        max_radius_km: f64,
    },
    Location {
        location: Coordinate,
    },
    Meeting {
        id: String,
        #[serde(flatten)]
        meeting: Meeting,
        image: Url,
    },
    Nearby {
        meetings: Vec<NearbyMeeting>,
    },
    Profile {
        uid: String,
        #[serde(flatten)]
        profile: Profile,
        image: Url,
    },
    Relationship {
        state: &'static str,
        #[serde(skip_serializing_if = "Option::is_none")]
        desync: Option<Desync>,
    },
    Transition(TransitionOutcome),
}

impl<'a> SuccessResponse<'a> {
    pub fn relationship(relationship: Relationship) -> Self {
        match relationship {
            Relationship::Settled(state) => SuccessResponse::Relationship {
                state: state.name(),
                desync: None,
            },
            Relationship::Desynced(desync) => SuccessResponse::Relationship {
                state: "DESYNCED",
                desync: Some(desync),
            },
        }
    }
}
