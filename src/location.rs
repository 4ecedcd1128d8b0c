use futures::future::BoxFuture;
use serde::Deserialize;

use crate::errors::MeetlyError;
use crate::geo::Coordinate;

/// Reports the device's current position.
pub trait LocationProvider: Send + Sync {
    /// Resolves to `Unavailable` when permission is missing or no fix can
    /// be acquired.
    fn current_location(&self) -> BoxFuture<Result<Coordinate, MeetlyError>>;
}

/// A position already obtained by the client and sent along with the
/// request.
#[derive(Clone, Copy, Debug)]
pub struct ReportedLocation(pub Option<Coordinate>);

impl LocationProvider for ReportedLocation {
    fn current_location(&self) -> BoxFuture<Result<Coordinate, MeetlyError>> {
        let result = self
            .0
            .ok_or_else(|| MeetlyError::unavailable("no location fix reported"));

        Box::pin(async move { result })
    }
}

/// Where the origin of a proximity search comes from.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum OriginSource {
    /// The location provider only.
    Device,
    /// The caller's stored profile location only.
    Profile,
    /// The location provider, falling back to the stored profile
    /// location when the provider is unavailable.
    DeviceOrProfile,
}

impl Default for OriginSource {
    fn default() -> Self {
        OriginSource::DeviceOrProfile
    }
}
