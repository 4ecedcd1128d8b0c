use std::sync::Arc;

use log::Logger;

use crate::config::get_variable_or;
use crate::locks::PairLocks;
use crate::store::DocumentStore;
use crate::urls::Urls;

/// Everything an operation needs besides its arguments. Cheap to clone.
#[derive(Clone)]
pub struct Environment {
    pub logger: Arc<Logger>,
    pub store: Arc<dyn DocumentStore>,
    pub locks: PairLocks,
    pub urls: Arc<Urls>,
    pub config: Config,
}

impl Environment {
    pub fn new(
        logger: Arc<Logger>,
        store: Arc<dyn DocumentStore>,
        urls: Arc<Urls>,
        config: Config,
    ) -> Self {
        Self {
            logger,
            store,
            locks: PairLocks::new(),
            urls,
            config,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Config {
    /// Largest radius accepted by proximity searches.
    pub max_radius_km: f64,

    /// Minimum age at registration.
    pub minimum_age: i32,

    /// Age required to join meetings with adult-only categories.
    pub adult_age: i32,
}

impl Config {
    pub fn new(max_radius_km: f64, minimum_age: i32, adult_age: i32) -> Self {
        Self {
            max_radius_km,
            minimum_age,
            adult_age,
        }
    }

    /// Reads `MEETLY_MAX_RADIUS_KM`, `MEETLY_MINIMUM_AGE` and
    /// `MEETLY_ADULT_AGE`, falling back to the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            max_radius_km: get_variable_or("MEETLY_MAX_RADIUS_KM", defaults.max_radius_km),
            minimum_age: get_variable_or("MEETLY_MINIMUM_AGE", defaults.minimum_age),
            adult_age: get_variable_or("MEETLY_ADULT_AGE", defaults.adult_age),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(500.0, 13, 18)
    }
}
