use log::{debug, info};
use time::Date;

use crate::auth::Caller;
use crate::environment::Environment;
use crate::errors::MeetlyError;
use crate::geo::Coordinate;
use crate::location::LocationProvider;
use crate::profile::{self, NewProfile, Profile, LOCATION, LOGIN};
use crate::store::{Collection, FieldOp, Predicate};

/// Creates the caller's profile with empty relationship sets.
///
/// Login uniqueness is checked with a query before the write; two
/// registrations racing for the same login can both pass the check.
pub async fn register(
    environment: &Environment,
    caller: &Caller,
    details: NewProfile,
    today: Date,
) -> Result<Profile, MeetlyError> {
    let uid = caller.uid()?;
    let profile = details.into_profile(uid.to_owned());

    validate(environment, &profile, today)?;

    let store = &environment.store;

    if store.get(Collection::Users, uid).await?.is_some() {
        return Err(MeetlyError::conflict(format!("{} is already registered", uid)));
    }

    let taken = store
        .query(
            Collection::Users,
            vec![Predicate::equals(LOGIN, profile.login.as_str())],
        )
        .await?;

    if !taken.is_empty() {
        return Err(MeetlyError::conflict(format!(
            "login {} is taken",
            profile.login
        )));
    }

    store
        .set(Collection::Users, uid, profile.to_document()?)
        .await?;

    info!(environment.logger, "Registered profile"; "uid" => uid, "login" => &profile.login);

    Ok(profile)
}

fn validate(environment: &Environment, profile: &Profile, today: Date) -> Result<(), MeetlyError> {
    if profile.name.is_empty() || profile.surname.is_empty() {
        return Err(MeetlyError::invalid("name and surname are required"));
    }

    if profile.login.is_empty() {
        return Err(MeetlyError::invalid("login is required"));
    }

    profile.location.validate()?;

    let born = profile.date_of_birth.date();

    if born > today {
        return Err(MeetlyError::invalid(format!(
            "date of birth {} is in the future",
            born
        )));
    }

    let minimum_age = environment.config.minimum_age;

    if profile::age_on(born, today) < minimum_age {
        return Err(MeetlyError::invalid(format!(
            "must be at least {} years old",
            minimum_age
        )));
    }

    Ok(())
}

/// Reads a profile by uid.
pub async fn profile(environment: &Environment, uid: &str) -> Result<Profile, MeetlyError> {
    let document = environment
        .store
        .get(Collection::Users, uid)
        .await?
        .ok_or_else(|| MeetlyError::not_found(Collection::Users, uid))?;

    Profile::from_document(document)
}

/// Stores `location` as the caller's profile location.
pub async fn update_location(
    environment: &Environment,
    caller: &Caller,
    location: Coordinate,
) -> Result<(), MeetlyError> {
    let uid = caller.uid()?;
    location.validate()?;

    environment
        .store
        .update(
            Collection::Users,
            uid,
            vec![FieldOp::set(LOCATION, serde_json::to_value(location)?)],
        )
        .await?;

    debug!(environment.logger, "Updated location"; "uid" => uid, "location" => %location);

    Ok(())
}

/// Asks `provider` for the current position and stores it.
pub async fn refresh_location(
    environment: &Environment,
    caller: &Caller,
    provider: &dyn LocationProvider,
) -> Result<Coordinate, MeetlyError> {
    caller.uid()?;

    let location = provider.current_location().await?;
    update_location(environment, caller, location).await?;

    Ok(location)
}
