use serde::{Deserialize, Deserializer};

/// Normalizes a login by stripping surrounding whitespace, lowercasing
/// it and decomposing it into Unicode Normalization Form D, so that
/// logins differing only in case or composition collide.
///
/// ```
/// use meetly::normalization::normalize_login;
/// assert_eq!(normalize_login(" Zoë "), normalize_login("zoe\u{308}"));
/// ```
pub fn normalize_login(login: impl AsRef<str>) -> String {
    use unicode_normalization::UnicodeNormalization;

    login.as_ref().trim().to_lowercase().nfd().to_string()
}

/// Deserializes a `String` after running it through `normalize_login`.
pub fn deserialize<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    Ok(normalize_login(s))
}

/// Trims a display name; names keep their case.
pub fn trim_name(name: impl AsRef<str>) -> String {
    name.as_ref().trim().to_owned()
}
