use std::collections::HashMap;

use serde::de::value::{Error as ValueError, MapDeserializer};
use serde::{de, Deserialize, Deserializer};

/// Splits a single line of `scontrol ... -o` output into `KEY=VALUE` pairs.
/// Values are split on the first `=` only; tokens without `=` are ignored.
pub fn attributes(line: &str) -> HashMap<&str, &str> {
    line.split_ascii_whitespace()
        .filter_map(|token| token.split_once('='))
        .collect()
}

/// Deserializes the `KEY=VALUE` attributes of every non-empty line in `text`.
/// Lines without any attributes or lines rejected by `T` are skipped.
pub fn parse_lines<'a, T>(text: &'a str) -> impl Iterator<Item = T> + 'a
where
    T: de::DeserializeOwned + 'a,
{
    text.lines().filter_map(|line| {
        let values = attributes(line);
        if values.is_empty() {
            if !line.trim().is_empty() {
                log::debug!("skipping line without attributes: {:?}", line);
            }

            return None;
        }

        match from_attributes(values) {
            Ok(value) => Some(value),
            Err(error) => {
                log::warn!("skipping unparseable line {:?}: {}", line, error);
                None
            }
        }
    })
}

/// Deserializes `T` from a map of attributes; unknown keys are ignored
pub fn from_attributes<T>(values: HashMap<&str, &str>) -> Result<T, ValueError>
where
    T: de::DeserializeOwned,
{
    let deserializer: MapDeserializer<'_, _, ValueError> = MapDeserializer::new(values.into_iter());
    T::deserialize(deserializer)
}

/// Numeric attributes degrade to zero when missing or malformed, e.g. `N/A`
pub fn lenient_number<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    Ok(value.trim().parse().unwrap_or(0))
}

/// Memory limits such as `DefMemPerGPU`; `UNLIMITED` and invalid values are `None`
pub fn optional_limit<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    Ok(value.trim().parse().ok())
}

/// Parses `value` as a unit variant of `T`, ignoring case
pub fn parse_variant<T>(value: &str) -> Option<T>
where
    T: de::DeserializeOwned,
{
    let value = value.trim().to_ascii_lowercase();
    let deserializer: de::value::StringDeserializer<ValueError> =
        de::IntoDeserializer::into_deserializer(value);

    T::deserialize(deserializer).ok()
}
