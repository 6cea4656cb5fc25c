use serde::{Deserialize, Deserializer};

/// Deserialize `null` the same as a missing field.
///
/// Store documents written field-by-field often carry explicit nulls.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
