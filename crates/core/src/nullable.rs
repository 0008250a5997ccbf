//! Serde helper distinguishing an absent field from an explicit `null`.
//!
//! Use with `#[serde(default, deserialize_with = "doctrack_core::nullable::deserialize")]`
//! on an `Option<Option<T>>`: absent → `None`, `null` → `Some(None)`,
//! value → `Some(Some(v))`.

use serde::{Deserialize, Deserializer};

pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
