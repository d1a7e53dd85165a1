//! Helpers for partial updates.
//!
//! A patch field is `Option<T>`: `None` leaves the stored value alone. Fields
//! that may also be cleared are `Option<Option<T>>`, where `Some(None)` means
//! an explicit JSON `null`.

use serde::{Deserialize, Deserializer};

/// Keeps "absent" and "null" apart when used with `#[serde(default)]`.
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Applies an optional replacement in place.
pub fn apply<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "double_option")]
        comment: Option<Option<String>>,
    }

    #[test]
    fn distinguishes_absent_from_null() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.comment, None);
        let null: Patch = serde_json::from_str(r#"{"comment":null}"#).unwrap();
        assert_eq!(null.comment, Some(None));
        let set: Patch = serde_json::from_str(r#"{"comment":"late bus"}"#).unwrap();
        assert_eq!(set.comment, Some(Some("late bus".to_string())));
    }

    #[test]
    fn apply_only_overwrites_present_values() {
        let mut name = "old".to_string();
        apply(&mut name, None);
        assert_eq!(name, "old");
        apply(&mut name, Some("new".to_string()));
        assert_eq!(name, "new");
    }
}
