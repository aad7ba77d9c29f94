//! Composite key codec.
//!
//! Both tables are keyed by `realm + DELIM + name`. Realms and names are
//! validated so neither can carry the delimiter, which keeps `decode` a
//! plain split on the first occurrence.

use crate::error::{RegistryError, Result};

/// Separator between the realm and the name in a composite key.
pub const DELIM: char = '\\';

/// Title-case a name so lookups ignore incidental capitalization.
///
/// The first letter of every run of letters is upper-cased and the rest are
/// lower-cased: `"sunset SHIMMER"` becomes `"Sunset Shimmer"`, `"o'neil"`
/// becomes `"O'Neil"`.
pub fn normalize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_word = false;

    for c in name.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }

    out
}

/// Reject names that would corrupt the key structure.
pub fn validate(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(RegistryError::InvalidName {
            name: name.to_string(),
            reason: "name is empty",
        });
    }
    if name.contains(DELIM) {
        return Err(RegistryError::InvalidName {
            name: name.to_string(),
            reason: "name contains the reserved key separator",
        });
    }
    Ok(())
}

/// Build a composite key. `name` is expected to be normalized already.
pub fn encode(realm: &str, name: &str) -> String {
    let mut key = String::with_capacity(realm.len() + 1 + name.len());
    key.push_str(realm);
    key.push(DELIM);
    key.push_str(name);
    key
}

/// Validate both parts, normalize the name and build the key.
pub fn encode_checked(realm: &str, name: &str) -> Result<String> {
    validate(realm)?;
    validate(name)?;
    Ok(encode(realm, &normalize(name)))
}

/// Split a key on the first delimiter. Keys without one are not composite.
pub fn decode(key: &str) -> Option<(&str, &str)> {
    key.split_once(DELIM)
}

/// Whether `key` is scoped to `realm`, compared on the key prefix alone.
pub fn belongs_to_realm(key: &str, realm: &str) -> bool {
    key.len() > realm.len()
        && key.starts_with(realm)
        && key[realm.len()..].starts_with(DELIM)
}

/// The realm-unqualified name of a key, if it belongs to `realm`.
pub fn name_in_realm<'a>(key: &'a str, realm: &str) -> Option<&'a str> {
    if belongs_to_realm(key, realm) {
        Some(&key[realm.len() + DELIM.len_utf8()..])
    } else {
        None
    }
}
