//! Run identifiers.

use uuid::Uuid;

/// A fresh version-4 UUID in hyphenated lowercase form.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}
