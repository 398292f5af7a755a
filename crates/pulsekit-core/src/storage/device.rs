// Device hash management
// Format: 64 lowercase hex chars (SHA-256 of a random UUID)

use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::prefs::PrefsStore;
use crate::error::DatabaseError;

/// Get the persisted device hash, creating and storing one on first use.
///
/// The hash is derived from a random UUID rather than hardware identifiers,
/// so it is stable per install and says nothing about the device itself.
pub fn get_or_create_device_hash(prefs: &PrefsStore) -> Result<String, DatabaseError> {
    if let Some(existing) = prefs.device_hash()? {
        if is_valid_device_hash(&existing) {
            return Ok(existing);
        }
        tracing::warn!(value = %existing, "discarding malformed device hash");
    }

    let seed = Uuid::new_v4();
    let hash = hex::encode(Sha256::digest(seed.as_bytes()));
    prefs.set_device_hash(&hash)?;
    Ok(hash)
}

fn is_valid_device_hash(value: &str) -> bool {
    value.len() == 64 && value.chars().all(|c| c.is_ascii_hexdigit())
}
