//! Content-addressed identifiers and storage keys

use std::fmt;

use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Number of hex characters kept from the digest
pub const CONTENT_ID_LEN: usize = 7;

/// Short identifier derived from a string: the first 7 hex characters of its
/// SHA-256 digest
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(String);

impl ContentId {
    pub fn from_input(input: &str) -> Self {
        let hash = Sha256::digest(input.as_bytes());
        let mut hex = format!("{:x}", hash);
        hex.truncate(CONTENT_ID_LEN);
        ContentId(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `{base}_{user}_{YYYYmmddHHMMSS}{extension}` at the current local time
pub fn timestamped_filename(base: &str, user_id: &str, extension: &str) -> String {
    timestamped_filename_at(base, user_id, extension, &Local::now())
}

/// [`timestamped_filename`] at a fixed instant
pub fn timestamped_filename_at<Tz>(
    base: &str,
    user_id: &str,
    extension: &str,
    at: &DateTime<Tz>,
) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    format!(
        "{}_{}_{}{}",
        base,
        user_id,
        at.format("%Y%m%d%H%M%S"),
        extension
    )
}

/// Public id of an uploaded clip: `{prefix}{ContentId}`
pub fn clip_id(prefix: &str, content_id: &ContentId) -> String {
    format!("{}{}", prefix, content_id)
}

/// Object storage key for a clip id: `{namespace}/{id}`
pub fn storage_key(namespace: &str, id: &str) -> String {
    format!("{}/{}", namespace, id)
}
