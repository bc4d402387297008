use crate::http::Response;
use chrono::{
    DateTime,
    Utc,
};
use serde::{
    Deserialize,
    Serialize,
};
use sha2::{
    Digest,
    Sha256,
};

/// A response as kept in a cache, with the digest of its body at store time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedEntry {
    pub key: String,
    pub response: Response,
    pub sha256: String,
    pub stored_at: DateTime<Utc>,
}

impl CachedEntry {
    pub fn new(key: impl Into<String>, response: Response) -> Self {
        let sha256 = body_digest(&response.body);
        Self {
            key: key.into(),
            response,
            sha256,
            stored_at: Utc::now(),
        }
    }

    /// The stored response, or `None` if the body no longer matches its digest.
    pub fn into_verified(self) -> Option<Response> {
        if body_digest(&self.response.body) == self.sha256 {
            Some(self.response)
        } else {
            tracing::warn!(key = %self.key, "cached body does not match its digest, ignoring entry");
            None
        }
    }
}

pub fn body_digest(body: &[u8]) -> String {
    hex::encode(Sha256::digest(body))
}
