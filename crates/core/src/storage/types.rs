use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::marketplace::ListingKey;

use super::{RepositoryError, Result};

/// Opaque pagination cursor returned by a scan.
///
/// Encodes the last evaluated listing key as URL-safe base64 JSON, so clients
/// can pass it back in a query string untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContinuationToken(String);

impl ContinuationToken {
    /// Wraps a token received from a client.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Encodes the last evaluated key of a page.
    pub fn from_key(key: &ListingKey) -> Result<Self> {
        let json =
            serde_json::to_vec(key).map_err(|e| RepositoryError::Serialization(e.to_string()))?;
        Ok(Self(URL_SAFE_NO_PAD.encode(json)))
    }

    /// Decodes the key the next page starts after.
    pub fn to_key(&self) -> Result<ListingKey> {
        let bytes = URL_SAFE_NO_PAD
            .decode(&self.0)
            .map_err(|_| RepositoryError::InvalidData("malformed continuation token".into()))?;
        serde_json::from_slice(&bytes)
            .map_err(|_| RepositoryError::InvalidData("malformed continuation token".into()))
    }
}

/// Parameters for a paginated scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRequest {
    /// Where the previous page stopped; `None` for the first page.
    pub start: Option<ContinuationToken>,
    /// Maximum number of items to evaluate.
    pub limit: Option<u32>,
}

impl PageRequest {
    pub fn new(start: Option<ContinuationToken>, limit: Option<u32>) -> Self {
        Self { start, limit }
    }
}

/// One page of scan results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Token for the next page, absent once the scan is exhausted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_key: Option<ContinuationToken>,
}
