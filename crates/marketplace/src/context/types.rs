//! Pure types for request-scoped context.

use marketplace_core::marketplace::ProviderProfile;
use uuid::Uuid;

/// Unique identifier for a request, used for tracing and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The authenticated caller, as asserted by the upstream auth layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub user_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub picture: Option<String>,
}

/// Request-scoped context available to all `/api` handlers.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub caller: CallerIdentity,
    /// Unique request identifier for tracing.
    pub request_id: RequestId,
}

impl RequestContext {
    pub fn user_id(&self) -> &str {
        &self.caller.user_id
    }

    /// Profile values supplied by the identity provider, used on signup.
    pub fn provider_profile(&self) -> ProviderProfile {
        ProviderProfile {
            name: self.caller.name.clone(),
            email: self.caller.email.clone(),
            picture: self.caller.picture.clone(),
        }
    }
}
