use std::{env, time::Duration};

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// DynamoDB table holding user profiles (default: "TEUsersTable")
    #[cfg_attr(not(feature = "dynamodb"), allow(dead_code))]
    pub users_table: String,
    /// DynamoDB table holding listings (default: "TEListingsTable")
    #[cfg_attr(not(feature = "dynamodb"), allow(dead_code))]
    pub listings_table: String,
    /// DynamoDB table holding the tag index (default: "TETagsTable")
    #[cfg_attr(not(feature = "dynamodb"), allow(dead_code))]
    pub tags_table: String,
    /// Custom DynamoDB endpoint, e.g. a local DynamoDB container.
    /// Note: Only used when the `dynamodb` feature is enabled.
    #[cfg_attr(not(feature = "dynamodb"), allow(dead_code))]
    pub dynamodb_endpoint: Option<String>,
    /// Origin allowed by the CORS policy (default: "https://cse110.thepaulpan.com")
    pub cors_allowed_origin: String,
    /// Request timeout in seconds (default: 10)
    pub request_timeout_seconds: u64,
    /// Page size when a listing scan does not ask for one (default: 20)
    pub default_page_size: u32,
    /// Upper bound for a requested page size (default: 100)
    pub max_page_size: u32,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `USERS_TABLE` - Users table name (default: "TEUsersTable")
    /// - `LISTINGS_TABLE` - Listings table name (default: "TEListingsTable")
    /// - `TAGS_TABLE` - Tags table name (default: "TETagsTable")
    /// - `DYNAMODB_ENDPOINT` - Endpoint override (default: unset)
    /// - `CORS_ALLOWED_ORIGIN` - Allowed CORS origin
    /// - `REQUEST_TIMEOUT_SECONDS` - Request timeout (default: 10)
    /// - `DEFAULT_PAGE_SIZE` - Default scan page size (default: 20)
    /// - `MAX_PAGE_SIZE` - Maximum scan page size (default: 100)
    pub fn from_env() -> Self {
        Self {
            users_table: env::var("USERS_TABLE").unwrap_or_else(|_| "TEUsersTable".to_string()),
            listings_table: env::var("LISTINGS_TABLE")
                .unwrap_or_else(|_| "TEListingsTable".to_string()),
            tags_table: env::var("TAGS_TABLE").unwrap_or_else(|_| "TETagsTable".to_string()),
            dynamodb_endpoint: env::var("DYNAMODB_ENDPOINT")
                .ok()
                .filter(|v| !v.is_empty()),
            cors_allowed_origin: env::var("CORS_ALLOWED_ORIGIN")
                .unwrap_or_else(|_| "https://cse110.thepaulpan.com".to_string()),
            request_timeout_seconds: env::var("REQUEST_TIMEOUT_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            default_page_size: env::var("DEFAULT_PAGE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(20),
            max_page_size: env::var("MAX_PAGE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(100),
        }
    }

    /// Get the request timeout as a Duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Resolve the page size for a scan, clamped to `1..=max_page_size`.
    pub fn page_size(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.default_page_size)
            .clamp(1, self.max_page_size.max(1))
    }
}
