use std::time::Duration;

use crate::model::ChannelId;
use crate::util::http::Uri;
use crate::util::types::ApiKey;

/// Remote provider configuration
#[derive(Clone, Debug)]
pub struct RemoteConfig {
    pub api_endpoint: Uri,
    pub channel_id: ChannelId,

    /// Only needed for private channels
    pub read_api_key: Option<ApiKey>,
    pub write_api_key: ApiKey,
    pub request: RequestConfig,
}

/// Per call behaviour of requests to the provider
#[derive(Clone, Debug)]
pub struct RequestConfig {
    /// Timeout of a single attempt
    pub timeout: Duration,

    /// Total number of attempts, including the first one
    pub max_attempts: u32,

    pub retry_delay: Duration,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(15_000),
            max_attempts: 5,
            retry_delay: Duration::from_millis(2_000),
        }
    }
}
