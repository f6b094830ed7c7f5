use clap::Parser;
use std::num::ParseIntError;
use std::path::PathBuf;
use std::time::Duration;

use crate::api::LocalAddress;
use crate::model::ChannelId;
use crate::util::http::Uri;
use crate::util::types::ApiKey;

fn parse_duration(s: &str) -> Result<Duration, ParseIntError> {
    let millis: u64 = s.parse()?;
    Ok(Duration::from_millis(millis))
}

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)] // read from Cargo.toml
pub struct Cli {
    /// Local API listen address, either ip:port or a unix socket path
    #[arg(
        env = "SUNRELAY_LOCAL_API_ADDRESS",
        long = "local-api-address",
        value_name = "addr",
        default_value = "127.0.0.1:5000"
    )]
    pub local_api_address: LocalAddress,

    /// Bearer token required by the local API. The API is open if not set
    #[arg(
        env = "SUNRELAY_API_ACCESS_TOKEN",
        long = "api-access-token",
        value_name = "token"
    )]
    pub api_access_token: Option<ApiKey>,

    /// Remote API endpoint URI
    #[arg(
        env = "SUNRELAY_REMOTE_API_ENDPOINT",
        long = "remote-api-endpoint",
        value_name = "uri",
        default_value = "https://api.thingspeak.com"
    )]
    pub remote_api_endpoint: Uri,

    /// Remote channel to follow
    #[arg(env = "SUNRELAY_CHANNEL_ID", long = "channel-id", value_name = "int")]
    pub channel_id: ChannelId,

    /// Read key, only needed for private channels
    #[arg(env = "SUNRELAY_READ_API_KEY", long = "read-api-key", value_name = "key")]
    pub read_api_key: Option<ApiKey>,

    /// Write key of the channel
    #[arg(env = "SUNRELAY_WRITE_API_KEY", long = "write-api-key", value_name = "key")]
    pub write_api_key: ApiKey,

    /// Timeout of a single remote request attempt in milliseconds
    #[arg(
        env = "SUNRELAY_REQUEST_TIMEOUT_MS",
        long = "request-timeout-ms",
        value_name = "ms",
        value_parser = parse_duration,
        default_value = "15000"
    )]
    pub request_timeout: Duration,

    /// Number of attempts before a remote request is given up
    #[arg(
        env = "SUNRELAY_REQUEST_MAX_ATTEMPTS",
        long = "request-max-attempts",
        value_name = "int",
        default_value_t = 5
    )]
    pub request_max_attempts: u32,

    /// Delay between remote request attempts in milliseconds
    #[arg(
        env = "SUNRELAY_REQUEST_RETRY_DELAY_MS",
        long = "request-retry-delay-ms",
        value_name = "ms",
        value_parser = parse_duration,
        default_value = "2000"
    )]
    pub request_retry_delay: Duration,

    /// Remote channel poll interval in milliseconds
    #[arg(
        env = "SUNRELAY_POLL_INTERVAL_MS",
        long = "poll-interval-ms",
        value_name = "ms",
        value_parser = parse_duration,
        default_value = "15000"
    )]
    pub poll_interval: Duration,

    /// Time the device needs after a relay write in milliseconds
    #[arg(
        env = "SUNRELAY_SETTLE_DELAY_MS",
        long = "settle-delay-ms",
        value_name = "ms",
        value_parser = parse_duration,
        default_value = "17000"
    )]
    pub settle_delay: Duration,

    /// Directory where channel history is kept
    #[arg(env = "SUNRELAY_DATA_DIR", long = "data-dir", value_name = "path")]
    pub data_dir: Option<PathBuf>,
}

pub fn parse() -> Cli {
    Parser::parse()
}
