use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{Span, field, instrument, warn};

use crate::model::{ChannelFeed, EntryId, Fields};
use crate::util::http::{Client, ClientError, InvalidUriError, Method, StatusCode, Uri};
use crate::util::types::ApiKey;

use super::config::RemoteConfig;
use super::provider::{FetchError, TelemetryProvider, WriteError};

/// Outcome of a single failed attempt
#[derive(Debug, Error)]
enum TryError {
    /// The provider does not know the channel, never retried
    #[error("channel not found")]
    NotFound,

    #[error("request timed out")]
    Timeout,

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("{0}")]
    WillRetry(String),
}

impl From<ClientError> for TryError {
    fn from(err: ClientError) -> Self {
        if err.is_timeout() {
            TryError::Timeout
        } else {
            TryError::WillRetry(err.to_string())
        }
    }
}

/// ThingSpeak channel client.
///
/// Every attempt gets its own timeout. Failed attempts are retried after
/// a fixed delay until `max_attempts` is reached.
#[derive(Debug, Clone)]
pub struct ThingSpeakClient {
    client: Client,
    feed_uri: Uri,
    update_uri: Uri,
    read_api_key: Option<ApiKey>,
    write_api_key: ApiKey,
    max_attempts: u32,
    retry_delay: Duration,
}

impl ThingSpeakClient {
    pub fn new(config: &RemoteConfig) -> Result<Self, InvalidUriError> {
        let feed_uri = Uri::join(
            &config.api_endpoint,
            &format!("/channels/{}/feeds.json", config.channel_id),
        )?;
        let update_uri = Uri::join(&config.api_endpoint, "/update")?;

        Ok(Self {
            client: Client::new(Some(config.request.timeout)),
            feed_uri,
            update_uri,
            read_api_key: config.read_api_key.clone(),
            write_api_key: config.write_api_key.clone(),
            max_attempts: config.request.max_attempts.max(1),
            retry_delay: config.request.retry_delay,
        })
    }

    async fn with_retries<T, F, Fut>(&self, mut attempt_fn: F) -> Result<T, (u32, TryError)>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TryError>>,
    {
        let mut attempt = 1;
        loop {
            match attempt_fn().await {
                Ok(value) => {
                    Span::current().record("attempts", attempt);
                    return Ok(value);
                }
                Err(err @ TryError::NotFound) => {
                    Span::current().record("attempts", attempt);
                    return Err((attempt, err));
                }
                Err(err) if attempt >= self.max_attempts => {
                    Span::current().record("attempts", attempt);
                    return Err((attempt, err));
                }
                Err(err) => {
                    warn!(
                        "attempt {attempt} failed: {err} ... will retry in {:?}",
                        self.retry_delay
                    );
                    attempt += 1;
                    sleep(self.retry_delay).await;
                }
            }
        }
    }

    async fn try_fetch(&self) -> Result<ChannelFeed, TryError> {
        let res = self
            .client
            .request(Method::GET, &self.feed_uri, |req| {
                let req = req.query(&[("results", "1")]);
                match &self.read_api_key {
                    Some(key) => req.query(&[("api_key", key.as_str())]),
                    None => req,
                }
            })
            .await?;

        let status = res.status();
        if status == StatusCode::NOT_FOUND {
            return Err(TryError::NotFound);
        }
        if !status.is_success() {
            return Err(TryError::WillRetry(format!(
                "server responded with {status}"
            )));
        }

        let body = res.text().await?;

        // unknown or private channels are reported with a bare -1
        if body.trim() == "-1" {
            return Err(TryError::NotFound);
        }

        serde_json::from_str(&body).map_err(|e| TryError::Malformed(e.to_string()))
    }

    async fn try_write(&self, fields: &Fields) -> Result<EntryId, TryError> {
        let res = self
            .client
            .request(Method::GET, &self.update_uri, |req| {
                let mut query = vec![("api_key".to_owned(), self.write_api_key.as_str().to_owned())];
                query.extend(fields.iter().map(|(n, value)| (n.key(), value.to_owned())));
                req.query(&query)
            })
            .await?;

        let status = res.status();
        if !status.is_success() {
            return Err(TryError::WillRetry(format!(
                "server responded with {status}"
            )));
        }

        let body = res.text().await?;
        match body.trim().parse::<EntryId>() {
            Ok(0) => Err(TryError::WillRetry("update refused by the server".to_owned())),
            Ok(entry_id) => Ok(entry_id),
            Err(_) => Err(TryError::Malformed(format!(
                "expected an entry id, got {body:?}"
            ))),
        }
    }
}

#[async_trait]
impl TelemetryProvider for ThingSpeakClient {
    #[instrument(skip_all, fields(attempts = field::Empty), err)]
    async fn fetch_latest(&self) -> Result<ChannelFeed, FetchError> {
        self.with_retries(|| self.try_fetch())
            .await
            .map_err(|(attempts, err)| match err {
                TryError::NotFound => FetchError::NotFound,
                TryError::Timeout => FetchError::Timeout,
                TryError::Malformed(msg) => FetchError::MalformedResponse(msg),
                TryError::WillRetry(last) => FetchError::ExhaustedRetries { attempts, last },
            })
    }

    #[instrument(skip_all, fields(attempts = field::Empty), err)]
    async fn write_fields(&self, fields: &Fields) -> Result<EntryId, WriteError> {
        self.with_retries(|| self.try_write(fields))
            .await
            .map_err(|(attempts, err)| match err {
                TryError::Timeout => WriteError::Timeout,
                err => WriteError::Rejected {
                    attempts,
                    last: err.to_string(),
                },
            })
    }
}
