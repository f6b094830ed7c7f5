pub use client::{Client, ClientError, Method, Response, StatusCode};
pub use uri::{InvalidUriError, Uri};

mod uri {
    use std::fmt::Display;
    use std::str::FromStr;

    use axum::http;
    use thiserror::Error;

    #[derive(Debug, Error)]
    pub struct InvalidUriError(String);

    impl Display for InvalidUriError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            self.0.fmt(f)
        }
    }

    impl From<http::uri::InvalidUri> for InvalidUriError {
        fn from(value: http::uri::InvalidUri) -> Self {
            InvalidUriError(value.to_string())
        }
    }

    impl From<http::uri::InvalidUriParts> for InvalidUriError {
        fn from(value: http::uri::InvalidUriParts) -> Self {
            InvalidUriError(value.to_string())
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    pub struct Uri(http::Uri);

    impl Uri {
        /// Replace the path of `base_uri`, keeping scheme and authority.
        ///
        /// Any path prefix on the base (e.g. a reverse proxy mount point)
        /// is kept in front of `path`.
        pub fn join(base_uri: &Uri, path: &str) -> Result<Self, InvalidUriError> {
            let prefix = base_uri.0.path().trim_end_matches('/');
            let path_and_query =
                http::uri::PathAndQuery::from_maybe_shared(format!("{prefix}{path}"))?;
            let mut parts = base_uri.0.clone().into_parts();
            parts.path_and_query = Some(path_and_query);

            Ok(http::Uri::from_parts(parts).map(Self)?)
        }
    }

    impl Display for Uri {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            self.0.fmt(f)
        }
    }

    impl FromStr for Uri {
        type Err = InvalidUriError;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            Ok(http::Uri::from_str(s).map(Self)?)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_joins_paths_onto_a_base() {
            let base: Uri = "https://api.thingspeak.com".parse().unwrap();
            let uri = Uri::join(&base, "/channels/42/feeds.json").unwrap();
            assert_eq!(uri.to_string(), "https://api.thingspeak.com/channels/42/feeds.json");
        }

        #[test]
        fn test_keeps_the_base_path_prefix() {
            let base: Uri = "http://127.0.0.1:8080/thingspeak/".parse().unwrap();
            let uri = Uri::join(&base, "/update").unwrap();
            assert_eq!(uri.to_string(), "http://127.0.0.1:8080/thingspeak/update");
        }
    }
}

mod client {
    use std::time::Duration;

    use reqwest::RequestBuilder;

    use super::uri::Uri;

    pub type Method = reqwest::Method;
    pub type StatusCode = reqwest::StatusCode;

    #[derive(Debug, thiserror::Error)]
    pub enum ClientError {
        #[error(transparent)]
        Client(reqwest::Error),

        #[error(transparent)]
        Server(reqwest::Error),
    }

    impl ClientError {
        /// True if the request or reading its body hit the client timeout
        pub fn is_timeout(&self) -> bool {
            match self {
                Self::Client(err) | Self::Server(err) => err.is_timeout(),
            }
        }
    }

    #[derive(Debug)]
    pub struct Response(reqwest::Response);

    impl Response {
        pub fn status(&self) -> StatusCode {
            self.0.status()
        }

        pub async fn text(self) -> Result<String, ClientError> {
            self.0.text().await.map_err(ClientError::Server)
        }
    }

    // Based on: https://github.com/ramsayleung/rspotify/blob/master/rspotify-http/src/reqwest.rs
    #[derive(Debug, Clone)]
    pub struct Client {
        client: reqwest::Client,
        timeout: Option<Duration>,
    }

    impl Client {
        pub fn new(timeout: Option<Duration>) -> Self {
            Self {
                client: reqwest::Client::new(),
                timeout,
            }
        }

        /// Thin wrapper around [reqwest::Request], the decorator receives
        /// the builder with timeout already applied and may add headers,
        /// query parameters or a body.
        pub async fn request<D>(
            &self,
            method: Method,
            uri: &Uri,
            decorator: D,
        ) -> Result<Response, ClientError>
        where
            D: FnOnce(RequestBuilder) -> RequestBuilder,
        {
            let mut request = self.client.request(method, uri.to_string());

            if let Some(timeout) = self.timeout {
                request = request.timeout(timeout);
            }

            request = decorator(request);

            Ok(Response(request.send().await.map_err(ClientError::Client)?))
        }
    }
}
