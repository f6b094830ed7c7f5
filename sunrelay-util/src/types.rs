use std::convert::Infallible;
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;
use subtle::ConstantTimeEq;

/// A secret used to authenticate against the remote provider or
/// against the local API.
///
/// The value is redacted from `Debug` output so configurations can be
/// traced safely.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ApiKey(String);

impl ApiKey {
    /// Compare against a key supplied by a client.
    ///
    /// The comparison takes the same time wherever the first mismatching
    /// byte is. Only the length of the key can be learned from timing.
    pub fn matches(&self, candidate: &str) -> bool {
        self.0.as_bytes().ct_eq(candidate.as_bytes()).into()
    }
}

impl Deref for ApiKey {
    type Target = String;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

impl FromStr for ApiKey {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_owned()))
    }
}

impl From<&str> for ApiKey {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}
