/*
This module is home to everything related to the remote telemetry
provider the device reports to.

It provides a client to read the latest channel feed and to write relay
fields back with bounded retries, and the background poll loop that keeps
the local telemetry store in sync with the provider.
*/

mod config;
mod poll;
mod provider;
mod thingspeak;

pub use config::{RemoteConfig, RequestConfig};
pub use poll::{PollError, Poller, start_poll};
pub use provider::{FetchError, TelemetryProvider, WriteError};
pub use thingspeak::ThingSpeakClient;

use sunrelay_model as model;
use sunrelay_store as store;
use sunrelay_util as util;
