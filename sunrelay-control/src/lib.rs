mod command;
mod relay;

pub use command::{InvalidCommand, RELAY_FIELDS, RelayCommand};
pub use relay::{RelayController, RelayError, RelayOutcome};

use sunrelay_model as model;
use sunrelay_remote as remote;
use sunrelay_store as store;
