use std::ops::RangeInclusive;
use thiserror::Error;

use crate::model::FieldNumber;

/// Channel fields wired to relay outputs
pub const RELAY_FIELDS: RangeInclusive<i64> = 5..=8;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidCommand {
    #[error("invalid relay field {0}, expected a field between 5 and 8")]
    Field(i64),

    #[error("invalid relay value {0}, expected 0 or 1")]
    Value(i64),

    #[error("relay field and value must be integers")]
    Missing,
}

/// A validated request to switch one relay on or off
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayCommand {
    pub field: FieldNumber,
    pub value: u8,
}

impl RelayCommand {
    pub fn try_new(field: i64, value: i64) -> Result<Self, InvalidCommand> {
        if !RELAY_FIELDS.contains(&field) {
            return Err(InvalidCommand::Field(field));
        }
        let field = FieldNumber::try_from(field).map_err(|e| InvalidCommand::Field(e.0))?;

        let value = match value {
            0 => 0,
            1 => 1,
            other => return Err(InvalidCommand::Value(other)),
        };

        Ok(Self { field, value })
    }
}
