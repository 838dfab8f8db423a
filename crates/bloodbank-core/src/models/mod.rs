//! Domain models for the blood bank engine.

mod appointment;
mod bank;
mod blood;
mod lab;
mod matching;
mod notification;
mod people;
mod request;
mod unit;

pub use appointment::*;
pub use bank::*;
pub use blood::*;
pub use lab::*;
pub use matching::*;
pub use notification::*;
pub use people::*;
pub use request::*;
pub use unit::*;

use thiserror::Error;

/// Unknown label for one of the closed enumerations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown {kind}: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
