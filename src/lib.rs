//! Capture NDN traffic, anonymize it and turn it into per-packet records.

pub mod anonymizer;
pub mod direction;
pub mod error;
pub mod flow;
pub mod input;
pub mod layers;
pub mod ndn;
pub mod output;
pub mod parser;
pub mod reader;
pub mod record;
pub mod websocket;

#[cfg(test)]
mod testutil;

pub use error::{Error, Result};
