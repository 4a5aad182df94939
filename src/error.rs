//! Error types shared by the capture core and its collaborators.

use thiserror::Error;

/// Errors surfaced by configuration parsing and frame sources.
///
/// Per-frame decode failures never show up here: the reader drops those frames
/// and keeps going.
#[derive(Debug, Error)]
pub enum Error {
    /// A keep-set entry could not be parsed as a CIDR prefix.
    #[error("keep-ip #{index} {input:?}: {reason}")]
    InvalidPrefix {
        index: usize,
        input: String,
        reason: String,
    },

    #[error("invalid local MAC address {0:?}")]
    InvalidLocalMac(String),

    #[error("exactly one of ifname and input+local should be specified")]
    SourceSelection,

    #[error("unknown capture file extension in {0:?}")]
    UnknownExtension(String),

    #[error("cannot capture on interface {0:?}")]
    UnsupportedInterface(String),

    /// The frame source failed for a reason other than end-of-stream.
    #[error("capture read error: {0}")]
    Capture(String),

    #[error("bad pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
