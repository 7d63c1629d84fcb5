use thiserror::Error;

/// The node could not be reached or its body could not be read.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("request to {url} failed: {message}")]
pub struct TransportError {
    pub url: String,
    pub message: String,
}

impl TransportError {
    pub fn new(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            message: message.into(),
        }
    }
}

/// A response body the watcher cannot interpret.
#[derive(Error, Debug)]
pub enum ResponseError {
    #[error("response is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("expected a JSON array of events")]
    NotAnArray,

    #[error("expected a JSON object")]
    NotAnObject,
}

/// An event's `data` object is missing a field or carries a bad value.
#[derive(Error, Debug, PartialEq)]
pub enum DecodeError {
    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("field `{0}` is not a string")]
    NotAString(&'static str),

    #[error("field `{field}` is not valid hex: {source}")]
    InvalidHex {
        field: &'static str,
        source: hex::FromHexError,
    },

    #[error("field `{0}` is not an unsigned integer")]
    InvalidNumber(&'static str),

    #[error("field `{0}` is out of range")]
    OutOfRange(&'static str),

    #[error("sender is {0} bytes, expected at most 32")]
    EmitterTooLong(usize),

    #[error("timestamp {0} is not representable")]
    InvalidTimestamp(u64),
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("requested sequence {requested} but node returned {returned}")]
pub struct SequenceMismatch {
    pub requested: u64,
    pub returned: u64,
}

/// Reasons the watcher stops running.
#[derive(Error, Debug)]
pub enum WatcherError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("watcher cancelled")]
    Cancelled,

    #[error("publication receiver dropped")]
    PublicationChannelClosed,
}
