//! Realtime ingestion errors.

/// Errors from obtaining or decoding a realtime feed.
///
/// These never reach queries: a failed poll leaves the overlay as it was.
#[derive(Debug, thiserror::Error)]
pub enum RealtimeError {
    #[error("protobuf decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("feed source error: {0}")]
    Source(String),
}

impl From<std::io::Error> for RealtimeError {
    fn from(err: std::io::Error) -> Self {
        RealtimeError::Source(err.to_string())
    }
}
