//! Schedule loading errors.

use crate::domain::{DomainError, RouteId, StopId, TripId};

/// Error from turning schedule bytes into a network model.
///
/// A failed load never touches the currently published snapshot.
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    /// The bytes could not be decoded
    #[error("schedule format error: {0}")]
    Format(#[from] FormatError),

    /// The data decoded but is inconsistent
    #[error("schedule integrity error: {0}")]
    Integrity(#[from] ScheduleIntegrityError),

    /// The loading task panicked or was cancelled
    #[error("schedule load aborted: {0}")]
    Aborted(String),
}

/// The schedule bytes could not be decoded.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A required file is absent from the archive
    #[error("missing {0}")]
    MissingFile(&'static str),

    /// A required column is absent from a file
    #[error("{file} missing column {column}")]
    MissingColumn {
        file: &'static str,
        column: &'static str,
    },

    /// A field could not be parsed
    #[error("{file} row {row}: invalid {column} {value:?}")]
    InvalidField {
        file: &'static str,
        row: u64,
        column: &'static str,
        value: String,
    },

    /// The archive would decompress beyond the size limit
    #[error("archive decompresses to {size} bytes, limit is {limit}")]
    TooLarge { size: u64, limit: u64 },
}

/// Malformed or inconsistent static data.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScheduleIntegrityError {
    #[error("duplicate stop {0}")]
    DuplicateStop(StopId),

    #[error("duplicate route {0}")]
    DuplicateRoute(RouteId),

    #[error("duplicate trip {0}")]
    DuplicateTrip(TripId),

    #[error("stop {stop}: {source}")]
    InvalidStop { stop: StopId, source: DomainError },

    #[error("trip {trip} references unknown route {route}")]
    UnknownRoute { trip: TripId, route: RouteId },

    #[error("trip {trip} references unknown stop {stop}")]
    UnknownStop { trip: TripId, stop: StopId },

    #[error("trip {trip}: {source}")]
    InvalidTrip { trip: TripId, source: DomainError },

    #[error("transfer rule references unknown stop {0}")]
    UnknownTransferStop(StopId),
}
