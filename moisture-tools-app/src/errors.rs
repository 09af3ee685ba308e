use std::io::{Error, ErrorKind};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackingError {
    /// An input file (kernel month, climatology, coordinate table or shard
    /// output) does not exist. The affected unit is skipped.
    #[error("missing {what}: {}", .path.display())]
    MissingInput { what: &'static str, path: PathBuf },

    /// Coordinate axes disagree between grids that would be combined.
    #[error("grid mismatch for {zone}: {detail}")]
    GridMismatch { zone: String, detail: String },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("{}:{line}: {message}", .path.display())]
    Table {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("unit abandoned after {elapsed:?}")]
    TimedOut { elapsed: Duration },

    #[error("no variable named '{0}'")]
    UnknownVariable(String),

    #[error(transparent)]
    Netcdf(#[from] netcdf::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TrackingError {
    pub fn missing(what: &'static str, path: impl Into<PathBuf>) -> TrackingError {
        TrackingError::MissingInput {
            what,
            path: path.into(),
        }
    }

    pub fn mismatch(zone: impl ToString, detail: impl Into<String>) -> TrackingError {
        TrackingError::GridMismatch {
            zone: zone.to_string(),
            detail: detail.into(),
        }
    }

    /// Errors that abort the enclosing run rather than a single unit.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TrackingError::GridMismatch { .. } | TrackingError::Configuration(_)
        )
    }

    /// Errors that mean "no output for this unit" rather than a failure.
    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            TrackingError::MissingInput { .. } | TrackingError::TimedOut { .. }
        )
    }
}

impl From<TrackingError> for Error {
    fn from(err: TrackingError) -> Error {
        let kind = match &err {
            TrackingError::MissingInput { .. } => ErrorKind::NotFound,
            TrackingError::Configuration(_) => ErrorKind::InvalidInput,
            TrackingError::GridMismatch { .. } | TrackingError::Table { .. } => ErrorKind::InvalidData,
            TrackingError::TimedOut { .. } => ErrorKind::TimedOut,
            TrackingError::Io(e) => e.kind(),
            TrackingError::UnknownVariable(_) | TrackingError::Netcdf(_) => ErrorKind::InvalidData,
        };
        Error::new(kind, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let missing = TrackingError::missing("transport kernel", "/data/k_01.nc");
        assert!(missing.is_skip() && !missing.is_fatal());
        assert_eq!(missing.to_string(), "missing transport kernel: /data/k_01.nc");

        let mismatch = TrackingError::mismatch(7, "lon axis differs");
        assert!(mismatch.is_fatal() && !mismatch.is_skip());

        let io: Error = TrackingError::Configuration("percentile 0".to_string()).into();
        assert_eq!(io.kind(), ErrorKind::InvalidInput);
    }
}
