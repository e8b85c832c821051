use thiserror::Error;

#[derive(Error, Debug)]
pub enum LocationError {
    #[error("Invalid location fix: {0}")]
    InvalidFix(String),

    #[error("Malformed track point on line {line}: {source}")]
    TrackParse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
