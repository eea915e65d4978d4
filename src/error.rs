use thiserror::Error;

/// Failures the monitor can hit. Every one of them is fatal.
#[derive(Debug, Error)]
pub enum Error {
    #[error("window size {0} is not a power of two")]
    Configuration(usize),

    #[error("transform length {0} is not a power of two")]
    Length(usize),

    #[error("power spectrum has {actual} bins, tracker expects {expected}")]
    Mismatch { expected: usize, actual: usize },

    #[error("audio capture failed: {0}")]
    Capture(String),

    #[error("terminal output failed: {0}")]
    Terminal(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
