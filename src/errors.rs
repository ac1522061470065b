use std::error::Error;
use std::fmt;

#[derive(Debug)]
pub enum SimulatorError {
    // Configuration errors
    UnsupportedCacheSize(usize),
    UnknownReplacementPolicy(u32),
    InvalidCacheLevels(usize),

    // Trace errors
    EmptyTrace(String),

    // System errors
    IoError(std::io::Error),
}

impl fmt::Display for SimulatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimulatorError::UnsupportedCacheSize(size_kb) => {
                write!(f, "No latency profile for cache size: {}KB", size_kb)
            },
            SimulatorError::UnknownReplacementPolicy(code) => {
                write!(f, "Unknown replacement policy code: 0x{:02X}", code)
            },
            SimulatorError::InvalidCacheLevels(levels) => {
                write!(f, "Cache level count out of range (1..=3): {}", levels)
            },
            SimulatorError::EmptyTrace(path) => {
                write!(f, "Trace file contains no records: {}", path)
            },
            SimulatorError::IoError(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl Error for SimulatorError {}

impl From<std::io::Error> for SimulatorError {
    fn from(error: std::io::Error) -> Self {
        SimulatorError::IoError(error)
    }
}
