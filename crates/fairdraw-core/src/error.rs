use thiserror::Error;

use crate::bits::ParseBitsError;

/// Why a single entropy source contributed nothing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("fetch failed: {0}")]
    Fetch(String),
    #[error("source returned no payload")]
    Empty,
    #[error("source panicked")]
    Panicked,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("invalid draw config: {0}")]
    InvalidConfig(String),
    #[error("input contains no usable bits")]
    EmptyInput,
    #[error("cannot draw {k} distinct numbers from 1..={max}")]
    InvalidSample { k: usize, max: u64 },
    #[error("whitening stalled after {rounds} rounds with {have} of {need} bits")]
    WhiteningStalled {
        rounds: usize,
        have: usize,
        need: usize,
    },
    #[error("no entropy source produced any data")]
    NoEntropy,
    #[error(transparent)]
    Bits(#[from] ParseBitsError),
}

pub type Result<T> = std::result::Result<T, CoreError>;
