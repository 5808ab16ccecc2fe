// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `error` module defines the error taxonomy shared by every bitround crate.

use std::error::Error as StdError;
use std::fmt;
use std::ops::Deref;
use std::result;

/// `BitroundError` enumerates every kind of failure the core and its container backends can
/// report. Variant names match the error taxonomy in the toolkit's design notes.
#[derive(Debug)]
pub enum BitroundError {
    /// A caller-supplied argument was out of range: inflevel outside `[0, 1]`, complevel outside
    /// `[1, 9]`, or fewer than two input files given to the concatenator.
    InvalidInput(&'static str),
    /// Two containers being concatenated disagree on a record variable's schema: it is missing
    /// from a later input, or its chunk shape or filter stack differs.
    SchemaMismatch(String),
    /// The Information Estimator was given fewer than two values.
    InsufficientSamples,
    /// The Bit-Round Applier was asked to keep a number of mantissa bits outside `[1, 23]`.
    InvalidKeepBits(i32),
    /// The element type of a variable is not one analysis or rewrite operations support.
    UnsupportedType(String),
    /// The underlying container reader or writer reported a failure.
    ContainerIoError(Box<dyn StdError + Send + Sync>),
    /// Informational: the current chunk contains a NaN or declared fill value, so bit-rounding
    /// was skipped for it. Not fatal; the orchestrator copies the variable through unchanged.
    MissingValueInChunk,
}

impl fmt::Display for BitroundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BitroundError::InvalidInput(msg) => write!(f, "invalid input: {}", msg),
            BitroundError::SchemaMismatch(msg) => write!(f, "schema mismatch: {}", msg),
            BitroundError::InsufficientSamples => {
                write!(f, "at least two samples are required to estimate bit information")
            }
            BitroundError::InvalidKeepBits(nsb) => {
                write!(f, "keep-bits count {} is outside the valid range [1, 23]", nsb)
            }
            BitroundError::UnsupportedType(ty) => write!(f, "unsupported element type: {}", ty),
            BitroundError::ContainerIoError(err) => write!(f, "container I/O error: {}", err),
            BitroundError::MissingValueInChunk => {
                write!(f, "chunk contains a NaN or fill value; skipping bit-rounding")
            }
        }
    }
}

impl StdError for BitroundError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            BitroundError::ContainerIoError(err) => Some(err.deref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for BitroundError {
    fn from(err: std::io::Error) -> Self {
        BitroundError::ContainerIoError(Box::new(err))
    }
}

pub type Result<T> = result::Result<T, BitroundError>;

/// Convenience function to create an invalid-input error.
pub fn invalid_input_error<T>(msg: &'static str) -> Result<T> {
    Err(BitroundError::InvalidInput(msg))
}

/// Convenience function to create a schema-mismatch error.
pub fn schema_mismatch_error<T>(msg: impl Into<String>) -> Result<T> {
    Err(BitroundError::SchemaMismatch(msg.into()))
}

/// Convenience function to create an unsupported-type error.
pub fn unsupported_type_error<T>(ty: impl Into<String>) -> Result<T> {
    Err(BitroundError::UnsupportedType(ty.into()))
}

/// Convenience function to wrap a container backend error.
pub fn container_io_error<T>(err: impl StdError + Send + Sync + 'static) -> Result<T> {
    Err(BitroundError::ContainerIoError(Box::new(err)))
}

/// As [`container_io_error`], but returns the error value itself rather than a `Result`, for
/// call sites that need to build a `BitroundError` to pass along (e.g. inside `.map_err(...)`)
/// rather than return it directly.
pub fn wrap_container_io_error(err: impl StdError + Send + Sync + 'static) -> BitroundError {
    BitroundError::ContainerIoError(Box::new(err))
}
