//! Unified error types for the provisioning firmware.
//!
//! Every hardware call returns a typed [`HwError`] instead of signalling
//! "feature unavailable" through panics.  Protocol and persistence errors
//! never escape the engine: storage failures become a `save_failed` status
//! and the session carries on.  Only radio bring-up failures reach the
//! caller, as [`Error`].

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Errors that can propagate out of a provisioning session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The radio could not be brought up or its service registered.
    Radio(RadioError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Radio(e) => write!(f, "radio: {e}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Hardware call outcome
// ---------------------------------------------------------------------------

/// Outcome of a single hardware call that did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwError {
    /// The capability does not exist on this target (host build, missing
    /// peripheral, unsupported stack feature).
    Unavailable,
    /// The call failed but may succeed if retried.
    Transient(&'static str),
}

impl fmt::Display for HwError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable => write!(f, "capability unavailable"),
            Self::Transient(what) => write!(f, "transient failure: {what}"),
        }
    }
}

/// Result of a hardware call.
pub type HwResult<T> = core::result::Result<T, HwError>;

// ---------------------------------------------------------------------------
// Radio bring-up errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioError {
    /// Controller / host stack activation failed.
    InitFailed(HwError),
    /// GATT service registration failed or returned unusable handles.
    ServiceRegistration(HwError),
    /// Every rung of the advertising fallback ladder failed.
    AdvertisingFailed,
}

impl fmt::Display for RadioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InitFailed(e) => write!(f, "init failed ({e})"),
            Self::ServiceRegistration(e) => write!(f, "service registration failed ({e})"),
            Self::AdvertisingFailed => write!(f, "all advertising attempts failed"),
        }
    }
}

impl From<RadioError> for Error {
    fn from(e: RadioError) -> Self {
        Self::Radio(e)
    }
}

// ---------------------------------------------------------------------------
// Storage errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// The stored record could not be decoded.
    Corrupted,
    /// The record was rejected before touching storage.
    Invalid(&'static str),
    /// Write, flush or rename failed.
    Io,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Corrupted => write!(f, "record corrupted"),
            Self::Invalid(why) => write!(f, "record invalid: {why}"),
            Self::Io => write!(f, "I/O error"),
        }
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
