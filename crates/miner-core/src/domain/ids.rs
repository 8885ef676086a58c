//! Domain identifiers (strongly-typed IDs).
//!
//! Two families live here:
//! - `Id<T>`: ULID-backed identifiers minted by this process (`JobId`).
//! - `Bytes32<T>`: 0x-prefixed 32-byte hex identifiers minted on chain
//!   (`TaskId`, `ModelId`).
//!
//! Both use a phantom marker so that, for example, a `TaskId` can never be
//! passed where a `ModelId` is expected even though both are hex strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use ulid::Ulid;

/// Marker trait for process-local ids; supplies the Display prefix.
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// ULID-backed identifier.
///
/// ULIDs sort by creation time, so ordering job ids also orders them by
/// the moment they were enqueued.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

/// Job marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Job {}

impl IdMarker for Job {
    fn prefix() -> &'static str {
        "job-"
    }
}

/// Identifier of a Job (one scheduling attempt of a chain task).
pub type JobId = Id<Job>;

// ========================================
// On-chain 32-byte identifiers
// ========================================

/// Marker trait for chain identifiers; supplies a label for error messages.
pub trait HexMarker: Clone + Send + Sync + 'static {
    fn label() -> &'static str;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseIdError {
    #[error("{label} must start with 0x, got {value:?}")]
    MissingPrefix { label: &'static str, value: String },

    #[error("{label} must have 64 hex digits, got {len} in {value:?}")]
    BadLength {
        label: &'static str,
        value: String,
        len: usize,
    },

    #[error("{label} contains a non-hex digit: {value:?}")]
    InvalidDigit { label: &'static str, value: String },
}

/// 0x-prefixed, lower-case, 32-byte hex identifier.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Bytes32<T: HexMarker> {
    hex: String,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: HexMarker> Bytes32<T> {
    pub fn parse(value: &str) -> Result<Self, ParseIdError> {
        let label = T::label();
        let digits = value
            .strip_prefix("0x")
            .or_else(|| value.strip_prefix("0X"))
            .ok_or_else(|| ParseIdError::MissingPrefix {
                label,
                value: value.to_string(),
            })?;
        if digits.len() != 64 {
            return Err(ParseIdError::BadLength {
                label,
                value: value.to_string(),
                len: digits.len(),
            });
        }
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ParseIdError::InvalidDigit {
                label,
                value: value.to_string(),
            });
        }
        Ok(Self {
            hex: format!("0x{}", digits.to_ascii_lowercase()),
            _marker: PhantomData,
        })
    }

    /// The all-zero id; never refers to a real task or model.
    pub fn zero() -> Self {
        Self {
            hex: format!("0x{}", "0".repeat(64)),
            _marker: PhantomData,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.hex[2..].bytes().all(|b| b == b'0')
    }

    pub fn as_str(&self) -> &str {
        &self.hex
    }
}

impl<T: HexMarker> FromStr for Bytes32<T> {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl<T: HexMarker> TryFrom<String> for Bytes32<T> {
    type Error = ParseIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl<T: HexMarker> From<Bytes32<T>> for String {
    fn from(id: Bytes32<T>) -> Self {
        id.hex
    }
}

impl<T: HexMarker> fmt::Display for Bytes32<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex)
    }
}

impl<T: HexMarker> fmt::Debug for Bytes32<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", T::label(), self.hex)
    }
}

/// Chain task marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChainTask {}

impl HexMarker for ChainTask {
    fn label() -> &'static str {
        "task id"
    }
}

/// Model marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Model {}

impl HexMarker for Model {
    fn label() -> &'static str {
        "model id"
    }
}

/// Identifier of a task recorded on chain.
pub type TaskId = Bytes32<ChainTask>;

/// Identifier of a registered model.
pub type ModelId = Bytes32<Model>;
