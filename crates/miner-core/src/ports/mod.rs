//! Ports - boundaries to everything outside the scheduling core.
//!
//! - **ChainReader**: task discovery (RPC / event decoding lives behind it)
//! - **ExecutionDelegate**: model inference
//! - **ResultSubmitter**: solution submission
//! - **Clock**, **IdGenerator**: swappable for deterministic tests

pub mod chain;
pub mod clock;
pub mod executor;
pub mod id_generator;
pub mod submitter;

pub use self::chain::ChainReader;
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::executor::ExecutionDelegate;
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::submitter::ResultSubmitter;
