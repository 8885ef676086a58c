//! Port implementations for local runs and tests.
//!
//! - **InMemoryChain**: `ChainReader` fed by hand or from a JSON seed file
//! - **EchoDelegate**: `ExecutionDelegate` that echoes its input
//! - **LoggingSubmitter**: `ResultSubmitter` that only logs
//!
//! Real RPC, inference and transaction backends live outside this crate.

pub mod echo;
pub mod inmem_chain;
pub mod logging_submitter;

pub use self::echo::EchoDelegate;
pub use self::inmem_chain::InMemoryChain;
pub use self::logging_submitter::LoggingSubmitter;
