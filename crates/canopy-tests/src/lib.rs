//! Canopy Tests - Integration harness for the naming service.
//!
//! Provides an in-process naming service bound to ephemeral ports and mock
//! storage replicas that record every command the naming core issues.

#![deny(unsafe_code)]

pub mod harness;
pub mod storage;

pub use harness::TestCluster;
pub use storage::{MockStorage, ReceivedCommand};

/// Initialize tracing for tests.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("canopy_tests=debug,canopy_naming=debug,canopy_fleet=debug")
        .with_test_writer()
        .try_init();
}
