//! In-memory mock transport for exercising the mirror without a remote
//! layer.
//!
//! [`MockTransport`] plays the naming service: addresses map to
//! [`MockNaming`] contexts holding scripted bindings, and the object mocks
//! ([`MockComponent`], [`MockManager`], [`MockEc`], [`MockConfiguration`])
//! implement the transport capability traits with call counters and failure
//! toggles, so tests can assert exactly which remote fetches a tree
//! operation performed.

mod naming;
mod objects;

pub use naming::{MockNaming, MockTransport};
pub use objects::{
    MockComponent, MockConfiguration, MockEc, MockManager, MockObject, NarrowFailure,
};

/// Initialize test logging once; respects `RUST_LOG`.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
