//! Network-facing plumbing for the ingestion core: range-sync target
//! selection, coupling of by-range block and sidecar responses, and the
//! req/resp handlers serving history with fork-digest framing.

pub mod fork_context;
pub mod rpc;
pub mod sync;

pub use fork_context::{ForkContext, ForkDigest};
