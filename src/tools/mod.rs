//! Tool-call execution: handler registry, timeout/retry executor, the
//! single-active-call tracker and local chaining.

pub mod chain;
pub mod error;
pub mod executor;
pub mod registry;
pub mod tracker;
pub mod types;

pub use chain::{ChainOutcome, FallbackHandler, ToolChainer};
pub use error::{ToolError, error_codes};
pub use executor::{ExecutionReport, ToolExecutor};
pub use registry::ToolRegistry;
pub use tracker::{Admission, CallTracker, StaleReset};
pub use types::{
    ChainRequest, ChainStep, RetryPolicy, ToolHandler, ToolInvocation, ToolOutput, error_payload,
    success_payload,
};
