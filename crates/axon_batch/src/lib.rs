//! Batch Executor
//!
//! Applies one transduction contract across many source instances
//! concurrently (map) and aggregates collections of results into fewer
//! structured outputs (reduce), without weakening any single-call
//! guarantee:
//!
//! - **Order**: outcomes are positionally aligned with the input,
//!   regardless of completion order
//! - **Isolation**: elements are independent; one element's failure is
//!   recorded at its position and affects nothing else
//! - **Bounded**: concurrency is a caller-supplied policy, never unbounded
//! - **Cancellable**: a cooperative token stops the batch best-effort;
//!   finished positions are retained, unfinished ones become `Cancelled`
//!
//! # Modules
//!
//! - [`executor`]: `map`, `reduce`, `reduce_windowed`, outcomes and policy
//! - [`cancel`]: the cooperative `CancellationToken`

pub mod cancel;
pub mod executor;

pub use cancel::CancellationToken;
pub use executor::{
    map, reduce, reduce_windowed, BatchResult, ExecutionPolicy, Outcome, DEFAULT_CONCURRENCY,
};
