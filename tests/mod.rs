//! Integration tests for the upload orchestrator
//!
//! Available tests:
//! - basic_usage: End-to-end upload into a directory with a JSON Lines record log
//! - batch_scenarios: Admission, mixed outcomes and batch invariants
//! - cancellation: Cancelling queued and in-flight uploads, clearing the batch
//! - concurrency: Concurrency limit, call timeouts and progress subscription
//! - thread_safety: Send/Sync guarantees for multi-threaded runtimes

pub mod batch_scenarios;
