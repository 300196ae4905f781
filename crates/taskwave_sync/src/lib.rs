//! # Taskwave Sync
//!
//! Offline mutation sync engine for the Taskwave app.
//!
//! This crate provides:
//! - The application-facing [`SyncCoordinator`] (optimistic local
//!   write, then queue)
//! - The [`SyncQueue`] with its immediate-vs-deferred decision and
//!   bounded retry loop
//! - A [`ConnectivityMonitor`] that drives the queue lifecycle with
//!   explicit events
//! - Trait seams for the remote service and the local read/write store,
//!   with mock/memory implementations for testing
//!
//! ## Architecture
//!
//! A mutation flows **local-first**:
//! 1. The coordinator applies it to the local store synchronously
//! 2. The mutation is wrapped as a pending [`taskwave_model::SyncCommand`]
//! 3. Online, the queue executes it against the remote service at once;
//!    offline, it lands in the durable operation store
//! 4. When connectivity returns, the queue drains the store in creation
//!    order on a fixed interval, retrying each command up to the
//!    configured budget
//!
//! ## Key Invariants
//!
//! - Commands replay in creation order, one at a time
//! - A command is attempted at most `max_retries` times before it is
//!   marked failed and left for inspection
//! - The offline path never touches the network
//! - `stop()` never interrupts an in-flight drain pass

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod connectivity;
mod coordinator;
mod error;
mod events;
mod local;
mod queue;
mod remote;

pub use config::SyncConfig;
pub use connectivity::ConnectivityMonitor;
pub use coordinator::SyncCoordinator;
pub use error::{SyncError, SyncResult};
pub use events::{SyncEvent, SyncEventFeed};
pub use local::{LocalResult, LocalStore, LocalStoreError, MemoryLocalStore};
pub use queue::{SyncQueue, SyncStats};
pub use remote::{MockRemoteService, RemoteCall, RemoteMutationService};
