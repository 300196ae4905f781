//! # Taskwave Model
//!
//! Domain and sync-command types shared by the Taskwave sync engine.
//!
//! This crate provides:
//! - Entity snapshots (`TodoSnapshot`, `TagSnapshot`)
//! - The closed mutation union (`MutationOperation`)
//! - Sync command lifecycle types (`SyncCommand`, `CommandStatus`)
//! - The closed outcome union (`MutationOutcome`)
//! - CBOR encoding for durable records
//!
//! ## Key Invariants
//!
//! - A mutation carries a full snapshot of the entity, never a diff, so
//!   replay is possible without re-reading current domain state
//! - A command id is assigned at creation and never changes
//! - `CommandStatus::InProgress` is transient and never persisted

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod command;
mod error;
mod operation;
mod outcome;
mod snapshot;

pub use command::{unix_millis, CommandId, CommandStatus, SyncCommand};
pub use error::{ModelError, ModelResult};
pub use operation::{MutationOperation, OperationKind};
pub use outcome::MutationOutcome;
pub use snapshot::{TagSnapshot, TodoSnapshot};
