//! Storage module for persistent engine state.
//!
//! ## Backends
//!
//! - **InMemoryStore**: ephemeral storage for tests and dry runs
//! - **FileStore**: JSON file-based persistence
//!
//! ## Usage
//!
//! ```rust,ignore
//! use colledger::storage::{FileStore, StateManager};
//!
//! let manager = StateManager::new(FileStore::new("/var/lib/colledger")?);
//! manager.save_ledger(controller.ledger(), now)?;
//! manager.flush()?;
//! ```

pub mod backend;
pub mod state;

pub use backend::*;
pub use state::*;
