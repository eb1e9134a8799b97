//! stagesync library
//!
//! Staged transfer of experiment session data: fetch from the acquisition
//! host, sync to the remote archive, keep a local copy until it ages out.

pub mod cli;
pub mod command;
pub mod config;
pub mod connectivity;
pub mod copy;
pub mod credentials;
pub mod endpoint;
pub mod error;
pub mod log;
pub mod logger;
pub mod mount;
pub mod paths;
pub mod pipeline;
pub mod progress;
pub mod state;
pub mod sweep;
pub mod transport;

pub use error::{Result, TransferError};
pub use paths::{session_directory, DataLayout, SessionId};
pub use pipeline::{SyncReceipt, Uploader};
pub use state::SessionState;
