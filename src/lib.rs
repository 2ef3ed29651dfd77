//! Operations tooling for the client directory.
//!
//! The library backs the `clientops-tools` binary and its tests. Pure logic
//! lives in [`reconcile`] (folder/record matching), [`directory`] (sheet row
//! planning), [`blueprint`] (workflow document rewriting) and [`migration`]
//! (SQL generation). External systems sit behind the adapters in [`io`] and
//! [`auth`], and [`pipeline`] wires the two together for each subcommand.

pub mod auth;
pub mod blueprint;
pub mod config;
pub mod directory;
pub mod error;
pub mod io;
pub mod logging;
pub mod migration;
pub mod model;
pub mod pipeline;
pub mod reconcile;
pub mod report;

pub use error::{Result, ToolError};
