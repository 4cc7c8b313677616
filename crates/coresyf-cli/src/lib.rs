//! coresyf CLI library: exposes the command handlers for testing

pub mod commands;
pub mod common;
pub mod errors;

pub use common::GlobalOpts;
pub use coresyf_logger as logger;
