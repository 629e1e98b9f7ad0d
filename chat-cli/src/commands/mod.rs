//! CLI command implementations.

pub mod chat;
pub mod history;
pub mod login;
pub mod logout;
pub mod status;
