// src/lib.rs — Library root for auditchat

pub mod cli;
pub mod infra;
pub mod protocol;
pub mod session;
pub mod transcript;
pub mod transport;
pub mod util;
