//! Database pool initialization

mod init;

pub use init::*;
