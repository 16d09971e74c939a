//! Database models split into domain-specific modules.

pub mod common;
pub mod dtr_log;
pub mod profile;
pub mod user;

pub use common::*;
pub use dtr_log::*;
pub use profile::*;
pub use user::*;
