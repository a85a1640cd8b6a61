pub mod capability;
pub mod config;
pub mod contract;
pub mod error;
pub mod fragment_kind;
pub mod ids;
pub mod message;
pub mod nl_wire;
pub mod trace;

pub use error::{Error, Result};
