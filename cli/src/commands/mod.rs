//! Command implementations

pub mod config;
pub mod install;
pub mod mongodb;
pub mod oracle;
pub mod postgres;
pub mod version;
