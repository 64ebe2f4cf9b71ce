//! Unit tests for plugin-setup
//!
//! These tests use mocked dependencies and run fast without external I/O.

mod config_store;
mod database_admin;
mod helpers;
mod pipeline_service;
mod user_provisioning;
