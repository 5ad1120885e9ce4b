//! StudyVault Server Library
//!
//! This crate exposes the server's modules for integration testing.
//! The binary entry point is in main.rs.
//!
//! # Modules
//!
//! - `sync`: the pull/push/status protocol (watermarks, device registry,
//!   audit log)
//! - `store`: the tabular store capability and its SQLite and in-memory
//!   implementations
//! - `routes`: HTTP surface (sync, devices, and the CRUD routers)
//! - `auth`: bearer-token verification and middleware

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod state;
pub mod store;
pub mod sync;
