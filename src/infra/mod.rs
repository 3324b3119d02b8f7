//! Infrastructure adapters and runtime bootstrap.

pub mod db;
pub mod error;
pub mod kv;
pub mod telemetry;
