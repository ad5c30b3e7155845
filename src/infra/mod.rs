//! Infrastructure adapters and runtime bootstrap.

pub mod catalog;
pub mod db;
pub mod error;
pub mod http;
pub mod rest;
pub mod telemetry;
