//! Trove: a JSON data service for a game companion, with a version-gated
//! read-through cache in front of the upstream views.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
