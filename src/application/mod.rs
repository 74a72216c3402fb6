//! Application services layer.

mod cached;

pub mod catalog;
pub mod economy;
pub mod error;
pub mod metadata;
pub mod repos;
