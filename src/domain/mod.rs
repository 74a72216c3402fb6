//! Domain layer types mirrored from the database views.

pub mod entities;
