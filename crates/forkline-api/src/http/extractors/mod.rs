//! Request extractors.

pub mod credential;
pub mod rejection;
