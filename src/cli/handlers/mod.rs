//! Command handlers, kept apart from parsing and validation

pub mod serve;

pub use serve::ServeCommandHandler;
