//! Embedded templates for phoenix files.

/// Default `phoenix.toml` configuration.
pub(crate) const PHOENIX_TOML: &str = include_str!("phoenix.toml");

/// Dockerfile for the sandbox image.
pub(crate) const SANDBOX_DOCKERFILE: &str = include_str!("Dockerfile.sandbox");
