//! Rendering services: directive resolution, type dispatch and renderers.

pub mod allowlist;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod format;
pub mod functions;
pub mod hooks;
pub mod normalize;
pub mod output;
pub mod query;
pub mod renderers;
pub mod repos;
pub mod resolver;
pub mod scope;
pub mod shortcode;
pub mod urls;

#[cfg(test)]
pub(crate) mod test_support;
