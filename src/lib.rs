//! Weft: `{alias:param}` directives, `[weft]` shortcodes and a cache-aside
//! layer for rendering dynamic site content.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod util;
