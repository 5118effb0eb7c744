//! Storefront client core.
//!
//! - [`domain`]: the product draft form model and image staging rules.
//! - [`cache`]: keyed query cache with invalidate-on-mutate semantics.
//! - [`application`]: wishlist operations over the cache and the REST API.
//! - [`infra`]: HTTP transport and telemetry bootstrap.
//! - [`config`]: layered settings.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
