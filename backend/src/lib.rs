//! # SASI Backend
//!
//! Map backend for the energy-fraud inspection selection system.
//!
//! Analysts browse statewide inspection targets (main queries) on a map,
//! select an area by municipality or by drawing a polygon, overlay contextual
//! datasets (auxiliary queries) inside it, read aggregate area metrics, and
//! record an inspection status per installation.
//!
//! ## Architecture
//!
//! - [`models`]: Domain types, GeoJSON geometry and area selection
//! - [`api`]: GeoJSON response payloads consumed by the front end
//! - [`db`]: Repository traits, Postgres/PostGIS and in-memory backends, services
//! - [`config`]: Server configuration from the environment
//! - [`http`]: Axum-based HTTP server and request handlers

// Allow large error types - RepositoryError contains rich context for debugging
#![allow(clippy::result_large_err)]

pub mod api;
pub mod config;
pub mod db;
pub mod models;

#[cfg(feature = "http-server")]
pub mod http;
