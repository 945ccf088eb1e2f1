//! Veilpress - A multi-author blog with request-gated posts
//!
//! Authors publish posts that are either public or hidden. Readers of a
//! hidden post see a teaser until the author approves their access request.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
