//! Bazaar server library
//!
//! Freelancer marketplace backend: REST API, subscription feature gate,
//! payment intents and the realtime messaging relay.

pub mod api;
pub mod auth;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod model;
pub mod service;
pub mod startup;
pub mod ws;
