//! Multi-leg itinerary planner for a fly-as-much-as-you-want pass.
//!
//! A web service that answers: "with my pass, how can I get from here to
//! there on this date, changing planes along the way?"

pub mod cache;
pub mod carrier;
pub mod config;
pub mod domain;
pub mod planner;
pub mod web;
