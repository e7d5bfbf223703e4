//! flight-bot - A Slack bot that keeps live flight cards up to date.
//!
//! This crate provides:
//! - A flight data client with a structured endpoint and a share page fallback
//! - A reconciliation engine refreshing every stale tracked flight
//! - Slack slash command and card interaction handling

pub mod bot;
pub mod config;
pub mod error;
pub mod flight;
pub mod logging;
pub mod model;
pub mod notifier;
pub mod render;
pub mod repository;
pub mod service;
pub mod task;
