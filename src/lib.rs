//! # Giveaway Bot
//!
//! A Telegram bot and JSON API for running community giveaways and
//! tournaments.
//!
//! ## Features
//! - Giveaways with prizes, one entry per user, and a cryptographically
//!   shuffled draw
//! - Tournament registration with a sign-up form and open/closed toggle
//! - Channel announcements and per-participant result notifications
//! - SQLite, PostgreSQL or a Replit-style key-value store as storage

/// Chat commands and callback handling
pub mod bot;
/// Configuration loaded from the environment
pub mod config;
/// Storage backends, models and migrations
pub mod database;
/// Participation, draws, notifications and bot supervision
pub mod services;
/// Date, validation, markdown and logging helpers
pub mod utils;
/// HTTP API used by the web app
pub mod web;
