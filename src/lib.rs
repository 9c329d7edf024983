//! Realtime polling service: clients connect over a WebSocket, request a
//! random poll or question, and cast votes that atomically increment
//! per-option counters.
//!
//! The core is [`engine::VoteEngine`], which is storage-agnostic over the
//! [`store::PollStore`] trait; [`db::Database`] is the SQLite-backed store
//! and [`gateway::Gateway`] the transport in front of it.

pub mod config;
pub mod db;
pub mod engine;
pub mod gateway;
pub mod models;
pub mod store;
