//! Quizlink Relay Server Library
//!
//! Core functionality for the Quizlink relay:
//! - Shared application state over the JSON document store
//! - Relay fan-out engine with per-destination best-effort delivery
//! - Outbound Telegram client behind the `MessageSender` seam
//! - HTTP routes for devices (firmware check/download, question polling,
//!   message relay) and admin question management

pub mod relay;
pub mod routes;
pub mod state;
pub mod telegram;
