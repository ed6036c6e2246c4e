//! Cached, single-flight summaries of YouTube videos produced by an
//! asynchronous summarization service.
//!
//! The entry point is [`services::SummaryOrchestrator`]; [`app::App`] wires
//! one together from a [`config::Config`].

pub mod ai;
pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod format;
pub mod models;
pub mod services;

#[cfg(test)]
mod testing;
