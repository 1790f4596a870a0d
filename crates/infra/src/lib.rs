//! Infrastructure layer: event store, command pipeline, application services,
//! configuration and the audit logger.

pub mod audit;
pub mod command_dispatcher;
pub mod config;
pub mod event_store;
pub mod services;

#[cfg(test)]
mod integration_tests;
