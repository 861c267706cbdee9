//! Céleste: an in-process multi-agent orchestration engine.
//!
//! A shopping query runs through a fixed pipeline of agents (search,
//! inventory, recommendation) held in an [`registry::AgentRegistry`], with
//! per-user state in a [`context::ContextStore`] and a bounded
//! [`bus::MessageBus`] for fire-and-forget notifications.

pub mod agents;
pub mod api;
pub mod bus;
pub mod config;
pub mod context;
pub mod error;
pub mod llm;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod registry;
pub mod workflow;

pub use workflow::Orchestrator;
