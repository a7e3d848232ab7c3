//! Pong server library.
//!
//! This module exposes the server components for use in tests and binaries.

pub mod config;
pub mod http;
pub mod input;
pub mod match_controller;
pub mod orchestrator;
pub mod physics;
pub mod session;
pub mod tournament;
pub mod ws;
