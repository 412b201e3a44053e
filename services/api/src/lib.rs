//! Sahay API Library Crate
//!
//! This library contains all the core logic for the Sahay web service:
//! application state, database access, REST handlers, the WebSocket tutorial
//! channel, and routing. The `api` binary is a thin wrapper around it.

pub mod config;
pub mod db;
pub mod handlers;
pub mod models;
pub mod router;
pub mod state;
pub mod ws;
