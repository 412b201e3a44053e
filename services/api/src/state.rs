//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds all shared,
//! clonable resources like the database pool wrapper and the assistant
//! client.

use crate::config::Config;
use sahay_core::assistant::AssistantClient;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
/// All fields are public to be accessible from other modules.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<crate::db::Db>,
    pub assistant_client: Arc<dyn AssistantClient>,
    pub config: Arc<Config>,
}
