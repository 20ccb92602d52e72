//! Interface layer - External interfaces (REST API, WebSocket)

pub mod api;
