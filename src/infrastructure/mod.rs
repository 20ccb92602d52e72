//! Infrastructure layer - External service adapters

pub mod telephony;
