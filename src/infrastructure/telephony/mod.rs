//! Telephony provider integration

pub mod client;
pub mod twiml;

pub use client::{CallControlClient, CreateCallRequest, CreatedCall, HttpCallControlClient};
pub use twiml::{ConferenceOptions, DialOptions, VoiceResponse};
