//! Core paircrypt types, wire format, and constants.
//!
//! This crate provides:
//! - Session parameters (counter length, named curve, symmetric key length)
//! - Peer identifiers, including the unicast default peer
//! - The JSON envelope that carries ciphertext and its counter block

#![forbid(unsafe_code)]

pub mod envelope;
pub mod params;
pub mod peer;

pub use envelope::{Envelope, EnvelopeError, COUNTER_LEN};
pub use params::{CounterLength, KeyLength, NamedCurve, ParameterError, Parameters};
pub use peer::PeerId;
