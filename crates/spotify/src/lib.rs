//! Playback provider client for the Spotify Web API.
//!
//! Thin HTTP wrapper, but its error taxonomy is load-bearing: the
//! reconciliation engine's refresh/retry/abort decisions key off the
//! mapping done here (429 → rate limited, 401 → unauthorized,
//! `invalid_grant` from the token endpoint → terminal).

pub mod client;
pub mod wire;

pub use client::SpotifyClient;
