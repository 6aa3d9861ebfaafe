// Host-facing API surface for the app runtime.

pub mod simple;
pub mod tunnel_api;
