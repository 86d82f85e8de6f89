pub mod cache;
pub mod config;
pub mod errors;
pub mod events;
pub mod fingerprint;
pub mod hub;
pub mod lookup;
pub mod scan;
pub mod scout;
pub mod types;
