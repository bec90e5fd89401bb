//! Extension contracts for outbound directory requests.

pub mod request_signer;

pub use request_signer::*;
