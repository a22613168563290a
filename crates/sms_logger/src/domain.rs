mod billing;
mod classifier;
mod correlation_service;
mod correlation_store;
mod encoding;
mod reassembler;

pub use billing::*;
pub use classifier::*;
pub use correlation_service::*;
pub use correlation_store::*;
pub use encoding::*;
pub use reassembler::*;
