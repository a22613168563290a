pub mod domain;
pub mod nats;
pub mod sms_logger;

pub use domain::*;
pub use nats::*;
pub use sms_logger::*;
