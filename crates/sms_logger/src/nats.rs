mod conversions;
mod pdu;
mod sms_log_consumer_service;

pub use conversions::*;
pub use pdu::*;
pub use sms_log_consumer_service::*;
