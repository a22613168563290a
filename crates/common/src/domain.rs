mod event;
mod result;
mod submit_log;

pub use event::*;
pub use result::*;
pub use submit_log::*;
