mod listener;
mod protocol;

pub use listener::DsListener;
pub use protocol::{DsFrame, DsMessage};
