pub mod forwarder;

pub use forwarder::*;
