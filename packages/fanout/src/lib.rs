#[macro_use]
extern crate tracing;

mod signal;

pub use crate::signal::api::*;
