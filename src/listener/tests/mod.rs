//! Test modules for the listener system

mod lifecycle;
mod utils;
