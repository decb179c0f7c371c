// src/config/mod.rs
pub mod poll;

pub use poll::PollConfig;
