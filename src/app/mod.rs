//! Application module

pub mod args;
pub mod config;
pub mod startup;
