// src/lib.rs — Library root for timeslip

pub mod api;
pub mod billing;
pub mod cli;
pub mod infra;
pub mod integrations;
pub mod provider;
pub mod session;
pub mod tracker;
pub mod util;
