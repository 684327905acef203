// src/billing/mod.rs — Billing summary generation for finalized sessions

pub mod classify;
pub mod summary;

pub use summary::SummaryGenerator;
