// src/services/mod.rs

pub mod catalog;
pub mod error;
pub mod explainer;
pub mod history;
pub mod session;
pub mod stats;
pub mod users;
