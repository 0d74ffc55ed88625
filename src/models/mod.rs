// src/models/mod.rs

pub mod exam;
pub mod explainer;
pub mod history;
pub mod question;
pub mod session;
pub mod stats;
pub mod user;
