// src/handlers/mod.rs

pub mod exams;
pub mod explainer;
pub mod health;
pub mod history;
pub mod sessions;
pub mod stats;
