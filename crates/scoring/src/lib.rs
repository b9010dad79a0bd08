//! Deterministic multi-criteria priority scoring for tasks.
//!
//! This crate provides:
//! - The fixed rubric (urgency, impact, effort, dependencies) in [`rubric`]
//! - Priority classification and justification text in [`classify`]
//! - `ScoringProvider` trait for pluggable external evaluators
//! - `ScoringEngine`, which prefers a provider and silently falls back to the rubric

pub mod classify;
pub mod engine;
pub mod provider;
pub mod providers;
pub mod rubric;

pub use classify::{classify_priority, priority_reason};
pub use engine::ScoringEngine;
pub use provider::{ProviderEvaluation, ScoringProvider, ScoringProviderError};
pub use providers::ollama::OllamaScoringProvider;
pub use rubric::score_task;
