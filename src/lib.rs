//! Multi-pass AI code review.
//!
//! The pipeline: discover and read files ([`files`]), estimate tokens
//! ([`tokens`]), plan passes against the model's context window
//! ([`planner`]), then run the passes with a carried context
//! ([`orchestrator`], [`context`]) while accounting for cost ([`cost`]).

pub mod config;
pub mod context;
pub mod cost;
pub mod errors;
pub mod files;
pub mod models;
pub mod orchestrator;
pub mod output;
pub mod planner;
pub mod prompts;
pub mod providers;
pub mod review;
pub mod review_config;
pub mod tokens;
pub mod ui;
pub mod util;
