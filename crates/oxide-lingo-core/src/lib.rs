#![deny(missing_docs)]
//! Oxide Lingo core library.
//!
//! Vocabulary persistence, model reply parsing, rate limiting and the
//! assistant pipeline that ties them together. Nothing in here knows about
//! a chat platform.

/// Assistant pipeline (rate limit, model call, parse, persist, cache).
pub mod assistant;
/// Configuration management.
pub mod config;
/// Manual dictionary input parsing.
pub mod dictionary_input;
/// Flashcard export.
pub mod export;
/// Model service and providers.
pub mod llm;
/// Structured model reply parser.
pub mod parser;
/// System prompts sent to the model.
pub mod prompts;
/// Per-subject daily rate limiting.
pub mod rate_limit;
/// Refreshable answer cache.
pub mod response_cache;
/// Storage layer (line records on disk, vocabulary store).
pub mod storage;
/// Utility functions.
pub mod utils;

