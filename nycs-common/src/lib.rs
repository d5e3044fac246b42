//! # NYC Schools Common Library
//!
//! Shared code for the NYC schools browser including:
//! - School and SAT score data models
//! - Borough code expansion
//! - Configuration loading
//! - Common error types

pub mod config;
pub mod error;
pub mod models;

pub use error::{Error, Result};
pub use models::{Borough, School, ScoreRecord};
