//! # disaster-triage - Disaster Response Message Classifier
//!
//! Multi-label classification of short emergency messages into response
//! categories, trained in pure Rust from a SQLite table of labelled messages.
//!
//! ## Features
//!
//! - **Multi-Label**: one independent random forest per category
//! - **TF-IDF Features**: word n-grams over normalized, lemmatized tokens
//! - **Grid Search**: K-fold cross-validated hyperparameter selection
//! - **Deterministic**: every random draw comes from configured seeds, so
//!   parallel and sequential runs produce the same model
//! - **Portable Artifacts**: trained models are plain JSON
//!
//! ## Quick Start
//!
//! ```bash
//! cargo build --release
//! ./target/release/disaster-triage ../data/DisasterResponse.db classifier.json
//! ```
//!
//! ### Text Normalization
//!
//! ```
//! use disaster_triage::text::TextNormalizer;
//!
//! let normalizer = TextNormalizer::english();
//! let tokens = normalizer.normalize("We need water and blankets in the shelters!");
//! assert_eq!(tokens, vec!["need", "water", "blanket", "shelter"]);
//! ```
//!
//! ### Training From Code
//!
//! ```no_run
//! use disaster_triage::training::{config::Config, run_training};
//! use std::path::Path;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load_or_default(Path::new("config.toml"))?;
//!     let outcome = run_training(Path::new("data.db"), Path::new("classifier.json"), &config)?;
//!     println!("Average F1: {:.2}", outcome.evaluation.averages.f1);
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Every fallible operation returns [`error::Result`]. The CLI maps errors to
//! exit codes: `0` success, `2` wrong arguments, `1` any runtime failure.
//!
//! ## Logging
//!
//! Diagnostics go through `tracing`; the binary installs a subscriber writing
//! to stderr, filtered by `RUST_LOG` (default `info`).
//!
//! ## License
//!
//! GNU General Public License v3.0 (GPLv3)

// Core modules
pub mod error;
pub mod forest;
pub mod text;
pub mod training;

// Re-export main types for convenience
pub use error::{Result, TriageError};
pub use text::{Lemmatizer, RuleLemmatizer, StopWords, TextNormalizer};
pub use training::config::Config;
pub use training::predict::load_model;
pub use training::save::{save_model, ModelArtifact};
