//! Disaster Response Message Classifier
//!
//! This module trains a multi-label classifier that tags short emergency
//! messages with the response categories they concern (water, medical help,
//! search and rescue, ...). It combines:
//!
//! - **TF-IDF** (Term Frequency-Inverse Document Frequency) over word n-grams
//! - **Random forests**, one per category, on the sparse TF-IDF rows
//! - **Grid search** with K-fold cross-validation to pick the hyperparameters
//!
//! ## Pipeline
//!
//! ```text
//! SQLite table ─► train/test split ─► normalize ─► CountVectorizer ─► TF-IDF
//!                                                                     │
//!                    save JSON ◄─ evaluate on test ◄─ MultiOutputForest
//! ```
//!
//! Stages run strictly in order and any failure aborts the run before a model
//! file is written.
//!
//! ## Usage
//!
//! ### Training
//!
//! ```bash
//! ./target/release/disaster-triage ../data/DisasterResponse.db classifier.json
//!
//! # With a custom grid
//! ./target/release/disaster-triage data.db classifier.json --config small-grid.toml
//! ```
//!
//! ### As a Library
//!
//! ```rust,no_run
//! use disaster_triage::training::{config::Config, train::run_training};
//! use std::path::Path;
//!
//! let config = Config::default();
//! run_training(Path::new("data.db"), Path::new("classifier.json"), &config)
//!     .expect("Training failed");
//! ```
//!
//! ### Reusing a Saved Model
//!
//! ```rust,no_run
//! use disaster_triage::text::TextNormalizer;
//! use disaster_triage::training::predict::load_model;
//! use std::path::Path;
//!
//! let model = load_model(Path::new("classifier.json")).expect("load failed");
//! let normalizer = TextNormalizer::english();
//! let tags = model.predict_categories(&normalizer, "We need water and tents in Leogane");
//! println!("{:?}", tags);
//! ```
//!
//! ## Configuration
//!
//! Create a `config.toml` file to customize the search:
//!
//! ```toml
//! [data]
//! table = "cleaned_data"
//! test_size = 0.2
//! split_seed = 42
//!
//! [model]
//! seed = 42
//!
//! [search]
//! ngram_ranges = [[1, 1], [1, 2]]
//! n_estimators = [100, 150]
//! min_samples_split = [2, 3, 4]
//! cv_folds = 5
//! parallel = true
//! ```
//!
//! ## Module Structure
//!
//! - [`config`] - Configuration structures and loading
//! - [`data`] - SQLite loading and the train/test split
//! - [`tfidf`] - Count vectorizer and TF-IDF weighting
//! - [`pipeline`] - Vectorizer, weighting and forest fitted as one unit
//! - [`search`] - Grid search with cross-validation
//! - [`evaluate`] - Per-category reports and averages
//! - [`save`] - Model artifact and persistence
//! - [`predict`] - Loading an artifact and predicting
//! - [`train`] - End-to-end training run
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod data;
pub mod evaluate;
pub mod pipeline;
pub mod predict;
pub mod save;
pub mod search;
pub mod tfidf;
pub mod train;

// Re-export commonly used items for external use
pub use cli::run as main_cli;
pub use train::run_training;
