//! End-to-end training run: load, split, search, evaluate, save.

use super::config::Config;
use super::data::load_data;
use super::evaluate::{evaluate_model, print_report, EvaluationReport};
use super::save::{save_model, ModelArtifact};
use super::search::GridSearch;
use crate::error::Result;
use crate::text::TextNormalizer;
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// What a finished run produced, for callers that want more than the file.
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub artifact: ModelArtifact,
    pub evaluation: EvaluationReport,
}

/// Train the disaster message classifier.
///
/// This function orchestrates the entire training pipeline:
/// 1. Load messages and category labels from the SQLite table
/// 2. Split into train and test sets with the configured seed
/// 3. Grid-search the TF-IDF + random forest pipeline on the train set
/// 4. Evaluate the winner on the held-out set and print the reports
/// 5. Save the model artifact to `model_path`
///
/// Each stage starts only after the previous one succeeded, so a failure
/// never leaves a partially trained model on disk.
pub fn run_training(database_path: &Path, model_path: &Path, config: &Config) -> Result<TrainingOutcome> {
    config.validate()?;
    let run_start = Instant::now();

    println!("Loading data...\n    DATABASE: {}", database_path.display());
    let dataset = load_data(database_path, &config.data.table)?;
    let (train, test) = dataset.train_test_split(config.data.test_size, config.data.split_seed)?;
    info!(train = train.len(), test = test.len(), "split dataset");

    println!("Building model...");
    let normalizer = TextNormalizer::english();
    let search = GridSearch {
        grid: config.search.grid(),
        cv_folds: config.search.cv_folds,
        seed: config.model.seed,
        parallel: config.search.parallel,
    };

    println!("Training model...");
    let train_start = Instant::now();
    let result = search.fit(&normalizer, &train.texts(), train.labels.view())?;
    info!(
        elapsed_s = train_start.elapsed().as_secs_f64(),
        "grid search finished"
    );
    println!(
        "    Best parameters: {} (mean CV accuracy {:.4})",
        result.best_params, result.best_score
    );

    println!("Evaluating model...");
    let evaluation = evaluate_model(
        &result.best_pipeline,
        &normalizer,
        &test.texts(),
        test.labels.view(),
        &dataset.category_names,
    )?;
    print_report(&evaluation);

    println!("Saving model...\n    MODEL: {}", model_path.display());
    let artifact = ModelArtifact::new(result, dataset.category_names.clone());
    save_model(&artifact, model_path)?;

    println!("Trained model saved!");
    info!(
        elapsed_s = run_start.elapsed().as_secs_f64(),
        "training run complete"
    );

    Ok(TrainingOutcome {
        artifact,
        evaluation,
    })
}
