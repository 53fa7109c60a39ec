//! Model evaluation and results reporting.

use super::pipeline::Pipeline;
use crate::error::{Result, TriageError};
use crate::text::TextNormalizer;
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Precision, recall, F1 and support for one class (or one average row).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Per-class metrics for one binary category, in the familiar
/// `classification_report` layout.
///
/// Only classes that occur in the truth or the predictions get a row, so a
/// category that is never positive reports class `0` alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub classes: Vec<(u8, ClassMetrics)>,
    pub accuracy: f64,
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

impl ClassificationReport {
    pub fn from_labels(truth: ArrayView1<u8>, predicted: ArrayView1<u8>) -> Self {
        let total = truth.len();
        let mut present = [false; 2];
        for &v in truth.iter().chain(predicted.iter()) {
            present[usize::from(v.min(1))] = true;
        }

        let correct = truth
            .iter()
            .zip(predicted.iter())
            .filter(|(t, p)| t == p)
            .count();

        let classes: Vec<(u8, ClassMetrics)> = (0u8..2)
            .filter(|&c| present[usize::from(c)])
            .map(|class| {
                let mut tp = 0;
                let mut predicted_pos = 0;
                let mut support = 0;
                for (&t, &p) in truth.iter().zip(predicted.iter()) {
                    let (t, p) = (t.min(1), p.min(1));
                    if p == class {
                        predicted_pos += 1;
                    }
                    if t == class {
                        support += 1;
                        if p == class {
                            tp += 1;
                        }
                    }
                }
                let precision = ratio(tp, predicted_pos);
                let recall = ratio(tp, support);
                let f1 = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };
                (
                    class,
                    ClassMetrics {
                        precision,
                        recall,
                        f1,
                        support,
                    },
                )
            })
            .collect();

        let n_classes = classes.len().max(1) as f64;
        let mut macro_avg = ClassMetrics {
            support: total,
            ..ClassMetrics::default()
        };
        let mut weighted_avg = macro_avg;
        for (_, m) in &classes {
            macro_avg.precision += m.precision / n_classes;
            macro_avg.recall += m.recall / n_classes;
            macro_avg.f1 += m.f1 / n_classes;

            let weight = ratio(m.support, total);
            weighted_avg.precision += m.precision * weight;
            weighted_avg.recall += m.recall * weight;
            weighted_avg.f1 += m.f1 * weight;
        }

        ClassificationReport {
            classes,
            accuracy: ratio(correct, total),
            macro_avg,
            weighted_avg,
        }
    }
}

fn write_row(f: &mut fmt::Formatter<'_>, name: &str, m: &ClassMetrics) -> fmt::Result {
    writeln!(
        f,
        "{:>12}  {:>9.2} {:>9.2} {:>9.2} {:>9}",
        name, m.precision, m.recall, m.f1, m.support
    )
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:>12}  {:>9} {:>9} {:>9} {:>9}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        writeln!(f)?;
        for (class, m) in &self.classes {
            write_row(f, &class.to_string(), m)?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>12}  {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy", "", "", self.accuracy, self.macro_avg.support
        )?;
        write_row(f, "macro avg", &self.macro_avg)?;
        write_row(f, "weighted avg", &self.weighted_avg)
    }
}

/// Report for one named category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryReport {
    pub name: String,
    pub report: ClassificationReport,
}

/// Unweighted means over categories.
///
/// Precision, recall and F1 come from each category's weighted-average row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AverageMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationReport {
    pub predictions: Array2<u8>,
    pub categories: Vec<CategoryReport>,
    pub averages: AverageMetrics,
}

/// Score a prediction matrix against the truth, column by column.
pub fn score_predictions(
    truth: ArrayView2<u8>,
    predicted: ArrayView2<u8>,
    category_names: &[String],
) -> Result<Vec<CategoryReport>> {
    if truth.dim() != predicted.dim() {
        return Err(TriageError::fit(format!(
            "truth is {:?} but predictions are {:?}",
            truth.dim(),
            predicted.dim()
        )));
    }
    if truth.ncols() != category_names.len() {
        return Err(TriageError::fit(format!(
            "{} label columns but {} category names",
            truth.ncols(),
            category_names.len()
        )));
    }

    Ok(category_names
        .iter()
        .zip(truth.axis_iter(Axis(1)).zip(predicted.axis_iter(Axis(1))))
        .map(|(name, (t, p))| CategoryReport {
            name: name.clone(),
            report: ClassificationReport::from_labels(t, p),
        })
        .collect())
}

pub fn average_metrics(categories: &[CategoryReport]) -> AverageMetrics {
    if categories.is_empty() {
        return AverageMetrics::default();
    }
    let n = categories.len() as f64;
    let mut avg = AverageMetrics::default();
    for c in categories {
        avg.accuracy += c.report.accuracy;
        avg.precision += c.report.weighted_avg.precision;
        avg.recall += c.report.weighted_avg.recall;
        avg.f1 += c.report.weighted_avg.f1;
    }
    AverageMetrics {
        accuracy: avg.accuracy / n,
        precision: avg.precision / n,
        recall: avg.recall / n,
        f1: avg.f1 / n,
    }
}

/// Predict the held-out texts and score every category.
pub fn evaluate_model(
    pipeline: &Pipeline,
    normalizer: &TextNormalizer,
    texts: &[String],
    labels: ArrayView2<u8>,
    category_names: &[String],
) -> Result<EvaluationReport> {
    if texts.is_empty() {
        return Err(TriageError::fit("no held-out rows to evaluate"));
    }
    if texts.len() != labels.nrows() {
        return Err(TriageError::fit(format!(
            "{} held-out texts but {} label rows",
            texts.len(),
            labels.nrows()
        )));
    }

    let predictions = pipeline.predict(normalizer, texts);
    let categories = score_predictions(labels, predictions.view(), category_names)?;
    let averages = average_metrics(&categories);

    Ok(EvaluationReport {
        predictions,
        categories,
        averages,
    })
}

/// Print every category report followed by the averages.
pub fn print_report(report: &EvaluationReport) {
    for category in &report.categories {
        println!("{}", category.name);
        println!("{}", category.report);
    }
    println!("Average of each metric over all categories:");
    println!("Average accuracy: {:.2}", report.averages.accuracy);
    println!("Average precision: {:.2}", report.averages.precision);
    println!("Average recall: {:.2}", report.averages.recall);
    println!("Average f1_score: {:.2}", report.averages.f1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn test_binary_report_values() {
        let truth = array![1u8, 1, 0, 0];
        let pred = array![1u8, 0, 0, 0];
        let r = ClassificationReport::from_labels(truth.view(), pred.view());

        assert_eq!(r.classes.len(), 2);
        let (_, zero) = r.classes[0];
        let (_, one) = r.classes[1];
        assert!(close(zero.precision, 2.0 / 3.0));
        assert!(close(zero.recall, 1.0));
        assert!(close(zero.f1, 0.8));
        assert_eq!(zero.support, 2);
        assert!(close(one.precision, 1.0));
        assert!(close(one.recall, 0.5));
        assert!(close(one.f1, 2.0 / 3.0));
        assert!(close(r.accuracy, 0.75));
        assert!(close(r.weighted_avg.f1, (0.8 + 2.0 / 3.0) / 2.0));
        assert_eq!(r.weighted_avg.support, 4);
    }

    #[test]
    fn test_zero_division_yields_zero() {
        let truth = array![1u8, 1, 0];
        let pred = array![0u8, 0, 0];
        let r = ClassificationReport::from_labels(truth.view(), pred.view());
        let (class, one) = r.classes[1];
        assert_eq!(class, 1);
        assert_eq!(one.precision, 0.0);
        assert_eq!(one.f1, 0.0);
    }

    #[test]
    fn test_absent_positive_class_has_no_row() {
        let truth = array![0u8, 0, 0];
        let r = ClassificationReport::from_labels(truth.view(), truth.view());
        assert_eq!(r.classes.len(), 1);
        assert_eq!(r.macro_avg.precision, 1.0);
        assert_eq!(r.accuracy, 1.0);
    }

    #[test]
    fn test_majority_prediction_accuracy_is_majority_share() {
        let truth = array![[0u8], [0], [0], [1], [0]];
        let pred = Array2::<u8>::zeros((5, 1));
        let reports = score_predictions(truth.view(), pred.view(), &["aid_related".to_string()]).unwrap();
        assert!(close(reports[0].report.accuracy, 0.8));
    }

    #[test]
    fn test_averages_are_unweighted_category_means() {
        let names = vec!["water".to_string(), "fire".to_string()];
        let truth = array![[1u8, 0], [1, 1], [0, 0], [0, 1]];
        let pred = array![[1u8, 0], [0, 1], [0, 0], [0, 0]];
        let reports = score_predictions(truth.view(), pred.view(), &names).unwrap();
        let avg = average_metrics(&reports);

        // Both columns have the same confusion counts: class 0 has precision
        // 2/3, recall 1, F1 0.8; class 1 has precision 1, recall 1/2, F1 2/3.
        // Each class has support 2.
        assert!(close(avg.accuracy, 0.75));
        assert!(close(avg.precision, 5.0 / 6.0));
        assert!(close(avg.recall, 0.75));
        assert!(close(avg.f1, (0.8 + 2.0 / 3.0) / 2.0));
        assert_eq!(reports[0].name, "water");
        assert_eq!(reports[1].name, "fire");
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let truth = array![[1u8, 0]];
        let pred = array![[1u8]];
        assert!(score_predictions(truth.view(), pred.view(), &["a".to_string()]).is_err());
    }

    #[test]
    fn test_report_layout() {
        let truth = array![1u8, 0];
        let text = ClassificationReport::from_labels(truth.view(), truth.view()).to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "              precision    recall  f1-score   support");
        assert_eq!(lines[2], "           0       1.00      1.00      1.00         1");
        assert_eq!(lines[5], "    accuracy                           1.00         2");
        assert_eq!(lines[7], "weighted avg       1.00      1.00      1.00         2");
    }
}
