//! Scenario runner: generate data, split, resample or transform, fit, score.

use tracing::info;

use crate::anomaly::{to_class_labels, IsolationForest, OneClassSvm, OutlierDetector};
use crate::config::ExperimentConfig;
use crate::error::{Error, Result};
use crate::metrics::{accuracy, balanced_accuracy, precision_recall_f1, ClassScores};
use crate::model::boosting::AdaBoost;
use crate::model::forest::{Bagging, RandomForest};
use crate::model::knn::KNearestNeighbors;
use crate::model::linear::LogisticRegression;
use crate::model::stacking::Stacking;
use crate::model::tree::{DecisionTree, MaxFeatures};
use crate::model::{ClassWeight, Model};
use crate::parsing::split::train_test_split;
use crate::parsing::synthetic::make_classification;
use crate::parsing::Dataset;
use crate::preprocessing::StandardScaler;
use crate::resample::{
    Adasyn, ClusterCentroids, RandomOverSampler, RandomUnderSampler, Resampler, Smote, TomekLinks,
};

/// One experiment: a technique applied to one of the two synthetic datasets
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scenario {
    UnderSampling,
    OverSampling,
    Smote,
    Adasyn,
    TomekLinks,
    ClusterCentroids,
    CostSensitive,
    OneClassSvm,
    IsolationForest,
    Bagging,
    RandomForest,
    #[value(name = "adaboost")]
    AdaBoost,
    Stacking,
}

impl Scenario {
    pub const ALL: [Scenario; 13] = [
        Scenario::UnderSampling,
        Scenario::OverSampling,
        Scenario::Smote,
        Scenario::Adasyn,
        Scenario::TomekLinks,
        Scenario::ClusterCentroids,
        Scenario::CostSensitive,
        Scenario::OneClassSvm,
        Scenario::IsolationForest,
        Scenario::Bagging,
        Scenario::RandomForest,
        Scenario::AdaBoost,
        Scenario::Stacking,
    ];

    /// Text printed in front of the accuracy
    pub fn label(self) -> &'static str {
        match self {
            Scenario::UnderSampling => "Accuracy after under-sampling",
            Scenario::OverSampling => "Accuracy after over-sampling",
            Scenario::Smote => "Accuracy after SMOTE",
            Scenario::Adasyn => "Accuracy after ADASYN",
            Scenario::TomekLinks => "Accuracy after Tomek Links",
            Scenario::ClusterCentroids => "Accuracy after Cluster Centroids",
            Scenario::CostSensitive => "Accuracy with cost-sensitive learning",
            Scenario::OneClassSvm => "Accuracy with One-Class SVM",
            Scenario::IsolationForest => "Accuracy with Isolation Forest",
            Scenario::Bagging => "Bagging accuracy",
            Scenario::RandomForest => "Random Forest accuracy",
            Scenario::AdaBoost => "AdaBoost accuracy",
            Scenario::Stacking => "Stacking accuracy",
        }
    }

    /// Whether the scenario runs on the imbalanced dataset
    pub fn is_imbalanced(self) -> bool {
        !matches!(
            self,
            Scenario::Bagging | Scenario::RandomForest | Scenario::AdaBoost | Scenario::Stacking
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioOutcome {
    pub scenario: Scenario,
    pub accuracy: f64,
    pub train_rows: usize,
    /// Rows the final estimator was fitted on, after any resampling
    pub fitted_rows: usize,
    pub test_rows: usize,
}

/// Resamplers selectable for a user-supplied dataset
#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ResamplerKind {
    #[default]
    #[value(name = "none")]
    Passthrough,
    RandomUnder,
    RandomOver,
    Smote,
    Adasyn,
    TomekLinks,
    ClusterCentroids,
}

/// Classifiers selectable for a user-supplied dataset
#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ClassifierKind {
    #[default]
    RandomForest,
    Bagging,
    #[value(name = "adaboost")]
    AdaBoost,
    DecisionTree,
    LogisticRegression,
    /// Logistic regression weighted by `ClassWeight::Balanced`
    BalancedLogisticRegression,
    Knn,
    Stacking,
}

pub fn build_resampler(
    kind: ResamplerKind,
    config: &ExperimentConfig,
) -> Option<Box<dyn Resampler>> {
    let seed = config.seed;

    match kind {
        ResamplerKind::Passthrough => None,
        ResamplerKind::RandomUnder => Some(Box::new(RandomUnderSampler::new(seed))),
        ResamplerKind::RandomOver => Some(Box::new(RandomOverSampler::new(seed))),
        ResamplerKind::Smote => Some(Box::new(Smote::new(config.models.smote_neighbors, seed))),
        ResamplerKind::Adasyn => Some(Box::new(Adasyn::new(config.models.adasyn_neighbors, seed))),
        ResamplerKind::TomekLinks => Some(Box::new(TomekLinks::new())),
        ResamplerKind::ClusterCentroids => Some(Box::new(ClusterCentroids::new(seed))),
    }
}

pub fn build_classifier(kind: ClassifierKind, config: &ExperimentConfig) -> Box<dyn Model> {
    let seed = config.seed;
    let models = &config.models;

    match kind {
        ClassifierKind::RandomForest => Box::new(RandomForest::new(models.forest_estimators, seed)),
        ClassifierKind::Bagging => Box::new(Bagging::new(models.bagging_estimators, seed)),
        ClassifierKind::AdaBoost => Box::new(AdaBoost::new(
            models.adaboost_estimators,
            models.adaboost_learning_rate,
            seed,
        )),
        ClassifierKind::DecisionTree => Box::new(DecisionTree::new(None, MaxFeatures::All, seed)),
        ClassifierKind::LogisticRegression => Box::new(LogisticRegression::default()),
        ClassifierKind::BalancedLogisticRegression => {
            Box::new(LogisticRegression::default().with_class_weight(ClassWeight::Balanced))
        }
        ClassifierKind::Knn => Box::new(KNearestNeighbors::new(models.knn_neighbors)),
        ClassifierKind::Stacking => {
            let mut stacking = Stacking::new(vec![
                Box::new(RandomForest::new(models.forest_estimators, seed)),
                Box::new(KNearestNeighbors::new(models.knn_neighbors)),
                Box::new(DecisionTree::new(None, MaxFeatures::All, seed)),
            ]);
            stacking.cv = models.stacking_cv;
            Box::new(stacking)
        }
    }
}

/// Scores of one resample-fit-predict run
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineReport {
    pub accuracy: f64,
    pub balanced_accuracy: f64,
    pub per_class: Vec<ClassScores>,
    pub train_rows: usize,
    pub fitted_rows: usize,
    pub test_rows: usize,
}

/// Resample `train` (optionally), fit `model` on it and score on `test`
pub fn fit_and_score(
    train: &Dataset,
    test: &Dataset,
    resampler: Option<&dyn Resampler>,
    model: &mut dyn Model,
) -> Result<PipelineReport> {
    let fitted = match resampler {
        Some(resampler) => {
            let resampled = resampler.fit_resample(train)?;
            info!(
                resampler = resampler.name(),
                before = train.len(),
                after = resampled.len(),
                "Resampled training set"
            );
            resampled
        }
        None => train.clone(),
    };

    model.fit(&fitted)?;
    let predictions = model.predict(&test.data.view())?;
    info!(model = model.name(), rows = fitted.len(), "Fitted model");

    Ok(PipelineReport {
        accuracy: accuracy(&test.target, &predictions)?,
        balanced_accuracy: balanced_accuracy(&test.target, &predictions)?,
        per_class: precision_recall_f1(&test.target, &predictions)?,
        train_rows: train.len(),
        fitted_rows: fitted.len(),
        test_rows: test.len(),
    })
}

/// Split a user dataset and run one resampler / classifier combination on it
pub fn run_pipeline(
    dataset: &Dataset,
    resampler: ResamplerKind,
    classifier: ClassifierKind,
    config: &ExperimentConfig,
    stratify: bool,
) -> Result<PipelineReport> {
    let (train, test) = train_test_split(dataset, config.test_size, config.seed, stratify)?;
    let resampler = build_resampler(resampler, config);
    let mut model = build_classifier(classifier, config);

    fit_and_score(&train, &test, resampler.as_deref(), model.as_mut())
}

/// Fit a detector on the training features and score its outlier flags as minority predictions
fn score_detector(
    detector: &mut dyn OutlierDetector,
    train: &Dataset,
    test: &Dataset,
    scale: bool,
) -> Result<f64> {
    let (minority, majority) = match (train.minority_class(), train.majority_class()) {
        (Some(minority), Some(majority)) if minority != majority => (minority, majority),
        _ => return Err(Error::dataset("anomaly scenarios need two classes in the training set")),
    };

    let (train_data, test_data) = if scale {
        let mut scaler = StandardScaler::new();
        let train_data = scaler.fit_transform(&train.data.view())?;
        (train_data, scaler.transform(&test.data.view())?)
    } else {
        (train.data.clone(), test.data.clone())
    };

    detector.fit(&train_data.view())?;
    let flags = detector.predict(&test_data.view())?;
    info!(detector = detector.name(), "Fitted outlier detector");

    accuracy(&test.target, &to_class_labels(&flags, minority, majority))
}

pub fn run_scenario(scenario: Scenario, config: &ExperimentConfig) -> Result<ScenarioOutcome> {
    let params = if scenario.is_imbalanced() {
        &config.imbalanced
    } else {
        &config.balanced
    };
    let dataset = make_classification(params)?;
    let (train, test) = train_test_split(&dataset, config.test_size, config.seed, false)?;
    info!(
        scenario = scenario.label(),
        train = train.len(),
        test = test.len(),
        "Running scenario"
    );

    let seed = config.seed;
    let resampled_forest = |kind: ResamplerKind| -> Result<PipelineReport> {
        let resampler = build_resampler(kind, config);
        let mut forest = RandomForest::new(config.models.forest_estimators, seed);
        fit_and_score(&train, &test, resampler.as_deref(), &mut forest)
    };
    let classifier = |kind: ClassifierKind| -> Result<PipelineReport> {
        let mut model = build_classifier(kind, config);
        fit_and_score(&train, &test, None, model.as_mut())
    };

    let report = match scenario {
        Scenario::UnderSampling => resampled_forest(ResamplerKind::RandomUnder)?,
        Scenario::OverSampling => resampled_forest(ResamplerKind::RandomOver)?,
        Scenario::Smote => resampled_forest(ResamplerKind::Smote)?,
        Scenario::Adasyn => resampled_forest(ResamplerKind::Adasyn)?,
        Scenario::TomekLinks => resampled_forest(ResamplerKind::TomekLinks)?,
        Scenario::ClusterCentroids => resampled_forest(ResamplerKind::ClusterCentroids)?,
        Scenario::CostSensitive => {
            let weights = ClassWeight::from_counts(&train.target);
            let mut model = LogisticRegression::default().with_class_weight(weights);
            fit_and_score(&train, &test, None, &mut model)?
        }
        Scenario::OneClassSvm | Scenario::IsolationForest => {
            let anomaly = &config.anomaly;
            let accuracy = if scenario == Scenario::OneClassSvm {
                let mut svm = OneClassSvm::new(anomaly.nu, anomaly.gamma);
                score_detector(&mut svm, &train, &test, true)?
            } else {
                let mut forest =
                    IsolationForest::new(anomaly.isolation_estimators, anomaly.contamination, seed);
                score_detector(&mut forest, &train, &test, false)?
            };

            return Ok(ScenarioOutcome {
                scenario,
                accuracy,
                train_rows: train.len(),
                fitted_rows: train.len(),
                test_rows: test.len(),
            });
        }
        Scenario::Bagging => classifier(ClassifierKind::Bagging)?,
        Scenario::RandomForest => classifier(ClassifierKind::RandomForest)?,
        Scenario::AdaBoost => classifier(ClassifierKind::AdaBoost)?,
        Scenario::Stacking => classifier(ClassifierKind::Stacking)?,
    };

    Ok(ScenarioOutcome {
        scenario,
        accuracy: report.accuracy,
        train_rows: report.train_rows,
        fitted_rows: report.fitted_rows,
        test_rows: report.test_rows,
    })
}

/// Run the given scenarios in order, stopping at the first failure
pub fn run_all(scenarios: &[Scenario], config: &ExperimentConfig) -> Result<Vec<ScenarioOutcome>> {
    scenarios.iter().map(|&s| run_scenario(s, config)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::ValueEnum;

    fn small_config() -> ExperimentConfig {
        let mut config = ExperimentConfig::default();
        config.imbalanced.n_samples = 300;
        config.imbalanced.weights = Some(vec![0.9, 0.1]);
        config.balanced.n_samples = 200;
        config.models.forest_estimators = 10;
        config.models.adaboost_estimators = 10;
        config
    }

    #[test]
    fn test_labels_are_unique() {
        let mut labels: Vec<&str> = Scenario::ALL.iter().map(|s| s.label()).collect();
        labels.sort_unstable();
        labels.dedup();
        assert_eq!(labels.len(), Scenario::ALL.len());
    }

    #[test]
    fn test_cli_names() {
        assert_eq!(Scenario::from_str("tomek-links", false).unwrap(), Scenario::TomekLinks);
        assert_eq!(Scenario::from_str("adaboost", false).unwrap(), Scenario::AdaBoost);
        assert_eq!(Scenario::from_str("one-class-svm", false).unwrap(), Scenario::OneClassSvm);
        assert_eq!(
            ResamplerKind::from_str("random-under", false).unwrap(),
            ResamplerKind::RandomUnder
        );
    }

    #[test]
    fn test_dataset_families() {
        assert!(Scenario::Smote.is_imbalanced());
        assert!(Scenario::IsolationForest.is_imbalanced());
        assert!(!Scenario::Stacking.is_imbalanced());
    }

    #[test]
    fn test_under_sampling_shrinks_fitted_rows() {
        let outcome = run_scenario(Scenario::UnderSampling, &small_config()).unwrap();
        assert_eq!(outcome.train_rows, 240);
        assert_eq!(outcome.test_rows, 60);
        assert!(outcome.fitted_rows < outcome.train_rows);
        assert!((0.0..=1.0).contains(&outcome.accuracy));
    }

    #[test]
    fn test_over_sampling_grows_fitted_rows() {
        let outcome = run_scenario(Scenario::OverSampling, &small_config()).unwrap();
        assert!(outcome.fitted_rows > outcome.train_rows);
    }

    #[test]
    fn test_anomaly_scenarios_fit_on_training_rows() {
        let config = small_config();
        for scenario in [Scenario::IsolationForest, Scenario::OneClassSvm] {
            let outcome = run_scenario(scenario, &config).unwrap();
            assert_eq!(outcome.fitted_rows, outcome.train_rows);
            assert!((0.0..=1.0).contains(&outcome.accuracy));
        }
    }

    #[test]
    fn test_pipeline_on_user_dataset() {
        let config = small_config();
        let dataset = make_classification(&config.imbalanced).unwrap();
        let report = run_pipeline(
            &dataset,
            ResamplerKind::Smote,
            ClassifierKind::DecisionTree,
            &config,
            true,
        )
        .unwrap();

        assert_eq!(report.train_rows + report.test_rows, dataset.len());
        assert!(report.fitted_rows > report.train_rows);
        assert_eq!(report.per_class.len(), 2);
        assert!((0.0..=1.0).contains(&report.balanced_accuracy));
    }
}
