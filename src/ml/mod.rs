//! Machine-learning pipeline: feature schema, preprocessing, candidate
//! classifiers, model selection, and artifact persistence.

pub mod artifacts;
pub mod classifier;
pub mod dataset;
pub mod metrics;
pub mod preprocess;
pub mod schema;
pub mod trainer;

pub use artifacts::{load_ml_context, ArtifactError, ArtifactStore};
pub use classifier::TrainedClassifier;
pub use preprocess::Preprocessor;
pub use schema::FeatureRecord;
pub use trainer::{ModelMetrics, ModelTrainer};
