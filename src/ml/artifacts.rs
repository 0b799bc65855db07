//! Model artifact persistence
//!
//! One store per artifact kind, each with an ordered fallback chain of
//! sources: primary serialized file, backup file, remote model registry.
//! The first source that fetches and deserializes wins; loading never
//! mutates an artifact. Total failure names every location tried.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::config::Config;
use crate::ml::classifier::TrainedClassifier;
use crate::ml::preprocess::Preprocessor;
use crate::service::MlContext;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact not found at {0}")]
    Missing(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to deserialize artifact: {0}")]
    Deserialize(#[from] serde_json::Error),

    #[error("registry request failed: {0}")]
    Registry(String),

    #[error("no artifact available; tried: {tried}")]
    NoArtifactAvailable { tried: String },
}

/// One location an artifact can be fetched from.
#[async_trait]
pub trait ArtifactSource: Send + Sync {
    /// Human-readable location, used in logs and failure reports.
    fn location(&self) -> String;

    async fn fetch(&self) -> Result<Vec<u8>, ArtifactError>;
}

/// Serialized JSON file on local disk.
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ArtifactSource for FileSource {
    fn location(&self) -> String {
        self.path.display().to_string()
    }

    async fn fetch(&self) -> Result<Vec<u8>, ArtifactError> {
        if !self.path.exists() {
            return Err(ArtifactError::Missing(self.location()));
        }
        Ok(tokio::fs::read(&self.path).await?)
    }
}

/// Remote model registry, addressed by model name and version.
pub struct RegistrySource {
    base_url: String,
    name: String,
    version: String,
    client: reqwest::Client,
}

impl RegistrySource {
    pub fn new(base_url: &str, name: &str, version: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            name: name.to_string(),
            version: version.to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ArtifactSource for RegistrySource {
    fn location(&self) -> String {
        format!("{}/models/{}/{}", self.base_url, self.name, self.version)
    }

    async fn fetch(&self) -> Result<Vec<u8>, ArtifactError> {
        let response = self
            .client
            .get(self.location())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ArtifactError::Registry(e.to_string()))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ArtifactError::Registry(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Ordered fallback chain over artifact sources.
pub struct ArtifactStore {
    sources: Vec<Box<dyn ArtifactSource>>,
}

impl ArtifactStore {
    pub fn new(sources: Vec<Box<dyn ArtifactSource>>) -> Self {
        Self { sources }
    }

    /// Store for the classifier artifact per configuration. The backup
    /// location holds a same-format JSON replica of the primary, not an
    /// alternate encoding.
    pub fn for_classifier(config: &Config) -> Self {
        let mut sources: Vec<Box<dyn ArtifactSource>> = vec![
            Box::new(FileSource::new(&config.model_path)),
            Box::new(FileSource::new(&config.model_backup_path)),
        ];
        if let Some(registry) = &config.registry_url {
            sources.push(Box::new(RegistrySource::new(
                registry,
                &config.model_name,
                &config.model_version,
            )));
        }
        Self::new(sources)
    }

    /// Store for the preprocessor artifact per configuration. As with
    /// the classifier, the backup is a same-format replica.
    pub fn for_preprocessor(config: &Config) -> Self {
        let mut sources: Vec<Box<dyn ArtifactSource>> = vec![
            Box::new(FileSource::new(&config.preprocessor_path)),
            Box::new(FileSource::new(&config.preprocessor_backup_path)),
        ];
        if let Some(registry) = &config.registry_url {
            sources.push(Box::new(RegistrySource::new(
                registry,
                &format!("{}-preprocessor", config.model_name),
                &config.model_version,
            )));
        }
        Self::new(sources)
    }

    /// Try each source in order; first successful deserialize wins.
    pub async fn load<T: DeserializeOwned>(&self) -> Result<T, ArtifactError> {
        let mut attempts = Vec::with_capacity(self.sources.len());

        for source in &self.sources {
            let location = source.location();
            let result = match source.fetch().await {
                Ok(bytes) => serde_json::from_slice::<T>(&bytes).map_err(ArtifactError::from),
                Err(e) => Err(e),
            };
            match result {
                Ok(artifact) => {
                    tracing::info!(%location, "loaded artifact");
                    return Ok(artifact);
                }
                Err(e) => {
                    tracing::warn!(%location, error = %e, "artifact source failed, trying next");
                    attempts.push(format!("{location} ({e})"));
                }
            }
        }

        Err(ArtifactError::NoArtifactAvailable {
            tried: attempts.join(", "),
        })
    }

    /// Serialize to the named location, overwriting; parent directories
    /// are created as needed.
    pub fn save<T: Serialize>(artifact: &T, destination: impl AsRef<Path>) -> Result<(), ArtifactError> {
        let destination = destination.as_ref();
        if let Some(parent) = destination.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_vec_pretty(artifact)?;
        std::fs::write(destination, json)?;
        tracing::info!(destination = %destination.display(), "saved artifact");
        Ok(())
    }
}

/// Load both serving artifacts, building the immutable context the
/// decision path holds for the process lifetime.
pub async fn load_ml_context(config: &Config) -> Result<MlContext, ArtifactError> {
    let preprocessor: Preprocessor = ArtifactStore::for_preprocessor(config).load().await?;
    let classifier: TrainedClassifier = ArtifactStore::for_classifier(config).load().await?;

    tracing::info!(
        model = classifier.name(),
        version = %config.model_version,
        "ML context ready"
    );

    Ok(MlContext {
        preprocessor,
        classifier,
        model_version: config.model_version.clone(),
    })
}
