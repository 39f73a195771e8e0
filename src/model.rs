//! Model Source Resolution Module
//!
//! Decides, once per process (or per explicit reset), whether classification
//! runs against a converted real-model artifact or the heuristic scorer.
//! Candidate artifact locations are tried in order with a bounded load
//! timeout; any failure (missing file, parse error, version mismatch,
//! timeout) advances to the next tier, and exhausting all tiers caches the
//! heuristic decision for the rest of the session.
//!
//! Concurrent first calls collapse into a single load pass: resolution is
//! double-checked behind a flight mutex, so N racing callers observe exactly
//! one attempt and share its outcome.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::features::FeatureVector;

/// Artifact format version this build understands
pub const ARTIFACT_VERSION: u32 = 1;

/// Failures while fetching or parsing a model artifact.
///
/// Never surfaced to classification callers; each variant uniformly means
/// "this tier is unavailable" and the resolver advances past it.
#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("artifact not found at {0}")]
    NotFound(PathBuf),

    #[error("failed to read artifact: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse artifact: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("artifact version {found} not supported (expected {expected})")]
    VersionMismatch { found: u32, expected: u32 },

    #[error("artifact load timed out after {0:?}")]
    Timeout(Duration),

    #[error("artifact load task failed: {0}")]
    Task(String),
}

/// Logistic weights over the extracted features, the distilled form the
/// upstream training pipeline exports its classifier in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthModel {
    /// Artifact format version
    pub version: u32,
    /// Per-feature weights
    pub weights: ModelWeights,
    /// Intercept term
    pub bias: f32,
}

/// Named per-feature weights of a [`HealthModel`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelWeights {
    pub brightness: f32,
    pub contrast: f32,
    pub green_dominance: f32,
    pub color_balance: f32,
    pub saturation: f32,
    pub texture_complexity: f32,
    pub edge_intensity: f32,
}

impl HealthModel {
    /// Runs the model over one feature vector, returning the health
    /// probability in (0, 1).
    pub fn predict(&self, features: &FeatureVector) -> f32 {
        let w = &self.weights;
        let z = w.brightness * features.brightness
            + w.contrast * features.contrast
            + w.green_dominance * features.green_dominance
            + w.color_balance * features.color_balance
            + w.saturation * features.saturation
            + w.texture_complexity * features.texture_complexity
            + w.edge_intensity * features.edge_intensity
            + self.bias;
        1.0 / (1.0 + (-z).exp())
    }
}

/// Which inference path the resolver settled on.
#[derive(Debug, Clone)]
pub enum ModelSource {
    /// Resolution has not been attempted yet
    Unresolved,
    /// A converted real-model artifact is loaded and ready
    RealArtifact(Arc<HealthModel>),
    /// All artifact tiers failed; scoring uses the heuristic pipeline
    Heuristic,
}

impl ModelSource {
    /// Human-readable source description for observability
    pub fn status(&self) -> &'static str {
        match self {
            ModelSource::Unresolved => "unresolved",
            ModelSource::RealArtifact(_) => "real model",
            ModelSource::Heuristic => "heuristic simulation",
        }
    }

    fn is_resolved(&self) -> bool {
        !matches!(self, ModelSource::Unresolved)
    }
}

/// Loads an artifact from one location. The seam exists so tests can count
/// and fail load attempts without touching the filesystem.
pub trait ArtifactLoader: Send + Sync {
    /// Attempts to load and validate the artifact at `location`
    fn load(&self, location: &Path) -> Result<HealthModel, ArtifactError>;
}

/// Production loader: reads and parses the JSON artifact from disk and
/// rejects unsupported format versions.
#[derive(Debug, Default, Clone)]
pub struct FileArtifactLoader;

impl ArtifactLoader for FileArtifactLoader {
    fn load(&self, location: &Path) -> Result<HealthModel, ArtifactError> {
        if !location.exists() {
            return Err(ArtifactError::NotFound(location.to_path_buf()));
        }
        let data = std::fs::read_to_string(location)?;
        let model: HealthModel = serde_json::from_str(&data)?;
        if model.version != ARTIFACT_VERSION {
            return Err(ArtifactError::VersionMismatch {
                found: model.version,
                expected: ARTIFACT_VERSION,
            });
        }
        Ok(model)
    }
}

/// Resolver configuration: candidate locations in priority order and the
/// per-tier load timeout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Artifact locations, primary first
    pub locations: Vec<PathBuf>,
    /// Upper bound for one tier's load attempt
    pub load_timeout: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            locations: vec![
                PathBuf::from("models/leaf_health.json"),
                PathBuf::from("models/fallback/leaf_health.json"),
            ],
            load_timeout: Duration::from_secs(5),
        }
    }
}

/// Single-flight resolver owning the [`ModelSource`] state machine.
pub struct ModelSourceResolver {
    config: ResolverConfig,
    loader: Arc<dyn ArtifactLoader>,
    state: RwLock<ModelSource>,
    flight: Mutex<()>,
}

impl ModelSourceResolver {
    /// Resolver with the default config and the on-disk artifact loader
    pub fn new(config: ResolverConfig) -> Self {
        Self::with_loader(config, Arc::new(FileArtifactLoader))
    }

    /// Resolver with a custom loader implementation
    pub fn with_loader(config: ResolverConfig, loader: Arc<dyn ArtifactLoader>) -> Self {
        Self {
            config,
            loader,
            state: RwLock::new(ModelSource::Unresolved),
            flight: Mutex::new(()),
        }
    }

    /// Resolves the model source, loading at most once per session.
    ///
    /// Idempotent and safe under concurrency: racing callers serialize on
    /// the flight guard and all observe the outcome of a single load pass.
    /// Never fails; exhausting every tier yields [`ModelSource::Heuristic`].
    pub async fn resolve(&self) -> ModelSource {
        {
            let state = self.state.read().await;
            if state.is_resolved() {
                return state.clone();
            }
        }

        let _flight = self.flight.lock().await;
        // A racing caller may have finished resolution while this one
        // waited on the guard.
        {
            let state = self.state.read().await;
            if state.is_resolved() {
                return state.clone();
            }
        }

        let resolved = self.attempt_tiers().await;
        let mut state = self.state.write().await;
        *state = resolved.clone();
        resolved
    }

    /// Current state without triggering resolution
    pub async fn current(&self) -> ModelSource {
        self.state.read().await.clone()
    }

    /// Human-readable status string for observability
    pub async fn status(&self) -> String {
        self.state.read().await.status().to_string()
    }

    /// Clears the cached decision so the next [`resolve`](Self::resolve)
    /// retries the artifact tiers. This is the only retry path; failures
    /// are never retried automatically within a session.
    pub async fn reset(&self) {
        let _flight = self.flight.lock().await;
        let mut state = self.state.write().await;
        *state = ModelSource::Unresolved;
        info!("model source reset to unresolved");
    }

    async fn attempt_tiers(&self) -> ModelSource {
        for location in &self.config.locations {
            debug!(location = %location.display(), "attempting artifact tier");
            match self.load_with_timeout(location).await {
                Ok(model) => {
                    info!(
                        location = %location.display(),
                        "real model artifact loaded"
                    );
                    return ModelSource::RealArtifact(Arc::new(model));
                }
                Err(err) => {
                    warn!(
                        location = %location.display(),
                        error = %err,
                        "artifact tier unavailable"
                    );
                }
            }
        }

        info!("all artifact tiers failed, using heuristic simulation");
        ModelSource::Heuristic
    }

    async fn load_with_timeout(&self, location: &Path) -> Result<HealthModel, ArtifactError> {
        let loader = Arc::clone(&self.loader);
        let location = location.to_path_buf();
        let attempt = tokio::task::spawn_blocking(move || loader.load(&location));

        match tokio::time::timeout(self.config.load_timeout, attempt).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(ArtifactError::Task(join_err.to_string())),
            Err(_) => Err(ArtifactError::Timeout(self.config.load_timeout)),
        }
    }
}
