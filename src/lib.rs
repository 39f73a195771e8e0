//! # plantcheck
//!
//! Plant leaf health classification core for crop monitoring.
//!
//! Decides "healthy" vs "affected" for a photographed leaf. A converted
//! real-model artifact is preferred when one can be loaded; otherwise a
//! hand-tuned heuristic scorer approximates the model's decision boundary
//! from interpretable pixel statistics. The pipeline:
//!
//! 1. [`preprocess`] — decode and normalize into a fixed 224x224x3 tensor
//! 2. [`features`] — extract interpretable scalar statistics
//! 3. [`relevance`] — reject images without plant-like signatures
//! 4. [`model`] — resolve the inference path (artifact vs heuristic), once
//! 5. [`scoring`] — rule-table scoring with per-crop bias (heuristic path)
//! 6. [`service`] — orchestration and result formatting
//!
//! ## Example
//!
//! ```rust,no_run
//! use plantcheck::{ClassificationService, Label};
//!
//! # async fn run() -> plantcheck::Result<()> {
//! let service = ClassificationService::default();
//! let image = std::fs::read("leaf.jpg")?;
//! let result = service.classify(&image, Some("tomato")).await?;
//! match result.label {
//!     Label::Healthy => println!("{}% healthy", result.confidence),
//!     Label::Affected => println!("issue detected: {}", result.recommendation),
//!     Label::Irrelevant => println!("{}", result.recommendation),
//! }
//! # Ok(())
//! # }
//! ```

pub mod crops;
pub mod error;
pub mod features;
pub mod logging;
pub mod model;
pub mod preprocess;
pub mod relevance;
pub mod scoring;
pub mod service;

pub use crops::{CropProfile, CropProfileRegistry};
pub use error::{Error, Result};
pub use features::{FeatureExtractor, FeatureVector};
pub use model::{ModelSource, ModelSourceResolver, ResolverConfig};
pub use preprocess::{ImagePreprocessor, ImageTensor};
pub use relevance::{RelevanceGate, RelevanceReport};
pub use scoring::{HealthScorer, MidpointSampler, Sampler, UniformSampler};
pub use service::{
    CancelToken, ClassificationResult, ClassificationService, Label, ScoreSource,
};
