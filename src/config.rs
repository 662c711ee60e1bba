//! Chunking and orchestration configuration.
//!
//! ## Optimal vs Max
//!
//! A single size limit forces awkward splits. `ChunkingConfig` separates the
//! size chunks are pulled toward from the ceiling they may never cross:
//!
//! ```text
//! optimal_size = 470, max_size = 512
//!
//!   tokens:   0 ........ 470 ..... 512 ......
//!   cost:     falls ---> 0 ---> rises | forbidden
//! ```
//!
//! - `optimal_size`: where the deviation cost is zero.
//! - `max_size`: the hard ceiling. Only a single sentence that is already
//!   larger than this may produce a bigger chunk.
//! - `lambda_size`: weight of the deviation cost. Deviation is measured in
//!   multiples of `optimal_size`, so `lambda_size = 2.0` means a chunk twice
//!   the optimal size costs two units.
//! - `chunk_penalty`: flat cost charged per chunk. Large values push toward
//!   fewer, bigger chunks.
//! - `boundary_weight`: weight of the semantic cost of cutting between two
//!   similar sentences. Zero (the default) disables it.

use std::cmp::Ordering;
use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::assembler::EmbeddingStrategy;
use crate::{Error, Result};

/// Default target chunk size in tokens.
pub const DEFAULT_OPTIMAL_SIZE: usize = 470;
/// Default chunk ceiling in tokens.
pub const DEFAULT_MAX_SIZE: usize = 512;
/// Default deviation weight.
pub const DEFAULT_LAMBDA_SIZE: f64 = 2.0;
/// Default per-chunk penalty.
pub const DEFAULT_CHUNK_PENALTY: f64 = 1.0;
/// Default token budget for a single embedder call.
pub const DEFAULT_MAX_BATCH_TOKENS: usize = 6000;
/// Default number of embedder calls allowed in flight.
pub const DEFAULT_MAX_CONCURRENT_EMBEDS: usize = 4;

/// Parameters of one chunk optimization.
///
/// Deserializes from the `chunking_config` object of a request:
///
/// ```rust
/// use optislab::ChunkingConfig;
///
/// let config = ChunkingConfig::new(70)
///     .with_max(100)
///     .with_lambda(3.0)
///     .with_penalty(0.5);
/// assert!(config.validate().is_ok());
///
/// // max below optimal is rejected
/// assert!(ChunkingConfig::new(100).with_max(50).validate().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawChunkingConfig", into = "RawChunkingConfig")]
pub struct ChunkingConfig {
    /// Target chunk size in tokens.
    pub optimal_size: usize,
    /// Hard ceiling on chunk size in tokens.
    pub max_size: usize,
    /// Weight of the deviation-from-optimal cost.
    pub lambda_size: f64,
    /// Fixed cost charged once per chunk.
    pub chunk_penalty: f64,
    /// Weight of the cost of cutting between similar sentences.
    pub boundary_weight: f64,
}

/// A `chunking_config` object exactly as a client sent it.
///
/// Sizes are signed and every field defaults to zero, so any syntactically
/// valid object parses; out-of-range values are reported per document when
/// the config is converted with [`ChunkingConfig::try_from`].
///
/// ```rust
/// use optislab::{ChunkingConfig, RawChunkingConfig};
///
/// let raw: RawChunkingConfig = serde_json::from_str(r#"{"optimal_size": -5}"#).unwrap();
/// assert!(ChunkingConfig::try_from(raw).is_err());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawChunkingConfig {
    /// Target chunk size in tokens.
    pub optimal_size: i64,
    /// Hard ceiling on chunk size in tokens.
    pub max_size: i64,
    /// Weight of the deviation-from-optimal cost.
    pub lambda_size: f64,
    /// Fixed cost charged once per chunk.
    pub chunk_penalty: f64,
    /// Weight of the cost of cutting between similar sentences.
    pub boundary_weight: f64,
}

impl TryFrom<RawChunkingConfig> for ChunkingConfig {
    type Error = Error;

    fn try_from(raw: RawChunkingConfig) -> Result<Self> {
        let size = |name: &str, value: i64| {
            usize::try_from(value)
                .ok()
                .filter(|v| *v > 0)
                .ok_or_else(|| Error::Configuration(format!("{name} must be > 0, got {value}")))
        };

        let config = Self {
            optimal_size: size("optimal_size", raw.optimal_size)?,
            max_size: size("max_size", raw.max_size)?,
            lambda_size: raw.lambda_size,
            chunk_penalty: raw.chunk_penalty,
            boundary_weight: raw.boundary_weight,
        };
        config.validate()?;
        Ok(config)
    }
}

impl From<ChunkingConfig> for RawChunkingConfig {
    fn from(config: ChunkingConfig) -> Self {
        let size = |value: usize| i64::try_from(value).unwrap_or(i64::MAX);
        Self {
            optimal_size: size(config.optimal_size),
            max_size: size(config.max_size),
            lambda_size: config.lambda_size,
            chunk_penalty: config.chunk_penalty,
            boundary_weight: config.boundary_weight,
        }
    }
}

impl ChunkingConfig {
    /// Create a config with `optimal_size == max_size` and default weights.
    #[must_use]
    pub const fn new(size: usize) -> Self {
        Self {
            optimal_size: size,
            max_size: size,
            lambda_size: DEFAULT_LAMBDA_SIZE,
            chunk_penalty: DEFAULT_CHUNK_PENALTY,
            boundary_weight: 0.0,
        }
    }

    /// Set the hard ceiling.
    #[must_use]
    pub const fn with_max(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    /// Set the deviation weight.
    #[must_use]
    pub const fn with_lambda(mut self, lambda_size: f64) -> Self {
        self.lambda_size = lambda_size;
        self
    }

    /// Set the per-chunk penalty.
    #[must_use]
    pub const fn with_penalty(mut self, chunk_penalty: f64) -> Self {
        self.chunk_penalty = chunk_penalty;
        self
    }

    /// Set the semantic boundary weight.
    #[must_use]
    pub const fn with_boundary_weight(mut self, boundary_weight: f64) -> Self {
        self.boundary_weight = boundary_weight;
        self
    }

    /// Check the parameters.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if either size is zero, if
    /// `max_size < optimal_size`, or if a weight is negative or not finite.
    pub fn validate(&self) -> Result<()> {
        if self.optimal_size == 0 {
            return Err(Error::Configuration("optimal_size must be > 0".into()));
        }
        if self.max_size == 0 {
            return Err(Error::Configuration("max_size must be > 0".into()));
        }
        if self.max_size < self.optimal_size {
            return Err(Error::Configuration(format!(
                "max_size ({}) must be >= optimal_size ({})",
                self.max_size, self.optimal_size
            )));
        }
        for (name, value) in [
            ("lambda_size", self.lambda_size),
            ("chunk_penalty", self.chunk_penalty),
            ("boundary_weight", self.boundary_weight),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::Configuration(format!(
                    "{name} must be a finite non-negative number, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Where a chunk of `size` tokens sits relative to this config.
    ///
    /// - `Ordering::Less`: below the optimum, room to grow
    /// - `Ordering::Equal`: between optimum and ceiling
    /// - `Ordering::Greater`: over the ceiling
    #[must_use]
    pub fn fits(&self, size: usize) -> Ordering {
        if size < self.optimal_size {
            Ordering::Less
        } else if size > self.max_size {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self::new(DEFAULT_OPTIMAL_SIZE).with_max(DEFAULT_MAX_SIZE)
    }
}

/// Process-wide settings for a [`DocumentOrchestrator`](crate::DocumentOrchestrator).
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    /// Applied to documents that carry no `chunking_config`.
    pub default_chunking: ChunkingConfig,
    /// How chunk embeddings are produced.
    pub strategy: EmbeddingStrategy,
    /// Summed token budget of one embedder call.
    pub max_batch_tokens: usize,
    /// Embedder calls allowed in flight across a batch.
    pub max_concurrent_embeds: usize,
    /// Documents processed at once by `process_batch`.
    pub max_concurrent_documents: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            default_chunking: ChunkingConfig::default(),
            strategy: EmbeddingStrategy::default(),
            max_batch_tokens: DEFAULT_MAX_BATCH_TOKENS,
            max_concurrent_embeds: DEFAULT_MAX_CONCURRENT_EMBEDS,
            max_concurrent_documents: std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(4),
        }
    }
}

impl OrchestratorConfig {
    /// Defaults overridden by `MAX_BATCH_TOKENS`, `MAX_CONCURRENT_EMBEDS`
    /// and `MAX_CONCURRENT_DOCUMENTS`.
    ///
    /// Values that are missing, unparseable or zero keep the default;
    /// concurrency limits are capped at [`Semaphore::MAX_PERMITS`].
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let positive = |key: &str| {
            lookup(key)
                .and_then(|v| v.trim().parse::<usize>().ok())
                .filter(|v| *v > 0)
        };

        let mut config = Self::default();
        if let Some(v) = positive("MAX_BATCH_TOKENS") {
            config.max_batch_tokens = v;
        }
        if let Some(v) = positive("MAX_CONCURRENT_EMBEDS") {
            config.max_concurrent_embeds = v.min(Semaphore::MAX_PERMITS);
        }
        if let Some(v) = positive("MAX_CONCURRENT_DOCUMENTS") {
            config.max_concurrent_documents = v.min(Semaphore::MAX_PERMITS);
        }
        config
    }

    /// Set the default chunking config.
    #[must_use]
    pub const fn with_default_chunking(mut self, config: ChunkingConfig) -> Self {
        self.default_chunking = config;
        self
    }

    /// Set the embedding strategy.
    #[must_use]
    pub const fn with_strategy(mut self, strategy: EmbeddingStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Check the settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if a limit is zero, a concurrency
    /// limit exceeds [`Semaphore::MAX_PERMITS`], or the default chunking
    /// config is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.max_batch_tokens == 0 {
            return Err(Error::Configuration("max_batch_tokens must be > 0".into()));
        }
        for (name, value) in [
            ("max_concurrent_embeds", self.max_concurrent_embeds),
            ("max_concurrent_documents", self.max_concurrent_documents),
        ] {
            if value == 0 || value > Semaphore::MAX_PERMITS {
                return Err(Error::Configuration(format!(
                    "{name} must be in 1..={}, got {value}",
                    Semaphore::MAX_PERMITS
                )));
            }
        }
        self.default_chunking.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ChunkingConfig::default();
        assert_eq!(config.optimal_size, 470);
        assert_eq!(config.max_size, 512);
        assert!((config.lambda_size - 2.0).abs() < f64::EPSILON);
        assert!((config.chunk_penalty - 1.0).abs() < f64::EPSILON);
        assert!(config.boundary_weight.abs() < f64::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_fits() {
        let config = ChunkingConfig::new(100).with_max(120);
        assert_eq!(config.fits(50), Ordering::Less);
        assert_eq!(config.fits(100), Ordering::Equal);
        assert_eq!(config.fits(120), Ordering::Equal);
        assert_eq!(config.fits(121), Ordering::Greater);
    }

    #[test]
    fn test_max_less_than_optimal_rejected() {
        let err = ChunkingConfig::new(100).with_max(50).validate().unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("max_size (50)"));
    }

    #[test]
    fn test_zero_sizes_rejected() {
        assert!(ChunkingConfig::new(0).with_max(10).validate().is_err());
        let config = ChunkingConfig {
            max_size: 0,
            ..ChunkingConfig::new(0)
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_negative_or_nan_weights_rejected() {
        let base = ChunkingConfig::default();
        assert!(base.with_lambda(-1.0).validate().is_err());
        assert!(base.with_penalty(-0.1).validate().is_err());
        assert!(base.with_penalty(f64::NAN).validate().is_err());
        assert!(base.with_boundary_weight(f64::INFINITY).validate().is_err());
        assert!(base.with_lambda(0.0).with_penalty(0.0).validate().is_ok());
    }

    #[test]
    fn test_deserialize_without_boundary_weight() {
        let json = r#"{"optimal_size":70,"max_size":100,"lambda_size":3.0,"chunk_penalty":0.5}"#;
        let config: ChunkingConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config, ChunkingConfig::new(70).with_max(100).with_lambda(3.0).with_penalty(0.5));
    }

    #[test]
    fn test_raw_config_out_of_range_sizes_rejected() {
        let raw: RawChunkingConfig =
            serde_json::from_str(r#"{"optimal_size": -5, "max_size": 100}"#).unwrap();
        let err = ChunkingConfig::try_from(raw).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("optimal_size must be > 0, got -5"));

        let raw = RawChunkingConfig {
            optimal_size: 10,
            ..RawChunkingConfig::default()
        };
        assert!(ChunkingConfig::try_from(raw).is_err());
    }

    #[test]
    fn test_raw_config_missing_weights_are_zero() {
        let raw: RawChunkingConfig =
            serde_json::from_str(r#"{"optimal_size": 70, "max_size": 100}"#).unwrap();
        let config = ChunkingConfig::try_from(raw).unwrap();
        assert_eq!(
            config,
            ChunkingConfig::new(70)
                .with_max(100)
                .with_lambda(0.0)
                .with_penalty(0.0)
        );
        assert_eq!(RawChunkingConfig::from(config), raw);
    }

    #[test]
    fn test_deserialize_validates() {
        let json = r#"{"optimal_size": 100, "max_size": 50}"#;
        let result = serde_json::from_str::<ChunkingConfig>(json);
        assert!(result.is_err());
    }

    #[test]
    fn test_orchestrator_env_overrides() {
        let config = OrchestratorConfig::from_lookup(|key| match key {
            "MAX_BATCH_TOKENS" => Some("1200".into()),
            "MAX_CONCURRENT_EMBEDS" => Some("0".into()),
            "MAX_CONCURRENT_DOCUMENTS" => Some("not a number".into()),
            _ => None,
        });
        let defaults = OrchestratorConfig::default();

        assert_eq!(config.max_batch_tokens, 1200);
        assert_eq!(config.max_concurrent_embeds, defaults.max_concurrent_embeds);
        assert_eq!(
            config.max_concurrent_documents,
            defaults.max_concurrent_documents
        );
    }

    #[test]
    fn test_env_concurrency_capped_at_semaphore_limit() {
        let huge = usize::MAX.to_string();
        let config = OrchestratorConfig::from_lookup(|key| match key {
            "MAX_CONCURRENT_EMBEDS" | "MAX_CONCURRENT_DOCUMENTS" => Some(huge.clone()),
            _ => None,
        });

        assert_eq!(config.max_concurrent_embeds, Semaphore::MAX_PERMITS);
        assert_eq!(config.max_concurrent_documents, Semaphore::MAX_PERMITS);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_orchestrator_validate() {
        assert!(OrchestratorConfig::default().validate().is_ok());

        let mut config = OrchestratorConfig::default();
        config.max_concurrent_embeds = 0;
        assert!(config.validate().is_err());

        let mut config = OrchestratorConfig::default();
        config.max_concurrent_documents = Semaphore::MAX_PERMITS + 1;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_concurrent_documents"));

        let config = OrchestratorConfig::default()
            .with_default_chunking(ChunkingConfig::new(10).with_max(5));
        assert!(config.validate().is_err());
    }
}
