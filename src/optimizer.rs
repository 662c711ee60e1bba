//! Size-optimal chunk boundaries.
//!
//! ## The Problem
//!
//! Greedy packing ("add sentences until the chunk reaches its target") is
//! simple but myopic: it fills the first chunks and leaves a runt at the end.
//!
//! ```text
//! Sentences (tokens): [50, 50, 50, 50, 50]     optimal = 100, max = 150
//!
//! Greedy:   [50, 50] [50, 50] [50]      -> three chunks, one a 50-token runt
//! Optimal:  [50, 50] [50, 50, 50]       -> two chunks, one slightly over
//! ```
//!
//! Which answer is right depends on how much a chunk costs versus how much a
//! badly sized chunk costs, and only a global search can weigh the two.
//!
//! ## The Cost Model
//!
//! For a partition into chunks `c_1 .. c_k` with token totals `s_i`:
//!
//! ```text
//! cost = Σ_i [ chunk_penalty + lambda_size * |s_i - optimal| / optimal ]
//!      + Σ_cuts boundary_cost(cut)
//! ```
//!
//! subject to `s_i <= max_size` for every chunk of two or more sentences.
//! A single sentence larger than `max_size` is allowed to stand alone.
//!
//! `boundary_cost` is zero unless semantic boundaries are supplied, see
//! [`ChunkOptimizer::partition_with_boundaries`].
//!
//! ## The Algorithm
//!
//! Dynamic programming over suffixes. `best[j]` is the cheapest way to chunk
//! sentences `j..n`:
//!
//! ```text
//! best[n] = 0
//! best[j] = min over i in (j, n], sum(t[j..i]) <= max  of
//!           chunk_cost(j..i) + cut_cost(i) + best[i]
//! ```
//!
//! Walking forward from `j = 0` along the stored choices recovers the
//! partition. Scanning `i` in increasing order and only replacing on a
//! strictly better candidate makes the earliest split win among equals,
//! which yields the lexicographically earliest optimal partition.
//!
//! The inner loop stops as soon as a candidate overflows `max_size`, so the
//! work is `O(n × w)` where `w` is the most sentences that fit in one chunk.

use std::ops::Range;

use tracing::trace;

use crate::{ChunkingConfig, Error, Result};

/// Relative tolerance under which two costs are considered tied.
const COST_TOLERANCE: f64 = 1e-9;

/// An ordered split of a sentence sequence into contiguous chunks.
///
/// Each span is a half-open range of sentence indices. Spans are non-empty,
/// in order, and together cover `0..sentence_count` without gaps.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    spans: Vec<Range<usize>>,
    cost: f64,
}

impl Partition {
    /// The sentence ranges, in document order.
    #[must_use]
    pub fn spans(&self) -> &[Range<usize>] {
        &self.spans
    }

    /// Total cost of this partition under the optimizer's cost model.
    #[must_use]
    pub const fn cost(&self) -> f64 {
        self.cost
    }

    /// Number of chunks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    /// Whether the partition has no chunks (empty document).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Number of sentences covered.
    #[must_use]
    pub fn sentence_count(&self) -> usize {
        self.spans.last().map_or(0, |span| span.end)
    }

    /// Sentence indices at which a new chunk starts, excluding 0.
    #[must_use]
    pub fn split_points(&self) -> Vec<usize> {
        self.spans.iter().skip(1).map(|span| span.start).collect()
    }
}

/// Computes the minimum-cost partition of a sentence sequence.
///
/// The optimizer is a pure function of its inputs: the DP tables live on the
/// stack of each call and nothing is cached between documents.
///
/// ## Example
///
/// ```rust
/// use optislab::{ChunkOptimizer, ChunkingConfig};
///
/// let config = ChunkingConfig::new(100).with_max(120);
/// let optimizer = ChunkOptimizer::new(config).unwrap();
///
/// let partition = optimizer.partition(&[50, 50, 50, 50]).unwrap();
/// assert_eq!(partition.spans(), &[0..2, 2..4]);
/// ```
#[derive(Debug, Clone)]
pub struct ChunkOptimizer {
    config: ChunkingConfig,
    work_limit: Option<u64>,
}

/// Best known way to chunk a suffix.
#[derive(Debug, Clone, Copy)]
struct Cell {
    cost: f64,
    chunks: usize,
    /// End (exclusive) of the first chunk of the suffix.
    next: usize,
}

impl Cell {
    const UNREACHED: Self = Self {
        cost: f64::INFINITY,
        chunks: usize::MAX,
        next: 0,
    };

    fn is_reached(&self) -> bool {
        self.cost.is_finite()
    }
}

impl ChunkOptimizer {
    /// Create an optimizer for `config`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the config is invalid.
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            work_limit: None,
        })
    }

    /// Bound the number of candidate chunks the search may evaluate.
    ///
    /// Very large `max_size` values make every prefix a candidate, turning
    /// the search quadratic in the sentence count. With a limit set,
    /// exceeding it fails with [`Error::InfeasiblePartition`] instead.
    #[must_use]
    pub const fn with_work_limit(mut self, limit: u64) -> Self {
        self.work_limit = Some(limit);
        self
    }

    /// The config this optimizer was built with.
    #[must_use]
    pub const fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    /// Deviation cost of a chunk of `size` tokens.
    ///
    /// Linear in the distance from `optimal_size`, measured in multiples of
    /// `optimal_size`:
    ///
    /// ```rust
    /// use optislab::{ChunkOptimizer, ChunkingConfig};
    ///
    /// let optimizer = ChunkOptimizer::new(ChunkingConfig::new(100).with_max(200)).unwrap();
    /// assert_eq!(optimizer.deviation_cost(100), 0.0);
    /// assert_eq!(optimizer.deviation_cost(50), 1.0);  // lambda 2.0 × 0.5
    /// assert_eq!(optimizer.deviation_cost(150), 1.0);
    /// ```
    #[must_use]
    pub fn deviation_cost(&self, size: usize) -> f64 {
        let optimal = self.config.optimal_size as f64;
        self.config.lambda_size * (size as f64 - optimal).abs() / optimal
    }

    /// Full cost of a single chunk of `size` tokens.
    #[must_use]
    pub fn chunk_cost(&self, size: usize) -> f64 {
        self.config.chunk_penalty + self.deviation_cost(size)
    }

    /// Optimal partition of sentences with the given token counts.
    ///
    /// An empty slice yields an empty partition.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InfeasiblePartition`] if the work limit is exceeded.
    pub fn partition(&self, token_counts: &[usize]) -> Result<Partition> {
        self.search(token_counts, None)
    }

    /// Optimal partition with an extra cost for each cut.
    ///
    /// `boundary_costs[i]` is charged when a chunk ends after sentence `i`
    /// (i.e. the cut between sentences `i` and `i + 1`). The slice must have
    /// one entry per gap, `token_counts.len() - 1`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the slice has the wrong length or
    /// holds a negative or non-finite cost, and
    /// [`Error::InfeasiblePartition`] if the work limit is exceeded.
    pub fn partition_with_boundaries(
        &self,
        token_counts: &[usize],
        boundary_costs: &[f64],
    ) -> Result<Partition> {
        let gaps = token_counts.len().saturating_sub(1);
        if boundary_costs.len() != gaps {
            return Err(Error::Configuration(format!(
                "expected {gaps} boundary costs, got {}",
                boundary_costs.len()
            )));
        }
        if let Some(bad) = boundary_costs.iter().find(|c| !c.is_finite() || **c < 0.0) {
            return Err(Error::Configuration(format!(
                "boundary costs must be finite and non-negative, got {bad}"
            )));
        }
        self.search(token_counts, Some(boundary_costs))
    }

    fn search(&self, token_counts: &[usize], boundary_costs: Option<&[f64]>) -> Result<Partition> {
        let n = token_counts.len();
        if n == 0 {
            return Ok(Partition {
                spans: vec![],
                cost: 0.0,
            });
        }

        let max_size = self.config.max_size;
        let mut best = vec![Cell::UNREACHED; n + 1];
        best[n] = Cell {
            cost: 0.0,
            chunks: 0,
            next: n,
        };
        let mut evaluated: u64 = 0;

        for j in (0..n).rev() {
            let mut size = 0usize;
            let mut cell = Cell::UNREACHED;

            for i in (j + 1)..=n {
                size = size.saturating_add(token_counts[i - 1]);
                // A lone sentence may exceed the ceiling; nothing else may.
                if size > max_size && i - j > 1 {
                    break;
                }

                evaluated += 1;
                if let Some(limit) = self.work_limit {
                    if evaluated > limit {
                        return Err(Error::InfeasiblePartition(format!(
                            "search exceeded {limit} candidate chunks for {n} sentences"
                        )));
                    }
                }

                let rest = best[i];
                if !rest.is_reached() {
                    continue;
                }

                let cut = match boundary_costs {
                    Some(costs) if i < n => costs[i - 1],
                    _ => 0.0,
                };
                let candidate = Cell {
                    cost: self.chunk_cost(size) + cut + rest.cost,
                    chunks: rest.chunks + 1,
                    next: i,
                };
                if is_better(&candidate, &cell) {
                    cell = candidate;
                }
            }

            best[j] = cell;
        }

        let head = best[0];
        if !head.is_reached() {
            return Err(Error::InfeasiblePartition(format!(
                "no valid chunking for {n} sentences"
            )));
        }

        let mut spans = Vec::with_capacity(head.chunks);
        let mut start = 0;
        while start < n {
            let end = best[start].next;
            spans.push(start..end);
            start = end;
        }

        trace!(
            sentences = n,
            chunks = spans.len(),
            cost = head.cost,
            evaluated,
            "partition found"
        );

        Ok(Partition {
            spans,
            cost: head.cost,
        })
    }
}

/// Lower cost wins; within tolerance, fewer chunks win; otherwise the
/// incumbent (the earlier split) is kept.
fn is_better(candidate: &Cell, incumbent: &Cell) -> bool {
    if !incumbent.is_reached() {
        return true;
    }
    let scale = candidate.cost.abs().max(incumbent.cost.abs()).max(1.0);
    let diff = candidate.cost - incumbent.cost;
    if diff < -COST_TOLERANCE * scale {
        true
    } else if diff > COST_TOLERANCE * scale {
        false
    } else {
        candidate.chunks < incumbent.chunks
    }
}
