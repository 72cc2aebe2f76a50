//! PATHFINDER - Route Resolver
//!
//! Turns the pool set into an undirected token graph and answers
//! "how do I get from token A to token B" for every swap and stake.
//!
//! # Responsibilities
//! - Build the trade graph once per run
//! - Resolve hop-minimal paths (BFS) or stitched paths over a pool subset
//! - Memoize every answer, "no path" included, for the run's lifetime
//! - Pick random token pairs and pools for actions

pub mod graph;
pub mod stitch;

pub use graph::TradeGraph;

use dashmap::DashMap;
use gauntlet_metrics::GauntletMetrics;
use gauntlet_types::{Pool, Token};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Pool list length the stake pool draw is padded to
pub const POOL_DRAW_TARGET: usize = 20;

/// Pathfinder errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PathfinderError {
    #[error("Not enough tokens to pick a pair: {0}")]
    NotEnoughTokens(usize),

    #[error("No pools available")]
    NoPools,

    #[error("Unknown path setting: {0}")]
    UnknownSetting(String),
}

/// Ordered token sequence; consecutive tokens share a pool.
/// A single token is the degenerate no-swap path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Path(Vec<Token>);

impl Path {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self(tokens)
    }

    pub fn degenerate(token: Token) -> Self {
        Self(vec![token])
    }

    pub fn tokens(&self) -> &[Token] {
        &self.0
    }

    pub fn into_tokens(self) -> Vec<Token> {
        self.0
    }

    pub fn hops(&self) -> usize {
        self.0.len().saturating_sub(1)
    }

    pub fn is_degenerate(&self) -> bool {
        self.0.len() == 1
    }

    pub fn first(&self) -> Option<Token> {
        self.0.first().copied()
    }

    pub fn last(&self) -> Option<Token> {
        self.0.last().copied()
    }

    pub fn reversed(&self) -> Self {
        Self(self.0.iter().rev().copied().collect())
    }

    /// Every consecutive pair is adjacent in `graph`
    pub fn is_valid_in(&self, graph: &TradeGraph) -> bool {
        !self.0.is_empty() && self.0.windows(2).all(|hop| graph.adjacent(&hop[0], &hop[1]))
    }
}

/// Resolution algorithm used on cache misses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Hop-minimal breadth-first search
    #[default]
    Bfs,
    /// Direct, shared intermediate, then recursive gap filling
    Stitched,
}

impl FromStr for Strategy {
    type Err = PathfinderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bfs" => Ok(Strategy::Bfs),
            "stitched" => Ok(Strategy::Stitched),
            other => Err(PathfinderError::UnknownSetting(format!("strategy {}", other))),
        }
    }
}

/// How a resolution populates the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    /// A→B and B→A are resolved and cached independently
    Directional,
    /// One resolution stores both directions
    #[default]
    Symmetric,
}

impl FromStr for CacheMode {
    type Err = PathfinderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "directional" => Ok(CacheMode::Directional),
            "symmetric" => Ok(CacheMode::Symmetric),
            other => Err(PathfinderError::UnknownSetting(format!("cache mode {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PathfinderConfig {
    pub strategy: Strategy,
    pub cache_mode: CacheMode,
}

impl PathfinderConfig {
    /// From configured setting names
    pub fn parse(strategy: &str, cache_mode: &str) -> Result<Self, PathfinderError> {
        Ok(Self {
            strategy: strategy.parse()?,
            cache_mode: cache_mode.parse()?,
        })
    }
}

/// Cache counters snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Path resolver with a per-instance cache
pub struct Pathfinder {
    graph: TradeGraph,
    config: PathfinderConfig,
    cache: DashMap<(Token, Token), Option<Path>>,
    hits: AtomicU64,
    misses: AtomicU64,
    metrics: Option<Arc<GauntletMetrics>>,
}

impl Pathfinder {
    pub fn new(pools: &[Pool], config: PathfinderConfig) -> Self {
        let graph = TradeGraph::new(pools);
        tracing::info!(
            "PATHFINDER: Graph built with {} pools, {} tokens ({:?}, {:?} cache)",
            pools.len(),
            graph.tokens().len(),
            config.strategy,
            config.cache_mode
        );
        Self {
            graph,
            config,
            cache: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<GauntletMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> PathfinderConfig {
        self.config
    }

    pub fn graph(&self) -> &TradeGraph {
        &self.graph
    }

    /// Swap candidate set: every token seen in a pool
    pub fn tokens(&self) -> &[Token] {
        self.graph.tokens()
    }

    pub fn pools(&self) -> &[Pool] {
        self.graph.pools()
    }

    /// Path from `from` to `to`, or `None` if they are not connected.
    /// Same-token requests return the degenerate path without touching the
    /// cache.
    pub fn resolve(&self, from: Token, to: Token) -> Option<Path> {
        if from == to {
            return Some(Path::degenerate(from));
        }

        if let Some(cached) = self.cache.get(&(from, to)) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            self.observe("hit");
            return cached.value().clone();
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        self.observe("miss");

        let resolved = match self.config.strategy {
            Strategy::Bfs => self.graph.bfs(from, to),
            Strategy::Stitched => stitch::resolve_within(self.graph.pools(), from, to),
        };

        if resolved.is_none() {
            tracing::debug!("PATHFINDER: No route {:?} -> {:?}", from, to);
            if let Some(metrics) = &self.metrics {
                metrics.paths.unreachable.inc();
            }
        }

        // First writer wins so every reader of a key sees one answer
        let stored = self
            .cache
            .entry((from, to))
            .or_insert(resolved)
            .value()
            .clone();

        if self.config.cache_mode == CacheMode::Symmetric {
            self.cache
                .entry((to, from))
                .or_insert_with(|| stored.as_ref().map(Path::reversed));
        }

        stored
    }

    /// Two distinct tokens from the swap candidate set
    pub fn random_pair<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<(Token, Token), PathfinderError> {
        let tokens = self.graph.tokens();
        if tokens.len() < 2 {
            return Err(PathfinderError::NotEnoughTokens(tokens.len()));
        }

        let first = rng.gen_range(0..tokens.len());
        let mut second = rng.gen_range(0..tokens.len() - 1);
        if second >= first {
            second += 1;
        }

        Ok((tokens[first], tokens[second]))
    }

    /// A pool drawn from the pool list padded to [`POOL_DRAW_TARGET`]
    /// entries with random repeats, which favours pools drawn twice.
    pub fn random_pool<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Pool, PathfinderError> {
        let pools = self.graph.pools();
        if pools.is_empty() {
            return Err(PathfinderError::NoPools);
        }

        let mut padded = pools.to_vec();
        while padded.len() < POOL_DRAW_TARGET {
            padded.push(pools[rng.gen_range(0..pools.len())]);
        }

        padded.choose(rng).copied().ok_or(PathfinderError::NoPools)
    }

    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.cache.len(),
        }
    }

    fn observe(&self, result: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.paths.cache.with_label_values(&[result]).inc();
        }
    }
}
