//! Tool Result Cache
//!
//! Caches outcomes of read-class operations keyed by (name, args) so repeated
//! queries don't hit the document backend. Write-class operations invalidate
//! the entries they may have made stale:
//!
//! - fine-grained: a write listed in the invalidation map removes entries whose
//!   operation name matches one of its read patterns
//! - coarse-grained: any other write removes every entry in its namespace
//!   (the `<app>_` prefix)
//!
//! Uses `Mutex<HashMap>` plus an insertion-order queue instead of `mini-moka`:
//! entries need per-entry TTLs, strict oldest-first eviction, and predicate
//! removal. A poisoned lock degrades to a miss rather than an error.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use office_copilot_core::{OperationArgs, OperationOutcome};

use crate::models::settings::CacheConfig;
use crate::utils::error::AppResult;

/// Cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Entries removed by `invalidate`
    pub invalidations: u64,
    pub size: usize,
}

/// A cached read result.
#[derive(Debug, Clone)]
struct CacheEntry {
    operation_name: String,
    result: OperationOutcome,
    inserted_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.inserted_at) >= self.ttl
    }
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    /// Keys in insertion order, oldest first
    order: VecDeque<String>,
    hits: u64,
    misses: u64,
    invalidations: u64,
}

impl CacheState {
    fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.order.retain(|k| k != key);
        Some(entry)
    }

    fn remove_where(&mut self, predicate: impl Fn(&CacheEntry) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !predicate(entry));
        let entries = &self.entries;
        self.order.retain(|k| entries.contains_key(k));
        before - self.entries.len()
    }
}

/// Bounded, TTL-based cache of read-operation results.
pub struct ToolResultCache {
    config: CacheConfig,
    read_patterns: Vec<Regex>,
    write_patterns: Vec<Regex>,
    invalidation_map: HashMap<String, Vec<Regex>>,
    state: Mutex<CacheState>,
}

impl ToolResultCache {
    /// Build a cache, compiling every configured pattern.
    pub fn new(config: CacheConfig) -> AppResult<Self> {
        let read_patterns = compile_all(&config.read_patterns)?;
        let write_patterns = compile_all(&config.write_patterns)?;
        let invalidation_map = config
            .invalidation_map
            .iter()
            .map(|(write, reads)| -> AppResult<(String, Vec<Regex>)> {
                Ok((write.clone(), compile_all(reads)?))
            })
            .collect::<AppResult<HashMap<_, _>>>()?;

        Ok(Self {
            config,
            read_patterns,
            write_patterns,
            invalidation_map,
            state: Mutex::new(CacheState::default()),
        })
    }

    /// Whether results of `name` may be cached.
    pub fn is_cacheable(&self, name: &str) -> bool {
        self.read_patterns.iter().any(|p| p.is_match(name))
    }

    /// Whether `name` may change cached answers.
    pub fn is_invalidating(&self, name: &str) -> bool {
        self.write_patterns.iter().any(|p| p.is_match(name))
    }

    /// TTL for `name`: exact override, then name heuristics, then default.
    pub fn ttl_for(&self, name: &str) -> Duration {
        let ms = if let Some(ms) = self.config.ttl_overrides.get(name) {
            *ms
        } else if contains_any(name, &self.config.short_ttl_keywords) {
            self.config.short_ttl_ms
        } else if contains_any(name, &self.config.long_ttl_keywords) {
            self.config.long_ttl_ms
        } else {
            self.config.default_ttl_ms
        };
        Duration::from_millis(ms)
    }

    /// Look up a cached result. Expired entries are dropped and reported as misses.
    pub fn get(&self, name: &str, args: &OperationArgs) -> Option<OperationOutcome> {
        if !self.is_cacheable(name) {
            return None;
        }
        let key = cache_key(name, args);
        let Ok(mut state) = self.state.lock() else {
            return None;
        };

        let expired = match state.entries.get(&key) {
            Some(entry) if !entry.is_expired(Instant::now()) => {
                let result = entry.result.clone();
                state.hits += 1;
                debug!(operation = name, "Tool cache hit");
                return Some(result);
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            state.remove(&key);
        }
        state.misses += 1;
        debug!(operation = name, expired, "Tool cache miss");
        None
    }

    /// Store a result for a cacheable operation. Evicts the oldest entry when full.
    pub fn put(&self, name: &str, args: &OperationArgs, result: &OperationOutcome) {
        if !self.is_cacheable(name) || self.config.max_entries == 0 {
            return;
        }
        let key = cache_key(name, args);
        let entry = CacheEntry {
            operation_name: name.to_string(),
            result: OperationOutcome {
                undo: None,
                ..result.clone()
            },
            inserted_at: Instant::now(),
            ttl: self.ttl_for(name),
        };
        let Ok(mut state) = self.state.lock() else {
            return;
        };

        state.remove(&key);
        while state.entries.len() >= self.config.max_entries {
            let Some(oldest) = state.order.pop_front() else {
                break;
            };
            state.entries.remove(&oldest);
            debug!(key = %oldest, "Tool cache evicted oldest entry");
        }
        state.order.push_back(key.clone());
        state.entries.insert(key, entry);
    }

    /// Remove entries a write-class operation may have made stale.
    ///
    /// Returns the number of entries removed. Non-write operations are ignored.
    pub fn invalidate(&self, name: &str) -> usize {
        if !self.is_invalidating(name) {
            return 0;
        }
        let Ok(mut state) = self.state.lock() else {
            return 0;
        };

        let removed = match self.invalidation_map.get(name) {
            Some(patterns) => state.remove_where(|entry| {
                patterns.iter().any(|p| p.is_match(&entry.operation_name))
            }),
            None => {
                let prefix = namespace_prefix(name);
                state.remove_where(|entry| entry.operation_name.starts_with(prefix))
            }
        };
        state.invalidations += removed as u64;
        debug!(operation = name, removed, "Tool cache invalidated");
        removed
    }

    /// Drop every entry.
    pub fn clear(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.entries.clear();
            state.order.clear();
        }
    }

    pub fn stats(&self) -> CacheStats {
        match self.state.lock() {
            Ok(state) => CacheStats {
                hits: state.hits,
                misses: state.misses,
                invalidations: state.invalidations,
                size: state.entries.len(),
            },
            Err(_) => CacheStats::default(),
        }
    }
}

/// `<name>:<canonical JSON args>`
///
/// `serde_json::Map` keeps keys sorted, so equal maps serialize identically.
/// The full text is the key, so distinct arguments never share an entry.
fn cache_key(name: &str, args: &OperationArgs) -> String {
    let canonical = serde_json::to_string(args).unwrap_or_default();
    format!("{name}:{canonical}")
}

/// "word_replace_text" -> "word_"
fn namespace_prefix(name: &str) -> &str {
    match name.find('_') {
        Some(i) => &name[..=i],
        None => name,
    }
}

fn contains_any(name: &str, keywords: &[String]) -> bool {
    let lower = name.to_lowercase();
    keywords.iter().any(|k| lower.contains(&k.to_lowercase()))
}

fn compile_all(patterns: &[String]) -> AppResult<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| Regex::new(p).map_err(Into::into))
        .collect()
}
