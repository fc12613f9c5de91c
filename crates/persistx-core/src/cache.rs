//! Second-level cache model
//!
//! A cache shared by every session of one session factory. Entries are kept
//! per region (one region per entity table), each region bounded and
//! governed by a [`CacheStrategy`]. Sessions decide *when* to consult and
//! update the cache; this module only stores entries and counts activity.

use crate::boundary::Record;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Region name for `entity`
///
/// SQLite resolves table names case-insensitively, so `Employee` and
/// `employee` must share one region and one strategy.
pub fn region_name(entity: &str) -> String {
    entity.to_ascii_lowercase()
}

/// Consistency strategy of a cache region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheStrategy {
    /// Entities are never updated once cached
    ReadOnly,
    /// Writes through the session replace the cached entry
    ReadWrite,
    /// Writes invalidate the cached entry; the next load repopulates it
    NonstrictReadWrite,
    /// Writes reach the cache only when the surrounding transaction commits
    Transactional,
}

impl CacheStrategy {
    pub const ALL: [CacheStrategy; 4] = [
        CacheStrategy::ReadOnly,
        CacheStrategy::ReadWrite,
        CacheStrategy::NonstrictReadWrite,
        CacheStrategy::Transactional,
    ];

    /// Canonical descriptor name
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStrategy::ReadOnly => "read-only",
            CacheStrategy::ReadWrite => "read-write",
            CacheStrategy::NonstrictReadWrite => "nonstrict-read-write",
            CacheStrategy::Transactional => "transactional",
        }
    }

    /// Whether entities in a region with this strategy may be modified
    pub fn allows_updates(&self) -> bool {
        !matches!(self, CacheStrategy::ReadOnly)
    }
}

impl fmt::Display for CacheStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CacheStrategy::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == s)
            .ok_or_else(|| format!("unknown cache strategy '{}'", s))
    }
}

/// Counters for cache activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStatistics {
    pub hits: u64,
    pub misses: u64,
    pub puts: u64,
    pub evictions: u64,
}

impl CacheStatistics {
    fn absorb(&mut self, other: &CacheStatistics) {
        self.hits += other.hits;
        self.misses += other.misses;
        self.puts += other.puts;
        self.evictions += other.evictions;
    }
}

/// A single bounded cache region
#[derive(Debug)]
pub struct RegionCache {
    strategy: CacheStrategy,
    max_entries: usize,
    entries: HashMap<i64, Record>,
    /// Insertion order, oldest first
    order: VecDeque<i64>,
    stats: CacheStatistics,
}

impl RegionCache {
    pub fn new(strategy: CacheStrategy, max_entries: usize) -> Self {
        Self {
            strategy,
            max_entries: max_entries.max(1),
            entries: HashMap::new(),
            order: VecDeque::new(),
            stats: CacheStatistics::default(),
        }
    }

    pub fn strategy(&self) -> CacheStrategy {
        self.strategy
    }

    pub fn get(&mut self, id: i64) -> Option<Record> {
        match self.entries.get(&id) {
            Some(record) => {
                self.stats.hits += 1;
                Some(record.clone())
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Insert or replace an entry, evicting the oldest entry when full
    pub fn put(&mut self, id: i64, record: Record) {
        self.stats.puts += 1;
        if self.entries.insert(id, record).is_some() {
            return;
        }
        self.order.push_back(id);
        while self.entries.len() > self.max_entries {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            if self.entries.remove(&oldest).is_some() {
                self.stats.evictions += 1;
            }
        }
    }

    pub fn invalidate(&mut self, id: i64) -> bool {
        let removed = self.entries.remove(&id).is_some();
        if removed {
            self.order.retain(|entry| *entry != id);
        }
        removed
    }

    pub fn contains(&self, id: i64) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub fn statistics(&self) -> CacheStatistics {
        self.stats
    }
}

/// Owner of all regions of one registry
///
/// Regions are created lazily on first access. When the cache is disabled
/// every lookup reports "not cached" and nothing is stored.
#[derive(Debug)]
pub struct CacheManager {
    enabled: bool,
    default_strategy: CacheStrategy,
    overrides: BTreeMap<String, CacheStrategy>,
    max_entries: usize,
    regions: Mutex<HashMap<String, RegionCache>>,
}

impl CacheManager {
    pub fn new(
        enabled: bool,
        default_strategy: CacheStrategy,
        overrides: BTreeMap<String, CacheStrategy>,
        max_entries: usize,
    ) -> Self {
        Self {
            enabled,
            default_strategy,
            overrides: overrides
                .into_iter()
                .map(|(entity, strategy)| (region_name(&entity), strategy))
                .collect(),
            max_entries,
            regions: Mutex::new(HashMap::new()),
        }
    }

    /// A manager that never caches anything
    pub fn disabled() -> Self {
        Self::new(false, CacheStrategy::ReadWrite, BTreeMap::new(), 1)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Strategy governing `entity`, or `None` when the entity is not cached
    pub fn strategy_for(&self, entity: &str) -> Option<CacheStrategy> {
        if !self.enabled {
            return None;
        }
        Some(
            self.overrides
                .get(&region_name(entity))
                .copied()
                .unwrap_or(self.default_strategy),
        )
    }

    pub fn get(&self, entity: &str, id: i64) -> Option<Record> {
        self.with_region(entity, |region| region.get(id)).flatten()
    }

    pub fn put(&self, entity: &str, id: i64, record: Record) {
        self.with_region(entity, |region| region.put(id, record));
    }

    pub fn invalidate(&self, entity: &str, id: i64) -> bool {
        self.with_region(entity, |region| region.invalidate(id))
            .unwrap_or(false)
    }

    pub fn contains(&self, entity: &str, id: i64) -> bool {
        self.lock()
            .get(&region_name(entity))
            .is_some_and(|region| region.contains(id))
    }

    /// Drop every entry of every region; counters are kept
    pub fn clear(&self) {
        for region in self.lock().values_mut() {
            region.clear();
        }
    }

    /// Aggregated counters across all regions
    pub fn statistics(&self) -> CacheStatistics {
        let mut total = CacheStatistics::default();
        for region in self.lock().values() {
            total.absorb(&region.statistics());
        }
        total
    }

    pub fn region_statistics(&self, entity: &str) -> Option<CacheStatistics> {
        self.lock()
            .get(&region_name(entity))
            .map(RegionCache::statistics)
    }

    fn with_region<T>(&self, entity: &str, f: impl FnOnce(&mut RegionCache) -> T) -> Option<T> {
        let strategy = self.strategy_for(entity)?;
        let mut regions = self.lock();
        let region = regions
            .entry(region_name(entity))
            .or_insert_with(|| RegionCache::new(strategy, self.max_entries));
        Some(f(region))
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, RegionCache>> {
        self.regions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn record(name: &str) -> Record {
        let mut r = Record::new();
        r.insert("name".to_string(), serde_json::json!(name));
        r
    }

    #[test]
    fn test_entity_names_map_to_regions_case_insensitively() {
        let mut overrides = BTreeMap::new();
        overrides.insert("Employee".to_string(), CacheStrategy::ReadOnly);
        let cache = CacheManager::new(true, CacheStrategy::ReadWrite, overrides, 10);

        assert_eq!(cache.strategy_for("employee"), Some(CacheStrategy::ReadOnly));
        assert_eq!(cache.strategy_for("EMPLOYEE"), Some(CacheStrategy::ReadOnly));

        cache.put("EMPLOYEE", 1, record("ada"));
        assert!(cache.contains("employee", 1));
        assert_eq!(cache.get("Employee", 1), Some(record("ada")));
        assert!(cache.invalidate("employee", 1));
        assert_eq!(cache.region_statistics("EmPlOyEe").unwrap().puts, 1);
    }

    #[test]
    fn test_region_hit_and_miss_counters() {
        let mut region = RegionCache::new(CacheStrategy::ReadWrite, 10);
        assert!(region.get(1).is_none());
        region.put(1, record("alice"));
        assert_eq!(region.get(1), Some(record("alice")));

        let stats = region.statistics();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.puts, 1);
    }

    #[test]
    fn test_region_evicts_oldest_insert() {
        let mut region = RegionCache::new(CacheStrategy::ReadOnly, 2);
        region.put(1, record("a"));
        region.put(2, record("b"));
        region.put(1, record("a2"));
        region.put(3, record("c"));

        assert!(!region.contains(1));
        assert!(region.contains(2));
        assert!(region.contains(3));
        assert_eq!(region.statistics().evictions, 1);
    }

    #[test]
    fn test_region_invalidate() {
        let mut region = RegionCache::new(CacheStrategy::NonstrictReadWrite, 4);
        region.put(7, record("x"));
        assert!(region.invalidate(7));
        assert!(!region.invalidate(7));
        assert!(region.is_empty());
    }

    #[test]
    fn test_manager_override_and_default_strategy() {
        let mut overrides = BTreeMap::new();
        overrides.insert("country".to_string(), CacheStrategy::ReadOnly);
        let manager = CacheManager::new(true, CacheStrategy::ReadWrite, overrides, 100);

        assert_eq!(manager.strategy_for("country"), Some(CacheStrategy::ReadOnly));
        assert_eq!(manager.strategy_for("employee"), Some(CacheStrategy::ReadWrite));
    }

    #[test]
    fn test_disabled_manager_stores_nothing() {
        let manager = CacheManager::disabled();
        manager.put("employee", 1, record("a"));
        assert!(manager.get("employee", 1).is_none());
        assert_eq!(manager.strategy_for("employee"), None);
        assert_eq!(manager.statistics(), CacheStatistics::default());
    }

    #[test]
    fn test_manager_clear_keeps_counters() {
        let manager = CacheManager::new(true, CacheStrategy::ReadWrite, BTreeMap::new(), 10);
        manager.put("employee", 1, record("a"));
        manager.put("address", 1, record("b"));
        assert!(manager.get("employee", 1).is_some());

        manager.clear();

        assert!(!manager.contains("employee", 1));
        assert!(!manager.contains("address", 1));
        let stats = manager.statistics();
        assert_eq!(stats.puts, 2);
        assert_eq!(stats.hits, 1);
    }

    #[test]
    fn test_strategy_deserializes_kebab_case() {
        #[derive(Deserialize)]
        struct Wrapper {
            strategy: CacheStrategy,
        }
        let w: Wrapper = toml::from_str("strategy = \"nonstrict-read-write\"").unwrap();
        assert_eq!(w.strategy, CacheStrategy::NonstrictReadWrite);
    }

    proptest! {
        #[test]
        fn prop_strategy_name_parses_back(idx in 0usize..4) {
            let strategy = CacheStrategy::ALL[idx];
            prop_assert_eq!(strategy.as_str().parse::<CacheStrategy>(), Ok(strategy));
        }

        #[test]
        fn prop_unknown_names_rejected(name in "[a-z]{1,12}") {
            prop_assume!(!CacheStrategy::ALL.iter().any(|s| s.as_str() == name));
            prop_assert!(name.parse::<CacheStrategy>().is_err());
        }

        #[test]
        fn prop_region_never_exceeds_capacity(cap in 1usize..8, ids in proptest::collection::vec(0i64..32, 0..64)) {
            let mut region = RegionCache::new(CacheStrategy::ReadWrite, cap);
            for id in ids {
                region.put(id, Record::new());
                prop_assert!(region.len() <= cap);
            }
        }
    }
}
