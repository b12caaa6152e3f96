//! The location catalogue: built once at load, immutable and lock-free for
//! reads thereafter. Combines exact, normalized, prefix (trie), and fuzzy
//! (edit-distance) lookup per the `lookup`/`search`/`nearby` contract.

use super::model::{fuzzy_tolerance, levenshtein_distance, normalize_name, Location};
use super::trie::LocationTrie;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// A bounded least-recently-used memo for edit-distance pairs. Fuzzy search
/// over the catalogue re-evaluates many identical pairs within one lookup
/// session, so memoizing pays for itself quickly; bounding it keeps memory
/// flat across a long-running process.
struct EditDistanceMemo {
    capacity: usize,
    map: HashMap<(String, String), usize>,
    order: std::collections::VecDeque<(String, String)>,
}

impl EditDistanceMemo {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            map: HashMap::new(),
            order: std::collections::VecDeque::new(),
        }
    }

    fn get_or_compute(&mut self, a: &str, b: &str) -> usize {
        let key = if a <= b {
            (a.to_string(), b.to_string())
        } else {
            (b.to_string(), a.to_string())
        };
        if let Some(&d) = self.map.get(&key) {
            return d;
        }
        let d = levenshtein_distance(&key.0, &key.1);
        if self.map.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.map.remove(&oldest);
            }
        }
        self.map.insert(key.clone(), d);
        self.order.push_back(key);
        d
    }
}

const EDIT_DISTANCE_MEMO_CAPACITY: usize = 4096;

#[derive(Default, Clone)]
pub struct SearchFilters {
    pub region: Option<String>,
    pub prefecture: Option<String>,
}

pub struct LocationIndex {
    by_name: HashMap<String, Arc<Location>>,
    by_normalized: HashMap<String, Arc<Location>>,
    by_region: HashMap<String, Vec<Arc<Location>>>,
    by_prefecture: HashMap<String, Vec<Arc<Location>>>,
    trie: LocationTrie,
    all: Vec<Arc<Location>>,
    edit_memo: Mutex<EditDistanceMemo>,
}

impl LocationIndex {
    /// Build the index once from a flat catalogue. Sub-second for 10^4 entries:
    /// every step here is O(1) amortized per location.
    pub fn build(locations: Vec<Location>) -> Self {
        let mut by_name = HashMap::new();
        let mut by_normalized = HashMap::new();
        let mut by_region: HashMap<String, Vec<Arc<Location>>> = HashMap::new();
        let mut by_prefecture: HashMap<String, Vec<Arc<Location>>> = HashMap::new();
        let mut trie = LocationTrie::new();
        let mut all = Vec::with_capacity(locations.len());

        for location in locations {
            let arc = Arc::new(location);
            by_name.insert(arc.name.clone(), Arc::clone(&arc));
            by_normalized.insert(arc.normalized_name.clone(), Arc::clone(&arc));
            if let Some(region) = &arc.region {
                by_region.entry(region.clone()).or_default().push(Arc::clone(&arc));
            }
            if let Some(prefecture) = &arc.prefecture {
                by_prefecture
                    .entry(prefecture.clone())
                    .or_default()
                    .push(Arc::clone(&arc));
            }
            trie.insert(&arc.normalized_name, Arc::clone(&arc));
            all.push(arc);
        }

        Self {
            by_name,
            by_normalized,
            by_region,
            by_prefecture,
            trie,
            all,
            edit_memo: Mutex::new(EditDistanceMemo::new(EDIT_DISTANCE_MEMO_CAPACITY)),
        }
    }

    /// `lookup` never raises for an unknown name; callers fall back to
    /// synthetic coordinates if they have them.
    pub fn lookup(&self, name: &str) -> Option<Arc<Location>> {
        if let Some(found) = self.by_name.get(name) {
            return Some(Arc::clone(found));
        }
        let normalized = normalize_name(name);
        if let Some(found) = self.by_normalized.get(&normalized) {
            return Some(Arc::clone(found));
        }
        let prefix_hits = self.trie.search_prefix(&normalized);
        if !prefix_hits.is_empty() {
            // Unique or shortest-name candidate wins.
            return prefix_hits
                .into_iter()
                .min_by_key(|l| l.normalized_name.len())
                .map(Some)
                .unwrap_or(None);
        }
        self.fuzzy_lookup(&normalized)
    }

    fn fuzzy_lookup(&self, normalized_query: &str) -> Option<Arc<Location>> {
        let tolerance = fuzzy_tolerance(normalized_query.chars().count());
        let mut memo = self.edit_memo.lock().expect("edit distance memo poisoned");
        let mut best: Option<(usize, &Arc<Location>)> = None;
        for candidate in &self.all {
            let d = memo.get_or_compute(normalized_query, &candidate.normalized_name);
            if d <= tolerance && best.map(|(bd, _)| d < bd).unwrap_or(true) {
                best = Some((d, candidate));
            }
        }
        best.map(|(_, loc)| Arc::clone(loc))
    }

    /// Search with optional region/prefecture filters. Stable display order:
    /// catalogue insertion order.
    pub fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
        fuzzy: bool,
        limit: usize,
    ) -> Vec<Arc<Location>> {
        let normalized_query = normalize_name(query);
        let tolerance = fuzzy_tolerance(normalized_query.chars().count());
        let mut memo = self.edit_memo.lock().expect("edit distance memo poisoned");

        let mut results: Vec<Arc<Location>> = Vec::new();
        for candidate in &self.all {
            if let Some(region) = &filters.region {
                if candidate.region.as_deref() != Some(region.as_str()) {
                    continue;
                }
            }
            if let Some(prefecture) = &filters.prefecture {
                if candidate.prefecture.as_deref() != Some(prefecture.as_str()) {
                    continue;
                }
            }

            let matches = candidate.name.to_lowercase().contains(&normalized_query)
                || candidate.normalized_name.contains(&normalized_query)
                || candidate
                    .prefecture
                    .as_deref()
                    .map(|p| p.to_lowercase().contains(&normalized_query))
                    .unwrap_or(false)
                || (fuzzy
                    && memo.get_or_compute(&normalized_query, &candidate.normalized_name)
                        <= tolerance);

            if matches {
                results.push(Arc::clone(candidate));
                if results.len() >= limit {
                    break;
                }
            }
        }
        results
    }

    /// Locations within `radius_km` of `location`, ascending by distance.
    pub fn nearby(&self, location: &Location, radius_km: f64, limit: usize) -> Vec<Arc<Location>> {
        let mut with_distance: Vec<(f64, Arc<Location>)> = self
            .all
            .iter()
            .filter_map(|candidate| {
                location
                    .distance_to(candidate)
                    .filter(|d| *d <= radius_km)
                    .map(|d| (d, Arc::clone(candidate)))
            })
            .collect();
        with_distance.sort_by(|a, b| a.0.partial_cmp(&b.0).expect("distance is never NaN"));
        with_distance
            .into_iter()
            .take(limit)
            .map(|(_, loc)| loc)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }
}
