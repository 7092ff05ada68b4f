//! Memoized, cycle-safe structural equality between entities
//!
//! An [`EntityMatcher`] lives for one comparison run. Structural graphs are
//! cyclic (an annotation value may name a type whose annotations lead back to
//! the same annotation), so a pair whose comparison is already running is
//! assumed equal when it is reached again. A `false` answer never depends on
//! such an assumption being right and is cached at once; a `true` answer is
//! only cached when every assumption it consulted belonged to the pair
//! itself or to pairs nested below it.
//!
//! The matcher is single-threaded: caches are updated in place through
//! `RefCell` while comparisons recurse.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use crate::aspects;
use crate::entity::Entity;

/// Granularity of a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchMode {
    /// Identity-defining, cross-version-stable attributes only.
    Similar,
    /// Everything `Similar` compares plus modifiers, annotations, bodies,
    /// signatures and outgoing dependencies.
    Identical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchState {
    /// Comparison running at the given recursion depth.
    InProgress(usize),
    Equal,
    Unequal,
}

#[derive(Debug, Default, Clone, Copy)]
struct PairState {
    similar: Option<MatchState>,
    identical: Option<MatchState>,
}

impl PairState {
    fn get(&self, mode: MatchMode) -> Option<MatchState> {
        match mode {
            MatchMode::Similar => self.similar,
            MatchMode::Identical => self.identical,
        }
    }

    fn slot(&mut self, mode: MatchMode) -> &mut Option<MatchState> {
        match mode {
            MatchMode::Similar => &mut self.similar,
            MatchMode::Identical => &mut self.identical,
        }
    }
}

/// Counters describing one matcher's work.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MatcherStats {
    /// Full structural comparisons run.
    pub comparisons: usize,
    /// Answers served from `pair_state`.
    pub cache_hits: usize,
    /// Re-entries answered by the in-progress assumption.
    pub assumptions: usize,
    /// `true` answers left uncached because they rested on an outer assumption.
    pub provisional: usize,
}

type PairKey<'s> = (Entity<'s>, Entity<'s>);

pub struct EntityMatcher<'s> {
    similar_cache: RefCell<HashMap<Entity<'s>, u64>>,
    identical_cache: RefCell<HashMap<Entity<'s>, u64>>,
    pair_state: RefCell<HashMap<PairKey<'s>, PairState>>,
    depth: Cell<usize>,
    /// Shallowest in-progress depth consulted by the running comparison.
    lowest_assumption: Cell<usize>,
    stats: Cell<MatcherStats>,
}

impl<'s> EntityMatcher<'s> {
    pub fn new() -> Self {
        EntityMatcher {
            similar_cache: RefCell::new(HashMap::new()),
            identical_cache: RefCell::new(HashMap::new()),
            pair_state: RefCell::new(HashMap::new()),
            depth: Cell::new(0),
            lowest_assumption: Cell::new(usize::MAX),
            stats: Cell::new(MatcherStats::default()),
        }
    }

    pub fn stats(&self) -> MatcherStats {
        self.stats.get()
    }

    fn bump(&self, update: impl FnOnce(&mut MatcherStats)) {
        let mut stats = self.stats.get();
        update(&mut stats);
        self.stats.set(stats);
    }

    /// Structural equality of `a` and `b` under `mode`.
    pub fn matches(&self, a: Entity<'s>, b: Entity<'s>, mode: MatchMode) -> bool {
        if a == b {
            return true;
        }
        let key = if a <= b { (a, b) } else { (b, a) };

        let state = self.pair_state.borrow().get(&key).and_then(|s| s.get(mode));
        match state {
            Some(MatchState::Equal) => {
                self.bump(|s| s.cache_hits += 1);
                return true;
            }
            Some(MatchState::Unequal) => {
                self.bump(|s| s.cache_hits += 1);
                return false;
            }
            Some(MatchState::InProgress(depth)) => {
                self.bump(|s| s.assumptions += 1);
                self.lowest_assumption
                    .set(self.lowest_assumption.get().min(depth));
                return true;
            }
            None => {}
        }

        let depth = self.depth.get();
        self.set_state(key, mode, Some(MatchState::InProgress(depth)));
        self.depth.set(depth + 1);
        let outer_lowest = self.lowest_assumption.replace(usize::MAX);
        self.bump(|s| s.comparisons += 1);

        let equal = aspects::structural_equal(key.0, key.1, mode, self);

        let lowest = self.lowest_assumption.get();
        self.depth.set(depth);
        if !equal || lowest >= depth {
            let settled = if equal { MatchState::Equal } else { MatchState::Unequal };
            self.set_state(key, mode, Some(settled));
            self.lowest_assumption.set(outer_lowest);
        } else {
            self.bump(|s| s.provisional += 1);
            self.set_state(key, mode, None);
            self.lowest_assumption.set(outer_lowest.min(lowest));
        }
        equal
    }

    fn set_state(&self, key: PairKey<'s>, mode: MatchMode, state: Option<MatchState>) {
        let mut pairs = self.pair_state.borrow_mut();
        let entry = pairs.entry(key).or_default();
        *entry.slot(mode) = state;
    }

    /// Cached structural hash of `entity` under `mode`.
    pub fn structural_hash(&self, entity: Entity<'s>, mode: MatchMode) -> u64 {
        let cache = match mode {
            MatchMode::Similar => &self.similar_cache,
            MatchMode::Identical => &self.identical_cache,
        };
        let cached = cache.borrow().get(&entity).copied();
        if let Some(hash) = cached {
            return hash;
        }
        let hash = aspects::structural_hash(entity, mode);
        cache.borrow_mut().insert(entity, hash);
        hash
    }

    /// Wrap `entity` so it can key a hash map under `mode`.
    pub fn wrap(&self, entity: Entity<'s>, mode: MatchMode) -> EntityWrapper<'_, 's> {
        EntityWrapper {
            matcher: self,
            entity,
            mode,
            hash: self.structural_hash(entity, mode),
        }
    }

    /// Positional comparison of two sequences.
    pub fn match_ordered<L, R>(&self, left: L, right: R, mode: MatchMode) -> bool
    where
        L: IntoIterator<Item = Entity<'s>>,
        L::IntoIter: ExactSizeIterator,
        R: IntoIterator<Item = Entity<'s>>,
        R::IntoIter: ExactSizeIterator,
    {
        let (left, right) = (left.into_iter(), right.into_iter());
        if left.len() != right.len() {
            return false;
        }
        left.zip(right).all(|(a, b)| self.matches(a, b, mode))
    }

    /// Multiset comparison of two sequences.
    pub fn match_non_ordered<L, R>(&self, left: L, right: R, mode: MatchMode) -> bool
    where
        L: IntoIterator<Item = Entity<'s>>,
        L::IntoIter: ExactSizeIterator,
        R: IntoIterator<Item = Entity<'s>>,
        R::IntoIter: ExactSizeIterator,
    {
        let (left, right) = (left.into_iter(), right.into_iter());
        if left.len() != right.len() {
            return false;
        }
        let mut multiplicity: HashMap<EntityWrapper<'_, 's>, usize> = HashMap::new();
        for entity in left {
            *multiplicity.entry(self.wrap(entity, mode)).or_insert(0) += 1;
        }
        for entity in right {
            match multiplicity.get_mut(&self.wrap(entity, mode)) {
                Some(count) if *count > 0 => *count -= 1,
                _ => return false,
            }
        }
        true
    }
}

impl Default for EntityMatcher<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Hash-map key over an entity: hashes with the cached structural hash and
/// compares through [`EntityMatcher::matches`], so colliding hashes are
/// told apart by the real matcher.
#[derive(Clone, Copy)]
pub struct EntityWrapper<'m, 's> {
    matcher: &'m EntityMatcher<'s>,
    entity: Entity<'s>,
    mode: MatchMode,
    hash: u64,
}

impl<'m, 's> EntityWrapper<'m, 's> {
    pub fn structural_hash(&self) -> u64 {
        self.hash
    }
}

impl Hash for EntityWrapper<'_, '_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl PartialEq for EntityWrapper<'_, '_> {
    fn eq(&self, other: &Self) -> bool {
        // Equal entities always share a hash, so a mismatch is a cheap no.
        self.mode == other.mode
            && self.hash == other.hash
            && self.matcher.matches(self.entity, other.entity, self.mode)
    }
}

impl Eq for EntityWrapper<'_, '_> {}

impl std::fmt::Debug for EntityWrapper<'_, '_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityWrapper")
            .field("entity", &self.entity)
            .field("mode", &self.mode)
            .field("hash", &self.hash)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use crate::snapshot::SnapshotBuilder;

    fn annotated_class(name: &str, marker: &str) -> crate::snapshot::Snapshot {
        let mut builder = SnapshotBuilder::new(name);
        let class = builder
            .add_element(ElementId::ROOT, ElementKind::Class, "com.acme.Foo")
            .unwrap();
        let self_ref = builder.add_type(TypeInfo::reference("com.acme.Foo", Some(class)));
        let annotation = builder.add_annotation(Annotation {
            annotation_type: self_ref,
            values: vec![AnnotationEntry {
                name: "value".to_string(),
                value: AnnotationValue::Literal(marker.to_string()),
            }],
        });
        let facets = builder.facets_mut(class).unwrap();
        facets.annotations = Some(vec![annotation]);
        facets.class_like = Some(ClassLike {
            binary_name: "com.acme.Foo".to_string(),
            superclass: None,
            interfaces: vec![],
        });
        builder.build().unwrap()
    }

    #[test]
    fn test_wrapper_hash_follows_matcher() {
        let left = annotated_class("left", "a");
        let right = annotated_class("right", "a");
        let matcher = EntityMatcher::new();
        let a = Entity::element(&left, ElementId(1));
        let b = Entity::element(&right, ElementId(1));

        for mode in [MatchMode::Similar, MatchMode::Identical] {
            assert!(matcher.matches(a, b, mode));
            assert_eq!(matcher.wrap(a, mode), matcher.wrap(b, mode));
            assert_eq!(
                matcher.wrap(a, mode).structural_hash(),
                matcher.wrap(b, mode).structural_hash()
            );
        }
    }

    #[test]
    fn test_results_are_cached() {
        let left = annotated_class("left", "a");
        let right = annotated_class("right", "b");
        let matcher = EntityMatcher::new();
        let a = Entity::element(&left, ElementId(1));
        let b = Entity::element(&right, ElementId(1));

        assert!(!matcher.matches(a, b, MatchMode::Identical));
        let comparisons = matcher.stats().comparisons;
        assert!(!matcher.matches(b, a, MatchMode::Identical));
        assert_eq!(matcher.stats().comparisons, comparisons);
        assert!(matcher.stats().cache_hits >= 1);
    }

    #[test]
    fn test_non_ordered_uses_multiplicity() {
        let left = annotated_class("left", "a");
        let right = annotated_class("right", "a");
        let matcher = EntityMatcher::new();
        let a = Entity::element(&left, ElementId(1));
        let root_a = Entity::element(&left, ElementId::ROOT);
        let b = Entity::element(&right, ElementId(1));
        let root_b = Entity::element(&right, ElementId::ROOT);

        assert!(matcher.match_non_ordered([a, root_a], [root_b, b], MatchMode::Similar));
        assert!(!matcher.match_non_ordered([a, a], [root_b, b], MatchMode::Similar));
        assert!(!matcher.match_ordered([a, root_a], [root_b, b], MatchMode::Similar));
        assert!(!matcher.match_ordered([a], [b, root_b], MatchMode::Similar));
    }
}
