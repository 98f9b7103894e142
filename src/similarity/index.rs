//! Inverted index from domains to the proteins carrying them.

use rustc_hash::FxHashMap;

/// Dense handle for an interned protein id.
pub type EntityIdx = u32;

/// Maps each domain to its carrier set and each protein to its distinct
/// domain count.
///
/// Protein ids are interned to dense `u32` handles so carrier sets and the
/// pair accumulator stay compact. Memory grows with the number of
/// (protein, domain) memberships, not with the number of protein pairs.
#[derive(Debug, Default, Clone)]
pub struct DomainIndex {
    ids: Vec<String>,
    lookup: FxHashMap<String, EntityIdx>,
    domain_counts: Vec<u32>,
    carriers: FxHashMap<String, Vec<EntityIdx>>,
}

impl DomainIndex {
    /// Starts an empty index builder.
    pub fn builder() -> DomainIndexBuilder {
        DomainIndexBuilder::default()
    }

    /// Builds an index from `(protein id, domain ids)` pairs.
    ///
    /// Input order does not matter and repeated domain tags on one protein
    /// count once.
    pub fn from_entities<I, S, D, T>(entities: I) -> Self
    where
        I: IntoIterator<Item = (S, D)>,
        S: AsRef<str>,
        D: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let mut builder = Self::builder();
        for (entity, domains) in entities {
            let idx = builder.add_entity(entity.as_ref());
            for domain in domains {
                builder.add_membership_idx(idx, domain.as_ref());
            }
        }
        builder.build()
    }

    /// Number of proteins known to the index, including ones with no domains.
    pub fn entity_count(&self) -> usize {
        self.ids.len()
    }

    /// Number of distinct domains.
    pub fn domain_count_total(&self) -> usize {
        self.carriers.len()
    }

    /// Number of distinct (protein, domain) memberships.
    pub fn membership_count(&self) -> usize {
        self.carriers.values().map(Vec::len).sum()
    }

    /// Distinct domain count of a protein, or `None` if it is unknown.
    pub fn domain_count(&self, entity_id: &str) -> Option<u32> {
        self.position(entity_id).map(|idx| self.domain_counts[idx as usize])
    }

    /// Every domain with its carrier handles, each carrier list sorted and
    /// free of duplicates.
    pub fn carrier_sets(&self) -> impl Iterator<Item = (&str, &[EntityIdx])> {
        self.carriers
            .iter()
            .map(|(domain, set)| (domain.as_str(), set.as_slice()))
    }

    /// Protein id for an interned handle.
    pub fn id(&self, idx: EntityIdx) -> &str {
        &self.ids[idx as usize]
    }

    /// Distinct domain count for an interned handle.
    pub fn count(&self, idx: EntityIdx) -> u32 {
        self.domain_counts[idx as usize]
    }

    fn position(&self, entity_id: &str) -> Option<EntityIdx> {
        self.lookup.get(entity_id).copied()
    }
}

/// Accumulates memberships in any order, then normalises them into a
/// [`DomainIndex`].
#[derive(Debug, Default)]
pub struct DomainIndexBuilder {
    ids: Vec<String>,
    lookup: FxHashMap<String, EntityIdx>,
    carriers: FxHashMap<String, Vec<EntityIdx>>,
}

impl DomainIndexBuilder {
    /// Registers a protein, returning its handle. Re-registering is a no-op.
    pub fn add_entity(&mut self, entity_id: &str) -> EntityIdx {
        if let Some(&idx) = self.lookup.get(entity_id) {
            return idx;
        }
        let idx = self.ids.len() as EntityIdx;
        self.ids.push(entity_id.to_string());
        self.lookup.insert(entity_id.to_string(), idx);
        idx
    }

    /// Records that `entity_id` carries `domain_id`.
    pub fn add_membership(&mut self, entity_id: &str, domain_id: &str) {
        let idx = self.add_entity(entity_id);
        self.add_membership_idx(idx, domain_id);
    }

    fn add_membership_idx(&mut self, idx: EntityIdx, domain_id: &str) {
        let domain_id = domain_id.trim();
        if domain_id.is_empty() {
            return;
        }
        match self.carriers.get_mut(domain_id) {
            Some(set) => set.push(idx),
            None => {
                self.carriers.insert(domain_id.to_string(), vec![idx]);
            }
        }
    }

    /// Deduplicates carrier sets and derives per-protein domain counts.
    pub fn build(self) -> DomainIndex {
        let mut carriers = self.carriers;
        let mut domain_counts = vec![0u32; self.ids.len()];

        for set in carriers.values_mut() {
            set.sort_unstable();
            set.dedup();
            for &idx in set.iter() {
                domain_counts[idx as usize] += 1;
            }
        }

        DomainIndex {
            ids: self.ids,
            lookup: self.lookup,
            domain_counts,
            carriers,
        }
    }
}
