//! Temporal chain linkage.
//!
//! Samples, sample data and annotations are all doubly linked lists ordered
//! by time. The builders here compute each element's neighbours in a single
//! pass after an explicit sort; callers turn the neighbour keys into tokens.
//!
//! Keys are deduplicated before linking, so an element never links to a
//! copy of itself. Groups never see each other's keys.

use std::collections::BTreeMap;

/// One element of a chain with its neighbours.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainLink<K> {
    pub key: K,
    pub prev: Option<K>,
    pub next: Option<K>,
}

impl<K> ChainLink<K> {
    pub fn is_head(&self) -> bool {
        self.prev.is_none()
    }

    pub fn is_tail(&self) -> bool {
        self.next.is_none()
    }
}

/// Link a single group.
///
/// The keys are sorted ascending and deduplicated, then every element points
/// at its adjacent elements. Head has no `prev`, tail has no `next`.
pub fn build_chain<K, I>(keys: I) -> Vec<ChainLink<K>>
where
    K: Ord + Clone,
    I: IntoIterator<Item = K>,
{
    let mut ordered: Vec<K> = keys.into_iter().collect();
    ordered.sort();
    ordered.dedup();

    let last = ordered.len().saturating_sub(1);
    ordered
        .iter()
        .enumerate()
        .map(|(i, key)| ChainLink {
            key: key.clone(),
            prev: (i > 0).then(|| ordered[i - 1].clone()),
            next: (i < last).then(|| ordered[i + 1].clone()),
        })
        .collect()
}

/// Link every group independently.
///
/// `items` yields `(group, key)` pairs in any order. The result maps each
/// group to its own chain.
pub fn build_grouped_chains<G, K, I>(items: I) -> BTreeMap<G, Vec<ChainLink<K>>>
where
    G: Ord,
    K: Ord + Clone,
    I: IntoIterator<Item = (G, K)>,
{
    let mut groups: BTreeMap<G, Vec<K>> = BTreeMap::new();
    for (group, key) in items {
        groups.entry(group).or_default().push(key);
    }
    groups
        .into_iter()
        .map(|(group, keys)| (group, build_chain(keys)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walk<K: Ord + Clone>(chain: &[ChainLink<K>]) -> Vec<K> {
        let next: BTreeMap<K, Option<K>> = chain
            .iter()
            .map(|l| (l.key.clone(), l.next.clone()))
            .collect();
        let mut current = chain.iter().find(|l| l.is_head()).map(|l| l.key.clone());
        let mut visited = Vec::new();
        while let Some(key) = current {
            visited.push(key.clone());
            current = next[&key].clone();
        }
        visited
    }

    // -- build_chain -------------------------------------------------------

    #[test]
    fn empty_input_gives_empty_chain() {
        let chain: Vec<ChainLink<i64>> = build_chain(Vec::new());
        assert!(chain.is_empty());
    }

    #[test]
    fn single_element_is_head_and_tail() {
        let chain = build_chain([42]);
        assert_eq!(chain.len(), 1);
        assert!(chain[0].is_head());
        assert!(chain[0].is_tail());
    }

    #[test]
    fn three_samples_link_in_order() {
        let chain = build_chain([100, 200, 300]);
        assert_eq!(
            chain,
            vec![
                ChainLink { key: 100, prev: None, next: Some(200) },
                ChainLink { key: 200, prev: Some(100), next: Some(300) },
                ChainLink { key: 300, prev: Some(200), next: None },
            ]
        );
    }

    #[test]
    fn unsorted_input_is_sorted_first() {
        let chain = build_chain([300, 100, 200]);
        let keys: Vec<i64> = chain.iter().map(|l| l.key).collect();
        assert_eq!(keys, vec![100, 200, 300]);
    }

    #[test]
    fn duplicate_keys_collapse() {
        let chain = build_chain([100, 100, 200]);
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0].next, Some(200));
    }

    #[test]
    fn walk_visits_every_element_once() {
        let chain = build_chain([5, 1, 9, 3, 7]);
        assert_eq!(chain.iter().filter(|l| l.is_head()).count(), 1);
        assert_eq!(chain.iter().filter(|l| l.is_tail()).count(), 1);
        assert_eq!(walk(&chain), vec![1, 3, 5, 7, 9]);
    }

    #[test]
    fn tuple_keys_break_timestamp_ties() {
        let chain = build_chain([(100, 2), (100, 1), (50, 9)]);
        let keys: Vec<(i64, usize)> = chain.iter().map(|l| l.key).collect();
        assert_eq!(keys, vec![(50, 9), (100, 1), (100, 2)]);
    }

    // -- build_grouped_chains ----------------------------------------------

    #[test]
    fn groups_never_link_across() {
        let items = vec![
            ("a", 100),
            ("b", 150),
            ("a", 200),
            ("b", 250),
            ("a", 300),
        ];
        let chains = build_grouped_chains(items);
        assert_eq!(walk(&chains["a"]), vec![100, 200, 300]);
        assert_eq!(walk(&chains["b"]), vec![150, 250]);
        for link in &chains["a"] {
            assert!(link.prev.map_or(true, |p| p % 100 == 0));
            assert!(link.next.map_or(true, |n| n % 100 == 0));
        }
    }
}
