//! Multi-version ordered map.
//!
//! Every key keeps a chain of versions ordered by commit timestamp. A reader
//! at timestamp `ts` sees, per key, the newest version committed at or before
//! `ts`; a tombstone version hides the key.

use std::collections::BTreeMap;
use std::ops::Bound;

use crate::format::Mutation;

#[derive(Debug, Clone)]
struct Version {
    commit_ts: u64,
    value: Option<Vec<u8>>,
}

/// Ordered map of version chains, oldest version first.
#[derive(Debug, Default)]
pub struct VersionedMap {
    entries: BTreeMap<Vec<u8>, Vec<Version>>,
}

impl VersionedMap {
    pub fn new() -> Self {
        Self::default()
    }

    fn visible(chain: &[Version], ts: u64) -> Option<&[u8]> {
        chain
            .iter()
            .rev()
            .find(|v| v.commit_ts <= ts)
            .and_then(|v| v.value.as_deref())
    }

    /// Value of `key` as of `ts`.
    pub fn get_at(&self, key: &[u8], ts: u64) -> Option<&[u8]> {
        self.entries.get(key).and_then(|chain| Self::visible(chain, ts))
    }

    /// Commit timestamp of the newest version of `key`, tombstones included.
    pub fn latest_commit_ts(&self, key: &[u8]) -> Option<u64> {
        self.entries.get(key).and_then(|chain| chain.last()).map(|v| v.commit_ts)
    }

    /// Apply one transaction's write set under `commit_ts`.
    pub fn apply(&mut self, commit_ts: u64, mutations: &[Mutation]) {
        for m in mutations {
            let value = match m {
                Mutation::Put { value, .. } => Some(value.clone()),
                Mutation::Delete { .. } => None,
            };
            let chain = self.entries.entry(m.key().to_vec()).or_default();
            // A later mutation of the same key in one commit replaces the earlier one.
            match chain.last_mut() {
                Some(last) if last.commit_ts == commit_ts => last.value = value,
                _ => chain.push(Version { commit_ts, value }),
            }
        }
    }

    /// First visible entry with key above `lower` and below `upper`, ascending.
    pub fn next_visible(
        &self,
        lower: Bound<&[u8]>,
        upper: Option<&[u8]>,
        ts: u64,
    ) -> Option<(&[u8], &[u8])> {
        // BTreeMap::range panics on inverted bounds.
        if let (Bound::Included(l) | Bound::Excluded(l), Some(u)) = (lower, upper) {
            if l >= u {
                return None;
            }
        }
        let upper = match upper {
            Some(u) => Bound::Excluded(u),
            None => Bound::Unbounded,
        };
        self.entries
            .range::<[u8], _>((lower, upper))
            .find_map(|(k, chain)| Self::visible(chain, ts).map(|v| (k.as_slice(), v)))
    }

    /// Last visible entry with key below `upper`, descending.
    pub fn prev_visible(&self, upper: Bound<&[u8]>, ts: u64) -> Option<(&[u8], &[u8])> {
        self.entries
            .range::<[u8], _>((Bound::Unbounded, upper))
            .rev()
            .find_map(|(k, chain)| Self::visible(chain, ts).map(|v| (k.as_slice(), v)))
    }

    /// Number of keys with a live value as of `ts`.
    pub fn live_count(&self, ts: u64) -> usize {
        self.entries.values().filter(|chain| Self::visible(chain, ts).is_some()).count()
    }

    /// Drop versions no reader at or after `safe_ts` can observe. Returns the
    /// number of versions removed.
    pub fn prune(&mut self, safe_ts: u64) -> usize {
        let mut removed = 0;
        self.entries.retain(|_, chain| {
            // Keep the newest version at or below the safe point and everything after it.
            if let Some(keep_from) = chain.iter().rposition(|v| v.commit_ts <= safe_ts) {
                removed += keep_from;
                chain.drain(..keep_from);
            }
            if chain.len() == 1 && chain[0].value.is_none() && chain[0].commit_ts <= safe_ts {
                removed += 1;
                return false;
            }
            true
        });
        removed
    }

    /// Total stored versions, tombstones included.
    pub fn version_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }
}
