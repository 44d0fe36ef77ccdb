//! Key and value encoding.
//!
//! Every instance owns the prefix `dir/name/` in the shared keyspace; a
//! logical key `k` is stored at `dir/name/k`. Zero-length values are stored as
//! [`EMPTY_VALUE_SENTINEL`] because the store rejects them.

use crate::config::NamespaceBound;

/// Stored in place of a zero-length value. A caller value equal to these
/// exact bytes reads back as empty.
pub const EMPTY_VALUE_SENTINEL: &[u8] = b"NULL";

/// Appended to the prefix to form the default namespace upper bound.
pub const NAMESPACE_SENTINEL: &[u8] = b"~";

/// Maps logical keys of one instance to physical keys and back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCodec {
    prefix: Vec<u8>,
    bound: NamespaceBound,
}

impl KeyCodec {
    pub fn new(dir: &str, name: &str, bound: NamespaceBound) -> Self {
        Self { prefix: format!("{dir}/{name}/").into_bytes(), bound }
    }

    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    /// `prefix || logical`. An empty `logical` yields the namespace minimum.
    pub fn physical_key(&self, logical: &[u8]) -> Vec<u8> {
        let mut key = Vec::with_capacity(self.prefix.len() + logical.len());
        key.extend_from_slice(&self.prefix);
        key.extend_from_slice(logical);
        key
    }

    /// Strip the prefix, or `None` if `physical` lies outside the namespace.
    pub fn logical_key<'a>(&self, physical: &'a [u8]) -> Option<&'a [u8]> {
        physical.strip_prefix(self.prefix.as_slice())
    }

    pub fn contains(&self, physical: &[u8]) -> bool {
        physical.starts_with(&self.prefix)
    }

    /// Exclusive upper end of the namespace.
    pub fn upper_bound(&self) -> Vec<u8> {
        match self.bound {
            NamespaceBound::Sentinel => self.physical_key(NAMESPACE_SENTINEL),
            NamespaceBound::PrefixSuccessor => {
                prefix_successor(&self.prefix)
                    .unwrap_or_else(|| self.physical_key(NAMESPACE_SENTINEL))
            }
        }
    }
}

/// Smallest key greater than every key starting with `prefix`; `None` when
/// the prefix is all `0xff`.
fn prefix_successor(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut succ = prefix.to_vec();
    while let Some(last) = succ.pop() {
        if last < u8::MAX {
            succ.push(last + 1);
            return Some(succ);
        }
    }
    None
}

/// Key of the coordination marker for `dir/name`. Lives outside every
/// instance prefix.
pub fn state_key(dir: &str, name: &str) -> Vec<u8> {
    format!("nskv.state/{dir}/{name}/nskv.state").into_bytes()
}

pub fn encode_value(value: &[u8]) -> &[u8] {
    if value.is_empty() {
        EMPTY_VALUE_SENTINEL
    } else {
        value
    }
}

pub fn decode_value(stored: &[u8]) -> &[u8] {
    if stored == EMPTY_VALUE_SENTINEL {
        &[]
    } else {
        stored
    }
}
