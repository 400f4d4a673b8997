//! Provides a consistent-hash ring which deterministically maps keys to cluster nodes.
//!
//! Each node is projected onto the ring as a number of **virtual nodes** - synthetic ring
//! points derived from the node's name plus a replica index. A key is routed to the node
//! owning the first ring point at or after the key's own hash (wrapping around at the end).
//!
//! The virtual node multiplier smooths the load distribution for small clusters and uneven
//! hash distributions: with enough ring points per node, each node owns many small arcs of
//! the hash space instead of a few large ones. The multiplier is a per-ring constant.
//!
//! Note that membership is assumed to be static for the lifetime of a ring: nodes are added
//! during setup and the ring is only read afterwards.
use fnv::FnvHashMap;

/// The hash function used to place nodes and keys on the ring.
pub type HashFn = Box<dyn Fn(&[u8]) -> u32 + Send + Sync>;

/// Maps keys to nodes using consistent hashing over a sorted virtual-node ring.
///
/// # Examples
/// ```
/// # use ganymede::ring::HashRing;
/// let mut ring = HashRing::new(50);
/// ring.add_nodes(vec!["cache-1", "cache-2", "cache-3"]);
///
/// // Routing is deterministic: the same key always elects the same node...
/// let node = ring.get("some-key").unwrap().to_owned();
/// assert_eq!(ring.get("some-key"), Some(node.as_str()));
/// ```
pub struct HashRing {
    replicas: usize,
    hash: HashFn,
    ring: Vec<u32>,
    nodes: FnvHashMap<u32, String>,
}

impl HashRing {
    /// Creates a new ring which projects each node onto **replicas** virtual nodes, using
    /// CRC32/IEEE to place nodes and keys.
    ///
    /// # Panics
    /// Panics if **replicas** is 0.
    pub fn new(replicas: usize) -> Self {
        Self::with_hash(replicas, |data| crc32fast::hash(data))
    }

    /// Creates a new ring which uses the given hash function instead of CRC32/IEEE.
    ///
    /// # Panics
    /// Panics if **replicas** is 0.
    pub fn with_hash(replicas: usize, hash: impl Fn(&[u8]) -> u32 + Send + Sync + 'static) -> Self {
        assert!(replicas > 0, "A hash ring needs at least one replica per node!");

        HashRing {
            replicas,
            hash: Box::new(hash),
            ring: Vec::new(),
            nodes: FnvHashMap::default(),
        }
    }

    /// Adds the given nodes to the ring.
    ///
    /// For each node, **replicas** ring points are derived by hashing the replica index
    /// concatenated with the node name. Should two ring points collide, the node added last
    /// owns the point - with a realistic hash and replica count this is of no practical
    /// concern.
    pub fn add_nodes<I, S>(&mut self, nodes: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for node in nodes {
            let node = node.as_ref();
            for replica in 0..self.replicas {
                let point = (self.hash)(format!("{}{}", replica, node).as_bytes());
                self.ring.push(point);
                let _ = self.nodes.insert(point, node.to_owned());
            }
        }

        self.ring.sort_unstable();
    }

    /// Elects the node responsible for the given key.
    ///
    /// Returns **None** if the ring is empty. Otherwise the node owning the first ring point
    /// at or after the key's hash is returned, wrapping around to the smallest point when the
    /// key hashes beyond the largest one.
    ///
    /// # Examples
    /// ```
    /// # use ganymede::ring::HashRing;
    /// let mut ring = HashRing::new(3);
    ///
    /// // An empty ring cannot elect anything...
    /// assert_eq!(ring.get("key"), None);
    ///
    /// // ...but as soon as a node is present, every key is owned by somebody.
    /// ring.add_nodes(vec!["cache-1"]);
    /// assert_eq!(ring.get("key"), Some("cache-1"));
    /// ```
    pub fn get(&self, key: &str) -> Option<&str> {
        if self.ring.is_empty() {
            return None;
        }

        let hash = (self.hash)(key.as_bytes());

        // Find the first ring point at or after the hash of the key. partition_point returns
        // the index of the first point for which the predicate flips to false, which is
        // exactly the element we are looking for - or the ring length if the key hashes
        // beyond the last point, in which case we wrap around.
        let index = self.ring.partition_point(|&point| point < hash);
        let point = self.ring[index % self.ring.len()];

        self.nodes.get(&point).map(String::as_str)
    }

    /// Returns the number of virtual nodes on the ring.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Determines if any node has been added yet.
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use crate::ring::HashRing;

    /// Creates a ring whose hash simply parses the given bytes as a decimal number.
    ///
    /// This makes the placement of virtual nodes obvious: node "6" with 3 replicas owns the
    /// ring points 6, 16 and 26 (replica index prepended to the name).
    fn numeric_ring() -> HashRing {
        HashRing::with_hash(3, |data| {
            std::str::from_utf8(data)
                .expect("non UTF-8 ring key")
                .parse::<u32>()
                .expect("non numeric ring key")
        })
    }

    #[test]
    fn keys_are_routed_to_the_expected_nodes() {
        let mut ring = numeric_ring();
        ring.add_nodes(vec!["6", "4", "2"]);

        // The ring now contains 2, 4, 6, 12, 14, 16, 22, 24, 26...
        assert_eq!(ring.len(), 9);

        // An exact match is owned by the equal ring point...
        assert_eq!(ring.get("2"), Some("2"));
        // ...any other key by the next point on the ring...
        assert_eq!(ring.get("11"), Some("2"));
        assert_eq!(ring.get("23"), Some("4"));
        // ...wrapping around at the end.
        assert_eq!(ring.get("27"), Some("2"));
    }

    #[test]
    fn added_nodes_take_over_their_share() {
        let mut ring = numeric_ring();
        ring.add_nodes(vec!["6", "4", "2"]);
        assert_eq!(ring.get("27"), Some("2"));

        // Adding node "8" introduces the ring points 8, 18 and 28, so the key 27 is now
        // owned by the new node...
        ring.add_nodes(vec!["8"]);
        assert_eq!(ring.get("27"), Some("8"));
    }

    #[test]
    fn routing_is_deterministic() {
        let mut ring = HashRing::new(50);
        ring.add_nodes(vec!["alpha", "beta", "gamma"]);

        for key in ["a", "b", "c", "hotkey", "another key", ""] {
            let elected = ring.get(key).unwrap().to_owned();
            for _ in 0..10 {
                assert_eq!(ring.get(key), Some(elected.as_str()));
            }
        }
    }

    #[test]
    fn every_key_is_owned_once_a_node_exists() {
        let mut ring = HashRing::new(1);
        ring.add_nodes(vec!["solo"]);

        for key in ["", "a", "z", "0", "anything at all"] {
            assert_eq!(ring.get(key), Some("solo"));
        }
    }

    #[test]
    fn an_empty_ring_elects_nobody() {
        let ring = HashRing::new(50);
        assert_eq!(ring.get("key"), None);
        assert_eq!(ring.is_empty(), true);
    }
}
