//! Provides the abstractions via which a group talks to the other nodes of its cluster.
//!
//! The library itself is transport agnostic: all it needs is a [PeerPicker](PeerPicker) which
//! elects the node responsible for a key, and a [PeerGetter](PeerGetter) per remote node which
//! performs the actual fetch. How the bytes travel (HTTP, RESP, gRPC, ...) and how they are
//! encoded on the wire is entirely up to the embedding application - implementations should
//! pick a compact binary encoding.
//!
//! A ring-backed default implementation is provided with [ClusterPicker](ClusterPicker), which
//! only leaves the per-node transport to the embedder.
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::ring::HashRing;

/// A request for a single key, addressed to the cache of a remote node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// The name of the group to consult on the remote node.
    pub group: String,
    /// The key to fetch.
    pub key: String,
}

/// The payload answered by a remote node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    /// The raw bytes of the requested value.
    pub value: Vec<u8>,
}

/// Fetches values from one specific remote node.
///
/// Implementations wrap whatever transport the application uses to talk to its cluster. A
/// transport failure or a malformed response is simply reported as an error - the calling
/// group recovers by loading from the local data source.
#[async_trait]
pub trait PeerGetter: Send + Sync {
    /// Fetches the value for the given request from the remote node.
    async fn fetch(&self, request: FetchRequest) -> anyhow::Result<FetchResponse>;
}

/// Elects the peer responsible for a key.
///
/// Note that an election is expected to be consistent: as long as the cluster membership is
/// stable, the same key must elect the same peer on every call - otherwise the cluster loses
/// its cache locality.
pub trait PeerPicker: Send + Sync {
    /// Returns the getter of the remote node responsible for the given key or **None** if
    /// the key is owned by the local node (or no peer is available).
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerGetter>>;
}

/// A [PeerPicker](PeerPicker) which routes keys via a consistent-hash ring.
///
/// The picker knows the name of the local node and the getters of all remote nodes. All node
/// names (the local one included) are projected onto the ring, so that every node of the
/// cluster performs the same election for any given key. If the ring elects the local node,
/// no peer is returned and the caller loads locally.
///
/// Cluster membership is fixed once the picker has been built.
///
/// # Examples
/// ```
/// # use ganymede::peers::{ClusterPicker, FetchRequest, FetchResponse, PeerGetter, PeerPicker};
/// # use async_trait::async_trait;
/// # use std::sync::Arc;
/// struct UnreachablePeer;
///
/// #[async_trait]
/// impl PeerGetter for UnreachablePeer {
///     async fn fetch(&self, _request: FetchRequest) -> anyhow::Result<FetchResponse> {
///         Err(anyhow::anyhow!("unreachable"))
///     }
/// }
///
/// let mut picker = ClusterPicker::new("cache-1", 50);
/// picker.add_peer("cache-2", Arc::new(UnreachablePeer));
/// picker.add_peer("cache-3", Arc::new(UnreachablePeer));
///
/// // Some keys are owned by the local node, the others by one of the two peers. Which is
/// // which is deterministic for a fixed membership...
/// let locally_owned = (0..100)
///     .filter(|index| picker.pick_peer(&format!("key-{}", index)).is_none())
///     .count();
/// assert!(locally_owned > 0);
/// assert!(locally_owned < 100);
/// ```
pub struct ClusterPicker {
    local_node: String,
    ring: HashRing,
    getters: HashMap<String, Arc<dyn PeerGetter>>,
}

impl ClusterPicker {
    /// Creates a picker for a cluster in which the local node is known under the given name.
    ///
    /// The local node is immediately placed on the ring; remote nodes are announced via
    /// [add_peer](ClusterPicker::add_peer). **replicas** is the virtual-node multiplier of
    /// the underlying ring.
    pub fn new(local_node: impl Into<String>, replicas: usize) -> Self {
        let local_node = local_node.into();
        let mut ring = HashRing::new(replicas);
        ring.add_nodes([local_node.as_str()]);

        ClusterPicker {
            local_node,
            ring,
            getters: HashMap::new(),
        }
    }

    /// Announces a remote node along with the getter used to reach it.
    pub fn add_peer(&mut self, node: impl Into<String>, getter: Arc<dyn PeerGetter>) {
        let node = node.into();
        self.ring.add_nodes([node.as_str()]);
        let _ = self.getters.insert(node, getter);
    }

    /// Returns the name under which the local node participates in the cluster.
    pub fn local_node(&self) -> &str {
        &self.local_node
    }
}

impl PeerPicker for ClusterPicker {
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerGetter>> {
        let node = self.ring.get(key)?;
        if node == self.local_node {
            return None;
        }

        match self.getters.get(node) {
            Some(getter) => Some(Arc::clone(getter)),
            None => {
                log::warn!(
                    "The ring elected node '{}' for key '{}' but no getter is registered for it. \
                     Loading locally...",
                    node,
                    key
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use crate::peers::{ClusterPicker, FetchRequest, FetchResponse, PeerGetter, PeerPicker};

    struct EchoPeer {
        node: String,
    }

    #[async_trait]
    impl PeerGetter for EchoPeer {
        async fn fetch(&self, request: FetchRequest) -> anyhow::Result<FetchResponse> {
            Ok(FetchResponse {
                value: format!("{}:{}/{}", self.node, request.group, request.key).into_bytes(),
            })
        }
    }

    fn picker_for(local_node: &str) -> ClusterPicker {
        let mut picker = ClusterPicker::new(local_node, 50);
        for node in ["cache-1", "cache-2", "cache-3"] {
            if node != local_node {
                picker.add_peer(
                    node,
                    Arc::new(EchoPeer {
                        node: node.to_owned(),
                    }),
                );
            }
        }
        picker
    }

    #[test]
    fn the_local_node_is_never_picked_as_peer() {
        crate::testing::test_async(async {
            let picker = picker_for("cache-1");

            for index in 0..100 {
                let key = format!("key-{}", index);
                if let Some(peer) = picker.pick_peer(&key) {
                    let response = peer
                        .fetch(FetchRequest {
                            group: "test".to_owned(),
                            key: key.clone(),
                        })
                        .await
                        .unwrap();

                    // Whatever was elected, it is one of the two remote nodes...
                    let answer = String::from_utf8(response.value).unwrap();
                    assert_eq!(answer.starts_with("cache-1"), false);
                }
            }
        });
    }

    #[test]
    fn all_cluster_members_agree_on_the_election() {
        // Each member runs its own picker (with itself as the local node). For any key, all
        // of them have to agree on the owning node...
        let pickers = vec![
            picker_for("cache-1"),
            picker_for("cache-2"),
            picker_for("cache-3"),
        ];

        for index in 0..50 {
            let key = format!("key-{}", index);

            // The owner is the member which routes the key to itself - and for any key there
            // must be exactly one...
            let owners = pickers
                .iter()
                .filter(|picker| picker.pick_peer(&key).is_none())
                .count();

            assert_eq!(owners, 1);
        }
    }
}
