//! The header store: verified header metadata per chain and height.

use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as};
use tracing::debug;

use crate::{
    config::ParentLinkage,
    error::{HeaderSyncError, OrphanReason},
    storage::{load, save, Storage},
    validator::BlockTime,
};

/// Key prefix of the stored headers.
pub const HEADERS_PREFIX: &str = "headers";
/// Key prefix of the current height pointers.
pub const CURRENT_HEIGHT_PREFIX: &str = "current_height";

/// Metadata kept for every verified header.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredHeader {
    /// Header height
    pub height: u64,
    /// Header hash
    #[serde_as(as = "Hex")]
    pub hash: Vec<u8>,
    /// Hash of the parent header
    #[serde_as(as = "Hex")]
    pub parent_hash: Vec<u8>,
    /// Header time
    pub time: BlockTime,
    /// Application state hash after the parent block
    #[serde_as(as = "Hex")]
    pub app_hash: Vec<u8>,
    /// Hash of the validator set that signed this header
    #[serde_as(as = "Hex")]
    pub validators_hash: Vec<u8>,
    /// Hash of the validator set that signs the next header
    #[serde_as(as = "Hex")]
    pub next_validators_hash: Vec<u8>,
}

/// Outcome of [`store_header`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreOutcome {
    /// The header was not stored before.
    Inserted,
    /// An equal header was already stored.
    Unchanged,
}

fn header_key(chain_id: u64, height: u64) -> String {
    format!("{HEADERS_PREFIX}/{chain_id}/{height}")
}

fn current_height_key(chain_id: u64) -> String {
    format!("{CURRENT_HEIGHT_PREFIX}/{chain_id}")
}

/// The header stored at `height`, if any.
///
/// # Errors
/// Returns an error if the stored value is corrupted.
pub fn get_header(
    storage: &dyn Storage,
    chain_id: u64,
    height: u64,
) -> Result<Option<StoredHeader>, HeaderSyncError> {
    load(storage, &header_key(chain_id, height))
}

/// The highest stored height of a chain.
///
/// # Errors
/// Returns [`HeaderSyncError::NotFound`] if no header was stored yet.
pub fn current_height(storage: &dyn Storage, chain_id: u64) -> Result<u64, HeaderSyncError> {
    load(storage, &current_height_key(chain_id))?.ok_or(HeaderSyncError::NotFound {
        chain_id,
        what: "current height",
    })
}

/// Stores a header and advances the current height if it is the new tip.
///
/// # Errors
/// Returns [`HeaderSyncError::ConflictingHeader`] if a different header is
/// already stored at the same height.
pub fn store_header(
    storage: &mut dyn Storage,
    chain_id: u64,
    header: &StoredHeader,
) -> Result<StoreOutcome, HeaderSyncError> {
    if let Some(stored) = get_header(storage, chain_id, header.height)? {
        if stored == *header {
            return Ok(StoreOutcome::Unchanged);
        }
        return Err(HeaderSyncError::ConflictingHeader {
            chain_id,
            height: header.height,
            stored: stored.hash,
            submitted: header.hash.clone(),
        });
    }

    save(storage, &header_key(chain_id, header.height), header)?;

    let current = load::<u64>(storage, &current_height_key(chain_id))?;
    if !matches!(current, Some(h) if h >= header.height) {
        save(storage, &current_height_key(chain_id), &header.height)?;
    }
    Ok(StoreOutcome::Inserted)
}

/// Resolves the stored ancestor a header at `height` links to.
///
/// Under [`ParentLinkage::Strict`] this is the header at `height - 1`, whose
/// hash must equal `parent_hash`. Under [`ParentLinkage::NearestAncestor`] a
/// header above the current height may instead link to the current header.
///
/// # Errors
/// Returns [`HeaderSyncError::Orphan`] if no acceptable ancestor is stored.
pub fn get_parent(
    storage: &dyn Storage,
    chain_id: u64,
    height: u64,
    parent_hash: &[u8],
    genesis_height: u64,
    linkage: ParentLinkage,
) -> Result<StoredHeader, HeaderSyncError> {
    let orphan = |reason| HeaderSyncError::Orphan {
        chain_id,
        height,
        reason,
    };

    if height <= genesis_height {
        return Err(orphan(OrphanReason::BelowGenesis { genesis_height }));
    }

    let parent_height = height - 1;
    if let Some(parent) = get_header(storage, chain_id, parent_height)? {
        if parent.hash != parent_hash {
            return Err(orphan(OrphanReason::ParentHashMismatch {
                stored: parent.hash,
                declared: parent_hash.to_vec(),
            }));
        }
        return Ok(parent);
    }

    if linkage == ParentLinkage::NearestAncestor {
        let current = current_height(storage, chain_id)?;
        if current < parent_height {
            if let Some(ancestor) = get_header(storage, chain_id, current)? {
                debug!(
                    chain_id,
                    height,
                    ancestor = ancestor.height,
                    "linking header to nearest stored ancestor"
                );
                return Ok(ancestor);
            }
        }
    }

    Err(orphan(OrphanReason::MissingParent { parent_height }))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::storage::MemoryStorage;

    fn header(height: u64, parent: u8) -> StoredHeader {
        StoredHeader {
            height,
            hash: vec![height as u8; 32],
            parent_hash: vec![parent; 32],
            time: BlockTime {
                seconds: height as i64,
                nanos: 0,
            },
            app_hash: vec![],
            validators_hash: vec![0xaa; 32],
            next_validators_hash: vec![0xaa; 32],
        }
    }

    fn store_with(heights: &[u64]) -> MemoryStorage {
        let mut store = MemoryStorage::new();
        for h in heights {
            store_header(&mut store, 5, &header(*h, (*h - 1) as u8)).unwrap();
        }
        store
    }

    #[test]
    fn store_is_idempotent_and_rejects_conflicts() {
        let mut store = MemoryStorage::new();
        assert_eq!(
            store_header(&mut store, 5, &header(10, 9)).unwrap(),
            StoreOutcome::Inserted
        );
        assert_eq!(
            store_header(&mut store, 5, &header(10, 9)).unwrap(),
            StoreOutcome::Unchanged
        );

        let mut forked = header(10, 9);
        forked.hash = vec![0xff; 32];
        assert!(matches!(
            store_header(&mut store, 5, &forked),
            Err(HeaderSyncError::ConflictingHeader { height: 10, ref stored, .. }) if *stored == vec![10u8; 32]
        ));
        assert_eq!(get_header(&store, 5, 10).unwrap(), Some(header(10, 9)));
    }

    #[test]
    fn current_height_only_advances() {
        let mut store = MemoryStorage::new();
        assert!(matches!(
            current_height(&store, 5),
            Err(HeaderSyncError::NotFound { chain_id: 5, .. })
        ));

        store_header(&mut store, 5, &header(10, 9)).unwrap();
        store_header(&mut store, 5, &header(12, 11)).unwrap();
        store_header(&mut store, 5, &header(11, 10)).unwrap();
        assert_eq!(current_height(&store, 5).unwrap(), 12);
        assert!(current_height(&store, 6).is_err());
    }

    #[rstest]
    #[case::strict(ParentLinkage::Strict)]
    #[case::nearest_ancestor(ParentLinkage::NearestAncestor)]
    fn direct_parent_must_match(#[case] linkage: ParentLinkage) {
        let store = store_with(&[10, 11]);
        assert_eq!(
            get_parent(&store, 5, 12, &[11; 32], 10, linkage).unwrap(),
            header(11, 10)
        );
        assert!(matches!(
            get_parent(&store, 5, 12, &[99; 32], 10, linkage),
            Err(HeaderSyncError::Orphan {
                reason: OrphanReason::ParentHashMismatch { .. },
                ..
            })
        ));
    }

    #[rstest]
    #[case::strict(ParentLinkage::Strict)]
    #[case::nearest_ancestor(ParentLinkage::NearestAncestor)]
    fn below_genesis_is_orphan(#[case] linkage: ParentLinkage) {
        let store = store_with(&[10]);
        for height in [9, 10] {
            assert_eq!(
                get_parent(&store, 5, height, &[0; 32], 10, linkage),
                Err(HeaderSyncError::Orphan {
                    chain_id: 5,
                    height,
                    reason: OrphanReason::BelowGenesis { genesis_height: 10 }
                })
            );
        }
    }

    #[test]
    fn gaps_depend_on_linkage() {
        let store = store_with(&[10, 11, 12]);

        assert_eq!(
            get_parent(&store, 5, 20, &[19; 32], 10, ParentLinkage::Strict),
            Err(HeaderSyncError::Orphan {
                chain_id: 5,
                height: 20,
                reason: OrphanReason::MissingParent { parent_height: 19 }
            })
        );
        assert_eq!(
            get_parent(&store, 5, 20, &[19; 32], 10, ParentLinkage::NearestAncestor).unwrap(),
            header(12, 11)
        );
    }

    #[test]
    fn nearest_ancestor_does_not_backfill_gaps() {
        let mut store = store_with(&[10, 11]);
        store_header(&mut store, 5, &header(20, 19)).unwrap();

        assert!(matches!(
            get_parent(&store, 5, 15, &[14; 32], 10, ParentLinkage::NearestAncestor),
            Err(HeaderSyncError::Orphan {
                reason: OrphanReason::MissingParent { parent_height: 14 },
                ..
            })
        ));
        assert_eq!(
            get_parent(&store, 5, 12, &[11; 32], 10, ParentLinkage::NearestAncestor).unwrap(),
            header(11, 10)
        );
    }
}
