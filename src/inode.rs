//! CID<->inode table (part of C6): the bidirectional map FUSE's inode-based
//! protocol needs, layered on top of a DAG model that otherwise only knows
//! about CIDs. `lookup_count` mirrors the kernel's own reference counting so
//! `forget` can drive eviction the same way the kernel expects.

use fuser::FUSE_ROOT_ID;
use std::collections::HashMap;

struct Entry {
    cid: String,
    parent: u64,
    lookup_count: u64,
}

/// Maps CIDs to stable inode numbers for the lifetime of a single mount.
///
/// The root inode is fixed at [`FUSE_ROOT_ID`] and bound once, at
/// construction, to whatever CID the mount resolved as its root. Every other
/// inode is handed out lazily, in increasing order, the first time a CID is
/// looked up, and is retired once the kernel's `lookup_count` drops back to
/// zero via `forget`.
pub struct InodeTable {
    by_ino: HashMap<u64, Entry>,
    by_cid: HashMap<String, u64>,
    next_free: u64,
}

impl InodeTable {
    pub fn new(root_cid: String) -> Self {
        let mut by_ino = HashMap::new();
        let mut by_cid = HashMap::new();
        by_ino.insert(
            FUSE_ROOT_ID,
            Entry {
                cid: root_cid.clone(),
                parent: FUSE_ROOT_ID,
                lookup_count: 1,
            },
        );
        by_cid.insert(root_cid, FUSE_ROOT_ID);
        InodeTable {
            by_ino,
            by_cid,
            next_free: FUSE_ROOT_ID + 1,
        }
    }

    /// The CID bound to an inode, if the inode is currently resident.
    pub fn cid(&self, ino: u64) -> Option<&str> {
        self.by_ino.get(&ino).map(|e| e.cid.as_str())
    }

    /// Look up (or mint) the inode for `cid` as a child of `parent`,
    /// incrementing its lookup count as the kernel's `lookup`-family calls
    /// require. Returns the inode number the caller should hand back in its
    /// reply. `parent` is only recorded the first time a CID is seen (used
    /// for `..` in `readdir`); a CID reachable from multiple parents keeps
    /// whichever it was first discovered under.
    pub fn lookup(&mut self, parent: u64, cid: &str) -> u64 {
        if let Some(&ino) = self.by_cid.get(cid) {
            self.by_ino.get_mut(&ino).expect("by_cid/by_ino out of sync").lookup_count += 1;
            return ino;
        }
        let ino = self.next_free;
        self.next_free += 1;
        self.by_ino.insert(
            ino,
            Entry {
                cid: cid.to_string(),
                parent,
                lookup_count: 1,
            },
        );
        self.by_cid.insert(cid.to_string(), ino);
        ino
    }

    /// The inode of `ino`'s parent directory, for `..` entries.
    pub fn parent(&self, ino: u64) -> Option<u64> {
        self.by_ino.get(&ino).map(|e| e.parent)
    }

    /// Apply a kernel `forget(ino, nlookup)`, evicting the inode once its
    /// count reaches zero. The root inode is never evicted.
    pub fn forget(&mut self, ino: u64, nlookup: u64) {
        if ino == FUSE_ROOT_ID {
            return;
        }
        let evict = match self.by_ino.get_mut(&ino) {
            Some(entry) => {
                entry.lookup_count = entry.lookup_count.saturating_sub(nlookup);
                entry.lookup_count == 0
            }
            None => return,
        };
        if evict {
            if let Some(entry) = self.by_ino.remove(&ino) {
                self.by_cid.remove(&entry.cid);
            }
        }
    }
}
