//! Filesystem Surface (C6): translates `fuser`'s inode-based `Filesystem`
//! trait into calls against the Cached DAG Reader, applying the read-only
//! policy and the two mount modes (rooted, whole-namespace).

use crate::error::{Kind, OpError};
use crate::inode::InodeTable;
use crate::reader::CachedDagReader;
use fuser::{
    FileAttr, FileType, Filesystem, ReplyAttr, ReplyData, ReplyDirectory, ReplyEntry, ReplyOpen,
    Request, FUSE_ROOT_ID,
};
use gateway::Gateway;
use libc::{ENOENT, EPERM};
use std::ffi::OsStr;
use std::sync::Mutex;
use std::time::{Duration, SystemTime};
use unixfs::NodeKind;

const GENERATION: u64 = 0;

/// Write flags that must be rejected with `EROFS`. Matches the O_* values
/// `open(2)` documents; `fuser` hands them to us as a raw `i32`.
const WRITE_FLAGS: i32 =
    libc::O_WRONLY | libc::O_RDWR | libc::O_APPEND | libc::O_CREAT | libc::O_EXCL | libc::O_TRUNC;

/// Which of the two modes described in §4.6 this mount is running in.
pub enum Mode {
    /// A configured root; every path is implicitly rooted at its CID.
    Rooted,
    /// No configured root; the mountpoint's own root is a synthetic,
    /// execute-only directory and children are named directly by CID.
    Whole,
}

pub struct DagFs<G> {
    reader: CachedDagReader<G>,
    inodes: Mutex<InodeTable>,
    mode: Mode,
    attr_ttl: Duration,
}

impl<G: Gateway> DagFs<G> {
    pub fn new(reader: CachedDagReader<G>, root_cid: String, mode: Mode, attr_ttl: Duration) -> Self {
        DagFs {
            reader,
            inodes: Mutex::new(InodeTable::new(root_cid)),
            mode,
            attr_ttl,
        }
    }

    fn attr_for(&self, ino: u64, kind: NodeKind, size: u64) -> Result<FileAttr, OpError> {
        let (file_type, perm) = match kind {
            NodeKind::Directory | NodeKind::HamtShard => (FileType::Directory, 0o555),
            NodeKind::File | NodeKind::Raw => (FileType::RegularFile, 0o444),
            NodeKind::Metadata | NodeKind::Symlink => return Err(OpError::InvalidPath),
        };
        Ok(FileAttr {
            ino,
            size,
            blocks: (size + 511) / 512,
            atime: SystemTime::UNIX_EPOCH,
            mtime: SystemTime::UNIX_EPOCH,
            ctime: SystemTime::UNIX_EPOCH,
            crtime: SystemTime::UNIX_EPOCH,
            kind: file_type,
            perm,
            nlink: 0,
            uid: 0,
            gid: 0,
            rdev: 0,
            blksize: 512,
            flags: 0,
        })
    }

    fn whole_root_attr(&self) -> FileAttr {
        FileAttr {
            ino: FUSE_ROOT_ID,
            size: 0,
            blocks: 0,
            atime: SystemTime::UNIX_EPOCH,
            mtime: SystemTime::UNIX_EPOCH,
            ctime: SystemTime::UNIX_EPOCH,
            crtime: SystemTime::UNIX_EPOCH,
            kind: FileType::Directory,
            perm: 0o111,
            nlink: 0,
            uid: 0,
            gid: 0,
            rdev: 0,
            blksize: 512,
            flags: 0,
        }
    }

    fn attr_for_cid(&self, ino: u64, cid: &str) -> Result<FileAttr, OpError> {
        let path = format!("/ipfs/{}", cid);
        let kind = self.reader.cid_type(cid)?;
        let size = self.reader.path_size(&path)?.unwrap_or(0);
        self.attr_for(ino, kind, size)
    }

    fn is_whole_root(&self, ino: u64) -> bool {
        matches!(self.mode, Mode::Whole) && ino == FUSE_ROOT_ID
    }
}

impl<G: Gateway> Filesystem for DagFs<G> {
    fn lookup(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let name = match name.to_str() {
            Some(n) => n,
            None => {
                reply.error(ENOENT);
                return;
            }
        };

        let parent_cid = if self.is_whole_root(parent) {
            None
        } else {
            let inodes = self.inodes.lock().unwrap();
            match inodes.cid(parent) {
                Some(cid) => Some(cid.to_string()),
                None => {
                    reply.error(ENOENT);
                    return;
                }
            }
        };

        let path = match &parent_cid {
            Some(cid) => format!("/ipfs/{}/{}", cid, name),
            None => format!("/ipfs/{}", name),
        };

        let cid = match self.reader.resolve(&path) {
            Ok(Some(cid)) => cid,
            Ok(None) => {
                reply.error(ENOENT);
                return;
            }
            Err(e) => {
                reply.error(e.to_errno());
                return;
            }
        };

        let ino = self.inodes.lock().unwrap().lookup(parent, &cid);
        match self.attr_for_cid(ino, &cid) {
            Ok(attr) => reply.entry(&self.attr_ttl, &attr, GENERATION),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn forget(&mut self, _req: &Request, ino: u64, nlookup: u64) {
        self.inodes.lock().unwrap().forget(ino, nlookup);
    }

    fn getattr(&mut self, _req: &Request, ino: u64, reply: ReplyAttr) {
        if self.is_whole_root(ino) {
            reply.attr(&self.attr_ttl, &self.whole_root_attr());
            return;
        }
        let cid = match self.inodes.lock().unwrap().cid(ino).map(str::to_string) {
            Some(cid) => cid,
            None => {
                reply.error(ENOENT);
                return;
            }
        };
        match self.attr_for_cid(ino, &cid) {
            Ok(attr) => reply.attr(&self.attr_ttl, &attr),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn open(&mut self, _req: &Request, ino: u64, flags: i32, reply: ReplyOpen) {
        if flags & WRITE_FLAGS != 0 {
            reply.error(OpError::ReadOnly.to_errno());
            return;
        }
        if self.is_whole_root(ino) {
            reply.opened(ino, 0);
            return;
        }
        let cid = match self.inodes.lock().unwrap().cid(ino).map(str::to_string) {
            Some(cid) => cid,
            None => {
                reply.error(ENOENT);
                return;
            }
        };
        match self.reader.cid_type(&cid) {
            Ok(_) => reply.opened(ino, 0),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn opendir(&mut self, _req: &Request, ino: u64, _flags: i32, reply: ReplyOpen) {
        reply.opened(ino, 0);
    }

    fn read(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let cid = match self.inodes.lock().unwrap().cid(ino).map(str::to_string) {
            Some(cid) => cid,
            None => {
                reply.error(ENOENT);
                return;
            }
        };
        match self.reader.cid_type(&cid) {
            Ok(NodeKind::Directory) | Ok(NodeKind::HamtShard) => {
                reply.error(OpError::WrongKind(Kind::Dir).to_errno());
                return;
            }
            Ok(_) => {}
            Err(e) => {
                reply.error(e.to_errno());
                return;
            }
        }

        let mut buf = vec![0u8; size as usize];
        match self.reader.read_into(&cid, offset as u64, &mut buf) {
            Ok(end) => {
                let written = (end - offset as u64) as usize;
                reply.data(&buf[..written]);
            }
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn readdir(&mut self, _req: &Request, ino: u64, _fh: u64, offset: i64, mut reply: ReplyDirectory) {
        if self.is_whole_root(ino) {
            reply.error(EPERM);
            return;
        }

        let (cid, parent_ino) = {
            let inodes = self.inodes.lock().unwrap();
            match (inodes.cid(ino).map(str::to_string), inodes.parent(ino)) {
                (Some(cid), Some(parent)) => (cid, parent),
                _ => {
                    reply.error(ENOENT);
                    return;
                }
            }
        };

        let listing = match self.reader.ls(&format!("/ipfs/{}", cid)) {
            Ok(Some(listing)) => listing,
            Ok(None) => {
                reply.error(OpError::WrongKind(Kind::File).to_errno());
                return;
            }
            Err(e) => {
                reply.error(e.to_errno());
                return;
            }
        };

        let mut entries: Vec<(u64, FileType, String)> =
            vec![(ino, FileType::Directory, ".".to_string()), (parent_ino, FileType::Directory, "..".to_string())];

        let mut names: Vec<&String> = listing.keys().collect();
        names.sort();
        for name in names {
            let entry = &listing[name];
            let child_ino = self.inodes.lock().unwrap().lookup(ino, &entry.cid);
            let kind = match self.reader.cid_type(&entry.cid) {
                Ok(NodeKind::Directory) | Ok(NodeKind::HamtShard) => FileType::Directory,
                Ok(_) => FileType::RegularFile,
                Err(_) => continue,
            };
            entries.push((child_ino, kind, name.clone()));
        }

        for (i, (entry_ino, kind, name)) in entries.into_iter().enumerate().skip(offset as usize) {
            if reply.add(entry_ino, (i + 1) as i64, kind, name) {
                break;
            }
        }
        reply.ok();
    }
}
