//! Mounts an IPFS UnixFS DAG as a read-only FUSE filesystem, backed by a
//! local IPFS daemon's HTTP API.
//!
//! The crate is organized as a small pipeline: [`unixfs`] classifies CIDs
//! and decodes dag-pb/UnixFS bytes, [`gateway`] speaks to the daemon over
//! HTTP, [`cache`] provides the bounded, single-flight LRU the reader is
//! built from, [`reader`] composes all three into the handful of DAG
//! operations the filesystem needs, and [`fs`]/[`inode`] expose that as a
//! `fuser::Filesystem`.

pub mod config;
pub mod error;
pub mod fs;
pub mod inode;
pub mod reader;

pub use error::OpError;
pub use fs::{DagFs, Mode};
pub use reader::CachedDagReader;
