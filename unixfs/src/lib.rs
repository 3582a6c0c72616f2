//! CID classification and UnixFS dag-pb decoding.
//!
//! This crate knows nothing about the network: every function here is a pure
//! transformation over bytes already in hand. The daemon HTTP client lives in
//! the sibling `gateway` crate; the caching and DAG-walking live in the main
//! crate's `reader` module.

pub mod cid_classify;
mod pb;

pub use cid_classify::{classify, Shape};
pub use pb::{decode_node, DecodeError, NodeKind, PbLink, UnixFsNode};
