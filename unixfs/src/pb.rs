//! UnixFS Decoder (C2).
//!
//! Two nested protobuf layers are involved: the outer dag-pb `PBNode` (an
//! opaque `Data` blob plus a list of named, sized links), and the inner
//! UnixFS `Data` message embedded in `PBNode.Data` for `Directory`/`File`/
//! `Raw`/`Metadata`/`HAMTShard` nodes. A v1 raw leaf has no dag-pb envelope
//! at all: its payload *is* the file content, handled upstream of this
//! module (see `reader::block` in the main crate).
//!
//! The wire layouts mirror go-ipfs's `unixfs.proto` / `merkledag.proto`; the
//! message structs below are hand-written in the same shape `pb-rs` would
//! generate, since this crate checks in its protobuf bindings rather than
//! running a build-time codegen step.

use quick_protobuf::{BytesReader, MessageRead, Result as PbResult};
use std::borrow::Cow;
use thiserror::Error;

/// The recognized UnixFS node kinds (`UnixFS.Data.Type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Raw,
    Directory,
    File,
    Metadata,
    Symlink,
    HamtShard,
}

impl NodeKind {
    fn from_i32(v: i32) -> Option<Self> {
        Some(match v {
            0 => NodeKind::Raw,
            1 => NodeKind::Directory,
            2 => NodeKind::File,
            3 => NodeKind::Metadata,
            4 => NodeKind::Symlink,
            5 => NodeKind::HamtShard,
            _ => return None,
        })
    }
}

/// A single dag-pb link: the child's CID bytes (not yet parsed into a `Cid`,
/// since link targets and the node's own CID use the same raw multihash
/// bytes and callers may want either the binary or the base58/multibase
/// textual form depending on which gateway call they're about to make),
/// its name, and the size of the subtree it points at.
#[derive(Debug, Clone)]
pub struct PbLink {
    pub hash: Vec<u8>,
    pub name: String,
    pub tsize: u64,
}

/// The fully decoded UnixFS node: the dag-pb envelope and the embedded
/// UnixFS `Data` message, merged into the shape the Cached DAG Reader needs.
#[derive(Debug, Clone)]
pub struct UnixFsNode {
    pub kind: NodeKind,
    pub inline_data: Vec<u8>,
    pub filesize: u64,
    pub block_sizes: Vec<u64>,
    pub links: Vec<PbLink>,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed dag-pb node: {0}")]
    PbNode(String),
    #[error("malformed UnixFS Data message: {0}")]
    UnixFsData(String),
    #[error("unrecognized UnixFS node type {0}")]
    UnknownType(i32),
}

/// Parses a raw dag-pb payload (as returned by `object.data`/`block.get`)
/// into a [`UnixFsNode`]. Pure function, no I/O.
pub fn decode_node(bytes: &[u8]) -> Result<UnixFsNode, DecodeError> {
    let mut reader = BytesReader::from_bytes(bytes);
    let node: RawPbNode = reader
        .read_message(bytes)
        .map_err(|e| DecodeError::PbNode(e.to_string()))?;

    let data = node.data.unwrap_or(Cow::Borrowed(&[]));
    let mut data_reader = BytesReader::from_bytes(&data);
    let unixfs: RawUnixFsData = data_reader
        .read_message(&data)
        .map_err(|e| DecodeError::UnixFsData(e.to_string()))?;

    let kind = NodeKind::from_i32(unixfs.r#type).ok_or(DecodeError::UnknownType(unixfs.r#type))?;

    let links = node
        .links
        .into_iter()
        .map(|l| PbLink {
            hash: l.hash.map(|h| h.into_owned()).unwrap_or_default(),
            name: l.name.map(|n| n.into_owned()).unwrap_or_default(),
            tsize: l.tsize.unwrap_or(0),
        })
        .collect();

    Ok(UnixFsNode {
        kind,
        inline_data: unixfs.data.map(|d| d.into_owned()).unwrap_or_default(),
        filesize: unixfs.filesize,
        block_sizes: unixfs.blocksizes,
        links,
    })
}

#[derive(Debug, Default)]
struct RawPbNode<'a> {
    data: Option<Cow<'a, [u8]>>,
    links: Vec<RawPbLink<'a>>,
}

#[derive(Debug, Default)]
struct RawPbLink<'a> {
    hash: Option<Cow<'a, [u8]>>,
    name: Option<Cow<'a, str>>,
    tsize: Option<u64>,
}

#[derive(Debug, Default)]
struct RawUnixFsData<'a> {
    r#type: i32,
    data: Option<Cow<'a, [u8]>>,
    filesize: u64,
    blocksizes: Vec<u64>,
}

impl<'a> MessageRead<'a> for RawPbNode<'a> {
    fn from_reader(r: &mut BytesReader, bytes: &'a [u8]) -> PbResult<Self> {
        let mut msg = Self::default();
        while !r.is_eof() {
            match r.next_tag(bytes) {
                Ok(10) => msg.data = Some(Cow::Borrowed(r.read_bytes(bytes)?)),
                Ok(18) => msg.links.push(r.read_message::<RawPbLink>(bytes)?),
                Ok(t) => {
                    r.read_unknown(bytes, t)?;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(msg)
    }
}

impl<'a> MessageRead<'a> for RawPbLink<'a> {
    fn from_reader(r: &mut BytesReader, bytes: &'a [u8]) -> PbResult<Self> {
        let mut msg = Self::default();
        while !r.is_eof() {
            match r.next_tag(bytes) {
                Ok(10) => msg.hash = Some(Cow::Borrowed(r.read_bytes(bytes)?)),
                Ok(18) => msg.name = Some(Cow::Borrowed(r.read_string(bytes)?)),
                Ok(24) => msg.tsize = Some(r.read_uint64(bytes)?),
                Ok(t) => {
                    r.read_unknown(bytes, t)?;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(msg)
    }
}

impl<'a> MessageRead<'a> for RawUnixFsData<'a> {
    fn from_reader(r: &mut BytesReader, bytes: &'a [u8]) -> PbResult<Self> {
        let mut msg = Self::default();
        while !r.is_eof() {
            match r.next_tag(bytes) {
                Ok(8) => msg.r#type = r.read_int32(bytes)?,
                Ok(18) => msg.data = Some(Cow::Borrowed(r.read_bytes(bytes)?)),
                Ok(24) => msg.filesize = r.read_uint64(bytes)?,
                // blocksizes is `repeated uint64`; protobuf3 encoders emit it
                // packed (tag 34), but tolerate an unpacked encoder (tag 32)
                // the way generated quick-protobuf code for mixed-version
                // producers typically does.
                Ok(34) => {
                    let packed = r.read_packed(bytes, |r, bytes| r.read_uint64(bytes))?;
                    msg.blocksizes.extend(packed);
                }
                Ok(32) => msg.blocksizes.push(r.read_uint64(bytes)?),
                Ok(t) => {
                    r.read_unknown(bytes, t)?;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // PBNode{ Data: UnixFS.Data{Type=File(2), Data="content", filesize=7} }
    // lifted verbatim from a real go-ipfs "add" of a small file.
    const CONTENT_NODE: &[u8] = &[
        0x0a, 0x0d, 0x08, 0x02, 0x12, 0x07, 0x63, 0x6f, 0x6e, 0x74, 0x65, 0x6e, 0x74, 0x18, 0x07,
    ];

    #[test]
    fn decodes_small_file_node() {
        let node = decode_node(CONTENT_NODE).unwrap();
        assert_eq!(node.kind, NodeKind::File);
        assert_eq!(node.inline_data, b"content");
        assert_eq!(node.filesize, 7);
        assert!(node.links.is_empty());
        assert!(node.block_sizes.is_empty());
    }

    #[test]
    fn decodes_empty_file_node() {
        let block = &[0x0a, 0x04, 0x08, 0x02, 0x18, 0x00];
        let node = decode_node(block).unwrap();
        assert_eq!(node.kind, NodeKind::File);
        assert!(node.inline_data.is_empty());
        assert_eq!(node.filesize, 0);
    }

    #[test]
    fn decodes_directory_with_links() {
        // PBNode{ Links: [{Name:"aaa", Hash: <1 byte>, Tsize: 2}], Data: UnixFS.Data{Type=Directory(1)} }
        let link = {
            let mut v = vec![0x0a, 0x01, 0xaa]; // Hash field, 1 byte
            v.extend_from_slice(&[0x12, 0x03, b'a', b'a', b'a']); // Name "aaa"
            v.extend_from_slice(&[0x18, 0x02]); // Tsize = 2
            v
        };
        let mut node_bytes = vec![0x12, link.len() as u8];
        node_bytes.extend_from_slice(&link);
        node_bytes.extend_from_slice(&[0x0a, 0x02, 0x08, 0x01]); // Data: Type=Directory

        let node = decode_node(&node_bytes).unwrap();
        assert_eq!(node.kind, NodeKind::Directory);
        assert_eq!(node.links.len(), 1);
        assert_eq!(node.links[0].name, "aaa");
        assert_eq!(node.links[0].tsize, 2);
    }

    #[test]
    fn unknown_type_is_an_error_not_a_panic() {
        let block = &[0x0a, 0x02, 0x08, 0x63]; // Type = 99
        let err = decode_node(block).unwrap_err();
        matches!(err, DecodeError::UnknownType(99));
    }
}
