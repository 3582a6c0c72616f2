//! CID Classifier (C1).
//!
//! Classification never fails outwards: a malformed CID is simply `Shape::Unknown`,
//! with a warning logged for operators. Callers that need a hard failure (an
//! unresolvable/unclassifiable CID at a point where one was expected) turn
//! `Unknown` into their own error type.

use tracing::warn;

/// The three CID shapes this system distinguishes, plus the catch-all for
/// anything that fails to decode or doesn't match a known codec prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// v0 object: base58btc, textual form starts with `Q`. Payload is a UnixFS protobuf.
    V0Object,
    /// v1 dag-pb object: multibase binary starts with `0x01 0x70`.
    V1DagPb,
    /// v1 raw leaf: multibase binary starts with `0x01 0x55`. No UnixFS envelope, no links.
    V1Raw,
    /// Decode failure, or a codec this system does not interpret.
    Unknown,
}

const DAG_PB_PREFIX: [u8; 2] = [0x01, 0x70];
const RAW_PREFIX: [u8; 2] = [0x01, 0x55];

/// Classifies a textual CID into one of the three recognized shapes.
///
/// Mirrors the reference implementation's `_is_object`/`_is_raw_block`: v0 is
/// identified purely from the textual prefix (cheap, no decode needed), v1
/// requires a multibase decode to inspect the codec byte.
pub fn classify(cid: &str) -> Shape {
    if is_v0_object(cid) {
        return Shape::V0Object;
    }
    match multibase::decode(cid) {
        Ok((_base, bytes)) => {
            if bytes.starts_with(&DAG_PB_PREFIX) {
                Shape::V1DagPb
            } else if bytes.starts_with(&RAW_PREFIX) {
                Shape::V1Raw
            } else {
                Shape::Unknown
            }
        }
        Err(_) => {
            warn!(%cid, "encountered malformed object/block id");
            Shape::Unknown
        }
    }
}

/// v0 object: textual form begins with `Q` (base58btc-encoded sha2-256 multihash).
pub fn is_v0_object(cid: &str) -> bool {
    cid.starts_with('Q')
}

/// v1 dag-pb object.
pub fn is_v1_dagpb(cid: &str) -> bool {
    matches!(classify(cid), Shape::V1DagPb)
}

/// v1 raw leaf.
pub fn is_v1_raw(cid: &str) -> bool {
    matches!(classify(cid), Shape::V1Raw)
}

/// `is_v0_object(cid) || is_v1_dagpb(cid)`.
pub fn is_object(cid: &str) -> bool {
    matches!(classify(cid), Shape::V0Object | Shape::V1DagPb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v0_object_by_prefix_alone() {
        // a real v0 CID (sha2-256 of "foobar\n" worth of content, arbitrary here)
        let cid = "QmTEn8ypAkbJXZUXCRHBorwF2jM8uTUW9yRLzrcQouSoD4";
        assert_eq!(classify(cid), Shape::V0Object);
        assert!(is_object(cid));
        assert!(!is_v1_raw(cid));
    }

    #[test]
    fn v1_dagpb_roundtrip() {
        let mut bytes = vec![0x01, 0x70];
        bytes.extend_from_slice(&[0xaa; 32]);
        let cid = multibase::encode(multibase::Base::Base32Lower, &bytes);
        assert_eq!(classify(&cid), Shape::V1DagPb);
        assert!(is_object(&cid));
        assert!(!is_v1_raw(&cid));
    }

    #[test]
    fn v1_raw_roundtrip() {
        let mut bytes = vec![0x01, 0x55];
        bytes.extend_from_slice(&[0xbb; 32]);
        let cid = multibase::encode(multibase::Base::Base32Lower, &bytes);
        assert_eq!(classify(&cid), Shape::V1Raw);
        assert!(!is_object(&cid));
        assert!(is_v1_raw(&cid));
    }

    #[test]
    fn malformed_is_unknown_not_error() {
        assert_eq!(classify("not a cid at all \0\0"), Shape::Unknown);
        assert!(!is_object("not a cid at all \0\0"));
        assert!(!is_v1_raw("not a cid at all \0\0"));
    }
}
