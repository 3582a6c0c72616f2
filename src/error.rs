//! Error taxonomy (C8): the small sum of failure kinds every operation in
//! this crate ultimately reduces to, and the single place that sum is
//! translated into a POSIX errno.

use thiserror::Error;

/// What kind of node an operation expected but didn't get.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Dir,
    File,
}

#[derive(Debug, Error)]
pub enum OpError {
    /// The path/CID does not resolve to a known, classifiable object.
    #[error("path does not resolve to a recognized IPFS object")]
    InvalidPath,

    /// A daemon RPC exceeded its configured timeout. Never cached negatively.
    #[error("request to the IPFS daemon timed out")]
    Timeout,

    /// The target was the wrong kind of node for the requested operation
    /// (e.g. `read` on a directory, `readdir` on a file).
    #[error("operation not valid for this node's kind")]
    WrongKind(Kind),

    /// A write was attempted against this read-only filesystem.
    #[error("filesystem is mounted read-only")]
    ReadOnly,

    /// Anything else: a daemon transport failure, a decode bug, a logic
    /// error. Surfaces as `EIO`.
    #[error("internal error: {0}")]
    Internal(String),
}

impl OpError {
    /// The one and only place an [`OpError`] becomes a libc errno. Called
    /// exclusively from the FUSE boundary in `fs.rs`.
    pub fn to_errno(&self) -> libc::c_int {
        match self {
            OpError::InvalidPath => libc::ENOENT,
            OpError::Timeout => libc::EAGAIN,
            OpError::WrongKind(Kind::Dir) => libc::EISDIR,
            OpError::WrongKind(Kind::File) => libc::ENOTDIR,
            OpError::ReadOnly => libc::EROFS,
            OpError::Internal(_) => libc::EIO,
        }
    }
}

impl From<gateway::GatewayError> for OpError {
    fn from(e: gateway::GatewayError) -> Self {
        match e {
            gateway::GatewayError::Timeout => OpError::Timeout,
            gateway::GatewayError::Daemon(_) => OpError::InvalidPath,
            gateway::GatewayError::Request(_) => OpError::Internal(e.to_string()),
        }
    }
}

impl From<unixfs::DecodeError> for OpError {
    fn from(e: unixfs::DecodeError) -> Self {
        tracing::warn!(error = %e, "treating undecodable object as invalid path");
        OpError::InvalidPath
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_mapping_matches_spec_table() {
        assert_eq!(OpError::InvalidPath.to_errno(), libc::ENOENT);
        assert_eq!(OpError::Timeout.to_errno(), libc::EAGAIN);
        assert_eq!(OpError::WrongKind(Kind::Dir).to_errno(), libc::EISDIR);
        assert_eq!(OpError::WrongKind(Kind::File).to_errno(), libc::ENOTDIR);
        assert_eq!(OpError::ReadOnly.to_errno(), libc::EROFS);
        assert_eq!(OpError::Internal("x".into()).to_errno(), libc::EIO);
    }
}
