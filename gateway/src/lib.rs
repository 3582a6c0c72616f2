//! Gateway Adapter (C3): a blocking HTTP client for the local IPFS daemon's
//! RPC API (`/api/v0/...`), plus the [`Gateway`] trait the Cached DAG Reader
//! is generalized over so it can be exercised against an in-memory fake in
//! tests instead of a live daemon.
//!
//! This crate does no caching and no DAG interpretation of its own: every
//! method is a single RPC round trip, returning the daemon's answer in a
//! shape close to the wire response. Caching lives in the main crate's
//! reader; CID classification and dag-pb decoding live in the `unixfs`
//! crate.

use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// A link entry as returned by `object/links` or `ls`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkEntry {
    pub name: String,
    pub hash: String,
    pub size: u64,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("request to daemon timed out")]
    Timeout,
    #[error("daemon request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("daemon reported an error: {0}")]
    Daemon(String),
}

/// Everything the Cached DAG Reader needs from the daemon, named after the
/// IPFS RPC commands it wraps rather than after any particular HTTP shape,
/// so a test double can implement it without touching HTTP at all.
pub trait Gateway {
    /// `resolve` a mutable/IPNS-ish or relative path down to an immutable
    /// `/ipfs/<cid>` path. Returns `Ok(None)` for a path the daemon cannot
    /// resolve (mirrors the daemon returning a "no link named" style error).
    fn resolve(&self, path: &str) -> Result<Option<String>, GatewayError>;

    /// Raw dag-pb bytes of an object (`object/data`).
    fn object_data(&self, cid: &str) -> Result<Vec<u8>, GatewayError>;

    /// The object's direct links (`object/links`).
    fn object_links(&self, cid: &str) -> Result<Vec<LinkEntry>, GatewayError>;

    /// Raw bytes of a block, object or leaf alike (`block/get`).
    fn block_get(&self, cid: &str) -> Result<Vec<u8>, GatewayError>;

    /// Size of a block without fetching its payload (`block/stat`).
    fn block_stat(&self, cid: &str) -> Result<u64, GatewayError>;

    /// Directory listing of a path (`ls`). `Ok(None)` if the path does not
    /// resolve to a listable directory.
    fn ls(&self, path: &str) -> Result<Option<Vec<LinkEntry>>, GatewayError>;
}

/// A [`Gateway`] backed by a real daemon's HTTP RPC API, reached over
/// `reqwest::blocking` to match the multi-threaded synchronous deployment
/// model the rest of this crate uses.
pub struct GatewayClient {
    base_url: String,
    http: reqwest::blocking::Client,
}

impl GatewayClient {
    pub fn new(host: &str, port: u16, timeout: Duration) -> Result<Self, GatewayError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(GatewayClient {
            base_url: format!("http://{}:{}/api/v0", host, port),
            http,
        })
    }

    fn post(&self, command: &str, arg: &str) -> Result<reqwest::blocking::Response, GatewayError> {
        let url = format!("{}/{}", self.base_url, command);
        debug!(command, arg, "calling daemon");
        let resp = self
            .http
            .post(&url)
            .query(&[("arg", arg)])
            .send()
            .map_err(|e| if e.is_timeout() { GatewayError::Timeout } else { e.into() })?;

        if resp.status().is_success() {
            Ok(resp)
        } else {
            let body = resp.text().unwrap_or_default();
            let message = parse_daemon_error(&body).unwrap_or(body);
            Err(GatewayError::Daemon(message))
        }
    }
}

fn parse_daemon_error(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct DaemonError {
        #[serde(rename = "Message")]
        message: String,
    }
    serde_json::from_str::<DaemonError>(body).ok().map(|e| e.message)
}

#[derive(Deserialize)]
struct ResolveResponse {
    #[serde(rename = "Path")]
    path: String,
}

#[derive(Deserialize)]
struct ObjectLinksResponse {
    #[serde(rename = "Links")]
    links: Vec<ObjectLink>,
}

#[derive(Deserialize)]
struct ObjectLink {
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "Hash")]
    hash: String,
    #[serde(rename = "Size", default)]
    size: u64,
}

#[derive(Deserialize)]
struct BlockStatResponse {
    #[serde(rename = "Size")]
    size: u64,
}

#[derive(Deserialize)]
struct LsResponse {
    #[serde(rename = "Objects")]
    objects: Vec<LsObject>,
}

#[derive(Deserialize)]
struct LsObject {
    #[serde(rename = "Links", default)]
    links: Vec<ObjectLink>,
}

impl Gateway for GatewayClient {
    fn resolve(&self, path: &str) -> Result<Option<String>, GatewayError> {
        match self.post("resolve", path) {
            Ok(resp) => {
                let parsed: ResolveResponse = resp.json()?;
                match parsed.path.strip_prefix("/ipfs/") {
                    Some(cid) => Ok(Some(cid.to_string())),
                    None => Ok(None),
                }
            }
            Err(GatewayError::Daemon(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn object_data(&self, cid: &str) -> Result<Vec<u8>, GatewayError> {
        let resp = self.post("object/data", cid)?;
        Ok(resp.bytes()?.to_vec())
    }

    fn object_links(&self, cid: &str) -> Result<Vec<LinkEntry>, GatewayError> {
        let resp = self.post("object/links", cid)?;
        let parsed: ObjectLinksResponse = resp.json()?;
        Ok(parsed
            .links
            .into_iter()
            .map(|l| LinkEntry {
                name: l.name,
                hash: l.hash,
                size: l.size,
            })
            .collect())
    }

    fn block_get(&self, cid: &str) -> Result<Vec<u8>, GatewayError> {
        let resp = self.post("block/get", cid)?;
        Ok(resp.bytes()?.to_vec())
    }

    fn block_stat(&self, cid: &str) -> Result<u64, GatewayError> {
        let resp = self.post("block/stat", cid)?;
        let parsed: BlockStatResponse = resp.json()?;
        Ok(parsed.size)
    }

    fn ls(&self, path: &str) -> Result<Option<Vec<LinkEntry>>, GatewayError> {
        match self.post("ls", path) {
            Ok(resp) => {
                let parsed: LsResponse = resp.json()?;
                let entries = parsed
                    .objects
                    .into_iter()
                    .next()
                    .map(|o| {
                        o.links
                            .into_iter()
                            .map(|l| LinkEntry {
                                name: l.name,
                                hash: l.hash,
                                size: l.size,
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                Ok(Some(entries))
            }
            Err(GatewayError::Daemon(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daemon_error_body_is_parsed() {
        let body = r#"{"Message":"no link named \"missing\" under QmFoo","Code":0,"Type":"error"}"#;
        assert_eq!(
            parse_daemon_error(body),
            Some("no link named \"missing\" under QmFoo".to_string())
        );
    }

    #[test]
    fn non_json_error_body_falls_back_to_raw_text() {
        assert_eq!(parse_daemon_error("not json"), None);
    }
}
