//! The CLI surface (C7), shared between the rooted and whole-namespace
//! binaries. Flag names and defaults mirror the reference daemon's own
//! `--*-cache-size`/`--api-*` knobs.

use std::time::Duration;
use structopt::StructOpt;

/// Flags both binaries accept, ahead of their own positional arguments.
#[derive(Debug, StructOpt)]
pub struct CommonOpts {
    /// IPFS API host.
    #[structopt(long, default_value = "127.0.0.1")]
    pub api_host: String,

    /// IPFS API port.
    #[structopt(long, default_value = "5001")]
    pub api_port: u16,

    /// Timeout for daemon requests, in seconds.
    #[structopt(long, default_value = "30.0")]
    pub timeout: f64,

    /// Max number of ls results kept in cache.
    #[structopt(long, default_value = "64")]
    pub ls_cache_size: usize,

    /// Max number of data blocks kept in cache.
    #[structopt(long, default_value = "16")]
    pub block_cache_size: usize,

    /// Max number of object link sections kept in cache.
    #[structopt(long, default_value = "256")]
    pub link_cache_size: usize,

    /// Max number of file attributes kept in cache.
    #[structopt(long, default_value = "131072")]
    pub attr_cache_size: usize,

    /// Run in background.
    #[structopt(short, long)]
    pub background: bool,

    /// Use a single thread to handle filesystem requests.
    #[structopt(long)]
    pub no_threads: bool,

    /// Set the FUSE mount option `allow_other`.
    #[structopt(long)]
    pub allow_other: bool,

    /// Increase logging verbosity; repeatable.
    #[structopt(short, long, parse(from_occurrences))]
    pub verbose: u8,

    pub mountpoint: String,
}

impl CommonOpts {
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs_f64(self.timeout)
    }

    pub fn cache_sizes(&self) -> crate::reader::CacheSizes {
        crate::reader::CacheSizes {
            attr: self.attr_cache_size,
            ls: self.ls_cache_size,
            block: self.block_cache_size,
            link: self.link_cache_size,
        }
    }

    pub fn tracing_level(&self) -> tracing::Level {
        match self.verbose {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        }
    }
}

/// `ipfs-api-mount <root> <mountpoint> [flags]`.
#[derive(Debug, StructOpt)]
#[structopt(name = "ipfs-api-mount")]
pub struct RootedOpts {
    /// Hash or path of the IPFS object to mount as the filesystem root.
    pub root: String,

    #[structopt(flatten)]
    pub common: CommonOpts,
}

/// `ipfs-api-mount-whole <mountpoint> [flags]`.
#[derive(Debug, StructOpt)]
#[structopt(name = "ipfs-api-mount-whole")]
pub struct WholeOpts {
    #[structopt(flatten)]
    pub common: CommonOpts,
}
