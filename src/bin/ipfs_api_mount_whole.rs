//! Whole-namespace mode: `ipfs-api-mount-whole <mountpoint> [flags]`. No
//! configured root; the mountpoint's own root is a synthetic, execute-only
//! directory and children are named directly by CID.

use anyhow::Context;
use gateway::GatewayClient;
use ipfs_fuse_mount::config::WholeOpts;
use ipfs_fuse_mount::{CachedDagReader, DagFs, Mode};
use std::time::Duration;
use structopt::StructOpt;

fn main() -> anyhow::Result<()> {
    let opts = WholeOpts::from_args();
    tracing_subscriber::fmt()
        .with_max_level(opts.common.tracing_level())
        .init();

    let gateway = GatewayClient::new(
        &opts.common.api_host,
        opts.common.api_port,
        opts.common.timeout_duration(),
    )
    .context("building IPFS daemon client")?;

    let reader = CachedDagReader::new(gateway, opts.common.cache_sizes());
    let fs = DagFs::new(reader, String::new(), Mode::Whole, Duration::from_secs(1));

    let mut options = vec![
        fuser::MountOption::RO,
        fuser::MountOption::FSName("ipfs".to_string()),
        fuser::MountOption::AutoUnmount,
    ];
    if opts.common.allow_other {
        options.push(fuser::MountOption::AllowOther);
    }

    tracing::info!(mountpoint = %opts.common.mountpoint, "mounting whole namespace");
    fuser::mount2(fs, &opts.common.mountpoint, &options).context("mounting filesystem")?;
    Ok(())
}
