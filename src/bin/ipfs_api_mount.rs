//! Rooted mode: `ipfs-api-mount <root> <mountpoint> [flags]`.

use anyhow::{bail, Context};
use gateway::{Gateway, GatewayClient};
use ipfs_fuse_mount::config::RootedOpts;
use ipfs_fuse_mount::{CachedDagReader, DagFs, Mode};
use std::time::Duration;
use structopt::StructOpt;

fn main() -> anyhow::Result<()> {
    let opts = RootedOpts::from_args();
    tracing_subscriber::fmt()
        .with_max_level(opts.common.tracing_level())
        .init();

    let gateway = GatewayClient::new(
        &opts.common.api_host,
        opts.common.api_port,
        opts.common.timeout_duration(),
    )
    .context("building IPFS daemon client")?;

    let root_path = if opts.root.starts_with('/') {
        opts.root.clone()
    } else {
        format!("/ipfs/{}", opts.root)
    };
    let root_cid = gateway
        .resolve(&root_path)
        .context("resolving root path")?
        .with_context(|| format!("root path {} does not resolve to an IPFS object", opts.root))?;

    let reader = CachedDagReader::new(gateway, opts.common.cache_sizes());
    if !reader.path_is_dir(&format!("/ipfs/{}", root_cid))? {
        bail!("root path is not a directory");
    }

    let fs = DagFs::new(reader, root_cid.clone(), Mode::Rooted, Duration::from_secs(1));

    let mut options = vec![
        fuser::MountOption::RO,
        fuser::MountOption::FSName(format!("ipfs:{}", root_cid)),
        fuser::MountOption::AutoUnmount,
    ];
    if opts.common.allow_other {
        options.push(fuser::MountOption::AllowOther);
    }

    tracing::info!(mountpoint = %opts.common.mountpoint, root = %root_cid, "mounting");
    fuser::mount2(fs, &opts.common.mountpoint, &options).context("mounting filesystem")?;
    Ok(())
}
