use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bytes::Bytes;
use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use serde_json::json;
use tracing::Level;

use imgcache::{Anchor, Bucket, RuntimeConfig};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Debug, Parser)]
#[clap(version, about = "An on-demand image derivative cache backed by an object store.")]
struct Args {
    /// The file path to the runtime config file.
    #[clap(short, long, env = "IMGCACHE_CONFIG", default_value = "config.yaml")]
    config: PathBuf,

    /// The log level filter.
    #[clap(long, env = "IMGCACHE_LOG_LEVEL", default_value = "info")]
    log_level: Level,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Uploads an image under a newly generated id.
    Add {
        /// The image file to upload.
        path: PathBuf,
    },

    /// Uploads an image under the given key, replacing anything already there.
    Save {
        key: String,

        /// The image file to upload.
        path: PathBuf,
    },

    /// Fetches an image, resizing it if a width and/or height is given.
    Get {
        id: String,

        #[clap(long, default_value_t = 0, allow_hyphen_values = true)]
        width: i32,

        #[clap(long, default_value_t = 0, allow_hyphen_values = true)]
        height: i32,

        /// The region kept when cropping, e.g. `center` or `top-left`.
        #[clap(long, default_value = "center")]
        anchor: Anchor,

        /// Where to write the image bytes.
        #[clap(short, long)]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .init();

    let cfg = RuntimeConfig::from_file(&args.config).await?;
    let bucket = Bucket::from_config(&cfg).await?;

    match args.command {
        Command::Add { path } => {
            let data = read_image(&path).await?;
            let image_id = bucket.add(data).await?;
            println!("{}", json!({ "image_id": image_id }));
        },
        Command::Save { key, path } => {
            let data = read_image(&path).await?;
            bucket.save(&key, data).await?;
            println!("{}", json!({ "key": key }));
        },
        Command::Get { id, width, height, anchor, out } => {
            let image = bucket.get(&id, anchor, width, height).await?;
            tokio::fs::write(&out, &image.data)
                .await
                .with_context(|| format!("failed to write {:?}", out))?;
            println!(
                "{}",
                json!({
                    "content_type": image.content_type,
                    "size": image.data.len(),
                    "path": out,
                })
            );
        },
    }

    Ok(())
}

async fn read_image(path: &Path) -> Result<Bytes> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {:?}", path))?;
    Ok(Bytes::from(data))
}
