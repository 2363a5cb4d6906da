use std::path::PathBuf;

use anyhow::*;
use log::*;
use structopt::*;

use rangezip::read::*;
use rangezip::remote::*;
use rangezip::*;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "zip_ls",
    about = "Lists a .zip file's contents, reading only its metadata"
)]
struct Opt {
    /// Pass multiple times for additional verbosity (info, debug, trace)
    #[structopt(short, long, parse(from_occurrences))]
    verbosity: usize,

    /// Directory whose subdirectories are treated as buckets
    #[structopt(short, long, default_value = ".")]
    root: PathBuf,

    /// Block size for ranged fetches, in bytes
    #[structopt(short, long, default_value = "65536")]
    block_size: u64,

    /// Decode names without the UTF-8 flag as Code Page 437
    #[structopt(long)]
    cp437: bool,

    #[structopt(name("BUCKET"))]
    bucket: String,

    #[structopt(name("ZIP file"))]
    zip_name: String,
}

fn main() -> Result<()> {
    let args = Opt::from_args();

    let mut errlog = stderrlog::new();
    errlog.verbosity(args.verbosity + 1);
    errlog.init()?;

    let store = LocalStore::new(&args.root);
    let object = RemoteObject::locate(&store, &args.bucket, &args.zip_name)
        .with_context(|| format!("Couldn't find {}/{}", args.bucket, args.zip_name))?;

    let defaults = CacheConfig::default();
    let config = CacheConfig::new(
        args.block_size,
        defaults.max_blocks,
        defaults.block_spill_amount,
    )?;
    let mut reader = BlockCachedReader::with_config(&store, object, config, FetchOptions::default())
        .context("Couldn't open archive")?;

    let options = ParseOptions {
        charset: if args.cp437 {
            Charset::Cp437
        } else {
            Charset::Utf8
        },
        ..ParseOptions::default()
    };
    let archive = ZipArchive::read(&mut reader, &options).context("Couldn't read archive")?;
    info!(
        "Read {} entries with {} fetches",
        archive.entries().len(),
        reader.fetch_count()
    );

    for entry in archive.entries() {
        let modified = entry
            .last_modified()
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| String::from("????-??-?? ??:??"));
        let lock = match entry.encryption_method {
            EncryptionMethod::None => ' ',
            _ => '*',
        };
        println!(
            "{:>12} {:>12} {} {}{}",
            entry.uncompressed_size, entry.compressed_size, modified, lock, entry.name
        );
    }
    if let Some(comment) = archive.comment() {
        println!("{}", comment);
    }
    Ok(())
}
