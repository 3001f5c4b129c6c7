use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use chunkpack_core::discover::Filters;
use chunkpack_core::inspect::inspect;
use chunkpack_core::path_safety::PathPolicy;
use chunkpack_core::{Decoder, DecoderConfig, Encoder, EncoderConfig};

#[derive(Parser)]
#[command(
    name = "chunkpack",
    version,
    about = "Split large files into fixed-size chunks plus a header, and put them back together"
)]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Pack a file or a directory tree into chunk files
    Encode {
        /// File or directory to pack
        input: PathBuf,
        /// Directory to write the header and chunk files to
        output: PathBuf,
        /// Maximum chunk size: bytes, or with a K/M/G suffix (binary units)
        #[arg(short = 's', long, default_value = "24M", value_parser = parse_size)]
        chunk_size: u64,
        /// Only pack files whose relative name matches (repeatable)
        #[arg(long)]
        include: Vec<String>,
        /// Skip files whose relative name matches (repeatable)
        #[arg(long)]
        exclude: Vec<String>,
        /// Replace header and chunk files left by an earlier run
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Rebuild the original files from a chunk directory
    Decode {
        /// Directory holding the header and chunk files
        chunk_dir: PathBuf,
        /// Where to write the files (defaults to the current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Allow writing through symlinks that stay inside the output directory
        #[arg(long, default_value_t = false)]
        follow_symlinks: bool,
    },
    /// Check a chunk directory and list its contents without writing anything
    Inspect { chunk_dir: PathBuf },
}

fn main() -> ExitCode {
    // RUST_LOG overrides the default level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let res = match cli.cmd {
        Cmd::Encode { input, output, chunk_size, include, exclude, force } => {
            encode(&input, &output, chunk_size, &include, &exclude, force)
        }
        Cmd::Decode { chunk_dir, output, follow_symlinks } => {
            decode(&chunk_dir, output, follow_symlinks)
        }
        Cmd::Inspect { chunk_dir } => inspect_dir(&chunk_dir),
    };
    match res {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn parse_size(spec: &str) -> Result<u64> {
    let s = spec.trim().to_uppercase();
    let (num, mul) = if let Some(n) = s.strip_suffix('K') {
        (n, 1u64 << 10)
    } else if let Some(n) = s.strip_suffix('M') {
        (n, 1 << 20)
    } else if let Some(n) = s.strip_suffix('G') {
        (n, 1 << 30)
    } else {
        (&s[..], 1)
    };
    let v: u64 = num.trim().parse().map_err(|_| anyhow!("bad size {}", spec))?;
    let bytes = v.checked_mul(mul).ok_or_else(|| anyhow!("size {} is too large", spec))?;
    if bytes == 0 {
        return Err(anyhow!("size must be at least 1 byte"));
    }
    Ok(bytes)
}

fn encode(
    input: &Path,
    output: &Path,
    chunk_size: u64,
    includes: &[String],
    excludes: &[String],
    force: bool,
) -> Result<()> {
    let cfg = EncoderConfig {
        chunk_size,
        filters: Filters::new(includes, excludes)?,
        overwrite: force,
    };
    let rep = Encoder::encode(input, output, &cfg)?;
    eprintln!(
        "Encoded {} file(s), {} bytes into {} chunk(s) under {} in {:.2}s",
        rep.header.entries.len(),
        rep.header.total_bytes,
        rep.chunks.len(),
        output.display(),
        rep.elapsed.as_secs_f64()
    );
    Ok(())
}

fn decode(chunk_dir: &Path, output: Option<PathBuf>, follow_symlinks: bool) -> Result<()> {
    let output = match output {
        Some(p) => p,
        None => std::env::current_dir()?,
    };
    let cfg = DecoderConfig { policy: PathPolicy { follow_symlinks } };
    let rep = Decoder::decode(chunk_dir, &output, &cfg)?;
    eprintln!(
        "Decoded {} file(s), {} bytes into {} in {:.2}s",
        rep.written.len(),
        rep.header.total_bytes,
        output.display(),
        rep.elapsed.as_secs_f64()
    );
    Ok(())
}

fn inspect_dir(chunk_dir: &Path) -> Result<()> {
    let rep = inspect(chunk_dir)?;
    let h = &rep.header;
    for e in &h.entries {
        println!("{:>14} {:>14}  {}", e.offset, e.size, e.name);
    }
    println!(
        "{} file(s), {} bytes in {} chunk(s) of {} bytes: OK",
        h.entries.len(),
        h.total_bytes,
        rep.chunks.len(),
        h.chunk_size
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_accept_binary_suffixes() {
        assert_eq!(parse_size("100").unwrap(), 100);
        assert_eq!(parse_size("8k").unwrap(), 8 * 1024);
        assert_eq!(parse_size("24M").unwrap(), 24 * 1024 * 1024);
        assert_eq!(parse_size(" 2G ").unwrap(), 2 * 1024 * 1024 * 1024);
    }

    #[test]
    fn sizes_reject_garbage_and_zero() {
        assert!(parse_size("").is_err());
        assert!(parse_size("M").is_err());
        assert!(parse_size("1.5M").is_err());
        assert!(parse_size("0").is_err());
        assert!(parse_size("99999999999999999999G").is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
