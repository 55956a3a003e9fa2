use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, Write};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use student_db::driver::write_page;
use student_db::{codec, SortKey};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(about = "Print the contents of a students file")]
struct Args {
    /// Store file to read
    #[arg(long, short = 'i')]
    input: PathBuf,

    /// Reorder before printing (id, name or score)
    #[arg(long)]
    sort: Option<SortKey>,

    /// Students per printed page
    #[arg(long, default_value = "5")]
    page_size: NonZeroUsize,

    /// Look up a student by exact name; may be repeated
    #[arg(long)]
    find: Vec<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let mut store = codec::load(&args.input).with_context(|| format!("open {:?}", args.input))?;
    if let Some(key) = args.sort {
        store.sort(key);
    }

    let mut out = io::stdout().lock();
    let total = store.page_count(args.page_size);
    for (i, page) in store.paginate(args.page_size).enumerate() {
        writeln!(out, "page {}/{}", i + 1, total)?;
        write_page(&mut out, page)?;
        writeln!(out)?;
    }

    for name in &args.find {
        match store.find_by_name(name) {
            Some(idx) => {
                let s = &store.as_slice()[idx];
                writeln!(out, "{name:?}: index={} id={} age={} score={:.2}", idx, s.id, s.age, s.score)?;
            }
            None => writeln!(out, "{name:?}: not found")?,
        }
    }

    eprintln!("Read {} students ({}).", store.len(), store.order());
    Ok(())
}
