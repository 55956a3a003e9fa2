use anyhow::{Context, Result};
use clap::Parser;
use dotenvy::dotenv;
use std::io::{self, BufWriter};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use student_db::codec;
use student_db::driver::{LineInput, Session};
use student_db::RecordStore;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(version, about = "Student database management system")]
struct Args {
    /// Store file used by Save, Load and the save on exit
    #[arg(long, short = 'f', env = "STUDENTS_FILE", default_value = "students.dat")]
    file: PathBuf,

    /// Students shown per page when displaying
    #[arg(long, env = "PAGE_SIZE", default_value = "5")]
    page_size: NonZeroUsize,

    /// Load the store file before showing the menu
    #[arg(long, env = "LOAD_ON_START", default_value_t = false)]
    load: bool,
}

fn main() -> Result<()> {
    // Load environment variables from .env if present
    let _ = dotenv();
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let store = if args.load {
        codec::load_or_empty(&args.file).with_context(|| format!("load {:?}", args.file))?
    } else {
        RecordStore::new()
    };

    let stdin = io::stdin();
    let input = LineInput::new(stdin.lock());
    let out = BufWriter::new(io::stdout().lock());
    let store = Session::new(store, input, out, &args.file, args.page_size)
        .run()
        .context("student session")?;
    eprintln!("{} students in {:?}.", store.len(), args.file);
    Ok(())
}
