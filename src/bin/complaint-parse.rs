use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tracing::info;

use complaint_scout::core::logging::init_tracing;
use complaint_scout::parse_file;
use complaint_scout::storage::write_complaint_csv;

const DEFAULT_LOG: &str = "output/complaint_parse.log";

struct Args {
    input: PathBuf,
    output: PathBuf,
    log: PathBuf,
}

fn usage() -> ! {
    eprintln!("Usage: complaint-parse --input <dump.txt> --output <records.csv> [--log <path>]");
    std::process::exit(2);
}

fn parse_args() -> Args {
    let mut input = None;
    let mut output = None;
    let mut log = PathBuf::from(DEFAULT_LOG);

    let mut args = std::env::args().skip(1);
    while let Some(a) = args.next() {
        let (name, inline) = match a.split_once('=') {
            Some((n, v)) => (n.to_string(), Some(v.to_string())),
            None => (a.clone(), None),
        };
        let mut value = || inline.clone().or_else(|| args.next()).unwrap_or_else(|| usage());
        match name.as_str() {
            "--input" => input = Some(PathBuf::from(value())),
            "--output" => output = Some(PathBuf::from(value())),
            "--log" => log = PathBuf::from(value()),
            "-h" | "--help" => usage(),
            other => {
                eprintln!("unknown argument: {other}");
                usage();
            }
        }
    }

    match (input, output) {
        (Some(input), Some(output)) => Args { input, output, log },
        _ => usage(),
    }
}

fn main() -> Result<()> {
    let args = parse_args();
    init_tracing(Some(args.log.as_path()))?;

    if !args.input.is_file() {
        bail!("input file not found: {}", args.input.display());
    }
    let records = parse_file(&args.input)?;
    write_complaint_csv(&args.output, &records)
        .with_context(|| format!("writing {}", args.output.display()))?;
    info!(
        "wrote {} records to {}",
        records.len(),
        args.output.display()
    );
    println!("{}", args.output.display());
    Ok(())
}
