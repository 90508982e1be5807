use std::fs;
use std::path::PathBuf;
use std::process;

use clap::Parser as _;
use dbmlerd::{ParseOptions, parse_report};

/// Parse a DBML document into an ER diagram model (JSON).
#[derive(clap::Parser, Debug)]
#[command(name = "dbmlerd", version)]
struct Cli {
    /// Input .dbml file
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Pretty-print the JSON
    #[arg(long)]
    pretty: bool,

    /// Fail on the first skipped line or block
    #[arg(long)]
    strict: bool,

    /// Include skipped lines and blocks in the JSON output
    #[arg(long)]
    diagnostics: bool,
}

fn main() {
    let cli = Cli::parse();

    let input = match fs::read_to_string(&cli.input) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to read {}: {}", cli.input.display(), e);
            process::exit(1);
        }
    };

    let options = ParseOptions { strict: cli.strict };
    let report = match parse_report(&input, options) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Parse error: {}", e);
            process::exit(1);
        }
    };

    for diagnostic in &report.diagnostics {
        eprintln!("warning: {}", diagnostic);
    }

    let json = match (cli.diagnostics, cli.pretty) {
        (true, true) => serde_json::to_string_pretty(&report),
        (true, false) => serde_json::to_string(&report),
        (false, true) => serde_json::to_string_pretty(&report.database),
        (false, false) => serde_json::to_string(&report.database),
    };
    let json = match json {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to serialize: {}", e);
            process::exit(1);
        }
    };

    match cli.output {
        Some(path) => {
            if let Err(e) = fs::write(&path, &json) {
                eprintln!("Failed to write {}: {}", path.display(), e);
                process::exit(1);
            }
        }
        None => println!("{}", json),
    }
}
