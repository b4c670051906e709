use std::env;
use std::process;

use anyhow::{Context, Result, bail};
use bestseller_sync::{app::ComponentRegistry, config::Config};
use tracing::error;

struct Options {
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let options = parse_args()?;
    let config = Config::from_env().context("failed to load configuration")?;
    let registry = ComponentRegistry::build(config).context("failed to build component registry")?;

    match registry.sync().run().await {
        Ok(report) => {
            if options.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&report).context("failed to encode report")?
                );
            } else {
                println!(
                    "sync {} completed: {} books, {} lists, {}/{} lookups matched, {} skipped",
                    report.run_id,
                    report.books_inserted,
                    report.lists,
                    report.lookups_succeeded,
                    report.lookups_attempted,
                    report.insert_failures,
                );
            }
            Ok(())
        }
        Err(err) => {
            error!(error = %err, "sync run failed");
            eprintln!("sync failed: {err}");
            process::exit(1);
        }
    }
}

fn parse_args() -> Result<Options> {
    let mut json = false;

    for arg in env::args().skip(1) {
        match arg.as_str() {
            "--json" => json = true,
            "--help" => {
                print_usage();
                process::exit(0);
            }
            _ => bail!("unknown argument: {}", arg),
        }
    }

    Ok(Options { json })
}

fn print_usage() {
    eprintln!(
        "Usage: sync_once [--json]\n\n\
         Runs one bestseller sync against DATABASE_URL and exits.\n\
         Exits non-zero when the run fails; the live table is left untouched.\n\n\
         Options:\n  \
           --json   print the run report as JSON\n  \
           --help   show this message"
    );
}
