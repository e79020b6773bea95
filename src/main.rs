use std::{fs::File, io::BufReader, path::PathBuf};

use anyhow::Context;
use attendance_sync::{
    client::{HttpAttendanceApi, DEFAULT_BASE_URL},
    io,
    sync::{Reconciliation, SyncOptions},
    types::{CountPolicy, UnresolvedPolicy, DEFAULT_CREATOR},
};
use clap::Parser;

/// Synchronizes a class's attendance export with the remote register
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// Class whose attendance is synchronized
    #[arg(short, long)]
    class: u64,
    /// Value of the Authorization header sent with every request
    #[arg(short, long)]
    auth: Option<String>,
    /// Root URL of the attendance service
    #[arg(long, env = "ATTENDANCE_API_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,
    /// Directory holding one `<class>.csv` export per class
    #[arg(long, default_value = "./data")]
    data_dir: PathBuf,
    /// Export to read instead of `<data-dir>/<class>.csv`
    #[arg(long)]
    input: Option<PathBuf>,
    /// Stop before sending anything if a name matches no student
    #[arg(long)]
    strict: bool,
    /// Start from the totals stored remotely instead of recounting them
    #[arg(long)]
    trust_remote_counts: bool,
    /// Creator id of records that do not exist remotely yet
    #[arg(long, default_value_t = DEFAULT_CREATOR)]
    created_by: u64,
    /// Print the reconciled records instead of sending them
    #[arg(long)]
    dry_run: bool,
}

fn main() -> anyhow::Result<()> {
    attendance_sync::init_tracing();
    let args = Args::parse();

    let input = args
        .input
        .unwrap_or_else(|| args.data_dir.join(format!("{}.csv", args.class)));
    let options = SyncOptions {
        class_id: args.class.into(),
        created_by: args.created_by.into(),
        unresolved: if args.strict {
            UnresolvedPolicy::Abort
        } else {
            UnresolvedPolicy::Collect
        },
        counts: if args.trust_remote_counts {
            CountPolicy::KeepRemote
        } else {
            CountPolicy::Recompute
        },
    };
    let api = HttpAttendanceApi::new(args.base_url, args.auth)?;

    let export = File::open(&input)
        .with_context(|| format!("Couldn't open attendance export at {}", input.display()))?;

    let mut run = Reconciliation::new(options);
    run.fetch(&api).context("Failed to fetch reference data")?;
    run.import_csv(&mut BufReader::new(export))
        .with_context(|| format!("Failed to import {}", input.display()))?;

    if !run.unresolved().is_empty() {
        println!("The following students couldn't be found:");
        for name in run.unresolved() {
            println!("{name}");
        }
    }

    if args.dry_run {
        let mut stdout = std::io::stdout().lock();
        io::write_ledger_to_csv(&mut stdout, run.ledger())
            .context("Failed to write ledger summary")?;
        return Ok(());
    }

    let report = run.push(&api).context("Failed to synchronize attendance")?;
    println!(
        "Created {} and updated {} attendance records",
        report.created, report.updated
    );
    Ok(())
}
