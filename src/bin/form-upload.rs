use std::{fs::File, io::BufReader, path::PathBuf};

use anyhow::Context;
use attendance_sync::{
    client::{HttpFormApi, DEFAULT_FORM_URL},
    forms::{upload_form_lines, FormTemplate},
    io,
};
use clap::Parser;

/// Posts every row of monthly report tables as a form-data record
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// User id the records are submitted as
    #[arg(long, default_value_t = 1)]
    user: u64,
    /// Schema id of the form
    #[arg(long, default_value_t = 1)]
    schema: u64,
    /// Auth token, sent as `Authorization: Token <token>`
    #[arg(long)]
    token: Option<String>,
    /// Form-data endpoint
    #[arg(long, env = "FORM_DATA_URL", default_value = DEFAULT_FORM_URL)]
    url: String,
    /// CSV tables with a header row; the first two columns are month and year
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    attendance_sync::init_tracing();
    let args = Args::parse();
    let template = FormTemplate {
        user: args.user,
        schema: args.schema,
    };
    let api = HttpFormApi::new(args.url, args.token)?;

    for path in &args.files {
        let file = File::open(path)
            .with_context(|| format!("Couldn't open table at {}", path.display()))?;
        let lines = io::load_form_lines_from_csv(&mut BufReader::new(file), &template)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let uploaded = upload_form_lines(&api, &lines)
            .with_context(|| format!("Failed to upload {}", path.display()))?;
        tracing::info!(file = %path.display(), uploaded, "table uploaded");
    }
    Ok(())
}
