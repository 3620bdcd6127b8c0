use anyhow::Result;
use clap::Parser;
use tracing::error;

use pdf_eval::cli::{EvalCli, EvalMode};
use pdf_eval::commands;
use pdf_eval::error::classify;
use pdf_eval::util::init_tracing;

fn main() {
    init_tracing("warn");

    if let Err(err) = run() {
        let class = classify(&err);
        error!(exit_code = class.code(), "{err:#}");
        std::process::exit(class.code());
    }
}

fn run() -> Result<()> {
    let cli = EvalCli::parse();

    match cli.mode()? {
        EvalMode::Template => commands::template::run(),
        EvalMode::Info => commands::info::run(),
        EvalMode::Score(args) => {
            let schema = commands::load_schema()?;
            commands::score::run(&schema, args)
        }
    }
}
