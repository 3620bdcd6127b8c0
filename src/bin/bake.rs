use clap::Parser;
use tracing::error;

use pdf_eval::cli::BakeCli;
use pdf_eval::commands;
use pdf_eval::error::classify;
use pdf_eval::util::init_tracing;

fn main() {
    init_tracing("info");

    if let Err(err) = commands::bake::run(BakeCli::parse()) {
        let class = classify(&err);
        error!(exit_code = class.code(), "{err:#}");
        std::process::exit(class.code());
    }
}
