use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::bake::{self, BakeRequest, GroundTruthSource};
use crate::cli::BakeCli;
use crate::error::BakeError;
use crate::util::{self, command_output_line, write_json_pretty};

const GROUND_TRUTH_ENV: &str = "GROUND_TRUTH_PATH";
const EVALUATOR_ENV: &str = "PDF_EVAL_EVALUATOR";
const COMMIT_ENV: &str = "GIT_COMMIT";

pub fn run(args: BakeCli) -> Result<()> {
    let schema = super::load_schema()?;

    let source = resolve_source(
        args.ground_truth,
        args.ground_truth_json,
        non_empty_env(GROUND_TRUTH_ENV).map(PathBuf::from),
    )?;
    let evaluator = resolve_evaluator(
        args.evaluator,
        non_empty_env(EVALUATOR_ENV).map(PathBuf::from),
    )?;
    info!(evaluator = %evaluator.display(), "using evaluator template");

    let source_commit = resolve_source_commit();
    if source_commit.is_none() {
        warn!("source commit unavailable; build metadata will omit it");
    }

    let request = BakeRequest {
        source,
        output: args.output,
        evaluator,
        build_time: util::resolve_build_time(),
        source_commit,
    };
    let report = bake::bake(&schema, &request)?;

    if let Some(path) = &args.report {
        write_json_pretty(path, &report)
            .with_context(|| format!("failed to write build report {}", path.display()))?;
        info!(path = %path.display(), "build report written");
    }

    Ok(())
}

fn resolve_source(
    path: Option<PathBuf>,
    inline: Option<String>,
    env_path: Option<PathBuf>,
) -> Result<GroundTruthSource, BakeError> {
    match (path, inline) {
        (Some(path), _) => Ok(GroundTruthSource::Path(path)),
        (None, Some(raw)) => Ok(GroundTruthSource::Inline(raw)),
        (None, None) => env_path
            .map(GroundTruthSource::Path)
            .ok_or(BakeError::MissingSource),
    }
}

/// Flag, then environment, then the `pdf-eval` executable beside this one.
fn resolve_evaluator(flag: Option<PathBuf>, env_path: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = flag.or(env_path) {
        return Ok(path);
    }

    let current = env::current_exe().context("failed to locate the running bake tool")?;
    let dir = current
        .parent()
        .with_context(|| format!("{} has no parent directory", current.display()))?;
    Ok(dir.join(format!("pdf-eval{}", env::consts::EXE_SUFFIX)))
}

fn resolve_source_commit() -> Option<String> {
    non_empty_env(COMMIT_ENV).or_else(|| command_output_line("git", &["rev-parse", "HEAD"]))
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
