use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::cli::ScoreArgs;
use crate::error::{DatasetRole, EvalError};
use crate::model::Dataset;
use crate::schema::{Schema, ValidationPolicy};
use crate::scoring;
use crate::util::{read_json_file, write_json_pretty};

pub fn run(schema: &Schema, args: ScoreArgs) -> Result<()> {
    let predictions = load_dataset(
        schema,
        &args.predictions,
        DatasetRole::Predictions,
        ValidationPolicy::predictions(),
    )?;
    info!(
        path = %args.predictions.display(),
        documents = predictions.len(),
        "predictions loaded"
    );

    let ground_truth = match &args.ground_truth {
        Some(path) => {
            info!(path = %path.display(), "scoring against ground truth override");
            load_dataset(
                schema,
                path,
                DatasetRole::GroundTruth,
                ValidationPolicy::ground_truth(),
            )?
        }
        None => super::embedded_ground_truth(schema)?,
    };

    let report = scoring::score(schema, &ground_truth, &predictions);
    let rendered = serde_json::to_string_pretty(&report).context("failed to render metrics")?;

    if let Some(path) = &args.output {
        write_json_pretty(path, &report).map_err(|source| EvalError::Output {
            path: path.clone(),
            source,
        })?;
        info!(path = %path.display(), "metrics written");
    }

    println!("{rendered}");
    Ok(())
}

fn load_dataset(
    schema: &Schema,
    path: &Path,
    role: DatasetRole,
    policy: ValidationPolicy,
) -> Result<Dataset, EvalError> {
    let raw = read_json_file(path).map_err(|source| EvalError::Input { role, source })?;
    schema
        .validate(&raw, policy)
        .map_err(|source| EvalError::Schema { role, source })
}
