use std::path::PathBuf;

use clap::Parser;

use crate::error::EvalError;

#[derive(Parser, Debug)]
#[command(
    name = "pdf-eval",
    version,
    about = "Score PDF extraction predictions against embedded ground truth"
)]
pub struct EvalCli {
    /// Predictions JSON to score.
    #[arg(long, conflicts_with_all = ["info", "template"])]
    pub predictions: Option<PathBuf>,

    /// Also write the metrics report to this path.
    #[arg(long, requires = "predictions")]
    pub output: Option<PathBuf>,

    /// Score against this ground truth instead of the embedded payload.
    #[arg(long, requires = "predictions")]
    pub ground_truth: Option<PathBuf>,

    /// Print the extraction template and exit.
    #[arg(long, default_value_t = false, conflicts_with = "info")]
    pub template: bool,

    /// Print build metadata of the embedded payload and exit.
    #[arg(long, default_value_t = false)]
    pub info: bool,
}

#[derive(Debug, Clone)]
pub struct ScoreArgs {
    pub predictions: PathBuf,
    pub output: Option<PathBuf>,
    pub ground_truth: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub enum EvalMode {
    Template,
    Info,
    Score(ScoreArgs),
}

impl EvalCli {
    pub fn mode(self) -> Result<EvalMode, EvalError> {
        if self.template {
            return Ok(EvalMode::Template);
        }
        if self.info {
            return Ok(EvalMode::Info);
        }
        let predictions = self.predictions.ok_or(EvalError::MissingPredictions)?;
        Ok(EvalMode::Score(ScoreArgs {
            predictions,
            output: self.output,
            ground_truth: self.ground_truth,
        }))
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "pdf-eval-bake",
    version,
    about = "Bake ground truth into a self-contained pdf-eval evaluator"
)]
pub struct BakeCli {
    /// Ground-truth JSON file. Falls back to GROUND_TRUTH_PATH.
    #[arg(long, conflicts_with = "ground_truth_json")]
    pub ground_truth: Option<PathBuf>,

    /// Ground truth given inline as a JSON string.
    #[arg(long)]
    pub ground_truth_json: Option<String>,

    /// Where to write the baked evaluator.
    #[arg(long)]
    pub output: PathBuf,

    /// Unbaked evaluator to package. Falls back to PDF_EVAL_EVALUATOR, then
    /// the pdf-eval executable next to this tool.
    #[arg(long)]
    pub evaluator: Option<PathBuf>,

    /// Also write a JSON build report to this path.
    #[arg(long)]
    pub report: Option<PathBuf>,
}
