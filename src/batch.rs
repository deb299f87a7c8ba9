//! Tabular batch runner.
//!
//! Reads a CSV of prompts, fires a configurable number of trials per row
//! through a resilient client, and writes one output row per trial. Input
//! columns pass through unchanged; `model_response`, `trial_id` and `error`
//! columns are appended. A failed trial gets an empty response and its error
//! display; it never aborts the rest of the batch.
//!
//! All trials run concurrently; the client's admission limiter bounds how
//! many are actually in flight. Output order is by `(row, trial)` key, never
//! by completion order.

use std::path::Path;

use tracing::{info, warn};

use crate::client::CompletionClient;
use crate::error::LlmError;
use crate::types::message::Message;
use crate::utils::strip_code_fence;

/// Batch execution options.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Input column holding the prompt text
    pub prompt_column: String,
    /// Completions sampled per row
    pub trials: u32,
    /// Unwrap a single outer Markdown code fence before writing
    pub strip_code_fence: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            prompt_column: "prompt".to_string(),
            trials: 5,
            strip_code_fence: false,
        }
    }
}

/// Outcome counts for one batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    /// Input data rows processed
    pub rows: usize,
    /// Trials per row
    pub trials: u32,
    /// Trials that ended in an error
    pub failures: usize,
}

/// Run every row of `input_path` through `client` and write the results.
pub async fn run_batch(
    client: &CompletionClient,
    input_path: &Path,
    output_path: &Path,
    options: &BatchOptions,
) -> Result<BatchSummary, LlmError> {
    let mut reader = csv::Reader::from_path(input_path)
        .map_err(|e| LlmError::IoError(format!("failed to open {}: {e}", input_path.display())))?;
    let headers = reader
        .headers()
        .map_err(|e| LlmError::IoError(e.to_string()))?
        .clone();
    let prompt_idx = headers
        .iter()
        .position(|h| h == options.prompt_column)
        .ok_or_else(|| {
            LlmError::InvalidInput(format!(
                "input has no '{}' column",
                options.prompt_column
            ))
        })?;
    let rows: Vec<csv::StringRecord> = reader
        .records()
        .collect::<Result<_, _>>()
        .map_err(|e| LlmError::IoError(e.to_string()))?;

    info!(
        provider = %client.provider(),
        rows = rows.len(),
        trials = options.trials,
        "starting batch run"
    );

    let mut calls = Vec::with_capacity(rows.len() * options.trials as usize);
    for (row_index, record) in rows.iter().enumerate() {
        let prompt = record.get(prompt_idx).unwrap_or("").to_string();
        for trial in 1..=options.trials {
            let messages = vec![Message::user(prompt.clone())];
            calls.push(async move {
                let result = client.complete_resilient(&messages).await;
                ((row_index, trial), result)
            });
        }
    }
    let mut results = futures::future::join_all(calls).await;
    // Reorder by the caller-assigned key, not completion order.
    results.sort_by_key(|(key, _)| *key);

    let mut writer = csv::Writer::from_path(output_path)
        .map_err(|e| LlmError::IoError(format!("failed to create {}: {e}", output_path.display())))?;
    let mut out_headers: Vec<&str> = headers.iter().collect();
    out_headers.extend(["model_response", "trial_id", "error"]);
    writer
        .write_record(&out_headers)
        .map_err(|e| LlmError::IoError(e.to_string()))?;

    let mut failures = 0;
    for ((row_index, trial), result) in results {
        let (text, error) = match result {
            Ok(response) => {
                let text = if options.strip_code_fence {
                    strip_code_fence(response.text()).to_string()
                } else {
                    response.text().to_string()
                };
                (text, String::new())
            }
            Err(e) => {
                failures += 1;
                warn!(row = row_index, trial, error = %e, "trial failed");
                (String::new(), e.to_string())
            }
        };
        let mut out: Vec<String> = rows[row_index].iter().map(str::to_string).collect();
        out.push(text);
        out.push(trial.to_string());
        out.push(error);
        writer
            .write_record(&out)
            .map_err(|e| LlmError::IoError(e.to_string()))?;
    }
    writer
        .flush()
        .map_err(|e| LlmError::IoError(e.to_string()))?;

    let summary = BatchSummary {
        rows: rows.len(),
        trials: options.trials,
        failures,
    };
    info!(
        rows = summary.rows,
        trials = summary.trials,
        failures = summary.failures,
        "batch run complete"
    );
    Ok(summary)
}
