// Pipeline errors
// Configuration problems are fatal and surface immediately; nothing here is retried.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// A dimension table needed by an enrichment stage was not supplied
    #[error("dimension table `{table}` is required by stage `{stage}` but was not supplied")]
    MissingTable {
        table: &'static str,
        stage: &'static str,
    },

    /// A column needed to load a table or perform a join is absent
    #[error("table `{table}` is missing required column `{column}`")]
    MissingColumn { table: String, column: String },

    /// The selected year matched no record and the policy asks for an error
    #[error("no records found for selected year {year}")]
    NoRecordsForYear { year: i32 },

    #[error("failed to read CSV from {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("failed to open {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl PipelineError {
    pub fn missing_column(table: impl Into<String>, column: impl Into<String>) -> Self {
        PipelineError::MissingColumn {
            table: table.into(),
            column: column.into(),
        }
    }

    /// True for the configuration class of errors (bad setup, not bad luck)
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            PipelineError::MissingTable { .. }
                | PipelineError::MissingColumn { .. }
                | PipelineError::Config(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
