//! Error types for the replay harness

use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Transcript not found: {0}")]
    TranscriptNotFound(String),

    #[error("Unsupported transcript extension '{0}'. Use .xlsx/.xls/.xlsb/.ods/.csv")]
    UnsupportedFormat(String),

    #[error("Expected columns 'Speaker' and 'Message' in {path}. Found: {found:?}")]
    MissingColumns { path: String, found: Vec<String> },

    #[error("Transcript parse error: {0}")]
    TranscriptParse(String),

    #[error("Ground-truth file not found: {0}")]
    GroundTruthNotFound(String),

    #[error("Predictions file not found: {0}")]
    PredictionsNotFound(String),

    #[error("Expected columns 'y_true' and 'y_pred' in {path}. Found: {found:?}")]
    MissingPredictionColumns { path: String, found: Vec<String> },

    #[error("Dependency unavailable: {0}")]
    DependencyUnavailable(String),

    #[error("Browser failed to launch: {0}")]
    BrowserLaunch(String),

    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Playwright not found. Install with: npm i playwright && npx playwright install")]
    PlaywrightNotFound,

    #[error("Playwright error: {0}")]
    Playwright(String),

    #[error("Language model error: {0}")]
    LanguageModel(String),

    #[error("Configuration error: {0}")]
    Config(#[from] compare_qa_common::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type E2eResult<T> = Result<T, E2eError>;
