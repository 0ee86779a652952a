use thiserror::Error;

#[derive(Error, Debug)]
pub enum DrugMatchError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("MFDS service key is not set. Run `drugmatch config --set-service-key YOUR_KEY` or set MFDS_SERVICE_KEY")]
    MissingServiceKey,

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Ingestion error: {0}")]
    Ingest(String),

    #[error("No source rows with a product name: {0}")]
    NoSourceRows(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("JSON error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Spreadsheet read error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("Excel write error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Dictionary error: {0}")]
    Dictionary(#[from] drugmatch_common::Error),
}

pub type Result<T> = std::result::Result<T, DrugMatchError>;
