use thiserror::Error;

#[derive(Error, Debug)]
pub enum TallyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Spreadsheet read error: {0}")]
    Read(#[from] calamine::Error),

    #[error("Template document error: {0}")]
    Document(String),

    #[error("Missing sheet '{sheet}' (available: {available})")]
    MissingSheet { sheet: String, available: String },

    #[error("Missing row: {0}")]
    MissingRow(String),

    #[error("Couldn't find '{label}' (@{score}%)")]
    LowConfidence { label: String, score: u8 },

    #[error("Unknown month: {0} (expected Jan..Dec)")]
    UnknownMonth(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("Processing error at stage '{stage}': {source}")]
    Stage {
        stage: String,
        #[source]
        source: Box<TallyError>,
    },

    #[error("{0}")]
    Other(String),
}

impl TallyError {
    pub fn missing_sheet(sheet: &str, available: &[String]) -> Self {
        Self::MissingSheet {
            sheet: sheet.to_string(),
            available: available.join(", "),
        }
    }

    /// Stage name for fatal errors, if this error carries one.
    pub fn stage(&self) -> Option<&str> {
        match self {
            Self::Stage { stage, .. } => Some(stage),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, TallyError>;

/// Attaches the running stage name to a fatal error.
pub trait StageExt<T> {
    fn stage(self, stage: &str) -> Result<T>;
}

impl<T> StageExt<T> for Result<T> {
    fn stage(self, stage: &str) -> Result<T> {
        self.map_err(|e| TallyError::Stage {
            stage: stage.to_string(),
            source: Box::new(e),
        })
    }
}
