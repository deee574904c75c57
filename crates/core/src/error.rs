#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Malformed filename '{filename}': {reason}")]
    MalformedFilename { filename: String, reason: String },

    #[error("Malformed scene name '{name}': {reason}")]
    MalformedSceneName { name: String, reason: String },

    #[error("Unknown {kind} '{value}'")]
    UnknownTaxonomy { kind: &'static str, value: String },

    #[error("Malformed {table} record: {reason}")]
    MalformedRecord { table: String, reason: String },

    #[error("Validation failed: {0}")]
    Validation(String),
}
