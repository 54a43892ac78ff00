use thiserror::Error;

#[derive(Debug, Error)]
pub enum VeritasError {
    // LLM errors
    #[error("LLM request failed: {0}")]
    LlmRequest(String),

    #[error("LLM provider not supported: {0}")]
    UnsupportedProvider(String),

    #[error("LLM response parse error: {0}")]
    LlmParse(String),

    // Collaborator errors
    #[error("Search failed: {0}")]
    Search(String),

    #[error("Scraping failed: {url}: {message}")]
    Scrape { url: String, message: String },

    #[error("Analysis failed: {0}")]
    Analysis(String),

    #[error("Report rendering failed: {0}")]
    Report(String),

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // Storage errors
    #[error("Database error: {0}")]
    Database(String),

    #[error("Embedding failed: {0}")]
    Embedding(String),

    // Graph wiring errors
    #[error("Graph validation failed: {0}")]
    GraphValidation(String),

    #[error("Node already registered: {0}")]
    DuplicateNode(String),

    #[error("Node {0} already has an outgoing edge")]
    EdgeConflict(String),

    #[error("Node not found in graph: {0}")]
    NodeNotFound(String),

    #[error("Route label '{label}' returned after node {node} has no declared target")]
    UndeclaredRoute { node: String, label: String },

    #[error("Graph exceeded recursion limit ({0} steps)")]
    RecursionLimit(usize),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl VeritasError {
    /// Structural errors abort a graph run; everything else is recoverable inside a node.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            VeritasError::GraphValidation(_)
                | VeritasError::DuplicateNode(_)
                | VeritasError::EdgeConflict(_)
                | VeritasError::NodeNotFound(_)
                | VeritasError::UndeclaredRoute { .. }
                | VeritasError::RecursionLimit(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, VeritasError>;
