use thiserror::Error;

/// Failures that abort a whole request.
///
/// Everything else the pipeline can run into (bad status values, missing
/// template keys, an incomplete payload, a failed external call) is reported
/// as data on the outcome instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("query is empty")]
    EmptyQuery,

    #[error("intent resolver call failed: {0}")]
    Resolver(String),

    #[error("could not parse resolver output: {0}")]
    ResolverParse(String),

    #[error("template is missing required field(s): {}", .0.join(", "))]
    MissingTemplateFields(Vec<String>),

    #[error("template retrieval failed: {0}")]
    Retrieval(String),
}

impl PipelineError {
    /// Short machine-readable kind, used in events and plain output.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::EmptyQuery => "empty_query",
            PipelineError::Resolver(_) => "resolver",
            PipelineError::ResolverParse(_) => "resolver_parse",
            PipelineError::MissingTemplateFields(_) => "missing_template_fields",
            PipelineError::Retrieval(_) => "retrieval",
        }
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::ResolverParse(err.to_string())
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
