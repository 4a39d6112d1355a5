use thiserror::Error;

/// Failures reported by an external template engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("template engine unavailable")]
    EngineUnavailable,
    #[error("template `{id}` produced no output")]
    Empty { id: u64 },
    #[error("template `{id}` failed: {message}")]
    Failed { id: u64, message: String },
}

impl RenderError {
    pub fn failed(id: u64, message: impl Into<String>) -> Self {
        Self::Failed {
            id,
            message: message.into(),
        }
    }
}

/// Failures raised by host functions reachable from `{func:...}`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FunctionError {
    #[error("function `{name}` expects {expected}")]
    Arity { name: &'static str, expected: &'static str },
    #[error("function `{name}` rejected argument: {message}")]
    Argument { name: &'static str, message: String },
}

impl FunctionError {
    pub fn arity(name: &'static str, expected: &'static str) -> Self {
        Self::Arity { name, expected }
    }

    pub fn argument(name: &'static str, message: impl Into<String>) -> Self {
        Self::Argument {
            name,
            message: message.into(),
        }
    }
}
