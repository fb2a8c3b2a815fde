use crate::interpreter::RuntimeError;
use crate::parser::ParseError;
use crate::resolver::ResolveError;
use crate::scanner::ScanError;
use thiserror::Error;

/// Errors any stage of the pipeline can raise.
#[derive(Debug, Error)]
pub enum LoxError {
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl LoxError {
    pub fn line(&self) -> u32 {
        match self {
            LoxError::Scan(e) => e.line,
            LoxError::Parse(e) => e.line,
            LoxError::Resolve(e) => e.line,
            LoxError::Runtime(e) => e.line(),
        }
    }

    pub fn column(&self) -> u32 {
        match self {
            LoxError::Scan(e) => e.column,
            LoxError::Parse(e) => e.column,
            LoxError::Resolve(e) => e.column,
            LoxError::Runtime(e) => e.column(),
        }
    }
}

/// Collects the errors reported while running one piece of source.
///
/// Owned by the session driving the pipeline; stages hand their errors here
/// instead of printing them or touching process state.
#[derive(Debug, Default)]
pub struct Diagnostics {
    errors: Vec<LoxError>,
}

impl Diagnostics {
    pub fn new() -> Diagnostics {
        Diagnostics { errors: Vec::new() }
    }

    pub fn report<E: Into<LoxError>>(&mut self, error: E) {
        self.errors.push(error.into());
    }

    /// True if a scan, parse or resolve error was reported.
    pub fn had_error(&self) -> bool {
        self.errors
            .iter()
            .any(|e| !matches!(e, LoxError::Runtime(_)))
    }

    pub fn had_runtime_error(&self) -> bool {
        self.errors
            .iter()
            .any(|e| matches!(e, LoxError::Runtime(_)))
    }

    pub fn errors(&self) -> &[LoxError] {
        &self.errors
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Hands back every collected error, leaving the collector empty.
    pub fn drain(&mut self) -> Vec<LoxError> {
        std::mem::take(&mut self.errors)
    }

    pub fn clear(&mut self) {
        self.errors.clear();
    }
}
