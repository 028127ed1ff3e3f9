use thiserror::Error;

use crate::pipeline::readings::RowError;

/// Failure reported by an `InteractiveDocument`.
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Timed out after {waited_ms}ms waiting for {what}")]
    Timeout { what: String, waited_ms: u64 },

    #[error("No element matches '{0}'")]
    NotFound(String),

    #[error("Element {index} of '{selector}' requested, {count} present")]
    IndexOutOfRange {
        selector: String,
        index: usize,
        count: usize,
    },

    #[error("Select '{selector}' has no option {choice}")]
    OptionMissing { selector: String, choice: String },

    #[error("WebDriver transport error: {0}")]
    Transport(String),

    #[error("WebDriver error {status} ({error}): {message}")]
    Protocol {
        status: u16,
        error: String,
        message: String,
    },

    #[error("Unexpected WebDriver response: {0}")]
    Response(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DocumentError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// The element or option the caller asked for is not on the page.
    pub fn is_missing(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_) | Self::IndexOutOfRange { .. } | Self::OptionMissing { .. }
        )
    }
}

/// Structural failure: the walk cannot start or continue at all.
#[derive(Error, Debug)]
pub enum WalkError {
    #[error("Navigation timed out at step '{step}': {source}")]
    NavigationTimeout {
        step: &'static str,
        source: DocumentError,
    },

    #[error("Filter returned no wells")]
    NoResultsFound,

    #[error("Document error at step '{step}': {source}")]
    Document {
        step: &'static str,
        source: DocumentError,
    },
}

impl WalkError {
    pub(crate) fn at(step: &'static str) -> impl FnOnce(DocumentError) -> Self {
        move |source| {
            if source.is_timeout() {
                Self::NavigationTimeout { step, source }
            } else {
                Self::Document { step, source }
            }
        }
    }
}

/// Why one well could not be extracted. Never aborts the walk.
#[derive(Error, Debug)]
pub enum WellFailure {
    #[error("Timed out during {step}: {source}")]
    Timeout {
        step: &'static str,
        source: DocumentError,
    },

    #[error("Affordance missing during {step}: {source}")]
    MissingAffordance {
        step: &'static str,
        source: DocumentError,
    },

    #[error("Row {index} not in table ({count} rows after re-fetch)")]
    RowMissing { index: usize, count: usize },

    #[error("Downloaded file rejected: {0}")]
    Parse(#[from] RowError),

    #[error("Document error during {step}: {source}")]
    Document {
        step: &'static str,
        source: DocumentError,
    },
}

impl WellFailure {
    pub(crate) fn at(step: &'static str) -> impl FnOnce(DocumentError) -> Self {
        move |source| {
            if source.is_timeout() {
                Self::Timeout { step, source }
            } else if source.is_missing() {
                Self::MissingAffordance { step, source }
            } else {
                Self::Document { step, source }
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::MissingAffordance { .. } => "missing_affordance",
            Self::RowMissing { .. } => "row_missing",
            Self::Parse(_) => "parse",
            Self::Document { .. } => "document",
        }
    }
}

/// A failed well, as recorded in the walk report.
#[derive(Error, Debug)]
#[error("Well #{ordinal} failed: {failure}")]
pub struct FailedWell {
    pub ordinal: usize,
    /// Identity, when the row was read before the failure.
    pub well_id: Option<String>,
    pub failure: WellFailure,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timeout() -> DocumentError {
        DocumentError::Timeout {
            what: "#agency".into(),
            waited_ms: 10,
        }
    }

    #[test]
    fn walk_timeouts_are_navigation_timeouts() {
        let err = WalkError::at("agency")(timeout());
        assert!(matches!(err, WalkError::NavigationTimeout { step: "agency", .. }));
        let err = WalkError::at("agency")(DocumentError::NotFound("#agency".into()));
        assert!(matches!(err, WalkError::Document { .. }));
    }

    #[test]
    fn well_failures_are_classified() {
        assert_eq!(WellFailure::at("export")(timeout()).kind(), "timeout");
        assert_eq!(
            WellFailure::at("export")(DocumentError::NotFound("button".into())).kind(),
            "missing_affordance"
        );
        assert_eq!(
            WellFailure::at("export")(DocumentError::Transport("reset".into())).kind(),
            "document"
        );
        assert_eq!(WellFailure::from(RowError::EmptyFile).kind(), "parse");
    }
}
