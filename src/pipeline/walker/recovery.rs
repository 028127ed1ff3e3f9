//! Ordered recovery strategies: try each in turn, stop at the first that
//! works.
//!
//! Used for the return-to-list affordances (primary button, then fallbacks)
//! and for project selection (configured label, then first real option).

use std::time::Duration;

use super::error::DocumentError;
use super::traits::InteractiveDocument;
use super::types::OptionChoice;

/// One strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recovery {
    /// Wait up to `wait` for `selector` to be visible, then click it.
    Click { selector: String, wait: Duration },
    /// Pick an option from a select element.
    Select {
        selector: String,
        choice: OptionChoice,
    },
}

impl Recovery {
    pub fn apply<D: InteractiveDocument + ?Sized>(&self, doc: &mut D) -> Result<(), DocumentError> {
        match self {
            Self::Click { selector, wait } => {
                doc.wait_until_visible(selector, *wait)?;
                doc.click(selector)
            }
            Self::Select { selector, choice } => doc.select_option(selector, choice),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Click { selector, .. } => format!("click {selector}"),
            Self::Select { selector, choice } => format!("select {choice} in {selector}"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryChain {
    steps: Vec<Recovery>,
}

impl RecoveryChain {
    pub fn new(steps: Vec<Recovery>) -> Self {
        Self { steps }
    }

    /// Primary click followed by fallback clicks, each with its own wait.
    pub fn clicks(
        primary: &str,
        primary_wait: Duration,
        fallbacks: &[String],
        fallback_wait: Duration,
    ) -> Self {
        let mut steps = vec![Recovery::Click {
            selector: primary.to_string(),
            wait: primary_wait,
        }];
        steps.extend(fallbacks.iter().map(|s| Recovery::Click {
            selector: s.clone(),
            wait: fallback_wait,
        }));
        Self { steps }
    }

    pub fn steps(&self) -> &[Recovery] {
        &self.steps
    }

    /// Apply strategies in order. Returns the index of the one that
    /// succeeded, or the last strategy's error when none did.
    pub fn attempt<D: InteractiveDocument + ?Sized>(
        &self,
        doc: &mut D,
    ) -> Result<usize, DocumentError> {
        let mut last = None;
        for (i, step) in self.steps.iter().enumerate() {
            match step.apply(doc) {
                Ok(()) => {
                    if i > 0 {
                        tracing::debug!(
                            strategy = %step.describe(),
                            position = i,
                            "Fallback strategy used"
                        );
                    }
                    return Ok(i);
                }
                Err(e) => {
                    tracing::debug!(strategy = %step.describe(), error = %e, "Strategy failed");
                    last = Some(e);
                }
            }
        }
        Err(last.unwrap_or_else(|| DocumentError::NotFound("<empty recovery chain>".into())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PageSelectors;
    use crate::pipeline::walker::ScriptedDocument;

    fn doc(dir: &tempfile::TempDir) -> ScriptedDocument {
        ScriptedDocument::new(PageSelectors::default(), dir.path())
    }

    #[test]
    fn first_working_strategy_wins() {
        let dir = tempfile::tempdir().unwrap();
        let mut d = doc(&dir);
        let chain = RecoveryChain::clicks(
            "#list",
            Duration::from_millis(10),
            &["#close".into()],
            Duration::from_millis(10),
        );
        assert_eq!(chain.attempt(&mut d).unwrap(), 0);
        assert_eq!(d.clicks(), &["#list"]);
    }

    #[test]
    fn falls_through_hidden_primary() {
        let dir = tempfile::tempdir().unwrap();
        let mut d = doc(&dir).hide("#list");
        let chain = RecoveryChain::clicks(
            "#list",
            Duration::from_millis(10),
            &["#close".into(), "#alt".into()],
            Duration::from_millis(10),
        );
        assert_eq!(chain.attempt(&mut d).unwrap(), 1);
        assert_eq!(d.clicks(), &["#close"]);
    }

    #[test]
    fn all_failing_returns_last_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut d = doc(&dir).hide("a").hide("b");
        let chain = RecoveryChain::clicks("a", Duration::ZERO, &["b".into()], Duration::ZERO);
        let err = chain.attempt(&mut d).unwrap_err();
        assert!(matches!(err, DocumentError::Timeout { ref what, .. } if what == "b"));
    }

    #[test]
    fn select_falls_back_to_index() {
        let dir = tempfile::tempdir().unwrap();
        let mut d = doc(&dir).with_options("#ProjectId", &["--Select--", "NHP"]);
        let chain = RecoveryChain::new(vec![
            Recovery::Select {
                selector: "#ProjectId".into(),
                choice: OptionChoice::Label("--All--".into()),
            },
            Recovery::Select {
                selector: "#ProjectId".into(),
                choice: OptionChoice::Index(1),
            },
        ]);
        assert_eq!(chain.attempt(&mut d).unwrap(), 1);
        assert_eq!(d.selected("#ProjectId"), Some("NHP"));
    }

    #[test]
    fn empty_chain_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut d = doc(&dir);
        assert!(RecoveryChain::default().attempt(&mut d).is_err());
    }
}
