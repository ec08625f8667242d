//! Success/failure verdict for captured sandbox output.
//!
//! A case-insensitive substring heuristic: output containing any failure
//! signal is a failure. It cannot tell a real traceback from a program
//! that legitimately prints a word like `error_rate`.

/// Verdict on one run's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Verdict {
    Success,
    Failure,
}

/// Classifies output against a fixed set of failure signals.
#[derive(Debug, Clone)]
pub(crate) struct OutcomeClassifier {
    /// Lowercased signals.
    signals: Vec<String>,
}

impl OutcomeClassifier {
    pub fn new<I, S>(signals: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            signals: signals
                .into_iter()
                .map(|s| s.as_ref().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    pub fn classify(&self, output: &str) -> Verdict {
        let lower = output.to_lowercase();
        if self.signals.iter().any(|s| lower.contains(s.as_str())) {
            Verdict::Failure
        } else {
            Verdict::Success
        }
    }
}

impl Default for OutcomeClassifier {
    fn default() -> Self {
        Self::new(["error", "traceback", "syntaxerror"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_output_is_success() {
        assert_eq!(OutcomeClassifier::default().classify("4"), Verdict::Success);
        assert_eq!(OutcomeClassifier::default().classify(""), Verdict::Success);
    }

    #[test]
    fn test_traceback_is_failure() {
        let out = "Traceback (most recent call last):\n  File \"<string>\", line 1\nNameError: name 'x' is not defined";
        assert_eq!(OutcomeClassifier::default().classify(out), Verdict::Failure);
    }

    #[test]
    fn test_match_is_case_insensitive() {
        let c = OutcomeClassifier::default();
        assert_eq!(c.classify("SyntaxError: invalid syntax"), Verdict::Failure);
        assert_eq!(c.classify("ERROR"), Verdict::Failure);
    }

    #[test]
    fn test_known_false_positive() {
        // Legitimate output containing a signal word is still a failure.
        let c = OutcomeClassifier::default();
        assert_eq!(c.classify("error_rate: 0.02"), Verdict::Failure);
    }

    #[test]
    fn test_custom_signals() {
        let c = OutcomeClassifier::new(["Traceback", ""]);
        assert_eq!(c.classify("error_rate: 0.02"), Verdict::Success);
        assert_eq!(c.classify("traceback"), Verdict::Failure);
    }

    #[test]
    fn test_timeout_sentinel_is_failure() {
        let c = OutcomeClassifier::default();
        assert_eq!(
            c.classify("TIMEOUT_ERROR: The execution exceeded the 15-second safety limit."),
            Verdict::Failure
        );
    }
}
