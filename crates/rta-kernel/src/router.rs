//! Intent classification.
//!
//! Routing decisions that must be cheap (is this small talk? is this an
//! alert request?) go through the [`IntentClassifier`] trait so that the
//! heuristic can be swapped for something more principled without touching
//! the workflow.  The default implementation, [`KeywordClassifier`], tests
//! the text against a fixed marker set using a single SIMD-accelerated
//! [`aho_corasick`] automaton.
//!
//! # Example
//!
//! ```rust
//! # use rta_kernel::router::{IntentClassifier, KeywordClassifier};
//! let greetings = KeywordClassifier::greetings();
//!
//! assert!(greetings.matches("Hello there"));
//! assert!(!greetings.matches("which hour had the highest heart rate"));
//! ```

use aho_corasick::AhoCorasick;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Marker sets
// ---------------------------------------------------------------------------

/// Greeting and small-talk markers.
pub const GREETING_MARKERS: &[&str] = &[
    "hello",
    "hi",
    "hey",
    "hiya",
    "howdy",
    "greetings",
    "good morning",
    "good afternoon",
    "good evening",
    "how are you",
    "what's up",
    "whats up",
    "thanks",
    "thank you",
    "goodbye",
    "bye",
];

/// Markers that signal a request for continuous monitoring.
pub const ALERT_MARKERS: &[&str] = &[
    "alert",
    "alerts",
    "notify",
    "notification",
    "warn",
    "warning",
];

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// A yes/no classifier over request text.
pub trait IntentClassifier: Send + Sync {
    /// Whether `text` belongs to the class this classifier recognises.
    fn matches(&self, text: &str) -> bool;
}

/// Where in the text a marker may occur.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// The marker must open the text (after leading whitespace).
    Prefix,
    /// The marker may occur anywhere in the text.
    #[default]
    Substring,
}

// ---------------------------------------------------------------------------
// KeywordClassifier
// ---------------------------------------------------------------------------

/// Case-insensitive marker matcher.
///
/// A marker only counts when it stands as a whole word or phrase, so `hi`
/// does not fire inside `which` and `warn` does not fire inside `swarm`.
pub struct KeywordClassifier {
    /// The lowercased markers, in registration order.
    markers: Vec<String>,

    /// The compiled automaton, `None` if there are no markers or the build
    /// failed.
    automaton: Option<AhoCorasick>,

    mode: MatchMode,
}

impl KeywordClassifier {
    /// Build a classifier over the given markers.
    pub fn new<I, S>(markers: I, mode: MatchMode) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let markers: Vec<String> = markers
            .into_iter()
            .map(|m| m.into().trim().to_lowercase())
            .filter(|m| !m.is_empty())
            .collect();

        let automaton = if markers.is_empty() {
            None
        } else {
            match AhoCorasick::new(&markers) {
                Ok(ac) => {
                    tracing::trace!(count = markers.len(), "aho-corasick automaton built");
                    Some(ac)
                }
                Err(e) => {
                    tracing::error!(error = %e, "failed to build aho-corasick automaton");
                    None
                }
            }
        };

        Self {
            markers,
            automaton,
            mode,
        }
    }

    /// The built-in greeting / small-talk classifier.
    pub fn greetings() -> Self {
        Self::new(GREETING_MARKERS.iter().copied(), MatchMode::Substring)
    }

    /// The built-in alert-intent classifier.
    pub fn alerts() -> Self {
        Self::new(ALERT_MARKERS.iter().copied(), MatchMode::Substring)
    }

    /// Return the number of registered markers.
    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    /// Return the marker that matched `text`, if any.
    ///
    /// When several markers match, the longest one wins so that `good
    /// morning` is reported rather than a shorter overlapping marker.
    pub fn matched_marker(&self, text: &str) -> Option<&str> {
        let ac = self.automaton.as_ref()?;
        let lowered = text.to_lowercase();
        let haystack = lowered.trim_start();
        let bytes = haystack.as_bytes();

        let mut best: Option<(usize, usize)> = None; // (pattern_index, match_len)

        for mat in ac.find_overlapping_iter(haystack) {
            if self.mode == MatchMode::Prefix && mat.start() != 0 {
                continue;
            }
            if !is_word_boundary(bytes, mat.start(), mat.end()) {
                continue;
            }
            let len = mat.end() - mat.start();
            if best.is_none_or(|(_, best_len)| len > best_len) {
                best = Some((mat.pattern().as_usize(), len));
            }
        }

        let (idx, _) = best?;
        Some(self.markers[idx].as_str())
    }
}

impl IntentClassifier for KeywordClassifier {
    fn matches(&self, text: &str) -> bool {
        match self.matched_marker(text) {
            Some(marker) => {
                tracing::debug!(marker, "keyword marker matched");
                true
            }
            None => false,
        }
    }
}

/// Whether the span `[start, end)` is delimited by non-word characters.
fn is_word_boundary(bytes: &[u8], start: usize, end: usize) -> bool {
    let is_word = |b: u8| b.is_ascii_alphanumeric() || b == b'_';
    let before = start == 0 || !is_word(bytes[start - 1]);
    let after = end >= bytes.len() || !is_word(bytes[end]);
    before && after
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
