//! Pronunciation similarity scoring
//!
//! Compares a recognized transcript against the utterance the speaker was
//! expected to produce using the Sørensen–Dice coefficient over character
//! bigrams. Whitespace inside the strings is ignored by the metric.

/// Score how closely `transcript` matches `expected`
///
/// Both sides are lower-cased and trimmed before comparison. Returns 1.0
/// when there is nothing to compare against, including an empty reference.
#[must_use]
pub fn pronunciation_score(transcript: &str, expected: Option<&str>) -> f64 {
    let Some(expected) = expected.filter(|e| !e.is_empty()) else {
        return 1.0;
    };

    let observed = normalize(transcript);
    let reference = normalize(expected);

    strsim::sorensen_dice(&observed, &reference).clamp(0.0, 1.0)
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}
