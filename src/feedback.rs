//! Pronunciation feedback lookup

/// Map a pronunciation score to a canned feedback line
#[must_use]
pub fn pronunciation_feedback(score: f64) -> &'static str {
    if score >= 0.9 {
        "Excellent pronunciation!"
    } else if score >= 0.7 {
        "Good pronunciation with minor improvements needed"
    } else if score >= 0.5 {
        "Fair pronunciation - keep practicing"
    } else {
        "Needs improvement - try speaking more clearly"
    }
}
