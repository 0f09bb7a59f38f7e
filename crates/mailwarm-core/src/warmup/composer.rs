//! Pseudo-random message content.

use rand::Rng;
use rand::seq::SliceRandom;
use serde::Serialize;

/// Subject catalog.
pub const SUBJECTS: &[&str] = &[
    "Quick check-in",
    "Following up",
    "Short note",
    "Ping",
    "Thoughts?",
    "Looping you in",
    "Small question",
    "Re: earlier",
];

/// Body catalog.
pub const BODIES: &[&str] = &[
    "Testing deliverability, do you see this?",
    "Thanks for the earlier note. Reply when free.",
    "Quick update from my side, looks good.",
    "Appreciate your help, will follow up tomorrow.",
    "Confirming this reaches the inbox okay.",
];

/// Chance that a supplied thread snippet is quoted into the body.
pub const QUOTE_PROBABILITY: f64 = 0.6;

/// A subject/body pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComposedMessage {
    /// Subject line.
    pub subject: String,
    /// Body text.
    pub body: String,
}

/// Draws a subject and body; with a non-empty `snippet`, sometimes quotes it
/// above the body as `> snippet`.
pub fn compose<R: Rng + ?Sized>(snippet: Option<&str>, rng: &mut R) -> ComposedMessage {
    let subject = SUBJECTS.choose(rng).copied().unwrap_or("Ping");
    let mut body = BODIES.choose(rng).copied().unwrap_or_default().to_string();

    if let Some(snippet) = snippet.filter(|s| !s.is_empty())
        && rng.gen_bool(QUOTE_PROBABILITY)
    {
        body = format!("> {snippet}\n\n{body}");
    }

    ComposedMessage {
        subject: subject.to_string(),
        body,
    }
}
