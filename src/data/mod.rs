//! Static game content.
//!
//! The quiz bank, recommendation hints, demo headline templates and the
//! ticker's fallback headlines. Nothing here performs IO.

pub mod quiz;
pub mod headlines;

use rand::seq::SliceRandom;
use rand::Rng;

/// Short hints shown as self-expiring recommendations.
pub const RECOMMENDATIONS: &[&str] = &[
    "Click the 'Info' button to learn about market trends!",
    "Test your knowledge with a quiz to earn Gemin!",
    "Keeping a winning streak increases your rewards.",
    "Traps will reset your streak. Be careful!",
    "Use your Gemin to unlock new features in the future.",
];

/// A random recommendation hint.
pub fn random_recommendation<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    RECOMMENDATIONS.choose(rng).copied().unwrap_or(RECOMMENDATIONS[0])
}
