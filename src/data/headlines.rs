//! Headline templates for demo events and the news ticker.

use rand::seq::SliceRandom;
use rand::Rng;

/// Demo market headlines. `{symbol}` is substituted at use.
const MOCK_TEMPLATES: &[&str] = &[
    "Breaking: {symbol} announces partnership with major tech firm, boosting confidence.",
    "Rumor mill: Speculation grows about {symbol}'s upcoming product launch.",
    "Analyst report: {symbol} upgraded to 'Buy' rating citing strong growth potential.",
    "Macro news: Favorable economic data creates positive sentiment for assets like {symbol}.",
    "Tech update: A network upgrade for {symbol} has completed ahead of schedule.",
    "Regulatory news: Government announces unexpected regulations impacting {symbol} and its sector.",
    "Market correction: Broader market downturn pulls {symbol} prices lower.",
    "Competitor action: A major competitor to {symbol} releases a groundbreaking product.",
    "Security concern: Reports of a minor vulnerability in {symbol}'s ecosystem are circulating.",
    "Profit taking: After a recent rally, investors appear to be taking profits on {symbol}.",
];

/// Ticker content used until (or instead of) generated headlines.
pub const FALLBACK_TICKER: &[&str] = &[
    "Global markets rally on positive inflation data.",
    "Tech stocks surge as AI chip demand skyrockets.",
    "Crypto markets see increased volatility amid regulatory news.",
    "Federal Reserve hints at holding interest rates steady.",
    "Oil prices dip as supply chain concerns ease.",
];

/// A demo headline about `symbol`.
pub fn mock_headline<R: Rng + ?Sized>(symbol: &str, rng: &mut R) -> String {
    MOCK_TEMPLATES
        .choose(rng)
        .copied()
        .unwrap_or(MOCK_TEMPLATES[0])
        .replace("{symbol}", symbol)
}

pub fn fallback_ticker() -> Vec<String> {
    FALLBACK_TICKER.iter().map(|s| s.to_string()).collect()
}
