//! Scripted news shocks.
//!
//! Each headline is drawn uniformly from a fixed catalog and turned into an impact profile:
//! an initial move in the direction of the sentiment, a pullback against it, and a
//! continuation back with it. Every profile is re-rolled per event, so two identical
//! headlines never move the market the same way.

use crate::types::{decimal_from_f64, Asset};
use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sentiment {
    Bullish,
    Bearish,
}

impl Sentiment {
    pub fn sign(&self) -> Decimal {
        match self {
            Sentiment::Bullish => Decimal::ONE,
            Sentiment::Bearish => Decimal::NEGATIVE_ONE,
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sentiment::Bullish => f.write_str("bullish"),
            Sentiment::Bearish => f.write_str("bearish"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Importance {
    Low,
    Medium,
    High,
    Critical,
}

impl Importance {
    pub fn multiplier(&self) -> f64 {
        match self {
            Importance::Low => 1.0,
            Importance::Medium => 2.5,
            Importance::High => 5.0,
            Importance::Critical => 8.0,
        }
    }

    pub fn is_critical(&self) -> bool {
        matches!(self, Importance::Critical)
    }
}

impl fmt::Display for Importance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Importance::Low => "low",
            Importance::Medium => "medium",
            Importance::High => "high",
            Importance::Critical => "critical",
        };
        f.write_str(label)
    }
}

pub struct NewsTemplate {
    pub title: &'static str,
    pub description: &'static str,
    pub sentiment: Sentiment,
    pub importance: Importance,
}

const fn template(
    title: &'static str,
    description: &'static str,
    sentiment: Sentiment,
    importance: Importance,
) -> NewsTemplate {
    NewsTemplate {
        title,
        description,
        sentiment,
        importance,
    }
}

use Importance::{Critical, High, Low, Medium};
use Sentiment::{Bearish, Bullish};

pub const NEWS_CATALOG: [NewsTemplate; 24] = [
    template("Major Exchange Listing", "New exchange lists the asset, widening access", Bullish, High),
    template("Regulatory Clarity", "Government publishes a clear regulatory framework", Bullish, Critical),
    template("Institutional Adoption", "Large corporation announces crypto integration", Bullish, High),
    template("Network Upgrade", "Protocol upgrade deploys without incident", Bullish, Medium),
    template("Partnership Announcement", "Strategic partnership signed with a major tech company", Bullish, Medium),
    template("Whale Accumulation", "Large holder grows position significantly", Bullish, Low),
    template("ETF Approval", "ETF approval lifts institutional confidence", Bullish, Critical),
    template("Massive Buy Order", "Institution places a billion-dollar order", Bullish, High),
    template("Positive Earnings Report", "Crypto company reports strong earnings", Bullish, Medium),
    template("Central Bank Endorsement", "Central bank backs digital currency", Bullish, Critical),
    template("Tech Giant Integration", "Major tech company adds crypto payments", Bullish, High),
    template("Supply Shock", "Difficulty adjustment tightens new supply", Bullish, Medium),
    template("Regulatory Crackdown", "Government announces stricter regulation", Bearish, Critical),
    template("Exchange Hack", "Major exchange reports a security breach", Bearish, High),
    template("Market Manipulation Inquiry", "Authorities open a manipulation investigation", Bearish, High),
    template("Technical Issues", "Network hit by temporary congestion", Bearish, Medium),
    template("Whale Dump", "Large holder sells a significant position", Bearish, Medium),
    template("FUD Spreads", "Negative sentiment spreads on social media", Bearish, Low),
    template("Ban Announcement", "Major country bans crypto trading", Bearish, Critical),
    template("Flash Crash", "Sudden crash triggers panic selling", Bearish, High),
    template("Security Vulnerability", "Critical flaw found in the protocol", Bearish, High),
    template("Liquidity Crisis", "Major exchange struggles with withdrawals", Bearish, Critical),
    template("Negative Regulatory Ruling", "Court rules against crypto in a landmark case", Bearish, High),
    template("Massive Sell-Off", "Institutions exit positions en masse", Bearish, Medium),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsEvent {
    pub title: String,
    pub description: String,
    pub sentiment: Sentiment,
    pub importance: Importance,
    pub asset: Asset,
}

impl NewsEvent {
    pub fn from_template(template: &NewsTemplate, asset: Asset) -> Self {
        Self {
            title: template.title.to_string(),
            description: template.description.to_string(),
            sentiment: template.sentiment,
            importance: template.importance,
            asset,
        }
    }

    pub fn is_critical(&self) -> bool {
        self.importance.is_critical()
    }
}

pub fn generate_news<R: Rng + ?Sized>(rng: &mut R, asset: Asset) -> NewsEvent {
    let idx = rng.gen_range(0..NEWS_CATALOG.len());
    NewsEvent::from_template(&NEWS_CATALOG[idx], asset)
}

/// Fractional price moves and phase timings for one news reaction.
///
/// `initial_change`, `pullback_change` and `continuation_change` are fractions of the
/// pre-news index price (0.01 = 1%). Pullback always opposes the initial move.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsImpact {
    pub initial_change: Decimal,
    pub pullback_change: Decimal,
    pub continuation_change: Decimal,
    pub volatility_multiplier: Decimal,
    pub phase1_ms: i64,
    pub phase2_ms: i64,
    pub phase3_ms: i64,
    pub total_ms: i64,
}

// non-critical initial moves never exceed 3%
const MAX_NON_CRITICAL_PCT: f64 = 3.0;

pub fn news_impact<R: Rng + ?Sized>(news: &NewsEvent, rng: &mut R) -> NewsImpact {
    let m = news.importance.multiplier();

    let strength = 0.8 + rng.gen::<f64>() * 0.4;
    let initial_pct = if news.is_critical() {
        12.0 + rng.gen::<f64>() * 3.0
    } else {
        let cap = MAX_NON_CRITICAL_PCT.min(m * 0.5);
        cap.min((0.5 + rng.gen::<f64>() * 0.5) * m * strength)
    };
    let initial_change = news.sentiment.sign() * decimal_from_f64(initial_pct) / dec!(100);

    let pullback_share = decimal_from_f64(0.25 + rng.gen::<f64>() * 0.25);
    let continuation_share = decimal_from_f64(0.4 + rng.gen::<f64>() * 0.4);

    let base_ms = 3000.0 + m * 1000.0;
    let phase1_ms = (base_ms * (0.8 + rng.gen::<f64>() * 0.4)).round() as i64;
    let phase2_ms = (base_ms * (0.6 + rng.gen::<f64>() * 0.4)).round() as i64;
    let phase3_ms = (base_ms * (0.7 + rng.gen::<f64>() * 0.5)).round() as i64;

    NewsImpact {
        initial_change,
        pullback_change: -initial_change * pullback_share,
        continuation_change: initial_change * continuation_share,
        volatility_multiplier: decimal_from_f64(3.0 + (m - 1.0)),
        phase1_ms,
        phase2_ms,
        phase3_ms,
        total_ms: phase1_ms + phase2_ms + phase3_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn event(sentiment: Sentiment, importance: Importance) -> NewsEvent {
        NewsEvent {
            title: "test".to_string(),
            description: String::new(),
            sentiment,
            importance,
            asset: Asset::BtcPerp,
        }
    }

    #[test]
    fn catalog_is_balanced() {
        let bullish = NEWS_CATALOG.iter().filter(|t| t.sentiment == Sentiment::Bullish).count();
        assert_eq!(bullish, 12);
        assert_eq!(NEWS_CATALOG.len() - bullish, 12);
        assert!(NEWS_CATALOG.iter().any(|t| t.importance == Importance::Low));
        assert!(NEWS_CATALOG.iter().any(|t| t.importance.is_critical()));
    }

    #[test]
    fn generated_news_is_bound_to_asset() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..50 {
            let news = generate_news(&mut rng, Asset::EthPerp);
            assert_eq!(news.asset, Asset::EthPerp);
            assert!(NEWS_CATALOG.iter().any(|t| t.title == news.title));
        }
    }

    #[test]
    fn non_critical_moves_are_capped() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        for importance in [Importance::Low, Importance::Medium, Importance::High] {
            let cap = decimal_from_f64(MAX_NON_CRITICAL_PCT.min(importance.multiplier() * 0.5)) / dec!(100);
            for _ in 0..200 {
                let impact = news_impact(&event(Sentiment::Bullish, importance), &mut rng);
                assert!(impact.initial_change > Decimal::ZERO);
                assert!(impact.initial_change <= cap);
            }
        }
    }

    #[test]
    fn critical_moves_land_between_twelve_and_fifteen_percent() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..200 {
            let impact = news_impact(&event(Sentiment::Bearish, Importance::Critical), &mut rng);
            assert!(impact.initial_change <= dec!(-0.12));
            assert!(impact.initial_change >= dec!(-0.15));
            assert_eq!(impact.volatility_multiplier, dec!(10));
        }
    }

    #[test]
    fn pullback_opposes_and_continuation_follows() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        for sentiment in [Sentiment::Bullish, Sentiment::Bearish] {
            for _ in 0..100 {
                let impact = news_impact(&event(sentiment, Importance::High), &mut rng);
                let initial = impact.initial_change;
                assert!(impact.pullback_change * initial < Decimal::ZERO);
                assert!(impact.continuation_change * initial > Decimal::ZERO);
                assert!(impact.pullback_change.abs() >= initial.abs() * dec!(0.25));
                assert!(impact.pullback_change.abs() <= initial.abs() * dec!(0.5));
                assert!(impact.continuation_change.abs() >= initial.abs() * dec!(0.4));
                assert!(impact.continuation_change.abs() <= initial.abs() * dec!(0.8));
            }
        }
    }

    #[test]
    fn phase_durations_scale_with_importance() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        // low: base 4000ms
        let impact = news_impact(&event(Sentiment::Bullish, Importance::Low), &mut rng);
        assert!((3200..=4800).contains(&impact.phase1_ms));
        assert!((2400..=4000).contains(&impact.phase2_ms));
        assert!((2800..=4800).contains(&impact.phase3_ms));
        assert_eq!(impact.total_ms, impact.phase1_ms + impact.phase2_ms + impact.phase3_ms);
        assert_eq!(impact.volatility_multiplier, dec!(3));
    }
}
