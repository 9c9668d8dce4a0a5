//! Timing model - human-plausible delays for fragment display.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::TimingConfig;
use crate::random::RandomSource;

const EMOTION_WORDS: &str = r"(?i)\b(?:amazing|awesome|love|hate|incredible|terrible|horrible|wonderful|excited|sorry|omg|wow|seriously|unbelievable|furious|thrilled|heartbroken)\b";
const QUICK_REACTION: &str = r"(?i)^\s*(?:oh|wow|haha+|lol|yes|yeah|yep|no|nope|omg|hmm+|ah|aw+|ooh|yay|ok|okay|sure|nice|cool|great|right|totally)\b";
const THOUGHTFUL: &str = r"(?i)\b(?:maybe|perhaps|i think|i guess|i wonder|probably|might|honestly|actually)\b";

static EMOTION_RE: OnceLock<Regex> = OnceLock::new();
static CAPS_RUN_RE: OnceLock<Regex> = OnceLock::new();
static QUICK_RE: OnceLock<Regex> = OnceLock::new();
static THOUGHTFUL_RE: OnceLock<Regex> = OnceLock::new();

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("timing pattern must compile"))
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Overall rhythm of a fragment list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PacingStyle {
    Rapid,
    Natural,
    Thoughtful,
}

/// Emotional intensity of a fragment, clamped to `[0.5, 2.0]`.
pub fn emotional_weight(text: &str) -> f64 {
    let mut weight = 1.0;
    weight += 0.3 * text.matches('!').count() as f64;
    weight += 0.2 * text.matches('?').count() as f64;
    weight += 0.4 * regex(&EMOTION_RE, EMOTION_WORDS).find_iter(text).count() as f64;
    if text.contains("...") {
        weight += 0.5;
    }
    if regex(&CAPS_RUN_RE, r"[A-Z]{3,}").is_match(text) {
        weight += 0.3;
    }
    weight.clamp(0.5, 2.0)
}

/// Short interjection such as "Wow!" or "haha yes".
pub fn is_quick_reaction(text: &str) -> bool {
    text.chars().count() < 25 && regex(&QUICK_RE, QUICK_REACTION).is_match(text)
}

/// Hedged, trailing-off or long fragment.
pub fn is_thoughtful(text: &str) -> bool {
    text.contains("...")
        || word_count(text) > 15
        || regex(&THOUGHTFUL_RE, THOUGHTFUL).is_match(text)
}

pub fn pacing_style(fragments: &[String]) -> PacingStyle {
    if fragments.is_empty() {
        return PacingStyle::Natural;
    }
    let total: usize = fragments.iter().map(|f| f.chars().count()).sum();
    let average = total as f64 / fragments.len() as f64;
    if average < 30.0 && fragments.len() > 2 {
        PacingStyle::Rapid
    } else if average > 60.0 {
        PacingStyle::Thoughtful
    } else {
        PacingStyle::Natural
    }
}

#[derive(Debug, Clone, Default)]
pub struct TimingModel {
    config: TimingConfig,
}

impl TimingModel {
    pub fn new(config: TimingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TimingConfig {
        &self.config
    }

    /// Milliseconds the typing indicator shows before `fragment` appears.
    ///
    /// Always within `[min_delay_ms, max_delay_ms]`. Consumes one draw.
    pub fn typing_delay(&self, fragment: &str, index: usize, rng: &mut dyn RandomSource) -> u64 {
        let c = &self.config;
        let mut delay = c.base_delay_ms + word_count(fragment) as f64 * c.per_word_ms;
        delay *= emotional_weight(fragment);

        if is_quick_reaction(fragment) {
            delay *= c.quick_reaction_multiplier;
        } else if is_thoughtful(fragment) {
            delay *= c.thoughtful_multiplier;
        }

        delay *= if index == 0 {
            c.first_fragment_multiplier
        } else {
            c.later_fragment_multiplier
        };

        delay *= 1.0 + (rng.next_f64() * 2.0 - 1.0) * c.jitter;

        let delay = if delay.is_finite() { delay.round().max(0.0) } else { 0.0 };
        // An inverted range resolves to the max.
        (delay as u64).max(c.min_delay_ms).min(c.max_delay_ms)
    }

    /// Milliseconds to wait before scrolling a freshly shown bubble into view.
    pub fn scroll_delay(&self, index: usize, rng: &mut dyn RandomSource) -> u64 {
        let c = &self.config;
        let base = if index == 0 {
            c.first_scroll_delay_ms
        } else {
            c.scroll_delay_ms
        };
        let jitter = (rng.next_f64() * c.scroll_jitter_ms as f64).floor() as i64 - c.scroll_jitter_ms / 2;
        (base + jitter)
            .max(c.min_scroll_delay_ms)
            .min(c.max_scroll_delay_ms)
            .max(0) as u64
    }

    /// Only the last fragment may carry the avatar; non-last fragments draw nothing.
    pub fn should_show_avatar(&self, index: usize, total: usize, rng: &mut dyn RandomSource) -> bool {
        total > 0 && index == total - 1 && rng.chance(self.config.avatar_probability)
    }
}
