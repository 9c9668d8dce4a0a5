//! Text fragmenter - splits a response into chat-bubble sized fragments.
//!
//! Short responses pass through untouched. Longer ones are cut at natural
//! conversational breaks when a pattern group produces a usable split, or
//! packed sentence by sentence otherwise, and finally get a light pass of
//! conversational variation.

mod patterns;
mod variation;

pub use patterns::{boundary_groups, BoundaryGroup};
pub use variation::HESITATIONS;

use tracing::debug;

use crate::config::FragmenterConfig;
use crate::random::RandomSource;
use variation::char_len;

#[derive(Debug, Clone, Default)]
pub struct Fragmenter {
    config: FragmenterConfig,
}

impl Fragmenter {
    pub fn new(config: FragmenterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FragmenterConfig {
        &self.config
    }

    /// Split `response` into ordered, non-empty fragments.
    ///
    /// Responses of at most `max_fragment_length` characters come back as a
    /// single trimmed fragment without consuming any draws.
    pub fn fragment(&self, response: &str, rng: &mut dyn RandomSource) -> Vec<String> {
        let trimmed = response.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }
        if char_len(response) <= self.config.max_fragment_length {
            return vec![trimmed.to_string()];
        }

        let natural = if rng.chance(self.config.natural_break_probability) {
            self.split_natural(trimmed, rng)
        } else {
            None
        };

        let fragments = match natural {
            Some(fragments) => fragments,
            None => self.split_sentences(trimmed, rng),
        };

        let fragments = variation::apply(fragments, &self.config, rng);
        debug!(
            "Fragmented {} chars into {} fragments",
            char_len(trimmed),
            fragments.len()
        );
        fragments
    }

    fn split_natural(&self, text: &str, rng: &mut dyn RandomSource) -> Option<Vec<String>> {
        let groups = boundary_groups();
        let group_count = if rng.chance(self.config.reduced_group_probability) {
            self.config.reduced_group_count.min(groups.len())
        } else {
            groups.len()
        };

        groups[..group_count].iter().find_map(|group| {
            let pieces = patterns::split_at(text, &group.boundaries(text));
            let valid = pieces.len() >= 2
                && pieces
                    .iter()
                    .all(|piece| char_len(piece) >= self.config.min_fragment_length);
            if valid {
                debug!("Natural break via {} ({} pieces)", group.name, pieces.len());
                Some(pieces)
            } else {
                None
            }
        })
    }

    fn split_sentences(&self, text: &str, rng: &mut dyn RandomSource) -> Vec<String> {
        let jitter = self.config.threshold_jitter as f64;
        let offset = (rng.next_f64() * jitter).floor() - jitter / 2.0;
        let threshold = (self.config.max_fragment_length as f64 + offset).max(1.0) as usize;

        let mut fragments = Vec::new();
        let mut current = String::new();

        for sentence in patterns::sentences(text) {
            let projected = if current.is_empty() {
                char_len(&sentence)
            } else {
                char_len(&current) + 1 + char_len(&sentence)
            };

            if projected > threshold && char_len(&current) >= self.config.min_fragment_length {
                fragments.push(std::mem::take(&mut current));
                current = sentence;
            } else {
                if !current.is_empty() {
                    current.push(' ');
                }
                current.push_str(&sentence);
            }
        }

        if !current.trim().is_empty() {
            fragments.push(current);
        }
        fragments
    }
}
