//! Conversational variation: hesitations and extra splits of long fragments.

use crate::config::FragmenterConfig;
use crate::random::RandomSource;

pub const HESITATIONS: [&str; 7] = [
    "Actually, ",
    "I mean, ",
    "Well, ",
    "Um, ",
    "Let me think... ",
    "Oh wait, ",
    "You know what, ",
];

pub(crate) fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn lowercase_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Split at the whitespace closest to the character midpoint.
///
/// Returns `None` when there is no whitespace or the right half would be
/// shorter than `min_remainder` characters.
fn split_near_middle(text: &str, min_remainder: usize) -> Option<(String, String)> {
    let middle = char_len(text) / 2;
    let (byte_index, _) = text
        .char_indices()
        .enumerate()
        .filter(|(_, (_, c))| c.is_whitespace())
        .map(|(char_index, (byte_index, _))| (byte_index, char_index.abs_diff(middle)))
        .min_by_key(|&(_, distance)| distance)?;

    let left = text[..byte_index].trim_end();
    let right = text[byte_index..].trim_start();
    if left.is_empty() || char_len(right) < min_remainder {
        return None;
    }
    Some((left.to_string(), right.to_string()))
}

/// Apply hesitations and long-fragment splits.
///
/// Draw order per fragment: hesitation roll (not for the first fragment),
/// phrase pick when the roll hits, then the split roll when the fragment is
/// longer than `long_fragment_length`.
pub fn apply(
    fragments: Vec<String>,
    config: &FragmenterConfig,
    rng: &mut dyn RandomSource,
) -> Vec<String> {
    let mut varied = Vec::with_capacity(fragments.len());

    for (index, fragment) in fragments.into_iter().enumerate() {
        let mut fragment = fragment;

        if index > 0 && rng.chance(config.hesitation_probability) {
            let phrase = HESITATIONS[rng.index(HESITATIONS.len())];
            fragment = format!("{}{}", phrase, lowercase_first(&fragment));
        }

        if char_len(&fragment) > config.long_fragment_length
            && rng.chance(config.long_split_probability)
        {
            if let Some((left, right)) = split_near_middle(&fragment, config.min_split_remainder) {
                varied.push(left);
                varied.push(right);
                continue;
            }
        }

        varied.push(fragment);
    }

    varied.retain(|fragment| !fragment.trim().is_empty());
    varied
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::FixedRandom;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn first_fragment_never_gets_hesitation() {
        let mut rng = FixedRandom::constant(0.0);
        let config = FragmenterConfig {
            long_split_probability: 0.0,
            ..FragmenterConfig::default()
        };
        let out = apply(strings(&["Hello there friend", "How are you"]), &config, &mut rng);
        assert_eq!(out[0], "Hello there friend");
        assert_eq!(out[1], "Actually, how are you");
    }

    #[test]
    fn hesitation_phrase_is_picked_by_draw() {
        // roll hits (0.05), pick 0.99 -> last phrase
        let mut rng = FixedRandom::new(vec![0.05, 0.99, 0.99]);
        let out = apply(
            strings(&["First one here", "Second one here"]),
            &FragmenterConfig::default(),
            &mut rng,
        );
        assert_eq!(out[1], "You know what, second one here");
    }

    #[test]
    fn no_variation_when_draws_are_high() {
        let mut rng = FixedRandom::constant(0.99);
        let input = strings(&[
            "A short opener",
            "This fragment is deliberately made long enough to exceed the eighty character limit",
        ]);
        let out = apply(input.clone(), &FragmenterConfig::default(), &mut rng);
        assert_eq!(out, input);
    }

    #[test]
    fn long_fragment_splits_near_middle() {
        let mut rng = FixedRandom::constant(0.0);
        let config = FragmenterConfig {
            hesitation_probability: 0.0,
            ..FragmenterConfig::default()
        };
        let long = "one two three four five six seven eight nine ten eleven twelve thirteen fourteen fifteen";
        let out = apply(strings(&[long]), &config, &mut rng);
        assert_eq!(out.len(), 2);
        assert_eq!(format!("{} {}", out[0], out[1]), long);
        assert!(char_len(&out[1]) >= 20);
    }

    #[test]
    fn split_is_skipped_without_whitespace() {
        assert!(split_near_middle(&"x".repeat(100), 20).is_none());
    }

    #[test]
    fn split_requires_remainder() {
        assert!(split_near_middle("abcdefghij klmnop", 20).is_none());
        assert!(split_near_middle("abcdefghijklmnopqrstuv wxyzabcdefghijklmnopqrstu", 20).is_some());
    }

    #[test]
    fn lowercase_first_handles_unicode() {
        assert_eq!(lowercase_first("Éclair time"), "éclair time");
        assert_eq!(lowercase_first(""), "");
    }
}
