//! Boundary patterns for natural-break splitting.
//!
//! Each pattern's first capture group covers the punctuation that closes the
//! preceding fragment; the break falls right after it. The trailing part of a
//! match (the capital letter or marker word) only anchors the boundary and is
//! left to the next fragment.

use std::sync::OnceLock;

use regex::Regex;

/// An ordered set of patterns tried together.
#[derive(Debug)]
pub struct BoundaryGroup {
    pub name: &'static str,
    patterns: Vec<Regex>,
}

impl BoundaryGroup {
    fn new(name: &'static str, patterns: &[&str]) -> Self {
        Self {
            name,
            patterns: patterns
                .iter()
                .map(|p| Regex::new(p).expect("boundary pattern must compile"))
                .collect(),
        }
    }

    /// Sorted, deduplicated byte offsets where the text may be cut.
    pub fn boundaries(&self, text: &str) -> Vec<usize> {
        let mut offsets: Vec<usize> = self
            .patterns
            .iter()
            .flat_map(|re| re.captures_iter(text))
            .filter_map(|caps| caps.get(1).map(|m| m.end()))
            .filter(|&offset| offset > 0 && offset < text.len())
            .collect();
        offsets.sort_unstable();
        offsets.dedup();
        offsets
    }
}

static BOUNDARY_GROUPS: OnceLock<Vec<BoundaryGroup>> = OnceLock::new();
static SENTENCE_END: OnceLock<Regex> = OnceLock::new();

/// Natural-break groups in priority order.
pub fn boundary_groups() -> &'static [BoundaryGroup] {
    BOUNDARY_GROUPS.get_or_init(|| {
        vec![
            BoundaryGroup::new("sentence_end", &[r"([.!?])\s+[A-Z]"]),
            BoundaryGroup::new(
                "discourse_marker",
                &[r"([.!?])\s+(?:But|And|So|Well|Actually|Also|However|Anyway|Plus|Though|Still)\b"],
            ),
            BoundaryGroup::new(
                "question_to_statement",
                &[r"(\?)\s+(?:I|I'm|I'd|It's|It|That's|That|This|You|We|Maybe|Honestly|Probably)\b"],
            ),
            BoundaryGroup::new(
                "interjection",
                &[r"([.!?])\s+(?:Wow|Oh|Hey|Hmm|Ah|Ooh|Whoa|Yeah|Yes|No|Okay|Omg|OMG)\b"],
            ),
            BoundaryGroup::new(
                "sequencing",
                &[r"([.!?])\s+(?:First|Firstly|Second|Secondly|Then|Next|Finally|Lastly|After that|Meanwhile)\b"],
            ),
            BoundaryGroup::new(
                "ellipsis_or_dash",
                &[r"(\.\.\.|…)\s*[A-Z]", r"(—|--)\s*[A-Z]"],
            ),
            BoundaryGroup::new(
                "topic_shift",
                &[r"([.!?])\s+(?:Speaking of|By the way|Anyway|Anyways|On another note|Oh and|Besides|Changing the subject)\b"],
            ),
        ]
    })
}

/// Sentence-ending punctuation followed by a capital letter.
pub fn sentence_end() -> &'static Regex {
    SENTENCE_END
        .get_or_init(|| Regex::new(r"([.!?]+)\s+[A-Z]").expect("sentence pattern must compile"))
}

/// Cut `text` at `boundaries`, trimming each piece and dropping empty ones.
pub fn split_at(text: &str, boundaries: &[usize]) -> Vec<String> {
    let mut pieces = Vec::with_capacity(boundaries.len() + 1);
    let mut start = 0;
    for &end in boundaries.iter().chain(std::iter::once(&text.len())) {
        let piece = text[start..end].trim();
        if !piece.is_empty() {
            pieces.push(piece.to_string());
        }
        start = end;
    }
    pieces
}

/// Split into sentences, keeping each sentence's closing punctuation.
pub fn sentences(text: &str) -> Vec<String> {
    let boundaries: Vec<usize> = sentence_end()
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|m| m.end()))
        .collect();
    split_at(text, &boundaries)
}
