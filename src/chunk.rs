//! Paragraph → sentence → word text chunker.
//!
//! Splits normalized text into pieces that respect a `max_chunk_size`
//! character budget. Greedy bin-packing happens at three levels:
//!
//! 1. Paragraphs (`\n\n`-separated), joined with `"\n\n"`.
//! 2. A paragraph longer than the budget is split on `.`, `!`, `?` and
//!    repacked with `". "`; every emitted piece ends with `"."`.
//! 3. A sentence longer than the budget is split on whitespace and
//!    repacked with single spaces.
//!
//! Budgets count characters, not bytes. Level-1 chunks never exceed the
//! budget. A level-2 piece holding a single sentence of exactly the budget
//! ends one character over because of its period, and a level-3 piece
//! exceeds it only when one word alone is longer than the budget.
//!
//! # Example
//!
//! ```rust
//! use docsift::chunk::split_text;
//!
//! let pieces = split_text("Hello world.\n\nSecond paragraph.", 4000);
//! assert_eq!(pieces, vec!["Hello world.\n\nSecond paragraph.".to_string()]);
//! ```

use regex::Regex;
use std::sync::OnceLock;

use crate::models::Chunk;

const PARAGRAPH_JOINER: &str = "\n\n";
const SENTENCE_JOINER: &str = ". ";
const SENTENCE_SUFFIX: &str = ".";
const WORD_JOINER: &str = " ";

fn sentence_end_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[.!?]+").expect("static sentence regex"))
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Greedy accumulator shared by all three levels.
struct Packer<'a> {
    joiner: &'a str,
    suffix: &'a str,
    max_chars: usize,
    buf: String,
    buf_chars: usize,
}

impl<'a> Packer<'a> {
    fn new(joiner: &'a str, suffix: &'a str, max_chars: usize) -> Self {
        Self {
            joiner,
            suffix,
            max_chars,
            buf: String::new(),
            buf_chars: 0,
        }
    }

    /// Would `piece` fit in the current buffer, joiner and suffix included?
    fn fits(&self, piece_chars: usize) -> bool {
        let joined = if self.buf.is_empty() {
            piece_chars
        } else {
            self.buf_chars + char_len(self.joiner) + piece_chars
        };
        joined + char_len(self.suffix) <= self.max_chars
    }

    fn push(&mut self, piece: &str, piece_chars: usize) {
        if !self.buf.is_empty() {
            self.buf.push_str(self.joiner);
            self.buf_chars += char_len(self.joiner);
        }
        self.buf.push_str(piece);
        self.buf_chars += piece_chars;
    }

    fn flush_into(&mut self, out: &mut Vec<String>) {
        if !self.buf.is_empty() {
            let mut piece = std::mem::take(&mut self.buf);
            piece.push_str(self.suffix);
            out.push(piece);
        }
        self.buf_chars = 0;
    }
}

/// Split normalized text into ordered chunk texts. Empty input yields an
/// empty list.
pub fn split_text(text: &str, max_chunk_size: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut packer = Packer::new(PARAGRAPH_JOINER, "", max_chunk_size);

    for para in text.split(PARAGRAPH_JOINER) {
        let para = para.trim();
        if para.is_empty() {
            continue;
        }
        let para_chars = char_len(para);

        if packer.fits(para_chars) {
            packer.push(para, para_chars);
            continue;
        }

        packer.flush_into(&mut out);
        if para_chars > max_chunk_size {
            out.extend(split_paragraph(para, max_chunk_size));
        } else {
            packer.push(para, para_chars);
        }
    }

    packer.flush_into(&mut out);
    out
}

/// Level 2: sentence packing for a paragraph over budget.
fn split_paragraph(paragraph: &str, max_chunk_size: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut packer = Packer::new(SENTENCE_JOINER, SENTENCE_SUFFIX, max_chunk_size);

    for sentence in sentence_end_re().split(paragraph) {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            continue;
        }
        let sentence_chars = char_len(sentence);

        if packer.fits(sentence_chars) {
            packer.push(sentence, sentence_chars);
            continue;
        }

        packer.flush_into(&mut out);
        if sentence_chars > max_chunk_size {
            out.extend(split_words(sentence, max_chunk_size));
        } else {
            packer.push(sentence, sentence_chars);
        }
    }

    packer.flush_into(&mut out);
    out
}

/// Level 3: last-resort word packing. A single word longer than the
/// budget becomes its own piece.
fn split_words(sentence: &str, max_chunk_size: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut packer = Packer::new(WORD_JOINER, "", max_chunk_size);

    for word in sentence.split_whitespace() {
        let word_chars = char_len(word);
        if !packer.fits(word_chars) {
            packer.flush_into(&mut out);
        }
        packer.push(word, word_chars);
    }

    packer.flush_into(&mut out);
    out
}

/// Split text and wrap the pieces as [`Chunk`]s with contiguous indices
/// starting at 0.
pub fn chunk_document(text: &str, max_chunk_size: usize) -> Vec<Chunk> {
    split_text(text, max_chunk_size)
        .into_iter()
        .enumerate()
        .map(|(i, content)| Chunk::new(i as i64, content))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(s: &str) -> Vec<String> {
        s.split(|c: char| c.is_whitespace() || matches!(c, '.' | '!' | '?'))
            .filter(|w| !w.is_empty())
            .map(|w| w.to_string())
            .collect()
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(split_text("", 4000).is_empty());
        assert!(split_text("\n\n  \n\n", 4000).is_empty());
    }

    #[test]
    fn single_short_paragraph_is_one_chunk() {
        let text = "This paragraph is exactly fifty characters long!!!";
        assert_eq!(text.len(), 50);
        let chunks = split_text(text, 4000);
        assert_eq!(chunks, vec![text.to_string()]);
    }

    #[test]
    fn three_large_paragraphs_do_not_share_chunks() {
        let para = "a".repeat(3000);
        let text = [para.as_str(), para.as_str(), para.as_str()].join("\n\n");
        let chunks = split_text(&text, 4000);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.len() == 3000));
    }

    #[test]
    fn small_paragraphs_are_packed_with_joiner() {
        let text = "One.\n\nTwo.\n\nThree.";
        assert_eq!(split_text(text, 4000), vec![text.to_string()]);
        // "One.\n\nTwo." is 10 chars; adding "\n\nThree." would be 18.
        assert_eq!(
            split_text(text, 10),
            vec!["One.\n\nTwo.".to_string(), "Three.".to_string()]
        );
    }

    #[test]
    fn paragraph_exactly_at_limit_is_not_split() {
        let para = "x".repeat(20);
        assert_eq!(split_text(&para, 20), vec![para.clone()]);
    }

    #[test]
    fn long_paragraph_falls_back_to_sentences() {
        let text = "Alpha beta gamma. Delta epsilon! Zeta eta theta? Iota kappa.";
        let chunks = split_text(text, 35);
        assert_eq!(
            chunks,
            vec![
                "Alpha beta gamma. Delta epsilon.".to_string(),
                "Zeta eta theta. Iota kappa.".to_string(),
            ]
        );
        assert!(chunks.iter().all(|c| c.ends_with('.')));
    }

    #[test]
    fn long_sentence_falls_back_to_words() {
        let sentence = "one two three four five six seven eight nine ten";
        let chunks = split_text(sentence, 15);
        assert_eq!(
            chunks,
            vec![
                "one two three".to_string(),
                "four five six".to_string(),
                "seven eight".to_string(),
                "nine ten".to_string(),
            ]
        );
    }

    #[test]
    fn oversized_word_becomes_its_own_chunk() {
        let giant = "z".repeat(30);
        let text = format!("tiny {} end", giant);
        let chunks = split_text(&text, 10);
        assert_eq!(chunks, vec!["tiny".to_string(), giant, "end".to_string()]);
    }

    #[test]
    fn paragraph_level_chunks_respect_budget() {
        let text = (0..60)
            .map(|i| format!("Paragraph number {} has a few words.", i))
            .collect::<Vec<_>>()
            .join("\n\n");
        for chunk in split_text(&text, 120) {
            assert!(chunk.chars().count() <= 120, "chunk over budget: {}", chunk);
        }
    }

    #[test]
    fn no_words_are_lost() {
        let text = "Intro line.\n\nA much longer paragraph follows here. It has several \
                    sentences! Does it survive? Every word should.\n\nShort outro";
        for max in [8, 20, 45, 4000] {
            let chunks = split_text(text, max);
            assert!(!chunks.is_empty());
            let rebuilt = words(&chunks.join(" "));
            assert_eq!(rebuilt, words(text), "word loss at max={}", max);
        }
    }

    #[test]
    fn budget_counts_characters_not_bytes() {
        let para = "λ".repeat(10);
        assert_eq!(split_text(&para, 10), vec![para.clone()]);
    }

    #[test]
    fn chunk_indices_are_contiguous() {
        let text = (0..40)
            .map(|i| format!("Paragraph {}.", i))
            .collect::<Vec<_>>()
            .join("\n\n");
        let chunks = chunk_document(&text, 30);
        assert!(chunks.len() > 1);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.index, i as i64);
            assert!(c.word_count > 0);
        }
    }

    #[test]
    fn sentence_at_exact_budget_keeps_its_period() {
        // The sentence itself is not split, so its trailing period takes
        // the piece one character past the budget.
        let paragraph = format!("{}. {}.", "a".repeat(20), "b".repeat(5));
        let chunks = split_text(&paragraph, 20);
        assert_eq!(chunks, vec![format!("{}.", "a".repeat(20)), "bbbbb.".to_string()]);
        assert_eq!(chunks[0].chars().count(), 21);
    }
}
