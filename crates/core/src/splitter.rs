use crate::error::IngestError;

/// Window parameters for recursive character splitting. Defaults follow the
/// common RAG setup of 1000-character windows with 200 characters of overlap.
#[derive(Debug, Clone, Copy)]
pub struct SplitConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1_000,
            chunk_overlap: 200,
        }
    }
}

impl SplitConfig {
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.chunk_size == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "chunk_size must be greater than zero".to_string(),
            ));
        }

        if self.chunk_overlap >= self.chunk_size {
            return Err(IngestError::InvalidChunkConfig(format!(
                "chunk_overlap {} must be smaller than chunk_size {}",
                self.chunk_overlap, self.chunk_size
            )));
        }

        Ok(())
    }
}

/// Split text into overlapping windows of at most `chunk_size` characters,
/// cutting on paragraph, then line, then word boundaries where possible.
/// Consecutive windows share exactly `chunk_overlap` characters, so joining
/// the windows minus their overlaps reproduces the input.
pub fn split_text(text: &str, config: SplitConfig) -> Result<Vec<String>, IngestError> {
    config.validate()?;

    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Ok(Vec::new());
    }

    if chars.len() <= config.chunk_size {
        return Ok(vec![text.to_string()]);
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;

    loop {
        let hard_end = (start + config.chunk_size).min(chars.len());
        let end = if hard_end == chars.len() {
            hard_end
        } else {
            break_point(&chars, start, hard_end, config.chunk_overlap)
        };

        chunks.push(chars[start..end].iter().collect());

        if end == chars.len() {
            break;
        }

        start = end - config.chunk_overlap;
    }

    Ok(chunks)
}

/// Preferred cut for a window ending at `hard_end`: just past the last
/// paragraph break, line break, or space in the second half of the window.
/// Falls back to the hard character boundary. Cuts never land within
/// `overlap` characters of `start`, so the next window always begins
/// strictly after this one and shares exactly `overlap` characters with it.
fn break_point(chars: &[char], start: usize, hard_end: usize, overlap: usize) -> usize {
    let floor = (start + (hard_end - start) / 2).max(start + overlap + 1);

    for separator in ["\n\n", "\n", " "] {
        if let Some(cut) = rfind_separator(chars, floor, hard_end, separator) {
            return cut;
        }
    }

    hard_end
}

/// Index just past the last occurrence of `separator` that starts at or
/// after `floor` and fits before `end`.
fn rfind_separator(chars: &[char], floor: usize, end: usize, separator: &str) -> Option<usize> {
    let sep: Vec<char> = separator.chars().collect();
    if end < sep.len() {
        return None;
    }

    let mut at = end - sep.len();
    loop {
        if at < floor {
            return None;
        }
        if chars[at..at + sep.len()] == sep[..] {
            return Some(at + sep.len());
        }
        if at == 0 {
            return None;
        }
        at -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reconstruct(chunks: &[String], overlap: usize) -> String {
        let mut text = chunks.first().cloned().unwrap_or_default();
        for chunk in chunks.iter().skip(1) {
            text.extend(chunk.chars().skip(overlap));
        }
        text
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        let chunks = split_text("", SplitConfig::default()).unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunks = split_text("just one paragraph", SplitConfig::default()).unwrap();
        assert_eq!(chunks, vec!["just one paragraph".to_string()]);
    }

    #[test]
    fn windows_respect_the_size_limit() {
        let config = SplitConfig {
            chunk_size: 100,
            chunk_overlap: 20,
        };
        let text = "lorem ipsum dolor sit amet ".repeat(40);

        let chunks = split_text(&text, config).unwrap();
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= config.chunk_size);
        }
    }

    #[test]
    fn joining_chunks_minus_overlap_reconstructs_the_text() {
        let config = SplitConfig {
            chunk_size: 100,
            chunk_overlap: 20,
        };
        let text = format!(
            "{}\n\n{}\n{}",
            "First paragraph about hydraulic systems and their maintenance schedules.".repeat(3),
            "Second paragraph covering inspection intervals.",
            "A trailing line with a few closing words for the document."
        );

        let chunks = split_text(&text, config).unwrap();
        assert_eq!(reconstruct(&chunks, config.chunk_overlap), text);
    }

    #[test]
    fn reconstruction_holds_with_aggressive_overlap() {
        let config = SplitConfig {
            chunk_size: 10,
            chunk_overlap: 6,
        };
        let text = "aaaa bbbb cccc dddd eeee";

        let chunks = split_text(text, config).unwrap();
        assert!(chunks.len() > 1);
        for window in chunks.windows(2) {
            let tail: String = window[0]
                .chars()
                .skip(window[0].chars().count() - config.chunk_overlap)
                .collect();
            let head: String = window[1].chars().take(config.chunk_overlap).collect();
            assert_eq!(tail, head);
        }
        assert_eq!(reconstruct(&chunks, config.chunk_overlap), text);
    }

    #[test]
    fn cuts_prefer_word_boundaries() {
        let config = SplitConfig {
            chunk_size: 50,
            chunk_overlap: 10,
        };
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa lambda mu nu";

        let chunks = split_text(&text, config).unwrap();
        assert!(chunks.len() > 1);
        assert!(chunks[0].ends_with(' '), "chunk was cut mid-word: {:?}", chunks[0]);
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk_size() {
        let config = SplitConfig {
            chunk_size: 10,
            chunk_overlap: 10,
        };
        assert!(split_text("some text", config).is_err());
    }
}
