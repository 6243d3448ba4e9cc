//! crates/rag_chat_core/src/chunk.rs
//!
//! Splits document text into overlapping fixed-size windows. Overlap keeps
//! context continuity across window boundaries so retrieval does not lose
//! sentences cut at a chunk edge.

/// Tunables for the text splitter.
#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    /// Target window size in characters.
    pub chunk_size: usize,
    /// Characters repeated from the end of one window at the start of the next.
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 200,
        }
    }
}

/// Splits `text` into overlapping windows of roughly `chunk_size` characters.
///
/// Window boundaries are snapped back to the nearest whitespace when one is
/// close, so words are not cut in half. All boundaries land on UTF-8 char
/// boundaries. Whitespace-only windows are dropped.
pub fn split_with_overlap(text: &str, cfg: ChunkingConfig) -> Vec<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let chunk_size = cfg.chunk_size.max(1);
    let step = chunk_size.saturating_sub(cfg.overlap).max(1);

    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < trimmed.len() {
        let mut end = (start + chunk_size).min(trimmed.len());
        while end < trimmed.len() && !trimmed.is_char_boundary(end) {
            end += 1;
        }

        // Prefer ending on whitespace so words stay whole, but only when a
        // break point exists reasonably close to the target size.
        if end < trimmed.len() {
            if let Some(pos) = trimmed[start..end].rfind(char::is_whitespace) {
                if pos > chunk_size / 2 {
                    end = start + pos;
                }
            }
        }

        let piece = trimmed[start..end].trim();
        if !piece.is_empty() {
            chunks.push(piece.to_string());
        }

        if end >= trimmed.len() {
            break;
        }

        let mut next = start + step.min(end.saturating_sub(start).max(1));
        while next < trimmed.len() && !trimmed.is_char_boundary(next) {
            next += 1;
        }
        if next <= start {
            next = end;
        }
        start = next;
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(chunk_size: usize, overlap: usize) -> ChunkingConfig {
        ChunkingConfig {
            chunk_size,
            overlap,
        }
    }

    #[test]
    fn short_text_yields_single_chunk() {
        let chunks = split_with_overlap("just a short paragraph", cfg(1000, 200));
        assert_eq!(chunks, vec!["just a short paragraph".to_string()]);
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(split_with_overlap("   \n\t ", ChunkingConfig::default()).is_empty());
    }

    #[test]
    fn long_text_is_windowed_with_overlap() {
        let word = "alpha ";
        let text = word.repeat(100); // 600 chars
        let chunks = split_with_overlap(&text, cfg(200, 50));

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.len() <= 200, "chunk too large: {}", chunk.len());
        }
        // Consecutive windows share text: the head of chunk N+1 appears in chunk N.
        for pair in chunks.windows(2) {
            let head: String = pair[1].chars().take(20).collect();
            assert!(
                pair[0].contains(head.trim()),
                "no overlap between consecutive chunks"
            );
        }
    }

    #[test]
    fn windows_do_not_split_multibyte_chars() {
        let text = "héllo wörld ".repeat(50);
        let chunks = split_with_overlap(&text, cfg(37, 11));
        // Reaching here without a panic means every slice boundary was valid;
        // also check nothing got lost entirely.
        assert!(!chunks.is_empty());
        assert!(chunks.iter().all(|c| c.contains('ö') || c.contains('é')));
    }

    #[test]
    fn zero_overlap_still_advances() {
        let text = "x".repeat(500);
        let chunks = split_with_overlap(&text, cfg(100, 0));
        assert_eq!(chunks.len(), 5);
    }
}
