//! Chunked scanning for oversized payloads
//!
//! Splits the payload into fixed-size chunks with a trailing overlap so
//! entities straddling a boundary are seen whole by the next chunk.
//! Chunk edges snap forward to UTF-8 character boundaries. Offsets in
//! the returned spans refer to the full payload.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::detector::EntityDetector;
use super::EntitySpan;

/// Bounded-concurrency chunk scanner
pub struct ChunkScanner {
    detector: Arc<EntityDetector>,
    chunk_size: usize,
    overlap: usize,
    max_concurrent: usize,
    chunk_timeout: Duration,
}

impl ChunkScanner {
    pub fn new(
        detector: Arc<EntityDetector>,
        chunk_size: usize,
        overlap: usize,
        max_concurrent: usize,
        chunk_timeout: Duration,
    ) -> Self {
        // Overlap below chunk size is enforced by config validation
        Self {
            detector,
            chunk_size: chunk_size.max(1),
            overlap: overlap.min(chunk_size.saturating_sub(1)),
            max_concurrent: max_concurrent.max(1),
            chunk_timeout,
        }
    }

    /// Scan `text`, chunking when it exceeds the chunk size.
    ///
    /// A chunk that times out or panics contributes no findings; the
    /// rest of the payload is still scanned.
    pub async fn scan(&self, text: &str) -> Vec<EntitySpan> {
        if text.len() <= self.chunk_size {
            return self.detector.detect(text).await;
        }

        let chunks = self.split(text);
        debug!(chunks = chunks.len(), bytes = text.len(), "chunked scan");

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut handles = Vec::with_capacity(chunks.len());
        for (index, (start, end)) in chunks.iter().copied().enumerate() {
            let chunk = text[start..end].to_string();
            let detector = Arc::clone(&self.detector);
            let semaphore = Arc::clone(&semaphore);
            let chunk_timeout = self.chunk_timeout;
            handles.push(tokio::spawn(async move {
                // Semaphore is never closed while handles are live
                let _permit = semaphore.acquire_owned().await.ok();
                let spans = timeout(chunk_timeout, detector.detect(&chunk)).await;
                (index, start, spans)
            }));
        }

        let mut per_chunk: Vec<Vec<EntitySpan>> = vec![Vec::new(); chunks.len()];
        for handle in handles {
            match handle.await {
                Ok((index, base, Ok(mut spans))) => {
                    for span in &mut spans {
                        span.start += base;
                        span.end += base;
                    }
                    per_chunk[index] = spans;
                }
                Ok((index, _, Err(_))) => {
                    warn!(chunk = index, "chunk scan timed out, findings skipped");
                }
                Err(e) => {
                    warn!(error = %e, "chunk scan task failed");
                }
            }
        }

        merge_chunks(per_chunk)
    }

    /// Chunk byte ranges over `text`, each snapped to char boundaries.
    /// Edges snap forward so a chunk always covers at least one char
    /// and the loop makes progress for any chunk size.
    fn split(&self, text: &str) -> Vec<(usize, usize)> {
        let mut chunks = Vec::new();
        let len = text.len();
        let mut start = 0;
        while start < len {
            let mut end = (start + self.chunk_size).min(len);
            while end < len && !text.is_char_boundary(end) {
                end += 1;
            }
            chunks.push((start, end));
            if end == len {
                break;
            }
            let mut next = end.saturating_sub(self.overlap);
            while next > 0 && !text.is_char_boundary(next) {
                next -= 1;
            }
            // Guarantee forward progress even with degenerate overlap
            start = if next > start { next } else { end };
        }
        chunks
    }
}

/// Merge per-chunk findings in chunk order. A finding that overlaps an
/// already-kept finding of the same type is dropped unless it is strictly
/// longer, which replaces a boundary-truncated match with the whole one.
fn merge_chunks(per_chunk: Vec<Vec<EntitySpan>>) -> Vec<EntitySpan> {
    let mut kept: Vec<EntitySpan> = Vec::new();
    for spans in per_chunk {
        for span in spans {
            match kept
                .iter()
                .position(|k| k.entity_type == span.entity_type && k.overlaps(&span))
            {
                Some(i) => {
                    if span.end - span.start > kept[i].end - kept[i].start {
                        kept[i] = span;
                    }
                }
                None => kept.push(span),
            }
        }
    }
    kept.sort_by_key(|span| (span.start, span.end));
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::cache::ScanCache;
    use crate::detect::patterns::PatternCatalog;
    use crate::detect::EntityType;

    fn scanner(chunk_size: usize, overlap: usize) -> ChunkScanner {
        let detector = Arc::new(EntityDetector::new(
            Arc::new(PatternCatalog::builtin()),
            Arc::new(ScanCache::new(64)),
            0.5,
        ));
        ChunkScanner::new(detector, chunk_size, overlap, 4, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_small_payload_skips_chunking() {
        let s = scanner(1024, 64);
        let spans = s.scan("mail: root@box.example").await;
        assert_eq!(spans.len(), 1);
    }

    #[tokio::test]
    async fn test_offsets_rebase_to_full_payload() {
        let filler = "x".repeat(100);
        let text = format!("{} first@a.example {} second@b.example", filler, filler);
        let s = scanner(64, 32);
        let spans = s.scan(&text).await;
        let emails: Vec<_> = spans
            .iter()
            .filter(|sp| sp.entity_type == EntityType::Email)
            .collect();
        assert_eq!(emails.len(), 2);
        for span in emails {
            assert_eq!(&text[span.start..span.end], span.matched_text);
        }
    }

    #[tokio::test]
    async fn test_boundary_straddling_entity_found_once() {
        // Place an email across the 64-byte chunk edge; the 32-byte
        // overlap lets the next chunk see it whole.
        let prefix = "y".repeat(58);
        let text = format!("{} longname@mail.example tail", prefix);
        let s = scanner(64, 32);
        let spans = s.scan(&text).await;
        let emails: Vec<_> = spans
            .iter()
            .filter(|sp| sp.entity_type == EntityType::Email)
            .collect();
        assert_eq!(emails.len(), 1);
        assert_eq!(emails[0].matched_text, "longname@mail.example");
    }

    #[tokio::test]
    async fn test_chunk_size_below_char_width_terminates() {
        // A 1-byte chunk size cannot hold a 2-byte char; edges must
        // still advance past it instead of looping on an empty range.
        let s = scanner(1, 0);
        let spans = s.scan("éé").await;
        assert!(spans.is_empty());
    }

    #[tokio::test]
    async fn test_multibyte_boundaries_do_not_split_chars() {
        let text = format!("{} peter@mail.example", "é".repeat(100));
        let s = scanner(64, 16);
        // Must not panic on non-ASCII chunk edges
        let spans = s.scan(&text).await;
        assert!(spans.iter().any(|sp| sp.entity_type == EntityType::Email));
    }

    #[tokio::test]
    async fn test_chunked_matches_unchunked_scan() {
        // One scanner is forced to chunk, the other sees the payload
        // whole; both must report the same findings.
        let filler = "q".repeat(70);
        let text = format!(
            "{} bob@corp.example {} 555-867-5309 {} GB82WEST12345698765432 end",
            filler, filler, filler
        );
        let chunked = scanner(64, 32).scan(&text).await;
        let whole = scanner(8192, 32).scan(&text).await;
        assert!(chunked.len() >= 3);
        assert_eq!(chunked, whole);
    }

    #[tokio::test]
    async fn test_sequential_and_parallel_agree() {
        let filler = "z".repeat(90);
        let text = format!(
            "{} a@x.example {} 555-867-5309 {} GB82WEST12345698765432",
            filler, filler, filler
        );
        let parallel = scanner(64, 32).scan(&text).await;
        let detector = Arc::new(EntityDetector::new(
            Arc::new(PatternCatalog::builtin()),
            Arc::new(ScanCache::new(64)),
            0.5,
        ));
        let sequential =
            ChunkScanner::new(detector, 64, 32, 1, Duration::from_secs(5)).scan(&text).await;
        assert_eq!(parallel, sequential);
    }
}
