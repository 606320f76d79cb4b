//! Result types returned by the transcription pipeline.

use crate::pipeline::render::PageSize;
use serde::{Deserialize, Serialize};

/// The finished transcript of one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    /// Batch fragments in page order, joined by a blank line and trimmed.
    pub text: String,

    /// Number of pages rendered and sent to the model.
    pub page_count: usize,

    pub stats: TranscriptStats,
}

/// Aggregate counters for one transcription run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptStats {
    pub batches: usize,
    /// Successful inference calls (retries are not counted).
    pub requests: usize,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub render_duration_ms: u64,
    pub inference_duration_ms: u64,
    pub total_duration_ms: u64,
}

impl TranscriptStats {
    /// Fold one finished batch into the totals.
    pub fn record(&mut self, batch: &BatchTranscript) {
        self.batches += 1;
        self.requests += batch.requests;
        self.prompt_tokens += batch.prompt_tokens;
        self.completion_tokens += batch.completion_tokens;
    }
}

/// Text produced for one batch of pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchTranscript {
    /// 0-based position of the batch in the document.
    pub index: usize,
    /// 1-indexed, inclusive.
    pub first_page: usize,
    pub last_page: usize,
    /// The batch's fragments, in page order, joined by a blank line.
    pub text: String,
    pub requests: usize,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub duration_ms: u64,
}

/// Page count and sizes, available without calling the model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub page_count: usize,
    pub pages: Vec<PageSize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(index: usize, requests: usize, tokens: u64) -> BatchTranscript {
        BatchTranscript {
            index,
            first_page: index * 2 + 1,
            last_page: index * 2 + 2,
            text: format!("batch {index}"),
            requests,
            prompt_tokens: tokens,
            completion_tokens: tokens / 2,
            duration_ms: 10,
        }
    }

    #[test]
    fn stats_accumulate_batches() {
        let mut stats = TranscriptStats::default();
        stats.record(&batch(0, 2, 100));
        stats.record(&batch(1, 1, 40));
        assert_eq!(stats.batches, 2);
        assert_eq!(stats.requests, 3);
        assert_eq!(stats.prompt_tokens, 140);
        assert_eq!(stats.completion_tokens, 70);
    }

    #[test]
    fn transcript_serialises_to_json() {
        let t = Transcript {
            text: "hello".into(),
            page_count: 1,
            stats: TranscriptStats::default(),
        };
        let json = serde_json::to_value(&t).unwrap();
        assert_eq!(json["text"], "hello");
        assert_eq!(json["page_count"], 1);
        assert_eq!(json["stats"]["batches"], 0);
    }
}
