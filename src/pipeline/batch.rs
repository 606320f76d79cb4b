//! Batch planning: split the ordered page images into request groups.
//!
//! A limit of 1 means one image per group; a limit at or above the page
//! count means a single group. Both are valid, they only trade request
//! volume against per-request size.

use crate::error::Pdf2TextError;
use crate::pipeline::render::PageImage;

/// A contiguous, non-empty run of pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// 0-based position in the plan.
    pub index: usize,
    pub pages: Vec<PageImage>,
}

impl Batch {
    /// 1-indexed number for messages and callbacks.
    pub fn number(&self) -> usize {
        self.index + 1
    }

    pub fn first_page(&self) -> usize {
        self.pages.first().map_or(0, |p| p.page_num)
    }

    pub fn last_page(&self) -> usize {
        self.pages.last().map_or(0, |p| p.page_num)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

/// Split `images` into runs of `limit`; the last run may be shorter.
///
/// Consumes the images so each one ends up in exactly one batch.
pub fn partition(images: Vec<PageImage>, limit: usize) -> Result<Vec<Batch>, Pdf2TextError> {
    if limit == 0 {
        return Err(Pdf2TextError::InvalidBatchLimit { limit });
    }

    let mut batches = Vec::with_capacity(images.len().div_ceil(limit));
    let mut pages = images.into_iter().peekable();
    while pages.peek().is_some() {
        batches.push(Batch {
            index: batches.len(),
            pages: pages.by_ref().take(limit).collect(),
        });
    }
    Ok(batches)
}
