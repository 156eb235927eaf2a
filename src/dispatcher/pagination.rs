//! List paging (RFC 7644 §3.4.2.4).

use crate::connector::PageRequest;

/// A normalised page request.
///
/// `startIndex` below 1 is read as 1, a negative `count` as 0, and `count`
/// never exceeds the configured maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub start_index: usize,
    pub count: usize,
}

/// The paging numbers of a ListResponse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSummary {
    pub total_results: usize,
    pub items_per_page: usize,
    pub start_index: usize,
}

impl Pagination {
    pub fn new(start_index: Option<i64>, count: Option<i64>, max_results: usize) -> Self {
        let start_index = start_index.unwrap_or(1).max(1);
        let ceiling = i64::try_from(max_results).unwrap_or(i64::MAX);
        let count = count.map_or(ceiling, |count| count.max(0));
        Self {
            start_index: usize::try_from(start_index).unwrap_or(usize::MAX),
            count: usize::try_from(count).unwrap_or(usize::MAX).min(max_results),
        }
    }

    pub fn offset(&self) -> usize {
        self.start_index - 1
    }

    pub fn to_request(self) -> PageRequest {
        PageRequest {
            start_index: self.start_index,
            count: self.count,
        }
    }

    /// Cut this page out of the complete result set.
    pub fn slice<T>(&self, items: Vec<T>) -> (Vec<T>, PageSummary) {
        let total_results = items.len();
        let page: Vec<T> = items.into_iter().skip(self.offset()).take(self.count).collect();
        let summary = self.summary(total_results, page.len());
        (page, summary)
    }

    /// Trim a page the backend already cut, trusting its total when given.
    pub fn backend_page<T>(&self, mut records: Vec<T>, total_results: Option<usize>) -> (Vec<T>, PageSummary) {
        records.truncate(self.count);
        let total_results = total_results
            .unwrap_or(0)
            .max(self.offset().saturating_add(records.len()));
        let summary = self.summary(total_results, records.len());
        (records, summary)
    }

    /// An empty page past the end reports `startIndex` as `totalResults + 1`.
    fn summary(&self, total_results: usize, items_per_page: usize) -> PageSummary {
        let start_index = if items_per_page == 0 {
            self.start_index.min(total_results.saturating_add(1))
        } else {
            self.start_index
        };
        PageSummary {
            total_results,
            items_per_page,
            start_index,
        }
    }
}
