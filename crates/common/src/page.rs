//! Pagination primitives shared by every listing.

use serde::{Deserialize, Serialize};

/// A request for one page of a listing.
///
/// Pages are 1-based. A page number of 0 is treated as the first page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub per_page: u32,
}

impl PageRequest {
    /// Creates a page request, clamping `page` to at least 1 and `per_page`
    /// to at least 1.
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.max(1),
        }
    }

    /// The first page with the given size.
    pub fn first(per_page: u32) -> Self {
        Self::new(1, per_page)
    }

    /// Number of items to skip before this page.
    pub fn offset(&self) -> usize {
        (self.page.max(1) as usize - 1) * self.per_page as usize
    }

    /// Maximum number of items on this page.
    pub fn limit(&self) -> usize {
        self.per_page as usize
    }
}

/// One page of results together with the size of the full listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
}

impl<T> Page<T> {
    /// Slices an already-sorted collection into the requested page.
    pub fn from_sorted(all: Vec<T>, request: PageRequest) -> Self {
        let total = all.len() as u64;
        let items = all
            .into_iter()
            .skip(request.offset())
            .take(request.limit())
            .collect();
        Self {
            items,
            page: request.page,
            per_page: request.per_page,
            total,
        }
    }

    /// Total number of pages; an empty listing still has one (empty) page.
    pub fn total_pages(&self) -> u64 {
        if self.total == 0 {
            1
        } else {
            self.total.div_ceil(self.per_page.max(1) as u64)
        }
    }

    /// Returns true if a later page exists.
    pub fn has_next(&self) -> bool {
        (self.page as u64) < self.total_pages()
    }

    /// Transforms the items, keeping the paging metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            per_page: self.per_page,
            total: self.total,
        }
    }
}
