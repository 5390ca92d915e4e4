//! Pagination for dashboard listings.

use super::MirrorTaskDomainError;

/// One-based page selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    per: u32,
    page: u32,
}

impl PageRequest {
    /// Creates a validated page request.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorTaskDomainError::InvalidPage`] when `per` or `page` is
    /// zero.
    pub const fn new(per: u32, page: u32) -> Result<Self, MirrorTaskDomainError> {
        if per == 0 || page == 0 {
            return Err(MirrorTaskDomainError::InvalidPage { per, page });
        }
        Ok(Self { per, page })
    }

    /// Returns the page size.
    #[must_use]
    pub const fn per(self) -> u32 {
        self.per
    }

    /// Returns the 1-based page number.
    #[must_use]
    pub const fn page(self) -> u32 {
        self.page
    }

    /// Number of rows to skip.
    #[must_use]
    pub const fn offset(self) -> u64 {
        (self.page as u64 - 1) * self.per as u64
    }
}
