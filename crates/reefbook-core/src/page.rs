//! Pagination window shared by list queries.

/// Pagination window, 1-based.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    /// Page number starting at 1.
    pub number: u32,
    /// Records per page.
    pub size: u32,
}

impl Page {
    /// Clamp to sane bounds: page ≥ 1, 1 ≤ size ≤ 100.
    #[must_use]
    pub fn clamped(self) -> Page {
        Page {
            number: self.number.max(1),
            size: self.size.clamp(1, 100),
        }
    }

    /// Records to skip before this page.
    #[must_use]
    pub fn offset(self) -> u64 {
        let page = self.clamped();
        u64::from(page.number - 1) * u64::from(page.size)
    }
}

impl Default for Page {
    fn default() -> Self {
        Page { number: 1, size: 20 }
    }
}
