//! Route modules, one per bounded concern.

pub mod admin;
pub mod bookings;
pub mod experiences;
pub mod health;
pub mod notifications;
pub mod packages;
pub mod payments;
pub mod realtime;

use serde::Deserialize;

use reefbook_core::page::Page;

/// Pagination query parameters shared by list endpoints.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageParams {
    /// 1-based page number.
    #[serde(default = "first_page")]
    pub page: u32,
    /// Records per page.
    #[serde(default = "default_size")]
    pub size: u32,
}

pub(crate) fn first_page() -> u32 {
    1
}

pub(crate) fn default_size() -> u32 {
    20
}

impl From<PageParams> for Page {
    fn from(params: PageParams) -> Page {
        Page {
            number: params.page,
            size: params.size,
        }
    }
}
