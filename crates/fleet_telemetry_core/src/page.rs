use serde::{Deserialize, Serialize};

use crate::error::HandlerError;

pub const DEFAULT_SCAN_PAGE_SIZE: usize = 100;
pub const DEFAULT_MAX_PAGE_SIZE: usize = 1_000;

/// One bounded slice of a table scan. `next_cursor` is the key of the last
/// item returned, or `None` once the scan is exhausted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    #[serde(rename = "nextCursor")]
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: usize,
    pub cursor: Option<String>,
}

impl PageRequest {
    pub fn first(limit: usize) -> Self {
        Self {
            limit,
            cursor: None,
        }
    }

    /// Builds a request from raw `limit`/`cursor` query values.
    pub fn from_query(
        limit: &str,
        cursor: Option<&str>,
        max_page_size: usize,
    ) -> Result<Self, HandlerError> {
        let limit = limit
            .trim()
            .parse::<usize>()
            .ok()
            .filter(|value| *value > 0)
            .ok_or_else(|| HandlerError::validation("limit must be a positive integer"))?;
        if limit > max_page_size {
            return Err(HandlerError::validation(format!(
                "limit must not exceed {max_page_size}"
            )));
        }

        Ok(Self {
            limit,
            cursor: cursor
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string),
        })
    }
}
