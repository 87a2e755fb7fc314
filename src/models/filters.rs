use serde::Serialize;

use super::validator::{Validator, permitted_value};

#[derive(Debug, Clone)]
pub struct Filters {
    pub page: u64,
    pub page_size: u64,
    pub sort: String,
    pub sort_safelist: &'static [&'static str],
}

impl Filters {
    /// Column name for the requested sort, without the direction prefix.
    ///
    /// Panics on a value outside the safelist: handlers validate first, so
    /// reaching here with one is a programming error.
    #[must_use]
    pub fn sort_column(&self) -> &str {
        assert!(
            self.sort_safelist.contains(&self.sort.as_str()),
            "unsafe sort parameter: {}",
            self.sort
        );
        self.sort.trim_start_matches('-')
    }

    #[must_use]
    pub fn sort_descending(&self) -> bool {
        self.sort.starts_with('-')
    }

    pub fn validate(&self, v: &mut Validator) {
        v.check(self.page > 0, "page", "must be greater than zero");
        v.check(
            self.page <= 10_000_000,
            "page",
            "must be a maximum of 10 million",
        );
        v.check(self.page_size > 0, "page_size", "must be greater than zero");
        v.check(
            self.page_size <= 100,
            "page_size",
            "must be a maximum of 100",
        );
        v.check(
            permitted_value(&self.sort, self.sort_safelist),
            "sort",
            "invalid sort value",
        );
    }
}

/// Pagination details returned alongside a listing. Serializes to `{}` when
/// there are no records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Metadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_page: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_page: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_page: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_records: Option<u64>,
}

impl Metadata {
    #[must_use]
    pub fn calculate(total_records: u64, page: u64, page_size: u64) -> Self {
        if total_records == 0 {
            return Self::default();
        }
        Self {
            current_page: Some(page),
            page_size: Some(page_size),
            first_page: Some(1),
            last_page: Some(total_records.div_ceil(page_size)),
            total_records: Some(total_records),
        }
    }
}
