//! Read-side queries over the live dataset
//!
//! Readers page through the live tables 100 rows at a time. Patients can be
//! narrowed by their payment total, which joins them with the per-patient
//! stats; a patient without any accepted payment has no stats row and never
//! matches a total filter.

use rust_decimal::Decimal;
use serde::Serialize;

use super::entity::Record;
use super::ids::ExternalId;

/// Rows per page
pub const PER_PAGE: u32 = 100;

/// A 1-based page number
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Page(u32);

impl Page {
    /// # Errors
    ///
    /// Returns an error for page 0.
    pub fn new(number: u32) -> Result<Self, String> {
        if number == 0 {
            return Err("page numbers start at 1".to_string());
        }
        Ok(Self(number))
    }

    pub fn first() -> Self {
        Self(1)
    }

    pub fn number(self) -> u32 {
        self.0
    }

    /// Rows skipped before this page
    pub fn offset(self) -> u64 {
        u64::from(self.0 - 1) * u64::from(PER_PAGE)
    }

    pub fn limit(self) -> u64 {
        u64::from(PER_PAGE)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::first()
    }
}

/// Patient filter on the total of accepted payments (inclusive bounds)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatientFilter {
    pub payment_min: Option<Decimal>,
    pub payment_max: Option<Decimal>,
}

impl PatientFilter {
    /// Whether the filter needs the stats join
    pub fn joins_stats(&self) -> bool {
        self.payment_min.is_some() || self.payment_max.is_some()
    }

    /// Whether a patient with payment total `total` passes the bounds
    pub fn admits(&self, total: Decimal) -> bool {
        self.payment_min.map_or(true, |min| total >= min)
            && self.payment_max.map_or(true, |max| total <= max)
    }
}

/// Payment filter on exact external id and owning patient
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentFilter {
    pub external_id: Option<ExternalId>,
    pub patient_id: Option<ExternalId>,
}

impl PaymentFilter {
    pub fn matches(&self, record: &Record) -> bool {
        let Record::Payment(payment) = record else {
            return false;
        };
        self.external_id
            .as_ref()
            .map_or(true, |id| *id == payment.external_id)
            && self
                .patient_id
                .as_ref()
                .map_or(true, |id| *id == payment.patient_id)
    }
}

/// One page of query results with pagination totals
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageOf<T> {
    pub page: u32,
    pub per_page: u32,
    pub total_entries: u64,
    pub total_pages: u64,
    pub items: Vec<T>,
}

impl<T> PageOf<T> {
    pub fn new(page: Page, total_entries: u64, items: Vec<T>) -> Self {
        Self {
            page: page.number(),
            per_page: PER_PAGE,
            total_entries,
            total_pages: total_entries.div_ceil(u64::from(PER_PAGE)),
            items,
        }
    }

    /// Cut `page` out of every matching row, already in result order
    pub fn from_all(page: Page, all: Vec<T>) -> Self {
        let total = all.len() as u64;
        let items = all
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .collect();
        Self::new(page, total, items)
    }
}
