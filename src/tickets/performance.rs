//! Resolution-time statistics.

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use super::error::{HelpdeskError, HelpdeskResult};
use crate::security::validation::{ValidationError, Validator};
use super::models::{CategoryId, Ticket};
use super::store::TicketStore;

pub const DEFAULT_PERIOD_MONTHS: u32 = 2;
pub const MAX_PERIOD_MONTHS: u32 = 120;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthPerformance {
    /// Month label such as "January 2024".
    pub label: String,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    /// One entry per category of the report, in the same order.
    pub averages: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub categories: Vec<String>,
    pub months: Vec<MonthPerformance>,
}

/// Whole days from creation to completion, `None` while the ticket is open.
pub fn ticket_resolution_days(ticket: &Ticket) -> Option<i64> {
    ticket
        .completed_at
        .map(|completed| (completed - ticket.created_at).num_days())
}

/// Mean resolution days of tickets completed within `[from, to]`.
pub fn interval_average<S: TicketStore>(
    store: &mut S,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    category_id: Option<CategoryId>,
) -> HelpdeskResult<Option<f64>> {
    let tickets = store.tickets_completed_between(from, to, category_id)?;
    let days: Vec<i64> = tickets.iter().filter_map(ticket_resolution_days).collect();
    if days.is_empty() {
        return Ok(None);
    }
    Ok(Some(days.iter().sum::<i64>() as f64 / days.len() as f64))
}

/// Rejects report periods longer than [`MAX_PERIOD_MONTHS`].
pub fn check_period(period: u32) -> HelpdeskResult<()> {
    Validator::new()
        .custom(|| {
            (period > MAX_PERIOD_MONTHS).then(|| ValidationError::InvalidValue {
                field: "period".to_string(),
                message: format!("at most {} months", MAX_PERIOD_MONTHS),
            })
        })
        .validate()
        .map_err(HelpdeskError::Validation)
}

pub fn monthly_report<S: TicketStore>(store: &mut S, period: u32) -> HelpdeskResult<PerformanceReport> {
    monthly_report_at(store, Utc::now(), period)
}

/// Report over the `period + 1` calendar months ending with the month of
/// `now`, oldest first.
pub fn monthly_report_at<S: TicketStore>(
    store: &mut S,
    now: DateTime<Utc>,
    period: u32,
) -> HelpdeskResult<PerformanceReport> {
    check_period(period)?;
    let categories = store.categories()?;
    let mut months = Vec::new();

    for back in (0..=period).rev() {
        let (from, to) = month_window(now, back).ok_or_else(|| {
            HelpdeskError::Internal(format!("no calendar month {} before {}", back, now))
        })?;
        let mut averages = Vec::with_capacity(categories.len());
        for category in &categories {
            let average = interval_average(store, from, to, Some(category.id))?;
            averages.push(average.map(round_to_tenth));
        }
        months.push(MonthPerformance {
            label: from.format("%B %Y").to_string(),
            from,
            to,
            averages,
        });
    }

    debug!(
        "Built performance report over {} month(s) and {} categories",
        months.len(),
        categories.len()
    );
    Ok(PerformanceReport {
        categories: categories.into_iter().map(|c| c.name).collect(),
        months,
    })
}

/// First and last instant of the calendar month `months_back` before `now`.
pub fn month_window(now: DateTime<Utc>, months_back: u32) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let first = NaiveDate::from_ymd_opt(now.year(), now.month(), 1)?
        .checked_sub_months(Months::new(months_back))?;
    let next = first.checked_add_months(Months::new(1))?;
    let from = first.and_hms_opt(0, 0, 0)?.and_utc();
    let to = next.and_hms_opt(0, 0, 0)?.and_utc() - Duration::microseconds(1);
    Some((from, to))
}

fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
