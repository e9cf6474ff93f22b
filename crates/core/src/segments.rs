//! Funnel Segments
//!
//! Partitions users into named funnel stages by set operations over the
//! snapshot. Segments drive targeted broadcasts, the admin summary and
//! per-segment exports.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;
use crate::models::{PaymentStatus, Snapshot, UserId};

/// A named cohort of users sharing a funnel stage.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Segment {
    FilledForm,
    Assigned,
    Submitted,
    RequestedPayout,
    Paid,
    Unpaid,
}

impl Segment {
    /// Every segment in funnel order.
    pub const ALL: [Segment; 6] = [
        Segment::FilledForm,
        Segment::Assigned,
        Segment::Submitted,
        Segment::RequestedPayout,
        Segment::Paid,
        Segment::Unpaid,
    ];

    /// Stable key used in callback data and export file names.
    pub fn key(&self) -> &'static str {
        match self {
            Segment::FilledForm => "filled_form",
            Segment::Assigned => "assigned",
            Segment::Submitted => "submitted",
            Segment::RequestedPayout => "requested_payout",
            Segment::Paid => "paid",
            Segment::Unpaid => "unpaid",
        }
    }

    /// Label shown to staff.
    pub fn label(&self) -> &'static str {
        match self {
            Segment::FilledForm => "Filled the profile",
            Segment::Assigned => "Received the task",
            Segment::Submitted => "Submitted links",
            Segment::RequestedPayout => "Requested payout",
            Segment::Paid => "Paid",
            Segment::Unpaid => "Not paid yet",
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Segment {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Segment::ALL
            .into_iter()
            .find(|seg| seg.key() == s)
            .ok_or_else(|| CoreError::parse(format!("unknown segment: {}", s)))
    }
}

/// Compute every segment's members, each sorted ascending.
pub fn compute_segments(snapshot: &Snapshot) -> BTreeMap<Segment, Vec<UserId>> {
    let filled: BTreeSet<UserId> = snapshot.bloggers.iter().map(|b| b.user_id).collect();
    let assigned: BTreeSet<UserId> = snapshot.orders.iter().map(|o| o.user_id).collect();
    let submitted: BTreeSet<UserId> = snapshot
        .orders
        .iter()
        .filter(|o| o.status.has_submitted())
        .map(|o| o.user_id)
        .collect();
    let requested: BTreeSet<UserId> = snapshot.payments.iter().map(|p| p.user_id).collect();
    let paid: BTreeSet<UserId> = snapshot
        .payments
        .iter()
        .filter(|p| p.status == PaymentStatus::Paid)
        .map(|p| p.user_id)
        .collect();
    let unpaid: BTreeSet<UserId> = requested.difference(&paid).copied().collect();

    let mut segments = BTreeMap::new();
    segments.insert(Segment::FilledForm, filled.into_iter().collect());
    segments.insert(Segment::Assigned, assigned.into_iter().collect());
    segments.insert(Segment::Submitted, submitted.into_iter().collect());
    segments.insert(Segment::RequestedPayout, requested.into_iter().collect());
    segments.insert(Segment::Paid, paid.into_iter().collect());
    segments.insert(Segment::Unpaid, unpaid.into_iter().collect());
    segments
}

/// Members of a single segment.
pub fn segment_members(snapshot: &Snapshot, segment: Segment) -> Vec<UserId> {
    compute_segments(snapshot)
        .remove(&segment)
        .unwrap_or_default()
}

/// Funnel counts for an inclusive date range.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FunnelStats {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub filled_form: usize,
    pub assigned: usize,
    pub submitted: usize,
    pub requested_payout: usize,
    pub paid: usize,
}

/// Count funnel events whose timestamps fall within `from..=to`.
///
/// Profiles count by consent time, orders (and submitted orders) by
/// assignment time, payouts by request time.
pub fn funnel_stats(snapshot: &Snapshot, from: NaiveDate, to: NaiveDate) -> FunnelStats {
    let in_range = |day: NaiveDate| day >= from && day <= to;

    FunnelStats {
        from: Some(from),
        to: Some(to),
        filled_form: snapshot
            .bloggers
            .iter()
            .filter(|b| in_range(b.consent_at.date_naive()))
            .count(),
        assigned: snapshot
            .orders
            .iter()
            .filter(|o| in_range(o.assigned_at.date_naive()))
            .count(),
        submitted: snapshot
            .orders
            .iter()
            .filter(|o| o.status.has_submitted() && in_range(o.assigned_at.date_naive()))
            .count(),
        requested_payout: snapshot
            .payments
            .iter()
            .filter(|p| in_range(p.created_at.date_naive()))
            .count(),
        paid: snapshot
            .payments
            .iter()
            .filter(|p| p.status == PaymentStatus::Paid && in_range(p.created_at.date_naive()))
            .count(),
    }
}
