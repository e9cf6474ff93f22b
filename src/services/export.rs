//! Export Functionality
//!
//! CSV exports of the bookkeeping tables. Files are written to the data
//! directory and returned so they can also be sent as chat documents.

use std::io::Write;
use std::path::PathBuf;

use blogger_flow_core::{segment_members, Decline, Segment, Snapshot};
use tracing::info;

use crate::storage::Database;
use crate::utils::error::{AppError, AppResult};
use crate::utils::paths::ensure_dir;

/// Payments summary refreshed after every payout request and confirmation.
pub const PAYMENTS_EXPORT_FILE: &str = "payments_export.csv";

/// A written export file.
#[derive(Debug, Clone)]
pub struct ExportFile {
    pub file_name: String,
    pub path: PathBuf,
    pub data: Vec<u8>,
    /// Data rows, header excluded
    pub rows: usize,
}

/// Writes CSV exports into one directory.
#[derive(Debug, Clone)]
pub struct Exporter {
    dir: PathBuf,
}

impl Exporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Rewrite `payments_export.csv`.
    pub fn refresh_payments_export(&self, db: &Database) -> AppResult<ExportFile> {
        let snapshot = db.load_snapshot()?;
        let (data, rows) = payments_summary_csv(&snapshot)?;
        self.write(PAYMENTS_EXPORT_FILE, data, rows)
    }

    /// Write `export_seg_<key>.csv` for one segment.
    pub fn export_segment(&self, db: &Database, segment: Segment) -> AppResult<ExportFile> {
        let snapshot = db.load_snapshot()?;
        let (data, rows) = segment_csv(&snapshot, segment)?;
        self.write(&format!("export_seg_{}.csv", segment.key()), data, rows)
    }

    /// Write every table plus the payments summary.
    pub fn export_all(&self, db: &Database) -> AppResult<Vec<ExportFile>> {
        let snapshot = db.load_snapshot()?;
        let declines = db.list_declines()?;

        let (bloggers, bloggers_rows) = bloggers_csv(&snapshot)?;
        let (orders, orders_rows) = orders_csv(&snapshot)?;
        let (payments, payments_rows) = payments_csv(&snapshot)?;
        let (declines, declines_rows) = declines_csv(&declines)?;
        let (summary, summary_rows) = payments_summary_csv(&snapshot)?;

        let files = vec![
            self.write("bloggers.csv", bloggers, bloggers_rows)?,
            self.write("orders.csv", orders, orders_rows)?,
            self.write("payments.csv", payments, payments_rows)?,
            self.write("declines.csv", declines, declines_rows)?,
            self.write(PAYMENTS_EXPORT_FILE, summary, summary_rows)?,
        ];
        info!(dir = %self.dir.display(), files = files.len(), "Full export written");
        Ok(files)
    }

    fn write(&self, file_name: &str, data: Vec<u8>, rows: usize) -> AppResult<ExportFile> {
        ensure_dir(&self.dir)?;
        let path = self.dir.join(file_name);
        std::fs::write(&path, &data)?;
        Ok(ExportFile {
            file_name: file_name.to_string(),
            path,
            data,
            rows,
        })
    }
}

fn io_err(e: std::io::Error) -> AppError {
    AppError::internal(e.to_string())
}

/// Quote a field when it holds a separator, quote or line break.
pub fn csv_escape(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn write_row(output: &mut Vec<u8>, fields: &[String]) -> AppResult<()> {
    let line = fields
        .iter()
        .map(|f| csv_escape(f))
        .collect::<Vec<_>>()
        .join(",");
    writeln!(output, "{}", line).map_err(io_err)
}

fn header(output: &mut Vec<u8>, columns: &[&str]) -> AppResult<()> {
    writeln!(output, "{}", columns.join(",")).map_err(io_err)
}

/// One row per payment: nickname, Telegram id, details, first link, status.
pub fn payments_summary_csv(snapshot: &Snapshot) -> AppResult<(Vec<u8>, usize)> {
    let mut output = Vec::new();
    header(
        &mut output,
        &["nickname", "tg_id", "payout_details", "first_video_link", "status"],
    )?;
    for payment in &snapshot.payments {
        write_row(
            &mut output,
            &[
                snapshot.display_name(payment.user_id).to_string(),
                payment.user_id.to_string(),
                payment.details.clone(),
                payment.links.first().cloned().unwrap_or_default(),
                payment.status.to_string(),
            ],
        )?;
    }
    Ok((output, snapshot.payments.len()))
}

/// Members of a segment with their order summary.
pub fn segment_csv(snapshot: &Snapshot, segment: Segment) -> AppResult<(Vec<u8>, usize)> {
    let members = segment_members(snapshot, segment);
    let mut output = Vec::new();
    header(
        &mut output,
        &[
            "user_id",
            "nickname",
            "status",
            "platform",
            "order_date",
            "deadline",
            "first_link",
        ],
    )?;
    for user_id in &members {
        let order = snapshot.order(*user_id);
        write_row(
            &mut output,
            &[
                user_id.to_string(),
                snapshot.display_name(*user_id).to_string(),
                order.map(|o| o.status.to_string()).unwrap_or_default(),
                order.map(|o| o.platform.clone()).unwrap_or_default(),
                order.map(|o| o.order_date.to_string()).unwrap_or_default(),
                order.map(|o| o.deadline.to_string()).unwrap_or_default(),
                order
                    .and_then(|o| o.links.first().cloned())
                    .unwrap_or_default(),
            ],
        )?;
    }
    Ok((output, members.len()))
}

pub fn bloggers_csv(snapshot: &Snapshot) -> AppResult<(Vec<u8>, usize)> {
    let mut output = Vec::new();
    header(
        &mut output,
        &[
            "user_id",
            "display_name",
            "followers",
            "platforms",
            "theme",
            "reach_file_id",
            "referral_source",
            "tg_username",
            "consent_at",
        ],
    )?;
    for blogger in &snapshot.bloggers {
        write_row(
            &mut output,
            &[
                blogger.user_id.to_string(),
                blogger.display_name.clone(),
                blogger.followers.clone(),
                blogger.platforms.join(", "),
                blogger.theme.clone(),
                blogger.reach_file_id.clone(),
                blogger.referral_source.clone().unwrap_or_default(),
                blogger.tg_username.clone().unwrap_or_default(),
                blogger.consent_at.to_rfc3339(),
            ],
        )?;
    }
    Ok((output, snapshot.bloggers.len()))
}

pub fn orders_csv(snapshot: &Snapshot) -> AppResult<(Vec<u8>, usize)> {
    let mut output = Vec::new();
    header(
        &mut output,
        &[
            "user_id",
            "platform",
            "order_date",
            "deadline",
            "status",
            "links",
            "assigned_at",
        ],
    )?;
    for order in &snapshot.orders {
        write_row(
            &mut output,
            &[
                order.user_id.to_string(),
                order.platform.clone(),
                order.order_date.to_string(),
                order.deadline.to_string(),
                order.status.to_string(),
                order.links.join("\n"),
                order.assigned_at.to_rfc3339(),
            ],
        )?;
    }
    Ok((output, snapshot.orders.len()))
}

pub fn payments_csv(snapshot: &Snapshot) -> AppResult<(Vec<u8>, usize)> {
    let mut output = Vec::new();
    header(
        &mut output,
        &[
            "id",
            "user_id",
            "platform",
            "status",
            "marketplace_order_no",
            "details",
            "links",
            "created_at",
            "paid_at",
        ],
    )?;
    for payment in &snapshot.payments {
        write_row(
            &mut output,
            &[
                payment.id.clone(),
                payment.user_id.to_string(),
                payment.platform.clone(),
                payment.status.to_string(),
                payment.marketplace_order_no.clone().unwrap_or_default(),
                payment.details.clone(),
                payment.links.join("\n"),
                payment.created_at.to_rfc3339(),
                payment.paid_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
            ],
        )?;
    }
    Ok((output, snapshot.payments.len()))
}

pub fn declines_csv(declines: &[Decline]) -> AppResult<(Vec<u8>, usize)> {
    let mut output = Vec::new();
    header(&mut output, &["user_id", "reason", "created_at"])?;
    for decline in declines {
        write_row(
            &mut output,
            &[
                decline.user_id.to_string(),
                decline.reason.clone(),
                decline.created_at.to_rfc3339(),
            ],
        )?;
    }
    Ok((output, declines.len()))
}
