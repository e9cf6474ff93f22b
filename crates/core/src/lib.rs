//! Blogger Flow Core
//!
//! Domain types and pure rules for the blogger collaboration workflow. This
//! crate has no dependencies on application-level code (chat transport,
//! database, configuration).
//!
//! ## Module Organization
//!
//! - `error` - Core error types (`CoreError`, `CoreResult`)
//! - `models` - Bloggers, orders, payments and their status vocabularies
//! - `links` - Proof link normalization and duplicate detection
//! - `segments` - Funnel segments and date-range statistics
//! - `validation` - Payout detail and admin argument checks

pub mod error;
pub mod links;
pub mod models;
pub mod segments;
pub mod validation;

// ── Error Types ────────────────────────────────────────────────────────
pub use error::{CoreError, CoreResult};

// ── Domain Models ──────────────────────────────────────────────────────
pub use models::{
    BloggerProfile, Decline, Draft, Order, OrderStatus, Payment, PaymentStatus, Snapshot, UserId,
};

// ── Rules ──────────────────────────────────────────────────────────────
pub use links::{extract_links, find_duplicates, normalize_url};
pub use segments::{compute_segments, funnel_stats, segment_members, FunnelStats, Segment};
pub use validation::{is_card_like, is_marketplace_order_no, parse_date, parse_date_range};
