//! SQLite Database
//!
//! Embedded database for persistent storage using rusqlite with r2d2 connection pooling.
//!
//! Every entity lives in its own row. Operations that read and then write
//! (assignment, link submission, payout creation and confirmation) run inside
//! one `BEGIN IMMEDIATE` transaction so concurrent updates cannot interleave.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use blogger_flow_core::{
    find_duplicates, normalize_url, BloggerProfile, Decline, Draft, Order, OrderStatus, Payment,
    PaymentStatus, Snapshot, UserId,
};
use chrono::{DateTime, NaiveDate, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rand::Rng;
use rusqlite::{params, Connection, TransactionBehavior};
use tracing::warn;

use crate::models::conversation::ConversationState;
use crate::utils::error::{AppError, AppResult};

/// Type alias for the connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

/// Drafts kept per bot; older ones are pruned on save
pub const MAX_DRAFTS: usize = 50;

const DAY_FORMAT: &str = "%Y-%m-%d";

/// Outcome of a link submission.
#[derive(Debug, Clone)]
pub struct LinkSubmission {
    /// The order after the links were appended
    pub order: Order,
    /// Submitted links that were already known
    pub duplicates: Vec<String>,
}

/// Everything a blogger hands in with a payout request.
#[derive(Debug, Clone, Default)]
pub struct PaymentRequest {
    pub user_id: UserId,
    pub review_file_id: Option<String>,
    pub barcode_file_id: Option<String>,
    pub receipt_file_id: Option<String>,
    pub marketplace_order_no: Option<String>,
    pub details: String,
}

/// Raw audit row from the database
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub id: String,
    pub action: String,
    pub actor_id: UserId,
    pub payload: String,
    pub created_at: String,
}

/// Database service for managing SQLite operations
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Create an in-memory database for testing.
    ///
    /// The pool holds a single connection so every caller sees the same
    /// in-memory database.
    pub fn new_in_memory() -> AppResult<Self> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| AppError::database(format!("Failed to create connection pool: {}", e)))?;

        let db = Self { pool };
        db.init_schema()?;
        Ok(db)
    }

    /// Open (or create) the database file with connection pooling
    pub fn open(db_path: &Path) -> AppResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let manager = SqliteConnectionManager::file(db_path)
            .with_init(|conn| conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;"));
        let pool = Pool::builder()
            .max_size(10)
            .build(manager)
            .map_err(|e| AppError::database(format!("Failed to create connection pool: {}", e)))?;

        let db = Self { pool };
        db.init_schema()?;

        Ok(db)
    }

    /// Initialize the database schema
    fn init_schema(&self) -> AppResult<()> {
        let conn = self.get_connection()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS bloggers (
                user_id INTEGER PRIMARY KEY,
                display_name TEXT NOT NULL,
                followers TEXT NOT NULL,
                platforms TEXT NOT NULL DEFAULT '[]',
                theme TEXT NOT NULL,
                reach_file_id TEXT NOT NULL,
                referral_source TEXT,
                tg_username TEXT,
                consent_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS orders (
                user_id INTEGER PRIMARY KEY,
                platform TEXT NOT NULL,
                order_date TEXT NOT NULL,
                deadline TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'assigned',
                assigned_at TEXT NOT NULL,
                reminder_sent INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS order_links (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                url TEXT NOT NULL,
                normalized_url TEXT NOT NULL,
                duplicate INTEGER NOT NULL DEFAULT 0,
                submitted_at TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES orders(user_id)
            );

            CREATE INDEX IF NOT EXISTS idx_order_links_normalized ON order_links(normalized_url);
            CREATE INDEX IF NOT EXISTS idx_order_links_user ON order_links(user_id);

            CREATE TABLE IF NOT EXISTS payments (
                id TEXT PRIMARY KEY,
                user_id INTEGER NOT NULL,
                review_file_id TEXT,
                barcode_file_id TEXT,
                receipt_file_id TEXT,
                marketplace_order_no TEXT,
                details TEXT NOT NULL,
                links TEXT NOT NULL DEFAULT '[]',
                platform TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                created_at TEXT NOT NULL,
                admin_message_id INTEGER,
                admin_reminder_sent INTEGER NOT NULL DEFAULT 0,
                paid_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_payments_user ON payments(user_id);
            CREATE INDEX IF NOT EXISTS idx_payments_status ON payments(status);

            CREATE TABLE IF NOT EXISTS conversations (
                chat_id INTEGER PRIMARY KEY,
                state TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS declines (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                reason TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS drafts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                text TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS referrals (
                user_id INTEGER PRIMARY KEY,
                referrer TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_referrals_referrer ON referrals(referrer);

            CREATE TABLE IF NOT EXISTS media_hashes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                hash TEXT NOT NULL,
                user_id INTEGER NOT NULL,
                kind TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_media_hashes_hash ON media_hashes(hash);

            CREATE TABLE IF NOT EXISTS audit_log (
                id TEXT PRIMARY KEY,
                action TEXT NOT NULL,
                actor_id INTEGER NOT NULL,
                payload TEXT NOT NULL DEFAULT '{}',
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_audit_log_created ON audit_log(created_at DESC);",
        )?;

        Ok(())
    }

    /// Get a connection from the pool
    pub fn get_connection(&self) -> AppResult<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| AppError::database(format!("Failed to get connection: {}", e)))
    }

    /// Check if the database is healthy
    pub fn is_healthy(&self) -> bool {
        if let Ok(conn) = self.pool.get() {
            conn.query_row("SELECT 1", [], |_| Ok(())).is_ok()
        } else {
            false
        }
    }

    // ========================================================================
    // Blogger Profiles
    // ========================================================================

    /// Insert a completed profile. A user fills the profile only once.
    pub fn save_profile(&self, profile: &BloggerProfile) -> AppResult<()> {
        let mut conn = self.get_connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if profile_exists(&tx, profile.user_id)? {
            return Err(AppError::validation("Profile is already filled"));
        }

        tx.execute(
            "INSERT INTO bloggers (user_id, display_name, followers, platforms, theme, reach_file_id,
                                   referral_source, tg_username, consent_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                profile.user_id,
                profile.display_name,
                profile.followers,
                serde_json::to_string(&profile.platforms)?,
                profile.theme,
                profile.reach_file_id,
                profile.referral_source,
                profile.tg_username,
                profile.consent_at.to_rfc3339(),
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Get a blogger profile by user id
    pub fn get_profile(&self, user_id: UserId) -> AppResult<Option<BloggerProfile>> {
        let conn = self.get_connection()?;
        let result = conn.query_row(
            "SELECT user_id, display_name, followers, platforms, theme, reach_file_id,
                    referral_source, tg_username, consent_at
             FROM bloggers WHERE user_id = ?1",
            params![user_id],
            ProfileRow::from_row,
        );

        match result {
            Ok(row) => Ok(Some(row.into_model()?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(AppError::database(e.to_string())),
        }
    }

    /// Whether the user has completed the profile
    pub fn has_profile(&self, user_id: UserId) -> AppResult<bool> {
        let conn = self.get_connection()?;
        profile_exists(&conn, user_id)
    }

    /// All profiles ordered by user id
    pub fn list_profiles(&self) -> AppResult<Vec<BloggerProfile>> {
        let conn = self.get_connection()?;
        load_profiles(&conn)
    }

    /// Profiles whose display name contains `fragment`, case-insensitively.
    pub fn find_profiles_by_name(
        &self,
        fragment: &str,
        limit: usize,
    ) -> AppResult<Vec<BloggerProfile>> {
        let needle = fragment.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        // SQLite's LOWER() only folds ASCII, so match in Rust.
        Ok(self
            .list_profiles()?
            .into_iter()
            .filter(|p| p.display_name.to_lowercase().contains(&needle))
            .take(limit)
            .collect())
    }

    // ========================================================================
    // Orders
    // ========================================================================

    /// Assign the single order for `user_id` on the least-loaded platform.
    ///
    /// Ties go to the platform listed first. Fails when the user already has
    /// an order.
    pub fn assign_order(
        &self,
        user_id: UserId,
        platforms: &[String],
        order_date: NaiveDate,
        deadline: NaiveDate,
        now: DateTime<Utc>,
    ) -> AppResult<Order> {
        let first = platforms
            .first()
            .ok_or_else(|| AppError::config("No platforms configured"))?;

        let mut conn = self.get_connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if load_order(&tx, user_id)?.is_some() {
            return Err(AppError::validation("Order is already assigned"));
        }

        let mut counts: HashMap<String, i64> = HashMap::new();
        {
            let mut stmt = tx.prepare("SELECT platform, COUNT(*) FROM orders GROUP BY platform")?;
            let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;
            for row in rows {
                let (platform, count) = row?;
                counts.insert(platform, count);
            }
        }

        let mut platform = first;
        let mut best = counts.get(first).copied().unwrap_or(0);
        for candidate in platforms.iter().skip(1) {
            let load = counts.get(candidate).copied().unwrap_or(0);
            if load < best {
                platform = candidate;
                best = load;
            }
        }

        let order = Order {
            user_id,
            platform: platform.clone(),
            order_date,
            deadline,
            status: OrderStatus::Assigned,
            links: Vec::new(),
            assigned_at: now,
            reminder_sent: false,
        };

        tx.execute(
            "INSERT INTO orders (user_id, platform, order_date, deadline, status, assigned_at, reminder_sent)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)",
            params![
                order.user_id,
                order.platform,
                order.order_date.format(DAY_FORMAT).to_string(),
                order.deadline.format(DAY_FORMAT).to_string(),
                order.status.as_str(),
                order.assigned_at.to_rfc3339(),
            ],
        )?;
        tx.commit()?;

        Ok(order)
    }

    /// Get a user's order with its links
    pub fn get_order(&self, user_id: UserId) -> AppResult<Option<Order>> {
        let conn = self.get_connection()?;
        load_order(&conn, user_id)
    }

    /// All orders with their links, ordered by user id
    pub fn list_orders(&self) -> AppResult<Vec<Order>> {
        let conn = self.get_connection()?;
        load_orders(&conn)
    }

    /// Append proof links to the user's order.
    ///
    /// Links are normalized, compared against every link stored so far
    /// (any user, own earlier submissions included) and appended. The order
    /// moves to `under_review` when repeats are found, otherwise to
    /// `links_received`; an order already under review stays there.
    pub fn submit_links(
        &self,
        user_id: UserId,
        links: &[String],
        now: DateTime<Utc>,
    ) -> AppResult<LinkSubmission> {
        let normalized: Vec<String> = links.iter().map(|l| normalize_url(l)).collect();
        if normalized.is_empty() {
            return Err(AppError::validation("No links to submit"));
        }

        let mut conn = self.get_connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let order = load_order(&tx, user_id)?
            .ok_or_else(|| AppError::not_found(format!("order for user {}", user_id)))?;
        if !order.status.accepts_links() {
            return Err(AppError::validation(format!(
                "Order in status {} does not accept links",
                order.status
            )));
        }

        let mut known = HashSet::new();
        {
            let mut stmt = tx.prepare("SELECT 1 FROM order_links WHERE normalized_url = ?1 LIMIT 1")?;
            for link in &normalized {
                if stmt.exists(params![link])? {
                    known.insert(link.clone());
                }
            }
        }
        let duplicates = find_duplicates(&normalized, &known);

        let submitted_at = now.to_rfc3339();
        for (raw, link) in links.iter().zip(&normalized) {
            tx.execute(
                "INSERT INTO order_links (user_id, url, normalized_url, duplicate, submitted_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![user_id, raw.trim(), link, known.contains(link), submitted_at],
            )?;
        }

        let status = order.status.after_submission(!duplicates.is_empty());
        tx.execute(
            "UPDATE orders SET status = ?2 WHERE user_id = ?1",
            params![user_id, status.as_str()],
        )?;

        let order = load_order(&tx, user_id)?
            .ok_or_else(|| AppError::internal("order vanished during link submission"))?;
        tx.commit()?;

        Ok(LinkSubmission { order, duplicates })
    }

    /// Record a decline reason and mark the order declined.
    ///
    /// Only an `assigned` order can be declined.
    pub fn decline_order(&self, user_id: UserId, reason: &str, now: DateTime<Utc>) -> AppResult<()> {
        let mut conn = self.get_connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let order = load_order(&tx, user_id)?
            .ok_or_else(|| AppError::not_found(format!("No order for user {}", user_id)))?;
        if order.status != OrderStatus::Assigned {
            return Err(AppError::validation(format!(
                "Order in status {} cannot be declined",
                order.status
            )));
        }

        tx.execute(
            "INSERT INTO declines (user_id, reason, created_at) VALUES (?1, ?2, ?3)",
            params![user_id, reason, now.to_rfc3339()],
        )?;
        tx.execute(
            "UPDATE orders SET status = 'declined' WHERE user_id = ?1",
            params![user_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// All recorded declines, oldest first
    pub fn list_declines(&self) -> AppResult<Vec<Decline>> {
        let conn = self.get_connection()?;
        let mut stmt =
            conn.prepare("SELECT user_id, reason, created_at FROM declines ORDER BY id")?;
        let rows: Vec<(UserId, String, String)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
            .collect::<Result<_, _>>()?;

        rows.into_iter()
            .map(|(user_id, reason, created_at)| {
                Ok(Decline {
                    user_id,
                    reason,
                    created_at: parse_timestamp(&created_at)?,
                })
            })
            .collect()
    }

    // ========================================================================
    // Payments
    // ========================================================================

    /// Create a payout request.
    ///
    /// Requires an order with submitted links and no other active payment
    /// for the user. Links and platform are copied from the order; the
    /// payment starts `under_review` when the order is under review.
    pub fn create_payment(&self, request: &PaymentRequest, now: DateTime<Utc>) -> AppResult<Payment> {
        let mut conn = self.get_connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let order = load_order(&tx, request.user_id)?
            .ok_or_else(|| AppError::not_found(format!("order for user {}", request.user_id)))?;
        if !order.status.allows_payout() {
            return Err(AppError::validation(format!(
                "Order in status {} cannot be paid out",
                order.status
            )));
        }
        if active_payment(&tx, request.user_id)?.is_some() {
            return Err(AppError::validation("A payout request is already active"));
        }

        let id = loop {
            let candidate = generate_payment_id();
            if load_payment(&tx, &candidate)?.is_none() {
                break candidate;
            }
        };

        let payment = Payment {
            id,
            user_id: request.user_id,
            review_file_id: request.review_file_id.clone(),
            barcode_file_id: request.barcode_file_id.clone(),
            receipt_file_id: request.receipt_file_id.clone(),
            marketplace_order_no: request.marketplace_order_no.clone(),
            details: request.details.clone(),
            links: order.links.clone(),
            platform: order.platform.clone(),
            status: PaymentStatus::for_order(order.status),
            created_at: now,
            admin_message_id: None,
            admin_reminder_sent: false,
            paid_at: None,
        };

        tx.execute(
            "INSERT INTO payments (id, user_id, review_file_id, barcode_file_id, receipt_file_id,
                                   marketplace_order_no, details, links, platform, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                payment.id,
                payment.user_id,
                payment.review_file_id,
                payment.barcode_file_id,
                payment.receipt_file_id,
                payment.marketplace_order_no,
                payment.details,
                serde_json::to_string(&payment.links)?,
                payment.platform,
                payment.status.as_str(),
                payment.created_at.to_rfc3339(),
            ],
        )?;
        tx.commit()?;

        Ok(payment)
    }

    /// Get a payment by id
    pub fn get_payment(&self, id: &str) -> AppResult<Option<Payment>> {
        let conn = self.get_connection()?;
        load_payment(&conn, id)
    }

    /// The user's pending or under-review payment, if any
    pub fn active_payment_for(&self, user_id: UserId) -> AppResult<Option<Payment>> {
        let conn = self.get_connection()?;
        active_payment(&conn, user_id)
    }

    /// All payments, oldest first
    pub fn list_payments(&self) -> AppResult<Vec<Payment>> {
        let conn = self.get_connection()?;
        load_payments(&conn, "1 = 1", params![])
    }

    /// Pending and under-review payments, oldest first
    pub fn list_unpaid(&self) -> AppResult<Vec<Payment>> {
        let conn = self.get_connection()?;
        load_payments(&conn, "status IN ('pending', 'under_review')", params![])
    }

    /// Remember the message id of the admin's payout card
    pub fn set_payment_admin_message(&self, id: &str, message_id: i64) -> AppResult<()> {
        let conn = self.get_connection()?;
        let updated = conn.execute(
            "UPDATE payments SET admin_message_id = ?2 WHERE id = ?1",
            params![id, message_id],
        )?;
        if updated == 0 {
            return Err(AppError::not_found(format!("payment {}", id)));
        }
        Ok(())
    }

    /// Mark a payment paid and its order completed, atomically.
    pub fn confirm_payment(&self, id: &str, now: DateTime<Utc>) -> AppResult<Payment> {
        let mut conn = self.get_connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let payment =
            load_payment(&tx, id)?.ok_or_else(|| AppError::not_found(format!("payment {}", id)))?;
        if !payment.status.is_active() {
            return Err(AppError::validation(format!("Payment {} is already paid", id)));
        }

        tx.execute(
            "UPDATE payments SET status = 'paid', paid_at = ?2 WHERE id = ?1",
            params![id, now.to_rfc3339()],
        )?;
        tx.execute(
            "UPDATE orders SET status = 'completed' WHERE user_id = ?1",
            params![payment.user_id],
        )?;

        let payment = load_payment(&tx, id)?
            .ok_or_else(|| AppError::internal("payment vanished during confirmation"))?;
        tx.commit()?;
        Ok(payment)
    }

    // ========================================================================
    // Conversations
    // ========================================================================

    /// Current wizard state for a chat; idle when none is stored.
    pub fn get_conversation(&self, chat_id: i64) -> AppResult<ConversationState> {
        let conn = self.get_connection()?;
        let result = conn.query_row(
            "SELECT state FROM conversations WHERE chat_id = ?1",
            params![chat_id],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(state) => Ok(state),
                Err(e) => {
                    warn!(chat_id, error = %e, "discarding unreadable conversation state");
                    Ok(ConversationState::Idle)
                }
            },
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(ConversationState::Idle),
            Err(e) => Err(AppError::database(e.to_string())),
        }
    }

    /// Store the wizard state for a chat
    pub fn set_conversation(&self, chat_id: i64, state: &ConversationState) -> AppResult<()> {
        if state.is_idle() {
            return self.clear_conversation(chat_id);
        }
        let conn = self.get_connection()?;
        conn.execute(
            "INSERT INTO conversations (chat_id, state, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(chat_id) DO UPDATE SET state = ?2, updated_at = ?3",
            params![chat_id, serde_json::to_string(state)?, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Drop the wizard state for a chat
    pub fn clear_conversation(&self, chat_id: i64) -> AppResult<()> {
        let conn = self.get_connection()?;
        conn.execute(
            "DELETE FROM conversations WHERE chat_id = ?1",
            params![chat_id],
        )?;
        Ok(())
    }

    // ========================================================================
    // Drafts
    // ========================================================================

    /// Save a broadcast draft, keeping the newest `MAX_DRAFTS`
    pub fn save_draft(&self, text: &str, now: DateTime<Utc>) -> AppResult<Draft> {
        let mut conn = self.get_connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        tx.execute(
            "INSERT INTO drafts (text, created_at) VALUES (?1, ?2)",
            params![text, now.to_rfc3339()],
        )?;
        let id = tx.last_insert_rowid();
        tx.execute(
            "DELETE FROM drafts WHERE id NOT IN (SELECT id FROM drafts ORDER BY id DESC LIMIT ?1)",
            params![MAX_DRAFTS as i64],
        )?;
        tx.commit()?;

        Ok(Draft {
            id,
            text: text.to_string(),
            created_at: now,
        })
    }

    /// Newest drafts first
    pub fn list_drafts(&self, limit: usize) -> AppResult<Vec<Draft>> {
        let conn = self.get_connection()?;
        let mut stmt =
            conn.prepare("SELECT id, text, created_at FROM drafts ORDER BY id DESC LIMIT ?1")?;
        let rows: Vec<(i64, String, String)> = stmt
            .query_map(params![limit as i64], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })?
            .collect::<Result<_, _>>()?;

        rows.into_iter()
            .map(|(id, text, created_at)| {
                Ok(Draft {
                    id,
                    text,
                    created_at: parse_timestamp(&created_at)?,
                })
            })
            .collect()
    }

    // ========================================================================
    // Referrals
    // ========================================================================

    /// Record who referred `user_id`. The first referrer wins and
    /// self-referrals are ignored. Returns whether a row was written.
    pub fn record_referral(
        &self,
        user_id: UserId,
        referrer: &str,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let referrer = referrer.trim();
        if referrer.is_empty() || referrer == user_id.to_string() {
            return Ok(false);
        }
        let conn = self.get_connection()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO referrals (user_id, referrer, created_at) VALUES (?1, ?2, ?3)",
            params![user_id, referrer, now.to_rfc3339()],
        )?;
        Ok(inserted > 0)
    }

    /// Who referred `user_id`, if anyone
    pub fn referral_of(&self, user_id: UserId) -> AppResult<Option<String>> {
        let conn = self.get_connection()?;
        let result = conn.query_row(
            "SELECT referrer FROM referrals WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        );

        match result {
            Ok(referrer) => Ok(Some(referrer)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(AppError::database(e.to_string())),
        }
    }

    /// Referrers with the most invited users
    pub fn top_referrers(&self, limit: usize) -> AppResult<Vec<(String, usize)>> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(
            "SELECT referrer, COUNT(*) AS invited FROM referrals
             GROUP BY referrer ORDER BY invited DESC, referrer ASC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize))
            })?
            .collect::<Result<_, _>>()?;
        Ok(rows)
    }

    // ========================================================================
    // Media Hashes
    // ========================================================================

    /// Whether a file with this content hash was seen before
    pub fn is_media_known(&self, hash: &str) -> AppResult<bool> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare("SELECT 1 FROM media_hashes WHERE hash = ?1 LIMIT 1")?;
        Ok(stmt.exists(params![hash])?)
    }

    /// Remember a file's content hash
    pub fn record_media(
        &self,
        hash: &str,
        user_id: UserId,
        kind: &str,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let conn = self.get_connection()?;
        conn.execute(
            "INSERT INTO media_hashes (hash, user_id, kind, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![hash, user_id, kind, now.to_rfc3339()],
        )?;
        Ok(())
    }

    // ========================================================================
    // Audit Log
    // ========================================================================

    /// Append an audit record
    pub fn audit(&self, action: &str, actor_id: UserId, payload: &serde_json::Value) -> AppResult<()> {
        let conn = self.get_connection()?;
        conn.execute(
            "INSERT INTO audit_log (id, action, actor_id, payload, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                uuid::Uuid::new_v4().to_string(),
                action,
                actor_id,
                payload.to_string(),
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Audit records for one action, oldest first
    pub fn audit_entries(&self, action: &str) -> AppResult<Vec<AuditEntry>> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(
            "SELECT id, action, actor_id, payload, created_at FROM audit_log
             WHERE action = ?1 ORDER BY created_at, rowid",
        )?;
        let rows = stmt
            .query_map(params![action], |row| {
                Ok(AuditEntry {
                    id: row.get(0)?,
                    action: row.get(1)?,
                    actor_id: row.get(2)?,
                    payload: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })?
            .collect::<Result<_, _>>()?;
        Ok(rows)
    }

    // ========================================================================
    // Reminders
    // ========================================================================

    /// Assigned orders past their deadline that have not been reminded
    pub fn due_order_reminders(&self, today: NaiveDate) -> AppResult<Vec<Order>> {
        Ok(self
            .list_orders()?
            .into_iter()
            .filter(|o| o.reminder_due(today))
            .collect())
    }

    pub fn mark_order_reminded(&self, user_id: UserId) -> AppResult<()> {
        let conn = self.get_connection()?;
        conn.execute(
            "UPDATE orders SET reminder_sent = 1 WHERE user_id = ?1",
            params![user_id],
        )?;
        Ok(())
    }

    /// Pending payments requested at or before `cutoff` with no admin alert yet
    pub fn overdue_payments(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<Payment>> {
        let conn = self.get_connection()?;
        let pending = load_payments(
            &conn,
            "status = 'pending' AND admin_reminder_sent = 0",
            params![],
        )?;
        Ok(pending
            .into_iter()
            .filter(|p| p.created_at <= cutoff)
            .collect())
    }

    pub fn mark_payment_reminded(&self, id: &str) -> AppResult<()> {
        let conn = self.get_connection()?;
        conn.execute(
            "UPDATE payments SET admin_reminder_sent = 1 WHERE id = ?1",
            params![id],
        )?;
        Ok(())
    }

    // ========================================================================
    // Snapshot
    // ========================================================================

    /// Every profile, order and payment, read on one connection.
    pub fn load_snapshot(&self) -> AppResult<Snapshot> {
        let conn = self.get_connection()?;
        Ok(Snapshot {
            bloggers: load_profiles(&conn)?,
            orders: load_orders(&conn)?,
            payments: load_payments(&conn, "1 = 1", params![])?,
        })
    }
}

// ============================================================================
// Row helpers (take a connection so transactions and reads share it)
// ============================================================================

struct ProfileRow {
    user_id: UserId,
    display_name: String,
    followers: String,
    platforms: String,
    theme: String,
    reach_file_id: String,
    referral_source: Option<String>,
    tg_username: Option<String>,
    consent_at: String,
}

impl ProfileRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            user_id: row.get(0)?,
            display_name: row.get(1)?,
            followers: row.get(2)?,
            platforms: row.get(3)?,
            theme: row.get(4)?,
            reach_file_id: row.get(5)?,
            referral_source: row.get(6)?,
            tg_username: row.get(7)?,
            consent_at: row.get(8)?,
        })
    }

    fn into_model(self) -> AppResult<BloggerProfile> {
        Ok(BloggerProfile {
            user_id: self.user_id,
            display_name: self.display_name,
            followers: self.followers,
            platforms: serde_json::from_str(&self.platforms)?,
            theme: self.theme,
            reach_file_id: self.reach_file_id,
            referral_source: self.referral_source,
            tg_username: self.tg_username,
            consent_at: parse_timestamp(&self.consent_at)?,
        })
    }
}

struct OrderRow {
    user_id: UserId,
    platform: String,
    order_date: String,
    deadline: String,
    status: String,
    assigned_at: String,
    reminder_sent: bool,
}

impl OrderRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            user_id: row.get(0)?,
            platform: row.get(1)?,
            order_date: row.get(2)?,
            deadline: row.get(3)?,
            status: row.get(4)?,
            assigned_at: row.get(5)?,
            reminder_sent: row.get(6)?,
        })
    }

    fn into_model(self, links: Vec<String>) -> AppResult<Order> {
        Ok(Order {
            user_id: self.user_id,
            platform: self.platform,
            order_date: parse_day(&self.order_date)?,
            deadline: parse_day(&self.deadline)?,
            status: self.status.parse()?,
            links,
            assigned_at: parse_timestamp(&self.assigned_at)?,
            reminder_sent: self.reminder_sent,
        })
    }
}

struct PaymentRow {
    id: String,
    user_id: UserId,
    review_file_id: Option<String>,
    barcode_file_id: Option<String>,
    receipt_file_id: Option<String>,
    marketplace_order_no: Option<String>,
    details: String,
    links: String,
    platform: String,
    status: String,
    created_at: String,
    admin_message_id: Option<i64>,
    admin_reminder_sent: bool,
    paid_at: Option<String>,
}

impl PaymentRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            review_file_id: row.get(2)?,
            barcode_file_id: row.get(3)?,
            receipt_file_id: row.get(4)?,
            marketplace_order_no: row.get(5)?,
            details: row.get(6)?,
            links: row.get(7)?,
            platform: row.get(8)?,
            status: row.get(9)?,
            created_at: row.get(10)?,
            admin_message_id: row.get(11)?,
            admin_reminder_sent: row.get(12)?,
            paid_at: row.get(13)?,
        })
    }

    fn into_model(self) -> AppResult<Payment> {
        Ok(Payment {
            id: self.id,
            user_id: self.user_id,
            review_file_id: self.review_file_id,
            barcode_file_id: self.barcode_file_id,
            receipt_file_id: self.receipt_file_id,
            marketplace_order_no: self.marketplace_order_no,
            details: self.details,
            links: serde_json::from_str(&self.links)?,
            platform: self.platform,
            status: self.status.parse()?,
            created_at: parse_timestamp(&self.created_at)?,
            admin_message_id: self.admin_message_id,
            admin_reminder_sent: self.admin_reminder_sent,
            paid_at: self.paid_at.as_deref().map(parse_timestamp).transpose()?,
        })
    }
}

const PAYMENT_COLUMNS: &str = "id, user_id, review_file_id, barcode_file_id, receipt_file_id,
    marketplace_order_no, details, links, platform, status, created_at, admin_message_id,
    admin_reminder_sent, paid_at";

fn profile_exists(conn: &Connection, user_id: UserId) -> AppResult<bool> {
    let mut stmt = conn.prepare("SELECT 1 FROM bloggers WHERE user_id = ?1")?;
    Ok(stmt.exists(params![user_id])?)
}

fn load_profiles(conn: &Connection) -> AppResult<Vec<BloggerProfile>> {
    let mut stmt = conn.prepare(
        "SELECT user_id, display_name, followers, platforms, theme, reach_file_id,
                referral_source, tg_username, consent_at
         FROM bloggers ORDER BY user_id",
    )?;
    let rows: Vec<ProfileRow> = stmt
        .query_map([], ProfileRow::from_row)?
        .collect::<Result<_, _>>()?;
    rows.into_iter().map(ProfileRow::into_model).collect()
}

fn load_links(conn: &Connection, user_id: UserId) -> AppResult<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT normalized_url FROM order_links WHERE user_id = ?1 ORDER BY id")?;
    let links = stmt
        .query_map(params![user_id], |row| row.get(0))?
        .collect::<Result<_, _>>()?;
    Ok(links)
}

fn load_order(conn: &Connection, user_id: UserId) -> AppResult<Option<Order>> {
    let result = conn.query_row(
        "SELECT user_id, platform, order_date, deadline, status, assigned_at, reminder_sent
         FROM orders WHERE user_id = ?1",
        params![user_id],
        OrderRow::from_row,
    );

    match result {
        Ok(row) => {
            let links = load_links(conn, user_id)?;
            Ok(Some(row.into_model(links)?))
        }
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(AppError::database(e.to_string())),
    }
}

fn load_orders(conn: &Connection) -> AppResult<Vec<Order>> {
    let mut links_by_user: HashMap<UserId, Vec<String>> = HashMap::new();
    {
        let mut stmt = conn.prepare("SELECT user_id, normalized_url FROM order_links ORDER BY id")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, UserId>(0)?, row.get::<_, String>(1)?)))?;
        for row in rows {
            let (user_id, link) = row?;
            links_by_user.entry(user_id).or_default().push(link);
        }
    }

    let mut stmt = conn.prepare(
        "SELECT user_id, platform, order_date, deadline, status, assigned_at, reminder_sent
         FROM orders ORDER BY user_id",
    )?;
    let rows: Vec<OrderRow> = stmt
        .query_map([], OrderRow::from_row)?
        .collect::<Result<_, _>>()?;

    rows.into_iter()
        .map(|row| {
            let links = links_by_user.remove(&row.user_id).unwrap_or_default();
            row.into_model(links)
        })
        .collect()
}

fn load_payment(conn: &Connection, id: &str) -> AppResult<Option<Payment>> {
    let result = conn.query_row(
        &format!("SELECT {} FROM payments WHERE id = ?1", PAYMENT_COLUMNS),
        params![id],
        PaymentRow::from_row,
    );

    match result {
        Ok(row) => Ok(Some(row.into_model()?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(AppError::database(e.to_string())),
    }
}

fn load_payments(
    conn: &Connection,
    filter: &str,
    params: &[&dyn rusqlite::ToSql],
) -> AppResult<Vec<Payment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM payments WHERE {} ORDER BY created_at, id",
        PAYMENT_COLUMNS, filter
    ))?;
    let rows: Vec<PaymentRow> = stmt
        .query_map(params, PaymentRow::from_row)?
        .collect::<Result<_, _>>()?;
    rows.into_iter().map(PaymentRow::into_model).collect()
}

fn active_payment(conn: &Connection, user_id: UserId) -> AppResult<Option<Payment>> {
    Ok(load_payments(
        conn,
        "user_id = ?1 AND status IN ('pending', 'under_review')",
        params![user_id],
    )?
    .into_iter()
    .next())
}

/// `PAY` followed by six uppercase hex digits
fn generate_payment_id() -> String {
    let value: u32 = rand::thread_rng().gen_range(0..0x100_0000);
    format!("PAY{:06X}", value)
}

fn parse_timestamp(raw: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::database(format!("Invalid timestamp '{}': {}", raw, e)))
}

fn parse_day(raw: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(raw, DAY_FORMAT)
        .map_err(|e| AppError::database(format!("Invalid date '{}': {}", raw, e)))
}
