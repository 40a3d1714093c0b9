use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{NaiveDate, NaiveDateTime};
use mealsub_core::calendar::days_between;
use mealsub_core::config::PolicyConfig;
use mealsub_deliveries::{store as deliveries, Delivery, DeliveryStatus};
use mealsub_orders::customers;
use mealsub_requests::pause::load_all_pause_windows;
use mealsub_requests::{store as requests, Decision, PauseSkipRequest, RequestFilter};
use rusqlite::Connection;
use tracing::info;

use crate::{
    approval,
    db::init_db,
    error::{Result, SchedulerError},
    generator, policy, projection,
    types::{ActivationReport, AdminRequestView, PauseInput, SubscriptionFilter, SubscriptionView},
};

/// Longest range `my_deliveries` will return, exclusive.
pub const MAX_DELIVERY_RANGE_DAYS: i64 = 31;

/// Shared handle over the scheduling database.
///
/// Every operation takes the connection lock for its whole duration, so
/// request handlers see each operation as atomic. "Today" and "now" are
/// always supplied by the caller.
///
/// Methods are synchronous and called straight from async handlers; each
/// holds the lock only for a few short SQLite statements.
#[derive(Clone)]
pub struct SchedulerHandle {
    conn: Arc<Mutex<Connection>>,
    policy: PolicyConfig,
}

impl SchedulerHandle {
    pub fn new(conn: Connection, policy: PolicyConfig) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            policy,
        })
    }

    pub fn policy(&self) -> PolicyConfig {
        self.policy
    }

    /// Run `f` with the locked connection. Seeding and tests use this for
    /// store functions the handle does not wrap.
    pub fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.lock();
        f(&*conn)
    }

    // ── customer operations ──────────────────────────────────────────────

    pub fn create_pause_request(
        &self,
        user_id: &str,
        input: PauseInput,
        now: NaiveDateTime,
    ) -> Result<PauseSkipRequest> {
        let conn = self.lock();
        policy::create_pause_request(&conn, self.policy, user_id, input, now)
    }

    pub fn create_skip_request(
        &self,
        user_id: &str,
        delivery_id: &str,
        reason: Option<String>,
        now: NaiveDateTime,
    ) -> Result<PauseSkipRequest> {
        let conn = self.lock();
        policy::create_skip_request(&conn, self.policy, user_id, delivery_id, reason, now)
    }

    pub fn create_withdraw_request(
        &self,
        user_id: &str,
        pause_request_id: &str,
    ) -> Result<PauseSkipRequest> {
        let conn = self.lock();
        policy::create_withdraw_request(&conn, user_id, pause_request_id)
    }

    pub fn withdraw_request(&self, user_id: &str, request_id: &str) -> Result<PauseSkipRequest> {
        let conn = self.lock();
        policy::withdraw_own_request(&conn, user_id, request_id)
    }

    pub fn my_requests(&self, user_id: &str, filter: RequestFilter) -> Result<Vec<PauseSkipRequest>> {
        let conn = self.lock();
        Ok(requests::list_for_user(&conn, user_id, filter)?)
    }

    /// The caller's deliveries in `[from, to]`, minus any inside a pause.
    pub fn my_deliveries(
        &self,
        user_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Delivery>> {
        if to < from {
            return Err(SchedulerError::Validation(
                "'to' must not be before 'from'".to_string(),
            ));
        }
        if days_between(from, to) >= MAX_DELIVERY_RANGE_DAYS {
            return Err(SchedulerError::Validation(format!(
                "Date range must be shorter than {MAX_DELIVERY_RANGE_DAYS} days"
            )));
        }
        let conn = self.lock();
        let rows = deliveries::list_for_user_range(&conn, user_id, from, to)?;
        without_paused(&conn, Some(user_id), rows)
    }

    pub fn my_subscriptions(&self, user_id: &str, today: NaiveDate) -> Result<Vec<SubscriptionView>> {
        let conn = self.lock();
        projection::list_subscription_views(&conn, Some(user_id), SubscriptionFilter::default(), today)
    }

    // ── admin operations ─────────────────────────────────────────────────

    /// Request queue with each requester's contact details attached.
    pub fn admin_requests(&self, filter: RequestFilter) -> Result<Vec<AdminRequestView>> {
        let conn = self.lock();
        let rows = requests::list_requests(&conn, filter)?;
        let ids: Vec<&str> = rows
            .iter()
            .map(|r| r.user_id.as_str())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let contacts = customers::get_customers(&conn, &ids)?;
        Ok(rows
            .into_iter()
            .map(|request| AdminRequestView {
                customer: contacts.get(&request.user_id).cloned(),
                request,
            })
            .collect())
    }

    pub fn decide_request(
        &self,
        request_id: &str,
        decision: Decision,
        admin_id: &str,
        admin_note: Option<&str>,
        today: NaiveDate,
    ) -> Result<PauseSkipRequest> {
        let conn = self.lock();
        approval::decide_request(&conn, request_id, decision, admin_id, admin_note, today)
    }

    pub fn move_order_to_kitchen(
        &self,
        order_id: &str,
        admin_id: &str,
        today: NaiveDate,
    ) -> Result<ActivationReport> {
        let conn = self.lock();
        generator::activate_order(&conn, order_id, admin_id, today)
    }

    /// Kitchen queue for `date`, minus deliveries inside a pause.
    pub fn kitchen_deliveries(
        &self,
        date: NaiveDate,
        status: Option<DeliveryStatus>,
        user_id: Option<&str>,
    ) -> Result<Vec<Delivery>> {
        let conn = self.lock();
        let rows = deliveries::list_for_date(&conn, date, status, user_id)?;
        without_paused(&conn, user_id, rows)
    }

    pub fn update_kitchen_status(
        &self,
        delivery_id: &str,
        next: DeliveryStatus,
        admin_id: &str,
        today: NaiveDate,
    ) -> Result<Delivery> {
        let conn = self.lock();
        let delivery = deliveries::update_kitchen_status(&conn, delivery_id, next, today, admin_id)?;
        info!(delivery_id, status = %next, admin_id, "kitchen status updated");
        Ok(delivery)
    }

    pub fn admin_subscriptions(
        &self,
        filter: SubscriptionFilter,
        today: NaiveDate,
    ) -> Result<Vec<SubscriptionView>> {
        let conn = self.lock();
        projection::list_subscription_views(&conn, None, filter, today)
    }

    // ── private helpers ──────────────────────────────────────────────────

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn without_paused(
    conn: &Connection,
    user_id: Option<&str>,
    rows: Vec<Delivery>,
) -> Result<Vec<Delivery>> {
    let windows = load_all_pause_windows(conn, user_id)?;
    Ok(rows
        .into_iter()
        .filter(|d| match d.subscription_id.as_deref() {
            Some(sub) if d.status == DeliveryStatus::Pending => !windows
                .get(&(d.user_id.clone(), sub.to_string()))
                .is_some_and(|w| w.contains(d.date)),
            _ => true,
        })
        .collect())
}
