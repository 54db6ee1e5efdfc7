//! Dashboard overview: record counts plus the signed-in administrator.

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, Utc};
use tracing::{debug, warn};

use super::notice::{Notice, STATS_FETCH_FAILED};
use super::screens::{live_session, ScreenError};
use crate::gateway::{DataGateway, EventFilter, GatewayResult, Subscription};
use crate::models::RecordStatus;
use crate::query::{Filter, Table};
use crate::session::{AuthContext, Session};

/// The five dashboard counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DashboardStats {
    pub total_patients: u64,
    /// Appointments from the start of today on
    pub upcoming_appointments: u64,
    /// Confirmed appointments during today
    pub confirmed_today: u64,
    pub pending_confirmations: u64,
    pub cancelled_appointments: u64,
}

/// Stored text of the first instant of `day`, comparable with
/// `appointment_date` values.
fn start_of(day: NaiveDate) -> String {
    day.and_time(NaiveTime::MIN)
        .format("%Y-%m-%dT%H:%M:%S")
        .to_string()
}

impl DashboardStats {
    /// Count everything, with `today` as the local calendar day.
    pub fn compute<G: DataGateway + ?Sized>(gateway: &G, today: NaiveDate) -> GatewayResult<Self> {
        let start_of_today = start_of(today);
        let start_of_tomorrow = start_of(today + Duration::days(1));
        let status = |s: RecordStatus| Filter::eq("status", s.as_str());

        let stats = Self {
            total_patients: gateway.count(Table::Patients, &Filter::All)?,
            upcoming_appointments: gateway.count(
                Table::Appointments,
                &Filter::gte("appointment_date", start_of_today.as_str()),
            )?,
            confirmed_today: gateway.count(
                Table::Appointments,
                &Filter::gte("appointment_date", start_of_today.as_str())
                    .and(Filter::lt("appointment_date", start_of_tomorrow))
                    .and(status(RecordStatus::Confirmed)),
            )?,
            pending_confirmations: gateway
                .count(Table::Appointments, &status(RecordStatus::Pending))?,
            cancelled_appointments: gateway
                .count(Table::Appointments, &status(RecordStatus::Cancelled))?,
        };
        debug!(?stats, "dashboard stats computed");
        Ok(stats)
    }
}

pub struct DashboardScreen<G: DataGateway> {
    gateway: G,
    session: Session,
    stats: Option<DashboardStats>,
    subscriptions: Vec<Subscription>,
    notices: Vec<Notice>,
}

impl<G: DataGateway> DashboardScreen<G> {
    /// Check the session, subscribe to both tables and compute the counters.
    pub fn mount(gateway: G, auth: &AuthContext, now: DateTime<Utc>) -> Result<Self, ScreenError> {
        let session = live_session(auth, now)?;
        let subscriptions = Table::ALL
            .iter()
            .map(|table| gateway.subscribe(*table, EventFilter::All))
            .collect();
        let mut screen = Self {
            gateway,
            session,
            stats: None,
            subscriptions,
            notices: Vec::new(),
        };
        screen.recompute(now.with_timezone(&Local).date_naive());
        Ok(screen)
    }

    /// Recompute the counters if either table changed.
    pub fn poll(&mut self, today: NaiveDate) -> bool {
        let changed = self
            .subscriptions
            .iter()
            .fold(0, |n, s| n + s.pending().count());
        if changed == 0 {
            return false;
        }
        self.recompute(today);
        true
    }

    pub fn recompute(&mut self, today: NaiveDate) {
        match DashboardStats::compute(&self.gateway, today) {
            Ok(stats) => self.stats = Some(stats),
            Err(e) => {
                warn!(error = %e, "dashboard stats failed");
                self.notices.push(Notice::error(STATS_FETCH_FAILED));
            }
        }
    }

    /// Counters; zero until the first successful computation.
    pub fn stats(&self) -> DashboardStats {
        self.stats.unwrap_or_default()
    }

    pub fn is_loading(&self) -> bool {
        self.stats.is_none()
    }

    pub fn admin_name(&self) -> &str {
        self.session.display_name()
    }

    pub fn admin_initials(&self) -> String {
        self.session.initials()
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn unmount(&mut self) {
        self.subscriptions.clear();
    }
}
