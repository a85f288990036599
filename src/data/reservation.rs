use serde::{Deserialize, Serialize};

pub const SECONDS_PER_MINUTE: i64 = 60;
pub const SECONDS_PER_HOUR: i64 = 60 * SECONDS_PER_MINUTE;
pub const SECONDS_PER_DAY: i64 = 24 * SECONDS_PER_HOUR;

/// Unit a reservation's frequency is expressed in.
///
/// Anything that is not `seconds`, `minutes` or `hours` is read as days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TimeUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    /// Strict parse used to validate API input (days are not accepted there)
    pub fn from_api(s: &str) -> Option<Self> {
        match s {
            "seconds" => Some(TimeUnit::Seconds),
            "minutes" => Some(TimeUnit::Minutes),
            "hours" => Some(TimeUnit::Hours),
            _ => None,
        }
    }

    /// Lenient parse used for stored rows
    pub fn parse(s: &str) -> Self {
        Self::from_api(s).unwrap_or(TimeUnit::Days)
    }

    pub fn multiplier(&self) -> i64 {
        match self {
            TimeUnit::Seconds => 1,
            TimeUnit::Minutes => SECONDS_PER_MINUTE,
            TimeUnit::Hours => SECONDS_PER_HOUR,
            TimeUnit::Days => SECONDS_PER_DAY,
        }
    }

    /// Convert `amount` of this unit into seconds
    pub fn to_seconds(&self, amount: i64) -> i64 {
        amount.saturating_mul(self.multiplier())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeUnit::Seconds => "seconds",
            TimeUnit::Minutes => "minutes",
            TimeUnit::Hours => "hours",
            TimeUnit::Days => "days",
        }
    }
}

impl From<String> for TimeUnit {
    fn from(s: String) -> Self {
        TimeUnit::parse(&s)
    }
}

impl From<TimeUnit> for String {
    fn from(unit: TimeUnit) -> Self {
        unit.as_str().to_string()
    }
}

impl std::fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered check-in obligation for one (app, component) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: i64,
    pub app: String,
    pub component: String,
    pub owner: String,
    /// Comma-separated list of addresses to notify
    pub notify: String,
    /// Free-text message appended to alerts
    #[serde(default)]
    pub alert_message: String,
    pub frequency: i64,
    pub time_units: TimeUnit,
    /// Unix seconds of the last check-in
    pub last_checkin: i64,
    pub num_checkins: i64,
    /// Unix seconds of the first registration
    pub inserted_at: i64,
}

impl Reservation {
    /// Deadline window in seconds
    pub fn frequency_seconds(&self) -> i64 {
        self.time_units.to_seconds(self.frequency)
    }

    /// Individual notify addresses with surrounding whitespace removed
    pub fn recipients(&self) -> impl Iterator<Item = &str> {
        self.notify
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Registration request: the mutable half of a reservation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReservation {
    pub app: String,
    pub component: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub notify: String,
    #[serde(default, alias = "alert_msg")]
    pub alert_message: String,
    pub frequency: i64,
    pub time_units: TimeUnit,
}

impl NewReservation {
    pub fn new(
        app: impl Into<String>,
        component: impl Into<String>,
        frequency: i64,
        time_units: TimeUnit,
    ) -> Self {
        Self {
            app: app.into(),
            component: component.into(),
            owner: String::new(),
            notify: String::new(),
            alert_message: String::new(),
            frequency,
            time_units,
        }
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = owner.into();
        self
    }

    pub fn with_notify(mut self, notify: impl Into<String>) -> Self {
        self.notify = notify.into();
        self
    }

    pub fn with_alert_message(mut self, message: impl Into<String>) -> Self {
        self.alert_message = message.into();
        self
    }
}

/// Heartbeat from a monitored job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckIn {
    pub app: String,
    pub component: String,
    #[serde(default)]
    pub notes: String,
}

/// Removes a reservation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckOut {
    pub app: String,
    pub component: String,
}

/// Pauses alerting for a reservation by moving its last check-in forward
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snooze {
    pub app: String,
    pub component: String,
    pub duration: i64,
    pub time_units: String,
}

/// Which reservations a query should return
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReservationFilter {
    All,
    Key { app: String, component: String },
}

impl ReservationFilter {
    pub fn key(app: impl Into<String>, component: impl Into<String>) -> Self {
        ReservationFilter::Key {
            app: app.into(),
            component: component.into(),
        }
    }

    pub fn matches(&self, app: &str, component: &str) -> bool {
        match self {
            ReservationFilter::All => true,
            ReservationFilter::Key {
                app: a,
                component: c,
            } => a == app && c == component,
        }
    }
}

#[cfg(test)]
pub(crate) fn test_reservation(app: &str, component: &str) -> Reservation {
    Reservation {
        id: 1,
        app: app.to_string(),
        component: component.to_string(),
        owner: "owner@example.com".to_string(),
        notify: "oncall@example.com".to_string(),
        alert_message: String::new(),
        frequency: 5,
        time_units: TimeUnit::Minutes,
        last_checkin: 0,
        num_checkins: 0,
        inserted_at: 0,
    }
}
