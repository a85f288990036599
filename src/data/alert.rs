use serde::{Deserialize, Serialize};

/// Audit entry written after alerters fired for a reservation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub app: String,
    pub component: String,
    /// Unix seconds
    pub alert_time: i64,
    /// Names of the alerters that delivered
    pub alerters: Vec<String>,
}

impl AlertRecord {
    /// Alerter names as persisted: comma-joined
    pub fn alerters_csv(&self) -> String {
        self.alerters.join(",")
    }

    pub fn parse_alerters(csv: &str) -> Vec<String> {
        csv.split(',')
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    }
}

/// Append-only tables subject to retention cleanup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTable {
    Housekeeping,
    Alerts,
}

impl LogTable {
    pub fn name(&self) -> &'static str {
        match self {
            LogTable::Housekeeping => "housekeeping",
            LogTable::Alerts => "alerts",
        }
    }
}

/// One row of the housekeeping (check-in history) table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HousekeepingEntry {
    pub app: String,
    pub component: String,
    pub notes: String,
    pub checkin_time: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alerters_csv() {
        let record = AlertRecord {
            app: "a".to_string(),
            component: "b".to_string(),
            alert_time: 10,
            alerters: vec!["SMTP".to_string(), "PagerDuty".to_string()],
        };
        assert_eq!(record.alerters_csv(), "SMTP,PagerDuty");
        assert_eq!(AlertRecord::parse_alerters("SMTP,PagerDuty"), record.alerters);
        assert!(AlertRecord::parse_alerters("").is_empty());
    }
}
