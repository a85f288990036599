use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{
    heartbeat_reservation, Store, StoreError, HEARTBEAT_NOTES, INITIAL_GRACE_SECS, LOCK_LEASE,
    LOCK_POLL_INTERVAL,
};
use crate::data::{
    AlertRecord, CheckIn, HousekeepingEntry, LogTable, NewReservation, Node, Reservation,
    ReservationFilter,
};

struct LockEntry {
    holder: String,
    acquired_at: Instant,
}

#[derive(Default)]
struct Tables {
    reservations: Vec<Reservation>,
    next_reservation_id: i64,
    nodes: Vec<Node>,
    housekeeping: Vec<HousekeepingEntry>,
    alerts: Vec<AlertRecord>,
}

/// In-process store. Locks are only exclusive between engines sharing the
/// same instance.
pub struct MemoryStore {
    tables: RwLock<Tables>,
    locks: RwLock<HashMap<String, LockEntry>>,
    lease: Duration,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_lease(LOCK_LEASE)
    }

    pub fn with_lease(lease: Duration) -> Self {
        Self {
            tables: RwLock::new(Tables {
                next_reservation_id: 1,
                ..Default::default()
            }),
            locks: RwLock::new(HashMap::new()),
            lease,
        }
    }

    fn try_lock(&self, name: &str, holder: &str) -> bool {
        let mut locks = self.locks.write();
        let now = Instant::now();

        match locks.get(name) {
            Some(entry) if entry.holder == holder => true,
            Some(entry) if now.duration_since(entry.acquired_at) < self.lease => false,
            _ => {
                locks.insert(
                    name.to_string(),
                    LockEntry {
                        holder: holder.to_string(),
                        acquired_at: now,
                    },
                );
                true
            }
        }
    }

    fn insert_reservation(tables: &mut Tables, new: &NewReservation, now: i64) {
        let id = tables.next_reservation_id;
        tables.next_reservation_id += 1;
        tables.reservations.push(Reservation {
            id,
            app: new.app.clone(),
            component: new.component.clone(),
            owner: new.owner.clone(),
            notify: new.notify.clone(),
            alert_message: new.alert_message.clone(),
            frequency: new.frequency,
            time_units: new.time_units,
            last_checkin: now + INITIAL_GRACE_SECS,
            num_checkins: 0,
            inserted_at: now,
        });
    }

    fn find_mut<'a>(
        tables: &'a mut Tables,
        app: &str,
        component: &str,
    ) -> Option<&'a mut Reservation> {
        tables
            .reservations
            .iter_mut()
            .find(|r| r.app == app && r.component == component)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn acquire_lock(
        &self,
        name: &str,
        holder: &str,
        timeout: Duration,
    ) -> Result<bool, StoreError> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.try_lock(name, holder) {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(LOCK_POLL_INTERVAL).await;
        }
    }

    async fn release_lock(&self, name: &str, holder: &str) -> Result<bool, StoreError> {
        let mut locks = self.locks.write();
        match locks.get(name) {
            Some(entry) if entry.holder == holder => {
                locks.remove(name);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_nodes(&self) -> Result<Vec<Node>, StoreError> {
        Ok(self.tables.read().nodes.clone())
    }

    async fn upsert_node(&self, node: &Node) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        if !tables.nodes.iter().any(|n| n.ip_address == node.ip_address) {
            tables.nodes.push(node.clone());
        }
        Ok(())
    }

    async fn delete_node(&self, ip_address: &str) -> Result<(), StoreError> {
        self.tables
            .write()
            .nodes
            .retain(|n| n.ip_address != ip_address);
        Ok(())
    }

    async fn list_reservations(
        &self,
        filter: &ReservationFilter,
    ) -> Result<Vec<Reservation>, StoreError> {
        let tables = self.tables.read();
        Ok(tables
            .reservations
            .iter()
            .filter(|r| filter.matches(&r.app, &r.component))
            .cloned()
            .collect())
    }

    async fn store_reservation(
        &self,
        reservation: &NewReservation,
        now: i64,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        match Self::find_mut(&mut tables, &reservation.app, &reservation.component) {
            Some(existing) => {
                existing.notify = reservation.notify.clone();
                existing.alert_message = reservation.alert_message.clone();
                existing.frequency = reservation.frequency;
                existing.time_units = reservation.time_units;
            }
            None => Self::insert_reservation(&mut tables, reservation, now),
        }
        Ok(())
    }

    async fn check_in(&self, app: &str, component: &str, now: i64) -> Result<bool, StoreError> {
        let mut tables = self.tables.write();
        Ok(match Self::find_mut(&mut tables, app, component) {
            Some(res) => {
                res.last_checkin = now;
                res.num_checkins += 1;
                true
            }
            None => false,
        })
    }

    async fn log_housekeeping(&self, checkin: &CheckIn, now: i64) -> Result<(), StoreError> {
        self.tables.write().housekeeping.push(HousekeepingEntry {
            app: checkin.app.clone(),
            component: checkin.component.clone(),
            notes: checkin.notes.clone(),
            checkin_time: now,
        });
        Ok(())
    }

    async fn list_housekeeping(&self) -> Result<Vec<HousekeepingEntry>, StoreError> {
        Ok(self.tables.read().housekeeping.clone())
    }

    async fn check_out(&self, app: &str, component: &str) -> Result<bool, StoreError> {
        let mut tables = self.tables.write();
        let before = tables.reservations.len();
        tables
            .reservations
            .retain(|r| !(r.app == app && r.component == component));
        Ok(tables.reservations.len() < before)
    }

    async fn snooze(&self, app: &str, component: &str, until: i64) -> Result<bool, StoreError> {
        let mut tables = self.tables.write();
        Ok(match Self::find_mut(&mut tables, app, component) {
            Some(res) => {
                res.last_checkin = until;
                true
            }
            None => false,
        })
    }

    async fn record_alert(&self, record: &AlertRecord) -> Result<(), StoreError> {
        self.tables.write().alerts.push(record.clone());
        Ok(())
    }

    async fn list_alerts(&self, limit: usize) -> Result<Vec<AlertRecord>, StoreError> {
        let tables = self.tables.read();
        let mut alerts = tables.alerts.clone();
        alerts.sort_by(|a, b| b.alert_time.cmp(&a.alert_time));
        alerts.truncate(limit);
        Ok(alerts)
    }

    async fn upsert_heartbeat(
        &self,
        app: &str,
        component: &str,
        now: i64,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        match Self::find_mut(&mut tables, app, component) {
            Some(res) => {
                res.last_checkin = now;
                res.num_checkins += 1;
            }
            None => {
                Self::insert_reservation(&mut tables, &heartbeat_reservation(app, component), now);
                if let Some(res) = Self::find_mut(&mut tables, app, component) {
                    res.last_checkin = now;
                    res.num_checkins = 1;
                }
            }
        }
        tables.housekeeping.push(HousekeepingEntry {
            app: app.to_string(),
            component: component.to_string(),
            notes: HEARTBEAT_NOTES.to_string(),
            checkin_time: now,
        });
        Ok(())
    }

    async fn delete_older_than(&self, table: LogTable, cutoff: i64) -> Result<usize, StoreError> {
        let mut tables = self.tables.write();
        let removed = match table {
            LogTable::Housekeeping => {
                let before = tables.housekeeping.len();
                tables.housekeeping.retain(|h| h.checkin_time >= cutoff);
                before - tables.housekeeping.len()
            }
            LogTable::Alerts => {
                let before = tables.alerts.len();
                tables.alerts.retain(|a| a.alert_time >= cutoff);
                before - tables.alerts.len()
            }
        };
        Ok(removed)
    }
}
