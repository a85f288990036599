use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use super::schema::init_schema;
use super::{
    heartbeat_reservation, Store, StoreError, HEARTBEAT_NOTES, INITIAL_GRACE_SECS, LOCK_LEASE,
    LOCK_POLL_INTERVAL,
};
use crate::data::{
    AlertRecord, CheckIn, HousekeepingEntry, LogTable, NewReservation, Node, Reservation,
    ReservationFilter, TimeUnit,
};

const RESERVATION_COLUMNS: &str = "id, app, component, owner, notify, alert_msg, frequency, \
     time_units, last_checkin_timestamp, num_checkins, inserted_timestamp";

/// SQLite-backed store. Several monitor processes may share one database
/// file; the named lock is a row in the `locks` table.
pub struct SqliteStore {
    conn: Connection,
    lease: Duration,
}

impl SqliteStore {
    /// Open (or create) a database file and bootstrap its schema
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref().to_path_buf()).await?;
        Self::init(conn).await
    }

    pub async fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.call(|conn| {
            conn.busy_timeout(Duration::from_secs(5))?;
            Ok(init_schema(conn)?)
        })
        .await?;

        Ok(Self {
            conn,
            lease: LOCK_LEASE,
        })
    }

    async fn try_lock(&self, name: &str, holder: &str) -> Result<bool, StoreError> {
        let name = name.to_string();
        let holder = holder.to_string();
        let lease = self.lease.as_secs() as i64;
        let now = chrono::Utc::now().timestamp();

        let acquired = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    "DELETE FROM locks WHERE name = ?1 AND acquired_at < ?2",
                    params![name, now - lease],
                )?;
                tx.execute(
                    "INSERT OR IGNORE INTO locks (name, holder, acquired_at) VALUES (?1, ?2, ?3)",
                    params![name, holder, now],
                )?;
                let current: Option<String> = tx
                    .query_row(
                        "SELECT holder FROM locks WHERE name = ?1",
                        params![name],
                        |row| row.get(0),
                    )
                    .optional()?;
                tx.commit()?;
                Ok(current.as_deref() == Some(holder.as_str()))
            })
            .await?;

        Ok(acquired)
    }
}

fn decode_reservation(row: &Row<'_>) -> rusqlite::Result<Reservation> {
    let time_units: String = row.get(7)?;
    Ok(Reservation {
        id: row.get(0)?,
        app: row.get(1)?,
        component: row.get(2)?,
        owner: row.get(3)?,
        notify: row.get(4)?,
        alert_message: row.get(5)?,
        frequency: row.get(6)?,
        time_units: TimeUnit::parse(&time_units),
        last_checkin: row.get(8)?,
        num_checkins: row.get(9)?,
        inserted_at: row.get(10)?,
    })
}

#[async_trait]
impl Store for SqliteStore {
    async fn acquire_lock(
        &self,
        name: &str,
        holder: &str,
        timeout: Duration,
    ) -> Result<bool, StoreError> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.try_lock(name, holder).await? {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(LOCK_POLL_INTERVAL).await;
        }
    }

    async fn release_lock(&self, name: &str, holder: &str) -> Result<bool, StoreError> {
        let name = name.to_string();
        let holder = holder.to_string();
        let released = self
            .conn
            .call(move |conn| {
                let n = conn.execute(
                    "DELETE FROM locks WHERE name = ?1 AND holder = ?2",
                    params![name, holder],
                )?;
                Ok(n > 0)
            })
            .await?;
        Ok(released)
    }

    async fn list_nodes(&self) -> Result<Vec<Node>, StoreError> {
        let nodes = self
            .conn
            .call(|conn| {
                let mut stmt =
                    conn.prepare("SELECT ip_address, node_id FROM nodes ORDER BY ip_address")?;
                let nodes = stmt
                    .query_map([], |row| {
                        Ok(Node {
                            ip_address: row.get(0)?,
                            node_id: row.get(1)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(nodes)
            })
            .await?;
        Ok(nodes)
    }

    async fn upsert_node(&self, node: &Node) -> Result<(), StoreError> {
        let node = node.clone();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT OR IGNORE INTO nodes (ip_address, node_id) VALUES (?1, ?2)",
                    params![node.ip_address, node.node_id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn delete_node(&self, ip_address: &str) -> Result<(), StoreError> {
        let ip_address = ip_address.to_string();
        self.conn
            .call(move |conn| {
                conn.execute("DELETE FROM nodes WHERE ip_address = ?1", params![ip_address])?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn list_reservations(
        &self,
        filter: &ReservationFilter,
    ) -> Result<Vec<Reservation>, StoreError> {
        let filter = filter.clone();
        let reservations = self
            .conn
            .call(move |conn| {
                let rows = match &filter {
                    ReservationFilter::All => {
                        let mut stmt = conn.prepare(&format!(
                            "SELECT {} FROM reservations ORDER BY last_checkin_timestamp DESC",
                            RESERVATION_COLUMNS
                        ))?;
                        let rows = stmt.query_map([], decode_reservation)?.collect::<Vec<_>>();
                        rows
                    }
                    ReservationFilter::Key { app, component } => {
                        let mut stmt = conn.prepare(&format!(
                            "SELECT {} FROM reservations WHERE app = ?1 AND component = ?2",
                            RESERVATION_COLUMNS
                        ))?;
                        let rows = stmt
                            .query_map(params![app, component], decode_reservation)?
                            .collect::<Vec<_>>();
                        rows
                    }
                };

                let mut reservations = Vec::with_capacity(rows.len());
                for row in rows {
                    match row {
                        Ok(res) => reservations.push(res),
                        Err(e) => tracing::warn!(error = %e, "Skipping malformed reservation row"),
                    }
                }
                Ok(reservations)
            })
            .await?;
        Ok(reservations)
    }

    async fn store_reservation(
        &self,
        reservation: &NewReservation,
        now: i64,
    ) -> Result<(), StoreError> {
        let r = reservation.clone();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO reservations (app, component, owner, notify, alert_msg, frequency,
                         time_units, inserted_timestamp, last_checkin_timestamp)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                     ON CONFLICT (app, component) DO UPDATE SET
                         notify = excluded.notify,
                         alert_msg = excluded.alert_msg,
                         frequency = excluded.frequency,
                         time_units = excluded.time_units",
                    params![
                        r.app,
                        r.component,
                        r.owner,
                        r.notify,
                        r.alert_message,
                        r.frequency,
                        r.time_units.as_str(),
                        now,
                        now + INITIAL_GRACE_SECS
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn check_in(&self, app: &str, component: &str, now: i64) -> Result<bool, StoreError> {
        let app = app.to_string();
        let component = component.to_string();
        let updated = self
            .conn
            .call(move |conn| {
                let n = conn.execute(
                    "UPDATE reservations SET last_checkin_timestamp = ?1, num_checkins = num_checkins + 1
                     WHERE app = ?2 AND component = ?3",
                    params![now, app, component],
                )?;
                Ok(n > 0)
            })
            .await?;
        Ok(updated)
    }

    async fn log_housekeeping(&self, checkin: &CheckIn, now: i64) -> Result<(), StoreError> {
        let c = checkin.clone();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO housekeeping (app, component, notes, last_checkin_timestamp)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![c.app, c.component, c.notes, now],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn list_housekeeping(&self) -> Result<Vec<HousekeepingEntry>, StoreError> {
        let entries = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT app, component, notes, last_checkin_timestamp FROM housekeeping
                     ORDER BY id",
                )?;
                let entries = stmt
                    .query_map([], |row| {
                        Ok(HousekeepingEntry {
                            app: row.get(0)?,
                            component: row.get(1)?,
                            notes: row.get(2)?,
                            checkin_time: row.get(3)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(entries)
            })
            .await?;
        Ok(entries)
    }

    async fn check_out(&self, app: &str, component: &str) -> Result<bool, StoreError> {
        let app = app.to_string();
        let component = component.to_string();
        let deleted = self
            .conn
            .call(move |conn| {
                let n = conn.execute(
                    "DELETE FROM reservations WHERE app = ?1 AND component = ?2",
                    params![app, component],
                )?;
                Ok(n > 0)
            })
            .await?;
        Ok(deleted)
    }

    async fn snooze(&self, app: &str, component: &str, until: i64) -> Result<bool, StoreError> {
        let app = app.to_string();
        let component = component.to_string();
        let updated = self
            .conn
            .call(move |conn| {
                let n = conn.execute(
                    "UPDATE reservations SET last_checkin_timestamp = ?1 WHERE app = ?2 AND component = ?3",
                    params![until, app, component],
                )?;
                Ok(n > 0)
            })
            .await?;
        Ok(updated)
    }

    async fn record_alert(&self, record: &AlertRecord) -> Result<(), StoreError> {
        let app = record.app.clone();
        let component = record.component.clone();
        let alert_time = record.alert_time;
        let alerters = record.alerters_csv();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO alerts (app, component, alert_time, alerters) VALUES (?1, ?2, ?3, ?4)",
                    params![app, component, alert_time, alerters],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn list_alerts(&self, limit: usize) -> Result<Vec<AlertRecord>, StoreError> {
        let limit = limit as i64;
        let alerts = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT app, component, alert_time, alerters FROM alerts
                     ORDER BY alert_time DESC, id DESC LIMIT ?1",
                )?;
                let alerts = stmt
                    .query_map(params![limit], |row| {
                        let alerters: String = row.get(3)?;
                        Ok(AlertRecord {
                            app: row.get(0)?,
                            component: row.get(1)?,
                            alert_time: row.get(2)?,
                            alerters: AlertRecord::parse_alerters(&alerters),
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(alerts)
            })
            .await?;
        Ok(alerts)
    }

    async fn upsert_heartbeat(
        &self,
        app: &str,
        component: &str,
        now: i64,
    ) -> Result<(), StoreError> {
        let seed = heartbeat_reservation(app, component);
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let updated = tx.execute(
                    "UPDATE reservations SET last_checkin_timestamp = ?1, num_checkins = num_checkins + 1
                     WHERE app = ?2 AND component = ?3",
                    params![now, seed.app, seed.component],
                )?;
                if updated == 0 {
                    tx.execute(
                        "INSERT INTO reservations (app, component, frequency, time_units,
                             inserted_timestamp, num_checkins, last_checkin_timestamp)
                         VALUES (?1, ?2, ?3, ?4, ?5, 1, ?5)",
                        params![
                            seed.app,
                            seed.component,
                            seed.frequency,
                            seed.time_units.as_str(),
                            now
                        ],
                    )?;
                }
                tx.execute(
                    "INSERT INTO housekeeping (app, component, notes, last_checkin_timestamp)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![seed.app, seed.component, HEARTBEAT_NOTES, now],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn delete_older_than(&self, table: LogTable, cutoff: i64) -> Result<usize, StoreError> {
        let sql = match table {
            LogTable::Housekeeping => "DELETE FROM housekeeping WHERE last_checkin_timestamp < ?1",
            LogTable::Alerts => "DELETE FROM alerts WHERE alert_time < ?1",
        };
        let removed = self
            .conn
            .call(move |conn| Ok(conn.execute(sql, params![cutoff])?))
            .await?;
        Ok(removed)
    }
}
