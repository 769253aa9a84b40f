//! SQLite mirror of the authoritative store's relational state.

use std::path::Path;

use hashbrown::HashMap;
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use tracing::debug;

use crate::{
    core::store::{BookingStore, StoreSnapshotV1},
    op::{Op, StoredOp},
    record::{
        booking::BookingRecord, client::ClientRecord, service::ServiceRecord,
        session::SessionRecord, staff::StaffRecord,
    },
    types::{BookingStatus, ClientId, OpSeq, ServiceId, SessionId, StaffId},
};

use super::{PersistResult, StoreSink};

/// SQLite implementation of [`StoreSink`] plus load-side helpers.
///
/// The mirror holds the relational layout directly: five record tables, two
/// join tables, and the booking indexes. Foreign keys re-encode the
/// ownership rules as a backstop behind the in-memory store's checks.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens or creates a mirror database at `path`.
    ///
    /// Enables WAL mode, `synchronous=NORMAL`, and foreign-key enforcement.
    pub fn open(path: impl AsRef<Path>) -> PersistResult<Self> {
        let conn = Connection::open(path)?;
        Self::init_connection(conn)
    }

    /// Opens an in-memory mirror.
    pub fn open_in_memory() -> PersistResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(conn)
    }

    fn init_connection(conn: Connection) -> PersistResult<Self> {
        conn.execute_batch(include_str!("schema.sql"))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self { conn })
    }

    /// Rebuilds an in-memory store from the mirrored tables.
    pub fn load_store(&self) -> PersistResult<BookingStore> {
        Ok(BookingStore::from_snapshot(self.load_snapshot()?))
    }

    /// Reads the full relational state into a snapshot.
    pub fn load_snapshot(&self) -> PersistResult<StoreSnapshotV1> {
        let services = self.load_services()?;
        let staff = self.load_staff()?;
        let clients = self.load_clients()?;
        let bookings = self.load_bookings()?;
        let sessions = self.load_sessions()?;

        let snapshot = StoreSnapshotV1 {
            next_op_seq: self.last_seq()?.saturating_add(1),
            next_service_id: self.next_id("services")?,
            next_staff_id: self.next_id("staff")?,
            next_client_id: self.next_id("clients")?,
            next_booking_id: self.next_id("bookings")?,
            next_session_id: self.next_id("sessions")?,
            services,
            staff,
            clients,
            bookings,
            sessions,
        };
        Ok(snapshot)
    }

    /// Highest mutation sequence the mirror has applied.
    pub fn last_seq(&self) -> PersistResult<OpSeq> {
        let value: Option<i64> = self
            .conn
            .query_row("SELECT value FROM meta WHERE key = 'last_op_seq'", [], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value.unwrap_or(0) as OpSeq)
    }

    fn next_id(&self, table: &str) -> PersistResult<u64> {
        let max: i64 = self.conn.query_row(
            &format!("SELECT COALESCE(MAX(id), 0) FROM {table}"),
            [],
            |row| row.get(0),
        )?;
        Ok(max as u64 + 1)
    }

    fn load_services(&self) -> PersistResult<Vec<ServiceRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, description, duration_minutes, price_cents, active,
                    created_at_ms, updated_at_ms
             FROM services ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ServiceRecord {
                id: row.get::<_, i64>(0)? as ServiceId,
                name: row.get(1)?,
                description: row.get(2)?,
                duration_minutes: row.get::<_, i64>(3)? as u32,
                price_cents: row.get(4)?,
                active: row.get::<_, i64>(5)? != 0,
                created_at_ms: row.get::<_, i64>(6)? as u64,
                updated_at_ms: row.get::<_, i64>(7)? as u64,
            })
        })?;
        collect_rows(rows)
    }

    fn load_staff(&self) -> PersistResult<Vec<StaffRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, email, phone, active, created_at_ms, updated_at_ms
             FROM staff ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(StaffRecord {
                id: row.get::<_, i64>(0)? as StaffId,
                name: row.get(1)?,
                email: row.get(2)?,
                phone: row.get(3)?,
                services: Vec::new(),
                active: row.get::<_, i64>(4)? != 0,
                created_at_ms: row.get::<_, i64>(5)? as u64,
                updated_at_ms: row.get::<_, i64>(6)? as u64,
            })
        })?;
        let mut staff = collect_rows(rows)?;

        let by_id: HashMap<StaffId, usize> = staff
            .iter()
            .enumerate()
            .map(|(idx, rec)| (rec.id, idx))
            .collect();
        let mut stmt = self
            .conn
            .prepare("SELECT staff_id, service_id FROM staff_services ORDER BY rowid ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)? as StaffId,
                row.get::<_, i64>(1)? as ServiceId,
            ))
        })?;
        for row in rows {
            let (staff_id, service_id) = row?;
            if let Some(idx) = by_id.get(&staff_id) {
                staff[*idx].services.push(service_id);
            }
        }
        Ok(staff)
    }

    fn load_clients(&self) -> PersistResult<Vec<ClientRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, email, phone, notes, created_at_ms, updated_at_ms
             FROM clients ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ClientRecord {
                id: row.get::<_, i64>(0)? as ClientId,
                name: row.get(1)?,
                email: row.get(2)?,
                phone: row.get(3)?,
                notes: row.get(4)?,
                created_at_ms: row.get::<_, i64>(5)? as u64,
                updated_at_ms: row.get::<_, i64>(6)? as u64,
            })
        })?;
        collect_rows(rows)
    }

    fn load_bookings(&self) -> PersistResult<Vec<BookingRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, client_id, service_id, staff_id, start_time_ms, end_time_ms,
                    status, notes, created_at_ms, updated_at_ms
             FROM bookings ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            let status: String = row.get(6)?;
            let status = BookingStatus::parse(&status).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    6,
                    rusqlite::types::Type::Text,
                    Box::new(std::io::Error::other(format!("unknown status {status:?}"))),
                )
            })?;
            Ok(BookingRecord {
                id: row.get::<_, i64>(0)? as u64,
                client_id: row.get::<_, i64>(1)? as ClientId,
                service_id: row.get::<_, i64>(2)? as ServiceId,
                staff_id: row.get::<_, i64>(3)? as StaffId,
                start_time_ms: row.get::<_, i64>(4)? as u64,
                end_time_ms: row.get::<_, i64>(5)? as u64,
                status,
                notes: row.get(7)?,
                created_at_ms: row.get::<_, i64>(8)? as u64,
                updated_at_ms: row.get::<_, i64>(9)? as u64,
            })
        })?;
        collect_rows(rows)
    }

    fn load_sessions(&self) -> PersistResult<Vec<SessionRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, description, service_id, staff_id, start_time_ms,
                    end_time_ms, capacity, active, created_at_ms, updated_at_ms
             FROM sessions ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(SessionRecord {
                id: row.get::<_, i64>(0)? as SessionId,
                title: row.get(1)?,
                description: row.get(2)?,
                service_id: row.get::<_, i64>(3)? as ServiceId,
                staff_id: row.get::<_, i64>(4)? as StaffId,
                start_time_ms: row.get::<_, i64>(5)? as u64,
                end_time_ms: row.get::<_, i64>(6)? as u64,
                capacity: row.get::<_, i64>(7)? as u32,
                enrolled_clients: Vec::new(),
                active: row.get::<_, i64>(8)? != 0,
                created_at_ms: row.get::<_, i64>(9)? as u64,
                updated_at_ms: row.get::<_, i64>(10)? as u64,
            })
        })?;
        let mut sessions = collect_rows(rows)?;

        let by_id: HashMap<SessionId, usize> = sessions
            .iter()
            .enumerate()
            .map(|(idx, rec)| (rec.id, idx))
            .collect();
        let mut stmt = self
            .conn
            .prepare("SELECT session_id, client_id FROM session_clients ORDER BY rowid ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)? as SessionId,
                row.get::<_, i64>(1)? as ClientId,
            ))
        })?;
        for row in rows {
            let (session_id, client_id) = row?;
            if let Some(idx) = by_id.get(&session_id) {
                sessions[*idx].enrolled_clients.push(client_id);
            }
        }
        Ok(sessions)
    }
}

impl StoreSink for SqliteStore {
    fn apply_ops(&mut self, ops: &[StoredOp]) -> PersistResult<OpSeq> {
        if ops.is_empty() {
            return self.last_seq();
        }

        let tx = self.conn.transaction()?;
        for stored in ops {
            apply_op(&tx, &stored.op)?;
        }
        let last = ops.last().map(|o| o.seq).unwrap_or(0);
        tx.execute(
            "INSERT INTO meta(key, value) VALUES ('last_op_seq', ?1)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![last as i64],
        )?;
        tx.commit()?;
        debug!(ops = ops.len(), last_seq = last, "mirrored op batch");
        Ok(last)
    }

    fn flush(&mut self) -> PersistResult<()> {
        self.conn.execute_batch("PRAGMA wal_checkpoint(PASSIVE);")?;
        Ok(())
    }
}

// Upserts must be ON CONFLICT DO UPDATE rather than INSERT OR REPLACE:
// REPLACE deletes the row first, which would trip the RESTRICT foreign keys
// and cascade away join rows.
fn apply_op(tx: &Transaction<'_>, op: &Op) -> PersistResult<()> {
    match op {
        Op::UpsertService { service } => {
            tx.execute(
                "INSERT INTO services (id, name, description, duration_minutes, price_cents,
                                       active, created_at_ms, updated_at_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(id) DO UPDATE SET
                     name = excluded.name,
                     description = excluded.description,
                     duration_minutes = excluded.duration_minutes,
                     price_cents = excluded.price_cents,
                     active = excluded.active,
                     updated_at_ms = excluded.updated_at_ms",
                params![
                    service.id as i64,
                    service.name,
                    service.description,
                    service.duration_minutes as i64,
                    service.price_cents,
                    service.active as i64,
                    service.created_at_ms as i64,
                    service.updated_at_ms as i64,
                ],
            )?;
        }
        Op::DeleteService { id } => {
            tx.execute("DELETE FROM services WHERE id = ?1", params![*id as i64])?;
        }
        Op::UpsertStaff { staff } => {
            tx.execute(
                "INSERT INTO staff (id, name, email, phone, active, created_at_ms, updated_at_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(id) DO UPDATE SET
                     name = excluded.name,
                     email = excluded.email,
                     phone = excluded.phone,
                     active = excluded.active,
                     updated_at_ms = excluded.updated_at_ms",
                params![
                    staff.id as i64,
                    staff.name,
                    staff.email,
                    staff.phone,
                    staff.active as i64,
                    staff.created_at_ms as i64,
                    staff.updated_at_ms as i64,
                ],
            )?;
            tx.execute(
                "DELETE FROM staff_services WHERE staff_id = ?1",
                params![staff.id as i64],
            )?;
            let mut insert = tx.prepare(
                "INSERT OR IGNORE INTO staff_services (staff_id, service_id) VALUES (?1, ?2)",
            )?;
            for service in &staff.services {
                insert.execute(params![staff.id as i64, *service as i64])?;
            }
        }
        Op::DeleteStaff { id } => {
            tx.execute("DELETE FROM staff WHERE id = ?1", params![*id as i64])?;
        }
        Op::UpsertClient { client } => {
            tx.execute(
                "INSERT INTO clients (id, name, email, phone, notes, created_at_ms, updated_at_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(id) DO UPDATE SET
                     name = excluded.name,
                     email = excluded.email,
                     phone = excluded.phone,
                     notes = excluded.notes,
                     updated_at_ms = excluded.updated_at_ms",
                params![
                    client.id as i64,
                    client.name,
                    client.email,
                    client.phone,
                    client.notes,
                    client.created_at_ms as i64,
                    client.updated_at_ms as i64,
                ],
            )?;
        }
        Op::DeleteClient { id } => {
            // Foreign keys cascade to bookings and session_clients.
            tx.execute("DELETE FROM clients WHERE id = ?1", params![*id as i64])?;
        }
        Op::UpsertBooking { booking } => {
            tx.execute(
                "INSERT INTO bookings (id, client_id, service_id, staff_id, start_time_ms,
                                       end_time_ms, status, notes, created_at_ms, updated_at_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT(id) DO UPDATE SET
                     client_id = excluded.client_id,
                     service_id = excluded.service_id,
                     staff_id = excluded.staff_id,
                     start_time_ms = excluded.start_time_ms,
                     end_time_ms = excluded.end_time_ms,
                     status = excluded.status,
                     notes = excluded.notes,
                     updated_at_ms = excluded.updated_at_ms",
                params![
                    booking.id as i64,
                    booking.client_id as i64,
                    booking.service_id as i64,
                    booking.staff_id as i64,
                    booking.start_time_ms as i64,
                    booking.end_time_ms as i64,
                    booking.status.as_str(),
                    booking.notes,
                    booking.created_at_ms as i64,
                    booking.updated_at_ms as i64,
                ],
            )?;
        }
        Op::DeleteBooking { id } => {
            tx.execute("DELETE FROM bookings WHERE id = ?1", params![*id as i64])?;
        }
        Op::UpsertSession { session } => {
            tx.execute(
                "INSERT INTO sessions (id, title, description, service_id, staff_id,
                                       start_time_ms, end_time_ms, capacity, active,
                                       created_at_ms, updated_at_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                 ON CONFLICT(id) DO UPDATE SET
                     title = excluded.title,
                     description = excluded.description,
                     service_id = excluded.service_id,
                     staff_id = excluded.staff_id,
                     start_time_ms = excluded.start_time_ms,
                     end_time_ms = excluded.end_time_ms,
                     capacity = excluded.capacity,
                     active = excluded.active,
                     updated_at_ms = excluded.updated_at_ms",
                params![
                    session.id as i64,
                    session.title,
                    session.description,
                    session.service_id as i64,
                    session.staff_id as i64,
                    session.start_time_ms as i64,
                    session.end_time_ms as i64,
                    session.capacity as i64,
                    session.active as i64,
                    session.created_at_ms as i64,
                    session.updated_at_ms as i64,
                ],
            )?;
            tx.execute(
                "DELETE FROM session_clients WHERE session_id = ?1",
                params![session.id as i64],
            )?;
            let mut insert = tx.prepare(
                "INSERT OR IGNORE INTO session_clients (session_id, client_id) VALUES (?1, ?2)",
            )?;
            for client in &session.enrolled_clients {
                insert.execute(params![session.id as i64, *client as i64])?;
            }
        }
        Op::DeleteSession { id } => {
            tx.execute("DELETE FROM sessions WHERE id = ?1", params![*id as i64])?;
        }
    }
    Ok(())
}

fn collect_rows<T>(
    rows: impl Iterator<Item = Result<T, rusqlite::Error>>,
) -> PersistResult<Vec<T>> {
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}
