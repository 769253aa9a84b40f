use std::time::{SystemTime, UNIX_EPOCH};

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::{
    core::indices::VecIndex,
    op::{Op, StoredOp},
    record::{
        ValidationError,
        booking::{BookingDetail, BookingDraft, BookingPatch, BookingRecord, derived_end_ms},
        client::{ClientDraft, ClientPatch, ClientRecord},
        service::{ServiceDraft, ServicePatch, ServiceRecord},
        session::{SessionDraft, SessionPatch, SessionRecord},
        staff::{StaffDraft, StaffPatch, StaffRecord},
    },
    types::{BookingId, BookingStatus, ClientId, OpSeq, ServiceId, SessionId, StaffId},
};

/// Rejected store mutation. Every variant leaves the store unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A field failed validation at write time.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Another staff record already holds this email.
    #[error("staff email {0:?} is already in use")]
    DuplicateEmail(String),
    /// The service is still referenced by a booking or session.
    #[error("service {0} is still referenced by bookings or sessions")]
    ServiceInUse(ServiceId),
    /// The staff member is still referenced by a booking or session.
    #[error("staff {0} is still referenced by bookings or sessions")]
    StaffInUse(StaffId),
    /// No service with this id.
    #[error("no service with id {0}")]
    MissingService(ServiceId),
    /// No staff member with this id.
    #[error("no staff member with id {0}")]
    MissingStaff(StaffId),
    /// No client with this id.
    #[error("no client with id {0}")]
    MissingClient(ClientId),
    /// No booking with this id.
    #[error("no booking with id {0}")]
    MissingBooking(BookingId),
    /// No session with this id.
    #[error("no session with id {0}")]
    MissingSession(SessionId),
}

/// Serializable full-state snapshot. Record vectors are in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSnapshotV1 {
    /// Next mutation sequence.
    pub next_op_seq: OpSeq,
    /// Next service id.
    pub next_service_id: ServiceId,
    /// Next staff id.
    pub next_staff_id: StaffId,
    /// Next client id.
    pub next_client_id: ClientId,
    /// Next booking id.
    pub next_booking_id: BookingId,
    /// Next session id.
    pub next_session_id: SessionId,
    /// Service records.
    pub services: Vec<ServiceRecord>,
    /// Staff records.
    pub staff: Vec<StaffRecord>,
    /// Client records.
    pub clients: Vec<ClientRecord>,
    /// Booking records.
    pub bookings: Vec<BookingRecord>,
    /// Session records.
    pub sessions: Vec<SessionRecord>,
}

/// Authoritative in-memory store for the five booking-domain record kinds.
///
/// The store enforces the referential rules the schema describes: cascade
/// from client to bookings, protected deletes of services and staff, and
/// staff email uniqueness. It does not detect booking overlaps and does not
/// cap session enrollment; both gaps are part of the contract.
#[derive(Debug, Default)]
pub struct BookingStore {
    services: HashMap<ServiceId, ServiceRecord>,
    service_order: Vec<ServiceId>,
    staff: HashMap<StaffId, StaffRecord>,
    staff_order: Vec<StaffId>,
    staff_by_email: HashMap<String, StaffId>,
    clients: HashMap<ClientId, ClientRecord>,
    client_order: Vec<ClientId>,
    bookings: HashMap<BookingId, BookingRecord>,
    booking_order: Vec<BookingId>,
    bookings_by_staff: VecIndex<StaffId, BookingId>,
    bookings_by_service: VecIndex<ServiceId, BookingId>,
    bookings_by_client: VecIndex<ClientId, BookingId>,
    bookings_by_status: VecIndex<BookingStatus, BookingId>,
    sessions: HashMap<SessionId, SessionRecord>,
    session_order: Vec<SessionId>,
    sessions_by_staff: VecIndex<StaffId, SessionId>,
    sessions_by_service: VecIndex<ServiceId, SessionId>,
    sessions_by_client: VecIndex<ClientId, SessionId>,
    pending_ops: Vec<StoredOp>,
    next_op_seq: OpSeq,
    next_service_id: ServiceId,
    next_staff_id: StaffId,
    next_client_id: ClientId,
    next_booking_id: BookingId,
    next_session_id: SessionId,
}

impl BookingStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            next_op_seq: 1,
            next_service_id: 1,
            next_staff_id: 1,
            next_client_id: 1,
            next_booking_id: 1,
            next_session_id: 1,
            ..Self::default()
        }
    }

    /// Rebuilds a store from a snapshot, restoring every index.
    pub fn from_snapshot(snapshot: StoreSnapshotV1) -> Self {
        let mut store = Self {
            next_op_seq: snapshot.next_op_seq.max(1),
            next_service_id: snapshot.next_service_id.max(1),
            next_staff_id: snapshot.next_staff_id.max(1),
            next_client_id: snapshot.next_client_id.max(1),
            next_booking_id: snapshot.next_booking_id.max(1),
            next_session_id: snapshot.next_session_id.max(1),
            ..Self::default()
        };

        for rec in snapshot.services {
            store.service_order.push(rec.id);
            store.services.insert(rec.id, rec);
        }
        for rec in snapshot.staff {
            store.staff_order.push(rec.id);
            store.staff_by_email.insert(rec.email.clone(), rec.id);
            store.staff.insert(rec.id, rec);
        }
        for rec in snapshot.clients {
            store.client_order.push(rec.id);
            store.clients.insert(rec.id, rec);
        }
        for rec in snapshot.bookings {
            store.booking_order.push(rec.id);
            store.index_booking(&rec);
            store.bookings.insert(rec.id, rec);
        }
        for rec in snapshot.sessions {
            store.session_order.push(rec.id);
            store.index_session(&rec);
            store.sessions.insert(rec.id, rec);
        }
        store
    }

    /// Exports the full state as a snapshot.
    pub fn export_snapshot(&self) -> StoreSnapshotV1 {
        StoreSnapshotV1 {
            next_op_seq: self.next_op_seq,
            next_service_id: self.next_service_id,
            next_staff_id: self.next_staff_id,
            next_client_id: self.next_client_id,
            next_booking_id: self.next_booking_id,
            next_session_id: self.next_session_id,
            services: self.cloned_in_order(&self.service_order, &self.services),
            staff: self.cloned_in_order(&self.staff_order, &self.staff),
            clients: self.cloned_in_order(&self.client_order, &self.clients),
            bookings: self.cloned_in_order(&self.booking_order, &self.bookings),
            sessions: self.cloned_in_order(&self.session_order, &self.sessions),
        }
    }

    // ---- services ----

    /// Creates a service from a draft, validating its fields.
    pub fn create_service(
        &mut self,
        draft: ServiceDraft,
    ) -> Result<(ServiceId, StoredOp), StoreError> {
        let now = now_ms();
        let rec = ServiceRecord {
            id: self.next_service_id,
            name: draft.name,
            description: draft.description,
            duration_minutes: draft.duration_minutes,
            price_cents: draft.price_cents,
            active: draft.active,
            created_at_ms: now,
            updated_at_ms: now,
        };
        rec.validate()?;

        let id = rec.id;
        self.next_service_id += 1;
        self.service_order.push(id);
        self.services.insert(id, rec.clone());
        Ok((id, self.push_op(Op::UpsertService { service: rec })))
    }

    /// Applies a sparse patch to a service, re-validating the result.
    pub fn update_service(
        &mut self,
        id: ServiceId,
        patch: ServicePatch,
    ) -> Result<((), StoredOp), StoreError> {
        let mut updated = self
            .services
            .get(&id)
            .ok_or(StoreError::MissingService(id))?
            .clone();
        patch.apply_to(&mut updated);
        updated.updated_at_ms = now_ms();
        updated.validate()?;

        self.services.insert(id, updated.clone());
        Ok(((), self.push_op(Op::UpsertService { service: updated })))
    }

    /// Deletes a service. Rejected while any booking or session references
    /// it; staff membership rows simply drop.
    pub fn delete_service(&mut self, id: ServiceId) -> Result<((), StoredOp), StoreError> {
        if !self.services.contains_key(&id) {
            return Err(StoreError::MissingService(id));
        }
        if index_has(&self.bookings_by_service, &id) || index_has(&self.sessions_by_service, &id) {
            return Err(StoreError::ServiceInUse(id));
        }

        // Staff membership is plain many-to-many; the mirror drops those
        // join rows via its foreign keys.
        for staff in self.staff.values_mut() {
            remove_first(&mut staff.services, &id);
        }
        self.services.remove(&id);
        remove_first(&mut self.service_order, &id);
        self.bookings_by_service.remove(&id);
        self.sessions_by_service.remove(&id);
        Ok(((), self.push_op(Op::DeleteService { id })))
    }

    // ---- staff ----

    /// Creates a staff member, enforcing email uniqueness and verifying
    /// every initial service membership exists.
    pub fn create_staff(&mut self, draft: StaffDraft) -> Result<(StaffId, StoredOp), StoreError> {
        let mut services = Vec::new();
        for service in draft.services {
            if !self.services.contains_key(&service) {
                return Err(StoreError::MissingService(service));
            }
            if !services.contains(&service) {
                services.push(service);
            }
        }

        let now = now_ms();
        let rec = StaffRecord {
            id: self.next_staff_id,
            name: draft.name,
            email: draft.email,
            phone: draft.phone,
            services,
            active: draft.active,
            created_at_ms: now,
            updated_at_ms: now,
        };
        rec.validate()?;
        if self.staff_by_email.contains_key(&rec.email) {
            return Err(StoreError::DuplicateEmail(rec.email));
        }

        let id = rec.id;
        self.next_staff_id += 1;
        self.staff_order.push(id);
        self.staff_by_email.insert(rec.email.clone(), id);
        self.staff.insert(id, rec.clone());
        Ok((id, self.push_op(Op::UpsertStaff { staff: rec })))
    }

    /// Applies a sparse patch to a staff member. An email change re-checks
    /// uniqueness against every other staff record.
    pub fn update_staff(
        &mut self,
        id: StaffId,
        patch: StaffPatch,
    ) -> Result<((), StoredOp), StoreError> {
        let current = self
            .staff
            .get(&id)
            .ok_or(StoreError::MissingStaff(id))?
            .clone();
        let mut updated = current.clone();
        patch.apply_to(&mut updated);
        updated.updated_at_ms = now_ms();
        updated.validate()?;
        if updated.email != current.email
            && self
                .staff_by_email
                .get(&updated.email)
                .is_some_and(|other| *other != id)
        {
            return Err(StoreError::DuplicateEmail(updated.email));
        }

        if updated.email != current.email {
            self.staff_by_email.remove(&current.email);
            self.staff_by_email.insert(updated.email.clone(), id);
        }
        self.staff.insert(id, updated.clone());
        Ok(((), self.push_op(Op::UpsertStaff { staff: updated })))
    }

    /// Deletes a staff member. Rejected while any booking or session
    /// references them.
    pub fn delete_staff(&mut self, id: StaffId) -> Result<((), StoredOp), StoreError> {
        let Some(rec) = self.staff.get(&id) else {
            return Err(StoreError::MissingStaff(id));
        };
        if index_has(&self.bookings_by_staff, &id) || index_has(&self.sessions_by_staff, &id) {
            return Err(StoreError::StaffInUse(id));
        }

        self.staff_by_email.remove(&rec.email);
        self.staff.remove(&id);
        remove_first(&mut self.staff_order, &id);
        self.bookings_by_staff.remove(&id);
        self.sessions_by_staff.remove(&id);
        Ok(((), self.push_op(Op::DeleteStaff { id })))
    }

    /// Adds a service to a staff member's set. Idempotent.
    pub fn add_staff_service(
        &mut self,
        staff_id: StaffId,
        service_id: ServiceId,
    ) -> Result<((), StoredOp), StoreError> {
        if !self.services.contains_key(&service_id) {
            return Err(StoreError::MissingService(service_id));
        }
        let rec = {
            let staff = self
                .staff
                .get_mut(&staff_id)
                .ok_or(StoreError::MissingStaff(staff_id))?;
            if !staff.services.contains(&service_id) {
                staff.services.push(service_id);
            }
            staff.updated_at_ms = now_ms();
            staff.clone()
        };
        Ok(((), self.push_op(Op::UpsertStaff { staff: rec })))
    }

    /// Removes a service from a staff member's set. Removing an absent
    /// membership is a silent no-op on the set.
    pub fn remove_staff_service(
        &mut self,
        staff_id: StaffId,
        service_id: ServiceId,
    ) -> Result<((), StoredOp), StoreError> {
        let rec = {
            let staff = self
                .staff
                .get_mut(&staff_id)
                .ok_or(StoreError::MissingStaff(staff_id))?;
            remove_first(&mut staff.services, &service_id);
            staff.updated_at_ms = now_ms();
            staff.clone()
        };
        Ok(((), self.push_op(Op::UpsertStaff { staff: rec })))
    }

    // ---- clients ----

    /// Creates a client. Duplicate emails are permitted.
    pub fn create_client(&mut self, draft: ClientDraft) -> Result<(ClientId, StoredOp), StoreError> {
        let now = now_ms();
        let rec = ClientRecord {
            id: self.next_client_id,
            name: draft.name,
            email: draft.email,
            phone: draft.phone,
            notes: draft.notes,
            created_at_ms: now,
            updated_at_ms: now,
        };
        rec.validate()?;

        let id = rec.id;
        self.next_client_id += 1;
        self.client_order.push(id);
        self.clients.insert(id, rec.clone());
        Ok((id, self.push_op(Op::UpsertClient { client: rec })))
    }

    /// Applies a sparse patch to a client.
    pub fn update_client(
        &mut self,
        id: ClientId,
        patch: ClientPatch,
    ) -> Result<((), StoredOp), StoreError> {
        let mut updated = self
            .clients
            .get(&id)
            .ok_or(StoreError::MissingClient(id))?
            .clone();
        patch.apply_to(&mut updated);
        updated.updated_at_ms = now_ms();
        updated.validate()?;

        self.clients.insert(id, updated.clone());
        Ok(((), self.push_op(Op::UpsertClient { client: updated })))
    }

    /// Deletes a client, cascading to its bookings and dropping its session
    /// enrollments. Returns the ids of the bookings that went with it.
    pub fn delete_client(
        &mut self,
        id: ClientId,
    ) -> Result<(Vec<BookingId>, StoredOp), StoreError> {
        if !self.clients.contains_key(&id) {
            return Err(StoreError::MissingClient(id));
        }

        let removed = self.bookings_by_client.remove(&id).unwrap_or_default();
        for booking_id in &removed {
            if let Some(rec) = self.bookings.remove(booking_id) {
                remove_first(&mut self.booking_order, booking_id);
                self.unindex_booking(&rec);
            }
        }
        if !removed.is_empty() {
            debug!(client = id, bookings = removed.len(), "client delete cascaded to bookings");
        }

        for session_id in self.sessions_by_client.remove(&id).unwrap_or_default() {
            if let Some(session) = self.sessions.get_mut(&session_id) {
                remove_first(&mut session.enrolled_clients, &id);
            }
        }

        self.clients.remove(&id);
        remove_first(&mut self.client_order, &id);
        Ok((removed, self.push_op(Op::DeleteClient { id })))
    }

    // ---- bookings ----

    /// Creates a booking. When the draft carries no end time it is derived
    /// from the service duration. No overlap check is performed.
    pub fn create_booking(
        &mut self,
        draft: BookingDraft,
    ) -> Result<(BookingId, StoredOp), StoreError> {
        if !self.clients.contains_key(&draft.client_id) {
            return Err(StoreError::MissingClient(draft.client_id));
        }
        let duration_minutes = self
            .services
            .get(&draft.service_id)
            .ok_or(StoreError::MissingService(draft.service_id))?
            .duration_minutes;
        if !self.staff.contains_key(&draft.staff_id) {
            return Err(StoreError::MissingStaff(draft.staff_id));
        }

        let end_time_ms = draft
            .end_time_ms
            .unwrap_or_else(|| derived_end_ms(draft.start_time_ms, duration_minutes));
        let now = now_ms();
        let rec = BookingRecord {
            id: self.next_booking_id,
            client_id: draft.client_id,
            service_id: draft.service_id,
            staff_id: draft.staff_id,
            start_time_ms: draft.start_time_ms,
            end_time_ms,
            status: draft.status,
            notes: draft.notes,
            created_at_ms: now,
            updated_at_ms: now,
        };

        let id = rec.id;
        self.next_booking_id += 1;
        self.booking_order.push(id);
        self.index_booking(&rec);
        self.bookings.insert(id, rec.clone());
        Ok((id, self.push_op(Op::UpsertBooking { booking: rec })))
    }

    /// Applies a sparse patch to a booking. Reference changes are checked;
    /// an explicitly cleared end time re-derives from the patched start and
    /// service, while an untouched end time is kept as-is.
    pub fn update_booking(
        &mut self,
        id: BookingId,
        patch: BookingPatch,
    ) -> Result<((), StoredOp), StoreError> {
        let current = self
            .bookings
            .get(&id)
            .ok_or(StoreError::MissingBooking(id))?
            .clone();
        let mut updated = current.clone();
        patch.apply_to(&mut updated);

        if !self.clients.contains_key(&updated.client_id) {
            return Err(StoreError::MissingClient(updated.client_id));
        }
        let duration_minutes = self
            .services
            .get(&updated.service_id)
            .ok_or(StoreError::MissingService(updated.service_id))?
            .duration_minutes;
        if !self.staff.contains_key(&updated.staff_id) {
            return Err(StoreError::MissingStaff(updated.staff_id));
        }
        if matches!(patch.end_time_ms, Some(None)) {
            updated.end_time_ms = derived_end_ms(updated.start_time_ms, duration_minutes);
        }
        updated.updated_at_ms = now_ms();

        self.unindex_booking(&current);
        self.index_booking(&updated);
        self.bookings.insert(id, updated.clone());
        Ok(((), self.push_op(Op::UpsertBooking { booking: updated })))
    }

    /// Deletes a booking.
    pub fn delete_booking(&mut self, id: BookingId) -> Result<((), StoredOp), StoreError> {
        let rec = self
            .bookings
            .remove(&id)
            .ok_or(StoreError::MissingBooking(id))?;
        remove_first(&mut self.booking_order, &id);
        self.unindex_booking(&rec);
        Ok(((), self.push_op(Op::DeleteBooking { id })))
    }

    // ---- sessions ----

    /// Creates a group session with explicit start, end, and capacity.
    pub fn create_session(
        &mut self,
        draft: SessionDraft,
    ) -> Result<(SessionId, StoredOp), StoreError> {
        if !self.services.contains_key(&draft.service_id) {
            return Err(StoreError::MissingService(draft.service_id));
        }
        if !self.staff.contains_key(&draft.staff_id) {
            return Err(StoreError::MissingStaff(draft.staff_id));
        }

        let now = now_ms();
        let rec = SessionRecord {
            id: self.next_session_id,
            title: draft.title,
            description: draft.description,
            service_id: draft.service_id,
            staff_id: draft.staff_id,
            start_time_ms: draft.start_time_ms,
            end_time_ms: draft.end_time_ms,
            capacity: draft.capacity,
            enrolled_clients: Vec::new(),
            active: draft.active,
            created_at_ms: now,
            updated_at_ms: now,
        };
        rec.validate()?;

        let id = rec.id;
        self.next_session_id += 1;
        self.session_order.push(id);
        self.index_session(&rec);
        self.sessions.insert(id, rec.clone());
        Ok((id, self.push_op(Op::UpsertSession { session: rec })))
    }

    /// Applies a sparse patch to a session, re-validating the result and
    /// checking any changed references.
    pub fn update_session(
        &mut self,
        id: SessionId,
        patch: SessionPatch,
    ) -> Result<((), StoredOp), StoreError> {
        let current = self
            .sessions
            .get(&id)
            .ok_or(StoreError::MissingSession(id))?
            .clone();
        let mut updated = current.clone();
        patch.apply_to(&mut updated);
        updated.updated_at_ms = now_ms();
        updated.validate()?;
        if !self.services.contains_key(&updated.service_id) {
            return Err(StoreError::MissingService(updated.service_id));
        }
        if !self.staff.contains_key(&updated.staff_id) {
            return Err(StoreError::MissingStaff(updated.staff_id));
        }

        self.unindex_session(&current);
        self.index_session(&updated);
        self.sessions.insert(id, updated.clone());
        Ok(((), self.push_op(Op::UpsertSession { session: updated })))
    }

    /// Deletes a session. Enrollment rows drop with it; clients survive.
    pub fn delete_session(&mut self, id: SessionId) -> Result<((), StoredOp), StoreError> {
        let rec = self
            .sessions
            .remove(&id)
            .ok_or(StoreError::MissingSession(id))?;
        remove_first(&mut self.session_order, &id);
        self.unindex_session(&rec);
        Ok(((), self.push_op(Op::DeleteSession { id })))
    }

    /// Enrolls a client into a session. Idempotent, and deliberately
    /// unguarded: enrollment past capacity succeeds. Returns whether the
    /// membership actually changed.
    pub fn enroll(
        &mut self,
        session_id: SessionId,
        client_id: ClientId,
    ) -> Result<(bool, StoredOp), StoreError> {
        if !self.clients.contains_key(&client_id) {
            return Err(StoreError::MissingClient(client_id));
        }
        let (changed, rec) = {
            let session = self
                .sessions
                .get_mut(&session_id)
                .ok_or(StoreError::MissingSession(session_id))?;
            let changed = !session.enrolled_clients.contains(&client_id);
            if changed {
                if session.is_full() {
                    debug!(session = session_id, client = client_id, "enrolling past capacity");
                }
                session.enrolled_clients.push(client_id);
            }
            session.updated_at_ms = now_ms();
            (changed, session.clone())
        };
        if changed {
            self.sessions_by_client
                .entry(client_id)
                .or_default()
                .push(session_id);
        }
        Ok((changed, self.push_op(Op::UpsertSession { session: rec })))
    }

    /// Removes a client from a session's enrollment. Returns whether the
    /// membership actually changed.
    pub fn unenroll(
        &mut self,
        session_id: SessionId,
        client_id: ClientId,
    ) -> Result<(bool, StoredOp), StoreError> {
        let (changed, rec) = {
            let session = self
                .sessions
                .get_mut(&session_id)
                .ok_or(StoreError::MissingSession(session_id))?;
            let changed = session.enrolled_clients.contains(&client_id);
            remove_first(&mut session.enrolled_clients, &client_id);
            session.updated_at_ms = now_ms();
            (changed, session.clone())
        };
        if changed {
            if let Some(ids) = self.sessions_by_client.get_mut(&client_id) {
                remove_first(ids, &session_id);
            }
        }
        Ok((changed, self.push_op(Op::UpsertSession { session: rec })))
    }

    // ---- reads ----

    /// Looks up a service.
    pub fn service(&self, id: ServiceId) -> Option<&ServiceRecord> {
        self.services.get(&id)
    }

    /// All services, ordered by name.
    pub fn services(&self) -> Vec<&ServiceRecord> {
        let mut out: Vec<&ServiceRecord> = self.services.values().collect();
        out.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        out
    }

    /// Services currently offered, ordered by name.
    pub fn active_services(&self) -> Vec<&ServiceRecord> {
        self.services().into_iter().filter(|s| s.active).collect()
    }

    /// Looks up a staff member.
    pub fn staff_member(&self, id: StaffId) -> Option<&StaffRecord> {
        self.staff.get(&id)
    }

    /// All staff, ordered by name.
    pub fn staff_members(&self) -> Vec<&StaffRecord> {
        let mut out: Vec<&StaffRecord> = self.staff.values().collect();
        out.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        out
    }

    /// Looks up a staff member by exact email.
    pub fn find_staff_by_email(&self, email: &str) -> Option<&StaffRecord> {
        self.staff_by_email.get(email).and_then(|id| self.staff.get(id))
    }

    /// Looks up a client.
    pub fn client(&self, id: ClientId) -> Option<&ClientRecord> {
        self.clients.get(&id)
    }

    /// All clients, newest created first.
    pub fn clients(&self) -> Vec<&ClientRecord> {
        self.client_order
            .iter()
            .rev()
            .filter_map(|id| self.clients.get(id))
            .collect()
    }

    /// Looks up a booking.
    pub fn booking(&self, id: BookingId) -> Option<&BookingRecord> {
        self.bookings.get(&id)
    }

    /// All bookings, most recent start time first.
    pub fn bookings(&self) -> Vec<&BookingRecord> {
        let mut out: Vec<&BookingRecord> = self.bookings.values().collect();
        sort_bookings_desc(&mut out);
        out
    }

    /// The `n` bookings with the most recent start times.
    pub fn recent_bookings(&self, n: usize) -> Vec<&BookingRecord> {
        let mut out = self.bookings();
        out.truncate(n);
        out
    }

    /// Bookings assigned to a staff member, most recent first.
    pub fn bookings_for_staff(&self, staff: StaffId) -> Vec<&BookingRecord> {
        let mut out = self.collect_bookings(self.bookings_by_staff.get(&staff));
        sort_bookings_desc(&mut out);
        out
    }

    /// Bookings owned by a client, most recent first.
    pub fn bookings_for_client(&self, client: ClientId) -> Vec<&BookingRecord> {
        let mut out = self.collect_bookings(self.bookings_by_client.get(&client));
        sort_bookings_desc(&mut out);
        out
    }

    /// Bookings currently carrying a status, most recent first.
    pub fn bookings_with_status(&self, status: BookingStatus) -> Vec<&BookingRecord> {
        let mut out = self.collect_bookings(self.bookings_by_status.get(&status));
        sort_bookings_desc(&mut out);
        out
    }

    /// A staff member's bookings with `from_ms <= start < to_ms`, ascending
    /// by start time.
    pub fn staff_agenda(&self, staff: StaffId, from_ms: u64, to_ms: u64) -> Vec<&BookingRecord> {
        let mut out: Vec<&BookingRecord> = self
            .collect_bookings(self.bookings_by_staff.get(&staff))
            .into_iter()
            .filter(|b| b.start_time_ms >= from_ms && b.start_time_ms < to_ms)
            .collect();
        out.sort_by(|a, b| a.start_time_ms.cmp(&b.start_time_ms).then(a.id.cmp(&b.id)));
        out
    }

    /// Denormalized booking rows for listing surfaces, most recent first.
    pub fn booking_details(&self) -> Vec<BookingDetail> {
        self.bookings()
            .into_iter()
            .filter_map(|b| {
                let client = self.clients.get(&b.client_id)?;
                let service = self.services.get(&b.service_id)?;
                let staff = self.staff.get(&b.staff_id)?;
                Some(BookingDetail {
                    id: b.id,
                    client_name: client.name.clone(),
                    client_email: client.email.clone(),
                    client_phone: client.phone.clone(),
                    service_name: service.name.clone(),
                    staff_name: staff.name.clone(),
                    start_time_ms: b.start_time_ms,
                    end_time_ms: b.end_time_ms,
                    status: b.status,
                    price_cents: service.price_cents,
                    notes: b.notes.clone(),
                    created_at_ms: b.created_at_ms,
                })
            })
            .collect()
    }

    /// Looks up a session.
    pub fn session(&self, id: SessionId) -> Option<&SessionRecord> {
        self.sessions.get(&id)
    }

    /// All sessions, most recent start time first.
    pub fn sessions(&self) -> Vec<&SessionRecord> {
        let mut out: Vec<&SessionRecord> = self.sessions.values().collect();
        out.sort_by(|a, b| {
            b.start_time_ms
                .cmp(&a.start_time_ms)
                .then(b.id.cmp(&a.id))
        });
        out
    }

    /// Sessions a client is enrolled in, most recent first.
    pub fn sessions_for_client(&self, client: ClientId) -> Vec<&SessionRecord> {
        let mut out: Vec<&SessionRecord> = self
            .sessions_by_client
            .get(&client)
            .into_iter()
            .flat_map(|ids| ids.iter())
            .filter_map(|id| self.sessions.get(id))
            .collect();
        out.sort_by(|a, b| {
            b.start_time_ms
                .cmp(&a.start_time_ms)
                .then(b.id.cmp(&a.id))
        });
        out
    }

    /// Mutations recorded since the last drain, in sequence order.
    pub fn drain_pending_ops(&mut self) -> Vec<StoredOp> {
        std::mem::take(&mut self.pending_ops)
    }

    /// Highest mutation sequence issued so far.
    pub fn latest_op_seq(&self) -> OpSeq {
        self.next_op_seq.saturating_sub(1)
    }

    // ---- internals ----

    fn collect_bookings(&self, ids: Option<&Vec<BookingId>>) -> Vec<&BookingRecord> {
        ids.into_iter()
            .flat_map(|ids| ids.iter())
            .filter_map(|id| self.bookings.get(id))
            .collect()
    }

    fn cloned_in_order<T: Clone>(&self, order: &[u64], map: &HashMap<u64, T>) -> Vec<T> {
        order.iter().filter_map(|id| map.get(id).cloned()).collect()
    }

    fn index_booking(&mut self, rec: &BookingRecord) {
        self.bookings_by_staff
            .entry(rec.staff_id)
            .or_default()
            .push(rec.id);
        self.bookings_by_service
            .entry(rec.service_id)
            .or_default()
            .push(rec.id);
        self.bookings_by_client
            .entry(rec.client_id)
            .or_default()
            .push(rec.id);
        self.bookings_by_status
            .entry(rec.status)
            .or_default()
            .push(rec.id);
    }

    fn unindex_booking(&mut self, rec: &BookingRecord) {
        if let Some(ids) = self.bookings_by_staff.get_mut(&rec.staff_id) {
            remove_first(ids, &rec.id);
        }
        if let Some(ids) = self.bookings_by_service.get_mut(&rec.service_id) {
            remove_first(ids, &rec.id);
        }
        if let Some(ids) = self.bookings_by_client.get_mut(&rec.client_id) {
            remove_first(ids, &rec.id);
        }
        if let Some(ids) = self.bookings_by_status.get_mut(&rec.status) {
            remove_first(ids, &rec.id);
        }
    }

    fn index_session(&mut self, rec: &SessionRecord) {
        self.sessions_by_staff
            .entry(rec.staff_id)
            .or_default()
            .push(rec.id);
        self.sessions_by_service
            .entry(rec.service_id)
            .or_default()
            .push(rec.id);
        for client in &rec.enrolled_clients {
            self.sessions_by_client
                .entry(*client)
                .or_default()
                .push(rec.id);
        }
    }

    fn unindex_session(&mut self, rec: &SessionRecord) {
        if let Some(ids) = self.sessions_by_staff.get_mut(&rec.staff_id) {
            remove_first(ids, &rec.id);
        }
        if let Some(ids) = self.sessions_by_service.get_mut(&rec.service_id) {
            remove_first(ids, &rec.id);
        }
        for client in &rec.enrolled_clients {
            if let Some(ids) = self.sessions_by_client.get_mut(client) {
                remove_first(ids, &rec.id);
            }
        }
    }

    fn push_op(&mut self, op: Op) -> StoredOp {
        let seq = self.next_op_seq;
        self.next_op_seq += 1;
        let stored = StoredOp {
            seq,
            ts_ms: now_ms(),
            op,
        };
        self.pending_ops.push(stored.clone());
        stored
    }
}

fn sort_bookings_desc(out: &mut [&BookingRecord]) {
    out.sort_by(|a, b| {
        b.start_time_ms
            .cmp(&a.start_time_ms)
            .then(b.id.cmp(&a.id))
    });
}

fn index_has<K: Eq + std::hash::Hash, V>(index: &VecIndex<K, V>, key: &K) -> bool {
    index.get(key).is_some_and(|ids| !ids.is_empty())
}

fn remove_first<T: PartialEq>(v: &mut Vec<T>, value: &T) {
    if let Some(pos) = v.iter().position(|x| x == value) {
        v.remove(pos);
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
