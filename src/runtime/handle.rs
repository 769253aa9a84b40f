use std::sync::Arc;

use thiserror::Error;
use tokio::{
    sync::{Mutex, broadcast, mpsc, oneshot},
    time::{Duration, Instant},
};
use tracing::{debug, warn};

use crate::{
    core::store::{BookingStore, StoreError},
    op::StoredOp,
    persist::{PersistError, StoreSink},
    record::{
        booking::{BookingDetail, BookingDraft, BookingPatch, BookingRecord},
        client::{ClientDraft, ClientPatch, ClientRecord},
        service::{ServiceDraft, ServicePatch, ServiceRecord},
        session::{SessionDraft, SessionPatch, SessionRecord},
        staff::{StaffDraft, StaffPatch, StaffRecord},
    },
    types::{BookingId, BookingStatus, ClientId, OpSeq, ServiceId, SessionId, StaffId},
};

use super::events::{Entity, StoreEvent};

/// Failure surfaced from the runtime to a caller.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The store rejected the mutation.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Persistence failed or its queue is saturated.
    #[error(transparent)]
    Persist(#[from] PersistError),
    /// The runtime task is gone.
    #[error("runtime channel closed")]
    ChannelClosed,
}

/// Tuning knobs for the runtime and its persistence worker.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Flush the mirror immediately after each record upsert.
    pub flush_on_write: bool,
    /// Maximum ops buffered before a forced mirror write.
    pub batch_max_ops: usize,
    /// Maximum milliseconds an op may sit buffered.
    pub batch_max_latency_ms: u64,
    /// Bound of the persistence queue; overflow errors the write.
    pub persist_queue_bound: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            flush_on_write: true,
            batch_max_ops: 32,
            batch_max_latency_ms: 75,
            persist_queue_bound: 64,
        }
    }
}

/// Cloneable handle to the single-writer runtime.
pub struct BookingsHandle {
    cmd_tx: mpsc::Sender<Command>,
    events_tx: broadcast::Sender<StoreEvent>,
}

impl Clone for BookingsHandle {
    fn clone(&self) -> Self {
        Self {
            cmd_tx: self.cmd_tx.clone(),
            events_tx: self.events_tx.clone(),
        }
    }
}

enum Command {
    CreateService {
        draft: ServiceDraft,
        resp: oneshot::Sender<Result<ServiceId, RuntimeError>>,
    },
    UpdateService {
        id: ServiceId,
        patch: ServicePatch,
        resp: oneshot::Sender<Result<(), RuntimeError>>,
    },
    DeleteService {
        id: ServiceId,
        resp: oneshot::Sender<Result<(), RuntimeError>>,
    },
    CreateStaff {
        draft: StaffDraft,
        resp: oneshot::Sender<Result<StaffId, RuntimeError>>,
    },
    UpdateStaff {
        id: StaffId,
        patch: StaffPatch,
        resp: oneshot::Sender<Result<(), RuntimeError>>,
    },
    DeleteStaff {
        id: StaffId,
        resp: oneshot::Sender<Result<(), RuntimeError>>,
    },
    AddStaffService {
        staff: StaffId,
        service: ServiceId,
        resp: oneshot::Sender<Result<(), RuntimeError>>,
    },
    RemoveStaffService {
        staff: StaffId,
        service: ServiceId,
        resp: oneshot::Sender<Result<(), RuntimeError>>,
    },
    CreateClient {
        draft: ClientDraft,
        resp: oneshot::Sender<Result<ClientId, RuntimeError>>,
    },
    UpdateClient {
        id: ClientId,
        patch: ClientPatch,
        resp: oneshot::Sender<Result<(), RuntimeError>>,
    },
    DeleteClient {
        id: ClientId,
        resp: oneshot::Sender<Result<Vec<BookingId>, RuntimeError>>,
    },
    CreateBooking {
        draft: BookingDraft,
        resp: oneshot::Sender<Result<BookingId, RuntimeError>>,
    },
    UpdateBooking {
        id: BookingId,
        patch: BookingPatch,
        resp: oneshot::Sender<Result<(), RuntimeError>>,
    },
    DeleteBooking {
        id: BookingId,
        resp: oneshot::Sender<Result<(), RuntimeError>>,
    },
    CreateSession {
        draft: SessionDraft,
        resp: oneshot::Sender<Result<SessionId, RuntimeError>>,
    },
    UpdateSession {
        id: SessionId,
        patch: SessionPatch,
        resp: oneshot::Sender<Result<(), RuntimeError>>,
    },
    DeleteSession {
        id: SessionId,
        resp: oneshot::Sender<Result<(), RuntimeError>>,
    },
    Enroll {
        session: SessionId,
        client: ClientId,
        resp: oneshot::Sender<Result<bool, RuntimeError>>,
    },
    Unenroll {
        session: SessionId,
        client: ClientId,
        resp: oneshot::Sender<Result<bool, RuntimeError>>,
    },
    GetService {
        id: ServiceId,
        resp: oneshot::Sender<Option<ServiceRecord>>,
    },
    Services {
        resp: oneshot::Sender<Vec<ServiceRecord>>,
    },
    GetStaff {
        id: StaffId,
        resp: oneshot::Sender<Option<StaffRecord>>,
    },
    StaffMembers {
        resp: oneshot::Sender<Vec<StaffRecord>>,
    },
    GetClient {
        id: ClientId,
        resp: oneshot::Sender<Option<ClientRecord>>,
    },
    Clients {
        resp: oneshot::Sender<Vec<ClientRecord>>,
    },
    GetBooking {
        id: BookingId,
        resp: oneshot::Sender<Option<BookingRecord>>,
    },
    RecentBookings {
        n: usize,
        resp: oneshot::Sender<Vec<BookingRecord>>,
    },
    BookingsWithStatus {
        status: BookingStatus,
        resp: oneshot::Sender<Vec<BookingRecord>>,
    },
    BookingDetails {
        resp: oneshot::Sender<Vec<BookingDetail>>,
    },
    GetSession {
        id: SessionId,
        resp: oneshot::Sender<Option<SessionRecord>>,
    },
    Sessions {
        resp: oneshot::Sender<Vec<SessionRecord>>,
    },
    Flush {
        resp: oneshot::Sender<Result<OpSeq, RuntimeError>>,
    },
    Shutdown {
        resp: oneshot::Sender<Result<(), RuntimeError>>,
    },
}

enum PersistMsg {
    Op(StoredOp),
    Flush {
        resp: oneshot::Sender<Result<OpSeq, PersistError>>,
    },
    Shutdown {
        resp: oneshot::Sender<()>,
    },
}

/// Spawns the single-writer loop over `store`, mirroring mutations into
/// `sink` when one is given.
pub fn spawn_bookings(
    store: BookingStore,
    sink: Option<Box<dyn StoreSink>>,
    config: RuntimeConfig,
) -> BookingsHandle {
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<Command>(256);
    let (events_tx, _) = broadcast::channel::<StoreEvent>(1024);

    let (persist_tx_opt, mut durable_rx) = if let Some(sink) = sink {
        let (persist_tx, persist_rx) = mpsc::channel::<PersistMsg>(config.persist_queue_bound);
        let (durable_tx, durable_rx) = mpsc::unbounded_channel::<Result<OpSeq, PersistError>>();
        spawn_persistence_worker(sink, persist_rx, durable_tx, config.clone());
        (Some(persist_tx), Some(durable_rx))
    } else {
        (None, None)
    };

    let events_tx_loop = events_tx.clone();

    tokio::spawn(async move {
        let mut store = store;

        loop {
            if let Some(rx) = durable_rx.as_mut() {
                tokio::select! {
                    cmd = cmd_rx.recv() => {
                        let Some(cmd) = cmd else { break; };
                        if handle_command(cmd, &mut store, &events_tx_loop, persist_tx_opt.as_ref()).await {
                            break;
                        }
                    }
                    durable = rx.recv() => {
                        if let Some(Ok(op_seq)) = durable {
                            let _ = events_tx_loop.send(StoreEvent::DurableUpTo { op_seq });
                        }
                    }
                }
            } else {
                let Some(cmd) = cmd_rx.recv().await else { break; };
                if handle_command(cmd, &mut store, &events_tx_loop, persist_tx_opt.as_ref()).await {
                    break;
                }
            }
        }
    });

    BookingsHandle { cmd_tx, events_tx }
}

impl BookingsHandle {
    /// Subscribes to the runtime's event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events_tx.subscribe()
    }

    /// Creates a service.
    pub async fn create_service(&self, draft: ServiceDraft) -> Result<ServiceId, RuntimeError> {
        self.request(|resp| Command::CreateService { draft, resp })
            .await?
    }

    /// Patches a service.
    pub async fn update_service(
        &self,
        id: ServiceId,
        patch: ServicePatch,
    ) -> Result<(), RuntimeError> {
        self.request(|resp| Command::UpdateService { id, patch, resp })
            .await?
    }

    /// Deletes a service; fails while bookings or sessions reference it.
    pub async fn delete_service(&self, id: ServiceId) -> Result<(), RuntimeError> {
        self.request(|resp| Command::DeleteService { id, resp })
            .await?
    }

    /// Creates a staff member.
    pub async fn create_staff(&self, draft: StaffDraft) -> Result<StaffId, RuntimeError> {
        self.request(|resp| Command::CreateStaff { draft, resp })
            .await?
    }

    /// Patches a staff member.
    pub async fn update_staff(&self, id: StaffId, patch: StaffPatch) -> Result<(), RuntimeError> {
        self.request(|resp| Command::UpdateStaff { id, patch, resp })
            .await?
    }

    /// Deletes a staff member; fails while bookings or sessions reference
    /// them.
    pub async fn delete_staff(&self, id: StaffId) -> Result<(), RuntimeError> {
        self.request(|resp| Command::DeleteStaff { id, resp }).await?
    }

    /// Adds a service to a staff member's set.
    pub async fn add_staff_service(
        &self,
        staff: StaffId,
        service: ServiceId,
    ) -> Result<(), RuntimeError> {
        self.request(|resp| Command::AddStaffService { staff, service, resp })
            .await?
    }

    /// Removes a service from a staff member's set.
    pub async fn remove_staff_service(
        &self,
        staff: StaffId,
        service: ServiceId,
    ) -> Result<(), RuntimeError> {
        self.request(|resp| Command::RemoveStaffService { staff, service, resp })
            .await?
    }

    /// Creates a client.
    pub async fn create_client(&self, draft: ClientDraft) -> Result<ClientId, RuntimeError> {
        self.request(|resp| Command::CreateClient { draft, resp })
            .await?
    }

    /// Patches a client.
    pub async fn update_client(&self, id: ClientId, patch: ClientPatch) -> Result<(), RuntimeError> {
        self.request(|resp| Command::UpdateClient { id, patch, resp })
            .await?
    }

    /// Deletes a client, cascading to its bookings. Returns the booking ids
    /// the cascade removed.
    pub async fn delete_client(&self, id: ClientId) -> Result<Vec<BookingId>, RuntimeError> {
        self.request(|resp| Command::DeleteClient { id, resp })
            .await?
    }

    /// Creates a booking, deriving the end time when absent.
    pub async fn create_booking(&self, draft: BookingDraft) -> Result<BookingId, RuntimeError> {
        self.request(|resp| Command::CreateBooking { draft, resp })
            .await?
    }

    /// Patches a booking.
    pub async fn update_booking(
        &self,
        id: BookingId,
        patch: BookingPatch,
    ) -> Result<(), RuntimeError> {
        self.request(|resp| Command::UpdateBooking { id, patch, resp })
            .await?
    }

    /// Deletes a booking.
    pub async fn delete_booking(&self, id: BookingId) -> Result<(), RuntimeError> {
        self.request(|resp| Command::DeleteBooking { id, resp })
            .await?
    }

    /// Creates a group session.
    pub async fn create_session(&self, draft: SessionDraft) -> Result<SessionId, RuntimeError> {
        self.request(|resp| Command::CreateSession { draft, resp })
            .await?
    }

    /// Patches a session.
    pub async fn update_session(
        &self,
        id: SessionId,
        patch: SessionPatch,
    ) -> Result<(), RuntimeError> {
        self.request(|resp| Command::UpdateSession { id, patch, resp })
            .await?
    }

    /// Deletes a session.
    pub async fn delete_session(&self, id: SessionId) -> Result<(), RuntimeError> {
        self.request(|resp| Command::DeleteSession { id, resp })
            .await?
    }

    /// Enrolls a client into a session. Returns whether the membership
    /// changed.
    pub async fn enroll(&self, session: SessionId, client: ClientId) -> Result<bool, RuntimeError> {
        self.request(|resp| Command::Enroll { session, client, resp })
            .await?
    }

    /// Removes a client from a session. Returns whether the membership
    /// changed.
    pub async fn unenroll(
        &self,
        session: SessionId,
        client: ClientId,
    ) -> Result<bool, RuntimeError> {
        self.request(|resp| Command::Unenroll { session, client, resp })
            .await?
    }

    /// Looks up a service.
    pub async fn service(&self, id: ServiceId) -> Result<Option<ServiceRecord>, RuntimeError> {
        self.request(|resp| Command::GetService { id, resp }).await
    }

    /// Lists services ordered by name.
    pub async fn services(&self) -> Result<Vec<ServiceRecord>, RuntimeError> {
        self.request(|resp| Command::Services { resp }).await
    }

    /// Looks up a staff member.
    pub async fn staff_member(&self, id: StaffId) -> Result<Option<StaffRecord>, RuntimeError> {
        self.request(|resp| Command::GetStaff { id, resp }).await
    }

    /// Lists staff ordered by name.
    pub async fn staff_members(&self) -> Result<Vec<StaffRecord>, RuntimeError> {
        self.request(|resp| Command::StaffMembers { resp }).await
    }

    /// Looks up a client.
    pub async fn client(&self, id: ClientId) -> Result<Option<ClientRecord>, RuntimeError> {
        self.request(|resp| Command::GetClient { id, resp }).await
    }

    /// Lists clients, newest first.
    pub async fn clients(&self) -> Result<Vec<ClientRecord>, RuntimeError> {
        self.request(|resp| Command::Clients { resp }).await
    }

    /// Looks up a booking.
    pub async fn booking(&self, id: BookingId) -> Result<Option<BookingRecord>, RuntimeError> {
        self.request(|resp| Command::GetBooking { id, resp }).await
    }

    /// The `n` most recent bookings by start time.
    pub async fn recent_bookings(&self, n: usize) -> Result<Vec<BookingRecord>, RuntimeError> {
        self.request(|resp| Command::RecentBookings { n, resp })
            .await
    }

    /// Bookings currently carrying `status`, most recent first.
    pub async fn bookings_with_status(
        &self,
        status: BookingStatus,
    ) -> Result<Vec<BookingRecord>, RuntimeError> {
        self.request(|resp| Command::BookingsWithStatus { status, resp })
            .await
    }

    /// Denormalized booking rows for listing surfaces.
    pub async fn booking_details(&self) -> Result<Vec<BookingDetail>, RuntimeError> {
        self.request(|resp| Command::BookingDetails { resp }).await
    }

    /// Looks up a session.
    pub async fn session(&self, id: SessionId) -> Result<Option<SessionRecord>, RuntimeError> {
        self.request(|resp| Command::GetSession { id, resp }).await
    }

    /// Lists sessions, most recent first.
    pub async fn sessions(&self) -> Result<Vec<SessionRecord>, RuntimeError> {
        self.request(|resp| Command::Sessions { resp }).await
    }

    /// Forces buffered ops to the mirror; returns the durable sequence.
    pub async fn flush(&self) -> Result<OpSeq, RuntimeError> {
        self.request(|resp| Command::Flush { resp }).await?
    }

    /// Flushes and stops the runtime.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.request(|resp| Command::Shutdown { resp }).await?
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(make(tx))
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }
}

fn forward_op(
    persist_tx: Option<&mpsc::Sender<PersistMsg>>,
    events_tx: &broadcast::Sender<StoreEvent>,
    store: &BookingStore,
    stored: StoredOp,
) -> Result<(), RuntimeError> {
    if let Some(tx) = persist_tx {
        tx.try_send(PersistMsg::Op(stored)).map_err(|err| {
            RuntimeError::Persist(PersistError::Message(format!("persist queue error: {err}")))
        })?;
    } else {
        let _ = events_tx.send(StoreEvent::DurableUpTo {
            op_seq: store.latest_op_seq(),
        });
    }
    Ok(())
}

async fn handle_command(
    cmd: Command,
    store: &mut BookingStore,
    events_tx: &broadcast::Sender<StoreEvent>,
    persist_tx: Option<&mpsc::Sender<PersistMsg>>,
) -> bool {
    match cmd {
        Command::CreateService { draft, resp } => {
            let res = store
                .create_service(draft)
                .map_err(RuntimeError::from)
                .and_then(|(id, stored)| {
                    forward_op(persist_tx, events_tx, store, stored)?;
                    let _ = events_tx.send(StoreEvent::Created {
                        entity: Entity::Service,
                        id,
                    });
                    Ok(id)
                });
            let _ = resp.send(res);
        }
        Command::UpdateService { id, patch, resp } => {
            let res = store
                .update_service(id, patch)
                .map_err(RuntimeError::from)
                .and_then(|(_, stored)| {
                    forward_op(persist_tx, events_tx, store, stored)?;
                    let _ = events_tx.send(StoreEvent::Updated {
                        entity: Entity::Service,
                        id,
                    });
                    Ok(())
                });
            let _ = resp.send(res);
        }
        Command::DeleteService { id, resp } => {
            let res = store
                .delete_service(id)
                .map_err(RuntimeError::from)
                .and_then(|(_, stored)| {
                    forward_op(persist_tx, events_tx, store, stored)?;
                    let _ = events_tx.send(StoreEvent::Deleted {
                        entity: Entity::Service,
                        id,
                    });
                    Ok(())
                });
            let _ = resp.send(res);
        }
        Command::CreateStaff { draft, resp } => {
            let res = store
                .create_staff(draft)
                .map_err(RuntimeError::from)
                .and_then(|(id, stored)| {
                    forward_op(persist_tx, events_tx, store, stored)?;
                    let _ = events_tx.send(StoreEvent::Created {
                        entity: Entity::Staff,
                        id,
                    });
                    Ok(id)
                });
            let _ = resp.send(res);
        }
        Command::UpdateStaff { id, patch, resp } => {
            let res = store
                .update_staff(id, patch)
                .map_err(RuntimeError::from)
                .and_then(|(_, stored)| {
                    forward_op(persist_tx, events_tx, store, stored)?;
                    let _ = events_tx.send(StoreEvent::Updated {
                        entity: Entity::Staff,
                        id,
                    });
                    Ok(())
                });
            let _ = resp.send(res);
        }
        Command::DeleteStaff { id, resp } => {
            let res = store
                .delete_staff(id)
                .map_err(RuntimeError::from)
                .and_then(|(_, stored)| {
                    forward_op(persist_tx, events_tx, store, stored)?;
                    let _ = events_tx.send(StoreEvent::Deleted {
                        entity: Entity::Staff,
                        id,
                    });
                    Ok(())
                });
            let _ = resp.send(res);
        }
        Command::AddStaffService {
            staff,
            service,
            resp,
        } => {
            let res = store
                .add_staff_service(staff, service)
                .map_err(RuntimeError::from)
                .and_then(|(_, stored)| {
                    forward_op(persist_tx, events_tx, store, stored)?;
                    let _ = events_tx.send(StoreEvent::Updated {
                        entity: Entity::Staff,
                        id: staff,
                    });
                    Ok(())
                });
            let _ = resp.send(res);
        }
        Command::RemoveStaffService {
            staff,
            service,
            resp,
        } => {
            let res = store
                .remove_staff_service(staff, service)
                .map_err(RuntimeError::from)
                .and_then(|(_, stored)| {
                    forward_op(persist_tx, events_tx, store, stored)?;
                    let _ = events_tx.send(StoreEvent::Updated {
                        entity: Entity::Staff,
                        id: staff,
                    });
                    Ok(())
                });
            let _ = resp.send(res);
        }
        Command::CreateClient { draft, resp } => {
            let res = store
                .create_client(draft)
                .map_err(RuntimeError::from)
                .and_then(|(id, stored)| {
                    forward_op(persist_tx, events_tx, store, stored)?;
                    let _ = events_tx.send(StoreEvent::Created {
                        entity: Entity::Client,
                        id,
                    });
                    Ok(id)
                });
            let _ = resp.send(res);
        }
        Command::UpdateClient { id, patch, resp } => {
            let res = store
                .update_client(id, patch)
                .map_err(RuntimeError::from)
                .and_then(|(_, stored)| {
                    forward_op(persist_tx, events_tx, store, stored)?;
                    let _ = events_tx.send(StoreEvent::Updated {
                        entity: Entity::Client,
                        id,
                    });
                    Ok(())
                });
            let _ = resp.send(res);
        }
        Command::DeleteClient { id, resp } => {
            let res = store
                .delete_client(id)
                .map_err(RuntimeError::from)
                .and_then(|(bookings, stored)| {
                    forward_op(persist_tx, events_tx, store, stored)?;
                    let _ = events_tx.send(StoreEvent::Deleted {
                        entity: Entity::Client,
                        id,
                    });
                    if !bookings.is_empty() {
                        let _ = events_tx.send(StoreEvent::ClientCascade {
                            client: id,
                            bookings: bookings.clone(),
                        });
                    }
                    Ok(bookings)
                });
            let _ = resp.send(res);
        }
        Command::CreateBooking { draft, resp } => {
            let res = store
                .create_booking(draft)
                .map_err(RuntimeError::from)
                .and_then(|(id, stored)| {
                    forward_op(persist_tx, events_tx, store, stored)?;
                    let _ = events_tx.send(StoreEvent::Created {
                        entity: Entity::Booking,
                        id,
                    });
                    Ok(id)
                });
            let _ = resp.send(res);
        }
        Command::UpdateBooking { id, patch, resp } => {
            let res = store
                .update_booking(id, patch)
                .map_err(RuntimeError::from)
                .and_then(|(_, stored)| {
                    forward_op(persist_tx, events_tx, store, stored)?;
                    let _ = events_tx.send(StoreEvent::Updated {
                        entity: Entity::Booking,
                        id,
                    });
                    Ok(())
                });
            let _ = resp.send(res);
        }
        Command::DeleteBooking { id, resp } => {
            let res = store
                .delete_booking(id)
                .map_err(RuntimeError::from)
                .and_then(|(_, stored)| {
                    forward_op(persist_tx, events_tx, store, stored)?;
                    let _ = events_tx.send(StoreEvent::Deleted {
                        entity: Entity::Booking,
                        id,
                    });
                    Ok(())
                });
            let _ = resp.send(res);
        }
        Command::CreateSession { draft, resp } => {
            let res = store
                .create_session(draft)
                .map_err(RuntimeError::from)
                .and_then(|(id, stored)| {
                    forward_op(persist_tx, events_tx, store, stored)?;
                    let _ = events_tx.send(StoreEvent::Created {
                        entity: Entity::Session,
                        id,
                    });
                    Ok(id)
                });
            let _ = resp.send(res);
        }
        Command::UpdateSession { id, patch, resp } => {
            let res = store
                .update_session(id, patch)
                .map_err(RuntimeError::from)
                .and_then(|(_, stored)| {
                    forward_op(persist_tx, events_tx, store, stored)?;
                    let _ = events_tx.send(StoreEvent::Updated {
                        entity: Entity::Session,
                        id,
                    });
                    Ok(())
                });
            let _ = resp.send(res);
        }
        Command::DeleteSession { id, resp } => {
            let res = store
                .delete_session(id)
                .map_err(RuntimeError::from)
                .and_then(|(_, stored)| {
                    forward_op(persist_tx, events_tx, store, stored)?;
                    let _ = events_tx.send(StoreEvent::Deleted {
                        entity: Entity::Session,
                        id,
                    });
                    Ok(())
                });
            let _ = resp.send(res);
        }
        Command::Enroll {
            session,
            client,
            resp,
        } => {
            let res = store
                .enroll(session, client)
                .map_err(RuntimeError::from)
                .and_then(|(changed, stored)| {
                    forward_op(persist_tx, events_tx, store, stored)?;
                    if changed {
                        let _ = events_tx.send(StoreEvent::EnrollmentChanged {
                            session,
                            client,
                            enrolled: true,
                        });
                    }
                    Ok(changed)
                });
            let _ = resp.send(res);
        }
        Command::Unenroll {
            session,
            client,
            resp,
        } => {
            let res = store
                .unenroll(session, client)
                .map_err(RuntimeError::from)
                .and_then(|(changed, stored)| {
                    forward_op(persist_tx, events_tx, store, stored)?;
                    if changed {
                        let _ = events_tx.send(StoreEvent::EnrollmentChanged {
                            session,
                            client,
                            enrolled: false,
                        });
                    }
                    Ok(changed)
                });
            let _ = resp.send(res);
        }
        Command::GetService { id, resp } => {
            let _ = resp.send(store.service(id).cloned());
        }
        Command::Services { resp } => {
            let _ = resp.send(store.services().into_iter().cloned().collect());
        }
        Command::GetStaff { id, resp } => {
            let _ = resp.send(store.staff_member(id).cloned());
        }
        Command::StaffMembers { resp } => {
            let _ = resp.send(store.staff_members().into_iter().cloned().collect());
        }
        Command::GetClient { id, resp } => {
            let _ = resp.send(store.client(id).cloned());
        }
        Command::Clients { resp } => {
            let _ = resp.send(store.clients().into_iter().cloned().collect());
        }
        Command::GetBooking { id, resp } => {
            let _ = resp.send(store.booking(id).cloned());
        }
        Command::RecentBookings { n, resp } => {
            let _ = resp.send(store.recent_bookings(n).into_iter().cloned().collect());
        }
        Command::BookingsWithStatus { status, resp } => {
            let _ = resp.send(
                store
                    .bookings_with_status(status)
                    .into_iter()
                    .cloned()
                    .collect(),
            );
        }
        Command::BookingDetails { resp } => {
            let _ = resp.send(store.booking_details());
        }
        Command::GetSession { id, resp } => {
            let _ = resp.send(store.session(id).cloned());
        }
        Command::Sessions { resp } => {
            let _ = resp.send(store.sessions().into_iter().cloned().collect());
        }
        Command::Flush { resp } => {
            let out = if let Some(tx) = persist_tx {
                let (flush_tx, flush_rx) = oneshot::channel();
                if tx.send(PersistMsg::Flush { resp: flush_tx }).await.is_err() {
                    Err(RuntimeError::ChannelClosed)
                } else {
                    flush_rx
                        .await
                        .map_err(|_| RuntimeError::ChannelClosed)
                        .and_then(|r| r.map_err(RuntimeError::from))
                }
            } else {
                Ok(store.latest_op_seq())
            };
            let _ = resp.send(out);
        }
        Command::Shutdown { resp } => {
            let out = if let Some(tx) = persist_tx {
                let (done_tx, done_rx) = oneshot::channel();
                if tx.send(PersistMsg::Shutdown { resp: done_tx }).await.is_err() {
                    Err(RuntimeError::ChannelClosed)
                } else {
                    done_rx.await.map_err(|_| RuntimeError::ChannelClosed)
                }
            } else {
                Ok(())
            };
            let _ = resp.send(out);
            return true;
        }
    }

    false
}

fn spawn_persistence_worker(
    sink: Box<dyn StoreSink>,
    mut rx: mpsc::Receiver<PersistMsg>,
    durable_tx: mpsc::UnboundedSender<Result<OpSeq, PersistError>>,
    config: RuntimeConfig,
) {
    let sink = Arc::new(Mutex::new(sink));
    tokio::spawn(async move {
        let mut buf = Vec::<StoredOp>::new();
        let mut deadline = Instant::now() + Duration::from_millis(config.batch_max_latency_ms);
        let mut last_durable: OpSeq = 0;

        loop {
            tokio::select! {
                msg = rx.recv() => {
                    let Some(msg) = msg else {
                        let _ = flush_buf(&sink, &mut buf, &mut last_durable, &durable_tx, true).await;
                        break;
                    };

                    match msg {
                        PersistMsg::Op(stored) => {
                            buf.push(stored);

                            if config.flush_on_write || buf.len() >= config.batch_max_ops {
                                let _ = flush_buf(&sink, &mut buf, &mut last_durable, &durable_tx, true).await;
                                deadline = Instant::now() + Duration::from_millis(config.batch_max_latency_ms);
                            }
                        }
                        PersistMsg::Flush { resp } => {
                            let result = flush_buf(&sink, &mut buf, &mut last_durable, &durable_tx, true).await;
                            let _ = resp.send(result.map(|_| last_durable));
                            deadline = Instant::now() + Duration::from_millis(config.batch_max_latency_ms);
                        }
                        PersistMsg::Shutdown { resp } => {
                            let _ = flush_buf(&sink, &mut buf, &mut last_durable, &durable_tx, true).await;
                            let _ = resp.send(());
                            break;
                        }
                    }
                }
                _ = tokio::time::sleep_until(deadline), if !buf.is_empty() => {
                    let _ = flush_buf(&sink, &mut buf, &mut last_durable, &durable_tx, false).await;
                    deadline = Instant::now() + Duration::from_millis(config.batch_max_latency_ms);
                }
            }
        }
        debug!("persistence worker stopped");
    });
}

async fn flush_buf(
    sink: &Arc<Mutex<Box<dyn StoreSink>>>,
    buf: &mut Vec<StoredOp>,
    last_durable: &mut OpSeq,
    durable_tx: &mpsc::UnboundedSender<Result<OpSeq, PersistError>>,
    call_flush: bool,
) -> Result<(), PersistError> {
    if buf.is_empty() {
        if call_flush {
            let sink_ref = Arc::clone(sink);
            tokio::task::spawn_blocking(move || {
                let mut sink = sink_ref.blocking_lock();
                sink.flush()
            })
            .await
            .map_err(|e| PersistError::Message(format!("join error: {e}")))??;
        }
        return Ok(());
    }

    let ops = std::mem::take(buf);
    let sink_ref = Arc::clone(sink);
    let apply_res: Result<OpSeq, PersistError> = tokio::task::spawn_blocking(move || {
        let mut sink = sink_ref.blocking_lock();
        let seq = sink.apply_ops(&ops)?;
        if call_flush {
            sink.flush()?;
        }
        Ok(seq)
    })
    .await
    .map_err(|e| PersistError::Message(format!("join error: {e}")))?;

    match apply_res {
        Ok(seq) => {
            *last_durable = (*last_durable).max(seq);
            let _ = durable_tx.send(Ok(*last_durable));
            Ok(())
        }
        Err(err) => {
            warn!(error = %err, "mirror write failed");
            let _ = durable_tx.send(Err(PersistError::Message(format!("apply failed: {err}"))));
            Err(err)
        }
    }
}
