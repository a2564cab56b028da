//! The sliding sync protocol driver.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use assign::assign;
use js_int::UInt;
use sliding_sync_api::{
    Request, Response,
    request::{List, RoomSubscription},
};
use tokio::sync::{Notify, mpsc};
use tracing::{debug, warn};

use crate::{
    error::{Error, TransportError},
    events::{LifecycleEvent, LifecycleState, ListEvent, Observers, RoomDataEvent, SyncEvent},
    extensions::{Extension, ExtensionPhase, ExtensionRegistry},
    list::{ListData, SlidingList},
    ops,
    subscriptions::SubscriptionSet,
    transport::Transport,
    txn::{TransactionLedger, TxnHandle},
};

/// How much longer than the server the client keeps a poll open, so that a
/// well-behaved server always times out first.
const BUFFER_PERIOD: Duration = Duration::from_secs(10);

/// How long to wait before re-opening the poll after a failure.
const BACKOFF_PERIOD: Duration = Duration::from_secs(3);

const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(30);

/// A sliding sync connection.
///
/// Drives a single continuously re-opened long-poll against a sync proxy,
/// maintaining windowed views of the server's room list. Cheap to clone;
/// clones share the connection.
///
/// Construct one with [`builder`][Self::builder], subscribe to its events
/// with [`subscribe`][Self::subscribe], then run [`start`][Self::start] —
/// typically in a spawned task. All other methods may be called from any
/// task while the loop runs; mutations interrupt the in-flight poll so the
/// next request reflects them.
pub struct SlidingSync<T>(Arc<SyncData<T>>);

struct SyncData<T> {
    transport: T,
    poll_timeout: Duration,
    state: Mutex<State>,
    registry: Mutex<ExtensionRegistry>,
    observers: Mutex<Observers>,
    interrupt: Notify,
    terminated: AtomicBool,
}

/// The engine-owned mutable state.
///
/// Guarded by a mutex that is only ever held between suspension points.
#[derive(Debug)]
struct State {
    lists: Vec<SlidingList>,
    subscriptions: SubscriptionSet,
    ledger: TransactionLedger,
    /// The sync position; `None` until the first successful response.
    pos: Option<String>,
    /// The txn id to attach to the next request, if any.
    txn_id: Option<String>,
    needs_resend: bool,
    /// Bumped by every [`SlidingSync::set_list`], so a response that raced
    /// a list reshape can be detected and its list operations skipped.
    list_modified_count: u64,
}

/// What a request looked like at composition time, kept for processing its
/// response.
struct RequestContext {
    list_modified_count: u64,
    new_subscriptions: BTreeSet<String>,
    gone_subscriptions: BTreeSet<String>,
}

impl SlidingSync<()> {
    /// Creates a new sliding sync builder.
    pub fn builder() -> SlidingSyncBuilder {
        SlidingSyncBuilder::new()
    }
}

impl<T> SlidingSync<T> {
    /// The number of configured lists.
    pub fn list_length(&self) -> usize {
        self.0.state.lock().expect("state mutex was poisoned").lists.len()
    }

    /// A clone of the request parameters of the list at `index`, or `None`
    /// if there is no such list.
    pub fn get_list(&self, index: usize) -> Option<List> {
        let state = self.0.state.lock().expect("state mutex was poisoned");
        state.lists.get(index).map(|list| list.params().clone())
    }

    /// A snapshot of the derived state of the list at `index`, or `None` if
    /// there is no such list.
    pub fn get_list_data(&self, index: usize) -> Option<ListData> {
        let state = self.0.state.lock().expect("state mutex was poisoned");
        state.lists.get(index).map(SlidingList::data)
    }

    /// A clone of the currently desired room subscriptions.
    pub fn get_room_subscriptions(&self) -> BTreeSet<String> {
        self.0.state.lock().expect("state mutex was poisoned").subscriptions.desired().clone()
    }

    /// Registers a named custom subscription params template.
    ///
    /// Re-registering an existing name is ignored.
    pub fn add_custom_subscription(&self, name: String, params: RoomSubscription) {
        let mut state = self.0.state.lock().expect("state mutex was poisoned");
        state.subscriptions.add_custom(name, params);
    }

    /// Pins `room_id` to the custom subscription template `name`, so that
    /// its subscription is transmitted with that template's params instead
    /// of the default ones.
    ///
    /// Unknown template names are ignored. Takes effect with the next
    /// request that (re-)subscribes the room; to force that, follow up with
    /// [`modify_room_subscriptions`][Self::modify_room_subscriptions].
    pub fn use_custom_subscription(&self, room_id: String, name: &str) {
        let mut state = self.0.state.lock().expect("state mutex was poisoned");
        state.subscriptions.use_custom(room_id, name);
    }

    /// Registers an extension.
    ///
    /// Fails with [`Error::DuplicateExtension`] if an extension with the
    /// same name is already registered.
    pub fn register_extension(&self, extension: impl Extension + 'static) -> Result<(), Error> {
        let mut registry = self.0.registry.lock().expect("registry mutex was poisoned");
        registry.register(Box::new(extension))
    }

    /// Subscribes to the engine's event stream.
    ///
    /// Events within one response arrive in the contractual order described
    /// on [`SyncEvent`].
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<SyncEvent> {
        self.0.observers.lock().expect("observers mutex was poisoned").subscribe()
    }

    /// Stops the engine: the loop exits at the next iteration boundary, the
    /// in-flight poll is abandoned, and all subscribers are detached.
    pub fn stop(&self) {
        debug!("stopping sliding sync");
        self.0.terminated.store(true, Ordering::Release);
        self.0.interrupt.notify_one();
        self.0.observers.lock().expect("observers mutex was poisoned").clear();
    }

    fn emit(&self, event: SyncEvent) {
        self.0.observers.lock().expect("observers mutex was poisoned").emit(event);
    }

    fn needs_resend(&self) -> bool {
        self.0.state.lock().expect("state mutex was poisoned").needs_resend
    }
}

impl<T: Transport> SlidingSync<T> {
    /// Interrupts the in-flight poll so the next request is composed from
    /// current state.
    ///
    /// Returns a handle that resolves once a response acknowledges the
    /// transaction attached to that request, or rejects if the transaction
    /// is superseded by a later `resend` before being acknowledged. Several
    /// calls may collapse into a single round trip; each still gets its own
    /// observable outcome.
    pub fn resend(&self) -> TxnHandle {
        let txn_id = self.0.transport.make_txn_id();
        debug!(%txn_id, "resend requested");

        let handle = {
            let mut state = self.0.state.lock().expect("state mutex was poisoned");
            state.needs_resend = true;
            state.txn_id = Some(txn_id.clone());
            state.ledger.issue(txn_id)
        };
        self.0.interrupt.notify_one();
        handle
    }

    /// Replaces the list at `index`, or appends a new list if `index` is
    /// exactly the current number of lists.
    ///
    /// Replacing invalidates the list's derived state and marks its sticky
    /// parameters for retransmission. Interrupts the in-flight poll; the
    /// returned handle tracks the acknowledgement like
    /// [`resend`][Self::resend]'s.
    pub fn set_list(&self, index: usize, list: List) -> Result<TxnHandle, Error> {
        {
            let mut state = self.0.state.lock().expect("state mutex was poisoned");
            let len = state.lists.len();
            match index.cmp(&len) {
                std::cmp::Ordering::Less => state.lists[index].replace(list),
                std::cmp::Ordering::Equal => state.lists.push(SlidingList::new(list)),
                std::cmp::Ordering::Greater => {
                    return Err(Error::ListIndexOutOfBounds { index, len });
                }
            }
            state.list_modified_count += 1;
        }
        Ok(self.resend())
    }

    /// Updates only the window ranges of the list at `index`.
    ///
    /// Ranges are not sticky, so this does not cause the other parameters
    /// to be retransmitted. Interrupts the in-flight poll; the returned
    /// handle tracks the acknowledgement like [`resend`][Self::resend]'s.
    pub fn set_list_ranges(
        &self,
        index: usize,
        ranges: Vec<(UInt, UInt)>,
    ) -> Result<TxnHandle, Error> {
        {
            let mut state = self.0.state.lock().expect("state mutex was poisoned");
            let len = state.lists.len();
            let list = state
                .lists
                .get_mut(index)
                .ok_or(Error::ListIndexOutOfBounds { index, len })?;
            list.update_ranges(ranges);
        }
        Ok(self.resend())
    }

    /// Replaces the set of desired room subscriptions.
    ///
    /// The next request carries the diff against what the server already
    /// knows. The returned handle tracks the acknowledgement like
    /// [`resend`][Self::resend]'s.
    pub fn modify_room_subscriptions(&self, rooms: BTreeSet<String>) -> TxnHandle {
        self.0
            .state
            .lock()
            .expect("state mutex was poisoned")
            .subscriptions
            .set_desired(rooms);
        self.resend()
    }

    /// Replaces the default subscription params template.
    ///
    /// All confirmed subscriptions are forgotten so that every desired room
    /// is re-sent with the new params. The returned handle tracks the
    /// acknowledgement like [`resend`][Self::resend]'s.
    pub fn modify_room_subscription_info(&self, params: RoomSubscription) -> TxnHandle {
        self.0
            .state
            .lock()
            .expect("state mutex was poisoned")
            .subscriptions
            .replace_template(params);
        self.resend()
    }

    /// Runs the sync loop.
    ///
    /// Returns only once [`stop`][Self::stop] has been observed. Transport
    /// failures never terminate the loop; they surface to subscribers as
    /// [`LifecycleEvent`]s and are retried after a short backoff.
    pub async fn start(&self) {
        debug!("sliding sync loop starting");

        while !self.0.terminated.load(Ordering::Acquire) {
            let (request, ctx) = self.compose_request();

            // Biased so that a response that has already arrived is
            // processed rather than thrown away when an interrupt comes in
            // at the same moment; the interrupt permit survives to the next
            // iteration either way.
            let outcome = tokio::select! {
                biased;
                outcome = self.0.transport.sliding_sync(request) => outcome,
                () = self.0.interrupt.notified() => {
                    debug!("in-flight poll interrupted");
                    continue;
                }
            };

            match outcome {
                Ok(response) => self.process_response(response, ctx),
                Err(TransportError::Aborted) => {
                    // the transport cancelled on our behalf; recompose
                }
                Err(err @ TransportError::Http { .. }) => {
                    warn!(error = %err, "poll failed");
                    self.emit(SyncEvent::Lifecycle(LifecycleEvent {
                        state: LifecycleState::RequestFinished,
                        response: None,
                        error: Some(Arc::new(err)),
                    }));
                    self.backoff().await;
                }
                Err(err) => {
                    if !self.needs_resend() {
                        warn!(error = %err, "poll failed without a response");
                        self.backoff().await;
                    }
                }
            }
        }

        debug!("sliding sync loop terminated");
    }

    fn compose_request(&self) -> (Request, RequestContext) {
        let is_initial = self.0.state.lock().expect("state mutex was poisoned").pos.is_none();
        let extensions = self
            .0
            .registry
            .lock()
            .expect("registry mutex was poisoned")
            .compose_request(is_initial);

        let mut state = self.0.state.lock().expect("state mutex was poisoned");
        state.needs_resend = false;

        let (new_subscriptions, gone_subscriptions) = state.subscriptions.diff();
        let room_subscriptions: BTreeMap<String, RoomSubscription> = new_subscriptions
            .iter()
            .map(|room_id| (room_id.clone(), state.subscriptions.params_for(room_id).clone()))
            .collect();

        let request = assign!(Request::new(), {
            pos: state.pos.clone(),
            txn_id: state.txn_id.take(),
            timeout: Some(self.0.poll_timeout),
            client_timeout: Some(self.0.poll_timeout + BUFFER_PERIOD),
            lists: state.lists.iter().map(|list| list.snapshot(false)).collect(),
            room_subscriptions: room_subscriptions,
            unsubscribe_rooms: gone_subscriptions.iter().cloned().collect(),
            extensions: extensions,
        });

        let ctx = RequestContext {
            list_modified_count: state.list_modified_count,
            new_subscriptions,
            gone_subscriptions,
        };

        (request, ctx)
    }

    fn process_response(&self, response: Response, ctx: RequestContext) {
        let response = Arc::new(response);
        debug!(pos = %response.pos, rooms = response.rooms.len(), "processing response");

        let stale_lists;
        {
            let mut state = self.0.state.lock().expect("state mutex was poisoned");
            state.pos = Some(response.pos.clone());
            state
                .subscriptions
                .confirm(&ctx.new_subscriptions, &ctx.gone_subscriptions);

            // A list reshape while the poll was in flight means the server's
            // operations refer to windows we no longer have; rooms are still
            // processed, the positional replay is not.
            stale_lists = state.list_modified_count != ctx.list_modified_count;

            for (index, list) in state.lists.iter_mut().enumerate() {
                list.clear_modified();
                if let Some(update) = response.lists.get(index) {
                    list.set_joined_count(update.count);
                }
            }
        }

        self.emit(SyncEvent::Lifecycle(LifecycleEvent {
            state: LifecycleState::RequestFinished,
            response: Some(Arc::clone(&response)),
            error: None,
        }));

        self.0
            .registry
            .lock()
            .expect("registry mutex was poisoned")
            .dispatch(ExtensionPhase::PreProcess, &response.extensions);

        for (room_id, room) in &response.rooms {
            self.emit(SyncEvent::RoomData(RoomDataEvent {
                room_id: room_id.clone(),
                room: room.clone(),
            }));
        }

        let mut list_events = Vec::new();
        if stale_lists {
            debug!("lists were reshaped while the poll was in flight, skipping list operations");
        } else {
            let mut state = self.0.state.lock().expect("state mutex was poisoned");
            for (index, update) in response.lists.iter().enumerate() {
                if update.ops.is_empty() {
                    continue;
                }
                let Some(list) = state.lists.get_mut(index) else {
                    warn!(index, "server sent operations for an unknown list");
                    continue;
                };
                ops::replay(list, update);
                list_events.push(ListEvent {
                    index,
                    joined_count: list.joined_count(),
                    room_index_to_room_id: list.room_index_to_room_id().clone(),
                });
            }
        }

        self.emit(SyncEvent::Lifecycle(LifecycleEvent {
            state: LifecycleState::Complete,
            response: Some(Arc::clone(&response)),
            error: None,
        }));

        self.0
            .registry
            .lock()
            .expect("registry mutex was poisoned")
            .dispatch(ExtensionPhase::PostProcess, &response.extensions);

        for event in list_events {
            self.emit(SyncEvent::List(event));
        }

        if let Some(txn_id) = &response.txn_id {
            self.0
                .state
                .lock()
                .expect("state mutex was poisoned")
                .ledger
                .acknowledge(txn_id);
        }
    }

    async fn backoff(&self) {
        tokio::select! {
            () = tokio::time::sleep(BACKOFF_PERIOD) => {}
            () = self.0.interrupt.notified() => debug!("backoff interrupted"),
        }
    }
}

impl<T> Clone for SlidingSync<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T: fmt::Debug> fmt::Debug for SlidingSync<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlidingSync")
            .field("transport", &self.0.transport)
            .field("poll_timeout", &self.0.poll_timeout)
            .finish_non_exhaustive()
    }
}

/// A [`SlidingSync`] builder.
///
/// This type can be used to configure the poll timeout, the initial lists
/// and the default room subscription params before handing over a
/// [`Transport`].
#[derive(Clone, Debug)]
pub struct SlidingSyncBuilder {
    poll_timeout: Duration,
    lists: Vec<List>,
    room_subscription_info: RoomSubscription,
}

impl SlidingSyncBuilder {
    fn new() -> Self {
        Self {
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            lists: Vec::new(),
            room_subscription_info: RoomSubscription::new(),
        }
    }

    /// Sets how long the server may hold each poll open.
    ///
    /// The client-side guard is always this plus a fixed buffer, so the
    /// server times out first.
    pub fn poll_timeout(self, poll_timeout: Duration) -> Self {
        Self { poll_timeout, ..self }
    }

    /// Appends an initial list.
    ///
    /// Its full parameter set is transmitted with the first request.
    pub fn list(mut self, list: List) -> Self {
        self.lists.push(list);
        self
    }

    /// Sets the default params template for room subscriptions.
    pub fn room_subscription_info(self, params: RoomSubscription) -> Self {
        Self { room_subscription_info: params, ..self }
    }

    /// Finishes building the [`SlidingSync`] around the given transport.
    pub fn build<T: Transport>(self, transport: T) -> SlidingSync<T> {
        SlidingSync(Arc::new(SyncData {
            transport,
            poll_timeout: self.poll_timeout,
            state: Mutex::new(State {
                lists: self.lists.into_iter().map(SlidingList::new).collect(),
                subscriptions: SubscriptionSet::new(self.room_subscription_info),
                ledger: TransactionLedger::default(),
                pos: None,
                txn_id: None,
                needs_resend: false,
                list_modified_count: 0,
            }),
            registry: Mutex::new(ExtensionRegistry::default()),
            observers: Mutex::new(Observers::default()),
            interrupt: Notify::new(),
            terminated: AtomicBool::new(false),
        }))
    }
}
