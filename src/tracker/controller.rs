use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::api::{ApiClient, ApiError, IntentsApi};
use crate::cancel::CancelToken;
use crate::config::Config;
use crate::intent::{CreateIntentParams, CreateIntentRequest, PaymentIntent};
use crate::notify::{
    Notification, NotificationSink, CANCEL_FAILED, CREATE_FAILED, FETCH_FAILED, INTENT_CREATED,
    PAYMENT_CANCELLED, TRANSACTION_SUBMITTED,
};
use crate::store::{IntentState, IntentStore, StoreAction};
use crate::tracker::error::TrackerError;
use crate::transport::{self, ChannelEvent, EventChannel};

/// Keeps one payment intent in sync between the REST API, the shared
/// event channel and an [`IntentStore`].
///
/// At most one intent is subscribed at a time. `close()` (or dropping the
/// tracker) stops the event pump, unsubscribes and abandons in-flight
/// calls; the shared channel itself stays open.
pub struct PaymentIntentTracker {
    api: IntentsApi,
    channel: EventChannel,
    store: IntentStore,
    sink: Arc<dyn NotificationSink>,
    user_id: Option<String>,
    cancel: CancelToken,
    tracked: Mutex<Option<Tracked>>,
}

struct Tracked {
    intent_id: String,
    pump: JoinHandle<()>,
}

impl PaymentIntentTracker {
    pub fn new(api: IntentsApi, channel: EventChannel, sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            api,
            channel,
            store: IntentStore::new(),
            sink,
            user_id: None,
            cancel: CancelToken::new(),
            tracked: Mutex::new(None),
        }
    }

    /// Tracker over the process-wide event channel. Requires a bearer token.
    pub fn from_config(
        config: &Config,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<Self, TrackerError> {
        let token = config.auth.bearer().ok_or(ApiError::MissingCredential)?;
        let client = ApiClient::new(&config.api, Some(token.clone()))?;
        let channel = transport::shared(&config.events, &token)?;

        Ok(Self::new(IntentsApi::new(client), channel, sink)
            .with_user_id(config.auth.user_id.clone()))
    }

    /// User id sent along with new intents.
    pub fn with_user_id(mut self, user_id: Option<String>) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn store(&self) -> &IntentStore {
        &self.store
    }

    pub fn state(&self) -> IntentState {
        self.store.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<IntentState> {
        self.store.subscribe()
    }

    pub fn channel(&self) -> &EventChannel {
        &self.channel
    }

    /// Identifier currently subscribed on the channel.
    pub fn tracked_id(&self) -> Option<String> {
        self.tracked.lock().as_ref().map(|t| t.intent_id.clone())
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Create an intent, make it the current one and start tracking it.
    pub async fn create_intent(
        &self,
        params: CreateIntentParams,
    ) -> Result<PaymentIntent, TrackerError> {
        self.ensure_open()?;
        let request = CreateIntentRequest::new(params, self.user_id.clone());

        self.store.dispatch(StoreAction::Begin);
        match self.guarded(self.api.create(&request)).await {
            Ok(record) => {
                self.store.dispatch(StoreAction::Replace(record.clone()));
                self.sink
                    .notify(Notification::success(INTENT_CREATED).for_intent(record.id.clone()));
                if let Err(err) = self.track(&record.id).await {
                    tracing::warn!(
                        intent_id = %record.id,
                        error_type = err.error_type(),
                        error = %err,
                        "Created intent but could not subscribe to updates"
                    );
                }
                Ok(record)
            }
            Err(err) => Err(self.fail(err, |_| CREATE_FAILED.to_string())),
        }
    }

    /// Submit a pre-signed transaction. Failures carry the server's message.
    ///
    /// Like every call on an intent, success makes `intent_id` the tracked one.
    pub async fn submit_transaction(
        &self,
        intent_id: &str,
        signed_tx: &str,
    ) -> Result<PaymentIntent, TrackerError> {
        self.ensure_open()?;

        self.store.dispatch(StoreAction::Begin);
        match self.guarded(self.api.submit(intent_id, signed_tx)).await {
            Ok(record) => {
                self.adopt(&record).await;
                self.sink.notify(
                    Notification::success(TRANSACTION_SUBMITTED).for_intent(intent_id.to_string()),
                );
                Ok(record)
            }
            Err(err) => Err(self.fail(err, |err| err.to_string())),
        }
    }

    pub async fn cancel_intent(
        &self,
        intent_id: &str,
        reason: Option<&str>,
    ) -> Result<PaymentIntent, TrackerError> {
        self.ensure_open()?;

        self.store.dispatch(StoreAction::Begin);
        match self.guarded(self.api.cancel(intent_id, reason)).await {
            Ok(record) => {
                self.adopt(&record).await;
                self.sink.notify(
                    Notification::success(PAYMENT_CANCELLED).for_intent(intent_id.to_string()),
                );
                Ok(record)
            }
            Err(err) => Err(self.fail(err, |_| CANCEL_FAILED.to_string())),
        }
    }

    /// Re-fetch the full record. Success is silent.
    pub async fn fetch_intent(&self, intent_id: &str) -> Result<PaymentIntent, TrackerError> {
        self.ensure_open()?;

        self.store.dispatch(StoreAction::Begin);
        match self.guarded(self.api.fetch(intent_id)).await {
            Ok(record) => {
                self.adopt(&record).await;
                Ok(record)
            }
            Err(err) => Err(self.fail(err, |_| FETCH_FAILED.to_string())),
        }
    }

    /// Fetch the tracked intent again. `Ok(None)` when nothing is tracked.
    pub async fn refresh_intent(&self) -> Result<Option<PaymentIntent>, TrackerError> {
        match self.tracked_id() {
            Some(intent_id) => self.fetch_intent(&intent_id).await.map(Some),
            None => Ok(None),
        }
    }

    /// Follow pushed updates for `intent_id`, dropping the previous one.
    ///
    /// Does not fetch; see [`resume`](Self::resume).
    pub async fn track(&self, intent_id: &str) -> Result<(), TrackerError> {
        self.ensure_open()?;

        let previous = {
            let mut tracked = self.tracked.lock();
            if tracked.as_ref().is_some_and(|t| t.intent_id == intent_id) {
                return Ok(());
            }

            if self.store.snapshot().intent_id() != Some(intent_id) {
                self.store.dispatch(StoreAction::Reset);
            }

            let pump = tokio::spawn(pump_events(
                self.channel.events(),
                intent_id.to_string(),
                self.store.clone(),
                Arc::clone(&self.sink),
                self.cancel.clone(),
            ));
            tracked.replace(Tracked {
                intent_id: intent_id.to_string(),
                pump,
            })
        };

        if let Some(previous) = previous {
            previous.pump.abort();
            if let Err(err) = self.channel.unsubscribe(&previous.intent_id).await {
                tracing::warn!(
                    intent_id = %previous.intent_id,
                    error = %err,
                    "Failed to unsubscribe previous intent"
                );
            }
        }

        let interest = self.channel.subscribe(intent_id).await?;
        tracing::debug!(intent_id = %intent_id, interest, "Tracking intent");
        Ok(())
    }

    /// Track an existing intent and load its current record.
    pub async fn resume(&self, intent_id: &str) -> Result<PaymentIntent, TrackerError> {
        self.track(intent_id).await?;
        self.fetch_intent(intent_id).await
    }

    /// Stop tracking. In-flight calls return [`TrackerError::Cancelled`].
    pub async fn close(&self) {
        self.cancel.cancel();
        let tracked = self.tracked.lock().take();
        if let Some(tracked) = tracked {
            tracked.pump.abort();
            if let Err(err) = self.channel.unsubscribe(&tracked.intent_id).await {
                tracing::warn!(intent_id = %tracked.intent_id, error = %err, "Failed to unsubscribe");
            }
        }
    }

    /// Make `record` the current intent and apply it.
    ///
    /// A record for another intent first moves tracking over, which resets
    /// the store, so the store never holds an intent the pump ignores.
    async fn adopt(&self, record: &PaymentIntent) {
        if self.tracked_id().as_deref() != Some(record.id.as_str()) {
            if let Err(err) = self.track(&record.id).await {
                tracing::warn!(
                    intent_id = %record.id,
                    error_type = err.error_type(),
                    error = %err,
                    "Could not subscribe to updates"
                );
            }
        }
        self.store.dispatch(StoreAction::Apply(record.clone()));
    }

    fn ensure_open(&self) -> Result<(), TrackerError> {
        if self.cancel.is_cancelled() {
            return Err(TrackerError::Cancelled);
        }
        Ok(())
    }

    /// Run a REST call unless the tracker is closed first.
    async fn guarded<T, F>(&self, call: F) -> Result<T, TrackerError>
    where
        F: Future<Output = Result<T, ApiError>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(TrackerError::Cancelled),
            result = call => result.map_err(TrackerError::Api),
        }
    }

    /// Record a failed operation and notify with `message(err)`.
    fn fail(&self, err: TrackerError, message: impl FnOnce(&TrackerError) -> String) -> TrackerError {
        if matches!(err, TrackerError::Cancelled) {
            return err;
        }
        tracing::warn!(error_type = err.error_type(), error = %err, "Intent operation failed");
        self.store.dispatch(StoreAction::Fail(err.to_string()));
        self.sink.notify(Notification::error(message(&err)));
        err
    }
}

impl Drop for PaymentIntentTracker {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(tracked) = self.tracked.get_mut().take() {
            tracked.pump.abort();
            self.channel.release(&tracked.intent_id);
        }
    }
}

async fn pump_events(
    mut events: broadcast::Receiver<ChannelEvent>,
    intent_id: String,
    store: IntentStore,
    sink: Arc<dyn NotificationSink>,
    cancel: CancelToken,
) {
    loop {
        let received = tokio::select! {
            _ = cancel.cancelled() => break,
            received = events.recv() => received,
        };

        match received {
            Ok(event) if event.intent_id() == intent_id => {
                apply_event(&store, sink.as_ref(), event);
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(intent_id = %intent_id, skipped, "Event pump lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// Apply a pushed event for the tracked intent; notify on status change.
fn apply_event(store: &IntentStore, sink: &dyn NotificationSink, event: ChannelEvent) {
    let action = match event {
        ChannelEvent::IntentUpdated(record) => StoreAction::Push(record),
        ChannelEvent::StatusChanged(change) => {
            let status = change.status();
            match (change.record, status) {
                (Some(record), _) => StoreAction::Push(record),
                (None, Some(status)) => StoreAction::PushStatus {
                    intent_id: change.intent_id,
                    status,
                },
                (None, None) => return,
            }
        }
    };

    let outcome = store.dispatch(action);
    if !outcome.status_changed() {
        return;
    }
    if let Some(notification) = store.record().as_ref().and_then(Notification::for_status) {
        sink.notify(notification);
    }
}
