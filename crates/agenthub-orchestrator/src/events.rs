use agenthub_core::HubResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Lifecycle notifications published by the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HubEventType {
    /// An agent was added to the hub.
    AgentRegistered,
    /// An agent was removed from the hub.
    AgentUnregistered,
    /// A task was created by a delegation.
    TaskCreated,
    /// A task reached a terminal status.
    TaskCompleted,
}

impl std::fmt::Display for HubEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HubEventType::AgentRegistered => write!(f, "agent_registered"),
            HubEventType::AgentUnregistered => write!(f, "agent_unregistered"),
            HubEventType::TaskCreated => write!(f, "task_created"),
            HubEventType::TaskCompleted => write!(f, "task_completed"),
        }
    }
}

/// A single published event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubEvent {
    /// Unique id.
    pub id: Uuid,
    /// Kind of event.
    pub event_type: HubEventType,
    /// When the event was published.
    pub timestamp: DateTime<Utc>,
    /// Component that published the event.
    pub source: String,
    /// Session the event belongs to, if any.
    #[serde(default)]
    pub session_id: Option<String>,
    /// Event-specific data.
    pub payload: serde_json::Value,
}

impl HubEvent {
    /// New event stamped with a fresh id and the current time.
    pub fn new(
        event_type: HubEventType,
        source: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type,
            timestamp: Utc::now(),
            source: source.into(),
            session_id: None,
            payload,
        }
    }

    /// Attach a session id.
    pub fn with_session(mut self, session_id: Option<String>) -> Self {
        self.session_id = session_id;
        self
    }
}

/// Receives events from an [`EventBus`].
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Process one event. Errors are logged by the bus and otherwise ignored.
    async fn handle(&self, event: &HubEvent) -> HubResult<()>;
}

/// Narrows which events reach a subscriber, beyond the event type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFilter {
    /// Only events from this source.
    #[serde(default)]
    pub source: Option<String>,
    /// Only events from this session.
    #[serde(default)]
    pub session_id: Option<String>,
}

impl EventFilter {
    /// `true` if the event passes every set field.
    pub fn matches(&self, event: &HubEvent) -> bool {
        if let Some(source) = &self.source {
            if *source != event.source {
                return false;
            }
        }
        if let Some(session) = &self.session_id {
            if event.session_id.as_ref() != Some(session) {
                return false;
            }
        }
        true
    }
}

struct Subscription {
    id: Uuid,
    event_types: Vec<HubEventType>,
    filter: EventFilter,
    handler: Arc<dyn EventHandler>,
}

impl Subscription {
    fn wants(&self, event: &HubEvent) -> bool {
        (self.event_types.is_empty() || self.event_types.contains(&event.event_type))
            && self.filter.matches(event)
    }
}

/// Fire-and-forget publish/subscribe for hub lifecycle events.
///
/// Each matching handler runs on its own spawned task, so a slow or failing
/// subscriber never blocks the publisher. Handler errors are logged only.
pub struct EventBus {
    subscribers: RwLock<Vec<Subscription>>,
}

impl EventBus {
    /// Empty instance.
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// Subscribe to the given event types (all types if empty).
    pub fn subscribe(
        &self,
        event_types: Vec<HubEventType>,
        handler: Arc<dyn EventHandler>,
        filter: EventFilter,
    ) -> Uuid {
        let id = Uuid::new_v4();
        self.subscribers.write().push(Subscription {
            id,
            event_types,
            filter,
            handler,
        });
        id
    }

    /// Remove a subscription. Returns `false` if it did not exist.
    pub fn unsubscribe(&self, id: Uuid) -> bool {
        let mut subs = self.subscribers.write();
        let before = subs.len();
        subs.retain(|s| s.id != id);
        subs.len() != before
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Dispatch an event to every matching subscriber and return how many
    /// deliveries were started.
    ///
    /// Outside a tokio runtime nothing is delivered.
    pub fn publish(&self, event: HubEvent) -> usize {
        let handlers: Vec<Arc<dyn EventHandler>> = self
            .subscribers
            .read()
            .iter()
            .filter(|s| s.wants(&event))
            .map(|s| Arc::clone(&s.handler))
            .collect();
        if handlers.is_empty() {
            return 0;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(event = %event.event_type, "No async runtime, dropping event");
            return 0;
        };

        let event = Arc::new(event);
        let count = handlers.len();
        for handler in handlers {
            let event = Arc::clone(&event);
            runtime.spawn(async move {
                if let Err(e) = handler.handle(&event).await {
                    tracing::warn!(
                        event = %event.event_type,
                        event_id = %event.id,
                        error = %e,
                        "Event handler failed"
                    );
                }
            });
        }
        count
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use agenthub_core::HubError;
    use tokio::sync::mpsc;

    struct Forward(mpsc::UnboundedSender<HubEvent>);

    #[async_trait]
    impl EventHandler for Forward {
        async fn handle(&self, event: &HubEvent) -> HubResult<()> {
            self.0
                .send(event.clone())
                .map_err(|e| HubError::EventBus(e.to_string()))
        }
    }

    struct Broken;

    #[async_trait]
    impl EventHandler for Broken {
        async fn handle(&self, _event: &HubEvent) -> HubResult<()> {
            Err(HubError::EventBus("subscriber offline".into()))
        }
    }

    fn event(event_type: HubEventType) -> HubEvent {
        HubEvent::new(event_type, "hub", serde_json::json!({"agent_id": "coder"}))
    }

    #[tokio::test]
    async fn test_publish_reaches_matching_subscriber() {
        let bus = EventBus::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        bus.subscribe(
            vec![HubEventType::AgentRegistered],
            Arc::new(Forward(tx)),
            EventFilter::default(),
        );

        assert_eq!(bus.publish(event(HubEventType::TaskCreated)), 0);
        assert_eq!(bus.publish(event(HubEventType::AgentRegistered)), 1);

        let received = rx.recv().await.unwrap();
        assert_eq!(received.event_type, HubEventType::AgentRegistered);
        assert_eq!(received.payload["agent_id"], "coder");
    }

    #[tokio::test]
    async fn test_empty_type_list_receives_everything() {
        let bus = EventBus::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        bus.subscribe(vec![], Arc::new(Forward(tx)), EventFilter::default());

        bus.publish(event(HubEventType::TaskCreated));
        bus.publish(event(HubEventType::TaskCompleted));
        assert_eq!(rx.recv().await.unwrap().event_type, HubEventType::TaskCreated);
        assert_eq!(rx.recv().await.unwrap().event_type, HubEventType::TaskCompleted);
    }

    #[tokio::test]
    async fn test_filter_by_session() {
        let bus = EventBus::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let filter = EventFilter {
            source: None,
            session_id: Some("s-1".into()),
        };
        bus.subscribe(vec![], Arc::new(Forward(tx)), filter);

        assert_eq!(bus.publish(event(HubEventType::TaskCreated)), 0);
        let scoped = event(HubEventType::TaskCreated).with_session(Some("s-1".into()));
        assert_eq!(bus.publish(scoped), 1);
        assert_eq!(rx.recv().await.unwrap().session_id.as_deref(), Some("s-1"));
    }

    #[tokio::test]
    async fn test_failing_handler_does_not_affect_others() {
        let bus = EventBus::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        bus.subscribe(vec![], Arc::new(Broken), EventFilter::default());
        bus.subscribe(vec![], Arc::new(Forward(tx)), EventFilter::default());

        assert_eq!(bus.publish(event(HubEventType::TaskCompleted)), 2);
        assert!(rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_unsubscribe() {
        let bus = EventBus::new();
        let id = bus.subscribe(vec![], Arc::new(Broken), EventFilter::default());
        assert_eq!(bus.subscriber_count(), 1);
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_publish_without_runtime_is_noop() {
        let bus = EventBus::new();
        bus.subscribe(vec![], Arc::new(Broken), EventFilter::default());
        assert_eq!(bus.publish(event(HubEventType::AgentRegistered)), 0);
    }
}
