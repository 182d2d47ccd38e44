use crate::device::SensorSelect;
use crate::error::EventBusError;
use crate::mode::RecordingEnd;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// What forced a capture slot to be refilled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryCause {
    BufferError,
    Desync,
    Reboot,
}

/// Events that can occur in the capture pipeline
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PipelineEvent {
    /// Capture is running on a sensor
    CaptureStarted { sensor: SensorSelect },
    /// A complete frame was handed to the display side
    FramePromoted { slot: usize },
    /// A still was copied into the snapshot buffer
    StillCaptured,
    RecordingStarted { session: Uuid, capacity: usize },
    RecordingStopped {
        session: Option<Uuid>,
        reason: RecordingEnd,
        frames: usize,
    },
    PlaybackStarted { frames: usize },
    PlaybackFinished { frames_shown: usize },
    SensorSwitched { sensor: SensorSelect },
    /// A frame was dropped and its slot captured again
    BufferRecovered { cause: RecoveryCause, slot: usize },
    Suspended,
    Resumed,
    /// The device failed for good; the pipeline stopped
    FatalError { error: String },
}

impl PipelineEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            PipelineEvent::CaptureStarted { sensor } => {
                format!("Capture started on {} sensor", sensor)
            }
            PipelineEvent::FramePromoted { slot } => format!("Frame ready in slot {}", slot),
            PipelineEvent::StillCaptured => "Still captured".to_string(),
            PipelineEvent::RecordingStarted { session, capacity } => {
                format!("Recording {} started ({} frames available)", session, capacity)
            }
            PipelineEvent::RecordingStopped { reason, frames, .. } => {
                format!("Recording stopped ({}): {} frames", reason, frames)
            }
            PipelineEvent::PlaybackStarted { frames } => {
                format!("Playback of {} frames started", frames)
            }
            PipelineEvent::PlaybackFinished { frames_shown } => {
                format!("Playback finished after {} frames", frames_shown)
            }
            PipelineEvent::SensorSwitched { sensor } => format!("Switched to {} sensor", sensor),
            PipelineEvent::BufferRecovered { cause, slot } => {
                format!("Recovered from {:?}, recapturing slot {}", cause, slot)
            }
            PipelineEvent::Suspended => "Pipeline suspended".to_string(),
            PipelineEvent::Resumed => "Pipeline resumed".to_string(),
            PipelineEvent::FatalError { error } => format!("Fatal device error: {}", error),
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            PipelineEvent::CaptureStarted { .. } => "capture_started",
            PipelineEvent::FramePromoted { .. } => "frame_promoted",
            PipelineEvent::StillCaptured => "still_captured",
            PipelineEvent::RecordingStarted { .. } => "recording_started",
            PipelineEvent::RecordingStopped { .. } => "recording_stopped",
            PipelineEvent::PlaybackStarted { .. } => "playback_started",
            PipelineEvent::PlaybackFinished { .. } => "playback_finished",
            PipelineEvent::SensorSwitched { .. } => "sensor_switched",
            PipelineEvent::BufferRecovered { .. } => "buffer_recovered",
            PipelineEvent::Suspended => "suspended",
            PipelineEvent::Resumed => "resumed",
            PipelineEvent::FatalError { .. } => "fatal_error",
        }
    }
}

/// Fan-out of pipeline events over a broadcast channel
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PipelineEvent>,
    debug_logging: bool,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            debug_logging: false,
        }
    }

    pub fn with_debug_logging(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            debug_logging: true,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all subscribers.
    ///
    /// Never blocks, so it is safe to call from interrupt and tick handlers.
    pub fn publish(&self, event: PipelineEvent) -> Result<usize, EventBusError> {
        match &event {
            PipelineEvent::FatalError { error } => error!("Fatal device error: {}", error),
            PipelineEvent::RecordingStopped { reason, frames, .. } => {
                info!("Recording stopped ({}): {} frames", reason, frames)
            }
            PipelineEvent::BufferRecovered { .. } => {
                if self.debug_logging {
                    debug!("Event: {}", event.description());
                }
            }
            _ => {
                if self.debug_logging {
                    debug!("Publishing event: {}", event.description());
                }
            }
        }

        let event_type = event.event_type();
        self.sender
            .send(event)
            .map_err(|_| EventBusError::NoSubscribers { event_type })
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

/// Event filter for selective event handling
#[derive(Debug, Clone)]
pub enum EventFilter {
    All,
    EventTypes(Vec<&'static str>),
}

impl EventFilter {
    pub fn matches(&self, event: &PipelineEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::EventTypes(types) => types.contains(&event.event_type()),
        }
    }
}

/// Named, filtered subscription
pub struct EventReceiver {
    receiver: broadcast::Receiver<PipelineEvent>,
    filter: EventFilter,
    name: String,
}

impl EventReceiver {
    pub fn new(
        receiver: broadcast::Receiver<PipelineEvent>,
        filter: EventFilter,
        name: impl Into<String>,
    ) -> Self {
        Self {
            receiver,
            filter,
            name: name.into(),
        }
    }

    /// Receive the next event that passes the filter
    pub async fn recv(&mut self) -> Result<PipelineEvent, EventBusError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Ok(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::Lagged { missed: n });
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed for receiver '{}'", self.name);
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Result<Option<PipelineEvent>, EventBusError> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Ok(Some(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::Lagged { missed: n });
                }
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }

    /// Everything currently queued that passes the filter
    pub fn drain(&mut self) -> Vec<PipelineEvent> {
        let mut events = Vec::new();
        loop {
            match self.try_recv() {
                Ok(Some(event)) => events.push(event),
                Ok(None) | Err(EventBusError::ChannelClosed) => break,
                Err(_) => continue,
            }
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_event_bus_basic_operations() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();

        let subscriber_count = event_bus.publish(PipelineEvent::StillCaptured).unwrap();
        assert_eq!(subscriber_count, 1);

        let received = receiver.recv().await.unwrap();
        assert_eq!(received, PipelineEvent::StillCaptured);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let event_bus = EventBus::new(4);
        let result = event_bus.publish(PipelineEvent::Suspended);
        assert!(matches!(
            result,
            Err(EventBusError::NoSubscribers {
                event_type: "suspended"
            })
        ));
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let event_bus = EventBus::new(10);
        let mut receiver1 = event_bus.subscribe();
        let mut receiver2 = event_bus.subscribe();
        assert_eq!(event_bus.subscriber_count(), 2);

        event_bus
            .publish(PipelineEvent::SensorSwitched {
                sensor: SensorSelect::Outer,
            })
            .unwrap();

        let _ = timeout(Duration::from_millis(100), receiver1.recv())
            .await
            .unwrap()
            .unwrap();
        let _ = timeout(Duration::from_millis(100), receiver2.recv())
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_filtered_receiver() {
        let event_bus = EventBus::new(10);
        let filter = EventFilter::EventTypes(vec!["recording_stopped"]);
        let mut receiver = EventReceiver::new(event_bus.subscribe(), filter, "test");

        event_bus
            .publish(PipelineEvent::FramePromoted { slot: 0 })
            .unwrap();
        event_bus
            .publish(PipelineEvent::RecordingStopped {
                session: None,
                reason: RecordingEnd::ReelFull,
                frames: 100,
            })
            .unwrap();

        let event = timeout(Duration::from_millis(100), receiver.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.event_type(), "recording_stopped");
        assert_eq!(receiver.try_recv().unwrap(), None);
    }

    #[test]
    fn test_lagged_receiver_reports_missed() {
        let event_bus = EventBus::new(2);
        let mut receiver = EventReceiver::new(event_bus.subscribe(), EventFilter::All, "slow");
        for slot in 0..5 {
            event_bus
                .publish(PipelineEvent::FramePromoted { slot })
                .unwrap();
        }

        assert!(matches!(
            receiver.try_recv(),
            Err(EventBusError::Lagged { missed: 3 })
        ));
        assert_eq!(receiver.drain().len(), 2);
    }

    #[test]
    fn test_event_properties() {
        let event = PipelineEvent::BufferRecovered {
            cause: RecoveryCause::Desync,
            slot: 1,
        };
        assert_eq!(event.event_type(), "buffer_recovered");
        assert!(event.description().contains("slot 1"));

        let json = serde_json::to_string(&PipelineEvent::CaptureStarted {
            sensor: SensorSelect::Inner,
        })
        .unwrap();
        assert!(json.contains("inner"));
    }
}
