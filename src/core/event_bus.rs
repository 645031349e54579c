use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum TutorEvent {
    #[serde(rename = "ATTEMPT_RECORDED")]
    AttemptRecorded(AttemptRecordedPayload),

    #[serde(rename = "SKILL_MASTERED")]
    SkillMastered(SkillMasteredPayload),

    #[serde(rename = "SCAFFOLD_CHANGED")]
    ScaffoldChanged(ScaffoldChangedPayload),

    #[serde(rename = "DIALOGUE_STARTED")]
    DialogueStarted(DialogueStartedPayload),

    #[serde(rename = "DIALOGUE_ENDED")]
    DialogueEnded(DialogueEndedPayload),

    #[serde(rename = "EXPLORATION_CONSOLIDATED")]
    ExplorationConsolidated(ExplorationConsolidatedPayload),

    #[serde(rename = "ASSESSMENT_TRIGGERED")]
    AssessmentTriggered(AssessmentTriggeredPayload),
}

impl TutorEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            TutorEvent::AttemptRecorded(_) => "ATTEMPT_RECORDED",
            TutorEvent::SkillMastered(_) => "SKILL_MASTERED",
            TutorEvent::ScaffoldChanged(_) => "SCAFFOLD_CHANGED",
            TutorEvent::DialogueStarted(_) => "DIALOGUE_STARTED",
            TutorEvent::DialogueEnded(_) => "DIALOGUE_ENDED",
            TutorEvent::ExplorationConsolidated(_) => "EXPLORATION_CONSOLIDATED",
            TutorEvent::AssessmentTriggered(_) => "ASSESSMENT_TRIGGERED",
        }
    }

    pub fn learner_id(&self) -> Option<&str> {
        match self {
            TutorEvent::AttemptRecorded(p) => Some(&p.learner_id),
            TutorEvent::SkillMastered(p) => Some(&p.learner_id),
            TutorEvent::ScaffoldChanged(p) => Some(&p.learner_id),
            TutorEvent::DialogueStarted(p) => p.learner_id.as_deref(),
            TutorEvent::DialogueEnded(p) => p.learner_id.as_deref(),
            TutorEvent::ExplorationConsolidated(p) => p.learner_id.as_deref(),
            TutorEvent::AssessmentTriggered(p) => Some(&p.learner_id),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRecordedPayload {
    pub learner_id: String,
    pub skill_id: String,
    pub is_correct: bool,
    pub p_mastery: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillMasteredPayload {
    pub learner_id: String,
    pub skill_id: String,
    pub p_mastery: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaffoldChangedPayload {
    pub learner_id: String,
    pub skill_id: String,
    pub from_level: u8,
    pub to_level: u8,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogueStartedPayload {
    pub dialogue_id: String,
    pub learner_id: Option<String>,
    pub skill_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogueEndedPayload {
    pub dialogue_id: String,
    pub learner_id: Option<String>,
    pub completed: bool,
    pub exchange_count: usize,
    pub effectiveness: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplorationConsolidatedPayload {
    pub session_id: String,
    pub learner_id: Option<String>,
    pub attempt_count: usize,
    pub conceptual_gain: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentTriggeredPayload {
    pub learner_id: String,
    pub assessment_types: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct EventEnvelope {
    pub id: String,
    pub event: TutorEvent,
    pub created_at: DateTime<Utc>,
}

impl EventEnvelope {
    pub fn new(event: TutorEvent) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            event,
            created_at: Utc::now(),
        }
    }
}

pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
    event_count: RwLock<u64>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sender,
            event_count: RwLock::new(0),
        }
    }

    pub async fn publish(&self, event: TutorEvent) {
        let envelope = EventEnvelope::new(event);
        *self.event_count.write().await += 1;

        let sent_to = self.sender.send(envelope.clone()).unwrap_or(0);
        debug!(
            event_type = envelope.event.event_type(),
            learner_id = envelope.event.learner_id().unwrap_or("-"),
            sent_to,
            "event published"
        );
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    pub async fn event_count(&self) -> u64 {
        *self.event_count.read().await
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Writes every published event to the log until the bus is dropped.
pub fn spawn_event_logger(mut receiver: broadcast::Receiver<EventEnvelope>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(envelope) => info!(
                    event_id = %envelope.id,
                    event_type = envelope.event.event_type(),
                    learner_id = envelope.event.learner_id().unwrap_or("-"),
                    created_at = %envelope.created_at,
                    "tutor event"
                ),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event logger lagged behind");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("event bus closed, stopping event logger");
                    break;
                }
            }
        }
    })
}
