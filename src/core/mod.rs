mod event_bus;

pub use event_bus::{
    spawn_event_logger, AssessmentTriggeredPayload, AttemptRecordedPayload, DialogueEndedPayload,
    DialogueStartedPayload, EventBus, EventEnvelope, ExplorationConsolidatedPayload,
    ScaffoldChangedPayload, SkillMasteredPayload, TutorEvent,
};
