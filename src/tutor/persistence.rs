use std::collections::HashMap;

use parking_lot::RwLock;
use thiserror::Error;

use crate::tutor::exploration::ExplorationSession;
use crate::tutor::mastery::BktParams;
use crate::tutor::socratic::DialogueState;
use crate::tutor::types::{InverseProfile, LearnerSkillState, PracticeAttempt, TutorError};

/// Failure reported by a store backend. `MemoryStore` never fails; other
/// backends wrap their driver errors here.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend failed: {0}")]
    Backend(String),
}

impl From<StoreError> for TutorError {
    fn from(err: StoreError) -> Self {
        TutorError::Storage(err.to_string())
    }
}

type SkillKey = (String, String);

fn key(learner_id: &str, skill_id: &str) -> SkillKey {
    (learner_id.to_string(), skill_id.to_string())
}

/// Storage collaborator for learner state, attempt history, fitted
/// parameters and open sessions.
pub trait TutorStore: Send + Sync {
    fn load_skill_state(&self, learner_id: &str, skill_id: &str) -> Option<LearnerSkillState>;
    fn save_skill_state(&self, state: &LearnerSkillState) -> Result<(), StoreError>;
    fn skill_states_for(&self, learner_id: &str) -> Vec<LearnerSkillState>;

    fn append_attempt(
        &self,
        learner_id: &str,
        skill_id: &str,
        attempt: &PracticeAttempt,
    ) -> Result<(), StoreError>;
    fn attempts_for(&self, learner_id: &str, skill_id: &str) -> Vec<PracticeAttempt>;
    /// Every learner's attempts on a skill, oldest first.
    fn attempts_for_skill(&self, skill_id: &str) -> Vec<PracticeAttempt>;
    fn practiced_skills(&self) -> Vec<String>;

    fn load_params(&self, skill_id: &str) -> Option<BktParams>;
    fn save_params(&self, skill_id: &str, params: &BktParams) -> Result<(), StoreError>;

    fn load_dialogue(&self, id: &str) -> Option<DialogueState>;
    fn save_dialogue(&self, state: &DialogueState) -> Result<(), StoreError>;

    fn load_exploration(&self, id: &str) -> Option<ExplorationSession>;
    fn save_exploration(&self, session: &ExplorationSession) -> Result<(), StoreError>;

    fn load_profile(&self, learner_id: &str) -> Option<InverseProfile>;
    fn save_profile(&self, profile: &InverseProfile) -> Result<(), StoreError>;
}

#[derive(Default)]
pub struct MemoryStore {
    skill_states: RwLock<HashMap<SkillKey, LearnerSkillState>>,
    attempts: RwLock<HashMap<SkillKey, Vec<PracticeAttempt>>>,
    params: RwLock<HashMap<String, BktParams>>,
    dialogues: RwLock<HashMap<String, DialogueState>>,
    explorations: RwLock<HashMap<String, ExplorationSession>>,
    profiles: RwLock<HashMap<String, InverseProfile>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TutorStore for MemoryStore {
    fn load_skill_state(&self, learner_id: &str, skill_id: &str) -> Option<LearnerSkillState> {
        self.skill_states.read().get(&key(learner_id, skill_id)).cloned()
    }

    fn save_skill_state(&self, state: &LearnerSkillState) -> Result<(), StoreError> {
        self.skill_states
            .write()
            .insert(key(&state.learner_id, &state.skill_id), state.clone());
        Ok(())
    }

    fn skill_states_for(&self, learner_id: &str) -> Vec<LearnerSkillState> {
        let mut states: Vec<LearnerSkillState> = self
            .skill_states
            .read()
            .values()
            .filter(|s| s.learner_id == learner_id)
            .cloned()
            .collect();
        states.sort_by(|a, b| a.skill_id.cmp(&b.skill_id));
        states
    }

    fn append_attempt(
        &self,
        learner_id: &str,
        skill_id: &str,
        attempt: &PracticeAttempt,
    ) -> Result<(), StoreError> {
        let mut attempt = attempt.clone();
        attempt.skill_id.get_or_insert_with(|| skill_id.to_string());
        self.attempts
            .write()
            .entry(key(learner_id, skill_id))
            .or_default()
            .push(attempt);
        Ok(())
    }

    fn attempts_for(&self, learner_id: &str, skill_id: &str) -> Vec<PracticeAttempt> {
        self.attempts
            .read()
            .get(&key(learner_id, skill_id))
            .cloned()
            .unwrap_or_default()
    }

    fn attempts_for_skill(&self, skill_id: &str) -> Vec<PracticeAttempt> {
        let mut all: Vec<PracticeAttempt> = self
            .attempts
            .read()
            .iter()
            .filter(|((_, skill), _)| skill == skill_id)
            .flat_map(|(_, list)| list.iter().cloned())
            .collect();
        all.sort_by_key(|a| a.timestamp);
        all
    }

    fn practiced_skills(&self) -> Vec<String> {
        let mut skills: Vec<String> = self
            .attempts
            .read()
            .keys()
            .map(|(_, skill)| skill.clone())
            .collect();
        skills.sort();
        skills.dedup();
        skills
    }

    fn load_params(&self, skill_id: &str) -> Option<BktParams> {
        self.params.read().get(skill_id).copied()
    }

    fn save_params(&self, skill_id: &str, params: &BktParams) -> Result<(), StoreError> {
        self.params.write().insert(skill_id.to_string(), *params);
        Ok(())
    }

    fn load_dialogue(&self, id: &str) -> Option<DialogueState> {
        self.dialogues.read().get(id).cloned()
    }

    fn save_dialogue(&self, state: &DialogueState) -> Result<(), StoreError> {
        self.dialogues.write().insert(state.id.clone(), state.clone());
        Ok(())
    }

    fn load_exploration(&self, id: &str) -> Option<ExplorationSession> {
        self.explorations.read().get(id).cloned()
    }

    fn save_exploration(&self, session: &ExplorationSession) -> Result<(), StoreError> {
        self.explorations
            .write()
            .insert(session.id.clone(), session.clone());
        Ok(())
    }

    fn load_profile(&self, learner_id: &str) -> Option<InverseProfile> {
        self.profiles.read().get(learner_id).cloned()
    }

    fn save_profile(&self, profile: &InverseProfile) -> Result<(), StoreError> {
        self.profiles
            .write()
            .insert(profile.learner_id.clone(), profile.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};

    fn t(minutes: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap() + Duration::minutes(minutes)
    }

    #[test]
    fn skill_state_round_trip() {
        let store = MemoryStore::new();
        assert!(store.load_skill_state("u1", "s1").is_none());
        let mut state = LearnerSkillState::new("u1", "s1", 0.4);
        state.attempt_count = 3;
        store.save_skill_state(&state).unwrap();
        let loaded = store.load_skill_state("u1", "s1").unwrap();
        assert_eq!(loaded.attempt_count, 3);
        assert_eq!(store.skill_states_for("u1").len(), 1);
        assert!(store.skill_states_for("u2").is_empty());
    }

    #[test]
    fn attempts_are_tagged_and_merged_in_time_order() {
        let store = MemoryStore::new();
        store.append_attempt("u1", "s1", &PracticeAttempt::new(true, t(5))).unwrap();
        store.append_attempt("u2", "s1", &PracticeAttempt::new(false, t(1))).unwrap();
        store.append_attempt("u1", "s2", &PracticeAttempt::new(true, t(2))).unwrap();

        let merged = store.attempts_for_skill("s1");
        assert_eq!(merged.len(), 2);
        assert!(!merged[0].is_correct);
        assert_eq!(merged[0].skill_id.as_deref(), Some("s1"));
        assert_eq!(store.attempts_for("u1", "s1").len(), 1);
        assert_eq!(store.practiced_skills(), vec!["s1".to_string(), "s2".to_string()]);
    }

    #[test]
    fn params_overwrite() {
        let store = MemoryStore::new();
        store.save_params("s1", &BktParams::default()).unwrap();
        let fitted = BktParams::new(0.5, 0.2, 0.1, 0.15);
        store.save_params("s1", &fitted).unwrap();
        assert_eq!(store.load_params("s1"), Some(fitted));
    }
}
