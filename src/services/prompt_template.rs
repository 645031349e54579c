#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Concept,
    QuestionType,
    Intent,
    LearnerResponse,
    Misconception,
    ProblemTitle,
    Support,
}

impl Slot {
    pub const ALL: [Slot; 7] = [
        Slot::Concept,
        Slot::QuestionType,
        Slot::Intent,
        Slot::LearnerResponse,
        Slot::Misconception,
        Slot::ProblemTitle,
        Slot::Support,
    ];

    pub fn placeholder(&self) -> &'static str {
        match self {
            Slot::Concept => "{concept}",
            Slot::QuestionType => "{question_type}",
            Slot::Intent => "{intent}",
            Slot::LearnerResponse => "{learner_response}",
            Slot::Misconception => "{misconception}",
            Slot::ProblemTitle => "{problem_title}",
            Slot::Support => "{support}",
        }
    }
}

pub const SOCRATIC_SYSTEM: &str = "You are a patient Socratic tutor. Never give the answer directly. \
Reply with exactly one short question a learner can answer in a sentence or two.";

pub const SOCRATIC_USER: &str = "Concept: {concept}\n\
Question type: {question_type}\n\
Goal: {intent}\n\
Learner's last answer: {learner_response}\n\
Known misconception: {misconception}\n\
Write the next question.";

pub const EXPLORATION_SYSTEM: &str = "You are a tutor supporting productive struggle. \
Encourage the learner, do not reveal the solution, and keep it under three sentences.";

pub const EXPLORATION_USER: &str = "Problem: {problem_title}\n\
Concept: {concept}\n\
Support to give: {support}\n\
Learner's latest approach: {learner_response}\n\
Write the message to the learner.";

const EMPTY_SLOT: &str = "(none)";

/// Fills every known slot in `template`. Slots without a value read "(none)"
/// so the model never sees a raw placeholder.
pub fn render(template: &str, values: &[(Slot, &str)]) -> String {
    Slot::ALL.iter().fold(template.to_string(), |text, slot| {
        let value = values
            .iter()
            .rev()
            .find(|(s, _)| s == slot)
            .map(|(_, v)| v.trim())
            .filter(|v| !v.is_empty())
            .unwrap_or(EMPTY_SLOT);
        text.replace(slot.placeholder(), value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_and_defaults_slots() {
        let text = render(SOCRATIC_USER, &[(Slot::Concept, "slope"), (Slot::QuestionType, "probing")]);
        assert!(text.contains("Concept: slope"));
        assert!(text.contains("Question type: probing"));
        assert!(text.contains("Known misconception: (none)"));
        assert!(!text.contains('{'));
    }

    #[test]
    fn last_value_wins() {
        let text = render("{concept}", &[(Slot::Concept, "a"), (Slot::Concept, "b")]);
        assert_eq!(text, "b");
    }
}
