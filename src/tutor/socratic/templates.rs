use super::dialogue::QuestionType;

/// Deterministic question used when the language model is unavailable.
pub fn fallback_question(question_type: QuestionType, concept: &str) -> String {
    match question_type {
        QuestionType::Clarifying => {
            format!("In your own words, what do you think {concept} means?")
        }
        QuestionType::Probing => {
            format!("What makes you think that about {concept}? Can you walk me through your reasoning?")
        }
        QuestionType::Scaffolding => {
            format!("Let's break {concept} into smaller pieces. What is the first step you would take?")
        }
        QuestionType::Challenging => {
            format!("Can you think of a case where your idea about {concept} would not work?")
        }
        QuestionType::Reflection => {
            format!("Looking back, what did you learn about {concept} just now?")
        }
        QuestionType::Metacognitive => {
            "How did you figure that out, and how confident do you feel about it?".to_string()
        }
    }
}

/// Short description given to the language model alongside the concept.
pub fn question_intent(question_type: QuestionType) -> &'static str {
    match question_type {
        QuestionType::Clarifying => "ask the learner to restate the idea in their own words",
        QuestionType::Probing => "probe the reasoning behind the learner's last answer",
        QuestionType::Scaffolding => "offer a smaller stepping-stone question without giving the answer",
        QuestionType::Challenging => "present a counter-example that tests the learner's idea",
        QuestionType::Reflection => "invite the learner to summarise what they discovered",
        QuestionType::Metacognitive => "ask the learner how they reached their conclusion",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_type_has_a_question() {
        for ty in QuestionType::ALL {
            let q = fallback_question(ty, "fractions");
            assert!(q.ends_with('?'));
            assert!(!question_intent(ty).is_empty());
        }
    }
}
