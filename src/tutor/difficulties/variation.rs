use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariationType {
    Numeric,
    Contextual,
    Representational,
    Reversed,
    Applied,
    Comparative,
}

impl VariationType {
    pub const ALL: [VariationType; 6] = [
        Self::Numeric,
        Self::Contextual,
        Self::Representational,
        Self::Reversed,
        Self::Applied,
        Self::Comparative,
    ];

    pub fn describe(&self) -> &'static str {
        match self {
            Self::Numeric => "same structure with different numbers",
            Self::Contextual => "same idea in a new real-world context",
            Self::Representational => "switch between words, symbols and diagrams",
            Self::Reversed => "work backwards from the answer",
            Self::Applied => "use the idea inside a larger problem",
            Self::Comparative => "compare two similar-looking problems",
        }
    }
}

/// Least-recently-used variation. `history` is oldest first; types that were
/// never used win, in declaration order.
pub fn select_variation(history: &[VariationType]) -> VariationType {
    VariationType::ALL
        .iter()
        .copied()
        .min_by_key(|ty| history.iter().rposition(|used| used == ty).map_or(-1, |i| i as i64))
        .unwrap_or(VariationType::Numeric)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unused_types_come_first() {
        assert_eq!(select_variation(&[]), VariationType::Numeric);
        assert_eq!(
            select_variation(&[VariationType::Numeric, VariationType::Contextual]),
            VariationType::Representational
        );
    }

    #[test]
    fn least_recent_wins_when_all_used() {
        let mut history = VariationType::ALL.to_vec();
        history.push(VariationType::Numeric);
        assert_eq!(select_variation(&history), VariationType::Contextual);
    }
}
