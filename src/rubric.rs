use serde::ser::{Serialize, SerializeMap, Serializer};

pub const COURSES: &[&str] = &[
    "IMT 598 I: Foundations of Artificial Intelligence",
    "IMT 587 C: Principles of Information Project Management",
    "IMT 572 B: Data Science I – Theoretical Foundations",
];

const STANDARD_WEIGHTS: &[(&str, u32)] = &[
    ("Understanding of Topic", 25),
    ("Originality & Critical Thinking", 20),
    ("Use of Evidence & Examples", 15),
    ("Structure & Organization", 15),
    ("Clarity & Writing Style", 10),
    ("Citation & Academic Integrity", 15),
];

/// Rubric criteria with their integer weights, kept in declaration order.
///
/// The order is what makes the serialized form canonical: two weight tables
/// declared the same way always serialize to the same bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RubricWeights {
    criteria: Vec<(String, u32)>,
}

impl RubricWeights {
    /// Builds a table from `(criterion, weight)` pairs. A criterion declared
    /// twice keeps its first weight.
    pub fn new<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        let mut criteria: Vec<(String, u32)> = Vec::new();
        for (name, weight) in pairs {
            let name = name.into();
            if criteria.iter().any(|(existing, _)| *existing == name) {
                continue;
            }
            criteria.push((name, weight));
        }
        Self { criteria }
    }

    pub fn standard() -> Self {
        Self::new(STANDARD_WEIGHTS.iter().copied())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.criteria.iter().map(|(name, weight)| (name.as_str(), *weight))
    }

    pub fn len(&self) -> usize {
        self.criteria.len()
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    pub fn total(&self) -> u32 {
        self.criteria.iter().map(|(_, weight)| weight).sum()
    }

    pub fn to_json(&self) -> String {
        // Keys are plain strings and values integers; encoding cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl Default for RubricWeights {
    fn default() -> Self {
        Self::standard()
    }
}

impl Serialize for RubricWeights {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.criteria.len()))?;
        for (name, weight) in &self.criteria {
            map.serialize_entry(name, weight)?;
        }
        map.end()
    }
}

pub fn is_known_course(course: &str) -> bool {
    COURSES.contains(&course)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_weights_sum_to_one_hundred() {
        let weights = RubricWeights::standard();
        assert_eq!(weights.len(), 6);
        assert_eq!(weights.total(), 100);
    }

    #[test]
    fn json_keeps_declaration_order() {
        let weights = RubricWeights::new([("Zeta", 60), ("Alpha", 40)]);
        assert_eq!(weights.to_json(), r#"{"Zeta":60,"Alpha":40}"#);
    }

    #[test]
    fn duplicate_criterion_keeps_first_weight() {
        let weights = RubricWeights::new([("A", 30), ("B", 70), ("A", 10)]);
        let collected: Vec<_> = weights.iter().collect();
        assert_eq!(collected, vec![("A", 30), ("B", 70)]);
    }

    #[test]
    fn course_membership() {
        assert!(is_known_course(COURSES[0]));
        assert!(!is_known_course("CS 101"));
    }
}
