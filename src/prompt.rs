use crate::rubric::RubricWeights;

pub const PROMPT_HEADER: &str = "Please review this student assignment for plagiarism and AI-generated content. \
Then provide a JSON scorecard with numeric scores (0-5) for each rubric category.";

/// Renders the instruction the instructor copies into an external chat
/// assistant: header, rubric weights, then the assignment text.
pub fn build_prompt(assignment_text: &str, weights: &RubricWeights) -> String {
    format!(
        "{}\n\nRubric weights: {}\n\nAssignment text:\n{}",
        PROMPT_HEADER,
        weights.to_json(),
        assignment_text
    )
}
