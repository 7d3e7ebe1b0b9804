#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Transport error or non-2xx response from the backend.
    #[error("backend request failed")]
    Backend(#[source] anyhow::Error),

    #[error("unanswered questions: {}", format_numbers(.missing))]
    Unanswered { missing: Vec<usize> },

    #[error("question {question} has no option {option} (options: {options})")]
    InvalidOption {
        question: usize,
        option: usize,
        options: usize,
    },

    #[error("expected {expected} answers, got {actual}")]
    AnswerCount { expected: usize, actual: usize },

    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("no learning content loaded")]
    NoContent,

    #[error("no section is open")]
    NoSection,

    #[error("no quiz is being answered")]
    NoActiveQuiz,

    #[error("section {index} does not exist (sections: {total})")]
    SectionOutOfRange { index: usize, total: usize },
}

impl SessionError {
    /// Errors caught locally before any request was sent.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Unanswered { .. }
                | Self::InvalidOption { .. }
                | Self::AnswerCount { .. }
                | Self::MissingField(_)
        )
    }
}

fn format_numbers(numbers: &[usize]) -> String {
    numbers
        .iter()
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Checks one answer per question, each within its option range. Question
/// numbers in errors are 1-based.
pub fn validate_answers(
    option_counts: impl ExactSizeIterator<Item = usize>,
    answers: &[Option<usize>],
) -> Result<Vec<usize>, SessionError> {
    if option_counts.len() != answers.len() {
        return Err(SessionError::AnswerCount {
            expected: option_counts.len(),
            actual: answers.len(),
        });
    }

    let missing = answers
        .iter()
        .enumerate()
        .filter(|(_, answer)| answer.is_none())
        .map(|(idx, _)| idx + 1)
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        return Err(SessionError::Unanswered { missing });
    }

    let mut checked = Vec::with_capacity(answers.len());
    for (idx, (options, answer)) in option_counts.zip(answers).enumerate() {
        let Some(option) = *answer else {
            continue;
        };
        if option >= options {
            return Err(SessionError::InvalidOption {
                question: idx + 1,
                option,
                options,
            });
        }
        checked.push(option);
    }
    Ok(checked)
}
