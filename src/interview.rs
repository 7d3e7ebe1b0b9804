use std::sync::Arc;

use crate::backend::Backend;
use crate::error::{SessionError, validate_answers};
use crate::formats::{InterviewRequest, Question, QuestionCategory, QuizResult};

/// Size of a mock interview set as produced by the backend.
pub const INTERVIEW_QUESTION_COUNT: usize = 20;

#[derive(Debug, Clone, PartialEq)]
pub enum InterviewStage {
    Input,
    Quiz { questions: Vec<Question> },
    Results { result: QuizResult },
}

pub struct InterviewSession {
    backend: Arc<dyn Backend>,
    stage: InterviewStage,
}

impl InterviewSession {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            stage: InterviewStage::Input,
        }
    }

    pub fn stage(&self) -> &InterviewStage {
        &self.stage
    }

    /// Questions being answered; empty outside the quiz stage.
    pub fn questions(&self) -> &[Question] {
        match &self.stage {
            InterviewStage::Quiz { questions } => questions,
            _ => &[],
        }
    }

    pub fn result(&self) -> Option<&QuizResult> {
        match &self.stage {
            InterviewStage::Results { result } => Some(result),
            _ => None,
        }
    }

    pub async fn generate(&mut self, request: &InterviewRequest) -> Result<&[Question], SessionError> {
        if request.position_title.trim().is_empty() {
            return Err(SessionError::MissingField("position title"));
        }
        if request.job_description.trim().is_empty() {
            return Err(SessionError::MissingField("job description"));
        }

        tracing::info!(position_title = %request.position_title, company = %request.company, "generate interview quiz");
        let questions = self
            .backend
            .generate_interview_quiz(request)
            .await
            .map_err(SessionError::Backend)?;
        if questions.is_empty() {
            return Err(SessionError::Backend(anyhow::anyhow!(
                "interview quiz has no questions"
            )));
        }
        if questions.len() != INTERVIEW_QUESTION_COUNT {
            tracing::warn!(
                expected = INTERVIEW_QUESTION_COUNT,
                actual = questions.len(),
                "unexpected interview question count"
            );
        }

        self.stage = InterviewStage::Quiz { questions };
        Ok(self.questions())
    }

    pub async fn submit(&mut self, answers: &[Option<usize>]) -> Result<&QuizResult, SessionError> {
        let InterviewStage::Quiz { questions } = &self.stage else {
            return Err(SessionError::NoActiveQuiz);
        };
        let answers = validate_answers(questions.iter().map(|q| q.options.len()), answers)?;

        let result = self
            .backend
            .submit_interview_quiz(&answers)
            .await
            .map_err(SessionError::Backend)?;
        tracing::info!(
            score = result.score,
            total = result.total,
            incorrect = result.incorrect_questions.len(),
            "interview quiz submitted"
        );

        self.stage = InterviewStage::Results { result };
        self.result().ok_or(SessionError::NoActiveQuiz)
    }

    /// Back to the input form. Purely client side.
    pub fn reset(&mut self) {
        self.stage = InterviewStage::Input;
    }
}

/// Question indices grouped for display: behavioral first, then technical,
/// then anything the backend left uncategorised. Each group keeps backend
/// order, and indices still address the original list.
pub fn display_groups(questions: &[Question]) -> Vec<(Option<QuestionCategory>, Vec<usize>)> {
    [
        Some(QuestionCategory::Behavioral),
        Some(QuestionCategory::Technical),
        None,
    ]
    .into_iter()
    .filter_map(|category| {
        let indices = questions
            .iter()
            .enumerate()
            .filter(|(_, q)| q.category == category)
            .map(|(idx, _)| idx)
            .collect::<Vec<_>>();
        (!indices.is_empty()).then_some((category, indices))
    })
    .collect()
}
