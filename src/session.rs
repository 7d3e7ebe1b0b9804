//! Client-side lifecycle of learning content and per-section quizzes.
//!
//! A section visit starts a speculative preload of that section's quiz. The
//! preload runs in its own task and reports back over a channel; the result
//! is only kept if it belongs to the current visit and no quiz was started in
//! the meantime. Every navigation, new content and reset begins a new visit. Starting the quiz then either activates the
//! preloaded quiz on the backend or, failing that, generates a fresh one.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::backend::Backend;
use crate::error::{SessionError, validate_answers};
use crate::formats::{ContentRequest, LearningContent, Quiz, QuizResult, Section};

#[derive(Debug, Clone, PartialEq)]
pub struct PendingQuiz {
    pub section_index: usize,
    pub quiz: Quiz,
}

impl PendingQuiz {
    pub fn quiz_id(&self) -> Option<&str> {
        self.quiz.quiz_id.as_deref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuizSource {
    /// A preloaded quiz the backend confirmed via activation.
    Activated,
    /// Generated on demand and persisted by the backend.
    Generated,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActiveQuiz {
    pub section_index: usize,
    pub quiz: Quiz,
    pub source: QuizSource,
}

/// A finished preload request, as delivered by its task.
#[derive(Debug)]
pub struct PreloadDelivery {
    pub section_index: usize,
    /// Visit the preload was started for.
    pub visit: u64,
    pub result: anyhow::Result<Quiz>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreloadOutcome {
    Accepted,
    /// The visit the preload was started for has ended.
    Stale,
    /// A quiz was already started for the section.
    Superseded,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    Section(usize),
    Overview,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

impl Progress {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.completed as f64 / self.total as f64 * 100.0
    }
}

pub struct LearningSession {
    backend: Arc<dyn Backend>,
    content: Option<LearningContent>,
    completed_sections: BTreeSet<usize>,
    current_section: Option<usize>,
    visit: u64,
    pending_quiz: Option<PendingQuiz>,
    active_quiz: Option<ActiveQuiz>,
    last_result: Option<QuizResult>,
    preload_tx: mpsc::UnboundedSender<PreloadDelivery>,
    preload_rx: mpsc::UnboundedReceiver<PreloadDelivery>,
}

impl LearningSession {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        let (preload_tx, preload_rx) = mpsc::unbounded_channel();
        Self {
            backend,
            content: None,
            completed_sections: BTreeSet::new(),
            current_section: None,
            visit: 0,
            pending_quiz: None,
            active_quiz: None,
            last_result: None,
            preload_tx,
            preload_rx,
        }
    }

    pub fn content(&self) -> Option<&LearningContent> {
        self.content.as_ref()
    }

    pub fn current_section_index(&self) -> Option<usize> {
        self.current_section
    }

    pub fn current_section(&self) -> Option<&Section> {
        let index = self.current_section?;
        self.content.as_ref()?.sections.get(index)
    }

    pub fn pending_quiz(&self) -> Option<&PendingQuiz> {
        self.pending_quiz.as_ref()
    }

    pub fn active_quiz(&self) -> Option<&ActiveQuiz> {
        self.active_quiz.as_ref()
    }

    pub fn last_result(&self) -> Option<&QuizResult> {
        self.last_result.as_ref()
    }

    pub fn is_completed(&self, index: usize) -> bool {
        self.completed_sections.contains(&index)
    }

    pub fn completed_sections(&self) -> impl Iterator<Item = usize> + '_ {
        self.completed_sections.iter().copied()
    }

    pub fn section_count(&self) -> usize {
        self.content.as_ref().map_or(0, |c| c.sections.len())
    }

    pub fn progress(&self) -> Progress {
        Progress {
            completed: self.completed_sections.len(),
            total: self.section_count(),
        }
    }

    /// Whether the current section is followed by another one.
    pub fn has_next_section(&self) -> bool {
        self.current_section
            .is_some_and(|index| index + 1 < self.section_count())
    }

    pub async fn generate_content(
        &mut self,
        request: &ContentRequest,
    ) -> Result<&LearningContent, SessionError> {
        if request.topic.trim().is_empty() {
            return Err(SessionError::MissingField("topic"));
        }

        tracing::info!(topic = %request.topic, familiarity = %request.familiarity, time = request.time, "generate content");
        let content = self
            .backend
            .generate_content(request)
            .await
            .map_err(SessionError::Backend)?;
        if content.sections.is_empty() {
            return Err(SessionError::Backend(anyhow::anyhow!(
                "generated content has no sections"
            )));
        }

        tracing::info!(sections = content.sections.len(), "content ready");
        self.leave_section();
        self.completed_sections.clear();
        self.last_result = None;
        Ok(&*self.content.insert(content))
    }

    /// Opens a section and starts preloading its quiz in the background.
    pub fn enter_section(&mut self, index: usize) -> Result<(), SessionError> {
        let total = self.content.as_ref().ok_or(SessionError::NoContent)?.sections.len();
        if index >= total {
            return Err(SessionError::SectionOutOfRange { index, total });
        }

        self.leave_section();
        self.current_section = Some(index);
        self.spawn_preload(index);
        Ok(())
    }

    fn spawn_preload(&self, section_index: usize) {
        let backend = Arc::clone(&self.backend);
        let tx = self.preload_tx.clone();
        let visit = self.visit;
        tracing::debug!(section_index, visit, "preload quiz");
        tokio::spawn(async move {
            let result = backend.generate_quiz(section_index, false).await;
            // The receiver only goes away with the session.
            let _ = tx.send(PreloadDelivery {
                section_index,
                visit,
                result,
            });
        });
    }

    /// Applies a finished preload against the current state.
    pub fn accept_preload(&mut self, delivery: PreloadDelivery) -> PreloadOutcome {
        let section_index = delivery.section_index;
        let quiz = match delivery.result {
            Ok(quiz) => quiz,
            Err(err) => {
                tracing::warn!(section_index, error = %format!("{err:#}"), "quiz preload failed");
                return PreloadOutcome::Failed;
            }
        };

        if delivery.visit != self.visit || self.current_section != Some(section_index) {
            tracing::debug!(
                section_index,
                visit = delivery.visit,
                current_visit = self.visit,
                current = ?self.current_section,
                "discard stale preload"
            );
            return PreloadOutcome::Stale;
        }
        if self.active_quiz.is_some() {
            tracing::debug!(section_index, "discard preload; quiz already started");
            return PreloadOutcome::Superseded;
        }

        tracing::debug!(section_index, quiz_id = ?quiz.quiz_id, "preload accepted");
        self.pending_quiz = Some(PendingQuiz {
            section_index,
            quiz,
        });
        PreloadOutcome::Accepted
    }

    /// Applies every preload that has already arrived, without waiting.
    pub fn poll_preloads(&mut self) -> Vec<PreloadOutcome> {
        let mut outcomes = Vec::new();
        while let Ok(delivery) = self.preload_rx.try_recv() {
            outcomes.push(self.accept_preload(delivery));
        }
        outcomes
    }

    /// Waits for the next preload to arrive and applies it.
    pub async fn settle_preload(&mut self) -> Option<PreloadOutcome> {
        let delivery = self.preload_rx.recv().await?;
        Some(self.accept_preload(delivery))
    }

    /// Makes exactly one quiz active for the current section: the activated
    /// preload when the backend confirms it, otherwise a freshly generated one.
    pub async fn start_quiz(&mut self) -> Result<&ActiveQuiz, SessionError> {
        let section_index = self.current_section.ok_or(SessionError::NoSection)?;
        self.poll_preloads();
        self.active_quiz = None;

        let pending = self
            .pending_quiz
            .take()
            .filter(|pending| pending.section_index == section_index);

        if let Some(pending) = pending
            && let Some(quiz_id) = pending.quiz_id()
        {
            match self.backend.activate_quiz(quiz_id, section_index).await {
                Ok(()) => {
                    tracing::info!(section_index, quiz_id, "activated preloaded quiz");
                    return Ok(&*self.active_quiz.insert(ActiveQuiz {
                        section_index,
                        quiz: pending.quiz,
                        source: QuizSource::Activated,
                    }));
                }
                Err(err) => {
                    tracing::warn!(section_index, quiz_id, error = %format!("{err:#}"), "activation failed; generating a new quiz");
                }
            }
        }

        let quiz = self
            .backend
            .generate_quiz(section_index, true)
            .await
            .map_err(SessionError::Backend)?;
        tracing::info!(section_index, questions = quiz.questions.len(), "generated quiz");
        Ok(&*self.active_quiz.insert(ActiveQuiz {
            section_index,
            quiz,
            source: QuizSource::Generated,
        }))
    }

    /// Submits one answer per question. Nothing is sent unless every question
    /// has an in-range option selected.
    pub async fn submit_quiz(
        &mut self,
        answers: &[Option<usize>],
    ) -> Result<&QuizResult, SessionError> {
        let active = self.active_quiz.as_ref().ok_or(SessionError::NoActiveQuiz)?;
        let answers = validate_answers(
            active.quiz.questions.iter().map(|q| q.options.len()),
            answers,
        )?;
        let section_index = active.section_index;

        let result = self
            .backend
            .submit_quiz(&answers, section_index)
            .await
            .map_err(SessionError::Backend)?;

        match &result.completed_sections {
            Some(completed) => {
                self.completed_sections = completed.iter().copied().collect();
            }
            None => {
                tracing::warn!(section_index, "quiz result carries no completed sections");
            }
        }
        tracing::info!(
            section_index,
            score = result.score,
            total = result.total,
            completed = self.completed_sections.len(),
            "quiz submitted"
        );

        self.active_quiz = None;
        self.pending_quiz = None;
        Ok(&*self.last_result.insert(result))
    }

    /// Moves on after a result: the next section if there is one, otherwise
    /// back to the overview.
    pub fn advance_section(&mut self) -> Result<Advance, SessionError> {
        let index = self.current_section.ok_or(SessionError::NoSection)?;
        if index + 1 < self.section_count() {
            self.enter_section(index + 1)?;
            return Ok(Advance::Section(index + 1));
        }
        self.back_to_sections();
        Ok(Advance::Overview)
    }

    pub fn back_to_sections(&mut self) {
        self.leave_section();
    }

    pub async fn explain(&self, question: &str) -> Result<String, SessionError> {
        let section_index = self.current_section.ok_or(SessionError::NoSection)?;
        if question.trim().is_empty() {
            return Err(SessionError::MissingField("question"));
        }
        self.backend
            .explain(question, section_index)
            .await
            .map_err(SessionError::Backend)
    }

    /// Clears the backend session and discards all local state. Local state
    /// is dropped even when the backend call fails.
    pub async fn reset(&mut self) {
        if let Err(err) = self.backend.reset().await {
            tracing::warn!(error = %format!("{err:#}"), "backend reset failed");
        }
        self.content = None;
        self.completed_sections.clear();
        self.last_result = None;
        self.leave_section();
        tracing::info!("session reset");
    }

    /// Ends the current visit; preloads still in flight for it go stale.
    fn leave_section(&mut self) {
        self.visit += 1;
        self.current_section = None;
        self.pending_quiz = None;
        self.active_quiz = None;
    }
}
