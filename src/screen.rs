//! Terminal rendering. Every screen is drawn from session state alone; the
//! console decides which `Screen` is showing and nothing reads rendered text
//! back.

use crate::formats::{Question, QuizResult};
use crate::interview::display_groups;
use crate::session::{LearningSession, Progress};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Start,
    Overview,
    Sections,
    Section,
    Quiz,
    Results,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultGrade {
    Excellent,
    Good,
    NeedsImprovement,
}

impl ResultGrade {
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage >= 80.0 {
            Self::Excellent
        } else if percentage >= 60.0 {
            Self::Good
        } else {
            Self::NeedsImprovement
        }
    }

    pub fn class(self) -> &'static str {
        match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::NeedsImprovement => "needs-improvement",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::Excellent => "Excellent work! You've mastered this section!",
            Self::Good => "Good job! You're making great progress!",
            Self::NeedsImprovement => "Keep practicing! Every expert was once a beginner.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextAction {
    NextSection,
    BackToOverview,
}

impl NextAction {
    pub fn label(self) -> &'static str {
        match self {
            Self::NextSection => "Next Section",
            Self::BackToOverview => "Back to Overview",
        }
    }

    fn command(self) -> &'static str {
        match self {
            Self::NextSection => "next",
            Self::BackToOverview => "overview",
        }
    }
}

pub fn render(screen: Screen, session: &LearningSession) -> String {
    match screen {
        Screen::Start => "Enter a topic to start learning.\n".to_owned(),
        Screen::Overview => render_overview(session),
        Screen::Sections => render_sections(session),
        Screen::Section => render_section(session),
        Screen::Quiz => match session.active_quiz() {
            Some(active) => render_quiz(&active.quiz.questions),
            None => render_section(session),
        },
        Screen::Results => match session.last_result() {
            Some(result) => {
                let next = if session.has_next_section() {
                    NextAction::NextSection
                } else {
                    NextAction::BackToOverview
                };
                let mut out = render_result(result, next);
                out.push_str(&progress_line(session.progress()));
                out
            }
            None => render_overview(session),
        },
    }
}

pub fn progress_line(progress: Progress) -> String {
    format!(
        "{:.0}% Complete ({}/{} sections)\n",
        progress.percent(),
        progress.completed,
        progress.total
    )
}

fn render_overview(session: &LearningSession) -> String {
    let Some(content) = session.content() else {
        return "No learning content yet.\n".to_owned();
    };

    let mut out = String::new();
    out.push_str("== Overview ==\n");
    out.push_str(&content.overview);
    out.push('\n');
    out.push_str(&format!("Total sections: {}\n", content.sections.len()));
    out.push_str(&progress_line(session.progress()));
    out.push_str("Type `sections` to browse the sections.\n");
    out
}

fn render_sections(session: &LearningSession) -> String {
    let Some(content) = session.content() else {
        return "No learning content yet.\n".to_owned();
    };

    let mut out = String::new();
    out.push_str("== Sections ==\n");
    for (idx, section) in content.sections.iter().enumerate() {
        let status = if session.is_completed(idx) {
            "done"
        } else {
            "    "
        };
        out.push_str(&format!("[{status}] {}. {}", idx + 1, section.title));
        if let Some(minutes) = section.estimated_time {
            out.push_str(&format!(" (~{minutes:.0} min)"));
        }
        out.push('\n');
    }
    out.push_str("Type a section number to open it.\n");
    out
}

fn render_section(session: &LearningSession) -> String {
    let (Some(index), Some(section)) = (session.current_section_index(), session.current_section())
    else {
        return render_sections(session);
    };

    let mut out = String::new();
    out.push_str(&format!("== {}. {} ==\n", index + 1, section.title));
    out.push_str(&section.content);
    out.push('\n');
    if !section.key_points.is_empty() {
        out.push_str("Key Points:\n");
        for point in &section.key_points {
            out.push_str(&format!("  - {point}\n"));
        }
    }
    out.push_str("Type `quiz` to take the quiz, `explain <question>` for a simpler explanation, or `back`.\n");
    out
}

pub fn render_quiz(questions: &[Question]) -> String {
    let mut out = String::new();
    out.push_str("== Quiz ==\n");
    for (idx, question) in questions.iter().enumerate() {
        render_question(&mut out, idx, question);
    }
    out.push_str(&answer_hint(questions.len()));
    out
}

fn render_question(out: &mut String, idx: usize, question: &Question) {
    out.push_str(&format!("Question {}: {}\n", idx + 1, question.question));
    for (opt_idx, option) in question.options.iter().enumerate() {
        out.push_str(&format!("  {}) {option}\n", opt_idx + 1));
    }
}

fn answer_hint(count: usize) -> String {
    format!("Answer with {count} option numbers separated by spaces (`-` skips a question).\n")
}

pub fn render_result(result: &QuizResult, next: NextAction) -> String {
    let grade = ResultGrade::from_percentage(result.percentage);

    let mut out = String::new();
    out.push_str("== Quiz Results ==\n");
    out.push_str(&format!("[{}] {:.0}%\n", grade.class(), result.percentage));
    out.push_str(grade.message());
    out.push('\n');
    out.push_str(&format!(
        "You answered {} out of {} questions correctly.\n",
        result.score, result.total
    ));
    render_review(&mut out, result);
    out.push_str(&format!("{} (`{}`)\n", next.label(), next.command()));
    out
}

pub fn render_interview_quiz(questions: &[Question]) -> String {
    let mut out = String::new();
    out.push_str("== Mock Interview ==\n");
    for (category, indices) in display_groups(questions) {
        let heading = category.map_or("Other", |c| c.label());
        out.push_str(&format!("-- {heading} --\n"));
        for idx in indices {
            render_question(&mut out, idx, &questions[idx]);
        }
    }
    out.push_str(&answer_hint(questions.len()));
    out.push_str("Answers follow question numbers, not display order.\n");
    out
}

pub fn render_interview_result(result: &QuizResult) -> String {
    let grade = ResultGrade::from_percentage(result.percentage);

    let mut out = String::new();
    out.push_str("== Interview Results ==\n");
    out.push_str(&format!("[{}] {:.0}%\n", grade.class(), result.percentage));
    out.push_str(&format!(
        "You answered {} out of {} questions correctly.\n",
        result.score, result.total
    ));
    render_review(&mut out, result);
    out.push_str("Type `reset` to start a new interview or `quit`.\n");
    out
}

fn render_review(out: &mut String, result: &QuizResult) {
    if result.incorrect_questions.is_empty() {
        return;
    }
    out.push_str("Questions to Review:\n");
    for item in &result.incorrect_questions {
        out.push_str(&format!("  Q{}: {}\n", item.question_number, item.question));
        out.push_str(&format!("    Your answer: {}\n", item.your_answer));
        out.push_str(&format!("    Correct answer: {}\n", item.correct_answer));
    }
}
