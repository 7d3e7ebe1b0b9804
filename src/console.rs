use std::io::Write;
use std::sync::Arc;

use anyhow::Context as _;
use clap::ValueEnum as _;
use tokio::io::{AsyncBufRead, AsyncBufReadExt as _, Lines};

use crate::backend::Backend;
use crate::cli::{Familiarity, InterviewArgs, LearnArgs};
use crate::error::SessionError;
use crate::formats::{ContentRequest, InterviewRequest};
use crate::interview::{InterviewSession, InterviewStage};
use crate::screen::{Screen, render, render_interview_quiz, render_interview_result};
use crate::session::{Advance, LearningSession};

pub struct Console<R, W> {
    lines: Lines<R>,
    out: W,
}

impl<R, W> Console<R, W>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    pub fn new(input: R, out: W) -> Self {
        Self {
            lines: input.lines(),
            out,
        }
    }

    pub fn into_output(self) -> W {
        self.out
    }

    pub fn print(&mut self, text: &str) -> anyhow::Result<()> {
        self.out.write_all(text.as_bytes()).context("write output")?;
        if !text.ends_with('\n') {
            self.out.write_all(b"\n").context("write output")?;
        }
        self.out.flush().context("flush output")
    }

    /// Reads one trimmed line; `None` on end of input.
    pub async fn prompt(&mut self, label: &str) -> anyhow::Result<Option<String>> {
        write!(self.out, "{label}> ").context("write prompt")?;
        self.out.flush().context("flush output")?;
        let line = self.lines.next_line().await.context("read input")?;
        Ok(line.map(|line| line.trim().to_owned()))
    }
}

pub async fn run_learn(backend: Arc<dyn Backend>, args: LearnArgs) -> anyhow::Result<()> {
    let initial = args.topic.map(|topic| ContentRequest {
        topic,
        familiarity: args.familiarity.as_str().to_owned(),
        time: args.time,
    });

    let mut session = LearningSession::new(backend);
    let mut console = Console::new(
        tokio::io::BufReader::new(tokio::io::stdin()),
        std::io::stdout(),
    );
    learn_loop(&mut session, &mut console, initial).await
}

pub async fn run_interview(backend: Arc<dyn Backend>, args: InterviewArgs) -> anyhow::Result<()> {
    let job_description = match (&args.job_description, &args.job_description_file) {
        (Some(text), _) => Some(text.clone()),
        (None, Some(path)) => Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("read job description: {path}"))?,
        ),
        (None, None) => None,
    };
    let initial = match (args.position_title, job_description) {
        (Some(position_title), Some(job_description)) => Some(InterviewRequest {
            position_title,
            company: args.company.unwrap_or_default(),
            job_description,
        }),
        _ => None,
    };

    let mut interview = InterviewSession::new(backend);
    let mut console = Console::new(
        tokio::io::BufReader::new(tokio::io::stdin()),
        std::io::stdout(),
    );
    interview_loop(&mut interview, &mut console, initial).await
}

pub async fn run_reset(backend: Arc<dyn Backend>) -> anyhow::Result<()> {
    backend.reset().await.context("reset backend session")?;
    println!("Session reset.");
    Ok(())
}

pub async fn learn_loop<R, W>(
    session: &mut LearningSession,
    console: &mut Console<R, W>,
    mut initial: Option<ContentRequest>,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut screen = Screen::Start;

    loop {
        session.poll_preloads();

        if screen == Screen::Start {
            let request = match initial.take() {
                Some(request) => request,
                None => match read_content_request(console).await? {
                    Some(request) => request,
                    None => return Ok(()),
                },
            };
            console.print("Generating learning content...")?;
            match session.generate_content(&request).await.map(|_| ()) {
                Ok(()) => {
                    screen = Screen::Overview;
                    console.print(&render(screen, session))?;
                }
                Err(err) => report(console, "generating content", &err)?,
            }
            continue;
        }

        let Some(line) = console.prompt(">").await? else {
            return Ok(());
        };
        if line.is_empty() {
            continue;
        }
        let (command, rest) = match line.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (line.as_str(), ""),
        };

        match (screen, command) {
            (_, "quit" | "exit") => return Ok(()),
            (_, "help") => console.print(learn_help(screen))?,
            (_, "reset") => {
                session.reset().await;
                screen = Screen::Start;
                console.print("Session reset.")?;
            }
            (_, "overview") => {
                session.back_to_sections();
                screen = Screen::Overview;
                console.print(&render(screen, session))?;
            }
            (_, "sections") => {
                session.back_to_sections();
                screen = Screen::Sections;
                console.print(&render(screen, session))?;
            }
            (Screen::Section | Screen::Quiz | Screen::Results, "back") => {
                session.back_to_sections();
                screen = Screen::Sections;
                console.print(&render(screen, session))?;
            }
            (Screen::Overview | Screen::Sections, number) if number.parse::<usize>().is_ok() => {
                let Some(index) = number.parse::<usize>().ok().and_then(|n| n.checked_sub(1))
                else {
                    console.print("Section numbers start at 1.")?;
                    continue;
                };
                match session.enter_section(index) {
                    Ok(()) => {
                        screen = Screen::Section;
                        console.print(&render(screen, session))?;
                    }
                    Err(err) => report(console, "opening section", &err)?,
                }
            }
            (Screen::Section, "quiz") => {
                console.print("Preparing quiz...")?;
                match session.start_quiz().await.map(|_| ()) {
                    Ok(()) => {
                        screen = Screen::Quiz;
                        console.print(&render(screen, session))?;
                    }
                    Err(err) => report(console, "generating quiz", &err)?,
                }
            }
            (Screen::Section, "explain") => match session.explain(rest).await {
                Ok(explanation) => console.print(&format!("ELI5: {explanation}"))?,
                Err(err) => report(console, "getting explanation", &err)?,
            },
            (Screen::Quiz, _) => {
                let count = session
                    .active_quiz()
                    .map_or(0, |active| active.quiz.questions.len());
                let answers = match parse_answers(&line, count) {
                    Ok(answers) => answers,
                    Err(message) => {
                        console.print(&message)?;
                        continue;
                    }
                };
                match session.submit_quiz(&answers).await.map(|_| ()) {
                    Ok(()) => {
                        screen = Screen::Results;
                        console.print(&render(screen, session))?;
                    }
                    Err(err) => report(console, "submitting quiz", &err)?,
                }
            }
            (Screen::Results, "next") => {
                if let Some(next) = advance(session, console)? {
                    screen = next;
                }
            }
            (_, other) => console.print(&format!("Unknown command `{other}`. Type `help`."))?,
        }
    }
}

pub async fn interview_loop<R, W>(
    interview: &mut InterviewSession,
    console: &mut Console<R, W>,
    mut initial: Option<InterviewRequest>,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    loop {
        match interview.stage() {
            InterviewStage::Input => {
                let request = match initial.take() {
                    Some(request) => request,
                    None => match read_interview_request(console).await? {
                        Some(request) => request,
                        None => return Ok(()),
                    },
                };
                console.print("Generating interview questions...")?;
                match interview.generate(&request).await {
                    Ok(questions) => {
                        let text = render_interview_quiz(questions);
                        console.print(&text)?;
                    }
                    Err(err) => report(console, "generating interview questions", &err)?,
                }
            }
            InterviewStage::Quiz { questions } => {
                let count = questions.len();
                let Some(line) = console.prompt("answers").await? else {
                    return Ok(());
                };
                match line.as_str() {
                    "" => continue,
                    "quit" | "exit" => return Ok(()),
                    "reset" => {
                        interview.reset();
                        continue;
                    }
                    _ => {}
                }
                let answers = match parse_answers(&line, count) {
                    Ok(answers) => answers,
                    Err(message) => {
                        console.print(&message)?;
                        continue;
                    }
                };
                match interview.submit(&answers).await {
                    Ok(result) => {
                        let text = render_interview_result(result);
                        console.print(&text)?;
                    }
                    Err(err) => report(console, "submitting interview answers", &err)?,
                }
            }
            InterviewStage::Results { .. } => {
                let Some(line) = console.prompt(">").await? else {
                    return Ok(());
                };
                match line.as_str() {
                    "" => {}
                    "quit" | "exit" => return Ok(()),
                    "reset" => interview.reset(),
                    other => {
                        console.print(&format!("Unknown command `{other}`. Type `reset` or `quit`."))?
                    }
                }
            }
        }
    }
}

/// Moves past a result. On failure the error is reported and the caller
/// stays on its screen.
fn advance<R, W>(
    session: &mut LearningSession,
    console: &mut Console<R, W>,
) -> anyhow::Result<Option<Screen>>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let screen = match session.advance_section() {
        Ok(Advance::Section(_)) => Screen::Section,
        Ok(Advance::Overview) => Screen::Overview,
        Err(err) => {
            report(console, "opening the next section", &err)?;
            return Ok(None);
        }
    };
    console.print(&render(screen, session))?;
    Ok(Some(screen))
}

async fn read_content_request<R, W>(
    console: &mut Console<R, W>,
) -> anyhow::Result<Option<ContentRequest>>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    console.print("Enter a topic to start learning.")?;
    let topic = loop {
        let Some(topic) = console.prompt("topic").await? else {
            return Ok(None);
        };
        if !topic.is_empty() {
            break topic;
        }
    };

    let familiarity = loop {
        let Some(raw) = console
            .prompt("familiarity (beginner/intermediate/advanced)")
            .await?
        else {
            return Ok(None);
        };
        if raw.is_empty() {
            break Familiarity::Beginner;
        }
        match Familiarity::from_str(&raw, true) {
            Ok(familiarity) => break familiarity,
            Err(_) => console.print("Please choose beginner, intermediate or advanced.")?,
        }
    };

    let time = loop {
        let Some(raw) = console.prompt("minutes available").await? else {
            return Ok(None);
        };
        if raw.is_empty() {
            break LearnArgs::DEFAULT_MINUTES;
        }
        match raw.parse::<u32>() {
            Ok(minutes) if minutes > 0 => break minutes,
            _ => console.print("Please enter a whole number of minutes.")?,
        }
    };

    Ok(Some(ContentRequest {
        topic,
        familiarity: familiarity.as_str().to_owned(),
        time,
    }))
}

async fn read_interview_request<R, W>(
    console: &mut Console<R, W>,
) -> anyhow::Result<Option<InterviewRequest>>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    console.print("Describe the position to practise for.")?;
    let Some(position_title) = console.prompt("position title").await? else {
        return Ok(None);
    };
    let Some(company) = console.prompt("company").await? else {
        return Ok(None);
    };
    let Some(job_description) = console.prompt("job description").await? else {
        return Ok(None);
    };
    Ok(Some(InterviewRequest {
        position_title,
        company,
        job_description,
    }))
}

/// Parses 1-based option numbers. `-` or `0` leaves a question unanswered;
/// missing trailing answers are unanswered too.
pub fn parse_answers(line: &str, count: usize) -> Result<Vec<Option<usize>>, String> {
    let mut answers = Vec::with_capacity(count);
    for token in line.split_whitespace() {
        let answer = match token {
            "-" | "0" => None,
            other => match other.parse::<usize>() {
                Ok(number) => Some(number - 1),
                Err(_) => return Err(format!("`{other}` is not an option number.")),
            },
        };
        answers.push(answer);
    }
    if answers.len() > count {
        return Err(format!(
            "Expected {count} answers but got {}.",
            answers.len()
        ));
    }
    answers.resize(count, None);
    Ok(answers)
}

fn report<R, W>(console: &mut Console<R, W>, action: &str, err: &SessionError) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let message = match err {
        SessionError::Unanswered { .. } | SessionError::AnswerCount { .. } => {
            "Please answer all questions before submitting.".to_owned()
        }
        SessionError::InvalidOption {
            question, options, ..
        } => format!("Question {question} only has {options} options."),
        SessionError::MissingField(field) => format!("Please provide a {field}."),
        SessionError::Backend(source) => {
            tracing::error!(action, error = %format!("{source:#}"), "request failed");
            format!("Error {action}. Please try again.")
        }
        other => other.to_string(),
    };
    console.print(&message)
}

fn learn_help(screen: Screen) -> &'static str {
    match screen {
        Screen::Start => "Answer the prompts to generate learning content.",
        Screen::Overview | Screen::Sections => {
            "Commands: <section number>, sections, overview, reset, quit"
        }
        Screen::Section => "Commands: quiz, explain <question>, back, sections, reset, quit",
        Screen::Quiz => "Enter one option number per question, e.g. `1 3 2`. Or: back, reset, quit",
        Screen::Results => "Commands: next, overview, back, reset, quit",
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::formats::QuizResult;
    use crate::session::testing::{Call, ScriptedBackend, interview_questions, result};

    async fn drive(backend: &Arc<ScriptedBackend>, input: &str) -> String {
        let mut session = LearningSession::new(Arc::clone(backend) as Arc<dyn Backend>);
        let mut console = Console::new(input.as_bytes(), Vec::new());
        learn_loop(&mut session, &mut console, None).await.unwrap();
        String::from_utf8(console.into_output()).unwrap()
    }

    #[test]
    fn parse_answers_converts_to_zero_based() {
        assert_eq!(
            parse_answers("1 4 2", 3).unwrap(),
            vec![Some(0), Some(3), Some(1)]
        );
        assert_eq!(parse_answers("2 -", 3).unwrap(), vec![Some(1), None, None]);
        assert!(parse_answers("1 2 3 4", 3).is_err());
        assert!(parse_answers("a", 1).is_err());
    }

    #[tokio::test]
    async fn learning_walkthrough_over_the_console() {
        let backend = Arc::new(ScriptedBackend::with_sections(2));
        backend
            .results
            .lock()
            .unwrap()
            .push_back(result(85.0, vec![0]));

        let output = drive(
            &backend,
            "Recursion\nbeginner\n20\nsections\n1\nquiz\n1 2\n1 2 3\nnext\nquit\n",
        )
        .await;

        assert!(output.contains("Total sections: 2"));
        assert!(output.contains("== 1. Part 1 =="));
        assert!(output.contains("Please answer all questions before submitting."));
        assert!(output.contains("[excellent] 85%"));
        assert!(output.contains("Next Section"));
        assert!(output.contains("== 2. Part 2 =="));

        let submits = backend
            .calls()
            .into_iter()
            .filter(|call| matches!(call, Call::Submit { .. }))
            .collect::<Vec<_>>();
        assert_eq!(
            submits,
            vec![Call::Submit {
                answers: vec![0, 1, 2],
                section_index: 0
            }]
        );
    }

    #[tokio::test]
    async fn advance_without_open_section_is_reported() {
        let backend = Arc::new(ScriptedBackend::with_sections(2));
        let mut session = LearningSession::new(Arc::clone(&backend) as Arc<dyn Backend>);
        session
            .generate_content(&ContentRequest {
                topic: "Recursion".to_owned(),
                familiarity: "beginner".to_owned(),
                time: 30,
            })
            .await
            .unwrap();
        let mut console = Console::new("".as_bytes(), Vec::new());

        let next = advance(&mut session, &mut console).unwrap();
        assert_eq!(next, None);
        let output = String::from_utf8(console.into_output()).unwrap();
        assert_eq!(output, "no section is open\n");
    }

    #[tokio::test]
    async fn advance_from_last_section_returns_to_overview() {
        let backend = Arc::new(ScriptedBackend::with_sections(1));
        let mut session = LearningSession::new(Arc::clone(&backend) as Arc<dyn Backend>);
        session
            .generate_content(&ContentRequest {
                topic: "Recursion".to_owned(),
                familiarity: "beginner".to_owned(),
                time: 30,
            })
            .await
            .unwrap();
        session.enter_section(0).unwrap();
        let mut console = Console::new("".as_bytes(), Vec::new());

        let next = advance(&mut session, &mut console).unwrap();
        assert_eq!(next, Some(Screen::Overview));
        assert!(
            String::from_utf8(console.into_output())
                .unwrap()
                .contains("Total sections: 1")
        );
    }

    #[tokio::test]
    async fn failed_quiz_generation_stays_on_section() {
        let backend = Arc::new(ScriptedBackend::with_sections(1));
        *backend.fail_generate.lock().unwrap() = true;
        backend.fail_preload.lock().unwrap().push(0);

        let output = drive(&backend, "Recursion\n\n\n1\nquiz\nexplain base case\nquit\n").await;
        assert!(output.contains("Error generating quiz. Please try again."));
        assert!(output.contains("ELI5: Simply put: base case"));
    }

    #[tokio::test]
    async fn reset_returns_to_topic_prompt() {
        let backend = Arc::new(ScriptedBackend::with_sections(1));
        let output = drive(&backend, "Recursion\n\n\nreset\nGraphs\n\n\nquit\n").await;
        assert!(output.contains("Session reset."));
        assert!(backend.calls().contains(&Call::Reset));
        assert!(backend
            .calls()
            .contains(&Call::GenerateContent("Graphs".to_owned())));
    }

    #[tokio::test]
    async fn interview_walkthrough_over_the_console() {
        let backend = Arc::new(ScriptedBackend::default());
        *backend.interview_questions.lock().unwrap() = interview_questions(2);
        backend.results.lock().unwrap().push_back(QuizResult {
            score: 2,
            total: 2,
            percentage: 100.0,
            completed_sections: None,
            incorrect_questions: Vec::new(),
        });

        let mut interview = InterviewSession::new(Arc::clone(&backend) as Arc<dyn Backend>);
        let mut console = Console::new(
            "SRE\nAcme\nKeep things running.\n1\n1 2\nquit\n".as_bytes(),
            Vec::new(),
        );
        interview_loop(&mut interview, &mut console, None)
            .await
            .unwrap();
        let output = String::from_utf8(console.into_output()).unwrap();

        assert!(output.contains("-- Behavioral --"));
        assert!(output.contains("Please answer all questions before submitting."));
        assert!(output.contains("== Interview Results =="));
        assert!(!output.contains("Questions to Review"));
    }
}
