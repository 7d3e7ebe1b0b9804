use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Backend base URL (default: $LEARNPATH_BACKEND_URL or http://127.0.0.1:5000).
    #[arg(long, global = true)]
    pub backend_url: Option<String>,

    /// Request timeout in seconds (default: $LEARNPATH_TIMEOUT_SECS or 300).
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Study a topic section by section, with a quiz per section.
    Learn(LearnArgs),
    /// Practise a mock interview generated from a job description.
    Interview(InterviewArgs),
    /// Clear the backend session.
    Reset,
}

#[derive(Debug, Args)]
pub struct LearnArgs {
    /// Topic to study. Prompted for when omitted.
    #[arg(long)]
    pub topic: Option<String>,

    #[arg(long, value_enum, default_value_t = Familiarity::Beginner)]
    pub familiarity: Familiarity,

    /// Minutes available for studying.
    #[arg(long, default_value_t = LearnArgs::DEFAULT_MINUTES)]
    pub time: u32,
}

impl LearnArgs {
    pub const DEFAULT_MINUTES: u32 = 30;
}

#[derive(Debug, Args)]
pub struct InterviewArgs {
    #[arg(long)]
    pub position_title: Option<String>,

    #[arg(long)]
    pub company: Option<String>,

    #[arg(long, conflicts_with = "job_description_file")]
    pub job_description: Option<String>,

    /// Read the job description from a file.
    #[arg(long)]
    pub job_description_file: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Familiarity {
    Beginner,
    Intermediate,
    Advanced,
}

impl Familiarity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        }
    }
}
