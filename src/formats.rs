use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningContent {
    #[serde(default)]
    pub overview: String,
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub key_points: Vec<String>,
    /// Suggested study time in minutes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiz_id: Option<String>,
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub question: String,
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<QuestionCategory>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionCategory {
    Behavioral,
    Technical,
}

impl QuestionCategory {
    pub fn label(self) -> &'static str {
        match self {
            Self::Behavioral => "Behavioral",
            Self::Technical => "Technical",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizResult {
    pub score: u32,
    pub total: u32,
    pub percentage: f64,
    /// Authoritative list of completed section indices. Absent in interview mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_sections: Option<Vec<usize>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub incorrect_questions: Vec<IncorrectQuestion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncorrectQuestion {
    pub question: String,
    pub your_answer: String,
    pub correct_answer: String,
    pub question_number: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentRequest {
    pub topic: String,
    pub familiarity: String,
    /// Minutes available for studying.
    pub time: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateQuizRequest {
    pub section_index: usize,
    pub store_quiz: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivateQuizRequest {
    pub quiz_id: String,
    pub section_index: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitQuizRequest {
    pub answers: Vec<usize>,
    pub section_index: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplainRequest {
    pub question: String,
    pub section_index: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplainResponse {
    pub explanation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterviewRequest {
    pub position_title: String,
    pub company: String,
    pub job_description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterviewQuiz {
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitInterviewRequest {
    pub answers: Vec<usize>,
}
