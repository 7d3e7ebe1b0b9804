use std::collections::BTreeSet;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use serde_json::{Value, json};

pub const SESSION_COOKIE: &str = "session=stub-session";

#[derive(Debug, Clone, Default)]
pub struct BackendStubConfig {
    pub sections: usize,
    pub fail_content: bool,
    pub reject_activation: bool,
}

#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub body: Value,
    pub cookie: Option<String>,
}

/// Learning backend double. The correct option is always the first one.
pub struct BackendStub {
    pub base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

#[allow(dead_code)]
impl BackendStub {
    pub fn spawn(config: BackendStubConfig) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start backend stub server");
        let addr = server.server_addr();
        let base_url = format!("http://{addr}");

        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let handle = thread::spawn(move || {
            let mut completed = BTreeSet::<usize>::new();
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }

                let mut request = match server.recv_timeout(Duration::from_millis(50)) {
                    Ok(Some(req)) => req,
                    Ok(None) => continue,
                    Err(_) => break,
                };

                let path = request.url().to_string();
                if request.method() != &tiny_http::Method::Post {
                    let _ = request.respond(
                        tiny_http::Response::from_string("not found").with_status_code(404),
                    );
                    continue;
                }

                let cookie = request
                    .headers()
                    .iter()
                    .find(|h| h.field.equiv("Cookie"))
                    .map(|h| h.value.as_str().to_owned());

                let mut raw = String::new();
                if request.as_reader().read_to_string(&mut raw).is_err() {
                    let _ = request.respond(
                        tiny_http::Response::from_string("invalid request body")
                            .with_status_code(400),
                    );
                    continue;
                }
                let body = if raw.trim().is_empty() {
                    Value::Null
                } else {
                    match serde_json::from_str(&raw) {
                        Ok(value) => value,
                        Err(_) => {
                            let _ = request.respond(
                                tiny_http::Response::from_string("invalid json")
                                    .with_status_code(400),
                            );
                            continue;
                        }
                    }
                };

                recorded.lock().unwrap().push(RecordedRequest {
                    path: path.clone(),
                    body: body.clone(),
                    cookie,
                });

                let (status, response_body) = match path.as_str() {
                    "/generate-content" if config.fail_content => {
                        (500, json!({ "error": "model unavailable" }))
                    }
                    "/generate-content" => {
                        completed.clear();
                        (200, content_response(&body, config.sections))
                    }
                    "/generate-quiz" => (200, quiz_response(&body)),
                    "/activate-quiz" if config.reject_activation => {
                        (409, json!({ "error": "stale quiz id" }))
                    }
                    "/activate-quiz" => (200, json!({ "success": true })),
                    "/submit-quiz" => {
                        let section_index = body
                            .get("section_index")
                            .and_then(Value::as_u64)
                            .unwrap_or(0) as usize;
                        completed.insert(section_index);
                        let mut result = score(&body, &[]);
                        result["completed_sections"] = json!(completed);
                        (200, result)
                    }
                    "/eli5-explain" => (
                        200,
                        json!({
                            "explanation": format!(
                                "Imagine {} as a set of nesting dolls.",
                                body.get("question").and_then(Value::as_str).unwrap_or("it")
                            )
                        }),
                    ),
                    "/generate-interview-quiz" => (200, interview_response()),
                    "/submit-interview-quiz" => {
                        let questions = interview_questions();
                        (200, score(&body, &questions))
                    }
                    "/reset" => {
                        completed.clear();
                        (200, json!({ "success": true }))
                    }
                    _ => (404, json!({ "error": "not found" })),
                };

                let mut response = tiny_http::Response::from_string(response_body.to_string())
                    .with_status_code(status);
                let header =
                    tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                        .expect("build header");
                response = response.with_header(header);
                if path == "/generate-content" && status == 200 {
                    let cookie = tiny_http::Header::from_bytes(
                        &b"Set-Cookie"[..],
                        format!("{SESSION_COOKIE}; Path=/").as_bytes(),
                    )
                    .expect("build cookie header");
                    response = response.with_header(cookie);
                }
                let _ = request.respond(response);
            }
        });

        Self {
            base_url,
            requests,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }
}

impl Drop for BackendStub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn content_response(body: &Value, sections: usize) -> Value {
    let topic = body.get("topic").and_then(Value::as_str).unwrap_or("topic");
    let sections = (0..sections)
        .map(|idx| {
            json!({
                "title": format!("{topic} part {}", idx + 1),
                "content": format!("Everything about {topic}, part {}.", idx + 1),
                "key_points": [format!("Key idea {}", idx + 1)],
                "estimated_time": 10,
            })
        })
        .collect::<Vec<_>>();
    json!({
        "overview": format!("A short course on {topic}."),
        "sections": sections,
    })
}

fn quiz_response(body: &Value) -> Value {
    let section_index = body
        .get("section_index")
        .and_then(Value::as_u64)
        .unwrap_or(0);
    let store = body
        .get("store_quiz")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let kind = if store { "stored" } else { "preload" };
    let questions = (1..=3)
        .map(|n| {
            json!({
                "question": format!("Section {} question {n}?", section_index + 1),
                "options": ["right", "wrong", "also wrong", "still wrong"],
            })
        })
        .collect::<Vec<_>>();
    json!({
        "quiz_id": format!("q-{section_index}-{kind}"),
        "questions": questions,
    })
}

fn interview_questions() -> Vec<Value> {
    (1..=20)
        .map(|n| {
            let category = if n % 2 == 0 { "technical" } else { "behavioral" };
            json!({
                "question": format!("Interview question {n}?"),
                "options": ["right", "wrong", "also wrong", "still wrong"],
                "category": category,
            })
        })
        .collect()
}

fn interview_response() -> Value {
    json!({ "questions": interview_questions() })
}

fn score(body: &Value, questions: &[Value]) -> Value {
    let answers = body
        .get("answers")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let total = answers.len();
    let mut incorrect = Vec::new();
    let mut correct = 0usize;
    for (idx, answer) in answers.iter().enumerate() {
        if answer.as_u64() == Some(0) {
            correct += 1;
        } else if let Some(question) = questions.get(idx) {
            incorrect.push(json!({
                "question": question["question"],
                "your_answer": question["options"][answer.as_u64().unwrap_or(0) as usize],
                "correct_answer": question["options"][0],
                "question_number": idx + 1,
            }));
        }
    }
    let percentage = if total > 0 {
        correct as f64 / total as f64 * 100.0
    } else {
        0.0
    };
    json!({
        "score": correct,
        "total": total,
        "percentage": percentage,
        "incorrect_questions": incorrect,
    })
}
