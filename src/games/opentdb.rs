use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;

use crate::errors::{BotError, BotResult};

pub const TRIVIA_URL: &str = "https://opentdb.com/api.php?amount=1&encode=base64";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuestionKind {
    Boolean,
    Multiple,
}

impl QuestionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionKind::Boolean => "boolean",
            QuestionKind::Multiple => "multiple",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            QuestionKind::Boolean => "Boolean",
            QuestionKind::Multiple => "Multiple",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TriviaQuestion {
    pub kind: QuestionKind,
    pub category: String,
    pub difficulty: String,
    pub question: String,
    pub correct_answer: String,
    pub incorrect_answers: Vec<String>,
}

#[derive(Deserialize)]
struct OpenTdbResponse {
    response_code: i64,
    results: Vec<RawQuestion>,
}

#[derive(Deserialize)]
struct RawQuestion {
    category: String,
    difficulty: String,
    question: String,
    correct_answer: String,
    incorrect_answers: Vec<String>,
}

fn decode(field: &str) -> BotResult<String> {
    let bytes = STANDARD.decode(field).map_err(|e| BotError::ExternalCallFailed(format!("bad base64 from trivia api: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| BotError::ExternalCallFailed(format!("bad utf-8 from trivia api: {}", e)))
}

pub fn parse_response(kind: QuestionKind, body: &str) -> BotResult<TriviaQuestion> {
    let response: OpenTdbResponse = serde_json::from_str(body).map_err(|e| BotError::ExternalCallFailed(format!("unexpected trivia payload: {}", e)))?;
    if response.response_code != 0 {
        return Err(BotError::ExternalCallFailed(format!("trivia api returned code {}", response.response_code)));
    }
    let raw = response.results.into_iter().next().ok_or_else(|| BotError::ExternalCallFailed("trivia api returned no questions".to_string()))?;

    Ok(TriviaQuestion {
        kind,
        category: decode(&raw.category)?,
        difficulty: decode(&raw.difficulty)?,
        question: decode(&raw.question)?,
        correct_answer: decode(&raw.correct_answer)?,
        incorrect_answers: raw.incorrect_answers.iter().map(|a| decode(a)).collect::<BotResult<Vec<_>>>()?,
    })
}

#[derive(Clone)]
pub struct TriviaClient {
    http: reqwest::Client,
}

impl TriviaClient {
    pub fn new(http: reqwest::Client) -> Self {
        TriviaClient { http }
    }

    pub async fn fetch(&self, kind: QuestionKind) -> BotResult<TriviaQuestion> {
        let url = format!("{}&type={}", TRIVIA_URL, kind.as_str());
        let body = self.http.get(&url).send().await?.error_for_status()?.text().await?;
        parse_response(kind, &body)
    }
}
