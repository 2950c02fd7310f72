//! Survey document types and validation

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Maximum length of a question title, in characters
pub const MAX_QUESTION_TITLE_CHARS: usize = 500;

/// Question type enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QuestionType {
    /// Several options may be selected
    MultipleChoice,
    /// Exactly one option may be selected
    SingleChoice,
    /// Free-form long answer
    OpenQuestion,
    /// Free-form short answer
    ShortAnswer,
    /// 1-10 rating scale
    Scale,
    /// 0-10 net promoter score
    NpsScore,
}

impl QuestionType {
    /// All recognized question types
    pub const ALL: [QuestionType; 6] = [
        QuestionType::MultipleChoice,
        QuestionType::SingleChoice,
        QuestionType::OpenQuestion,
        QuestionType::ShortAnswer,
        QuestionType::Scale,
        QuestionType::NpsScore,
    ];

    /// Wire name of the type
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::MultipleChoice => "multipleChoice",
            QuestionType::SingleChoice => "singleChoice",
            QuestionType::OpenQuestion => "openQuestion",
            QuestionType::ShortAnswer => "shortAnswer",
            QuestionType::Scale => "scale",
            QuestionType::NpsScore => "npsScore",
        }
    }

    /// Parse a type from its wire name
    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }

    /// Choice types carry an `options` list, all others must not
    pub fn is_choice(&self) -> bool {
        matches!(self, QuestionType::MultipleChoice | QuestionType::SingleChoice)
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single survey question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// Question type
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    /// Question text
    pub title: String,
    /// Options, only for choice types
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

impl Question {
    /// Create a non-choice question
    pub fn new(question_type: QuestionType, title: impl Into<String>) -> Self {
        Self {
            question_type,
            title: title.into(),
            options: None,
        }
    }

    /// Create a choice question with options
    pub fn with_options(
        question_type: QuestionType,
        title: impl Into<String>,
        options: Vec<String>,
    ) -> Self {
        Self {
            question_type,
            title: title.into(),
            options: Some(options),
        }
    }
}

/// A structured survey document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveyDocument {
    /// Survey title
    pub title: String,
    /// Short summary of the survey
    #[serde(default)]
    pub description: String,
    /// Questions, in caller-significant order
    pub questions: Vec<Question>,
}

/// A violation of the survey schema
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaViolation {
    #[error("malformed document: {0}")]
    Malformed(String),

    #[error("missing field: {0}")]
    MissingField(String),

    #[error("survey title must not be empty")]
    EmptyTitle,

    #[error("survey must contain at least one question")]
    NoQuestions,

    #[error("question {index}: unrecognized type {value:?}")]
    UnknownQuestionType { index: usize, value: String },

    #[error("question {index}: title must be 1-{max} characters, got {len}")]
    QuestionTitleLength { index: usize, len: usize, max: usize },

    #[error("question {index}: {question_type} question requires at least one option")]
    MissingOptions { index: usize, question_type: QuestionType },

    #[error("question {index}: options are not allowed on {question_type} questions")]
    UnexpectedOptions { index: usize, question_type: QuestionType },
}

impl SurveyDocument {
    /// Create a new survey document
    pub fn new(title: impl Into<String>, description: impl Into<String>, questions: Vec<Question>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            questions,
        }
    }

    /// Check the document against the schema invariants
    pub fn validate(&self) -> Result<(), SchemaViolation> {
        if self.title.trim().is_empty() {
            return Err(SchemaViolation::EmptyTitle);
        }
        if self.questions.is_empty() {
            return Err(SchemaViolation::NoQuestions);
        }

        for (index, question) in self.questions.iter().enumerate() {
            let len = question.title.trim().chars().count();
            if len == 0 || len > MAX_QUESTION_TITLE_CHARS {
                return Err(SchemaViolation::QuestionTitleLength {
                    index,
                    len,
                    max: MAX_QUESTION_TITLE_CHARS,
                });
            }

            match (&question.options, question.question_type.is_choice()) {
                (None, true) => {
                    return Err(SchemaViolation::MissingOptions {
                        index,
                        question_type: question.question_type,
                    })
                }
                (Some(options), true) if options.is_empty() => {
                    return Err(SchemaViolation::MissingOptions {
                        index,
                        question_type: question.question_type,
                    })
                }
                (Some(_), false) => {
                    return Err(SchemaViolation::UnexpectedOptions {
                        index,
                        question_type: question.question_type,
                    })
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// Drop `options` from every question that is not a choice type
    pub fn strip_non_choice_options(&mut self) {
        for question in &mut self.questions {
            if !question.question_type.is_choice() {
                question.options = None;
            }
        }
    }

    /// Build a validated document from raw generator output
    ///
    /// Strings are trimmed, blank options are dropped and options on non-choice
    /// questions are stripped. Missing or unrecognized fields are rejected rather
    /// than coerced.
    pub fn from_generated(value: serde_json::Value) -> Result<Self, SchemaViolation> {
        let raw: GeneratedSurvey = serde_json::from_value(value)
            .map_err(|e| SchemaViolation::Malformed(e.to_string()))?;

        let title = raw
            .title
            .ok_or_else(|| SchemaViolation::MissingField("title".to_string()))?
            .trim()
            .to_string();
        let raw_questions = raw
            .questions
            .ok_or_else(|| SchemaViolation::MissingField("questions".to_string()))?;

        let mut questions = Vec::with_capacity(raw_questions.len());
        for (index, q) in raw_questions.into_iter().enumerate() {
            let type_name = q
                .question_type
                .ok_or_else(|| SchemaViolation::MissingField(format!("questions[{}].type", index)))?;
            let question_type = QuestionType::from_str(type_name.trim()).ok_or(
                SchemaViolation::UnknownQuestionType {
                    index,
                    value: type_name.clone(),
                },
            )?;
            let title = q
                .title
                .ok_or_else(|| SchemaViolation::MissingField(format!("questions[{}].title", index)))?
                .trim()
                .to_string();
            let options = if question_type.is_choice() {
                q.options.map(|opts| {
                    opts.into_iter()
                        .map(|o| o.trim().to_string())
                        .filter(|o| !o.is_empty())
                        .collect::<Vec<_>>()
                })
            } else {
                None
            };

            questions.push(Question {
                question_type,
                title,
                options,
            });
        }

        let document = SurveyDocument {
            title,
            description: raw.description.unwrap_or_default().trim().to_string(),
            questions,
        };
        document.validate()?;
        Ok(document)
    }

    /// Encode the document for storage in either cache tier
    pub fn to_payload(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Decode and re-validate a stored payload
    pub fn from_payload(bytes: &[u8]) -> Result<Self, String> {
        let mut document: SurveyDocument =
            serde_json::from_slice(bytes).map_err(|e| e.to_string())?;
        document.strip_non_choice_options();
        document.validate().map_err(|e| e.to_string())?;
        Ok(document)
    }
}

/// Lenient wire form of generator output, before validation
#[derive(Debug, Deserialize)]
struct GeneratedSurvey {
    title: Option<String>,
    description: Option<String>,
    questions: Option<Vec<GeneratedQuestion>>,
}

#[derive(Debug, Deserialize)]
struct GeneratedQuestion {
    #[serde(rename = "type")]
    question_type: Option<String>,
    title: Option<String>,
    options: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> SurveyDocument {
        SurveyDocument::new(
            "Customer Feedback",
            "Quick pulse",
            vec![
                Question::with_options(
                    QuestionType::SingleChoice,
                    "How satisfied are you?",
                    vec!["Very".into(), "Somewhat".into(), "Not".into()],
                ),
                Question::new(QuestionType::Scale, "Rate the website"),
            ],
        )
    }

    #[test]
    fn test_question_type_wire_names() {
        for t in QuestionType::ALL {
            let encoded = serde_json::to_string(&t).unwrap();
            assert_eq!(encoded, format!("\"{}\"", t.as_str()));
            assert_eq!(QuestionType::from_str(t.as_str()), Some(t));
        }
        assert_eq!(QuestionType::from_str("rating_scale"), None);
    }

    #[test]
    fn test_is_choice() {
        assert!(QuestionType::MultipleChoice.is_choice());
        assert!(QuestionType::SingleChoice.is_choice());
        assert!(!QuestionType::OpenQuestion.is_choice());
        assert!(!QuestionType::NpsScore.is_choice());
    }

    #[test]
    fn test_validate_ok() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_title_and_questions() {
        let mut doc = sample();
        doc.title = "   ".into();
        assert_eq!(doc.validate(), Err(SchemaViolation::EmptyTitle));

        let mut doc = sample();
        doc.questions.clear();
        assert_eq!(doc.validate(), Err(SchemaViolation::NoQuestions));
    }

    #[test]
    fn test_validate_question_title_bounds() {
        let mut doc = sample();
        doc.questions[1].title = "x".repeat(MAX_QUESTION_TITLE_CHARS);
        assert!(doc.validate().is_ok());

        doc.questions[1].title = "x".repeat(MAX_QUESTION_TITLE_CHARS + 1);
        assert!(matches!(
            doc.validate(),
            Err(SchemaViolation::QuestionTitleLength { index: 1, .. })
        ));
    }

    #[test]
    fn test_validate_choice_requires_options() {
        let mut doc = sample();
        doc.questions[0].options = None;
        assert!(matches!(
            doc.validate(),
            Err(SchemaViolation::MissingOptions { index: 0, .. })
        ));
    }

    #[test]
    fn test_options_absent_not_empty_when_serialized() {
        let encoded = serde_json::to_value(sample()).unwrap();
        assert!(encoded["questions"][1].get("options").is_none());
        assert_eq!(encoded["questions"][0]["options"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_from_generated_strips_non_choice_options() {
        let raw = json!({
            "title": " Store survey ",
            "questions": [
                {"type": "scale", "title": "Rate us", "options": ["1", "10"]},
                {"type": "multipleChoice", "title": "Which areas?", "options": ["Search", " ", "Support"]}
            ]
        });

        let doc = SurveyDocument::from_generated(raw).unwrap();
        assert_eq!(doc.title, "Store survey");
        assert_eq!(doc.description, "");
        assert_eq!(doc.questions[0].options, None);
        assert_eq!(
            doc.questions[1].options,
            Some(vec!["Search".to_string(), "Support".to_string()])
        );
    }

    #[test]
    fn test_from_generated_rejects_missing_fields() {
        let err = SurveyDocument::from_generated(json!({"title": "x"})).unwrap_err();
        assert_eq!(err, SchemaViolation::MissingField("questions".into()));

        let err = SurveyDocument::from_generated(json!({
            "title": "x",
            "questions": [{"type": "scale"}]
        }))
        .unwrap_err();
        assert!(matches!(err, SchemaViolation::MissingField(f) if f == "questions[0].title"));
    }

    #[test]
    fn test_from_generated_rejects_unknown_type() {
        let err = SurveyDocument::from_generated(json!({
            "title": "x",
            "questions": [{"type": "ranking", "title": "Rank these"}]
        }))
        .unwrap_err();
        assert!(matches!(err, SchemaViolation::UnknownQuestionType { index: 0, .. }));
    }

    #[test]
    fn test_payload_preserves_question_order() {
        let doc = sample();
        let bytes = doc.to_payload().unwrap();
        let decoded = SurveyDocument::from_payload(&bytes).unwrap();
        assert_eq!(decoded, doc);
        assert_eq!(decoded.to_payload().unwrap(), bytes);
    }

    #[test]
    fn test_from_payload_rejects_garbage() {
        assert!(SurveyDocument::from_payload(b"not json").is_err());
        assert!(SurveyDocument::from_payload(br#"{"title":"x","questions":[]}"#).is_err());
    }
}
