//! Sample normalization.
//!
//! Dataset items arrive with heterogeneous choice layouts and gold answers
//! given either as a label or as literal text. Everything is normalized
//! here into a [`Sample`] with one canonical ordered [`Choices`] mapping
//! before extraction or scoring sees it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Choices;

/// Errors raised while normalizing a dataset item.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SampleError {
    #[error("invalid sample JSON: {0}")]
    Parse(String),

    #[error("sample '{id}' has no choices")]
    NoChoices { id: String },

    #[error("sample '{id}' repeats choice label '{label}'")]
    DuplicateLabel { id: String, label: String },

    #[error("sample '{id}' has {labels} choice labels but {texts} choice texts")]
    MismatchedColumns {
        id: String,
        labels: usize,
        texts: usize,
    },

    #[error("sample '{id}' has no gold answer (expected 'answerKey' or 'answer')")]
    MissingGold { id: String },

    #[error("sample '{id}': gold answer '{gold}' is not among its choices")]
    GoldNotInChoices { id: String, gold: String },
}

/// A normalized evaluation item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub id: String,
    pub question: String,
    pub choices: Choices,
    pub gold_label: String,
}

impl Sample {
    /// Text of the gold choice.
    pub fn gold_text(&self) -> &str {
        self.choices.get(&self.gold_label).unwrap_or_default()
    }

    /// Parse and normalize one JSON line. `index` names items without an id.
    pub fn from_json_line(line: &str, index: usize) -> Result<Self, SampleError> {
        let raw: RawSample =
            serde_json::from_str(line).map_err(|e| SampleError::Parse(e.to_string()))?;
        raw.normalize(index)
    }
}

/// Question as a plain string or a `{stem}` object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawQuestion {
    Text(String),
    Stem { stem: String },
}

impl RawQuestion {
    fn into_text(self) -> String {
        match self {
            RawQuestion::Text(text) => text,
            RawQuestion::Stem { stem } => stem,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChoiceRecord {
    pub label: String,
    pub text: String,
}

/// Every choice layout found in the supported datasets.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawChoices {
    /// `["chalk", "pen", ...]`; labels A, B, ... are assigned in order
    List(Vec<String>),
    /// `[{"label": "A", "text": "chalk"}, ...]`
    Records(Vec<ChoiceRecord>),
    /// `{"label": ["A", ...], "text": ["chalk", ...]}`
    Columnar { label: Vec<String>, text: Vec<String> },
    /// `{"A": "chalk", ...}`
    Map(Choices),
}

/// A dataset item as stored on disk.
#[derive(Debug, Clone, Deserialize)]
pub struct RawSample {
    #[serde(default)]
    pub id: Option<String>,
    pub question: RawQuestion,
    pub choices: RawChoices,
    #[serde(default, rename = "answerKey")]
    pub answer_key: Option<String>,
    #[serde(default)]
    pub answer: Option<String>,
}

impl RawSample {
    /// Normalize into a [`Sample`], validating choices and gold answer.
    pub fn normalize(self, index: usize) -> Result<Sample, SampleError> {
        let id = self.id.unwrap_or_else(|| index.to_string());
        let choices = normalize_choices(&id, self.choices)?;
        if choices.is_empty() {
            return Err(SampleError::NoChoices { id });
        }

        let answer_key = self.answer_key.filter(|key| !key.trim().is_empty());
        let gold_label = match (answer_key, self.answer) {
            (Some(key), _) => {
                let key = key.trim().to_string();
                if !choices.contains(&key) {
                    return Err(SampleError::GoldNotInChoices { id, gold: key });
                }
                key
            }
            (None, Some(text)) => match choices.label_for_text(&text) {
                Some(label) => label.to_string(),
                None => return Err(SampleError::GoldNotInChoices { id, gold: text }),
            },
            (None, None) => return Err(SampleError::MissingGold { id }),
        };

        Ok(Sample {
            id,
            question: self.question.into_text(),
            choices,
            gold_label,
        })
    }
}

/// Label assigned to the `index`-th choice of a plain list.
pub fn positional_label(index: usize) -> String {
    match u8::try_from(index) {
        Ok(i) if i < 26 => char::from(b'A' + i).to_string(),
        _ => (index + 1).to_string(),
    }
}

fn normalize_choices(id: &str, raw: RawChoices) -> Result<Choices, SampleError> {
    let pairs: Vec<(String, String)> = match raw {
        RawChoices::List(texts) => texts
            .into_iter()
            .enumerate()
            .map(|(i, text)| (positional_label(i), text))
            .collect(),
        RawChoices::Records(records) => records.into_iter().map(|r| (r.label, r.text)).collect(),
        RawChoices::Columnar { label, text } => {
            if label.len() != text.len() {
                return Err(SampleError::MismatchedColumns {
                    id: id.to_string(),
                    labels: label.len(),
                    texts: text.len(),
                });
            }
            label.into_iter().zip(text).collect()
        }
        RawChoices::Map(choices) => return Ok(choices),
    };

    let mut choices = Choices::new();
    for (label, text) in pairs {
        if !choices.push(label.clone(), text) {
            return Err(SampleError::DuplicateLabel {
                id: id.to_string(),
                label,
            });
        }
    }
    Ok(choices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_columnar_with_answer_key() {
        let line = r#"{"id":"075e483d","question":"What is used to write on a blackboard?","question_concept":"blackboard","choices":{"label":["A","B","C","D","E"],"text":["chalk","pen","crayon","marker","brush"]},"answerKey":"A"}"#;
        let sample = Sample::from_json_line(line, 0).unwrap();

        assert_eq!(sample.id, "075e483d");
        assert_eq!(sample.choices.len(), 5);
        assert_eq!(sample.gold_label, "A");
        assert_eq!(sample.gold_text(), "chalk");
    }

    #[test]
    fn test_list_with_answer_text() {
        let line = r#"{"id":"c1","question":"What do you wear on your feet?","choices":["hat","scarf","gloves","shoes","glasses"],"answer":"shoes"}"#;
        let sample = Sample::from_json_line(line, 0).unwrap();

        assert_eq!(
            sample.choices.labels().collect::<Vec<_>>(),
            vec!["A", "B", "C", "D", "E"]
        );
        assert_eq!(sample.gold_label, "D");
        assert_eq!(sample.gold_text(), "shoes");
    }

    #[test]
    fn test_records_and_map_layouts() {
        let records = r#"{"question":{"stem":"Q?"},"choices":[{"label":"B","text":"pen"},{"label":"A","text":"chalk"}],"answerKey":"A"}"#;
        let sample = Sample::from_json_line(records, 7).unwrap();
        assert_eq!(sample.id, "7");
        assert_eq!(sample.question, "Q?");
        assert_eq!(sample.choices.labels().collect::<Vec<_>>(), vec!["B", "A"]);

        let map = r#"{"id":"m","question":"Q?","choices":{"A":"chalk","B":"pen"},"answerKey":"B"}"#;
        let sample = Sample::from_json_line(map, 0).unwrap();
        assert_eq!(sample.gold_text(), "pen");
    }

    #[test]
    fn test_gold_not_in_choices() {
        let line = r#"{"id":"x","question":"Q?","choices":["a","b"],"answer":"c"}"#;
        assert_eq!(
            Sample::from_json_line(line, 0),
            Err(SampleError::GoldNotInChoices {
                id: "x".to_string(),
                gold: "c".to_string()
            })
        );

        let line = r#"{"id":"y","question":"Q?","choices":["a","b"],"answerKey":"E"}"#;
        assert!(matches!(
            Sample::from_json_line(line, 0),
            Err(SampleError::GoldNotInChoices { .. })
        ));
    }

    #[test]
    fn test_structural_errors() {
        let dup = r#"{"id":"d","question":"Q?","choices":[{"label":"A","text":"x"},{"label":"A","text":"y"}],"answerKey":"A"}"#;
        assert!(matches!(
            Sample::from_json_line(dup, 0),
            Err(SampleError::DuplicateLabel { .. })
        ));

        let mismatched = r#"{"id":"m","question":"Q?","choices":{"label":["A","B"],"text":["x"]},"answerKey":"A"}"#;
        assert!(matches!(
            Sample::from_json_line(mismatched, 0),
            Err(SampleError::MismatchedColumns { labels: 2, texts: 1, .. })
        ));

        let empty = r#"{"id":"e","question":"Q?","choices":[],"answerKey":"A"}"#;
        assert!(matches!(
            Sample::from_json_line(empty, 0),
            Err(SampleError::NoChoices { .. })
        ));

        let no_gold = r#"{"id":"g","question":"Q?","choices":["x","y"],"answerKey":""}"#;
        assert!(matches!(
            Sample::from_json_line(no_gold, 0),
            Err(SampleError::MissingGold { .. })
        ));

        assert!(matches!(
            Sample::from_json_line("not json", 0),
            Err(SampleError::Parse(_))
        ));
    }

    #[test]
    fn test_positional_labels() {
        assert_eq!(positional_label(0), "A");
        assert_eq!(positional_label(4), "E");
        assert_eq!(positional_label(26), "27");
    }
}
