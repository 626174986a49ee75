//! Prompt construction for the reasoning and answer stages.
//!
//! Every `(style, stage, shot mode)` combination has a builder:
//! 1. Reasoning stage - wording depends on the prompt style
//! 2. Answer stage - shared across styles, asks for the letter only
//!
//! The answer prompt never includes the reasoning-stage output; the two
//! generations are elicited independently.
//!
//! Few-shot mode prepends two worked examples rendered in the style's own
//! format, so the model sees the shape the extractor expects.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use cotscore_core::{Choices, PromptStyle, Sample};

/// Whether worked examples are prepended to the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ShotMode {
    #[default]
    #[serde(rename = "zero-shot")]
    ZeroShot,
    #[serde(rename = "few-shot")]
    FewShot,
}

impl ShotMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShotMode::ZeroShot => "zero-shot",
            ShotMode::FewShot => "few-shot",
        }
    }
}

impl fmt::Display for ShotMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShotMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "zero-shot" | "zero" => Ok(ShotMode::ZeroShot),
            "few-shot" | "few" => Ok(ShotMode::FewShot),
            other => Err(format!(
                "unknown shot mode '{}' (expected zero-shot or few-shot)",
                other
            )),
        }
    }
}


/// Reasoning guidance for the simple style.
pub const SIMPLE_REASONING_INSTRUCTION: &str =
    "Please explain your reasoning in simple steps.";

/// Reasoning guidance for the templated style: three fixed step lines.
pub const TEMPLATED_REASONING_INSTRUCTION: &str = "Think briefly through the following steps:
Step 1: Name the single choice you find most plausible.
Step 2: Give two concise factual statements that support why you chose that option.
Step 3: In ONLY ONE sentence, explain which one choice are the most unsuitable.

Please ensure each 'Step X: …' is exactly one line.";

/// Reasoning guidance for the natural style.
pub const NATURAL_REASONING_INSTRUCTION: &str = "First, please identify the most promising option and explain why.
Then, please give two specific reasons to support your choice.
Finally, please briefly mention why one of the other options which is most unsuitable doesn't work.
Please provide your reasoning in a few clear sentences, without revealing the final letter.";

/// A worked example shown in few-shot prompts.
struct WorkedExample {
    question: &'static str,
    choices: [(&'static str, &'static str); 5],
    steps: [&'static str; 3],
    natural: &'static str,
    answer: &'static str,
}

const WORKED_EXAMPLES: [WorkedExample; 2] = [
    WorkedExample {
        question: "What is used to write on a blackboard?",
        choices: [
            ("A", "chalk"),
            ("B", "pen"),
            ("C", "crayon"),
            ("D", "marker"),
            ("E", "brush"),
        ],
        steps: [
            "Chalk seems most plausible.",
            "Two reasons support this: (1) Chalk writes clearly on blackboards. (2) Chalk doesn't permanently mark the surface.",
            "(E) Brushes are most unsuitable as they are for painting, not writing.",
        ],
        natural: "First, the most promising option is (A) chalk. There are two reasons support this choice: firstly, Chalk produces visible marks on blackboards. Secondly, Chalk is designed not to damage the board surface.\nThe least suitable option is (E) brush, as brushes are used for painting, not writing.",
        answer: "A",
    },
    WorkedExample {
        question: "What do you wear on your feet to walk outside?",
        choices: [
            ("A", "hat"),
            ("B", "scarf"),
            ("C", "gloves"),
            ("D", "shoes"),
            ("E", "glasses"),
        ],
        steps: [
            "Shoes are the best fit.",
            "Two reasons support this: (1) Shoes protect your feet from rough surfaces. (2) Shoes provide support and stability while walking.",
            "(A) Hats are clearly unrelated to walking with feet.",
        ],
        natural: "First, (D) shoes are the most reasonable choice. There are two reasons support this choice: firstly, Shoes protect your feet outdoors. Secondly, Shoes are specifically made for walking and provide comfort and grip.\nThe least fitting option is (A) hat, as it's worn on the head, not feet.",
        answer: "D",
    },
];

impl WorkedExample {
    fn choices_line(&self) -> String {
        self.choices
            .iter()
            .map(|(label, text)| format!("({}) {}", label, text))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn reasoning(&self, style: PromptStyle) -> String {
        match style {
            PromptStyle::Natural => self.natural.to_string(),
            PromptStyle::Templated | PromptStyle::Simple => self
                .steps
                .iter()
                .enumerate()
                .map(|(i, step)| format!("Step {}: {}", i + 1, step))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// Render choices as `(A) text (B) text ...` in mapping order.
pub fn format_choices(choices: &Choices) -> String {
    choices
        .iter()
        .map(|choice| format!("({}) {}", choice.label, choice.text))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Closing instruction of every answer-stage prompt, listing the sample's
/// own labels, e.g. `(A, B, or C)`.
pub fn answer_instruction(choices: &Choices) -> String {
    let labels: Vec<&str> = choices.labels().collect();
    let letters = match labels.as_slice() {
        [] => String::new(),
        [only] => only.to_string(),
        [first, second] => format!("{} or {}", first, second),
        [init @ .., last] => format!("{}, or {}", init.join(", "), last),
    };
    format!(
        "Now, provide ONLY the letter ({}) corresponding to your answer. DO NOT explain or add any other text.",
        letters
    )
}

/// Style-specific reasoning guidance.
pub fn reasoning_instruction(style: PromptStyle) -> &'static str {
    match style {
        PromptStyle::Simple => SIMPLE_REASONING_INSTRUCTION,
        PromptStyle::Templated => TEMPLATED_REASONING_INSTRUCTION,
        PromptStyle::Natural => NATURAL_REASONING_INSTRUCTION,
    }
}

fn reasoning_examples(style: PromptStyle) -> String {
    let header = match style {
        PromptStyle::Natural => "Here are some natural language reasoning examples:\n\n",
        PromptStyle::Templated | PromptStyle::Simple => {
            "Here are some examples of step-by-step reasoning:\n\n"
        }
    };

    let mut out = String::from(header);
    for example in &WORKED_EXAMPLES {
        out.push_str(&format!(
            "Question: {}\nChoices: {}\n{}\n\n",
            example.question,
            example.choices_line(),
            example.reasoning(style)
        ));
    }
    out
}

fn answer_examples() -> String {
    let mut out = String::from("Here are some examples of answers based on previous reasoning:\n\n");
    for example in &WORKED_EXAMPLES {
        out.push_str(&format!(
            "Question: {}\nChoices: {}\nAnswer: {}\n\n",
            example.question,
            example.choices_line(),
            example.answer
        ));
    }
    out
}

/// Build the reasoning-stage prompt for `sample`.
pub fn reasoning_prompt(sample: &Sample, style: PromptStyle, shot: ShotMode) -> String {
    let choices = format_choices(&sample.choices);

    let opening = match style {
        PromptStyle::Simple => "Let's think about this question step by step.",
        PromptStyle::Templated => "Let's solve this question step by step.",
        PromptStyle::Natural => "Think about the following question carefully.",
    };
    let body = format!(
        "{}\nQuestion: {}\nChoices: {}\n\n{}",
        opening,
        sample.question,
        choices,
        reasoning_instruction(style)
    );

    match shot {
        ShotMode::ZeroShot => body,
        ShotMode::FewShot => format!(
            "{}Now, reason through a new question:\n\n{}",
            reasoning_examples(style),
            body
        ),
    }
}

/// Build the answer-stage prompt for `sample`. Identical across styles.
pub fn answer_prompt(sample: &Sample, shot: ShotMode) -> String {
    let body = format!(
        "Based on the previous reasoning about this question:\nQuestion: {}\nChoices: {}\n\n{}",
        sample.question,
        format_choices(&sample.choices),
        answer_instruction(&sample.choices)
    );

    match shot {
        ShotMode::ZeroShot => body,
        ShotMode::FewShot => format!("{}{}", answer_examples(), body),
    }
}
