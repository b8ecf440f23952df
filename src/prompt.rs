//! Prompt composition.
//!
//! [`PromptComposer`] turns a [`ChatRequest`] plus ranked citations into a
//! two-part [`Prompt`]: a system instruction and a user block. The user
//! block is bounded by [`PromptConfig::max_prompt_chars`]; when over budget
//! the oldest history turns go first, then the weakest citations, then the
//! patient profile is shortened, and only a question that alone exceeds the
//! budget is truncated.
//!
//! Patient details are rendered only in [`Mode::Private`]. Public answers
//! stay general even when a patient context is attached.

use serde::Deserialize;

use crate::search::scoring::truncate_chars;
use crate::types::{ChatRequest, Citation, Mode, PatientContext, Role, Turn};

const PROFILE_HEADER: &str = "Patient profile:";

const BASE_INSTRUCTIONS: &str = "You are a careful medical information assistant. \
Give clear, evidence-based answers in plain language. Do not diagnose. \
Point out warning signs that need urgent care, and recommend consulting a \
qualified healthcare professional for personal medical decisions.";

const PUBLIC_INSTRUCTIONS: &str = "Answer for a general audience; do not assume \
anything about the reader's health.";

const PRIVATE_INSTRUCTIONS: &str = "Tailor the answer to the patient profile \
provided, paying attention to conditions, medications and allergies that \
change the advice.";

const CITATION_INSTRUCTIONS: &str = "When you rely on a numbered source, cite it \
as [n].";

/// Limits applied while composing.
#[derive(Debug, Clone, Deserialize)]
pub struct PromptConfig {
    /// Most recent turns kept from the conversation. Default: 6.
    #[serde(default = "default_max_history_turns")]
    pub max_history_turns: usize,
    /// Upper bound on the user block, in characters. Default: 12,000.
    #[serde(default = "default_max_prompt_chars")]
    pub max_prompt_chars: usize,
}

fn default_max_history_turns() -> usize {
    6
}

fn default_max_prompt_chars() -> usize {
    12_000
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            max_history_turns: default_max_history_turns(),
            max_prompt_chars: default_max_prompt_chars(),
        }
    }
}

impl PromptConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_history_turns(mut self, n: usize) -> Self {
        self.max_history_turns = n;
        self
    }

    pub fn max_prompt_chars(mut self, n: usize) -> Self {
        self.max_prompt_chars = n;
        self
    }
}

/// A composed prompt, ready for any provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Builds bounded prompts from requests.
#[derive(Debug, Clone, Default)]
pub struct PromptComposer {
    config: PromptConfig,
}

impl PromptComposer {
    pub fn new(config: PromptConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PromptConfig {
        &self.config
    }

    /// Compose the prompt for `request` with `citations` in ranked order.
    pub fn compose(&self, request: &ChatRequest, citations: &[Citation]) -> Prompt {
        let system = system_instructions(request.mode, !citations.is_empty());

        let mut profile = match (request.mode, &request.patient) {
            (Mode::Private, Some(patient)) if !patient.is_blank() => render_patient(patient),
            _ => String::new(),
        };

        let skip = request
            .history
            .len()
            .saturating_sub(self.config.max_history_turns);
        let mut history: Vec<&Turn> = request.history.iter().skip(skip).collect();
        let mut sources: Vec<&Citation> = citations.iter().collect();

        let budget = self.config.max_prompt_chars;
        let mut user = assemble(&profile, &sources, &history, &request.message);
        while user.chars().count() > budget {
            if !history.is_empty() {
                history.remove(0);
            } else if !sources.is_empty() {
                sources.pop();
            } else {
                break;
            }
            user = assemble(&profile, &sources, &history, &request.message);
        }
        if user.chars().count() > budget && !profile.is_empty() {
            // The question must survive; give the profile what is left
            let question = assemble("", &[], &[], &request.message).chars().count();
            let room = budget.saturating_sub(question + 2);
            profile = if room > PROFILE_HEADER.len() {
                truncate_chars(&profile, room)
            } else {
                String::new()
            };
            user = assemble(&profile, &sources, &history, &request.message);
        }
        if user.chars().count() > budget {
            user = user.chars().take(budget).collect();
        }

        Prompt { system, user }
    }
}

fn system_instructions(mode: Mode, has_sources: bool) -> String {
    let mode_text = match mode {
        Mode::Public => PUBLIC_INSTRUCTIONS,
        Mode::Private => PRIVATE_INSTRUCTIONS,
    };
    let mut system = format!("{BASE_INSTRUCTIONS} {mode_text}");
    if has_sources {
        system.push(' ');
        system.push_str(CITATION_INSTRUCTIONS);
    }
    system
}

fn render_patient(patient: &PatientContext) -> String {
    let mut lines = vec![PROFILE_HEADER.to_string()];
    if let Some(age) = patient.age {
        lines.push(format!("- Age: {age}"));
    }
    if let Some(ref sex) = patient.sex {
        lines.push(format!("- Sex: {sex}"));
    }
    let lists = [
        ("Conditions", &patient.conditions),
        ("Medications", &patient.medications),
        ("Allergies", &patient.allergies),
    ];
    for (label, items) in lists {
        if !items.is_empty() {
            lines.push(format!("- {label}: {}", items.join(", ")));
        }
    }
    lines.join("\n")
}

fn assemble(profile: &str, sources: &[&Citation], history: &[&Turn], message: &str) -> String {
    let mut sections = Vec::new();
    if !profile.is_empty() {
        sections.push(profile.to_string());
    }
    if !sources.is_empty() {
        let mut block = String::from("Sources:");
        for (i, c) in sources.iter().enumerate() {
            block.push_str(&format!("\n[{}] {} ({})\n{}", i + 1, c.title, c.url, c.snippet));
        }
        sections.push(block);
    }
    if !history.is_empty() {
        let mut block = String::from("Conversation so far:");
        for turn in history {
            let speaker = match turn.role {
                Role::User => "User",
                Role::Assistant => "Assistant",
            };
            block.push_str(&format!("\n{speaker}: {}", turn.content));
        }
        sections.push(block);
    }
    sections.push(format!("Question: {}", message.trim()));
    sections.join("\n\n")
}
