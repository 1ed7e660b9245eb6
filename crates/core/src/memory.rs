use crate::chat::{ChatMessage, ChatModel};
use std::collections::VecDeque;
use tracing::{debug, warn};

/// Bounds on the conversation buffer. Turns beyond the window, or beyond
/// the token budget, are folded into a running summary.
#[derive(Debug, Clone, Copy)]
pub struct MemoryConfig {
    /// Maximum turns kept verbatim.
    pub window: usize,
    /// Approximate token budget for the verbatim turns (chars / 4; exact
    /// tokenizer parity is not needed for the bounding behavior).
    pub token_budget: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            window: 10,
            token_budget: 2_000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConversationTurn {
    pub question: String,
    pub answer: String,
}

const CONDENSE_TEMPLATE: &str = "Progressively summarize the conversation below, folding the new turns \
into the current summary. Keep facts, names, and open questions; drop pleasantries. \
Return only the new summary.

CURRENT SUMMARY:
{summary}

NEW TURNS:
{turns}

NEW SUMMARY:";

/// Running, auto-summarized record of prior question/answer turns.
///
/// Recent turns are kept verbatim; once the window or token budget is
/// exceeded, the oldest turns are condensed into the summary via the chat
/// model. A failed condensation keeps the turns buffered.
pub struct ConversationMemory {
    config: MemoryConfig,
    summary: String,
    turns: VecDeque<ConversationTurn>,
}

impl ConversationMemory {
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            config,
            summary: String::new(),
            turns: VecDeque::new(),
        }
    }

    pub fn record(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        self.turns.push_back(ConversationTurn {
            question: question.into(),
            answer: answer.into(),
        });
    }

    pub fn buffered_turns(&self) -> usize {
        self.turns.len()
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn is_empty(&self) -> bool {
        self.summary.is_empty() && self.turns.is_empty()
    }

    pub fn approx_tokens(&self) -> usize {
        let chars: usize = self
            .turns
            .iter()
            .map(|turn| turn.question.chars().count() + turn.answer.chars().count())
            .sum();
        chars / 4
    }

    fn over_budget(&self) -> bool {
        self.turns.len() > self.config.window || self.approx_tokens() > self.config.token_budget
    }

    /// Fold the oldest turns into the summary until the buffer fits its
    /// bounds again. The newest turn always stays verbatim.
    pub async fn compact<C>(&mut self, chat: &C)
    where
        C: ChatModel + ?Sized,
    {
        let mut folded = Vec::new();
        while self.over_budget() && self.turns.len() > 1 {
            if let Some(turn) = self.turns.pop_front() {
                folded.push(turn);
            }
        }

        if folded.is_empty() {
            return;
        }

        let prompt = CONDENSE_TEMPLATE
            .replace(
                "{summary}",
                if self.summary.is_empty() {
                    "(none)"
                } else {
                    self.summary.as_str()
                },
            )
            .replace("{turns}", &render_turns(folded.iter()));

        match chat.complete(&[ChatMessage::user(prompt)]).await {
            Ok(new_summary) => {
                self.summary = new_summary.trim().to_string();
                debug!(folded = folded.len(), "condensed older conversation turns");
            }
            Err(error) => {
                warn!(reason = %error, "conversation summarization failed, keeping turns");
                for turn in folded.into_iter().rev() {
                    self.turns.push_front(turn);
                }
            }
        }
    }

    /// Render the memory for inclusion in the QA prompt.
    pub fn render(&self) -> String {
        if self.is_empty() {
            return String::new();
        }

        let mut rendered = String::new();
        if !self.summary.is_empty() {
            rendered.push_str("Summary of the earlier conversation:\n");
            rendered.push_str(&self.summary);
            rendered.push_str("\n\n");
        }
        rendered.push_str(&render_turns(self.turns.iter()));
        rendered
    }

    pub fn clear(&mut self) {
        self.summary.clear();
        self.turns.clear();
    }
}

fn render_turns<'a>(turns: impl Iterator<Item = &'a ConversationTurn>) -> String {
    let mut rendered = String::new();
    for turn in turns {
        rendered.push_str("Human: ");
        rendered.push_str(&turn.question);
        rendered.push_str("\nAssistant: ");
        rendered.push_str(&turn.answer);
        rendered.push('\n');
    }
    rendered
}
