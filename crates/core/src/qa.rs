use crate::chat::{ChatMessage, ChatModel, OpenAiChat};
use crate::memory::{ConversationMemory, MemoryConfig};
use crate::models::{AskOutcome, ConversationEntry, ScoredChunk, SourceSnippet};
use crate::traits::Retriever;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// Fixed response for empty or whitespace-only questions; returned without
/// contacting the model.
pub const INVALID_QUESTION_MESSAGE: &str = "Please provide a valid question.";

const INSTRUCTION_TEMPLATE: &str = "You are an assistant answering questions from the provided context documents.

INSTRUCTIONS:
1. Base your answer on the provided context.
2. If the context does not contain enough information, state that limitation clearly.
3. Where possible, cite the parts of the context that support your answer.
4. Keep a conversational but professional tone, and start with a direct answer when you can.

CONTEXT DOCUMENTS:
{context}";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemorySummary {
    pub total_conversations: usize,
    pub memory_window: usize,
    pub buffered_turns: usize,
    pub last_question: Option<String>,
}

/// Conversational QA chain: retrieve, prompt, complete, remember.
///
/// `ask` never returns an error; every failure becomes an
/// `AskOutcome::Failed` carrying a human-readable message.
pub struct QaChainManager<R, C> {
    retriever: R,
    chat: C,
    memory: ConversationMemory,
    memory_window: usize,
    history: Vec<ConversationEntry>,
}

impl<R, C> QaChainManager<R, C>
where
    R: Retriever,
    C: ChatModel,
{
    pub fn new(retriever: R, chat: C, memory_config: MemoryConfig) -> Self {
        Self {
            retriever,
            chat,
            memory: ConversationMemory::new(memory_config),
            memory_window: memory_config.window,
            history: Vec::new(),
        }
    }

    pub async fn ask(&mut self, question: &str) -> AskOutcome {
        let question = question.trim();
        if question.is_empty() {
            return AskOutcome::Failed {
                message: INVALID_QUESTION_MESSAGE.to_string(),
            };
        }

        info!(question = %preview(question), "processing question");

        match self.try_ask(question).await {
            Ok((answer, sources)) => {
                self.memory.record(question, answer.clone());
                self.memory.compact(&self.chat).await;

                let timestamp = Utc::now();
                self.history.push(ConversationEntry {
                    question: question.to_string(),
                    answer: answer.clone(),
                    sources: sources.clone(),
                    timestamp,
                    success: true,
                });

                info!(source_count = sources.len(), "generated answer");
                AskOutcome::Answered {
                    answer,
                    sources,
                    timestamp,
                }
            }
            Err(reason) => {
                error!(reason = %reason, "question answering failed");
                let message = format!(
                    "I apologize, but I encountered an error while processing your question: {reason}"
                );

                self.history.push(ConversationEntry {
                    question: question.to_string(),
                    answer: message.clone(),
                    sources: Vec::new(),
                    timestamp: Utc::now(),
                    success: false,
                });

                AskOutcome::Failed { message }
            }
        }
    }

    async fn try_ask(&self, question: &str) -> Result<(String, Vec<SourceSnippet>), String> {
        let matches = self
            .retriever
            .retrieve(question)
            .await
            .map_err(|error| error.to_string())?;

        let messages = build_messages(&matches, &self.memory, question);
        let answer = self
            .chat
            .complete(&messages)
            .await
            .map_err(|error| error.to_string())?;

        let sources = matches.iter().map(SourceSnippet::from_scored).collect();
        Ok((answer, sources))
    }

    pub fn history(&self) -> &[ConversationEntry] {
        &self.history
    }

    /// Reset both the chain's memory and the displayed conversation list.
    pub fn clear_history(&mut self) {
        self.memory.clear();
        self.history.clear();
        info!("conversation history cleared");
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    pub fn memory_summary(&self) -> MemorySummary {
        MemorySummary {
            total_conversations: self.history.len(),
            memory_window: self.memory_window,
            buffered_turns: self.memory.buffered_turns(),
            last_question: self
                .history
                .last()
                .map(|entry| entry.question.clone()),
        }
    }
}

impl<R> QaChainManager<R, OpenAiChat>
where
    R: Retriever,
{
    /// Adjust the model's sampling parameters between questions.
    pub fn set_sampling(&mut self, temperature: Option<f32>, max_tokens: Option<u32>) {
        self.chat.set_sampling(temperature, max_tokens);
        info!(
            temperature = self.chat.temperature(),
            max_tokens = self.chat.max_tokens(),
            "updated chain parameters"
        );
    }
}

fn build_messages(
    matches: &[ScoredChunk],
    memory: &ConversationMemory,
    question: &str,
) -> Vec<ChatMessage> {
    let system = INSTRUCTION_TEMPLATE.replace("{context}", &render_context(matches));

    let history = memory.render();
    let user = if history.is_empty() {
        format!("CURRENT QUESTION: {question}")
    } else {
        format!("CONVERSATION HISTORY:\n{history}\nCURRENT QUESTION: {question}")
    };

    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

fn render_context(matches: &[ScoredChunk]) -> String {
    if matches.is_empty() {
        return "No matching documents were found for this question.".to_string();
    }

    matches
        .iter()
        .enumerate()
        .map(|(index, scored)| {
            format!(
                "[source {}] {}\n{}",
                index + 1,
                scored.chunk.metadata.file_name,
                scored.chunk.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn preview(question: &str) -> &str {
    let limit = question
        .char_indices()
        .nth(100)
        .map_or(question.len(), |(at, _)| at);
    &question[..limit]
}
