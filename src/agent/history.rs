//! Conversation history owned by a [`Session`](super::session::Session).
//!
//! History is append-only and only grows by whole exchanges, so a turn
//! that fails part-way never leaves a dangling user message behind.

use serde::{Deserialize, Serialize};

/// Who produced a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    /// The person asking questions.
    User,
    /// The assistant's final answer.
    Assistant,
}

impl TurnRole {
    /// Label used when rendering history into prompts.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Assistant => "Assistant",
        }
    }
}

/// One message in the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Who said it.
    pub role: TurnRole,
    /// What was said.
    pub content: String,
}

/// Ordered, append-only conversation history.
#[derive(Debug, Clone, Default, Serialize)]
pub struct History {
    turns: Vec<ConversationTurn>,
}

impl History {
    /// Creates an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self { turns: Vec::new() }
    }

    /// Number of turns recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether no turns have been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// All turns, oldest first.
    #[must_use]
    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    /// The last `k` turns, oldest first.
    #[must_use]
    pub fn recent(&self, k: usize) -> &[ConversationTurn] {
        let start = self.turns.len().saturating_sub(k);
        &self.turns[start..]
    }

    /// Appends a completed exchange: the user's question, then the answer.
    pub fn push_exchange(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        self.turns.reserve(2);
        self.turns.push(ConversationTurn {
            role: TurnRole::User,
            content: question.into(),
        });
        self.turns.push(ConversationTurn {
            role: TurnRole::Assistant,
            content: answer.into(),
        });
    }
}
