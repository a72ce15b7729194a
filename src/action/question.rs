//! Question actions and their answering sub-state
//!
//! A question is resolved twice per exchange: once to deliver the prompt, and
//! again for every inbound message that attempts to answer it. The phase
//! machine below keeps those two paths apart.

use crate::state_machine::state::QuestionState;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

pub const DEFAULT_MAX_ATTEMPTS: usize = 3;

/// Classification of one inbound message against a question
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    /// Accepted; carries the normalized answer
    Answered(Value),
    /// Not acceptable, but another attempt is allowed while the limit holds
    Rejected,
    /// Unrecoverable, regardless of remaining attempts
    Failed,
}

pub type Evaluator = Arc<dyn Fn(&str) -> Evaluation + Send + Sync>;

/// Answering sub-state of a question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionPhase {
    #[default]
    Idle,
    Prompting,
    Answering,
    Answered,
    Failed,
}

impl QuestionPhase {
    /// First resolution of a question: the prompt is about to go out.
    #[must_use]
    pub fn prompt(self) -> Self {
        match self {
            Self::Idle => Self::Prompting,
            other => other,
        }
    }

    /// Apply one answer attempt. `attempts_used` includes the attempt being
    /// evaluated.
    #[must_use]
    pub fn attempt(self, verdict: &Evaluation, attempts_used: usize, max_attempts: usize) -> Self {
        match self {
            Self::Prompting | Self::Answering => match verdict {
                Evaluation::Answered(_) => Self::Answered,
                Evaluation::Failed => Self::Failed,
                Evaluation::Rejected if attempts_used >= max_attempts => Self::Failed,
                Evaluation::Rejected => Self::Answering,
            },
            // No prompt was delivered yet, or the outcome is settled
            Self::Idle | Self::Answered | Self::Failed => self,
        }
    }

    pub fn is_pending(self) -> bool {
        matches!(self, Self::Prompting | Self::Answering)
    }
}

/// A prompt awaiting an answer from the other party
#[derive(Clone)]
pub struct Question {
    prompt: String,
    retry_prompt: Option<String>,
    evaluator: Evaluator,
    max_attempts: usize,
    continue_on_fail: bool,
    phase: QuestionPhase,
    answer: Option<Value>,
    receipts: Vec<String>,
    /// Length of the recorded attempt list when this question was evaluated
    attempts_seen: usize,
}

impl Question {
    pub fn new<F>(prompt: impl Into<String>, evaluator: F) -> Self
    where
        F: Fn(&str) -> Evaluation + Send + Sync + 'static,
    {
        Self {
            prompt: prompt.into(),
            retry_prompt: None,
            evaluator: Arc::new(evaluator),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            continue_on_fail: false,
            phase: QuestionPhase::Idle,
            answer: None,
            receipts: Vec::new(),
            attempts_seen: 0,
        }
    }

    /// Accepts any non-empty answer verbatim.
    pub fn free_text(prompt: impl Into<String>) -> Self {
        Self::new(prompt, |body| {
            let body = body.trim();
            if body.is_empty() {
                Evaluation::Rejected
            } else {
                Evaluation::Answered(Value::String(body.to_string()))
            }
        })
    }

    /// Limit on answer attempts before the question fails. Clamped to one.
    #[must_use]
    pub fn attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    #[must_use]
    pub fn continue_on_fail(mut self, continue_on_fail: bool) -> Self {
        self.continue_on_fail = continue_on_fail;
        self
    }

    /// Text delivered after a rejected attempt. Defaults to the prompt.
    #[must_use]
    pub fn retry_prompt(mut self, text: impl Into<String>) -> Self {
        self.retry_prompt = Some(text.into());
        self
    }

    pub fn prompt_text(&self) -> &str {
        &self.prompt
    }

    pub fn phase(&self) -> QuestionPhase {
        self.phase
    }

    pub fn answer(&self) -> Option<&Value> {
        self.answer.as_ref()
    }

    pub fn receipts(&self) -> &[String] {
        &self.receipts
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    pub fn continues_on_fail(&self) -> bool {
        self.continue_on_fail
    }

    pub fn is_answered(&self) -> bool {
        self.phase == QuestionPhase::Answered
    }

    pub fn is_failed(&self) -> bool {
        self.phase == QuestionPhase::Failed
    }

    pub(crate) fn attempts_seen(&self) -> usize {
        self.attempts_seen
    }

    /// Evaluate an inbound message against this question given the persisted
    /// question sub-state.
    ///
    /// When the conversation is not yet answering, the inbound message is the
    /// one that led here and is not an attempt; the question only moves to
    /// `Prompting`.
    pub fn evaluate(&mut self, inbound: &str, state: &QuestionState) {
        self.attempts_seen = state.attempts.len();
        self.phase = self.phase.prompt();
        if !state.is_answering {
            return;
        }

        let verdict = (self.evaluator)(inbound);
        let attempts_used = state.attempts.len() + 1;
        self.phase = self.phase.attempt(&verdict, attempts_used, self.max_attempts);
        if let Evaluation::Answered(answer) = verdict {
            self.answer = Some(answer);
        }
    }

    /// Text to deliver for the current phase, if any
    pub fn outbound_text(&self) -> Option<&str> {
        match self.phase {
            QuestionPhase::Prompting => Some(&self.prompt),
            QuestionPhase::Answering => {
                Some(self.retry_prompt.as_deref().unwrap_or(&self.prompt))
            }
            QuestionPhase::Idle | QuestionPhase::Answered | QuestionPhase::Failed => None,
        }
    }

    pub(crate) fn push_receipt(&mut self, receipt: String) {
        if !self.receipts.contains(&receipt) {
            self.receipts.push(receipt);
        }
    }
}

impl fmt::Debug for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Question")
            .field("prompt", &self.prompt)
            .field("max_attempts", &self.max_attempts)
            .field("continue_on_fail", &self.continue_on_fail)
            .field("phase", &self.phase)
            .field("answer", &self.answer)
            .field("receipts", &self.receipts)
            .finish_non_exhaustive()
    }
}
