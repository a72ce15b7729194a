//! Actions produced by flow steps

pub mod question;

pub use question::{Evaluation, Evaluator, Question, QuestionPhase};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Name carried by exit actions. Exits are not declared by any flow, so the
/// context recorder accepts this name everywhere.
pub const EXIT_ACTION: &str = "__exit__";

/// One unit of conversational behavior.
///
/// The name is assigned by the flow that produced the action when it is
/// resolved; values built by resolvers start unnamed.
#[derive(Debug, Clone)]
pub struct Action {
    name: String,
    kind: ActionKind,
}

#[derive(Debug, Clone)]
pub enum ActionKind {
    /// Standalone content to deliver
    Message { body: String },
    /// Content delivered in response to the inbound message
    Reply { body: String },
    Question(Question),
    /// Switch to another flow
    Trigger { target: String },
    /// User-initiated early termination
    Exit { body: String },
}

/// Snapshot recorded into flow context and interaction history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionContext {
    Message {
        body: String,
    },
    Reply {
        body: String,
    },
    Question {
        prompt: String,
        phase: QuestionPhase,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        answer: Option<Value>,
        #[serde(default)]
        receipts: Vec<String>,
    },
    Trigger {
        target: String,
    },
    Exit {
        body: String,
    },
}

impl ActionContext {
    /// Answer captured by a question snapshot
    pub fn answer(&self) -> Option<&Value> {
        match self {
            Self::Question { answer, .. } => answer.as_ref(),
            _ => None,
        }
    }

    pub fn receipts(&self) -> &[String] {
        match self {
            Self::Question { receipts, .. } => receipts,
            _ => &[],
        }
    }
}

/// How an outbound body relates to the inbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboundKind {
    Message,
    Reply,
    Prompt,
}

impl Action {
    fn unnamed(kind: ActionKind) -> Self {
        Self {
            name: String::new(),
            kind,
        }
    }

    pub fn message(body: impl Into<String>) -> Self {
        Self::unnamed(ActionKind::Message { body: body.into() })
    }

    pub fn reply(body: impl Into<String>) -> Self {
        Self::unnamed(ActionKind::Reply { body: body.into() })
    }

    pub fn question(question: Question) -> Self {
        Self::unnamed(ActionKind::Question(question))
    }

    pub fn trigger(target: impl Into<String>) -> Self {
        Self::unnamed(ActionKind::Trigger {
            target: target.into(),
        })
    }

    pub(crate) fn exit(body: impl Into<String>) -> Self {
        Self {
            name: EXIT_ACTION.to_string(),
            kind: ActionKind::Exit { body: body.into() },
        }
    }

    /// Assign the step name. The controller does this for every resolved
    /// action, overriding whatever the resolver set.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &ActionKind {
        &self.kind
    }

    pub fn kind_mut(&mut self) -> &mut ActionKind {
        &mut self.kind
    }

    pub fn as_question(&self) -> Option<&Question> {
        match &self.kind {
            ActionKind::Question(q) => Some(q),
            _ => None,
        }
    }

    pub fn is_exit(&self) -> bool {
        matches!(self.kind, ActionKind::Exit { .. })
    }

    /// Label used in logs
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            ActionKind::Message { .. } => "message",
            ActionKind::Reply { .. } => "reply",
            ActionKind::Question(_) => "question",
            ActionKind::Trigger { .. } => "trigger",
            ActionKind::Exit { .. } => "exit",
        }
    }

    pub fn context(&self) -> ActionContext {
        match &self.kind {
            ActionKind::Message { body } => ActionContext::Message { body: body.clone() },
            ActionKind::Reply { body } => ActionContext::Reply { body: body.clone() },
            ActionKind::Question(q) => ActionContext::Question {
                prompt: q.prompt_text().to_string(),
                phase: q.phase(),
                answer: q.answer().cloned(),
                receipts: q.receipts().to_vec(),
            },
            ActionKind::Trigger { target } => ActionContext::Trigger {
                target: target.clone(),
            },
            ActionKind::Exit { body } => ActionContext::Exit { body: body.clone() },
        }
    }

    /// Body to hand to the delivery gateway, if this action sends anything
    pub fn outbound(&self) -> Option<(OutboundKind, &str)> {
        match &self.kind {
            ActionKind::Message { body } => Some((OutboundKind::Message, body)),
            ActionKind::Reply { body } => Some((OutboundKind::Reply, body)),
            ActionKind::Question(q) => q.outbound_text().map(|text| (OutboundKind::Prompt, text)),
            ActionKind::Trigger { .. } | ActionKind::Exit { .. } => None,
        }
    }

    /// Fold a delivery receipt into a question. Other actions ignore it.
    pub fn record_receipt(&mut self, receipt: impl Into<String>) {
        if let ActionKind::Question(q) = &mut self.kind {
            q.push_receipt(receipt.into());
        }
    }
}

impl From<Question> for Action {
    fn from(question: Question) -> Self {
        Self::question(question)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_start_unnamed() {
        assert_eq!(Action::reply("hi").name(), "");
        assert_eq!(Action::reply("hi").named("greet").name(), "greet");
        assert_eq!(Action::exit("exit").name(), EXIT_ACTION);
    }

    #[test]
    fn context_serializes_tagged() {
        let ctx = Action::trigger("billing").context();
        let json = serde_json::to_value(&ctx).unwrap();
        assert_eq!(json, serde_json::json!({"type": "trigger", "target": "billing"}));
    }

    #[test]
    fn receipts_only_stick_to_questions() {
        let mut reply = Action::reply("hi");
        reply.record_receipt("SM1");
        assert!(reply.context().receipts().is_empty());

        let mut ask = Action::question(Question::free_text("Name?"));
        ask.record_receipt("SM1");
        ask.record_receipt("SM1");
        ask.record_receipt("SM2");
        assert_eq!(ask.context().receipts(), ["SM1", "SM2"]);
    }

    #[test]
    fn triggers_and_idle_questions_send_nothing() {
        assert!(Action::trigger("x").outbound().is_none());
        assert!(Action::question(Question::free_text("Name?")).outbound().is_none());
        assert_eq!(
            Action::message("hello").outbound(),
            Some((OutboundKind::Message, "hello"))
        );
    }
}
