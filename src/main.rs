//! Flowline console - drive a demo conversation from the terminal
//!
//! Each stdin line is treated as one inbound message from a single sender;
//! outbound messages are printed to stdout.

use async_trait::async_trait;
use flowline::db::Database;
use flowline::runtime::{DatabaseStorage, InMemoryStateStore, MessageSender, Outbound, StateStore};
use flowline::{
    Action, AppConfig, ConfigError, ConversationManager, Evaluation, Flow, FlowContext, FlowController, FlowDecl,
    FlowSchema, InboundMessage, OutboundKind, Question,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const CONSOLE_SENDER: &str = "console";

/// Prints outbound messages; receipts are random ids
struct ConsoleSender;

#[async_trait]
impl MessageSender for ConsoleSender {
    async fn send(&self, outbound: &Outbound) -> Result<Option<String>, String> {
        let marker = match outbound.kind {
            OutboundKind::Prompt => "?",
            OutboundKind::Message | OutboundKind::Reply => ">",
        };
        println!("{marker} {}", outbound.body);
        Ok(Some(uuid::Uuid::new_v4().to_string()))
    }
}

fn choice(options: &'static [&'static str]) -> impl Fn(&str) -> Evaluation + Send + Sync + 'static {
    move |body| {
        let picked = body.trim().to_lowercase();
        if options.contains(&picked.as_str()) {
            Evaluation::Answered(Value::String(picked))
        } else {
            Evaluation::Rejected
        }
    }
}

fn build_flows() -> Result<(Flow, FlowSchema), ConfigError> {
    let mut order = Flow::new("order");
    order
        .reply("welcome", "Welcome to the cafe! Type 'exit' at any time to leave.")?
        .ask(
            "drink",
            Question::new("Coffee or tea?", choice(&["coffee", "tea"])).retry_prompt("We only have coffee or tea."),
        )?
        .ask(
            "size",
            Question::new("Small or large?", choice(&["small", "large"]))
                .attempts(2)
                .continue_on_fail(true),
        )?
        .append("confirm", |ctx: FlowContext, user: Value| async move {
            let drink = ctx.answer("drink").and_then(Value::as_str).unwrap_or("drink").to_string();
            let size = ctx.answer("size").and_then(Value::as_str).unwrap_or("regular").to_string();
            let name = user["name"].as_str().unwrap_or("friend").to_string();
            Ok(Some(Action::reply(format!("A {size} {drink} for {name}, coming up."))))
        })?
        .ask(
            "pastry",
            Question::new("Would you like a pastry with that? (yes/no)", |body| {
                match body.trim().to_lowercase().as_str() {
                    "yes" | "y" => Evaluation::Answered(Value::Bool(true)),
                    "no" | "n" => Evaluation::Answered(Value::Bool(false)),
                    _ => Evaluation::Rejected,
                }
            }),
        )?
        .append("upsell", |ctx: FlowContext, _| async move {
            if ctx.answer("pastry") == Some(&Value::Bool(true)) {
                Ok(Some(Action::trigger("pastries")))
            } else {
                Ok(Some(Action::message("Enjoy your drink!")))
            }
        })?;

    let mut pastries = Flow::new("pastries");
    pastries
        .ask("pick", Question::new("Croissant or muffin?", choice(&["croissant", "muffin"])))?
        .append("done", |ctx: FlowContext, _| async move {
            let pick = ctx.answer("pick").and_then(Value::as_str).unwrap_or("pastry").to_string();
            Ok(Some(Action::message(format!("One {pick} added. Enjoy!"))))
        })?;

    let schema = FlowSchema::build(FlowDecl::from(pastries))?;
    Ok((order, schema))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flowline=info,flowline_console=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = AppConfig::from_env();

    let store: Arc<dyn StateStore> = match &config.db_path {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            tracing::info!(path = %path.display(), "Opening database");
            let db = Database::open(path)?;
            for stored in db.list_conversations()? {
                tracing::info!(
                    conv_id = %stored.id,
                    flow = stored.state.active_flow().unwrap_or("<root>"),
                    position = stored.state.position(),
                    started = %stored.created_at,
                    last_active = %stored.updated_at,
                    "Resuming stored conversation"
                );
            }
            Arc::new(DatabaseStorage::new(db))
        }
        None => Arc::new(InMemoryStateStore::new()),
    };

    let (root, schema) = build_flows()?;
    let controller = FlowController::builder()
        .root(root)
        .schema(schema)
        .exit_pattern(config.exit_pattern.clone())
        .on_complete(|sender, state| {
            tracing::info!(
                sender = %sender,
                steps = state.interaction_history().len(),
                "Conversation finished"
            );
        })
        .build()?;

    let manager = ConversationManager::new(
        Arc::new(controller),
        Arc::clone(&store),
        Arc::new(ConsoleSender),
        config.runtime_settings(),
    );

    let user_context = json!({ "name": std::env::var("USER").unwrap_or_else(|_| "friend".to_string()) });
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let message = InboundMessage::new(CONSOLE_SENDER, line);
        match manager.dispatch(message, user_context.clone()).await {
            Ok(outcome) if outcome.completed => println!("-- conversation ended, say anything to start over --"),
            Ok(_) => {}
            Err(e) => {
                tracing::error!(error = %e, "Processing failed, resetting conversation");
                println!("> Sorry, something went wrong. Let's start over.");
                store.discard_state(CONSOLE_SENDER).await?;
            }
        }
    }

    Ok(())
}
