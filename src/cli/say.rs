//! Non-interactive "say" command

use std::error::Error;
use std::fs;
use std::io::{self, Write};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::ChatMessage;
use crate::core::chat_stream::{
    ChatStreamService, ResponsesClient, StreamContext, StreamInput, StreamMessage, StreamRequest,
};
use crate::core::config::Config;
use crate::core::credentials::ChainedCredentials;
use crate::core::events::ReasoningKind;
use crate::utils::ids::generate_id;
use crate::utils::logging::LoggingState;

pub struct SayOptions {
    pub prompt: Vec<String>,
    pub messages_file: Option<String>,
    pub model: Option<String>,
    pub log_file: Option<String>,
    pub show_reasoning: bool,
}

pub async fn run_say(options: SayOptions) -> Result<(), Box<dyn Error>> {
    let messages = collect_messages(&options.prompt, options.messages_file.as_deref())?;
    if messages.is_empty() {
        return Err("Usage: ponder say <prompt> [--messages <file>]".into());
    }

    let config = Config::load()?;
    let model = options.model.or_else(|| config.default_model.clone());
    let logging = LoggingState::new(options.log_file)?;
    if let Some(last) = messages.last() {
        logging.log_chat_message(last)?;
    }

    let client = ResponsesClient::new(
        config.base_url(),
        Arc::new(ChainedCredentials::standard()),
        Arc::new(config.clone()),
    );
    let context = StreamContext::new(generate_id("conv"), messages.len());
    let stream = client.prepare(StreamRequest {
        input: StreamInput::Messages(messages),
        model,
        context,
    })?;
    debug!(model = stream.model(), "Prepared say request");

    let cancel_token = stream.cancel_token();
    let interrupt_token = cancel_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt_token.cancel();
        }
    });

    let (stream_service, mut rx) = ChatStreamService::new();
    stream_service.spawn_stream(stream);

    let mut printer = ReasoningPrinter::new(options.show_reasoning);
    let outcome = relay_messages(
        &mut rx,
        &cancel_token,
        &mut io::stdout(),
        &mut printer,
        &logging,
    )
    .await?;
    println!();

    if !outcome.response.is_empty() {
        logging.log_chat_message(&ChatMessage::assistant(outcome.response))?;
    }

    match outcome.failure {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}

struct RelayOutcome {
    response: String,
    failure: Option<String>,
}

/// Print and log stream messages until the stream ends. A local write
/// failure cancels the stream before the error is returned.
async fn relay_messages(
    rx: &mut mpsc::UnboundedReceiver<(StreamMessage, u64)>,
    cancel_token: &CancellationToken,
    out: &mut impl Write,
    printer: &mut ReasoningPrinter,
    logging: &LoggingState,
) -> Result<RelayOutcome, Box<dyn Error>> {
    let mut outcome = RelayOutcome {
        response: String::new(),
        failure: None,
    };
    while let Some((message, _)) = rx.recv().await {
        match relay_one(message, &mut outcome, out, printer, logging) {
            Ok(true) => {}
            Ok(false) => break,
            Err(err) => {
                warn!(error = %err, "Cancelling stream after local write failure");
                cancel_token.cancel();
                return Err(err);
            }
        }
    }
    Ok(outcome)
}

/// Returns `false` once the stream has ended.
fn relay_one(
    message: StreamMessage,
    outcome: &mut RelayOutcome,
    out: &mut impl Write,
    printer: &mut ReasoningPrinter,
    logging: &LoggingState,
) -> Result<bool, Box<dyn Error>> {
    match message {
        StreamMessage::Chunk(content) => {
            outcome.response.push_str(&content);
            write!(out, "{content}")?;
            out.flush()?;
        }
        StreamMessage::ReasoningStarted(kind) => printer.start(kind),
        StreamMessage::ReasoningDelta { kind, delta } => printer.delta(kind, &delta),
        StreamMessage::ReasoningDone { kind, text } => {
            printer.done(kind);
            logging.log_message(&format!("## reasoning {}\n{text}", kind.as_str()))?;
        }
        StreamMessage::Completed(_) => {}
        StreamMessage::Error(err) => eprintln!("\n⚠️  {err}"),
        StreamMessage::Failed(err) => outcome.failure = Some(err),
        StreamMessage::End => return Ok(false),
    }
    Ok(true)
}

/// Prior messages from `messages_file`, followed by the prompt as a user turn.
fn collect_messages(
    prompt: &[String],
    messages_file: Option<&str>,
) -> Result<Vec<ChatMessage>, Box<dyn Error>> {
    let mut messages = match messages_file {
        Some(path) => {
            let contents = fs::read_to_string(path)
                .map_err(|err| format!("Failed to read messages from {path}: {err}"))?;
            serde_json::from_str::<Vec<ChatMessage>>(&contents)
                .map_err(|err| format!("Failed to parse messages in {path}: {err}"))?
        }
        None => Vec::new(),
    };

    let prompt = prompt.join(" ");
    if !prompt.trim().is_empty() {
        messages.push(ChatMessage::user(prompt));
    }
    Ok(messages)
}

/// Writes reasoning traces to stderr so stdout carries only the answer.
struct ReasoningPrinter {
    enabled: bool,
    current: Option<ReasoningKind>,
}

impl ReasoningPrinter {
    fn new(enabled: bool) -> Self {
        Self {
            enabled,
            current: None,
        }
    }

    fn start(&mut self, kind: ReasoningKind) {
        if !self.enabled {
            return;
        }
        self.current = Some(kind);
        eprintln!("\n[reasoning {}]", kind.as_str());
    }

    fn delta(&mut self, kind: ReasoningKind, delta: &str) {
        if !self.enabled {
            return;
        }
        if self.current != Some(kind) {
            self.start(kind);
        }
        eprint!("{delta}");
        let _ = io::stderr().flush();
    }

    fn done(&mut self, kind: ReasoningKind) {
        if self.enabled && self.current == Some(kind) {
            eprintln!("\n[/reasoning {}]", kind.as_str());
            self.current = None;
        }
    }
}
