use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::api::{ChatMessage, ResponsesRequest, Turn};
use crate::core::config::ReasoningPreferences;
use crate::core::credentials::CredentialSource;
use crate::core::error::{format_api_error, FrameError, StreamError};
use crate::core::events::ReasoningKind;
use crate::core::reasoning::ReasoningStore;
use crate::core::request::{
    build_input_from_messages, build_responses_payload, is_reasoning_model, resolve_model,
};
use crate::core::session::{StreamCallbacks, StreamSession};
use crate::core::sse::decode_frames;
use crate::utils::auth::add_auth_headers;
use crate::utils::ids::generate_id;
use crate::utils::url::construct_api_url;

const RESPONSES_ENDPOINT: &str = "responses";

/// What to send: a bare prompt, caller messages, or ready-made turns.
#[derive(Debug, Clone)]
pub enum StreamInput {
    Prompt(String),
    Messages(Vec<ChatMessage>),
    Turns(Vec<Turn>),
}

impl StreamInput {
    fn into_turns(self) -> Vec<Turn> {
        match self {
            StreamInput::Prompt(prompt) => build_input_from_messages(&[ChatMessage::user(prompt)]),
            StreamInput::Messages(messages) => build_input_from_messages(&messages),
            StreamInput::Turns(turns) => turns,
        }
    }
}

/// Tags used only to label the window and panels a stream creates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamContext {
    pub conversation_id: String,
    pub anchor_index: usize,
}

impl StreamContext {
    pub fn new(conversation_id: impl Into<String>, anchor_index: usize) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            anchor_index,
        }
    }
}

impl Default for StreamContext {
    fn default() -> Self {
        Self::new(generate_id("conv"), 0)
    }
}

#[derive(Debug, Clone)]
pub struct StreamRequest {
    pub input: StreamInput,
    /// Selected model; legacy or missing selections are replaced.
    pub model: Option<String>,
    pub context: StreamContext,
}

impl StreamRequest {
    pub fn prompt(prompt: impl Into<String>) -> Self {
        Self {
            input: StreamInput::Prompt(prompt.into()),
            model: None,
            context: StreamContext::default(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_context(mut self, context: StreamContext) -> Self {
        self.context = context;
        self
    }
}

#[derive(Debug)]
struct ActiveStream {
    stream_id: u64,
    cancel_token: CancellationToken,
}

type CurrentStream = Arc<Mutex<Option<ActiveStream>>>;

fn lock_current(current: &CurrentStream) -> std::sync::MutexGuard<'_, Option<ActiveStream>> {
    current.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Factory for streaming calls against one endpoint.
///
/// Each call gets its own [`ResponseStream`] with its own cancellation
/// token. The client only remembers the most recently prepared stream so
/// [`ResponsesClient::cancel_current`] has something to target.
#[derive(Clone)]
pub struct ResponsesClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Arc<dyn CredentialSource>,
    preferences: Arc<dyn ReasoningPreferences + Send + Sync>,
    store: ReasoningStore,
    current: CurrentStream,
    next_stream_id: Arc<AtomicU64>,
}

impl ResponsesClient {
    pub fn new(
        base_url: impl Into<String>,
        credentials: Arc<dyn CredentialSource>,
        preferences: Arc<dyn ReasoningPreferences + Send + Sync>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            credentials,
            preferences,
            store: ReasoningStore::new(),
            current: Arc::new(Mutex::new(None)),
            next_stream_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn with_store(mut self, store: ReasoningStore) -> Self {
        self.store = store;
        self
    }

    pub fn store(&self) -> &ReasoningStore {
        &self.store
    }

    /// Validate credentials and build the request, without touching the network.
    pub fn prepare(&self, request: StreamRequest) -> Result<ResponseStream, StreamError> {
        let api_key = self
            .credentials
            .bearer_token()
            .ok_or(StreamError::MissingCredential)?;

        let model = resolve_model(request.model.as_deref());
        let body = build_responses_payload(
            &model,
            request.input.into_turns(),
            true,
            self.preferences.as_ref(),
        );

        let stream_id = self.next_stream_id.fetch_add(1, Ordering::Relaxed);
        let cancel_token = CancellationToken::new();
        let previous = lock_current(&self.current).replace(ActiveStream {
            stream_id,
            cancel_token: cancel_token.clone(),
        });
        if let Some(previous) = previous.filter(|p| !p.cancel_token.is_cancelled()) {
            debug!(
                previous_stream_id = previous.stream_id,
                stream_id, "New stream prepared while another was still active"
            );
        }

        Ok(ResponseStream {
            stream_id,
            http: self.http.clone(),
            url: construct_api_url(&self.base_url, RESPONSES_ENDPOINT),
            api_key,
            model,
            body,
            context: request.context,
            store: self.store.clone(),
            cancel_token,
            current: Arc::clone(&self.current),
        })
    }

    /// Prepare and run a stream in one go.
    pub async fn stream_response(
        &self,
        request: StreamRequest,
        callbacks: &mut dyn StreamCallbacks,
    ) -> Result<String, StreamError> {
        self.prepare(request)?.run(callbacks).await
    }

    /// Cancel the most recently prepared stream. Returns `false` if none is active.
    pub fn cancel_current(&self) -> bool {
        match lock_current(&self.current).take() {
            Some(active) => {
                active.cancel_token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn has_active_stream(&self) -> bool {
        lock_current(&self.current).is_some()
    }
}

/// Clears the client's "current stream" slot when a run ends, but only if
/// the slot still belongs to that run.
struct ActiveStreamGuard {
    current: CurrentStream,
    stream_id: u64,
}

impl Drop for ActiveStreamGuard {
    fn drop(&mut self) {
        let mut current = lock_current(&self.current);
        if current
            .as_ref()
            .is_some_and(|active| active.stream_id == self.stream_id)
        {
            *current = None;
        }
    }
}

/// One prepared streaming call.
pub struct ResponseStream {
    stream_id: u64,
    http: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    body: ResponsesRequest,
    context: StreamContext,
    store: ReasoningStore,
    cancel_token: CancellationToken,
    current: CurrentStream,
}

impl ResponseStream {
    pub fn id(&self) -> u64 {
        self.stream_id
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn request_body(&self) -> &ResponsesRequest {
        &self.body
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    async fn send(&self) -> Result<reqwest::Response, StreamError> {
        let body = serde_json::to_vec(&self.body).map_err(StreamError::InvalidRequest)?;
        let request = self
            .http
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "text/event-stream");
        let request = add_auth_headers(request, &self.api_key);

        debug!(stream_id = self.stream_id, url = %self.url, model = %self.model, "Sending responses request");
        let response = request.body(body).send().await.map_err(StreamError::Request)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            return Err(StreamError::Status {
                status,
                body: format_api_error(&error_text),
            });
        }
        if status == StatusCode::NO_CONTENT || response.content_length() == Some(0) {
            return Err(StreamError::MissingBody);
        }
        Ok(response)
    }

    /// Drive the stream to its end and return the accumulated answer text.
    ///
    /// Cancellation is not an error: the partial answer is returned and any
    /// reasoning records the call opened are closed as abandoned.
    pub async fn run(self, callbacks: &mut dyn StreamCallbacks) -> Result<String, StreamError> {
        let _active = ActiveStreamGuard {
            current: Arc::clone(&self.current),
            stream_id: self.stream_id,
        };

        let response = tokio::select! {
            biased;
            _ = self.cancel_token.cancelled() => {
                debug!(stream_id = self.stream_id, "Stream cancelled before a response arrived");
                return Ok(String::new());
            }
            response = self.send() => response?,
        };

        let window_id = is_reasoning_model(&self.model).then(|| {
            self.store
                .create_window(
                    &self.context.conversation_id,
                    &self.model,
                    self.context.anchor_index,
                )
                .id
                .clone()
        });
        let mut session = StreamSession::new(self.context.conversation_id.clone(), window_id);

        let frames = decode_frames(Box::pin(response.bytes_stream()));
        let mut frames = std::pin::pin!(frames);

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel_token.cancelled() => {
                    debug!(stream_id = self.stream_id, "Stream cancelled");
                    session.abandon(&self.store);
                    return Ok(session.into_final_text());
                }
                next = frames.next() => next,
            };

            match next {
                Some(Ok(frame)) => {
                    session.process_frame(&frame, &self.store, callbacks);
                }
                Some(Err(err)) => {
                    debug!(stream_id = self.stream_id, error = %err, "Stream read failed");
                    session.abandon(&self.store);
                    return Err(StreamError::Read(err));
                }
                None => break,
            }
        }

        session.finalize(&self.store);
        debug!(
            stream_id = self.stream_id,
            completed = session.is_completed(),
            "Stream ended"
        );
        Ok(session.into_final_text())
    }
}

#[derive(Clone, Debug)]
pub enum StreamMessage {
    Chunk(String),
    ReasoningStarted(ReasoningKind),
    ReasoningDelta { kind: ReasoningKind, delta: String },
    ReasoningDone { kind: ReasoningKind, text: String },
    Completed(String),
    /// Frame-level problem; the stream keeps going.
    Error(String),
    /// The call itself failed.
    Failed(String),
    End,
}

/// Forwards callbacks as [`StreamMessage`]s tagged with the stream id.
pub struct ChannelCallbacks {
    tx: mpsc::UnboundedSender<(StreamMessage, u64)>,
    stream_id: u64,
}

impl ChannelCallbacks {
    pub fn new(tx: mpsc::UnboundedSender<(StreamMessage, u64)>, stream_id: u64) -> Self {
        Self { tx, stream_id }
    }

    fn send(&self, message: StreamMessage) {
        let _ = self.tx.send((message, self.stream_id));
    }
}

impl StreamCallbacks for ChannelCallbacks {
    fn on_text_delta(&mut self, text: &str) {
        self.send(StreamMessage::Chunk(text.to_string()));
    }

    fn on_reasoning_start(&mut self, kind: ReasoningKind, _part: Option<&Value>) {
        self.send(StreamMessage::ReasoningStarted(kind));
    }

    fn on_reasoning_delta(&mut self, kind: ReasoningKind, delta: &str) {
        self.send(StreamMessage::ReasoningDelta {
            kind,
            delta: delta.to_string(),
        });
    }

    fn on_reasoning_done(&mut self, kind: ReasoningKind, final_text: &str) {
        self.send(StreamMessage::ReasoningDone {
            kind,
            text: final_text.to_string(),
        });
    }

    fn on_completed(&mut self, final_text: &str, _raw_event: Option<&Value>) {
        self.send(StreamMessage::Completed(final_text.to_string()));
    }

    fn on_error(&mut self, error: &FrameError) {
        self.send(StreamMessage::Error(error.summary()));
    }
}

#[derive(Clone)]
pub struct ChatStreamService {
    tx: mpsc::UnboundedSender<(StreamMessage, u64)>,
}

impl ChatStreamService {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(StreamMessage, u64)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Run `stream` on the runtime, reporting through the channel. Always
    /// finishes with [`StreamMessage::End`].
    pub fn spawn_stream(&self, stream: ResponseStream) -> tokio::task::JoinHandle<()> {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let stream_id = stream.id();
            let mut callbacks = ChannelCallbacks::new(tx.clone(), stream_id);
            if let Err(err) = stream.run(&mut callbacks).await {
                let _ = tx.send((StreamMessage::Failed(err.to_string()), stream_id));
            }
            let _ = tx.send((StreamMessage::End, stream_id));
        })
    }
}
