//! Streaming responses (`stream: true`).
//!
//! A spawned task drives the line pump and writes SSE frames into a
//! bounded channel that backs the response body. The task notices a
//! departed client through the channel closing and cancels the pump.

use std::convert::Infallible;
use std::time::Duration;

use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use metrics::counter;
use serde_json::{Map, Value, json};
use tidegate_core::text::{estimate_tokens, is_citation};
use tidegate_core::{ContentFragment, FragmentKind, SieveEvent};
use tidegate_stream::{LinePump, LineResult, PumpError, StopReason, start_line_pump};
use tidegate_tools::{ToolSieve, to_openai_tool_calls};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use super::chunk::{FinishReason, ResponseMeta, chunk, usage};
use super::plan::RequestPlan;
use crate::errors::error_body;
use crate::metrics::{STREAM_CANCELLATIONS_TOTAL, TOOL_CALLS_TOTAL, UPSTREAM_ERRORS_TOTAL};
use crate::server::{ActiveStream, AppState};
use crate::upstream::ByteStream;

/// Frames buffered between the task and the response body.
const FRAME_BUFFER: usize = 64;

/// Terminal SSE payload.
const DONE_FRAME: &str = "[DONE]";

type FrameSender = mpsc::Sender<Result<Event, Infallible>>;

/// The client stopped reading.
#[derive(Debug)]
struct ClientGone;

/// How the upstream side of a stream ended.
#[derive(Debug)]
enum StreamEnd {
    Stopped(StopReason),
    Eof,
    Idle,
}

/// Start streaming `body` to the client.
pub(crate) fn respond(state: AppState, plan: RequestPlan, body: ByteStream) -> Response {
    let (tx, rx) = mpsc::channel(FRAME_BUFFER);
    let keep_alive = state.config.keep_alive;
    let _ = tokio::spawn(async move {
        let _active = ActiveStream::enter(&state.active_streams);
        run(&state, &plan, body, tx).await;
    });
    Sse::new(ReceiverStream::new(rx))
        .keep_alive(KeepAlive::new().interval(keep_alive))
        .into_response()
}

async fn run(state: &AppState, plan: &RequestPlan, body: ByteStream, tx: FrameSender) {
    let cancel = state.shutdown.child_token();
    let _cancel_on_exit = cancel.clone().drop_guard();
    let LinePump { mut lines, done } = start_line_pump(
        body,
        state.config.pump_options(plan.thinking_enabled),
        cancel.clone(),
    );
    let mut writer = FrameWriter::new(tx, plan, plan.sieve(state.config.recent_text_window));

    let end = match pump_to_client(&mut writer, &mut lines, state.config.idle_timeout).await {
        Ok(end) => end,
        Err(ClientGone) => {
            cancel.cancel();
            counter!(STREAM_CANCELLATIONS_TOTAL, "reason" => "client").increment(1);
            debug!(id = %writer.meta.id, "client disconnected, stream abandoned");
            return;
        }
    };

    let outcome = match end {
        StreamEnd::Stopped(StopReason::Finished) => writer.finish(false).await,
        StreamEnd::Stopped(StopReason::Filtered) => writer.finish(true).await,
        StreamEnd::Stopped(StopReason::UpstreamError(message)) => {
            counter!(UPSTREAM_ERRORS_TOTAL, "kind" => "upstream").increment(1);
            writer.fail(&message).await
        }
        StreamEnd::Stopped(StopReason::Eof) | StreamEnd::Eof => match done.await {
            Ok(Err(PumpError::Cancelled)) => {
                writer.abandon_sieve();
                writer.finish(false).await
            }
            Ok(Err(err)) => {
                counter!(UPSTREAM_ERRORS_TOTAL, "kind" => "stream").increment(1);
                writer.fail(&err.to_string()).await
            }
            _ => writer.finish(false).await,
        },
        StreamEnd::Idle => {
            cancel.cancel();
            counter!(STREAM_CANCELLATIONS_TOTAL, "reason" => "idle").increment(1);
            warn!(timeout = ?state.config.idle_timeout, "upstream idle, finishing stream");
            writer.abandon_sieve();
            writer.finish(false).await
        }
    };
    if outcome.is_err() {
        debug!("client disconnected before the final frame");
    }
}

/// Forward lines until the upstream stops, goes idle, or the client leaves.
async fn pump_to_client(
    writer: &mut FrameWriter,
    lines: &mut mpsc::Receiver<LineResult>,
    idle_timeout: Duration,
) -> Result<StreamEnd, ClientGone> {
    loop {
        let next = tokio::select! {
            () = writer.tx.closed() => return Err(ClientGone),
            next = tokio::time::timeout(idle_timeout, lines.recv()) => next,
        };
        let Ok(next) = next else {
            return Ok(StreamEnd::Idle);
        };
        let Some(line) = next else {
            return Ok(StreamEnd::Eof);
        };
        let stop = StopReason::of(&line);
        for fragment in line.fragments {
            writer.fragment(fragment).await?;
        }
        if let Some(stop) = stop {
            return Ok(StreamEnd::Stopped(stop));
        }
    }
}

/// Renders fragments and sieve events as SSE frames.
struct FrameWriter {
    tx: FrameSender,
    meta: ResponseMeta,
    prompt: String,
    search_enabled: bool,
    sieve: Option<ToolSieve>,
    role_sent: bool,
    reasoning: String,
    text: String,
    tool_calls: usize,
}

impl FrameWriter {
    fn new(tx: FrameSender, plan: &RequestPlan, sieve: Option<ToolSieve>) -> Self {
        Self {
            tx,
            meta: ResponseMeta::new(plan.model.clone()),
            prompt: plan.prompt.clone(),
            search_enabled: plan.search_enabled,
            sieve,
            role_sent: false,
            reasoning: String::new(),
            text: String::new(),
            tool_calls: 0,
        }
    }

    async fn send(&self, data: String) -> Result<(), ClientGone> {
        self.tx
            .send(Ok(Event::default().data(data)))
            .await
            .map_err(|_| ClientGone)
    }

    async fn delta(&mut self, key: &str, value: Value) -> Result<(), ClientGone> {
        let mut delta = Map::new();
        if !self.role_sent {
            let _ = delta.insert("role".into(), json!("assistant"));
            self.role_sent = true;
        }
        let _ = delta.insert(key.into(), value);
        self.send(chunk(&self.meta, Value::Object(delta), None).to_string()).await
    }

    async fn fragment(&mut self, fragment: ContentFragment) -> Result<(), ClientGone> {
        if fragment.text.is_empty() {
            return Ok(());
        }
        match fragment.kind {
            FragmentKind::Reasoning => {
                self.reasoning.push_str(&fragment.text);
                self.delta("reasoning_content", Value::String(fragment.text)).await
            }
            FragmentKind::Text if self.search_enabled && is_citation(&fragment.text) => Ok(()),
            FragmentKind::Text => {
                self.text.push_str(&fragment.text);
                let events = match self.sieve.as_mut() {
                    Some(sieve) => sieve.push(&fragment.text),
                    None => vec![SieveEvent::Text(fragment.text)],
                };
                self.events(events).await
            }
        }
    }

    async fn events(&mut self, events: Vec<SieveEvent>) -> Result<(), ClientGone> {
        for event in events {
            match event {
                SieveEvent::Text(text) if text.is_empty() => {}
                SieveEvent::Text(text) => self.delta("content", Value::String(text)).await?,
                SieveEvent::ToolCalls(calls) => {
                    let mut rendered = to_openai_tool_calls(&calls, true);
                    for (i, call) in rendered.iter_mut().enumerate() {
                        call.index = Some(self.tool_calls + i);
                    }
                    self.tool_calls += rendered.len();
                    counter!(TOOL_CALLS_TOTAL).increment(rendered.len() as u64);
                    self.delta("tool_calls", json!(rendered)).await?;
                }
            }
        }
        Ok(())
    }

    /// Release anything the sieve still holds.
    async fn flush_sieve(&mut self) -> Result<(), ClientGone> {
        match self.sieve.take() {
            Some(sieve) => self.events(sieve.flush()).await,
            None => Ok(()),
        }
    }

    /// Drop the sieve without flushing. Whatever it holds was never
    /// confirmed by a clean end of the turn.
    fn abandon_sieve(&mut self) {
        if self.sieve.take().is_some() {
            debug!(id = %self.meta.id, "stream cut short, held text discarded");
        }
    }

    async fn finish(mut self, filtered: bool) -> Result<(), ClientGone> {
        self.flush_sieve().await?;
        let reason = FinishReason::decide(self.tool_calls > 0, filtered);
        let mut frame = chunk(&self.meta, json!({}), Some(reason));
        frame["usage"] = usage(&self.prompt, &self.reasoning, &self.text);
        debug!(
            id = %self.meta.id,
            finish_reason = reason.as_str(),
            prompt_tokens = estimate_tokens(&self.prompt),
            "stream finished"
        );
        self.send(frame.to_string()).await?;
        self.send(DONE_FRAME.to_string()).await
    }

    async fn fail(mut self, message: &str) -> Result<(), ClientGone> {
        self.abandon_sieve();
        warn!(id = %self.meta.id, error = message, "upstream failed mid-stream");
        self.send(error_body(StatusCode::BAD_GATEWAY, message).to_string()).await?;
        self.send(DONE_FRAME.to_string()).await
    }
}
