//! Producer side of the chat answer stream.
//!
//! A spawned task pushes [`StreamEvent`]s into a bounded channel in protocol
//! order. Dropping the receiver cancels the task, which in turn drops the
//! upstream generation stream.

use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use ragdoc_app_server_protocol::MetaPayload;
use ragdoc_app_server_protocol::SourcePayload;
use ragdoc_app_server_protocol::SourcesPayload;
use ragdoc_app_server_protocol::StreamEvent;
use ragdoc_generation::GenerationBackend;
use ragdoc_generation::PromptMessage;
use ragdoc_retrieval::PreparedAnswer;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::warn;

/// Events buffered between the producer and the HTTP body.
pub const STREAM_BUFFER: usize = 32;

/// Everything the producer needs, resolved before the response starts.
pub struct AnswerJob {
    pub meta: MetaPayload,
    pub sources: Vec<SourcePayload>,
    pub messages: Vec<PromptMessage>,
}

impl AnswerJob {
    /// Build a job from a prepared answer and the generation model name.
    pub fn new(prepared: PreparedAnswer, model: &str) -> Self {
        let retrieval = prepared.retrieval;
        let meta = MetaPayload {
            model: model.to_string(),
            filename: retrieval.document.filename.clone(),
            pages: retrieval.document.page_count,
            top_k: retrieval.top_k,
            latency_ms: None,
        };
        let sources = retrieval
            .sources
            .into_iter()
            .map(|s| SourcePayload::new(s.label, s.chunk_id, s.page, s.score, s.text))
            .collect();
        let messages = vec![
            PromptMessage::developer(prepared.prompt.instructions),
            PromptMessage::user(prepared.prompt.user_turn),
        ];
        Self {
            meta,
            sources,
            messages,
        }
    }
}

/// Start producing `job` and return the receiving end.
pub fn spawn_answer_stream(
    backend: Arc<dyn GenerationBackend>,
    job: AnswerJob,
) -> (mpsc::Receiver<StreamEvent>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(STREAM_BUFFER);
    let handle = tokio::spawn(produce_answer(backend, job, tx));
    (rx, handle)
}

/// Emit META, SOURCES, the generated deltas and the terminal frames.
///
/// Returns early, without DONE, only when the receiver is gone.
pub async fn produce_answer(
    backend: Arc<dyn GenerationBackend>,
    job: AnswerJob,
    tx: mpsc::Sender<StreamEvent>,
) {
    let AnswerJob {
        meta,
        sources,
        messages,
    } = job;

    if tx.send(StreamEvent::Meta(meta)).await.is_err() {
        return;
    }
    if tx
        .send(StreamEvent::Sources(SourcesPayload { sources }))
        .await
        .is_err()
    {
        return;
    }
    let started = Instant::now();

    let opened = tokio::select! {
        _ = tx.closed() => {
            debug!("Client left before generation started");
            return;
        }
        opened = backend.generate_stream(messages) => opened,
    };

    let mut failure = None;
    match opened {
        Ok(mut tokens) => loop {
            let next = tokio::select! {
                _ = tx.closed() => {
                    debug!("Client disconnected, dropping generation stream");
                    return;
                }
                next = tokens.next() => next,
            };
            match next {
                Some(Ok(delta)) => {
                    if delta.is_empty() {
                        continue;
                    }
                    if tx.send(StreamEvent::delta(delta)).await.is_err() {
                        return;
                    }
                }
                Some(Err(err)) => {
                    failure = Some(err.to_string());
                    break;
                }
                None => break,
            }
        },
        Err(err) => failure = Some(err.to_string()),
    }

    if let Some(message) = failure {
        warn!("Generation via {} failed: {message}", backend.name());
        if tx.send(StreamEvent::error(message)).await.is_err() {
            return;
        }
    }

    let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    let _ = tx.send(StreamEvent::done(latency_ms)).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::stream;
    use pretty_assertions::assert_eq;
    use ragdoc_generation::GenerationError;
    use ragdoc_generation::TokenStream;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicBool;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    /// Replays a fixed script of fragments and failures.
    struct ScriptedBackend {
        script: Mutex<Option<Vec<Result<String, String>>>>,
        fail_to_open: bool,
    }

    impl ScriptedBackend {
        fn new(script: Vec<Result<&str, &str>>) -> Self {
            Self {
                script: Mutex::new(Some(
                    script
                        .into_iter()
                        .map(|r| r.map(str::to_string).map_err(str::to_string))
                        .collect(),
                )),
                fail_to_open: false,
            }
        }

        fn unreachable() -> Self {
            Self {
                script: Mutex::new(None),
                fail_to_open: true,
            }
        }
    }

    #[async_trait]
    impl GenerationBackend for ScriptedBackend {
        fn name(&self) -> &str {
            "scripted"
        }

        fn model(&self) -> &str {
            "scripted-model"
        }

        fn is_available(&self) -> bool {
            true
        }

        async fn generate_stream(
            &self,
            _messages: Vec<PromptMessage>,
        ) -> ragdoc_generation::Result<TokenStream> {
            if self.fail_to_open {
                return Err(GenerationError::Backend("connection refused".to_string()));
            }
            let script = self.script.lock().unwrap().take().unwrap_or_default();
            Ok(stream::iter(
                script
                    .into_iter()
                    .map(|item| item.map_err(GenerationError::Stream)),
            )
            .boxed())
        }
    }

    /// Sets its flag when dropped.
    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    /// Yields a fragment every few milliseconds, forever.
    struct EndlessBackend {
        dropped: Arc<AtomicBool>,
    }

    #[async_trait]
    impl GenerationBackend for EndlessBackend {
        fn name(&self) -> &str {
            "endless"
        }

        fn model(&self) -> &str {
            "endless-model"
        }

        fn is_available(&self) -> bool {
            true
        }

        async fn generate_stream(
            &self,
            _messages: Vec<PromptMessage>,
        ) -> ragdoc_generation::Result<TokenStream> {
            let flag = DropFlag(self.dropped.clone());
            Ok(stream::unfold(flag, |flag| async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                Some((Ok::<_, GenerationError>("tick".to_string()), flag))
            })
            .boxed())
        }
    }

    fn job() -> AnswerJob {
        AnswerJob {
            meta: MetaPayload {
                model: "scripted-model".to_string(),
                filename: "doc.pdf".to_string(),
                pages: 1,
                top_k: 5,
                latency_ms: None,
            },
            sources: vec![SourcePayload::new("S1", "p1-c1", 1, 0.9, "text")],
            messages: vec![PromptMessage::user("q")],
        }
    }

    async fn collect(backend: Arc<dyn GenerationBackend>) -> Vec<StreamEvent> {
        let (mut rx, handle) = spawn_answer_stream(backend, job());
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        handle.await.unwrap();
        events
    }

    fn names(events: &[StreamEvent]) -> Vec<&'static str> {
        events.iter().map(StreamEvent::name).collect()
    }

    #[tokio::test]
    async fn emits_frames_in_protocol_order() {
        let events = collect(Arc::new(ScriptedBackend::new(vec![Ok("Hel"), Ok("lo")]))).await;

        assert_eq!(names(&events), vec!["meta", "sources", "delta", "delta", "done"]);
        assert_eq!(events[2], StreamEvent::delta("Hel"));
        assert_eq!(events[3], StreamEvent::delta("lo"));
        assert!(matches!(events[1], StreamEvent::Sources(ref s) if s.sources[0].sid == "S1"));
    }

    #[tokio::test]
    async fn failure_mid_stream_still_ends_with_done() {
        let events = collect(Arc::new(ScriptedBackend::new(vec![
            Ok("Hel"),
            Err("upstream reset"),
            Ok("never sent"),
        ])))
        .await;

        assert_eq!(names(&events), vec!["meta", "sources", "delta", "error", "done"]);
        assert_eq!(events[2], StreamEvent::delta("Hel"));
        match &events[3] {
            StreamEvent::Error(payload) => assert!(payload.error.contains("upstream reset")),
            other => panic!("expected error frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn failure_to_open_reports_error() {
        let events = collect(Arc::new(ScriptedBackend::unreachable())).await;
        assert_eq!(names(&events), vec!["meta", "sources", "error", "done"]);
    }

    #[tokio::test]
    async fn empty_fragments_are_skipped() {
        let events = collect(Arc::new(ScriptedBackend::new(vec![Ok("a"), Ok(""), Ok("b")]))).await;

        let text: String = events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::Delta(d) => Some(d.delta.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(names(&events), vec!["meta", "sources", "delta", "delta", "done"]);
        assert_eq!(text, "ab");
    }

    #[tokio::test]
    async fn disconnect_stops_generation() {
        let dropped = Arc::new(AtomicBool::new(false));
        let backend = Arc::new(EndlessBackend {
            dropped: dropped.clone(),
        });

        let (mut rx, handle) = spawn_answer_stream(backend, job());
        assert_eq!(rx.recv().await.map(|e| e.name()), Some("meta"));
        assert_eq!(rx.recv().await.map(|e| e.name()), Some("sources"));
        assert_eq!(rx.recv().await, Some(StreamEvent::delta("tick")));
        drop(rx);

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("producer should stop after the client leaves")
            .unwrap();
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[test]
    fn done_is_sent_exactly_once() {
        let events =
            tokio_test::block_on(collect(Arc::new(ScriptedBackend::new(vec![Ok("x")]))));

        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
        assert!(events.last().is_some_and(StreamEvent::is_terminal));
    }
}
