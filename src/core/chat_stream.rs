use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::api::SendRequest;
use crate::core::error::ChatError;
use crate::core::stream_decoder::{StreamDecoder, StreamEvent};
use crate::core::transport::Transport;

/// Update sent from a stream task, tagged with its stream id on the channel.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamMessage {
    /// Response headers arrived; the reply body is flowing.
    Opened,
    /// Events decoded from one transport chunk, in order.
    Events(Vec<StreamEvent>),
    /// The transport failed before or during the body.
    Failed(ChatError),
}

pub struct StreamParams {
    pub transport: Arc<dyn Transport>,
    pub request: SendRequest,
    pub cancel_token: CancellationToken,
    pub stream_id: u64,
}

type StreamSender = mpsc::UnboundedSender<(StreamMessage, u64)>;

#[derive(Clone)]
pub struct ChatStreamService {
    tx: StreamSender,
}

impl ChatStreamService {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(StreamMessage, u64)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn spawn_stream(&self, params: StreamParams) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let cancel_token = params.cancel_token.clone();
            let stream_id = params.stream_id;
            tokio::select! {
                _ = run_stream(params, &tx) => {}
                _ = cancel_token.cancelled() => {
                    debug!(stream_id, "stream task cancelled");
                }
            }
        });
    }

    #[cfg(test)]
    pub fn send_for_test(&self, message: StreamMessage, stream_id: u64) {
        let _ = self.tx.send((message, stream_id));
    }
}

async fn run_stream(params: StreamParams, tx: &StreamSender) {
    let StreamParams {
        transport,
        request,
        cancel_token,
        stream_id,
    } = params;

    let mut body = match transport.send(&request, &cancel_token).await {
        Ok(body) => body,
        Err(ChatError::Cancelled) => return,
        Err(err) => {
            let _ = tx.send((StreamMessage::Failed(err), stream_id));
            return;
        }
    };
    let _ = tx.send((StreamMessage::Opened, stream_id));

    let mut decoder = StreamDecoder::new();
    while let Some(chunk) = body.next().await {
        match chunk {
            Ok(bytes) => {
                let events = decoder.push(&bytes);
                if !events.is_empty() {
                    let _ = tx.send((StreamMessage::Events(events), stream_id));
                }
                if decoder.is_finished() {
                    return;
                }
            }
            Err(err) => {
                let _ = tx.send((StreamMessage::Failed(err), stream_id));
                return;
            }
        }
    }

    if cancel_token.is_cancelled() {
        return;
    }
    let events = decoder.finish();
    if !events.is_empty() {
        let _ = tx.send((StreamMessage::Events(events), stream_id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_utils::ScriptedTransport;

    fn params(transport: ScriptedTransport, stream_id: u64) -> StreamParams {
        StreamParams {
            transport: Arc::new(transport),
            request: SendRequest {
                message: "hi".into(),
                ..Default::default()
            },
            cancel_token: CancellationToken::new(),
            stream_id,
        }
    }

    async fn drain(
        rx: &mut mpsc::UnboundedReceiver<(StreamMessage, u64)>,
    ) -> Vec<(StreamMessage, u64)> {
        let mut received = Vec::new();
        while let Some(message) = rx.recv().await {
            received.push(message);
        }
        received
    }

    #[tokio::test]
    async fn split_records_arrive_as_ordered_events() {
        let (service, mut rx) = ChatStreamService::new();
        let transport = ScriptedTransport::with_chunks(vec![
            b"{\"type\":\"token\",\"content\":\"Hel".to_vec(),
            b"lo\"}\n{\"type\":\"done\"}\n".to_vec(),
        ]);
        service.spawn_stream(params(transport, 7));
        drop(service);

        let received = drain(&mut rx).await;
        assert_eq!(
            received,
            vec![
                (StreamMessage::Opened, 7),
                (
                    StreamMessage::Events(vec![
                        StreamEvent::Token("Hello".into()),
                        StreamEvent::Complete(Some("Hello".into())),
                    ]),
                    7
                ),
            ]
        );
    }

    #[tokio::test]
    async fn stream_end_without_done_synthesizes_completion() {
        let (service, mut rx) = ChatStreamService::new();
        let transport = ScriptedTransport::with_chunks(vec![b"plain text".to_vec()]);
        service.spawn_stream(params(transport, 1));
        drop(service);

        let received = drain(&mut rx).await;
        assert_eq!(
            received.last(),
            Some(&(
                StreamMessage::Events(vec![
                    StreamEvent::Token("plain text".into()),
                    StreamEvent::Complete(Some("plain text".into())),
                ]),
                1
            ))
        );
    }

    #[tokio::test]
    async fn transport_error_is_forwarded() {
        let (service, mut rx) = ChatStreamService::new();
        let transport = ScriptedTransport::failing(ChatError::Server { status: 503 });
        service.spawn_stream(params(transport, 3));
        drop(service);

        let received = drain(&mut rx).await;
        assert_eq!(
            received,
            vec![(StreamMessage::Failed(ChatError::Server { status: 503 }), 3)]
        );
    }

    #[tokio::test]
    async fn mid_stream_read_error_is_forwarded() {
        let (service, mut rx) = ChatStreamService::new();
        let transport = ScriptedTransport::with_results(vec![
            Ok(b"{\"type\":\"token\",\"content\":\"a\"}\n".to_vec()),
            Err(ChatError::Connection("reset".into())),
        ]);
        service.spawn_stream(params(transport, 4));
        drop(service);

        let received = drain(&mut rx).await;
        assert_eq!(
            received.last(),
            Some(&(
                StreamMessage::Failed(ChatError::Connection("reset".into())),
                4
            ))
        );
    }

    #[tokio::test]
    async fn cancellation_stops_the_task_without_an_error() {
        let (service, mut rx) = ChatStreamService::new();
        let transport = ScriptedTransport::pending_after(vec![
            b"{\"type\":\"token\",\"content\":\"a\"}\n".to_vec(),
        ]);
        let params = params(transport, 5);
        let cancel_token = params.cancel_token.clone();
        service.spawn_stream(params);
        drop(service);

        let (first, _) = rx.recv().await.expect("opened");
        assert_eq!(first, StreamMessage::Opened);
        let (second, _) = rx.recv().await.expect("token");
        assert_eq!(
            second,
            StreamMessage::Events(vec![StreamEvent::Token("a".into())])
        );

        cancel_token.cancel();
        assert!(rx.recv().await.is_none());
    }
}
