use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use clock_core::{StreamEvent, StreamEventKind};
use tokio_stream::{
    wrappers::{errors::BroadcastStreamRecvError, BroadcastStream},
    Stream, StreamExt,
};
use tracing::{debug, warn};

use crate::state::AppState;

fn event_name(kind: StreamEventKind) -> &'static str {
    match kind {
        StreamEventKind::TaskStart => "task_start",
        StreamEventKind::TaskEnd => "task_end",
        StreamEventKind::Stdout => "stdout",
        StreamEventKind::Stderr => "stderr",
        StreamEventKind::Meta => "meta",
    }
}

fn to_sse(event: &StreamEvent) -> Option<Event> {
    match Event::default()
        .id(event.id.to_string())
        .event(event_name(event.kind))
        .json_data(event)
    {
        Ok(sse) => Some(sse),
        Err(e) => {
            warn!("事件序列化失败: id={}, error={}", event.id, e);
            None
        }
    }
}

/// 任务事件流（SSE）
///
/// 连接建立后先推送一条 `meta` 事件；订阅者处理过慢时丢失的事件数量
/// 以 `meta` 事件告知，不会阻塞执行器。服务关闭时流随之结束。
pub async fn stream_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = state.events.subscribe();
    debug!("新的事件流订阅者: 当前订阅数={}", state.events.subscriber_count());

    let hello = to_sse(&StreamEvent::meta("connected"));
    let events = BroadcastStream::new(receiver).filter_map(|message| match message {
        Ok(event) => to_sse(&event),
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            to_sse(&StreamEvent::meta(format!("lagged: {skipped} events dropped")))
        }
    });

    let stream = tokio_stream::iter(hello).chain(events).map(Ok);
    let closed = state.shutdown.clone().cancelled_owned();
    let stream = futures::StreamExt::take_until(stream, closed);
    Sse::new(stream).keep_alive(KeepAlive::default())
}
