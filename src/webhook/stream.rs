use std::pin::Pin;

use futures::{Stream, StreamExt};
use serde_json::Value;

use crate::error::Result;

pub const ITEM_TYPE: &str = "item";

/// 流式响应中的单个事件，每个非空行最多产生一个
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamEvent {
    /// `{"type": "item", "content": "..."}`，content 非空
    Content(String),
    /// `type` 等于配置的结束标记
    EndMessage,
    /// 合法 JSON，但不是上面两种
    Unrecognized,
}

pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

/// NDJSON 流解析器
///
/// 按换行切分响应体，每行独立解析：
/// ```text
/// {"type": "item", "content": "Hello"}
/// {"type": "item", "content": " world"}
/// {"type": "end"}
/// ```
/// 空行跳过；解析失败的行记录警告后跳过，不会中断整个流。
#[derive(Clone, Debug)]
pub struct StreamFrameParser {
    end_marker: String,
}

impl StreamFrameParser {
    pub fn new(end_marker: impl Into<String>) -> Self {
        Self {
            end_marker: end_marker.into(),
        }
    }

    /// 解析单行，空行和坏行返回 `None`
    pub fn parse_line(&self, line: &[u8]) -> Option<StreamEvent> {
        let text = match std::str::from_utf8(line) {
            Ok(text) => text.trim(),
            Err(e) => {
                tracing::warn!(error = %e, "Streaming response chunk is not valid UTF-8");
                return None;
            }
        };

        if text.is_empty() {
            return None;
        }

        let chunk: Value = match serde_json::from_str(text) {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::warn!(chunk = %text, error = %e, "Failed to parse streaming response chunk");
                return None;
            }
        };

        let event = match chunk.get("type").and_then(Value::as_str) {
            Some(ITEM_TYPE) => match chunk.get("content").and_then(Value::as_str) {
                Some(content) if !content.is_empty() => StreamEvent::Content(content.to_string()),
                _ => StreamEvent::Unrecognized,
            },
            Some(kind) if kind == self.end_marker => StreamEvent::EndMessage,
            _ => StreamEvent::Unrecognized,
        };
        Some(event)
    }

    /// 把字节流转换为惰性的事件流
    ///
    /// 只在需要下一行时才拉取下一个数据块。遇到结束标记、对端关闭或读取出错后
    /// 立即释放底层响应体，之后流结束。
    pub fn frames<S, B>(self, body: S) -> EventStream
    where
        S: Stream<Item = Result<B>> + Send + 'static,
        B: AsRef<[u8]> + Send + 'static,
    {
        let state = FrameState {
            body: Some(Box::pin(body)),
            buffer: Vec::new(),
            parser: self,
        };

        Box::pin(futures::stream::unfold(state, |mut state| async move {
            loop {
                if let Some(pos) = state.buffer.iter().position(|b| *b == b'\n') {
                    let line: Vec<u8> = state.buffer.drain(..=pos).collect();
                    if let Some(event) = state.parser.parse_line(&line) {
                        if event == StreamEvent::EndMessage {
                            state.release();
                        }
                        return Some((Ok(event), state));
                    }
                    continue;
                }

                let body = state.body.as_mut()?;
                match body.next().await {
                    Some(Ok(chunk)) => state.buffer.extend_from_slice(chunk.as_ref()),
                    Some(Err(err)) => {
                        state.release();
                        return Some((Err(err), state));
                    }
                    None => {
                        // 最后一行可能没有换行符
                        state.body = None;
                        let rest = std::mem::take(&mut state.buffer);
                        let event = state.parser.parse_line(&rest)?;
                        return Some((Ok(event), state));
                    }
                }
            }
        }))
    }
}

struct FrameState<S> {
    body: Option<Pin<Box<S>>>,
    buffer: Vec<u8>,
    parser: StreamFrameParser,
}

impl<S> FrameState<S> {
    fn release(&mut self) {
        self.body = None;
        self.buffer.clear();
    }
}
