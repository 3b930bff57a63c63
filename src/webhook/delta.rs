use std::pin::Pin;

use futures::{Stream, StreamExt};

use super::stream::{EventStream, StreamEvent};
use crate::error::Result;

pub const SENTENCE_TERMINATORS: [char; 3] = ['.', '!', '?'];

/// 助手输出的增量
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AssistantDelta {
    Role,
    Content(String),
}

pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<AssistantDelta>> + Send>>;

/// 把流事件还原为助手增量
///
/// 先输出一次 `Role`，之后每个内容事件立即原样输出。
/// 在消息边界处，如果开启了句末符补全且上一段内容不以 `.`、`!`、`?` 结尾，
/// 额外补一个 `"."`，下游 TTS 依赖句末符切分句子。
#[derive(Clone, Debug, Default)]
pub struct DeltaReconstructor {
    enforce_terminators: bool,
    last_content: String,
}

impl DeltaReconstructor {
    pub fn new(enforce_terminators: bool) -> Self {
        Self {
            enforce_terminators,
            last_content: String::new(),
        }
    }

    /// 处理单个事件，返回需要输出的增量
    pub fn on_event(&mut self, event: StreamEvent) -> Option<AssistantDelta> {
        match event {
            StreamEvent::Content(text) => {
                tracing::debug!(chars = text.chars().count(), "Yielding content delta");
                self.last_content.clone_from(&text);
                Some(AssistantDelta::Content(text))
            }
            StreamEvent::EndMessage => {
                tracing::debug!("Message boundary detected");
                let last = std::mem::take(&mut self.last_content);
                if self.enforce_terminators && needs_terminator(&last) {
                    tracing::debug!("Adding period at message boundary");
                    Some(AssistantDelta::Content(".".to_string()))
                } else {
                    None
                }
            }
            StreamEvent::Unrecognized => None,
        }
    }

    /// 惰性转换整个事件流
    ///
    /// 事件流出错时把错误传出并结束，已输出的增量不会撤回。
    pub fn reconstruct(self, events: EventStream) -> DeltaStream {
        let role = futures::stream::once(async { Ok(AssistantDelta::Role) });
        let deltas = futures::stream::unfold(
            (self, Some(events)),
            |(mut reconstructor, events)| async move {
                let mut events = events?;
                loop {
                    match events.next().await? {
                        Ok(event) => {
                            if let Some(delta) = reconstructor.on_event(event) {
                                return Some((Ok(delta), (reconstructor, Some(events))));
                            }
                        }
                        Err(err) => return Some((Err(err), (reconstructor, None))),
                    }
                }
            },
        );
        Box::pin(role.chain(deltas))
    }
}

fn needs_terminator(content: &str) -> bool {
    match content.trim_end().chars().last() {
        Some(last) => !SENTENCE_TERMINATORS.contains(&last),
        None => false,
    }
}

/// 拼接事件流中的全部内容，忽略消息边界
pub async fn collect_content(mut events: EventStream) -> Result<String> {
    let mut reply = String::new();
    while let Some(event) = events.next().await {
        if let StreamEvent::Content(text) = event? {
            reply.push_str(&text);
        }
    }
    Ok(reply)
}
