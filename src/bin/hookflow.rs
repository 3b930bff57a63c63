use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use hookflow::utils::LoggingConfig;
use hookflow::{
    AiTaskRunner, AssistantDelta, Attachment, AudioCodec, AudioFormat, ChatContent,
    ConversationAgent, ConversationInput, ConversationResponse, ConversationTurn,
    DynConversationHost, GenDataTask, NoHost, ResolvedEntry, SpeechMetadata, SpeechToText,
    StaticHost, SubentryConfig, SubentryKind, WebhookEntry,
};

#[derive(Parser)]
#[command(name = "hookflow", version, about = "Webhook conversation bridge", author)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// 校验配置文件并列出子配置
    Validate {
        #[arg(long)]
        config: PathBuf,
    },
    /// 发送一轮对话
    Chat {
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        subentry: Option<String>,
        /// 覆盖配置中的系统提示词
        #[arg(long)]
        system: Option<String>,
        /// 历史消息，格式 role=text
        #[arg(long = "history")]
        history: Vec<String>,
        #[arg(long, default_value = "cli")]
        conversation_id: String,
        #[arg(long)]
        device_id: Option<String>,
        #[arg(long)]
        language: Option<String>,
        /// 宿主信息文件（设备和暴露实体）
        #[arg(long)]
        host: Option<PathBuf>,
        query: String,
    },
    /// 执行 AI 数据任务
    Task {
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        subentry: Option<String>,
        #[arg(long)]
        name: String,
        /// 附件，格式 path:mime
        #[arg(long = "attach")]
        attachments: Vec<String>,
        /// 输出结构（JSON）
        #[arg(long)]
        structure: Option<String>,
        instructions: String,
    },
    /// 语音转文字
    Transcribe {
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        subentry: Option<String>,
        #[arg(long)]
        language: String,
        audio: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    LoggingConfig::init();

    let cli = Cli::parse();
    match cli.command {
        Command::Validate { config } => handle_validate(config)?,
        Command::Chat {
            config,
            subentry,
            system,
            history,
            conversation_id,
            device_id,
            language,
            host,
            query,
        } => {
            let entry = WebhookEntry::from_path(&config)?;
            let subentry = pick_subentry(&entry, subentry, SubentryKind::Conversation)?;
            let host = load_host(host.as_deref())?;
            let input = ConversationInput {
                device_id,
                language,
                ..Default::default()
            };
            handle_chat(subentry, host, input, conversation_id, system, history, query).await?
        }
        Command::Task {
            config,
            subentry,
            name,
            attachments,
            structure,
            instructions,
        } => {
            let entry = WebhookEntry::from_path(&config)?;
            let subentry = pick_subentry(&entry, subentry, SubentryKind::AiTask)?;
            let mut task = GenDataTask::new(name, instructions);
            for spec in &attachments {
                task = task.with_attachment(parse_attachment(spec)?);
            }
            if let Some(structure) = structure {
                let schema = serde_json::from_str(&structure).context("invalid --structure JSON")?;
                task = task.with_structure(schema);
            }
            handle_task(subentry, task).await?
        }
        Command::Transcribe {
            config,
            subentry,
            language,
            audio,
        } => {
            let entry = WebhookEntry::from_path(&config)?;
            let subentry = pick_subentry(&entry, subentry, SubentryKind::Stt)?;
            handle_transcribe(subentry, language, audio).await?
        }
    }
    Ok(())
}

fn handle_validate(config: PathBuf) -> anyhow::Result<()> {
    let entry = WebhookEntry::from_path(&config)?;
    println!("{}: {} subentries", config.display(), entry.len());
    for kind in [SubentryKind::Conversation, SubentryKind::AiTask, SubentryKind::Stt] {
        for subentry in entry.of_kind(kind) {
            println!(
                "  [{:?}] {} -> {} (streaming: {})",
                kind, subentry.name, subentry.webhook_url, subentry.enable_streaming
            );
        }
    }
    Ok(())
}

async fn handle_chat(
    subentry: Arc<SubentryConfig>,
    host: DynConversationHost,
    input: ConversationInput,
    conversation_id: String,
    system: Option<String>,
    history: Vec<String>,
    query: String,
) -> anyhow::Result<()> {
    let agent = ConversationAgent::new(subentry, host)?;

    let mut content = vec![ChatContent::System {
        content: system.unwrap_or_else(|| agent.system_prompt().to_string()),
    }];
    for item in &history {
        content.push(parse_history(item)?);
    }
    content.push(ChatContent::User { content: query });
    let turn = ConversationTurn::new(conversation_id, content);

    match agent.respond(&input, &turn).await? {
        ConversationResponse::Complete(text) => println!("{}", text),
        ConversationResponse::Streaming(mut deltas) => {
            let mut stdout = std::io::stdout();
            while let Some(delta) = deltas.next().await {
                if let AssistantDelta::Content(text) = delta? {
                    write!(stdout, "{}", text)?;
                    stdout.flush()?;
                }
            }
            writeln!(stdout)?;
        }
    }
    Ok(())
}

async fn handle_task(subentry: Arc<SubentryConfig>, task: GenDataTask) -> anyhow::Result<()> {
    let runner = AiTaskRunner::new(subentry.clone())?;
    let turn = ConversationTurn::new(
        "cli",
        vec![
            ChatContent::System {
                content: subentry.prompt.clone(),
            },
            ChatContent::User {
                content: task.instructions.clone(),
            },
        ],
    );
    let result = runner.generate(&task, &turn).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn handle_transcribe(
    subentry: Arc<SubentryConfig>,
    language: String,
    audio: PathBuf,
) -> anyhow::Result<()> {
    let format = audio
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(AudioFormat::from_extension)
        .ok_or_else(|| anyhow!("unsupported audio file `{}`", audio.display()))?;
    let codec = match format {
        AudioFormat::Wav => AudioCodec::Pcm,
        AudioFormat::Ogg => AudioCodec::Opus,
    };
    let bytes = tokio::fs::read(&audio)
        .await
        .with_context(|| format!("failed to read `{}`", audio.display()))?;

    let stt = SpeechToText::new(subentry)?;
    let metadata = SpeechMetadata::new(language, format, codec);
    let result = stt.transcribe(&metadata, &bytes).await;
    println!("{}", serde_json::to_string_pretty(&result)?);
    if !result.is_success() {
        bail!("transcription failed");
    }
    Ok(())
}

/// 未指定名称时取该类型的第一个子配置
fn pick_subentry(
    entry: &ResolvedEntry,
    name: Option<String>,
    kind: SubentryKind,
) -> anyhow::Result<Arc<SubentryConfig>> {
    match name {
        Some(name) => Ok(entry.get(&name)?),
        None => entry
            .of_kind(kind)
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("no {:?} subentry configured", kind)),
    }
}

fn load_host(path: Option<&Path>) -> anyhow::Result<DynConversationHost> {
    match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read `{}`", path.display()))?;
            let host: StaticHost = serde_json::from_str(&content)?;
            Ok(Arc::new(host))
        }
        None => Ok(Arc::new(NoHost)),
    }
}

fn parse_history(item: &str) -> anyhow::Result<ChatContent> {
    let (role, text) = item
        .split_once('=')
        .ok_or_else(|| anyhow!("history item `{}` must be role=text", item))?;
    let content = text.to_string();
    match role {
        "user" => Ok(ChatContent::User { content }),
        "assistant" => Ok(ChatContent::Assistant {
            content: Some(content),
        }),
        other => bail!("unsupported history role `{}`", other),
    }
}

fn parse_attachment(spec: &str) -> anyhow::Result<Attachment> {
    let (path, mime_type) = spec
        .rsplit_once(':')
        .ok_or_else(|| anyhow!("attachment `{}` must be path:mime", spec))?;
    Ok(Attachment::new(path, PathBuf::from(path), mime_type))
}
