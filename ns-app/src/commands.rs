//! Subcommand handlers.

use crate::config::NotesmithConfig;
use crate::host::{FileAudioPlayer, StderrNotifier, TerminalOutput};
use base64::Engine;
use ns_llm::{Assistant, AudioInput, ChatMessage, ImageRequest, OutputTarget};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct ChatOptions {
    pub stream: bool,
    pub system: Option<String>,
    pub images: Vec<PathBuf>,
    pub history: Option<PathBuf>,
    pub prompt: String,
}

fn assistant(cfg: &NotesmithConfig) -> anyhow::Result<Assistant> {
    let provider = cfg.provider()?;
    let assistant = Assistant::new(
        provider,
        &cfg.assistant_config(),
        Arc::new(StderrNotifier),
    )?;
    tracing::debug!(provider = %provider, model = %assistant.model(), "assistant ready");
    Ok(assistant)
}

pub async fn chat(cfg: &NotesmithConfig, opts: ChatOptions) -> anyhow::Result<()> {
    let turns = build_turns(&opts).await?;
    let assistant = assistant(cfg)?;

    if opts.stream {
        let mut out = TerminalOutput::stdout();
        assistant
            .chat(&turns, Some(&mut out as &mut dyn OutputTarget))
            .await?;
        println!();
    } else {
        let text = assistant.chat(&turns, None).await?;
        println!("{text}");
    }
    Ok(())
}

async fn build_turns(opts: &ChatOptions) -> anyhow::Result<Vec<ChatMessage>> {
    let mut turns = Vec::new();
    if let Some(system) = opts.system.as_deref().filter(|s| !s.trim().is_empty()) {
        turns.push(ChatMessage::system(system));
    }
    if let Some(path) = &opts.history {
        turns.extend(load_history(path).await?);
    }

    if opts.images.is_empty() {
        turns.push(ChatMessage::user(opts.prompt.clone()));
    } else {
        let mut urls = Vec::with_capacity(opts.images.len());
        for path in &opts.images {
            urls.push(image_data_url(path).await?);
        }
        turns.push(ChatMessage::user_with_images(opts.prompt.clone(), urls));
    }
    Ok(turns)
}

async fn load_history(path: &Path) -> anyhow::Result<Vec<ChatMessage>> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| anyhow::anyhow!("read history {}: {e}", path.display()))?;
    serde_json::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("parse history {}: {e}", path.display()))
}

async fn image_data_url(path: &Path) -> anyhow::Result<String> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| anyhow::anyhow!("read image {}: {e}", path.display()))?;
    let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
    Ok(format!("data:{};base64,{encoded}", image_mime(path)))
}

fn image_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "image/png",
    }
}

pub async fn image(cfg: &NotesmithConfig, request: ImageRequest) -> anyhow::Result<()> {
    if request.count == 0 {
        return Err(anyhow::anyhow!("--count must be > 0"));
    }
    let assistant = assistant(cfg)?;
    for url in assistant.generate_images(&request).await? {
        println!("{url}");
    }
    Ok(())
}

pub async fn transcribe(cfg: &NotesmithConfig, file: &Path, language: &str) -> anyhow::Result<()> {
    let bytes = tokio::fs::read(file)
        .await
        .map_err(|e| anyhow::anyhow!("read audio {}: {e}", file.display()))?;
    let file_name = file
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("audio.wav")
        .to_string();

    let assistant = assistant(cfg)?;
    let text = assistant
        .transcribe(AudioInput::new(bytes, file_name), language)
        .await?;
    println!("{text}");
    Ok(())
}

pub async fn speak(cfg: &NotesmithConfig, text: &str, out: Option<PathBuf>) -> anyhow::Result<()> {
    let player = FileAudioPlayer::new(
        out.unwrap_or_else(|| cfg.audio.output_path.clone()),
        cfg.audio.player_command.clone(),
    );
    let assistant = assistant(cfg)?;
    assistant.speak(text, &player).await?;
    Ok(())
}

pub fn doctor(cfg: &NotesmithConfig) -> anyhow::Result<()> {
    let provider = cfg.provider()?;
    let ac = cfg.assistant_config();
    println!("provider={provider}");
    println!("model={}", ac.model);
    println!("max_tokens={}", ac.max_tokens);
    println!("openai_base_url={}", ac.openai_base_url());
    println!("openai_api_key={}", key_state(&ac.api_key));
    if provider == ns_llm::Provider::Anthropic {
        println!("anthropic_base_url={}", ac.anthropic_base_url());
    }
    println!(
        "anthropic_api_key={}",
        key_state(ac.anthropic_api_key.as_deref().unwrap_or_default())
    );
    println!("speech_output={}", cfg.audio.output_path.display());
    Ok(())
}

fn key_state(key: &str) -> &'static str {
    if key.trim().is_empty() { "missing" } else { "set" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ns_llm::{ContentPart, MessageContent, Role};
    use std::io::Write;

    fn opts(prompt: &str) -> ChatOptions {
        ChatOptions {
            stream: true,
            system: None,
            images: Vec::new(),
            history: None,
            prompt: prompt.to_string(),
        }
    }

    #[tokio::test]
    async fn turns_are_system_then_history_then_prompt() {
        let mut history = tempfile::NamedTempFile::new().expect("tempfile");
        history
            .write_all(
                br#"[{"role":"user","content":"earlier"},{"role":"assistant","content":"reply"}]"#,
            )
            .expect("write");

        let mut o = opts("now");
        o.system = Some("be brief".to_string());
        o.history = Some(history.path().to_path_buf());

        let turns = build_turns(&o).await.expect("turns");
        let roles: Vec<Role> = turns.iter().map(|t| t.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::User]
        );
        assert_eq!(turns[3], ChatMessage::user("now"));
    }

    #[tokio::test]
    async fn images_become_data_url_parts() {
        let dir = tempfile::tempdir().expect("tempdir");
        let img = dir.path().join("shot.JPG");
        std::fs::write(&img, [0xff, 0xd8, 0xff]).expect("write image");

        let mut o = opts("what is this?");
        o.images = vec![img];
        let turns = build_turns(&o).await.expect("turns");

        assert_eq!(turns.len(), 1);
        assert!(turns[0].has_image_parts());
        let MessageContent::Parts(parts) = &turns[0].content else {
            panic!("expected parts");
        };
        let ContentPart::ImageUrl { image_url } = &parts[1] else {
            panic!("expected image part");
        };
        assert_eq!(image_url.url, "data:image/jpeg;base64,/9j/");
    }

    #[tokio::test]
    async fn bad_history_is_reported() {
        let mut history = tempfile::NamedTempFile::new().expect("tempfile");
        history.write_all(b"not json").expect("write");
        let mut o = opts("x");
        o.history = Some(history.path().to_path_buf());
        assert!(build_turns(&o).await.is_err());
    }

    #[test]
    fn key_state_hides_values() {
        assert_eq!(key_state("sk-123"), "set");
        assert_eq!(key_state(" "), "missing");
    }
}
