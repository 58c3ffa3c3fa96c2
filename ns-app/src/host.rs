//! Terminal implementations of the `ns-llm` host capabilities.

use async_trait::async_trait;
use ns_llm::{AudioPlayer, LlmError, Notifier, OutputTarget, SpeechAudio};
use std::io::Write;
use std::path::PathBuf;

/// Prints streamed text to stdout, writing only what hasn't been printed yet.
pub struct TerminalOutput<W: Write + Send = std::io::Stdout> {
    out: W,
    printed: usize,
}

impl TerminalOutput {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> TerminalOutput<W> {
    pub fn new(out: W) -> Self {
        Self { out, printed: 0 }
    }

    #[cfg(test)]
    fn printed(&self) -> usize {
        self.printed
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> OutputTarget for TerminalOutput<W> {
    fn render(&mut self, text: &str) {
        // Running totals only grow; anything else is reprinted on a fresh line.
        let pending = match text.get(self.printed..) {
            Some(rest) => rest.to_string(),
            None => format!("\n{text}"),
        };
        if let Err(e) = self
            .out
            .write_all(pending.as_bytes())
            .and_then(|_| self.out.flush())
        {
            tracing::warn!(%e, "failed to write streamed output");
        }
        self.printed = text.len();
    }
}

pub struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn notify(&self, message: &str) {
        eprintln!("{message}");
    }
}

/// Writes speech to a file, then runs the configured player on it.
pub struct FileAudioPlayer {
    output_path: PathBuf,
    player_command: Vec<String>,
}

impl FileAudioPlayer {
    pub fn new(output_path: PathBuf, player_command: Vec<String>) -> Self {
        Self {
            output_path,
            player_command,
        }
    }
}

#[async_trait]
impl AudioPlayer for FileAudioPlayer {
    #[tracing::instrument(level = "info", skip_all, fields(path = %self.output_path.display()))]
    async fn play(&self, audio: SpeechAudio) -> ns_llm::Result<()> {
        if let Some(parent) = self.output_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    LlmError::Playback(format!("create {}: {e}", parent.display()))
                })?;
            }
        }
        tokio::fs::write(&self.output_path, &audio.bytes)
            .await
            .map_err(|e| {
                LlmError::Playback(format!("write {}: {e}", self.output_path.display()))
            })?;
        tracing::info!(bytes = audio.bytes.len(), mime = %audio.mime, "speech written");

        let Some((program, args)) = self.player_command.split_first() else {
            return Ok(());
        };
        let status = tokio::process::Command::new(program)
            .args(args)
            .arg(&self.output_path)
            .status()
            .await
            .map_err(|e| LlmError::Playback(format!("spawn {program}: {e}")))?;
        if !status.success() {
            return Err(LlmError::Playback(format!("{program} exited with {status}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn speech(bytes: &'static [u8]) -> SpeechAudio {
        SpeechAudio {
            bytes: bytes.to_vec().into(),
            mime: "audio/mpeg".to_string(),
        }
    }

    #[test]
    fn terminal_output_prints_only_new_suffix() {
        let mut out = TerminalOutput::new(Vec::new());
        out.render("Hel");
        out.render("Hello");
        out.render("Hello, world");
        assert_eq!(out.printed(), "Hello, world".len());
        assert_eq!(String::from_utf8(out.into_inner()).expect("utf8"), "Hello, world");
    }

    #[test]
    fn terminal_output_reprints_when_text_does_not_extend() {
        let mut out = TerminalOutput::new(Vec::new());
        out.render("abcdef");
        out.render("xy");
        assert_eq!(String::from_utf8(out.into_inner()).expect("utf8"), "abcdef\nxy");
    }

    #[tokio::test]
    async fn file_player_writes_audio() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("speech.mp3");
        let player = FileAudioPlayer::new(path.clone(), Vec::new());
        player.play(speech(b"mp3")).await.expect("play");
        assert_eq!(std::fs::read(&path).expect("read back"), b"mp3");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_player_command_is_a_playback_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let player = FileAudioPlayer::new(dir.path().join("speech.mp3"), vec!["false".to_string()]);
        let err = player.play(speech(b"mp3")).await.expect_err("player fails");
        assert!(matches!(err, LlmError::Playback(_)));
    }
}
