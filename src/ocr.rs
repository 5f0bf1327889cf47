//! Optical character recognition.
//!
//! Uploaded images are piped through a Tesseract binary; the recognised text
//! is handed to the LLM for explanation.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::language;

#[async_trait]
pub trait OcrProvider: Send + Sync {
    /// Returns the text found in `image`. `language_code` selects the
    /// recognition language.
    async fn extract_text(&self, image: &[u8], mime: &str, language_code: &str) -> Result<String>;
}

pub struct TesseractOcr {
    command: String,
}

impl TesseractOcr {
    pub fn new(command: impl Into<String>) -> Self {
        Self { command: command.into() }
    }
}

#[async_trait]
impl OcrProvider for TesseractOcr {
    async fn extract_text(&self, image: &[u8], mime: &str, language_code: &str) -> Result<String> {
        let packs = language::ocr_packs_for(language_code);
        log::info!(
            "Running OCR on {} bytes ({}) with language packs {}",
            image.len(),
            mime,
            packs
        );

        let mut child = Command::new(&self.command)
            .args(["stdin", "stdout", "-l", &packs])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start OCR command '{}'", self.command))?;

        let mut stdin = child.stdin.take().context("OCR process has no stdin")?;
        stdin.write_all(image).await.context("Failed to write image to OCR process")?;
        drop(stdin);

        let output = child
            .wait_with_output()
            .await
            .context("Failed to wait for OCR process")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            log::error!("OCR command exited with {}: {}", output.status, stderr.trim());
            anyhow::bail!("OCR command exited with {}", output.status);
        }

        Ok(normalize_text(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Trims trailing spaces, drops form feeds and collapses runs of blank lines.
pub fn normalize_text(raw: &str) -> String {
    let cleaned = raw.replace('\u{c}', "");
    let mut lines: Vec<&str> = Vec::new();
    for line in cleaned.lines() {
        let line = line.trim_end();
        if line.is_empty() && lines.last().map_or(true, |prev| prev.is_empty()) {
            continue;
        }
        lines.push(line);
    }
    lines.join("\n").trim().to_string()
}
