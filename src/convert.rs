// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use tokio::process::Command;

use crate::error::ConversionError;

/// Encoder settings for published audio, from the `[audio]` config section
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// Target bitrate in ffmpeg notation, e.g. `128k`
    pub bitrate: String,
    pub sample_rate: u32,
    pub channels: u8,
    /// Apply loudness normalization while transcoding
    pub normalize: bool,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            bitrate: "128k".to_string(),
            sample_rate: 44100,
            channels: 2,
            normalize: false,
        }
    }
}

/// Audio produced for publication
#[derive(Debug, Clone)]
pub struct ConvertedAudio {
    pub bytes: Bytes,
    pub size_bytes: u64,
    pub duration_ms: u64,
}

/// Audio conversion abstraction for testability
#[async_trait]
pub trait AudioConverter: Send + Sync {
    /// Produce publishable MP3 audio from `input`, staging it at `output`
    async fn convert(&self, input: &Path, output: &Path)
    -> Result<ConvertedAudio, ConversionError>;

    /// Duration of an audio file in milliseconds
    async fn probe_duration(&self, path: &Path) -> Result<u64, ConversionError>;
}

/// Converter shelling out to `ffmpeg` and `ffprobe`
///
/// MP3 input is published as-is; everything else is transcoded with the
/// configured settings.
#[derive(Debug, Clone)]
pub struct FfmpegConverter {
    settings: AudioSettings,
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl FfmpegConverter {
    /// Use `ffmpeg` and `ffprobe` from `PATH`
    pub fn new(settings: AudioSettings) -> Self {
        Self {
            settings,
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }

    /// Use explicit binary locations
    pub fn with_binaries(mut self, ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        self.ffmpeg = ffmpeg.into();
        self.ffprobe = ffprobe.into();
        self
    }

    fn transcode_args(&self, input: &Path, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-y", "-hide_banner", "-loglevel", "error", "-i"]
            .into_iter()
            .map(OsString::from)
            .collect();
        args.push(input.into());
        args.extend(
            [
                "-vn".to_string(),
                "-ar".to_string(),
                self.settings.sample_rate.to_string(),
                "-ac".to_string(),
                self.settings.channels.to_string(),
                "-b:a".to_string(),
                self.settings.bitrate.clone(),
            ]
            .into_iter()
            .map(OsString::from),
        );
        if self.settings.normalize {
            args.push("-af".into());
            args.push("loudnorm".into());
        }
        args.push("-f".into());
        args.push("mp3".into());
        args.push(output.into());
        args
    }

    async fn run(
        &self,
        tool: &'static str,
        binary: &Path,
        args: &[OsString],
        path: &Path,
    ) -> Result<String, ConversionError> {
        let output = Command::new(binary)
            .args(args)
            .output()
            .await
            .map_err(|e| ConversionError::ToolUnavailable { tool, source: e })?;

        if !output.status.success() {
            return Err(ConversionError::ToolFailed {
                tool,
                path: path.to_path_buf(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn is_mp3(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("mp3"))
}

/// Parse the seconds value printed by ffprobe into milliseconds
fn parse_probe_output(output: &str) -> Option<u64> {
    let seconds: f64 = output.trim().parse().ok()?;
    (seconds.is_finite() && seconds >= 0.0).then(|| (seconds * 1000.0).round() as u64)
}

#[async_trait]
impl AudioConverter for FfmpegConverter {
    async fn convert(
        &self,
        input: &Path,
        output: &Path,
    ) -> Result<ConvertedAudio, ConversionError> {
        if is_mp3(input) {
            tokio::fs::copy(input, output)
                .await
                .map_err(|e| ConversionError::WriteFailed {
                    path: output.to_path_buf(),
                    source: e,
                })?;
        } else {
            let args = self.transcode_args(input, output);
            self.run("ffmpeg", &self.ffmpeg, &args, input).await?;
        }

        let bytes = tokio::fs::read(output)
            .await
            .map_err(|e| ConversionError::ReadFailed {
                path: output.to_path_buf(),
                source: e,
            })?;
        let duration_ms = self.probe_duration(output).await?;

        Ok(ConvertedAudio {
            size_bytes: bytes.len() as u64,
            bytes: Bytes::from(bytes),
            duration_ms,
        })
    }

    async fn probe_duration(&self, path: &Path) -> Result<u64, ConversionError> {
        let args: Vec<OsString> = [
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ]
        .into_iter()
        .map(OsString::from)
        .chain(std::iter::once(path.as_os_str().to_os_string()))
        .collect();

        let stdout = self.run("ffprobe", &self.ffprobe, &args, path).await?;

        parse_probe_output(&stdout).ok_or_else(|| ConversionError::InvalidDuration {
            path: path.to_path_buf(),
            output: stdout.trim().to_string(),
        })
    }
}
