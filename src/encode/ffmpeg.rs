use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Context as _;

use crate::animation::export::ExportedFrame;
use crate::foundation::core::Fps;
use crate::foundation::error::{VoisyncError, VoisyncResult};

#[derive(Clone, Debug, PartialEq)]
pub struct MuxConfig {
    pub fps: Fps,
    /// AAC bitrate passed to `-b:a`.
    pub audio_bitrate: String,
    pub overwrite: bool,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            fps: Fps::default(),
            audio_bitrate: "128k".to_string(),
            overwrite: true,
        }
    }
}

pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

pub fn ensure_parent_dir(path: &Path) -> VoisyncResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Owned handle to the system `ffmpeg` and a scratch directory for its inputs.
///
/// The scratch directory is removed by [`close`](Self::close) or on drop.
#[derive(Debug)]
pub struct FfmpegMuxer {
    cfg: MuxConfig,
    workdir: Option<PathBuf>,
}

impl FfmpegMuxer {
    pub fn new(cfg: MuxConfig) -> VoisyncResult<Self> {
        if !is_ffmpeg_on_path() {
            return Err(VoisyncError::encode(
                "ffmpeg is required for video export, but was not found on PATH",
            ));
        }
        static NEXT: AtomicU64 = AtomicU64::new(0);
        let workdir = std::env::temp_dir().join(format!(
            "voisync-mux-{}-{}",
            std::process::id(),
            NEXT.fetch_add(1, Ordering::Relaxed)
        ));
        std::fs::create_dir_all(&workdir)
            .with_context(|| format!("create mux scratch dir '{}'", workdir.display()))?;
        Ok(Self {
            cfg,
            workdir: Some(workdir),
        })
    }

    pub fn config(&self) -> &MuxConfig {
        &self.cfg
    }

    /// Interleave `frames` at the configured rate with optional WAV audio into `out`.
    pub fn mux(&self, frames: &[ExportedFrame], wav: Option<&[u8]>, out: &Path) -> VoisyncResult<()> {
        let workdir = self
            .workdir
            .as_deref()
            .ok_or_else(|| VoisyncError::encode("ffmpeg muxer is already closed"))?;
        let Some(first) = frames.first() else {
            return Err(VoisyncError::validation("cannot mux an empty frame sequence"));
        };
        if frames.iter().any(|f| f.format != first.format) {
            return Err(VoisyncError::validation(
                "all muxed frames must share one image format",
            ));
        }
        if !self.cfg.overwrite && out.exists() {
            return Err(VoisyncError::validation(format!(
                "output file '{}' already exists",
                out.display()
            )));
        }
        ensure_parent_dir(out)?;

        clear_dir(workdir)?;
        let ext = first.format.extension();
        for (i, frame) in frames.iter().enumerate() {
            let p = workdir.join(format!("frame{i:06}.{ext}"));
            std::fs::write(&p, &frame.data)
                .with_context(|| format!("write frame '{}'", p.display()))?;
        }
        let audio = match wav {
            Some(bytes) => {
                let p = workdir.join("audio.wav");
                std::fs::write(&p, bytes).with_context(|| format!("write '{}'", p.display()))?;
                Some(p)
            }
            None => None,
        };

        let fps = self.cfg.fps;
        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .args(["-loglevel", "error"])
            .arg("-framerate")
            .arg(format!("{}/{}", fps.num, fps.den))
            .arg("-i")
            .arg(workdir.join(format!("frame%06d.{ext}")));
        if let Some(audio) = &audio {
            cmd.arg("-i").arg(audio);
        }
        cmd.args([
            "-vf",
            "pad=ceil(iw/2)*2:ceil(ih/2)*2",
            "-c:v",
            "libx264",
            "-tune",
            "stillimage",
            "-preset",
            "ultrafast",
            "-pix_fmt",
            "yuv420p",
            "-crf",
            "28",
        ]);
        if audio.is_some() {
            cmd.args(["-c:a", "aac", "-b:a", &self.cfg.audio_bitrate, "-shortest"]);
        }
        cmd.arg(if self.cfg.overwrite { "-y" } else { "-n" }).arg(out);

        tracing::info!(frames = frames.len(), audio = audio.is_some(), out = %out.display(), "muxing video");
        let output = cmd.output().map_err(|e| {
            VoisyncError::encode(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VoisyncError::encode(format!(
                "ffmpeg exited with status {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        tracing::info!(out = %out.display(), "video written");
        Ok(())
    }

    /// Remove the scratch directory.
    pub fn close(mut self) -> VoisyncResult<()> {
        if let Some(dir) = self.workdir.take() {
            std::fs::remove_dir_all(&dir)
                .with_context(|| format!("remove mux scratch dir '{}'", dir.display()))?;
        }
        Ok(())
    }
}

impl Drop for FfmpegMuxer {
    fn drop(&mut self) {
        if let Some(dir) = self.workdir.take()
            && let Err(e) = std::fs::remove_dir_all(&dir)
        {
            tracing::warn!(dir = %dir.display(), error = %e, "failed to remove mux scratch dir");
        }
    }
}

fn clear_dir(dir: &Path) -> VoisyncResult<()> {
    for entry in std::fs::read_dir(dir).with_context(|| format!("list '{}'", dir.display()))? {
        let path = entry.context("read scratch dir entry")?.path();
        if path.is_file() {
            std::fs::remove_file(&path)
                .with_context(|| format!("remove stale '{}'", path.display()))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::export::FrameFormat;

    #[test]
    fn ensure_parent_dir_creates_nested_dirs() {
        let root = std::env::temp_dir().join(format!("voisync_parent_{}", std::process::id()));
        let out = root.join("a/b/out.mp4");
        ensure_parent_dir(&out).unwrap();
        assert!(root.join("a/b").is_dir());
        ensure_parent_dir(Path::new("bare.mp4")).unwrap();
        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn mux_rejects_bad_input_before_spawning() {
        if !is_ffmpeg_on_path() {
            return;
        }
        let muxer = FfmpegMuxer::new(MuxConfig::default()).unwrap();
        let out = std::env::temp_dir().join("voisync_never_written.mp4");
        assert!(muxer.mux(&[], None, &out).is_err());

        let mixed = [
            ExportedFrame {
                time: 0.0,
                duration: 0.1,
                format: FrameFormat::Png,
                data: Vec::new(),
            },
            ExportedFrame {
                time: 0.1,
                duration: 0.1,
                format: FrameFormat::Jpeg,
                data: Vec::new(),
            },
        ];
        assert!(muxer.mux(&mixed, None, &out).is_err());
        muxer.close().unwrap();
    }

    #[test]
    fn drop_removes_scratch_dir() {
        if !is_ffmpeg_on_path() {
            return;
        }
        let muxer = FfmpegMuxer::new(MuxConfig::default()).unwrap();
        let dir = muxer.workdir.clone().unwrap();
        assert!(dir.is_dir());
        drop(muxer);
        assert!(!dir.exists());
    }
}
