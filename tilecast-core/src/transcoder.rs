//! ffmpeg-backed crop and encode capabilities.
//!
//! Every call spawns one child with piped stdio. The child's stdout is the
//! returned stream, stderr is forwarded to the log, and a background task
//! reaps the child once it exits. Dropping the returned stream before the
//! child finishes kills it.

use std::{
    fmt,
    pin::Pin,
    process::Stdio,
    sync::Arc,
    task::{Context, Poll},
};

use async_trait::async_trait;
use tilecast_model::{CropGeometry, EncodeDims};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader, ReadBuf},
    process::{Child, ChildStdout, Command},
};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, warn};

use crate::{
    error::TranscodeError,
    ports::{TileStreamer, VideoEncoder},
    stream::{ByteStream, boxed},
};

type ArgsBuilder<T> = Arc<dyn Fn(&T) -> Vec<String> + Send + Sync>;

/// Spawns `program` (normally `ffmpeg`) for crops and encodes.
#[derive(Clone)]
pub struct FfmpegTranscoder {
    program: String,
    crop_args: ArgsBuilder<CropGeometry>,
    encode_args: ArgsBuilder<EncodeDims>,
}

impl fmt::Debug for FfmpegTranscoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FfmpegTranscoder")
            .field("program", &self.program)
            .finish_non_exhaustive()
    }
}

impl FfmpegTranscoder {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            crop_args: Arc::new(crop_args),
            encode_args: Arc::new(encode_args),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Replace the argument list used for crop invocations.
    pub fn with_crop_args<F>(mut self, builder: F) -> Self
    where
        F: Fn(&CropGeometry) -> Vec<String> + Send + Sync + 'static,
    {
        self.crop_args = Arc::new(builder);
        self
    }

    /// Replace the argument list used for encode invocations.
    pub fn with_encode_args<F>(mut self, builder: F) -> Self
    where
        F: Fn(&EncodeDims) -> Vec<String> + Send + Sync + 'static,
    {
        self.encode_args = Arc::new(builder);
        self
    }

    fn spawn(
        &self,
        stage: &'static str,
        args: Vec<String>,
        input: Option<ByteStream>,
    ) -> Result<ByteStream, TranscodeError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&args)
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(stage, program = %self.program, ?args, "spawning transcoder");

        let mut child = cmd.spawn().map_err(|source| {
            error!(stage, program = %self.program, error = %source, "failed to spawn transcoder");
            TranscodeError::Spawn {
                program: self.program.clone(),
                source,
            }
        })?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if line.contains("error") || line.contains("Error") {
                        error!(stage, "ffmpeg: {line}");
                    } else {
                        debug!(stage, "ffmpeg: {line}");
                    }
                }
            });
        }

        let Some(stdout) = child.stdout.take() else {
            // Dropping the child kills it.
            return Err(TranscodeError::MissingStdout(stage.to_string()));
        };

        if let (Some(mut src), Some(mut stdin)) = (input, child.stdin.take()) {
            tokio::spawn(async move {
                match tokio::io::copy(&mut src, &mut stdin).await {
                    Ok(bytes) => debug!(stage, bytes, "transcoder input drained"),
                    // Usually a broken pipe after the child gave up.
                    Err(err) => warn!(stage, error = %err, "failed to feed transcoder input"),
                }
                let _ = stdin.shutdown().await;
            });
        }

        let released = CancellationToken::new();
        tokio::spawn(reap(stage, child, released.clone()));

        Ok(boxed(ChildOutput {
            stdout,
            _release: released.drop_guard(),
        }))
    }
}

/// Wait for the child to exit. If its output is dropped first, kill it.
async fn reap(stage: &'static str, mut child: Child, released: CancellationToken) {
    let exited = tokio::select! {
        status = child.wait() => Some(status),
        _ = released.cancelled() => None,
    };

    let status = match exited {
        Some(status) => status,
        None => {
            if let Ok(None) = child.try_wait() {
                debug!(stage, "output dropped before exit, killing transcoder");
                let _ = child.start_kill();
            }
            child.wait().await
        }
    };

    match status {
        Ok(status) if status.success() => debug!(stage, "transcoder exited"),
        Ok(status) => warn!(stage, %status, "transcoder exited unsuccessfully"),
        Err(err) => error!(stage, error = %err, "failed to wait for transcoder"),
    }
}

struct ChildOutput {
    stdout: ChildStdout,
    _release: DropGuard,
}

impl AsyncRead for ChildOutput {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.stdout).poll_read(cx, buf)
    }
}

/// `-i <input> -f rawvideo -vf crop=...[a];[a]format=pix_fmts=yuv420p pipe:`
pub fn crop_args(geometry: &CropGeometry) -> Vec<String> {
    vec![
        "-i".into(),
        geometry.input_path.clone(),
        "-f".into(),
        "rawvideo".into(),
        "-vf".into(),
        format!(
            "crop=w={}:h={}:x={}:y={}[a];[a]format=pix_fmts=yuv420p",
            geometry.width, geometry.height, geometry.x, geometry.y
        ),
        "pipe:".into(),
    ]
}

/// Raw yuv420p on stdin, grayscale zero-latency x264 in MPEG-TS on stdout.
pub fn encode_args(dims: &EncodeDims) -> Vec<String> {
    vec![
        "-f".into(),
        "rawvideo".into(),
        "-pixel_format".into(),
        "yuv420p".into(),
        "-video_size".into(),
        format!("{}x{}", dims.width, dims.height),
        "-i".into(),
        "pipe:".into(),
        "-vf".into(),
        "hue=s=0".into(),
        "-vcodec".into(),
        "libx264".into(),
        "-tune".into(),
        "zerolatency".into(),
        "-preset".into(),
        "ultrafast".into(),
        "-f".into(),
        "mpegts".into(),
        "pipe:1".into(),
    ]
}

#[async_trait]
impl TileStreamer for FfmpegTranscoder {
    async fn open_crop_stream(
        &self,
        geometry: &CropGeometry,
    ) -> Result<ByteStream, TranscodeError> {
        self.spawn("crop", (self.crop_args)(geometry), None)
    }
}

#[async_trait]
impl VideoEncoder for FfmpegTranscoder {
    async fn encode(
        &self,
        input: ByteStream,
        dims: EncodeDims,
    ) -> Result<ByteStream, TranscodeError> {
        self.spawn("encode", (self.encode_args)(&dims), Some(input))
    }
}
