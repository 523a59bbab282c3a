//! # Audio File Handle
//!
//! [`AudioFile`] opens a file through a [`DecodeBackend`], reads its frames in
//! the caller's client format, tracks a frame cursor and reduces the file to a
//! waveform summary.
//!
//! ## Concurrency
//!
//! Reads, seeks and format changes take `&mut self`, so a single owner drives
//! the handle. The one concurrent activity is the asynchronous waveform
//! reduction: it holds the handle's internal lock for its whole scan, so reads
//! issued meanwhile wait until it finishes. Dropping the handle marks it closed;
//! an in-flight reduction stops at its next chunk and completes with a zeroed
//! summary.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use core_audiofile::{AudioFile, FormatDescriptor, OpenOptions};
//!
//! # fn main() -> core_audiofile::Result<()> {
//! let mut file = OpenOptions::new()
//!     .client_format(FormatDescriptor::linear_pcm(16_000.0, 1, 16, false, true))
//!     .open("speech.flac")?;
//!
//! loop {
//!     let read = file.read_frames(4096)?;
//!     // read.buffer holds 16-bit mono samples
//!     if read.reached_end {
//!         break;
//!     }
//! }
//!
//! let waveform = file.waveform_data();
//! assert_eq!(waveform.points_per_channel, 1024);
//! # Ok(())
//! # }
//! ```

use crate::buffer::PcmBuffer;
use crate::config::AudioFileConfig;
use crate::convert::{FormatConverter, SourceWindow};
use crate::decoder::{DecodeBackend, DecodeSession, SessionInfo, SymphoniaBackend};
use crate::error::{AudioFileError, Result};
use crate::format::{FilePermission, FormatDescriptor};
use crate::notifier::{AudioFileObserver, EventNotifier};
use crate::runner::{Completion, TaskRunner};
use crate::waveform::{FloatChunk, FrameSource, WaveformReducer, WaveformSummary};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

// ============================================================================
// Open Options
// ============================================================================

/// Builder for opening or creating an [`AudioFile`].
#[derive(Clone, Default)]
pub struct OpenOptions {
    permission: FilePermission,
    file_format: Option<FormatDescriptor>,
    client_format: Option<FormatDescriptor>,
    observer: Option<Arc<dyn AudioFileObserver>>,
    backend: Option<Arc<dyn DecodeBackend>>,
    runner: Option<TaskRunner>,
    config: AudioFileConfig,
}

impl OpenOptions {
    /// Read-only options with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Access mode; `Write`/`ReadWrite` create the file when it is missing.
    pub fn permission(mut self, permission: FilePermission) -> Self {
        self.permission = permission;
        self
    }

    /// Format of a newly created file. Ignored when the file already exists.
    pub fn file_format(mut self, format: FormatDescriptor) -> Self {
        self.file_format = Some(format);
        self
    }

    /// Format reads are delivered in. Defaults to the configured client format.
    pub fn client_format(mut self, format: FormatDescriptor) -> Self {
        self.client_format = Some(format);
        self
    }

    /// Register an observer at open time.
    pub fn observer(mut self, observer: &Arc<dyn AudioFileObserver>) -> Self {
        self.observer = Some(Arc::clone(observer));
        self
    }

    /// Decode backend. Defaults to [`SymphoniaBackend`].
    pub fn backend(mut self, backend: Arc<dyn DecodeBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Executor for asynchronous waveform reduction.
    pub fn runner(mut self, runner: TaskRunner) -> Self {
        self.runner = Some(runner);
        self
    }

    /// Handle configuration.
    pub fn config(mut self, config: AudioFileConfig) -> Self {
        self.config = config;
        self
    }

    /// Open `path` with these options.
    pub fn open(self, path: impl AsRef<Path>) -> Result<AudioFile> {
        AudioFile::open_with(path, self)
    }
}

// ============================================================================
// Read Result
// ============================================================================

/// Outcome of [`AudioFile::read_frames`].
#[derive(Debug, Clone, PartialEq)]
pub struct ReadResult {
    /// Frames in the client format
    pub buffer: PcmBuffer,
    /// Frames delivered
    pub frames_read: u32,
    /// Fewer frames than requested were available
    pub reached_end: bool,
}

// ============================================================================
// Handle State
// ============================================================================

struct Shared {
    state: Mutex<FileState>,
    closed: Arc<AtomicBool>,
    /// Client channel count, readable without taking `state`
    client_channels: AtomicU32,
}

/// Decode session plus the conversion and cursor state guarded by the handle lock.
struct FileState {
    session: Box<dyn DecodeSession>,
    info: SessionInfo,
    converter: FormatConverter,
    window: SourceWindow,
    /// Next client frame to read
    cursor: u64,
    closed: Arc<AtomicBool>,
}

impl FileState {
    fn new(session: Box<dyn DecodeSession>, client: &FormatDescriptor, closed: Arc<AtomicBool>) -> Result<Self> {
        let info = session.info();
        let converter = FormatConverter::negotiate(&info.format, client)?;
        let window = SourceWindow::new(info.format.channel_count as usize);

        Ok(Self {
            session,
            info,
            converter,
            window,
            cursor: 0,
            closed,
        })
    }

    fn total_client_frames(&self) -> u64 {
        self.converter.client_frames(self.info.total_frames)
    }

    fn client_channels(&self) -> usize {
        self.converter.client_format().channel_count as usize
    }

    /// Read up to `requested` client frames as float planes and advance the cursor.
    fn read_float(&mut self, requested: usize) -> Result<FloatChunk> {
        if self.closed.load(Ordering::Acquire) {
            return Err(AudioFileError::HandleClosed);
        }

        let total = self.total_client_frames();
        let want = (requested as u64).min(total.saturating_sub(self.cursor)) as usize;

        if want == 0 {
            return Ok(FloatChunk {
                channels: vec![Vec::new(); self.client_channels()],
                frames: 0,
                reached_end: requested > 0 || self.cursor >= total,
            });
        }

        let (first, last) = self
            .converter
            .source_span(self.cursor, want as u64, self.info.total_frames);
        self.fill_window(first, last);

        let channels = self.converter.render(&self.window, self.cursor, want);
        let frames = channels.first().map_or(0, Vec::len);

        if frames == 0 {
            if let Some(reason) = self.window.failure() {
                return Err(AudioFileError::DecodeIo(reason.to_string()));
            }
        }

        self.cursor += frames as u64;

        Ok(FloatChunk {
            channels,
            frames,
            reached_end: frames < requested,
        })
    }

    /// Make native frames `[first, last]` available in the window.
    fn fill_window(&mut self, first: u64, last: u64) {
        if self.window.can_continue_from(first) {
            self.window.discard_before(first);
        } else {
            debug!("Repositioning decode session to native frame {}", first);
            self.window.reset(first);
            if let Err(e) = self.session.seek(first) {
                warn!("Session seek to {} failed: {}", first, e);
                self.window.mark_failed(e.to_string());
                return;
            }
        }

        while self.window.end() <= last && !self.window.is_exhausted() {
            match self.session.next_chunk() {
                Ok(Some(chunk)) => self.window.append(chunk),
                Ok(None) => self.window.mark_exhausted(),
                Err(e) => {
                    warn!("Decoding stopped at native frame {}: {}", self.window.end(), e);
                    self.window.mark_failed(e.to_string());
                }
            }
        }
    }
}

impl FrameSource for FileState {
    fn channel_count(&self) -> usize {
        self.client_channels()
    }

    fn total_frames(&self) -> u64 {
        self.total_client_frames()
    }

    fn position(&self) -> u64 {
        self.cursor
    }

    fn seek_to(&mut self, frame: u64) -> Result<()> {
        self.cursor = frame;
        Ok(())
    }

    fn read_chunk(&mut self, max_frames: usize) -> Result<FloatChunk> {
        self.read_float(max_frames)
    }
}

// ============================================================================
// Audio File
// ============================================================================

/// An open audio file.
///
/// Reads deliver frames in the client format regardless of the file's native
/// encoding. The cursor counts client frames.
pub struct AudioFile {
    shared: Arc<Shared>,
    notifier: EventNotifier,
    url: PathBuf,
    permission: FilePermission,
    runner: TaskRunner,
    config: AudioFileConfig,
}

impl AudioFile {
    /// Open an existing file for reading in the default client format.
    ///
    /// # Errors
    ///
    /// - [`AudioFileError::FileNotFound`] if `path` does not exist
    /// - [`AudioFileError::PermissionDenied`] if it cannot be read
    /// - [`AudioFileError::UnsupportedFormat`] if no decoder handles it
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, OpenOptions::new())
    }

    /// Open or create a file with explicit options.
    #[instrument(skip(path, options), fields(path = %path.as_ref().display(), permission = ?options.permission))]
    pub fn open_with(path: impl AsRef<Path>, options: OpenOptions) -> Result<Self> {
        let path = path.as_ref();
        options.config.validate()?;

        let backend = options
            .backend
            .unwrap_or_else(|| Arc::new(SymphoniaBackend::new()));
        let client = options
            .client_format
            .unwrap_or_else(|| options.config.default_client_format.clone());

        let session = if options.permission.can_write() && !path.exists() {
            let format = options.file_format.unwrap_or_else(|| client.clone());
            info!("Creating new audio file");
            backend.create(path, &format)?
        } else {
            if options.permission.can_write() {
                ensure_writable(path)?;
            }
            backend.open(path)?
        };

        let closed = Arc::new(AtomicBool::new(false));
        let state = FileState::new(session, &client, Arc::clone(&closed))?;

        info!(
            "Opened audio file: {} frames at {}Hz, {} channels",
            state.info.total_frames, state.info.format.sample_rate, state.info.format.channel_count
        );

        let client_channels = AtomicU32::new(state.converter.client_format().channel_count);

        let mut notifier = EventNotifier::new();
        if let Some(observer) = &options.observer {
            notifier.set_observer(observer);
        }

        Ok(Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                closed,
                client_channels,
            }),
            notifier,
            url: path.to_path_buf(),
            permission: options.permission,
            runner: options.runner.unwrap_or_default(),
            config: options.config,
        })
    }

    // ------------------------------------------------------------------------
    // Reading
    // ------------------------------------------------------------------------

    /// Read up to `frame_count` frames from the cursor in the client format.
    ///
    /// Asking for more frames than remain is not an error: the read is
    /// truncated and `reached_end` is set. A decode failure after some frames
    /// were produced also truncates the read.
    ///
    /// # Errors
    ///
    /// [`AudioFileError::DecodeIo`] if the session fails before delivering any
    /// frame. Only the position notification fires then, with the unchanged
    /// cursor.
    pub fn read_frames(&mut self, frame_count: u32) -> Result<ReadResult> {
        let outcome = {
            let mut state = self.shared.state.lock();
            match state.read_float(frame_count as usize) {
                Ok(chunk) => {
                    let buffer = state.converter.encode(&chunk.channels, frame_count);
                    Ok((chunk, buffer, state.cursor))
                }
                Err(e) => Err((e, state.cursor)),
            }
        };

        let (chunk, buffer, position) = match outcome {
            Ok(read) => read,
            Err((e, position)) => {
                self.notifier.notify_position(position);
                return Err(e);
            }
        };

        let channel_count = buffer.format().channel_count;
        self.notifier
            .notify_read(&chunk.channels, chunk.frames as u32, channel_count);
        self.notifier.notify_position(position);

        Ok(ReadResult {
            frames_read: chunk.frames as u32,
            reached_end: chunk.reached_end,
            buffer,
        })
    }

    /// Move the cursor to client frame `frame`.
    ///
    /// No range check is applied; reading past the end simply returns zero
    /// frames. The decode session is repositioned lazily by the next read.
    pub fn seek(&mut self, frame: u64) {
        self.shared.state.lock().cursor = frame;
        debug!("Cursor moved to frame {}", frame);
        self.notifier.notify_position(frame);
    }

    /// Change the format subsequent reads are delivered in.
    ///
    /// The cursor keeps its value.
    ///
    /// # Errors
    ///
    /// [`AudioFileError::InvalidClientFormat`] if `format` is not a valid
    /// linear PCM client format; the previous format stays in effect.
    pub fn set_client_format(&mut self, format: FormatDescriptor) -> Result<()> {
        let mut state = self.shared.state.lock();
        state.converter = FormatConverter::negotiate(&state.info.format, &format)?;
        self.shared
            .client_channels
            .store(format.channel_count, Ordering::Release);
        debug!("Client format changed to {:?}", format);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Observer
    // ------------------------------------------------------------------------

    /// Register `observer`, replacing any previous one. It is held weakly.
    pub fn set_observer(&mut self, observer: &Arc<dyn AudioFileObserver>) {
        self.notifier.set_observer(observer);
    }

    /// Remove the observer.
    pub fn clear_observer(&mut self) {
        self.notifier.clear_observer();
    }

    // ------------------------------------------------------------------------
    // Waveform
    // ------------------------------------------------------------------------

    /// Waveform at the configured default resolution.
    pub fn waveform_data(&self) -> WaveformSummary {
        self.waveform_data_with_points(self.config.waveform_points)
    }

    /// Reduce the file to `points` values per channel.
    ///
    /// The cursor is unchanged afterwards and no observer callbacks fire.
    pub fn waveform_data_with_points(&self, points: usize) -> WaveformSummary {
        let reducer = WaveformReducer::from_config(&self.config);
        let mut state = self.shared.state.lock();
        reducer.reduce(&mut *state, points)
    }

    /// [`waveform_data`](Self::waveform_data) computed off the calling thread.
    pub fn waveform_data_async<F>(&self, completion: F)
    where
        F: FnOnce(WaveformSummary) + Send + 'static,
    {
        self.waveform_data_async_with_points(self.config.waveform_points, completion);
    }

    /// [`waveform_data_with_points`](Self::waveform_data_with_points) computed
    /// off the calling thread.
    ///
    /// `completion` runs exactly once, on the executor's thread. If the handle
    /// is dropped before the scan finishes, or the scan cannot run, it receives
    /// a zeroed summary.
    pub fn waveform_data_async_with_points<F>(&self, points: usize, completion: F)
    where
        F: FnOnce(WaveformSummary) + Send + 'static,
    {
        let channels = self.shared.client_channels.load(Ordering::Acquire) as usize;
        let reducer = WaveformReducer::from_config(&self.config);
        let shared = Arc::clone(&self.shared);

        let completion = Completion::new(completion, move || {
            WaveformSummary::zeroed(channels, points)
        });

        self.runner.submit(
            move || {
                if shared.closed.load(Ordering::Acquire) {
                    return WaveformSummary::zeroed(channels, points);
                }
                let mut state = shared.state.lock();
                reducer.reduce(&mut *state, points)
            },
            completion,
        );
    }

    // ------------------------------------------------------------------------
    // Getters
    // ------------------------------------------------------------------------

    /// Path the handle was opened with.
    pub fn url(&self) -> &Path {
        &self.url
    }

    /// Access mode the handle was opened with.
    pub fn permission(&self) -> FilePermission {
        self.permission
    }

    /// Configuration in effect.
    pub fn config(&self) -> &AudioFileConfig {
        &self.config
    }

    /// Native format of the file.
    pub fn file_format(&self) -> FormatDescriptor {
        self.shared.state.lock().info.format.clone()
    }

    /// Format reads are delivered in.
    pub fn client_format(&self) -> FormatDescriptor {
        self.shared.state.lock().converter.client_format().clone()
    }

    /// Frames in the native format.
    pub fn total_frames(&self) -> u64 {
        self.shared.state.lock().info.total_frames
    }

    /// Frames as read in the client format.
    pub fn total_client_frames(&self) -> u64 {
        self.shared.state.lock().total_client_frames()
    }

    /// Playing time of the file.
    pub fn total_duration(&self) -> Duration {
        let state = self.shared.state.lock();
        let rate = state.info.format.sample_rate;
        if rate > 0.0 {
            Duration::from_secs_f64(state.info.total_frames as f64 / rate)
        } else {
            Duration::ZERO
        }
    }

    /// Tags embedded in the container.
    pub fn metadata(&self) -> HashMap<String, String> {
        self.shared.state.lock().info.metadata.clone()
    }

    /// Current cursor in client frames.
    pub fn frame_index(&self) -> u64 {
        self.shared.state.lock().cursor
    }
}

impl Drop for AudioFile {
    fn drop(&mut self) {
        self.shared.closed.store(true, Ordering::Release);
        debug!("Closed audio file {}", self.url.display());
    }
}

impl std::fmt::Debug for AudioFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioFile")
            .field("url", &self.url)
            .field("permission", &self.permission)
            .field("notifier", &self.notifier)
            .finish_non_exhaustive()
    }
}

fn ensure_writable(path: &Path) -> Result<()> {
    std::fs::OpenOptions::new()
        .write(true)
        .open(path)
        .map(drop)
        .map_err(|e| AudioFileError::from_open_io(path, e))
}
