//! Workspace facade crate.
//!
//! Re-exports the workspace crates behind feature flags so host applications
//! can depend on `audiofile-workspace` alone. The `decoder-*` features select
//! which codecs `core-audiofile` is built with; `logging` pulls in the
//! subscriber setup from `core-runtime`.

#[cfg(any(
    feature = "decoder-all",
    feature = "decoder-mp3",
    feature = "decoder-flac",
    feature = "decoder-vorbis",
    feature = "decoder-aac",
    feature = "decoder-wav",
    feature = "decoder-alac",
))]
pub use core_audiofile as audiofile;

#[cfg(feature = "logging")]
pub use core_runtime as runtime;
