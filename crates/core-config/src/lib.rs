//! Configuration loading and parsing.
//!
//! Parses `glint.toml` (or an override path provided by the binary)
//! extracting frame pacing and render tuning knobs. Raw parsed values are
//! retained; clamping to the supported ranges happens in `Config::apply` so
//! out-of-range values can be logged with both the raw and effective numbers.
//!
//! Unknown fields are ignored (TOML deserialization tolerance) to allow
//! forward evolution without immediate warnings. A missing or unparsable
//! file yields defaults rather than an error.

use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::{info, warn};

/// Supported range for `frame.max_deferral_ms`.
const MAX_DEFERRAL_RANGE: (u64, u64) = (1, 1000);
/// Supported range for `frame.tick_ms`.
const TICK_RANGE: (u64, u64) = (16, 10_000);

#[derive(Debug, Deserialize, Clone)]
pub struct FrameConfig {
    /// Longest time a requested render may be deferred for coalescing.
    #[serde(default = "FrameConfig::default_max_deferral_ms")]
    pub max_deferral_ms: u64,
    /// Interval of the periodic tick event.
    #[serde(default = "FrameConfig::default_tick_ms")]
    pub tick_ms: u64,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_deferral_ms: Self::default_max_deferral_ms(),
            tick_ms: Self::default_tick_ms(),
        }
    }
}

impl FrameConfig {
    const fn default_max_deferral_ms() -> u64 {
        33
    }
    const fn default_tick_ms() -> u64 {
        250
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RenderConfig {
    /// Skip repainting the status row when its text is unchanged.
    #[serde(default = "RenderConfig::default_status_skip")]
    pub status_skip: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            status_skip: Self::default_status_skip(),
        }
    }
}

impl RenderConfig {
    const fn default_status_skip() -> bool {
        true
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ConfigFile {
    #[serde(default)]
    pub frame: FrameConfig,
    #[serde(default)]
    pub render: RenderConfig,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Original file string, when a file was read.
    pub raw: Option<String>,
    /// Parsed (or default) data, pre-clamp.
    pub file: ConfigFile,
    effective_max_deferral_ms: u64,
    effective_tick_ms: u64,
}

fn clamp_logged(name: &'static str, raw: u64, range: (u64, u64)) -> u64 {
    let clamped = raw.clamp(range.0, range.1);
    if clamped != raw {
        info!(
            target: "config",
            field = name,
            raw,
            clamped,
            min = range.0,
            max = range.1,
            "value_clamped"
        );
    }
    clamped
}

/// Best-effort config path following platform conventions (XDG / AppData
/// Roaming), preferring a local `glint.toml` in the working directory.
pub fn discover() -> PathBuf {
    let local = PathBuf::from("glint.toml");
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("glint").join("glint.toml");
    }
    PathBuf::from("glint.toml")
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    let mut config = if let Ok(content) = fs::read_to_string(&path) {
        match toml::from_str::<ConfigFile>(&content) {
            Ok(file) => Config {
                raw: Some(content),
                file,
                effective_max_deferral_ms: 0,
                effective_tick_ms: 0,
            },
            Err(error) => {
                warn!(target: "config", path = %path.display(), %error, "parse_failed_using_defaults");
                Config::default()
            }
        }
    } else {
        Config::default()
    };
    config.apply();
    Ok(config)
}

impl Config {
    /// Clamp raw values into their supported ranges.
    pub fn apply(&mut self) {
        self.effective_max_deferral_ms = clamp_logged(
            "frame.max_deferral_ms",
            self.file.frame.max_deferral_ms,
            MAX_DEFERRAL_RANGE,
        );
        self.effective_tick_ms = clamp_logged("frame.tick_ms", self.file.frame.tick_ms, TICK_RANGE);
    }

    pub fn max_deferral(&self) -> Duration {
        Duration::from_millis(self.effective_max_deferral_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.effective_tick_ms)
    }

    pub fn status_skip(&self) -> bool {
        self.file.render.status_skip
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex, MutexGuard};
    use tracing::Level;
    use tracing::subscriber::with_default;
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone)]
    struct BufferWriter {
        inner: Arc<Mutex<Vec<u8>>>,
    }

    impl BufferWriter {
        fn new() -> (Self, Arc<Mutex<Vec<u8>>>) {
            let buf = Arc::new(Mutex::new(Vec::new()));
            (Self { inner: buf.clone() }, buf)
        }
    }

    struct LockedWriter<'a> {
        guard: MutexGuard<'a, Vec<u8>>,
    }

    impl<'a> Write for LockedWriter<'a> {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.guard.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for BufferWriter {
        type Writer = LockedWriter<'a>;

        fn make_writer(&'a self) -> Self::Writer {
            LockedWriter {
                guard: self.inner.lock().expect("log buffer poisoned"),
            }
        }
    }

    #[test]
    fn default_config_when_missing_file() {
        let cfg = load_from(Some(PathBuf::from("__nonexistent_hopefully__.toml"))).unwrap();
        assert_eq!(cfg.max_deferral(), Duration::from_millis(33));
        assert_eq!(cfg.tick_interval(), Duration::from_millis(250));
        assert!(cfg.status_skip());
    }

    #[test]
    fn parses_frame_and_render_values() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            tmp.path(),
            "[frame]\nmax_deferral_ms = 16\ntick_ms = 500\n[render]\nstatus_skip = false\n",
        )
        .unwrap();
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(cfg.max_deferral(), Duration::from_millis(16));
        assert_eq!(cfg.tick_interval(), Duration::from_millis(500));
        assert!(!cfg.status_skip());
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "[frame]\nmax_deferral_ms = 0\ntick_ms = 99999\n").unwrap();
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(cfg.max_deferral(), Duration::from_millis(1));
        assert_eq!(cfg.tick_interval(), Duration::from_millis(10_000));
        // Raw values survive for future re-clamping.
        assert_eq!(cfg.file.frame.max_deferral_ms, 0);
        assert_eq!(cfg.file.frame.tick_ms, 99_999);
    }

    #[test]
    fn unparsable_file_falls_back_to_defaults() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "frame = \"not a table\"\n").unwrap();
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(cfg.max_deferral(), Duration::from_millis(33));
        assert!(cfg.raw.is_none());
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "[frame]\ntick_ms = 300\n[future]\nknob = 1\n").unwrap();
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(cfg.tick_interval(), Duration::from_millis(300));
    }

    #[test]
    fn clamp_logging_uses_config_target() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "[frame]\nmax_deferral_ms = 5000\n").unwrap();
        let (writer, buffer) = BufferWriter::new();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(Level::INFO)
            .with_target(true)
            .with_ansi(false)
            .without_time()
            .with_writer(writer)
            .finish();

        let cfg = with_default(subscriber, || {
            load_from(Some(tmp.path().to_path_buf())).unwrap()
        });

        let log_output = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
        assert!(log_output.contains("INFO config:"));
        assert!(log_output.contains("value_clamped"));
        assert_eq!(cfg.max_deferral(), Duration::from_millis(1000));
    }
}
