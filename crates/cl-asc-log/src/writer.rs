//! ASC log writer with size-based rotation.

use std::fmt::{self, Write as _};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Local;
use serde::Deserialize;

use cl_canbus::CanFrame;

use crate::error::{LogError, LogResult};

/// Default rotation threshold: 1 MiB.
pub const DEFAULT_SIZE_LIMIT: u64 = 1024 * 1024;

/// Frame direction relative to this node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Rx,
    Tx,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Rx => "Rx",
            Self::Tx => "Tx",
        })
    }
}

/// Where and how large log files are written.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LogSettings {
    /// Directory receiving the log files (created if missing).
    #[serde(default = "default_directory")]
    pub directory: PathBuf,
    /// File name prefix; files are `<prefix>_NNN.asc`.
    #[serde(default = "default_prefix")]
    pub file_prefix: String,
    /// Rotate once a file reaches this many bytes.
    #[serde(default = "default_size_limit")]
    pub size_limit_bytes: u64,
}

fn default_directory() -> PathBuf {
    PathBuf::from(".")
}

fn default_prefix() -> String {
    "canlog".to_string()
}

fn default_size_limit() -> u64 {
    DEFAULT_SIZE_LIMIT
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            file_prefix: default_prefix(),
            size_limit_bytes: default_size_limit(),
        }
    }
}

impl LogSettings {
    fn path_for(&self, index: u32) -> PathBuf {
        self.directory
            .join(format!("{}_{index:03}.asc", self.file_prefix))
    }
}

/// Appends CAN frame records to rotating `.asc` files.
pub struct AscLogWriter {
    settings: LogSettings,
    index: u32,
    path: PathBuf,
    out: BufWriter<File>,
    /// Record timestamps are relative to this instant (reset on rotation).
    started: Instant,
    bytes_written: u64,
}

impl AscLogWriter {
    /// Open the first log file (`<prefix>_000.asc`) and write its header.
    pub fn create(settings: LogSettings) -> LogResult<Self> {
        if settings.file_prefix.is_empty() {
            return Err(LogError::Settings("file_prefix is empty".into()));
        }
        if settings.size_limit_bytes == 0 {
            return Err(LogError::Settings("size_limit_bytes must be > 0".into()));
        }
        fs::create_dir_all(&settings.directory)
            .map_err(|e| LogError::Io(format!("{}: {e}", settings.directory.display())))?;

        let path = settings.path_for(0);
        let out = open_file(&path)?;
        let mut writer = Self {
            settings,
            index: 0,
            path,
            out,
            started: Instant::now(),
            bytes_written: 0,
        };
        writer.write_header()?;
        tracing::info!(path = %writer.path.display(), "CAN log file opened");
        Ok(writer)
    }

    pub fn current_path(&self) -> &Path {
        &self.path
    }

    /// Index of the current file (0 for `_000`).
    pub fn rotation_index(&self) -> u32 {
        self.index
    }

    /// Bytes written to the current file, header included.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Append one data record: `<secs> <channel> <ID> <dir> d <dlc> XX ...`.
    ///
    /// At most `dlc` bytes of `data` are written.
    pub fn log_frame(
        &mut self,
        id: u32,
        direction: Direction,
        channel: u8,
        dlc: u8,
        data: &[u8],
    ) -> LogResult<()> {
        let n = usize::from(dlc).min(data.len());
        self.write_record(&format!("{id:X}"), direction, channel, 'd', dlc, &data[..n])
    }

    /// Append a decoded frame. Extended IDs get an `x` suffix and remote
    /// frames are written with the `r` marker and no data bytes. Error
    /// frames become a bare `ErrorFrame` event on the channel.
    pub fn log_can_frame(
        &mut self,
        frame: &CanFrame,
        direction: Direction,
        channel: u8,
    ) -> LogResult<()> {
        if frame.error {
            let elapsed = self.started.elapsed().as_secs_f64();
            return self.append_line(format!("{elapsed:.6} {channel} ErrorFrame\n"));
        }
        let id = if frame.extended {
            format!("{:X}x", frame.id)
        } else {
            format!("{:X}", frame.id)
        };
        let marker = if frame.remote { 'r' } else { 'd' };
        self.write_record(&id, direction, channel, marker, frame.dlc, frame.payload())
    }

    fn write_record(
        &mut self,
        id: &str,
        direction: Direction,
        channel: u8,
        marker: char,
        dlc: u8,
        data: &[u8],
    ) -> LogResult<()> {
        let elapsed = self.started.elapsed().as_secs_f64();
        let mut line = format!("{elapsed:.6} {channel} {id} {direction} {marker} {dlc}");
        for byte in data {
            // Writing into a String cannot fail.
            let _ = write!(line, " {byte:02X}");
        }
        line.push('\n');
        self.append_line(line)
    }

    fn append_line(&mut self, line: String) -> LogResult<()> {
        self.write_str(&line)?;
        if self.bytes_written >= self.settings.size_limit_bytes {
            self.rotate()?;
        }
        Ok(())
    }

    /// Flush buffered records to disk.
    pub fn flush(&mut self) -> LogResult<()> {
        self.out
            .flush()
            .map_err(|e| LogError::Io(format!("{}: {e}", self.path.display())))
    }

    fn rotate(&mut self) -> LogResult<()> {
        self.flush()?;
        self.index += 1;
        self.path = self.settings.path_for(self.index);
        self.out = open_file(&self.path)?;
        self.bytes_written = 0;
        self.started = Instant::now();
        self.write_header()?;
        tracing::info!(path = %self.path.display(), index = self.index, "CAN log rotated");
        Ok(())
    }

    fn write_header(&mut self) -> LogResult<()> {
        let date = Local::now().format("%a %b %e %H:%M:%S %Y");
        let header = format!(
            "date,{date}\nbase hex timestamps absolute\nno interval events logged\n"
        );
        self.write_str(&header)
    }

    fn write_str(&mut self, text: &str) -> LogResult<()> {
        self.out
            .write_all(text.as_bytes())
            .and_then(|()| self.out.flush())
            .map_err(|e| LogError::Io(format!("{}: {e}", self.path.display())))?;
        self.bytes_written += text.len() as u64;
        Ok(())
    }
}

fn open_file(path: &Path) -> LogResult<BufWriter<File>> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|e| LogError::Io(format!("{}: {e}", path.display())))
}
