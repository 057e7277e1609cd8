//! Streaming checkpoint reader
//!
//! [`CheckpointReader`] walks a checkpoint file one record at a time:
//!
//! ```text
//! NotStarted --start--> SegmentBoundary <--> InSegment
//!      |                      |
//!      +------------------> Exhausted
//! ```
//!
//! A missing file, a file shorter than its header, a bad file-type tag or a
//! file with no segments goes straight to `Exhausted` without an error.
//! Corruption found after the header validated is an error, and the reader
//! is exhausted from then on.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};

use byteorder::{BigEndian, ReadBytesExt};
use madara_core::encoding::ReadCursor;
use madara_core::{version_to_string, KnowledgeRecord};
use madara_storage::{KnowledgeUpdateSettings, ThreadSafeContext};
use tracing::{debug, warn, Span};

use crate::error::{CheckpointError, Result};
use crate::format::{CheckpointHeader, FileHeader, CHECKPOINT_HEADER_SIZE, FILE_HEADER_SIZE};
use crate::settings::CheckpointSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    NotStarted,
    SegmentBoundary,
    InSegment { pos: usize, end: usize, remaining: u32 },
    Exhausted,
}

/// Reads `(key, record)` pairs from a checkpoint file
pub struct CheckpointReader {
    settings: CheckpointSettings,
    stage: Stage,
    file: Option<BufReader<File>>,
    meta: Option<FileHeader>,
    scratch: Vec<u8>,
    segment: Vec<u8>,
    state: u64,
    total_read: u64,
    span: Span,
}

impl CheckpointReader {
    /// Create a reader; no I/O happens until [`start`](Self::start) or
    /// [`next`](Self::next)
    pub fn new(settings: CheckpointSettings) -> Self {
        CheckpointReader {
            settings,
            stage: Stage::NotStarted,
            file: None,
            meta: None,
            scratch: Vec::new(),
            segment: Vec::new(),
            state: 0,
            total_read: 0,
            span: Span::current(),
        }
    }

    /// Log under `span` instead of the span current at construction
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Settings, including metadata copied from the file header
    pub fn settings(&self) -> &CheckpointSettings {
        &self.settings
    }

    /// Consume the reader, returning its settings
    pub fn into_settings(self) -> CheckpointSettings {
        self.settings
    }

    /// Header of the open file, once validated
    pub fn meta(&self) -> Option<&FileHeader> {
        self.meta.as_ref()
    }

    /// Bytes consumed from the file so far
    pub fn total_read(&self) -> u64 {
        self.total_read
    }

    /// Index of the segment being read
    pub fn state(&self) -> u64 {
        self.state
    }

    /// True once no more records will be returned
    pub fn is_exhausted(&self) -> bool {
        self.stage == Stage::Exhausted
    }

    /// Open the file and validate its header
    ///
    /// Returns `Ok(true)` if the file holds segments to read. Calling it
    /// again after the first time just reports the current state.
    pub fn start(&mut self) -> Result<bool> {
        if self.stage != Stage::NotStarted {
            return Ok(self.meta.is_some() && !self.is_exhausted());
        }
        self.open().map_err(|e| self.fail(e))
    }

    fn open(&mut self) -> Result<bool> {
        let _enter = self.span.clone().entered();
        let path = self.settings.filename.clone();

        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(target: "madara::checkpoint", path = %path.display(), "No checkpoint file");
                self.stage = Stage::Exhausted;
                return Ok(false);
            }
            Err(e) => return Err(CheckpointError::file(&path, e.to_string())),
        };
        let mut file = BufReader::new(file);

        let mut buf = [0u8; FILE_HEADER_SIZE];
        match file.read_exact(&mut buf) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                warn!(target: "madara::checkpoint", path = %path.display(), "File shorter than header");
                self.stage = Stage::Exhausted;
                return Ok(false);
            }
            Err(e) => return Err(CheckpointError::file(&path, e.to_string())),
        }

        if !FileHeader::file_header_test(&buf) {
            warn!(target: "madara::checkpoint", path = %path.display(), "Not a checkpoint file");
            self.stage = Stage::Exhausted;
            return Ok(false);
        }

        let meta = FileHeader::read(&mut ReadCursor::new(&buf))?;
        self.total_read = FILE_HEADER_SIZE as u64;

        self.settings.initial_timestamp = meta.initial_timestamp;
        self.settings.last_timestamp = meta.last_timestamp;
        self.settings.originator = meta.originator.clone();
        self.settings.states = meta.states;
        self.settings.version = version_to_string(meta.karl_version);

        debug!(
            target: "madara::checkpoint",
            path = %path.display(),
            states = meta.states,
            size = meta.size,
            originator = %meta.originator,
            "Opened checkpoint"
        );

        self.stage = if meta.states == 0 {
            Stage::Exhausted
        } else {
            Stage::SegmentBoundary
        };
        self.scratch = vec![0u8; self.settings.buffer_size];
        self.file = Some(file);
        self.meta = Some(meta);
        Ok(!self.is_exhausted())
    }

    /// Next record that passes the prefix filter, or `None` when done
    ///
    /// After an error every later call returns `Ok(None)`.
    pub fn next(&mut self) -> Result<Option<(String, KnowledgeRecord)>> {
        self.advance().map_err(|e| self.fail(e))
    }

    fn advance(&mut self) -> Result<Option<(String, KnowledgeRecord)>> {
        loop {
            match self.stage {
                Stage::NotStarted => {
                    self.open()?;
                }
                Stage::Exhausted => return Ok(None),
                Stage::SegmentBoundary => {
                    let states = self.meta.as_ref().map_or(0, |m| m.states);
                    if self.state >= states || self.state > self.settings.last_state {
                        self.finish();
                        continue;
                    }
                    self.read_segment()?;
                }
                Stage::InSegment { pos, end, remaining } => {
                    if remaining == 0 || pos >= end {
                        self.state += 1;
                        self.stage = Stage::SegmentBoundary;
                        continue;
                    }

                    let mut cursor = ReadCursor::new(&self.segment[pos..end]);
                    let (key, record) = KnowledgeRecord::read(&mut cursor)?;
                    self.stage = Stage::InSegment {
                        pos: pos + cursor.position(),
                        end,
                        remaining: remaining - 1,
                    };

                    if self.settings.matches(&key) {
                        return Ok(Some((key, record)));
                    }
                }
            }
        }
    }

    fn fail(&mut self, error: CheckpointError) -> CheckpointError {
        self.stage = Stage::Exhausted;
        self.file = None;
        self.segment = Vec::new();
        let _enter = self.span.enter();
        warn!(
            target: "madara::checkpoint",
            path = %self.settings.filename.display(),
            segment = self.state,
            error = %error,
            "Checkpoint read failed"
        );
        error
    }

    fn finish(&mut self) {
        self.stage = Stage::Exhausted;
        self.file = None;
        let _enter = self.span.enter();
        debug!(
            target: "madara::checkpoint",
            path = %self.settings.filename.display(),
            bytes = self.total_read,
            segments = self.state,
            "Finished reading checkpoint"
        );
    }

    fn read_segment(&mut self) -> Result<()> {
        let path = &self.settings.filename;
        let file = match self.file.as_mut() {
            Some(file) => file,
            None => {
                return Err(CheckpointError::InvalidOperation(
                    "checkpoint reader has no open file".into(),
                ))
            }
        };

        let stored_len = file.read_u64::<BigEndian>().map_err(|e| {
            CheckpointError::file(path, format!("segment {} length prefix: {}", self.state, e))
        })?;
        if stored_len > self.scratch.len() as u64 {
            return Err(CheckpointError::memory(format!(
                "segment {} holds {} bytes, buffer holds {}",
                self.state,
                stored_len,
                self.scratch.len()
            )));
        }
        let stored_len = stored_len as usize;
        file.read_exact(&mut self.scratch[..stored_len]).map_err(|e| {
            CheckpointError::file(path, format!("segment {} body: {}", self.state, e))
        })?;
        self.total_read += 8 + stored_len as u64;

        let decoded = self
            .settings
            .buffer_filters
            .decode(&self.scratch[..stored_len], self.settings.buffer_size)?;

        let header = CheckpointHeader::read(&mut ReadCursor::new(&decoded))?;
        if self.state == 0 {
            self.settings.initial_lamport_clock = header.clock;
        }
        self.settings.last_lamport_clock = header.clock;

        if header.size > decoded.len() as u64 || header.size < CHECKPOINT_HEADER_SIZE as u64 {
            return Err(CheckpointError::memory(format!(
                "segment {} declares {} bytes, {} decoded",
                self.state,
                header.size,
                decoded.len()
            )));
        }

        if self.state < self.settings.initial_state {
            self.state += 1;
            return Ok(());
        }

        self.stage = Stage::InSegment {
            pos: CHECKPOINT_HEADER_SIZE,
            end: header.size as usize,
            remaining: header.updates,
        };
        self.segment = decoded;
        Ok(())
    }
}

impl Iterator for CheckpointReader {
    type Item = Result<(String, KnowledgeRecord)>;

    fn next(&mut self) -> Option<Self::Item> {
        CheckpointReader::next(self).transpose()
    }
}

/// Load a checkpoint file into `context`
///
/// Every record that passes the prefix filter and state range is applied
/// with [`ThreadSafeContext::update_record_from_external`] while the
/// context lock is held. When `settings.clear_knowledge` is set the context
/// is cleared once the file header has validated. On success the file's
/// metadata is copied into `settings`.
///
/// Returns the bytes read; a missing or unrecognised file reads 0 bytes and
/// leaves the context untouched. If a segment is corrupt the records
/// applied before it stay applied.
pub fn load_context(
    context: &ThreadSafeContext,
    settings: &mut CheckpointSettings,
    update_settings: &KnowledgeUpdateSettings,
) -> Result<u64> {
    let _guard = context.lock();
    let mut reader = CheckpointReader::new(settings.clone());

    if !reader.start()? {
        if let Some(meta) = reader.meta() {
            settings.states = meta.states;
        }
        return Ok(reader.total_read());
    }

    if settings.clear_knowledge {
        context.clear();
    }

    let mut applied = 0u64;
    let mut rejected = 0u64;
    while let Some((key, record)) = reader.next()? {
        if context
            .update_record_from_external(&key, &record, update_settings)
            .is_applied()
        {
            applied += 1;
        } else {
            rejected += 1;
        }
    }

    let total = reader.total_read();
    *settings = reader.into_settings();
    debug!(
        target: "madara::checkpoint",
        path = %settings.filename.display(),
        applied,
        rejected,
        bytes = total,
        "Loaded context"
    );
    Ok(total)
}
