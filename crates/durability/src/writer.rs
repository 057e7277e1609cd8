//! Checkpoint writer
//!
//! Two entry points:
//! - [`save_context`]: snapshot every record into a fresh single-segment file
//! - [`save_checkpoint`]: append one segment of recent changes, creating the
//!   file first if it does not hold a valid header
//!
//! Records are encoded into a scratch buffer of exactly
//! `settings.buffer_size` bytes. The buffer never grows: a record that does
//! not fit fails the save with a memory error and nothing is written.
//!
//! # Incremental Append
//!
//! The new segment is written at `FileHeader.size` and synced, then the
//! header is rewritten in place. A crash between the two leaves a file whose
//! header still describes the previous segments; the trailing bytes are
//! ignored on load and overwritten by the next append.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::Path;

use byteorder::{BigEndian, WriteBytesExt};
use madara_core::encoding::{ReadCursor, WriteCursor};
use madara_core::{now_secs, pack_version};
use madara_storage::ThreadSafeContext;
use tracing::debug;

use crate::error::{CheckpointError, Result};
use crate::format::{
    CheckpointHeader, FileHeader, CHECKPOINT_HEADER_SIZE, FILE_HEADER_SIZE, SEGMENT_PREFIX_SIZE,
};
use crate::lister::{AllRecordsLister, LocalChangesLister, VariablesLister};
use crate::settings::CheckpointSettings;

/// A filtered segment ready to be written
struct EncodedSegment {
    bytes: Vec<u8>,
    updates: u32,
}

/// Save every record (prefix-filtered) into a new file
///
/// Any existing file at `settings.filename` is replaced. Returns the size of
/// the written file.
pub fn save_context(context: &ThreadSafeContext, settings: &CheckpointSettings) -> Result<u64> {
    settings.validate()?;
    let _guard = context.lock();

    let mut lister = AllRecordsLister::new();
    lister.start(context, settings);
    let segment = encode_segment(context, settings, &mut lister)?;

    let written = write_new_file(settings, &segment)?;
    debug!(
        target: "madara::checkpoint",
        path = %settings.filename.display(),
        updates = segment.updates,
        bytes = written,
        "Saved context"
    );
    Ok(written)
}

/// Append the records changed since the last checkpoint
///
/// Uses [`LocalChangesLister`]. See [`save_checkpoint_with`].
pub fn save_checkpoint(context: &ThreadSafeContext, settings: &CheckpointSettings) -> Result<u64> {
    save_checkpoint_with(context, settings, &mut LocalChangesLister::new())
}

/// Append one segment listed by `lister`
///
/// If the file is missing or lacks a valid header it is created as with
/// [`save_context`]. If the lister yields nothing that passes the prefix
/// filter the file is left untouched and 0 is returned. Otherwise returns
/// the bytes written by this call.
pub fn save_checkpoint_with(
    context: &ThreadSafeContext,
    settings: &CheckpointSettings,
    lister: &mut dyn VariablesLister,
) -> Result<u64> {
    settings.validate()?;
    let _guard = context.lock();

    lister.start(context, settings);
    let segment = encode_segment(context, settings, lister)?;

    if segment.updates == 0 {
        debug!(
            target: "madara::checkpoint",
            path = %settings.filename.display(),
            "Nothing to checkpoint"
        );
        return Ok(0);
    }

    let written = match open_existing(&settings.filename)? {
        Some((file, header)) => append_segment(file, header, settings, &segment)?,
        None => write_new_file(settings, &segment)?,
    };

    lister.finish(context, settings);
    debug!(
        target: "madara::checkpoint",
        path = %settings.filename.display(),
        updates = segment.updates,
        bytes = written,
        "Saved checkpoint"
    );
    Ok(written)
}

fn segment_clock(context: &ThreadSafeContext, settings: &CheckpointSettings) -> u64 {
    if settings.override_lamport {
        settings.last_lamport_clock
    } else {
        context.clock()
    }
}

fn last_timestamp(settings: &CheckpointSettings) -> u64 {
    if settings.override_timestamp {
        settings.last_timestamp
    } else {
        now_secs()
    }
}

fn encode_segment(
    context: &ThreadSafeContext,
    settings: &CheckpointSettings,
    lister: &mut dyn VariablesLister,
) -> Result<EncodedSegment> {
    let mut scratch = vec![0u8; settings.buffer_size];
    let mut cursor = WriteCursor::new(&mut scratch);

    // Header slot, filled in once the record count is known
    cursor.put_bytes("CheckpointHeader", &[0u8; CHECKPOINT_HEADER_SIZE])?;

    let mut updates: u32 = 0;
    let mut quality: u32 = 0;
    while let Some((key, record)) = lister.next() {
        if !settings.matches(&key) {
            continue;
        }
        record.write(&mut cursor, &key).map_err(|e| {
            CheckpointError::memory(format!(
                "record {} does not fit the {} byte buffer: {}",
                key, settings.buffer_size, e
            ))
        })?;
        updates += 1;
        quality = quality.max(record.quality);
    }

    let size = cursor.position();
    let header = CheckpointHeader {
        size: size as u64,
        domain: settings.domain.clone(),
        originator: settings.originator.clone(),
        updates,
        quality,
        clock: segment_clock(context, settings),
        timestamp: last_timestamp(settings),
        ..Default::default()
    };
    header.write(&mut WriteCursor::new(&mut scratch[..CHECKPOINT_HEADER_SIZE]))?;

    let bytes = settings
        .buffer_filters
        .encode(&scratch[..size], settings.buffer_size)?;
    Ok(EncodedSegment { bytes, updates })
}

/// Open a file that already holds a valid header
fn open_existing(path: &Path) -> Result<Option<(File, FileHeader)>> {
    let mut file = match OpenOptions::new().read(true).write(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(CheckpointError::file(path, e.to_string())),
    };

    let mut buf = [0u8; FILE_HEADER_SIZE];
    match file.read_exact(&mut buf) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(CheckpointError::file(path, e.to_string())),
    }
    if !FileHeader::file_header_test(&buf) {
        return Ok(None);
    }

    let header = FileHeader::read(&mut ReadCursor::new(&buf))?;
    if header.size < FILE_HEADER_SIZE as u64 {
        return Ok(None);
    }
    Ok(Some((file, header)))
}

fn write_new_file(settings: &CheckpointSettings, segment: &EncodedSegment) -> Result<u64> {
    let path = &settings.filename;
    let mut header = FileHeader::new(settings.originator.clone());
    header.karl_version = pack_version(&settings.version);
    if settings.override_timestamp {
        header.initial_timestamp = settings.initial_timestamp;
        header.last_timestamp = settings.last_timestamp;
    }
    header.states = 1;
    header.size = (FILE_HEADER_SIZE + SEGMENT_PREFIX_SIZE + segment.bytes.len()) as u64;

    let mut file = File::create(path).map_err(|e| CheckpointError::file(path, e.to_string()))?;
    file.write_all(&header.to_bytes()?)?;
    file.write_u64::<BigEndian>(segment.bytes.len() as u64)?;
    file.write_all(&segment.bytes)?;
    file.sync_data()?;
    Ok(header.size)
}

fn append_segment(
    mut file: File,
    mut header: FileHeader,
    settings: &CheckpointSettings,
    segment: &EncodedSegment,
) -> Result<u64> {
    let appended = (SEGMENT_PREFIX_SIZE + segment.bytes.len()) as u64;

    file.seek(SeekFrom::Start(header.size))?;
    file.write_u64::<BigEndian>(segment.bytes.len() as u64)?;
    file.write_all(&segment.bytes)?;
    file.sync_data()?;

    header.size += appended;
    header.states += 1;
    header.last_timestamp = last_timestamp(settings);

    file.seek(SeekFrom::Start(0))?;
    file.write_all(&header.to_bytes()?)?;
    file.sync_data()?;
    Ok(appended)
}
