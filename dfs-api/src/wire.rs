//! The framed IPC channel: commands, statuses, header layout, and the
//! `Channel` wrapper that reads/writes them over any `Read + Write` stream.
//!
//! Every message is `header || payload`. Headers are fixed-size,
//! native-endian, and packed field-by-field with `to_ne_bytes`/
//! `from_ne_bytes` rather than through a general serialization crate: the
//! layout is pinned exactly (no padding beyond natural alignment) and the
//! channel is same-host/same-build, so there is no cross-platform
//! normalization to do.
//!
//! `Read::read_exact` / `Write::write_all` already retry on partial progress
//! and `Interrupted`; a broken connection surfaces as `io::Error` and is
//! wrapped in [`WireError`], which this crate's callers treat as fatal.

use std::io::{Read, Write};

use crate::error::{Result, WireError};

/// Command codes carried in a request header's `cmd` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Command {
    /// `{node_id: i32, capacity: u64}`, empty response.
    Init = 0,
    /// `{block_index: i32}`, empty response.
    AllocBlock = 1,
    /// `{block_index: i32}`, empty response.
    FreeBlock = 2,
    /// `{block_index: i32}`, response payload is `BLOCK_SIZE` bytes.
    ReadBlock = 3,
    /// `{block_index: i32, buffer: [BLOCK_SIZE]}`, empty response.
    WriteBlock = 4,
    /// `{num_blocks: i32, block_ids: [i32; num_blocks]}`, response is
    /// `num_blocks * BLOCK_SIZE` bytes.
    BatchRead = 5,
    /// `{num_blocks, block_ids}` then a second raw write of
    /// `num_blocks * BLOCK_SIZE` bytes; empty response.
    BatchWrite = 6,
    /// `{cleanup: i32}`, empty response.
    Exit = 7,
}

impl Command {
    fn from_u32(v: u32) -> Result<Command> {
        Ok(match v {
            0 => Command::Init,
            1 => Command::AllocBlock,
            2 => Command::FreeBlock,
            3 => Command::ReadBlock,
            4 => Command::WriteBlock,
            5 => Command::BatchRead,
            6 => Command::BatchWrite,
            7 => Command::Exit,
            other => return Err(WireError::UnknownCode(other)),
        })
    }
}

/// Status codes carried in a response header's `status` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Status {
    /// The request completed.
    Success = 0,
    /// The worker (or the coordinator's bitmap) had no free block to give.
    NoSpace = 1,
    /// The request named a block id/index the worker does not recognize.
    InvalidBlock = 2,
    /// Catch-all failure: IO error, framing error, or internal error.
    Fail = 3,
}

impl Status {
    fn from_u32(v: u32) -> Result<Status> {
        Ok(match v {
            0 => Status::Success,
            1 => Status::NoSpace,
            2 => Status::InvalidBlock,
            3 => Status::Fail,
            other => return Err(WireError::UnknownCode(other)),
        })
    }
}

/// Size, in bytes, of a request header on the wire: `cmd: u32` followed by
/// `payload_size: u64`.
pub const REQUEST_HEADER_LEN: usize = 4 + 8;
/// Size, in bytes, of a response header on the wire: `status: u32` followed
/// by `payload_size: u64`.
pub const RESPONSE_HEADER_LEN: usize = 4 + 8;

/// A length-prefixed, bidirectional message transport over a reliable byte
/// stream. One outstanding request per channel: callers must consume the
/// response to command `K` before sending command `K+1`; nothing here
/// enforces that beyond the natural sequencing of the API (there is no
/// request id to match a response against).
pub struct Channel<S> {
    stream: S,
}

impl<S> Channel<S> {
    /// Wrap an existing stream (a `UnixStream` end, a pipe, anything
    /// `Read + Write`) as a framed channel.
    pub fn new(stream: S) -> Self {
        Channel { stream }
    }

    /// Unwrap back to the underlying stream.
    pub fn into_inner(self) -> S {
        self.stream
    }
}

impl<S: Read + Write> Channel<S> {
    /// Send a request: `{cmd, payload.len()}` header followed by `payload`.
    pub fn send_request(&mut self, cmd: Command, payload: &[u8]) -> Result<()> {
        let mut header = [0u8; REQUEST_HEADER_LEN];
        header[0..4].copy_from_slice(&(cmd as u32).to_ne_bytes());
        header[4..12].copy_from_slice(&(payload.len() as u64).to_ne_bytes());
        self.stream.write_all(&header)?;
        self.stream.write_all(payload)?;
        Ok(())
    }

    /// Read a request header, returning the command and declared payload
    /// size. The caller is then responsible for reading exactly that many
    /// payload bytes with [`Channel::read_payload`].
    pub fn recv_request_header(&mut self) -> Result<(Command, u64)> {
        let mut header = [0u8; REQUEST_HEADER_LEN];
        self.stream.read_exact(&mut header)?;
        let cmd = Command::from_u32(u32::from_ne_bytes(
            header[0..4].try_into().expect("header is REQUEST_HEADER_LEN bytes"),
        ))?;
        let payload_size = u64::from_ne_bytes(
            header[4..12].try_into().expect("header is REQUEST_HEADER_LEN bytes"),
        );
        Ok((cmd, payload_size))
    }

    /// Send a response: `{status, payload.len()}` header followed by
    /// `payload`.
    pub fn send_response(&mut self, status: Status, payload: &[u8]) -> Result<()> {
        let mut header = [0u8; RESPONSE_HEADER_LEN];
        header[0..4].copy_from_slice(&(status as u32).to_ne_bytes());
        header[4..12].copy_from_slice(&(payload.len() as u64).to_ne_bytes());
        self.stream.write_all(&header)?;
        self.stream.write_all(payload)?;
        Ok(())
    }

    /// Read a response header, returning the status and declared payload
    /// size.
    pub fn recv_response_header(&mut self) -> Result<(Status, u64)> {
        let mut header = [0u8; RESPONSE_HEADER_LEN];
        self.stream.read_exact(&mut header)?;
        let status = Status::from_u32(u32::from_ne_bytes(
            header[0..4].try_into().expect("header is RESPONSE_HEADER_LEN bytes"),
        ))?;
        let payload_size = u64::from_ne_bytes(
            header[4..12].try_into().expect("header is RESPONSE_HEADER_LEN bytes"),
        );
        Ok((status, payload_size))
    }

    /// Read exactly `len` bytes of payload (request or response).
    pub fn read_payload(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.stream.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Write a second-phase raw byte stream outside the header/payload
    /// envelope, used by `BATCH_WRITE` to ship `num_blocks * BLOCK_SIZE`
    /// bytes without an intermediate copy into a single framed payload.
    pub fn write_raw(&mut self, buf: &[u8]) -> Result<()> {
        self.stream.write_all(buf)?;
        Ok(())
    }

    /// Read a second-phase raw byte stream (the `BATCH_WRITE` companion of
    /// [`Channel::write_raw`]).
    pub fn read_raw(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.stream.read_exact(&mut buf)?;
        Ok(buf)
    }
}

/// Pack the `INIT` request payload: `{node_id: i32, capacity: u64}`.
pub fn encode_init(node_id: i32, capacity: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(4 + 8);
    buf.extend_from_slice(&node_id.to_ne_bytes());
    buf.extend_from_slice(&capacity.to_ne_bytes());
    buf
}

/// Unpack the `INIT` request payload.
pub fn decode_init(payload: &[u8]) -> Result<(i32, u64)> {
    if payload.len() != 12 {
        return Err(WireError::MalformedPayload("INIT payload must be 12 bytes"));
    }
    let node_id = i32::from_ne_bytes(payload[0..4].try_into().expect("length checked above"));
    let capacity = u64::from_ne_bytes(payload[4..12].try_into().expect("length checked above"));
    Ok((node_id, capacity))
}

/// Pack a `{block_index: i32}` request payload (`ALLOC_BLOCK`, `FREE_BLOCK`,
/// `READ_BLOCK`).
pub fn encode_block_index(block_index: i32) -> Vec<u8> {
    block_index.to_ne_bytes().to_vec()
}

/// Unpack a `{block_index: i32}` request payload.
pub fn decode_block_index(payload: &[u8]) -> Result<i32> {
    if payload.len() != 4 {
        return Err(WireError::MalformedPayload(
            "block-index payload must be 4 bytes",
        ));
    }
    Ok(i32::from_ne_bytes(
        payload[0..4].try_into().expect("length checked above"),
    ))
}

/// Pack the `WRITE_BLOCK` request payload: `{block_index: i32, buffer:
/// [BLOCK_SIZE]}`.
pub fn encode_write_block(block_index: i32, buffer: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(4 + buffer.len());
    buf.extend_from_slice(&block_index.to_ne_bytes());
    buf.extend_from_slice(buffer);
    buf
}

/// Unpack the `WRITE_BLOCK` request payload, returning the block index and a
/// slice borrowing the block contents out of `payload`.
pub fn decode_write_block(payload: &[u8]) -> Result<(i32, &[u8])> {
    if payload.len() < 4 {
        return Err(WireError::MalformedPayload(
            "WRITE_BLOCK payload missing block index",
        ));
    }
    let block_index = i32::from_ne_bytes(payload[0..4].try_into().expect("length checked above"));
    Ok((block_index, &payload[4..]))
}

/// Pack a `{num_blocks: i32, block_ids: [i32; num_blocks]}` control payload
/// (`BATCH_READ`, `BATCH_WRITE`).
pub fn encode_batch_ids(block_ids: &[i32]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(4 + block_ids.len() * 4);
    buf.extend_from_slice(&(block_ids.len() as i32).to_ne_bytes());
    for id in block_ids {
        buf.extend_from_slice(&id.to_ne_bytes());
    }
    buf
}

/// Unpack a `{num_blocks, block_ids}` control payload.
pub fn decode_batch_ids(payload: &[u8]) -> Result<Vec<i32>> {
    if payload.len() < 4 {
        return Err(WireError::MalformedPayload(
            "batch payload missing num_blocks",
        ));
    }
    let num_blocks = i32::from_ne_bytes(payload[0..4].try_into().expect("length checked above"));
    if num_blocks < 0 {
        return Err(WireError::MalformedPayload("negative num_blocks"));
    }
    let num_blocks = num_blocks as usize;
    if payload.len() != 4 + num_blocks * 4 {
        return Err(WireError::MalformedPayload(
            "batch payload length does not match num_blocks",
        ));
    }
    let mut ids = Vec::with_capacity(num_blocks);
    for chunk in payload[4..].chunks_exact(4) {
        ids.push(i32::from_ne_bytes(
            chunk.try_into().expect("chunks_exact(4) guarantees a 4-byte chunk"),
        ));
    }
    Ok(ids)
}

/// Pack the `EXIT` request payload: `{cleanup: i32}`.
pub fn encode_exit(cleanup: bool) -> Vec<u8> {
    (cleanup as i32).to_ne_bytes().to_vec()
}

/// Unpack the `EXIT` request payload.
pub fn decode_exit(payload: &[u8]) -> Result<bool> {
    if payload.len() != 4 {
        return Err(WireError::MalformedPayload("EXIT payload must be 4 bytes"));
    }
    Ok(i32::from_ne_bytes(payload[0..4].try_into().expect("length checked above")) != 0)
}
