//! The worker / data node: owns a capacity in blocks and a
//! durable directory of block blobs, and serves one framed request at a
//! time until `EXIT`.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use dfs_api::types::BLOCK_SIZE;
use dfs_api::wire::{
    decode_batch_ids, decode_block_index, decode_exit, decode_init, decode_write_block, Channel,
    Command, Status,
};
use tracing::{debug, error, warn};

use crate::error::WorkerError;

/// Local block storage and accounting for one worker. State lives only in
/// this struct and the filesystem directory it owns (nothing is shared
/// with the coordinator except through the channel).
pub struct Worker {
    node_id: i32,
    capacity: u64,
    used: u64,
    dir: PathBuf,
}

impl Worker {
    /// Handle an `INIT` request: create this worker's durable directory
    /// (named after `node_id`) under `base_dir` and reset usage to zero.
    pub fn init(base_dir: &Path, node_id: i32, capacity: u64) -> Result<Self, WorkerError> {
        let dir = base_dir.join(node_id.to_string());
        fs::create_dir_all(&dir)?;
        Ok(Worker {
            node_id,
            capacity,
            used: 0,
            dir,
        })
    }

    fn blob_path(&self, block_id: i32) -> PathBuf {
        self.dir.join(block_id.to_string())
    }

    /// `ALLOC_BLOCK(i)`: create an empty `BLOCK_SIZE`-byte blob.
    pub fn alloc_block(&mut self, block_id: i32) -> Result<(), WorkerError> {
        if self.used + BLOCK_SIZE as u64 > self.capacity {
            return Err(WorkerError::NoSpace);
        }
        let file = File::create(self.blob_path(block_id))?;
        file.set_len(BLOCK_SIZE as u64)?;
        self.used += BLOCK_SIZE as u64;
        Ok(())
    }

    /// `FREE_BLOCK(i)`: destroy the blob. An absent blob is reported as
    /// `UnknownBlock`, which the dispatch loop maps to `Status::InvalidBlock`
    /// rather than `Status::Fail`, consistent with how every other unknown-id
    /// case here is classified.
    pub fn free_block(&mut self, block_id: i32) -> Result<(), WorkerError> {
        fs::remove_file(self.blob_path(block_id))
            .map_err(|_| WorkerError::UnknownBlock(block_id as u64))?;
        self.used -= BLOCK_SIZE as u64;
        Ok(())
    }

    /// `READ_BLOCK(i)`: read exactly `BLOCK_SIZE` bytes.
    pub fn read_block(&self, block_id: i32) -> Result<Vec<u8>, WorkerError> {
        let mut file =
            File::open(self.blob_path(block_id)).map_err(|_| WorkerError::UnknownBlock(block_id as u64))?;
        let mut buf = vec![0u8; BLOCK_SIZE];
        file.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// `WRITE_BLOCK(i, buf)`: overwrite the blob with exactly
    /// `BLOCK_SIZE` bytes.
    pub fn write_block(&mut self, block_id: i32, buf: &[u8]) -> Result<(), WorkerError> {
        let mut file = OpenOptions::new()
            .write(true)
            .open(self.blob_path(block_id))
            .map_err(|_| WorkerError::UnknownBlock(block_id as u64))?;
        file.write_all(buf)?;
        Ok(())
    }

    /// `BATCH_READ(ids)`: read each id in order, concatenating into one
    /// buffer. The first failure aborts the whole batch.
    pub fn batch_read(&self, ids: &[i32]) -> Result<Vec<u8>, WorkerError> {
        let mut out = Vec::with_capacity(ids.len() * BLOCK_SIZE);
        for &id in ids {
            out.extend(self.read_block(id)?);
        }
        Ok(out)
    }

    /// `BATCH_WRITE(ids, raw)`: `raw` must be exactly
    /// `ids.len() * BLOCK_SIZE` bytes; writes each block in order.
    pub fn batch_write(&mut self, ids: &[i32], raw: &[u8]) -> Result<(), WorkerError> {
        for (idx, &id) in ids.iter().enumerate() {
            let start = idx * BLOCK_SIZE;
            self.write_block(id, &raw[start..start + BLOCK_SIZE])?;
        }
        Ok(())
    }

    /// `EXIT(cleanup)`: optionally delete this worker's whole directory.
    pub fn exit(self, cleanup: bool) -> Result<(), WorkerError> {
        if cleanup {
            fs::remove_dir_all(&self.dir)?;
        }
        Ok(())
    }
}

/// Run a worker's serve loop over `stream` until an `EXIT` request, or a
/// fatal framing error. The first request on the stream must be `INIT`;
/// anything else is a protocol violation and ends the loop with an error.
///
/// Runs on its own `std::thread` per worker, connected to the coordinator
/// by a `UnixStream` pair, rather than as a separate process: the channel
/// only needs to stay FIFO with one outstanding request at a time.
pub fn serve<S: Read + Write>(base_dir: &Path, stream: S) -> Result<(), WorkerError> {
    let mut channel = Channel::new(stream);

    let (cmd, len) = channel.recv_request_header()?;
    if cmd != Command::Init {
        error!(target: "dfs::worker", ?cmd, "expected INIT as first request");
        return Err(WorkerError::Wire(dfs_api::error::WireError::MalformedPayload(
            "first request must be INIT",
        )));
    }
    let payload = channel.read_payload(len as usize)?;
    let (node_id, capacity) = decode_init(&payload)?;
    let mut worker = Worker::init(base_dir, node_id, capacity)?;
    debug!(target: "dfs::worker", node_id, capacity, "initialized");
    channel.send_response(Status::Success, &[])?;

    loop {
        let (cmd, len) = channel.recv_request_header()?;
        let payload = channel.read_payload(len as usize)?;
        debug!(target: "dfs::worker", node_id = worker.node_id, ?cmd, "dispatch");

        match cmd {
            Command::Init => {
                warn!(target: "dfs::worker", node_id = worker.node_id, "duplicate INIT ignored");
                channel.send_response(Status::Fail, &[])?;
            }
            Command::AllocBlock => {
                let block_index = decode_block_index(&payload)?;
                respond_empty(&mut channel, worker.alloc_block(block_index))?;
            }
            Command::FreeBlock => {
                let block_index = decode_block_index(&payload)?;
                respond_empty(&mut channel, worker.free_block(block_index))?;
            }
            Command::ReadBlock => {
                let block_index = decode_block_index(&payload)?;
                match worker.read_block(block_index) {
                    Ok(bytes) => channel.send_response(Status::Success, &bytes)?,
                    Err(e) => channel.send_response(status_for(&e), &[])?,
                }
            }
            Command::WriteBlock => {
                let (block_index, buf) = decode_write_block(&payload)?;
                respond_empty(&mut channel, worker.write_block(block_index, buf))?;
            }
            Command::BatchRead => {
                let ids = decode_batch_ids(&payload)?;
                match worker.batch_read(&ids) {
                    Ok(bytes) => channel.send_response(Status::Success, &bytes)?,
                    Err(e) => channel.send_response(status_for(&e), &[])?,
                }
            }
            Command::BatchWrite => {
                let ids = decode_batch_ids(&payload)?;
                let raw = channel.read_raw(ids.len() * BLOCK_SIZE)?;
                respond_empty(&mut channel, worker.batch_write(&ids, &raw))?;
            }
            Command::Exit => {
                let cleanup = decode_exit(&payload)?;
                channel.send_response(Status::Success, &[])?;
                worker.exit(cleanup)?;
                debug!(target: "dfs::worker", node_id, "exiting");
                return Ok(());
            }
        }
    }
}

fn respond_empty<S: Read + Write>(
    channel: &mut Channel<S>,
    result: Result<(), WorkerError>,
) -> Result<(), WorkerError> {
    match result {
        Ok(()) => channel.send_response(Status::Success, &[])?,
        Err(e) => channel.send_response(status_for(&e), &[])?,
    }
    Ok(())
}

fn status_for(err: &WorkerError) -> Status {
    match err {
        WorkerError::NoSpace => Status::NoSpace,
        WorkerError::UnknownBlock(_) => Status::InvalidBlock,
        WorkerError::Wire(_) | WorkerError::Storage(_) => Status::Fail,
    }
}
