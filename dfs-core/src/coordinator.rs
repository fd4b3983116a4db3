//! The coordinator / metadata node: owns the global bitmap,
//! per-worker free counts, the file table, and the active allocation
//! policy; decomposes every file-level operation into per-block requests
//! routed to the owning worker.

use std::os::unix::net::UnixStream;
use std::path::Path;
use std::thread::{self, JoinHandle};

use dfs_api::policy::{AllocContext, AllocationPolicy, PolicyView};
use dfs_api::types::{BlockId, FileBlockIndex, FileId, WorkerId, BLOCK_SIZE};
use dfs_api::wire::{
    encode_batch_ids, encode_block_index, encode_exit, encode_init, encode_write_block, Channel,
    Command, Status,
};
use tracing::{error, warn};

use crate::error::{CoordinatorError, WorkerError};
use crate::{bitmap::Bitmap, policy, worker};

fn div_ceil(a: u64, b: u64) -> u64 {
    (a + b - 1) / b
}

struct FileEntry {
    name: String,
    /// Logical block count `L`.
    l: u64,
    /// `nodes[w]` is worker `w`'s sub-mapping: `(global_block_id,
    /// file_block_index)` pairs, in allocation order.
    nodes: Vec<Vec<(BlockId, FileBlockIndex)>>,
}

/// The metadata coordinator. Owns one OS thread and one [`Channel`] per
/// worker; every public method here corresponds to one operation of the
/// external file-store API.
pub struct Coordinator {
    bitmap: Bitmap,
    /// `block_owner[gid]` is the worker owning global block `gid`, once
    /// allocated.
    block_owner: Vec<Option<WorkerId>>,
    blocks_free: Vec<u64>,
    blocks_for_node: Vec<u64>,
    files: Vec<FileEntry>,
    policy: Box<dyn AllocationPolicy>,
    channels: Vec<Channel<UnixStream>>,
    workers: Vec<Option<JoinHandle<Result<(), WorkerError>>>>,
}

impl Coordinator {
    /// Spawn `n` workers, each on its own thread connected by a
    /// `UnixStream` pair, size the global bitmap for `capacity_bytes`, split
    /// it evenly (remainder to the low-numbered workers) across workers,
    /// `INIT` each one, and initialize the named policy.
    pub fn init(
        n: usize,
        capacity_bytes: u64,
        policy_name: &str,
        storage_root: impl AsRef<Path>,
    ) -> Result<Self, CoordinatorError> {
        let b = div_ceil(capacity_bytes, BLOCK_SIZE as u64) as usize;
        let bitmap = Bitmap::new(b);
        let block_owner = vec![None; b];

        let mut blocks_for_node = vec![0u64; n];
        for (i, slot) in blocks_for_node.iter_mut().enumerate() {
            *slot = (b as u64) / (n as u64) + if (i as u64) < (b as u64) % (n as u64) { 1 } else { 0 };
        }
        let blocks_free = blocks_for_node.clone();

        let storage_root = storage_root.as_ref().to_path_buf();
        let mut channels = Vec::with_capacity(n);
        let mut workers = Vec::with_capacity(n);
        for _ in 0..n {
            let (parent, child) = UnixStream::pair()?;
            let base = storage_root.clone();
            workers.push(Some(thread::spawn(move || worker::serve(&base, child))));
            channels.push(Channel::new(parent));
        }

        let mut policy = policy::by_name(policy_name).ok_or_else(|| {
            CoordinatorError::Fail(Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("unknown allocation policy: {policy_name}"),
            )))
        })?;
        policy.init(&blocks_for_node);

        let mut coordinator = Coordinator {
            bitmap,
            block_owner,
            blocks_free,
            blocks_for_node,
            files: Vec::new(),
            policy,
            channels,
            workers,
        };

        for i in 0..n {
            let capacity = coordinator.blocks_for_node[i] * BLOCK_SIZE as u64;
            let (status, _) = coordinator.call(i, Command::Init, &encode_init(i as i32, capacity))?;
            if status != Status::Success {
                return Err(status_to_error(status));
            }
        }

        Ok(coordinator)
    }

    /// Send `EXIT(cleanup)` to every worker in order, join its thread, and
    /// drop coordinator state. Errors from individual workers are logged,
    /// not propagated past the first one.
    pub fn exit(&mut self, cleanup: bool) -> Result<(), CoordinatorError> {
        let n = self.channels.len();
        for w in 0..n {
            match self.call(w, Command::Exit, &encode_exit(cleanup)) {
                Ok((Status::Success, _)) => {}
                Ok((status, _)) => warn!(target: "dfs::coordinator", worker = w, ?status, "EXIT did not succeed"),
                Err(e) => error!(target: "dfs::coordinator", worker = w, error = %e, "EXIT request failed"),
            }
        }
        for (w, handle) in self.workers.iter_mut().enumerate() {
            if let Some(handle) = handle.take() {
                match handle.join() {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => error!(target: "dfs::coordinator", worker = w, error = %e, "worker exited with an error"),
                    Err(_) => error!(target: "dfs::coordinator", worker = w, "worker thread panicked"),
                }
            }
        }
        Ok(())
    }

    /// `create_file(name, size) -> fid`. Lazy allocation: only `L` and empty
    /// sub-mappings are recorded; no block is allocated until the first
    /// write to a given index. An eager variant (allocating all `L` blocks
    /// up front) is not implemented here.
    pub fn create_file(&mut self, name: &str, size: u64) -> Result<FileId, CoordinatorError> {
        let l = div_ceil(size, BLOCK_SIZE as u64);
        self.files.push(FileEntry {
            name: name.to_string(),
            l,
            nodes: vec![Vec::new(); self.channels.len()],
        });
        Ok(self.files.len() - 1)
    }

    /// `find_file(name) -> fid`: linear scan by exact name equality.
    pub fn find_file(&self, name: &str) -> Result<FileId, CoordinatorError> {
        self.files
            .iter()
            .position(|f| f.name == name)
            .ok_or(CoordinatorError::FileDne)
    }

    /// `truncate_file(fid, new_size)`.
    pub fn truncate_file(&mut self, fid: FileId, new_size: u64) -> Result<(), CoordinatorError> {
        self.check_fid(fid)?;
        let l_new = div_ceil(new_size, BLOCK_SIZE as u64);
        let l_old = self.files[fid].l;
        if l_new >= l_old {
            self.files[fid].l = l_new;
            return Ok(());
        }
        let n = self.channels.len();
        for w in 0..n {
            let current = std::mem::take(&mut self.files[fid].nodes[w]);
            let mut keep = Vec::with_capacity(current.len());
            let mut drop_ids = Vec::new();
            for (gid, idx) in current {
                if idx < l_new {
                    keep.push((gid, idx));
                } else {
                    drop_ids.push(gid);
                }
            }
            self.files[fid].nodes[w] = keep;
            for gid in drop_ids {
                self.dealloc_block(gid)?;
            }
        }
        self.files[fid].l = l_new;
        Ok(())
    }

    /// `read_block(fid, i) -> BLOCK_SIZE bytes`.
    pub fn read_block(&mut self, fid: FileId, i: FileBlockIndex) -> Result<Vec<u8>, CoordinatorError> {
        self.check_fid(fid)?;
        if i >= self.files[fid].l {
            return Err(CoordinatorError::InvalidBlock);
        }
        match self.locate(fid, i) {
            None => Ok(vec![0u8; BLOCK_SIZE]),
            Some((w, gid)) => {
                let (status, payload) = self.call(w, Command::ReadBlock, &encode_block_index(gid as i32))?;
                if status != Status::Success {
                    return Err(status_to_error(status));
                }
                Ok(payload)
            }
        }
    }

    /// `write_block(fid, i, buf)`.
    pub fn write_block(
        &mut self,
        fid: FileId,
        i: FileBlockIndex,
        buf: &[u8],
    ) -> Result<(), CoordinatorError> {
        self.check_fid(fid)?;
        if i >= self.files[fid].l {
            return Err(CoordinatorError::InvalidBlock);
        }
        let (w, gid) = match self.locate(fid, i) {
            Some(pair) => pair,
            None => self.allocate_for_write(fid, i)?,
        };
        let (status, _) = self.call(w, Command::WriteBlock, &encode_write_block(gid as i32, buf))?;
        if status != Status::Success {
            return Err(status_to_error(status));
        }
        Ok(())
    }

    /// `read_file(fid) -> bytes[L*BLOCK_SIZE]`: one `BATCH_READ` round-trip
    /// per worker with a non-empty sub-mapping, scattered by
    /// `file_block_index`.
    pub fn read_file(&mut self, fid: FileId) -> Result<Vec<u8>, CoordinatorError> {
        self.check_fid(fid)?;
        let l = self.files[fid].l as usize;
        let mut out = vec![0u8; l * BLOCK_SIZE];
        let n = self.channels.len();
        for w in 0..n {
            let entries = self.files[fid].nodes[w].clone();
            if entries.is_empty() {
                continue;
            }
            let ids: Vec<i32> = entries.iter().map(|&(gid, _)| gid as i32).collect();
            let (status, payload) = self.call(w, Command::BatchRead, &encode_batch_ids(&ids))?;
            if status != Status::Success {
                return Err(status_to_error(status));
            }
            for (k, &(_, idx)) in entries.iter().enumerate() {
                let src = &payload[k * BLOCK_SIZE..(k + 1) * BLOCK_SIZE];
                let dst = idx as usize * BLOCK_SIZE;
                out[dst..dst + BLOCK_SIZE].copy_from_slice(src);
            }
        }
        Ok(out)
    }

    /// `write_file(fid, bytes, len)`.
    pub fn write_file(&mut self, fid: FileId, bytes: &[u8]) -> Result<(), CoordinatorError> {
        self.check_fid(fid)?;
        let required = div_ceil(bytes.len() as u64, BLOCK_SIZE as u64);
        let mut committed: Vec<(WorkerId, BlockId, FileBlockIndex)> = Vec::new();
        for i in 0..required {
            if self.locate(fid, i).is_none() {
                match self.allocate_for_write(fid, i) {
                    Ok((w, gid)) => committed.push((w, gid, i)),
                    Err(e) => {
                        for (w, gid, idx) in committed.into_iter().rev() {
                            self.undo_committed_allocation(fid, w, gid, idx);
                        }
                        return Err(e);
                    }
                }
            }
        }
        let n = self.channels.len();
        for w in 0..n {
            let entries: Vec<(BlockId, FileBlockIndex)> = self.files[fid].nodes[w]
                .iter()
                .copied()
                .filter(|&(_, idx)| idx < required)
                .collect();
            if entries.is_empty() {
                continue;
            }
            let ids: Vec<i32> = entries.iter().map(|&(gid, _)| gid as i32).collect();
            let mut gather = vec![0u8; entries.len() * BLOCK_SIZE];
            for (k, &(_, idx)) in entries.iter().enumerate() {
                let start = idx as usize * BLOCK_SIZE;
                if start >= bytes.len() {
                    continue;
                }
                let end = (start + BLOCK_SIZE).min(bytes.len());
                gather[k * BLOCK_SIZE..k * BLOCK_SIZE + (end - start)].copy_from_slice(&bytes[start..end]);
            }
            let status = self.call_batch_write(w, &ids, &gather)?;
            if status != Status::Success {
                return Err(status_to_error(status));
            }
        }
        if required > self.files[fid].l {
            self.files[fid].l = required;
        }
        Ok(())
    }

    fn check_fid(&self, fid: FileId) -> Result<(), CoordinatorError> {
        if fid < self.files.len() {
            Ok(())
        } else {
            Err(CoordinatorError::InvalidBlock)
        }
    }

    fn locate(&self, fid: FileId, i: FileBlockIndex) -> Option<(WorkerId, BlockId)> {
        for (w, entries) in self.files[fid].nodes.iter().enumerate() {
            if let Some(&(gid, _)) = entries.iter().find(|&&(_, idx)| idx == i) {
                return Some((w, gid));
            }
        }
        None
    }

    /// Allocate a fresh global block for `(fid, file_index)`: bitmap, then
    /// policy, then the worker's `ALLOC_BLOCK`, rolling back every earlier
    /// step on any failure.
    fn allocate_for_write(
        &mut self,
        fid: FileId,
        file_index: FileBlockIndex,
    ) -> Result<(WorkerId, BlockId), CoordinatorError> {
        let gid = self.bitmap.alloc().ok_or(CoordinatorError::NoSpace)? as u64;

        let expected_blocks = self.files[fid].l;
        let view = PolicyView::new(&self.blocks_free);
        let ctx = AllocContext {
            file_id: fid,
            expected_blocks,
        };
        let chosen = self.policy.choose_worker(view, ctx);
        let w = match chosen {
            Some(w) => w,
            None => {
                self.bitmap.free(gid as usize);
                return Err(CoordinatorError::NoSpace);
            }
        };

        self.blocks_free[w] -= 1;
        self.files[fid].nodes[w].push((gid, file_index));
        self.block_owner[gid as usize] = Some(w);

        match self.call(w, Command::AllocBlock, &encode_block_index(gid as i32)) {
            Ok((Status::Success, _)) => Ok((w, gid)),
            Ok((status, _)) => {
                self.rollback_allocation(fid, file_index, w, gid);
                Err(status_to_error(status))
            }
            Err(e) => {
                self.rollback_allocation(fid, file_index, w, gid);
                Err(e)
            }
        }
    }

    fn rollback_allocation(&mut self, fid: FileId, file_index: FileBlockIndex, w: WorkerId, gid: BlockId) {
        warn!(target: "dfs::coordinator", fid, file_index, worker = w, gid, "rolling back failed allocation");
        self.files[fid].nodes[w].retain(|&(g, idx)| !(g == gid && idx == file_index));
        self.block_owner[gid as usize] = None;
        self.blocks_free[w] += 1;
        self.bitmap.free(gid as usize);
    }

    /// Undo one block this call already committed (bitmap bit, `block_owner`,
    /// `nodes` entry, `blocks_free`) after a later block in the same
    /// multi-block operation failed to allocate. Unlike
    /// [`Coordinator::rollback_allocation`], the worker's `ALLOC_BLOCK`
    /// already succeeded for this block, so the worker must also be told to
    /// free it; a failure to reach the worker here is logged, not
    /// propagated, since the caller is already unwinding a prior error.
    fn undo_committed_allocation(
        &mut self,
        fid: FileId,
        w: WorkerId,
        gid: BlockId,
        file_index: FileBlockIndex,
    ) {
        warn!(target: "dfs::coordinator", fid, file_index, worker = w, gid, "undoing already-committed allocation after a later failure");
        self.files[fid].nodes[w].retain(|&(g, idx)| !(g == gid && idx == file_index));
        self.block_owner[gid as usize] = None;
        self.blocks_free[w] += 1;
        self.bitmap.free(gid as usize);
        if let Err(e) = self.call(w, Command::FreeBlock, &encode_block_index(gid as i32)) {
            error!(target: "dfs::coordinator", worker = w, gid, error = %e, "failed to notify worker while undoing allocation");
        }
    }

    /// `dealloc_block(gid)`: free the bitmap bit, tell the owning worker,
    /// restore its free count.
    fn dealloc_block(&mut self, gid: BlockId) -> Result<(), CoordinatorError> {
        let w = self.block_owner[gid as usize]
            .take()
            .ok_or(CoordinatorError::InvalidBlock)?;
        self.bitmap.free(gid as usize);
        let (status, _) = self.call(w, Command::FreeBlock, &encode_block_index(gid as i32))?;
        if status != Status::Success {
            return Err(status_to_error(status));
        }
        self.blocks_free[w] += 1;
        Ok(())
    }

    fn call(
        &mut self,
        w: WorkerId,
        cmd: Command,
        payload: &[u8],
    ) -> Result<(Status, Vec<u8>), CoordinatorError> {
        let channel = &mut self.channels[w];
        channel.send_request(cmd, payload)?;
        let (status, len) = channel.recv_response_header()?;
        let response = channel.read_payload(len as usize)?;
        Ok((status, response))
    }

    fn call_batch_write(
        &mut self,
        w: WorkerId,
        ids: &[i32],
        raw: &[u8],
    ) -> Result<Status, CoordinatorError> {
        let channel = &mut self.channels[w];
        channel.send_request(Command::BatchWrite, &encode_batch_ids(ids))?;
        channel.write_raw(raw)?;
        let (status, len) = channel.recv_response_header()?;
        let _ = channel.read_payload(len as usize)?;
        Ok(status)
    }

    /// Current global free-block count, for tests and invariant checks.
    pub fn free_blocks(&self) -> usize {
        self.bitmap.free_count()
    }

    /// Per-worker free-block counts, for tests and invariant checks.
    pub fn blocks_free(&self) -> &[u64] {
        &self.blocks_free
    }

    /// Total addressable block count `B`.
    pub fn total_blocks(&self) -> usize {
        self.bitmap.len()
    }
}

fn status_to_error(status: Status) -> CoordinatorError {
    match status {
        Status::NoSpace => CoordinatorError::NoSpace,
        Status::InvalidBlock => CoordinatorError::InvalidBlock,
        Status::Success | Status::Fail => CoordinatorError::Fail(Box::new(std::io::Error::new(
            std::io::ErrorKind::Other,
            "worker request failed",
        ))),
    }
}
