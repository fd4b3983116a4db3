//! Concrete scenarios S1-S6 and the invariant checks from the "no-space"
//! and "exit cleanup" properties.

mod support;

use dfs_api::types::BLOCK_SIZE;
use support::Harness;

fn padded(content: &[u8]) -> Vec<u8> {
    let mut buf = vec![0u8; BLOCK_SIZE];
    buf[..content.len()].copy_from_slice(content);
    buf
}

#[test]
fn s1_single_worker_write_then_read_file() {
    let mut h = Harness::new(1, 3 * BLOCK_SIZE as u64, "roundrobin");
    let fid = h.coordinator.create_file("a", 256).unwrap();
    h.coordinator
        .write_block(fid, 0, &padded(b"Hello"))
        .unwrap();
    let buf = h.coordinator.read_file(fid).unwrap();
    assert_eq!(buf.len(), BLOCK_SIZE);
    assert_eq!(&buf[0..5], b"Hello");
    assert!(buf[5..].iter().all(|&b| b == 0));
    h.coordinator.exit(true).unwrap();
}

#[test]
fn s2_round_robin_spreads_first_files_across_workers() {
    let mut h = Harness::new(2, 10 * BLOCK_SIZE as u64, "roundrobin");
    let f0 = h.coordinator.create_file("f0", BLOCK_SIZE as u64).unwrap();
    h.coordinator.write_block(f0, 0, &padded(b"one")).unwrap();
    let f1 = h.coordinator.create_file("f1", BLOCK_SIZE as u64).unwrap();
    h.coordinator.write_block(f1, 0, &padded(b"two")).unwrap();

    let free_after = h.coordinator.blocks_free().to_vec();
    // Each worker started with 5 free blocks; one block went to each.
    assert_eq!(free_after, vec![4, 4]);
    assert_eq!(&h.coordinator.read_file(f0).unwrap()[0..3], b"one");
    assert_eq!(&h.coordinator.read_file(f1).unwrap()[0..3], b"two");
    h.coordinator.exit(true).unwrap();
}

#[test]
fn s3_sixth_write_returns_no_space_and_leaves_bitmap_exhausted() {
    let mut h = Harness::new(2, 5 * BLOCK_SIZE as u64, "roundrobin");
    let mut fids = Vec::new();
    for i in 0..6 {
        let fid = h
            .coordinator
            .create_file(&format!("f{i}"), BLOCK_SIZE as u64)
            .unwrap();
        fids.push(fid);
    }
    for &fid in &fids[0..5] {
        h.coordinator.write_block(fid, 0, &padded(b"x")).unwrap();
    }
    let result = h.coordinator.write_block(fids[5], 0, &padded(b"y"));
    assert!(matches!(
        result,
        Err(dfs_core::error::CoordinatorError::NoSpace)
    ));
    assert_eq!(h.coordinator.free_blocks(), 0);
    h.coordinator.exit(true).unwrap();
}

#[test]
fn s4_truncate_shrink_frees_blocks_and_keeps_prefix() {
    let mut h = Harness::new(2, 20 * BLOCK_SIZE as u64, "roundrobin");
    let fid = h
        .coordinator
        .create_file("t", 3 * BLOCK_SIZE as u64)
        .unwrap();
    h.coordinator.write_block(fid, 0, &padded(b"block0")).unwrap();
    h.coordinator.write_block(fid, 1, &padded(b"block1")).unwrap();
    h.coordinator.write_block(fid, 2, &padded(b"block2")).unwrap();
    let free_before = h.coordinator.free_blocks();

    h.coordinator
        .truncate_file(fid, BLOCK_SIZE as u64)
        .unwrap();
    let buf = h.coordinator.read_file(fid).unwrap();
    assert_eq!(buf.len(), BLOCK_SIZE);
    assert_eq!(&buf[0..6], b"block0");
    assert_eq!(h.coordinator.free_blocks(), free_before + 2);
    h.coordinator.exit(true).unwrap();
}

#[test]
fn s5_truncate_grow_after_shrink_zero_fills_extension() {
    let mut h = Harness::new(2, 20 * BLOCK_SIZE as u64, "roundrobin");
    let fid = h
        .coordinator
        .create_file("t", 3 * BLOCK_SIZE as u64)
        .unwrap();
    h.coordinator.write_block(fid, 0, &padded(b"block0")).unwrap();
    h.coordinator.write_block(fid, 1, &padded(b"block1")).unwrap();
    h.coordinator.write_block(fid, 2, &padded(b"block2")).unwrap();
    h.coordinator
        .truncate_file(fid, BLOCK_SIZE as u64)
        .unwrap();

    h.coordinator
        .truncate_file(fid, 5 * BLOCK_SIZE as u64)
        .unwrap();
    let buf = h.coordinator.read_file(fid).unwrap();
    assert_eq!(buf.len(), 5 * BLOCK_SIZE);
    assert_eq!(&buf[0..6], b"block0");
    assert!(buf[BLOCK_SIZE..].iter().all(|&b| b == 0));
    h.coordinator.exit(true).unwrap();
}

#[test]
fn s6_rand_policy_writes_two_blocks_and_reads_them_back_in_order() {
    let mut h = Harness::new(4, 4 * BLOCK_SIZE as u64, "rand");
    let fid = h.coordinator.create_file("m", 4096 + 512).unwrap();
    h.coordinator.write_block(fid, 0, &padded(b"first")).unwrap();
    h.coordinator.write_block(fid, 1, &padded(b"second")).unwrap();
    let buf = h.coordinator.read_file(fid).unwrap();
    assert_eq!(buf.len(), 2 * BLOCK_SIZE);
    assert_eq!(&buf[0..5], b"first");
    assert_eq!(&buf[BLOCK_SIZE..BLOCK_SIZE + 6], b"second");
    h.coordinator.exit(true).unwrap();
}

#[test]
fn truncate_is_idempotent() {
    let mut h = Harness::new(1, 10 * BLOCK_SIZE as u64, "roundrobin");
    let fid = h
        .coordinator
        .create_file("t", 4 * BLOCK_SIZE as u64)
        .unwrap();
    h.coordinator.write_block(fid, 0, &padded(b"x")).unwrap();
    h.coordinator
        .truncate_file(fid, 2 * BLOCK_SIZE as u64)
        .unwrap();
    let free_after_first = h.coordinator.free_blocks();
    h.coordinator
        .truncate_file(fid, 2 * BLOCK_SIZE as u64)
        .unwrap();
    assert_eq!(h.coordinator.free_blocks(), free_after_first);
    h.coordinator.exit(true).unwrap();
}

#[test]
fn sparse_read_on_allocated_but_never_written_index_is_zero() {
    let mut h = Harness::new(1, 4 * BLOCK_SIZE as u64, "roundrobin");
    let fid = h
        .coordinator
        .create_file("t", 2 * BLOCK_SIZE as u64)
        .unwrap();
    // Index 1 is never written; it must read as zeros without being
    // allocated at all.
    let block = h.coordinator.read_block(fid, 1).unwrap();
    assert!(block.iter().all(|&b| b == 0));
    h.coordinator.exit(true).unwrap();
}

#[test]
fn write_file_read_file_round_trip() {
    let mut h = Harness::new(2, 10 * BLOCK_SIZE as u64, "leastloaded");
    let fid = h
        .coordinator
        .create_file("t", 3 * BLOCK_SIZE as u64)
        .unwrap();
    let mut content = vec![7u8; 2 * BLOCK_SIZE + 100];
    content[0] = 1;
    h.coordinator.write_file(fid, &content).unwrap();
    let buf = h.coordinator.read_file(fid).unwrap();
    assert_eq!(buf[..content.len()], content[..]);
    assert!(buf[content.len()..].iter().all(|&b| b == 0));
    h.coordinator.exit(true).unwrap();
}

#[test]
fn write_file_rolls_back_blocks_it_already_committed_on_later_no_space() {
    let mut h = Harness::new(1, 3 * BLOCK_SIZE as u64, "roundrobin");
    let fid = h
        .coordinator
        .create_file("t", 3 * BLOCK_SIZE as u64)
        .unwrap();
    // Only 3 blocks of capacity exist; this write needs 5, so the 4th
    // allocation fails and the first 3 must be rolled back.
    let content = vec![9u8; 5 * BLOCK_SIZE];
    let result = h.coordinator.write_file(fid, &content);
    assert!(matches!(
        result,
        Err(dfs_core::error::CoordinatorError::NoSpace)
    ));
    assert_eq!(h.coordinator.free_blocks(), 3);
    assert_eq!(h.coordinator.blocks_free().to_vec(), vec![3u64]);

    // The bitmap and per-worker accounting must be clean enough to reuse.
    let fid2 = h.coordinator.create_file("u", BLOCK_SIZE as u64).unwrap();
    h.coordinator
        .write_block(fid2, 0, &padded(b"still works"))
        .unwrap();
    assert_eq!(&h.coordinator.read_file(fid2).unwrap()[0..11], b"still works");
    h.coordinator.exit(true).unwrap();
}

#[test]
fn find_file_reports_file_dne_for_unknown_name() {
    let mut h = Harness::new(1, BLOCK_SIZE as u64, "roundrobin");
    h.coordinator.create_file("known", BLOCK_SIZE as u64).unwrap();
    assert!(matches!(
        h.coordinator.find_file("missing"),
        Err(dfs_core::error::CoordinatorError::FileDne)
    ));
    assert_eq!(h.coordinator.find_file("known").unwrap(), 0);
    h.coordinator.exit(true).unwrap();
}

#[test]
fn bitmap_accounting_invariant_holds_across_operations() {
    let mut h = Harness::new(3, 9 * BLOCK_SIZE as u64, "leastloaded");
    let total = h.coordinator.total_blocks();
    let fid = h
        .coordinator
        .create_file("t", 4 * BLOCK_SIZE as u64)
        .unwrap();
    for i in 0..4 {
        h.coordinator.write_block(fid, i, &padded(b"z")).unwrap();
    }
    let free_sum: u64 = h.coordinator.blocks_free().iter().sum();
    assert_eq!(free_sum as usize, h.coordinator.free_blocks());
    assert_eq!(total - h.coordinator.free_blocks(), 4);
    h.coordinator.exit(true).unwrap();
}
