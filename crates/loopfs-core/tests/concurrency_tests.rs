//! Concurrency tests.
//!
//! Handlers are driven from many OS threads at once. A stat delay in the
//! memory store keeps every racing lookup inside its I/O window together, so
//! registrations genuinely collide.

mod common;

use common::{MemoryStore, memory_core, memory_core_with};
use loopfs_core::ROOT_INODE;
use std::collections::HashSet;
use std::ffi::OsStr;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

#[test]
fn test_concurrent_lookups_of_same_new_name() {
    let store = MemoryStore::new().with_stat_delay(Duration::from_millis(5));
    store.add_file("/contended", b"x");
    let (_store, core) = memory_core_with(store);
    let core = Arc::new(core);

    let threads = 16;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let core = Arc::clone(&core);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                core.lookup(ROOT_INODE, OsStr::new("contended"))
                    .unwrap()
                    .attr
                    .ino
            })
        })
        .collect();

    let inodes: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(inodes.iter().all(|&i| i == inodes[0]), "inodes: {inodes:?}");
    assert_eq!(core.inodes().len(), 2);
}

#[test]
fn test_readdir_and_lookup_race_agree() {
    let store = MemoryStore::new().with_stat_delay(Duration::from_millis(1));
    for i in 0..20 {
        store.add_file(&format!("/f{i}"), b"");
    }
    let (_store, core) = memory_core_with(store);
    let core = Arc::new(core);
    let barrier = Arc::new(Barrier::new(2));

    let lister = {
        let core = Arc::clone(&core);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            core.readdir(ROOT_INODE, 0, 0)
                .unwrap()
                .entries
                .into_iter()
                .map(|e| (e.name.into_string().unwrap(), e.attr.ino))
                .collect::<Vec<_>>()
        })
    };
    let looker = {
        let core = Arc::clone(&core);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            (0..20)
                .rev()
                .map(|i| {
                    let name = format!("f{i}");
                    let ino = core.lookup(ROOT_INODE, OsStr::new(&name)).unwrap().attr.ino;
                    (name, ino)
                })
                .collect::<Vec<_>>()
        })
    };

    let mut listed = lister.join().unwrap();
    let mut looked = looker.join().unwrap();
    listed.sort();
    looked.sort();
    assert_eq!(listed, looked);
    assert_eq!(core.inodes().len(), 21);
}

#[test]
fn test_parallel_distinct_lookups_get_distinct_inodes() {
    let (store, core) = memory_core();
    for t in 0..8 {
        store.add_dir(&format!("/t{t}"));
        for i in 0..25 {
            store.add_file(&format!("/t{t}/f{i}"), b"");
        }
    }
    let core = Arc::new(core);

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let core = Arc::clone(&core);
            thread::spawn(move || {
                let dir = core
                    .lookup(ROOT_INODE, OsStr::new(&format!("t{t}")))
                    .unwrap()
                    .attr
                    .ino;
                (0..25)
                    .map(|i| {
                        core.lookup(dir, OsStr::new(&format!("f{i}")))
                            .unwrap()
                            .attr
                            .ino
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let all: Vec<u64> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
    let unique: HashSet<u64> = all.iter().copied().collect();
    assert_eq!(unique.len(), 200);
    assert!(!unique.contains(&ROOT_INODE));

    // root + 8 dirs + 200 files
    assert_eq!(core.inodes().len(), 209);
}

#[test]
fn test_concurrent_open_read_release() {
    let (store, core) = memory_core();
    let content: Vec<u8> = (0..=255u8).cycle().take(64 * 1024).collect();
    store.add_file("/shared.bin", &content);
    let ino = core
        .lookup(ROOT_INODE, OsStr::new("shared.bin"))
        .unwrap()
        .attr
        .ino;
    let core = Arc::new(core);
    let content = Arc::new(content);

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let core = Arc::clone(&core);
            let content = Arc::clone(&content);
            thread::spawn(move || {
                for round in 0..50 {
                    let fh = core.open(ino, libc::O_RDONLY).unwrap();
                    let offset = (t * 997 + round * 131) % content.len();
                    let data = core.read(ino, fh, offset as i64, 4096).unwrap();
                    let end = (offset + 4096).min(content.len());
                    assert_eq!(data, &content[offset..end]);
                    core.release(ino, fh);
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(store.open_files(), 0);
    assert!(core.handles().is_empty());
}
