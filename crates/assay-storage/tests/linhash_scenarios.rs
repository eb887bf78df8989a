//! End-to-end scenarios for the linear-hash index and heap files:
//! bulk insert/find, partial delete, reopen, density-driven split and
//! merge, heap tail shrink, and counter persistence.

use assay_common::{LinHashConfig, Record, DEFAULT_CLUSTER_SIZE};
use assay_records::PatientRecord;
use assay_storage::{HeapFile, IdCounter, LinHashIndex, OpenMode};
use tempfile::tempdir;

const CLUSTER: usize = DEFAULT_CLUSTER_SIZE;

fn config() -> LinHashConfig {
    LinHashConfig {
        initial_group_count: 4,
        d_max: 0.75,
        d_min: 0.40,
    }
}

fn key(i: usize) -> String {
    format!("LH{:07}", i)
}

fn patient(i: usize) -> PatientRecord {
    PatientRecord::new(
        &format!("Given{}", i % 100),
        &format!("Family{}", i % 97),
        "02:05:1987",
        &key(i),
    )
}

fn open_index(dir: &tempfile::TempDir) -> LinHashIndex<PatientRecord> {
    LinHashIndex::open(dir.path().join("pcr"), CLUSTER, config()).unwrap()
}

/// Keys reachable through the public lookup path must agree with the
/// records physically resident in the two heap files.
fn assert_residency(index: &LinHashIndex<PatientRecord>, expected_keys: &[String]) {
    let mut resident: Vec<String> = index
        .all_records()
        .unwrap()
        .iter()
        .map(|r| r.id().to_string())
        .collect();
    resident.sort();

    let mut expected: Vec<String> = expected_keys.to_vec();
    expected.sort();
    assert_eq!(resident, expected);

    for k in expected_keys {
        assert!(index.find_by_id(k).unwrap().is_some(), "unreachable key {}", k);
    }
}

#[test]
fn s1_insert_and_find_thousand() {
    let dir = tempdir().unwrap();
    let index = open_index(&dir);

    for i in 0..1000 {
        index.insert(patient(i)).unwrap();
    }
    assert_eq!(index.total_records(), 1000);

    for i in 0..1000 {
        let found = index.find_by_id(&key(i)).unwrap().unwrap();
        assert_eq!(found.id(), key(i));
        assert_eq!(found.given_name(), format!("Given{}", i % 100));
    }
}

#[test]
fn s2_partial_delete() {
    let dir = tempdir().unwrap();
    let index = open_index(&dir);

    for i in 0..1000 {
        index.insert(patient(i)).unwrap();
    }
    for i in 0..500 {
        assert!(index.delete_by_id(&key(i)).unwrap(), "failed to delete {}", key(i));
    }
    assert_eq!(index.total_records(), 500);

    for i in 0..500 {
        assert_eq!(index.find_by_id(&key(i)).unwrap(), None);
    }
    for i in 500..1000 {
        let found = index.find_by_id(&key(i)).unwrap().unwrap();
        assert_eq!(found, patient(i));
    }

    // Tail-shrink invariant: no dangling run of empty blocks past the
    // live data. The primary file keeps exactly one block per group;
    // the overflow file's last block, if any, is non-empty.
    assert_eq!(index.primary_block_count(), index.group_count());
    let overflow_path = dir.path().join("pcr_lh_overflow.dat");
    drop(index);
    let overflow: HeapFile<PatientRecord> =
        HeapFile::open(&overflow_path, CLUSTER, OpenMode::Strict).unwrap();
    if overflow.block_count() > 1 {
        let last = overflow.read_block(overflow.block_count() - 1).unwrap();
        assert!(!last.is_empty());
    }
}

#[test]
fn s3_reopen_preserves_structure() {
    let dir = tempdir().unwrap();

    let (total, level, split_ptr, group_count, dump) = {
        let index = open_index(&dir);
        for i in 0..1000 {
            index.insert(patient(i)).unwrap();
        }
        for i in 0..500 {
            index.delete_by_id(&key(i)).unwrap();
        }
        let snapshot = (
            index.total_records(),
            index.level(),
            index.split_ptr(),
            index.group_count(),
            index.dump_structure().unwrap(),
        );
        index.close().unwrap();
        snapshot
    };

    let index = open_index(&dir);
    assert_eq!(index.total_records(), total);
    assert_eq!(index.level(), level);
    assert_eq!(index.split_ptr(), split_ptr);
    assert_eq!(index.group_count(), group_count);
    assert_eq!(index.dump_structure().unwrap(), dump);

    let keys: Vec<String> = (500..1000).map(key).collect();
    assert_residency(&index, &keys);
}

#[test]
fn s4_density_triggers_split() {
    let dir = tempdir().unwrap();
    let index = open_index(&dir);
    let capacity = 4u64; // 53-byte records, 256-byte cluster

    let mut inserted = Vec::new();
    loop {
        let groups_before = index.group_count();
        let split_before = index.split_ptr();
        let level_before = index.level();
        let blocks_before = index.primary_block_count();
        let slots_before =
            (index.primary_block_count() + index.overflow_block_count()) as u64 * capacity;

        let i = inserted.len();
        index.insert(patient(i)).unwrap();
        inserted.push(key(i));

        if index.group_count() > groups_before {
            // The split fired exactly when this insert pushed the
            // density past the threshold.
            let would_be = (inserted.len() as f64) / (slots_before as f64);
            assert!(would_be > 0.75, "split fired at density {}", would_be);

            assert_eq!(index.group_count(), groups_before + 1);
            assert_eq!(index.primary_block_count(), blocks_before + 1);
            if split_before + 1 < 4 {
                assert_eq!(index.split_ptr(), split_before + 1);
                assert_eq!(index.level(), level_before);
            } else {
                assert_eq!(index.split_ptr(), 0);
                assert_eq!(index.level(), level_before + 1);
            }
            break;
        }
        assert!(inserted.len() < 1000, "split never triggered");
    }

    assert!(index.density() <= 0.75 + 1e-9);
    assert_residency(&index, &inserted);
}

#[test]
fn s5_density_triggers_merge() {
    let dir = tempdir().unwrap();
    let index = open_index(&dir);

    // Grow well past the initial group count.
    let mut live: Vec<usize> = Vec::new();
    for i in 0..200 {
        index.insert(patient(i)).unwrap();
        live.push(i);
    }
    assert!(index.group_count() > 4);

    let mut merged = false;
    while let Some(i) = live.pop() {
        let groups_before = index.group_count();
        let split_before = index.split_ptr();
        let level_before = index.level();

        assert!(index.delete_by_id(&key(i)).unwrap());

        if index.group_count() < groups_before {
            merged = true;
            assert_eq!(index.group_count(), groups_before - 1);
            if split_before > 0 {
                assert_eq!(index.split_ptr(), split_before - 1);
                assert_eq!(index.level(), level_before);
            } else {
                assert_eq!(index.level(), level_before - 1);
                assert_eq!(index.split_ptr(), (4 << index.level()) - 1);
            }

            let keys: Vec<String> = live.iter().map(|&i| key(i)).collect();
            assert_residency(&index, &keys);
            break;
        }
    }
    assert!(merged, "merge never triggered");
}

#[test]
fn s6_heap_shrink_to_single_block() {
    let dir = tempdir().unwrap();
    let heap: HeapFile<PatientRecord> =
        HeapFile::open(dir.path().join("plain.dat"), CLUSTER, OpenMode::BestEffort).unwrap();

    let mut addrs = Vec::new();
    for i in 0..50 {
        addrs.push(heap.insert(patient(i)).unwrap());
    }

    let mut prev = heap.block_count();
    for addr in addrs.iter().rev() {
        assert!(heap.delete(*addr).unwrap());
        assert!(heap.block_count() <= prev);
        prev = heap.block_count();
    }

    assert_eq!(heap.total_valid_records(), 0);
    assert_eq!(heap.block_count(), 1);
}

#[test]
fn delete_down_to_empty_keeps_initial_groups() {
    let dir = tempdir().unwrap();
    let index = open_index(&dir);

    index.insert(patient(0)).unwrap();
    assert!(index.delete_by_id(&key(0)).unwrap());

    assert_eq!(index.total_records(), 0);
    assert_eq!(index.group_count(), 4);
    assert_eq!(index.primary_block_count(), 4);
    assert!(index.overflow_block_count() <= 1);
    assert_eq!(index.find_by_id(&key(0)).unwrap(), None);
}

#[test]
fn reopen_after_heavy_churn() {
    let dir = tempdir().unwrap();
    let mut live: Vec<usize> = Vec::new();

    {
        let index = open_index(&dir);
        for i in 0..600 {
            index.insert(patient(i)).unwrap();
            live.push(i);
        }
        // Drop every third key.
        let mut kept = Vec::new();
        for i in live.drain(..) {
            if i % 3 == 0 {
                assert!(index.delete_by_id(&key(i)).unwrap());
            } else {
                kept.push(i);
            }
        }
        live = kept;
        index.close().unwrap();
    }

    let index = open_index(&dir);
    assert_eq!(index.total_records(), live.len() as u64);
    let keys: Vec<String> = live.iter().map(|&i| key(i)).collect();
    assert_residency(&index, &keys);

    // The reopened index keeps absorbing work.
    for i in 600..650 {
        index.insert(patient(i)).unwrap();
    }
    assert_eq!(index.total_records(), (live.len() + 50) as u64);
}

#[test]
fn edit_survives_reopen() {
    let dir = tempdir().unwrap();
    {
        let index = open_index(&dir);
        for i in 0..50 {
            index.insert(patient(i)).unwrap();
        }
        let updated = PatientRecord::new("Edited", "Person", "01:01:2000", &key(7));
        assert!(index.edit_by_id(&updated).unwrap());
        index.close().unwrap();
    }

    let index = open_index(&dir);
    let found = index.find_by_id(&key(7)).unwrap().unwrap();
    assert_eq!(found.given_name(), "Edited");
    assert_eq!(index.total_records(), 50);
}

#[test]
fn id_counters_persist_across_restart() {
    let dir = tempdir().unwrap();
    let patients_base = dir.path().join("patients");
    let tests_base = dir.path().join("tests");

    let id_path = format!("{}_id_counter.dat", patients_base.display());
    let code_path = format!("{}_code_counter.dat", tests_base.display());

    {
        let mut patient_ids = IdCounter::open(&id_path);
        let mut test_codes = IdCounter::open(&code_path);
        assert_eq!(patient_ids.bump(), 1);
        assert_eq!(patient_ids.bump(), 2);
        assert_eq!(test_codes.bump(), 1);
    }

    let patient_ids = IdCounter::open(&id_path);
    let test_codes = IdCounter::open(&code_path);
    assert_eq!(patient_ids.peek(), 3);
    assert_eq!(test_codes.peek(), 2);
}
