//! End-to-end checks of the on-disk format: fresh-file byte layout, header
//! validation on open, and insert/find behavior across root splits.

use minnowdb::btree::{Btree, NodeType};
use minnowdb::storage::{FileHeader, FILE_HEADER_SIZE, FILE_MAGIC};
use minnowdb::DbError;
use tempfile::tempdir;

#[test]
fn fresh_database_file_has_the_expected_bytes() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("t.db");

    Btree::open(&path).unwrap().close().unwrap();

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(bytes.len(), 1024);

    // File header: magic, then the default page size big-endian.
    assert_eq!(&bytes[0..16], FILE_MAGIC);
    assert_eq!(&bytes[0x10..0x12], &[0x04, 0x00]);
    assert_eq!(&bytes[0x12..0x18], &[0x01, 0x01, 0x00, 0x40, 0x20, 0x20]);

    // Node header at offset 100: empty table leaf, free_offset 108,
    // cells_offset 1024, zero cells.
    assert_eq!(
        &bytes[100..108],
        &[0x0D, 0x00, 0x6C, 0x00, 0x00, 0x04, 0x00, 0x00]
    );
}

#[test]
fn header_round_trips_through_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("t.db");

    Btree::open(&path).unwrap().close().unwrap();

    let bt = Btree::open(&path).unwrap();
    let mut raw = [0u8; FILE_HEADER_SIZE];
    bt.pager().read_header(&mut raw).unwrap();

    let mut expected = [0u8; FILE_HEADER_SIZE];
    FileHeader::new(1024).write_to(&mut expected);
    assert_eq!(raw, expected);
}

#[test]
fn open_rejects_a_file_with_garbage_header() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("garbage.db");
    std::fs::write(&path, vec![0xAAu8; 1024]).unwrap();

    assert!(matches!(
        Btree::open(&path),
        Err(DbError::CorruptHeader(_))
    ));
}

#[test]
fn open_rejects_a_tampered_page_size() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("t.db");
    Btree::open(&path).unwrap().close().unwrap();

    let mut bytes = std::fs::read(&path).unwrap();
    bytes[0x10] = 0x12;
    bytes[0x11] = 0x34;
    std::fs::write(&path, &bytes).unwrap();

    assert!(matches!(
        Btree::open(&path),
        Err(DbError::CorruptHeader(_))
    ));
}

#[test]
fn open_rejects_the_foreign_page_cache_fingerprint() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("t.db");
    Btree::open(&path).unwrap().close().unwrap();

    let mut bytes = std::fs::read(&path).unwrap();
    bytes[0x30..0x34].copy_from_slice(&20000u32.to_be_bytes());
    std::fs::write(&path, &bytes).unwrap();

    assert!(matches!(
        Btree::open(&path),
        Err(DbError::CorruptHeader(_))
    ));
}

#[test]
fn single_insert_then_find() {
    let dir = tempdir().unwrap();
    let mut bt = Btree::open(dir.path().join("t.db")).unwrap();

    bt.insert_in_table(1, 42, &[0xDE, 0xAD, 0xBE, 0xEF]).unwrap();

    let data = bt.find(1, 42).unwrap();
    assert_eq!(data, vec![0xDE, 0xAD, 0xBE, 0xEF]);
}

#[test]
fn overflowing_the_root_splits_it_and_keeps_every_key() {
    let dir = tempdir().unwrap();
    let mut bt = Btree::open(dir.path().join("t.db")).unwrap();

    // Insert until the root stops being a leaf, then a few more.
    let mut inserted = 0u32;
    loop {
        inserted += 1;
        bt.insert_in_table(1, inserted, &inserted.to_be_bytes())
            .unwrap();
        let root = bt.get_node_by_page(1).unwrap();
        if root.kind() == NodeType::TableInternal {
            assert!(root.n_cells() >= 1);
            assert_ne!(root.right_page(), 0);
            break;
        }
        assert!(inserted < 10_000, "root never split");
    }
    for key in inserted + 1..inserted + 20 {
        bt.insert_in_table(1, key, &key.to_be_bytes()).unwrap();
    }

    for key in 1..inserted + 20 {
        assert_eq!(
            bt.find(1, key).unwrap(),
            key.to_be_bytes().to_vec(),
            "key {}",
            key
        );
    }
}

#[test]
fn duplicate_keys_are_rejected_without_damage() {
    let dir = tempdir().unwrap();
    let mut bt = Btree::open(dir.path().join("t.db")).unwrap();

    bt.insert_in_table(1, 5, b"original").unwrap();
    assert!(matches!(
        bt.insert_in_table(1, 5, b"usurper"),
        Err(DbError::Duplicate)
    ));
    assert_eq!(bt.find(1, 5).unwrap(), b"original".to_vec());
}

#[test]
fn many_trees_in_one_file() {
    let dir = tempdir().unwrap();
    let mut bt = Btree::open(dir.path().join("t.db")).unwrap();

    let table_a = 1;
    let table_b = bt.new_node(NodeType::TableLeaf).unwrap();
    let index_c = bt.new_node(NodeType::IndexLeaf).unwrap();

    for key in 0..150u32 {
        bt.insert_in_table(table_a, key, b"a").unwrap();
        bt.insert_in_table(table_b, key, b"b").unwrap();
        bt.insert_in_index(index_c, key, key + 1).unwrap();
    }

    for key in 0..150u32 {
        assert_eq!(bt.find(table_a, key).unwrap(), b"a".to_vec());
        assert_eq!(bt.find(table_b, key).unwrap(), b"b".to_vec());
    }
}

#[test]
fn data_survives_close_and_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("t.db");

    {
        let mut bt = Btree::open(&path).unwrap();
        for key in 0..200u32 {
            bt.insert_in_table(1, key, &(key * 3).to_be_bytes()).unwrap();
        }
        bt.close().unwrap();
    }

    let bt = Btree::open(&path).unwrap();
    for key in 0..200u32 {
        assert_eq!(bt.find(1, key).unwrap(), (key * 3).to_be_bytes().to_vec());
    }
}
