//! End-to-end coverage of a full file-set lifecycle: write, commit, copy,
//! and read back from the copy — exercising writer, reader, naming, and
//! copy together rather than any one module in isolation.

use tempfile::tempdir;
use tsfile::compress::CompressionAlgorithm;
use tsfile::copy::copy_file_set;
use tsfile::dellog::{DelLogReader, DelLogWriter};
use tsfile::naming::{self, FileKind};
use tsfile::reader::{FileSetReader, ReaderConfig};
use tsfile::types::{BlockIdx, CellValue, DelData, DelRange, FileDescriptor, SFileSet};
use tsfile::writer::{BlockWrite, ColumnInput, FileSetWriter, WriterConfig};

fn int_column(cid: u32, values: &[i64]) -> ColumnInput {
    ColumnInput {
        cid,
        sma_on: true,
        var_length: false,
        all_null: false,
        bitmap: vec![0u8; values.len().div_ceil(8)],
        offsets: Vec::new(),
        values: values.iter().flat_map(|v| v.to_le_bytes()).collect(),
    }
}

fn text_column(cid: u32, rows: &[&str]) -> ColumnInput {
    let mut offsets = Vec::with_capacity(rows.len() * 4);
    let mut values = Vec::new();
    let mut cursor = 0u32;
    for row in rows {
        offsets.extend_from_slice(&cursor.to_le_bytes());
        values.extend_from_slice(row.as_bytes());
        cursor += row.len() as u32;
    }
    ColumnInput {
        cid,
        sma_on: false,
        var_length: true,
        all_null: false,
        bitmap: vec![0u8; rows.len().div_ceil(8)],
        offsets,
        values,
    }
}

#[test]
fn write_read_copy_round_trips_a_full_file_set() {
    let src_dir = tempdir().unwrap();
    let dst_dir = tempdir().unwrap();

    let n_row = 100u32;
    let tskey: Vec<i64> = (0..n_row as i64).collect();
    let version = vec![1i64; n_row as usize];
    let ints: Vec<i64> = tskey.iter().map(|k| k * 7).collect();
    let strings: Vec<String> = tskey.iter().map(|k| format!("row-{k}")).collect();
    let string_refs: Vec<&str> = strings.iter().map(String::as_str).collect();

    let block = BlockWrite {
        suid: 9,
        uid: 100,
        n_row,
        cmpr_alg: CompressionAlgorithm::None,
        uid_stream: None,
        version,
        tskey: tskey.clone(),
        columns: vec![int_column(1, &ints), text_column(2, &string_refs)],
        aux: Vec::new(),
    };

    let set = SFileSet::new(3, 1, src_dir.path());
    let mut writer = FileSetWriter::open(set, WriterConfig::default()).unwrap();
    let (block_info, sma_info) = writer.write_block_data(&block, true, false).unwrap();
    writer
        .write_block_idx(&[BlockIdx { suid: 9, uid: 100, offset: block_info.offset, size: block_info.sz_block as u64 }])
        .unwrap();
    writer.update_header().unwrap();
    let set = writer.close(true).unwrap();

    // Read directly from the source first.
    {
        let mut reader = FileSetReader::open(set.clone(), ReaderConfig::default()).unwrap();
        let idx = reader.read_block_idx().unwrap();
        assert_eq!(idx.len(), 1);
        let decoded = reader.read_block_data_impl(&block_info, false, 9, 100, &[1, 2]).unwrap();
        assert_eq!(decoded.n_row, n_row);
        assert_eq!(decoded.tskey, tskey);
        if let CellValue::Bytes(raw) = &decoded.columns[0].values[0] {
            assert_eq!(i64::from_le_bytes(raw[..8].try_into().unwrap()), 0);
        } else {
            panic!("expected int column bytes");
        }
        let agg = reader.read_block_sma(&sma_info.unwrap()).unwrap();
        assert_eq!(agg.len(), 1, "only the int column has sma_on set");
        assert_eq!(agg[0].count, n_row as u64);
    }

    // Copy the whole set and verify the copy reads back identically.
    let copied = copy_file_set(&set, dst_dir.path()).unwrap();
    assert_eq!(copied.head, set.head);
    assert_eq!(copied.data, set.data);
    assert_eq!(copied.sma, set.sma);
    assert_eq!(copied.sst, set.sst);

    let mut reader = FileSetReader::open(copied, ReaderConfig::default()).unwrap();
    let idx = reader.read_block_idx().unwrap();
    assert_eq!(idx.len(), 1);
    let decoded = reader.read_block_data_impl(&block_info, false, 9, 100, &[1, 2]).unwrap();
    assert_eq!(decoded.n_row, n_row);
    assert_eq!(decoded.tskey, tskey);
    if let CellValue::Bytes(raw) = &decoded.columns[1].values[0] {
        assert_eq!(raw, b"row-0");
    } else {
        panic!("expected text column bytes");
    }

    // Every copied file exists at its deterministic path under the new root.
    for kind in [FileKind::Head, FileKind::Data, FileKind::Sma] {
        let commit_id = match kind {
            FileKind::Head => set.head.commit_id,
            FileKind::Data => set.data.commit_id,
            FileKind::Sma => set.sma.commit_id,
            FileKind::Sst => unreachable!(),
        };
        let path = naming::file_path(dst_dir.path(), set.disk_id, set.fid, commit_id, kind);
        assert!(path.exists());
    }
}

#[test]
fn multi_session_data_file_accumulates_blocks_across_separate_writer_opens() {
    let dir = tempdir().unwrap();
    let mut set = SFileSet::new(4, 0, dir.path());

    let block_of = |val: i64| BlockWrite {
        suid: 1,
        uid: 5,
        n_row: 3,
        cmpr_alg: CompressionAlgorithm::Lz4,
        uid_stream: None,
        version: vec![1, 1, 1],
        tskey: vec![0, 1, 2],
        columns: vec![int_column(1, &[val, val + 1, val + 2])],
        aux: Vec::new(),
    };

    let first_info;
    {
        let mut writer = FileSetWriter::open(set.clone(), WriterConfig::default()).unwrap();
        let (info, _) = writer.write_block_data(&block_of(10), false, false).unwrap();
        writer.write_block_idx(&[]).unwrap();
        writer.update_header().unwrap();
        set = writer.close(true).unwrap();
        first_info = info;
    }

    let second_info;
    {
        let mut writer = FileSetWriter::open(set.clone(), WriterConfig::default()).unwrap();
        let (info, _) = writer.write_block_data(&block_of(100), false, false).unwrap();
        writer.write_block_idx(&[]).unwrap();
        writer.update_header().unwrap();
        set = writer.close(true).unwrap();
        second_info = info;
    }

    assert!(second_info.offset > first_info.offset);

    let mut reader = FileSetReader::open(set, ReaderConfig::default()).unwrap();
    let first = reader.read_block_data_impl(&first_info, false, 1, 5, &[1]).unwrap();
    let second = reader.read_block_data_impl(&second_info, false, 1, 5, &[1]).unwrap();
    if let CellValue::Bytes(raw) = &first.columns[0].values[0] {
        assert_eq!(i64::from_le_bytes(raw[..8].try_into().unwrap()), 10);
    } else {
        panic!("expected bytes");
    }
    if let CellValue::Bytes(raw) = &second.columns[0].values[0] {
        assert_eq!(i64::from_le_bytes(raw[..8].try_into().unwrap()), 100);
    } else {
        panic!("expected bytes");
    }
}

#[test]
fn delete_log_commit_is_independently_readable() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("v0f1ver0.delete");

    let entry = DelData {
        suid: 1,
        uid: 2,
        ranges: vec![DelRange { skey: 0, ekey: 50, version: 1 }, DelRange { skey: 60, ekey: 70, version: 2 }],
    };
    {
        let mut writer = DelLogWriter::open(&path, FileDescriptor::default()).unwrap();
        let idx = writer.write_del_data(&entry).unwrap();
        writer.write_del_idx(&[idx]).unwrap();
        writer.update_header().unwrap();
        writer.fsync().unwrap();
    }

    let mut reader = DelLogReader::open(&path).unwrap();
    let idx_list = reader.read_del_idx().unwrap();
    assert_eq!(idx_list.len(), 1);
    let got = reader.read_del_data(&idx_list[0]).unwrap();
    assert_eq!(got, entry);
}
