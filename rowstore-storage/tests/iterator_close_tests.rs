use std::thread;

use rowstore_result::Error;
use rowstore_storage::{CloseableRowIterator, StoreOptions};
use rowstore_test_utils::capture_log_levels;

use store_harness::{mixed_spec, random_rows, read_all, scenario_rows, write_store};

#[test]
fn iterator_closes_itself_at_the_end() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let (spec, rows) = scenario_rows();
    let store = write_store(&tmp.path().join("t.bin"), &spec, &rows, StoreOptions::default());

    let mut it = store.iter().expect("iter");
    for _ in 0..3 {
        assert!(it.has_next());
        it.next_row().expect("row");
    }
    assert!(it.is_closed());
    assert!(!it.has_next());
    assert!(matches!(it.next_row(), Err(Error::EndOfTable)));
    assert!(!it.close(), "already closed by reaching the end");
}

#[test]
fn closed_iterator_returns_invalid_rows_and_warns_once() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let (spec, rows) = scenario_rows();
    let store = write_store(&tmp.path().join("t.bin"), &spec, &rows, StoreOptions::default());

    let mut it = store.iter().expect("iter");
    assert_eq!(it.next_row().expect("row"), rows[0]);
    assert!(it.close());
    assert!(!it.close());

    let (tail, levels) = capture_log_levels(|| {
        let mut tail = Vec::new();
        while it.has_next() {
            tail.push(it.next_row().expect("row"));
        }
        tail
    });
    assert_eq!(levels.warn, 1);
    assert_eq!(tail.len(), 2);
    assert_eq!(tail[0].key.as_str(), "INVALID_ROW (table is closed) - (Row 1)");
    assert_eq!(tail[1].key.as_str(), "INVALID_ROW (table is closed) - (Row 2)");
    assert!(tail.iter().all(|r| r.cells.iter().all(|c| c.is_missing())));
    assert_eq!(tail[0].num_cells(), 2);
    assert!(matches!(it.next_row(), Err(Error::EndOfTable)));
}

#[test]
fn independent_iterators_do_not_interfere() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let rows = random_rows(3, 40);
    let path = tmp.path().join("t.bin");
    let store = write_store(&path, &mixed_spec(), &rows, StoreOptions::default());

    let mut a = store.iter().expect("iter a");
    let mut b = store.iter().expect("iter b");
    let mut from_a = Vec::new();
    let mut from_b = Vec::new();
    while a.has_next() {
        from_a.push(a.next_row().expect("a"));
        if a.has_next() {
            from_a.push(a.next_row().expect("a"));
        }
        from_b.push(b.next_row().expect("b"));
    }
    from_b.extend(b.by_ref());
    assert_eq!(from_a, rows);
    assert_eq!(from_b, rows);

    a.close();
    assert_eq!(read_all(&store), rows);
}

#[test]
fn close_from_another_thread_never_tears_a_row() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let rows = random_rows(11, 2_000);
    let path = tmp.path().join("t.bin");
    let store = write_store(&path, &mixed_spec(), &rows, StoreOptions::default());

    let mut it = store.iter().expect("iter");
    let handle = it.close_handle();
    let seen = thread::scope(|s| {
        let closer = s.spawn(move || {
            thread::yield_now();
            handle.close()
        });
        let mut seen = Vec::new();
        while it.has_next() {
            seen.push(it.next_row().expect("row"));
        }
        closer.join().expect("closer thread");
        seen
    });

    assert_eq!(seen.len(), rows.len());
    for (i, (got, want)) in seen.iter().zip(&rows).enumerate() {
        if got.key.as_str().starts_with("INVALID_ROW") {
            assert_eq!(got.key.as_str(), format!("INVALID_ROW (table is closed) - (Row {i})"));
            assert!(got.cells.iter().all(|c| c.is_missing()));
        } else {
            assert_eq!(got, want);
        }
    }
}

#[test]
fn dropping_an_open_iterator_closes_it() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let (spec, rows) = scenario_rows();
    let store = write_store(&tmp.path().join("t.bin"), &spec, &rows, StoreOptions::default());

    let mut it = store.iter().expect("iter");
    it.next_row().expect("row");
    let handle = it.close_handle();
    let ((), levels) = capture_log_levels(|| drop(it));
    assert!(handle.is_closed());
    assert_eq!(levels.debug, 1);
}

#[test]
fn temporary_store_outlives_its_handle_while_iterated() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let path = tmp.path().join("t.bin");
    let (spec, rows) = scenario_rows();
    let store = write_store(
        &path,
        &spec,
        &rows,
        StoreOptions::default().with_delete_on_drop(true),
    );

    let mut it: Box<dyn CloseableRowIterator> = Box::new(store.iter().expect("iter"));
    drop(store);
    assert!(path.exists());
    assert_eq!(it.next(), Some(rows[0].clone()));
    it.close();
    assert!(path.exists());
    drop(it);
    assert!(!path.exists());
}
