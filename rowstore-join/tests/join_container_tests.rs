//! Integration tests for the join result container.

use std::sync::Arc;
use std::thread;

use rowstore_join::{
    InputTable, JoinContainer, JoinContainerOptions, JoinSpecification, JoinTableSettings,
    ResultType, RowKeyStrategy,
};
use rowstore_result::Error;
use rowstore_storage::{
    BufferedTable, ContainerOptions, DataCell, DataRow, DefaultExecutionContext,
    ExecutionContext, RowKey, TableSpec,
};
use rowstore_test_utils::init_tracing_for_tests;

fn left_row(i: i32) -> DataRow {
    DataRow::new(
        format!("l{i}"),
        vec![DataCell::from(i), DataCell::from(format!("left-{i}"))],
    )
}

fn right_row(i: i32) -> DataRow {
    DataRow::new(
        format!("r{i}"),
        vec![DataCell::from(i), DataCell::from(f64::from(i) * 1.5)],
    )
}

fn left_table(n: i32) -> BufferedTable {
    BufferedTable::from_rows(
        TableSpec::from_names(["id", "name"]),
        (0..n).map(left_row).collect(),
    )
    .expect("left table")
}

fn right_table(n: i32) -> BufferedTable {
    BufferedTable::from_rows(
        TableSpec::from_names(["id", "value"]),
        (0..n).map(right_row).collect(),
    )
    .expect("right table")
}

fn spec(retain_left: bool, retain_right: bool) -> JoinSpecification {
    JoinSpecification::new(
        JoinTableSettings::for_table(left_table(4)).with_retain_unmatched(retain_left),
        JoinTableSettings::for_table(right_table(4)).with_retain_unmatched(retain_right),
    )
}

fn ctx() -> Arc<dyn ExecutionContext> {
    Arc::new(DefaultExecutionContext::default())
}

fn keys(table: &BufferedTable) -> Vec<String> {
    table
        .rows()
        .expect("rows")
        .into_iter()
        .map(|row| row.key.into_string())
        .collect()
}

#[test]
fn duplicate_matches_are_kept_without_dedup() {
    init_tracing_for_tests();
    let mut join =
        JoinContainer::split(spec(false, false), ctx(), JoinContainerOptions::default())
            .expect("container");
    let (a, b) = (left_row(0), right_row(0));
    join.offer_match(&a, 0, &b, 0).expect("offer");
    join.offer_match(&a, 0, &b, 0).expect("offer");

    let out = join.finish().expect("finish");
    assert_eq!(out.tables.matches.row_count(), 2);
}

#[test]
fn dedup_materializes_each_offset_pair_once() {
    let mut join =
        JoinContainer::split(spec(false, false), ctx(), JoinContainerOptions::default())
            .expect("container");
    join.deduplicate_matches();
    join.deduplicate_matches();
    assert!(join.is_deduplicating());

    let (a, b) = (left_row(0), right_row(0));
    join.offer_match(&a, 0, &b, 0).expect("offer");
    join.offer_match(&a, 0, &b, 0).expect("offer");
    join.offer_match(&a, 0, &right_row(1), 1).expect("offer");

    let out = join.finish().expect("finish");
    assert_eq!(keys(&out.tables.matches), ["l0_r0", "l0_r1"]);
    let row = &out.tables.matches.rows().expect("rows")[0];
    assert_eq!(
        row.cells,
        vec![
            DataCell::from(0),
            DataCell::from("left-0"),
            DataCell::from(0),
            DataCell::from(0.0),
        ]
    );
}

#[test]
fn dedup_enabled_mid_stream_only_affects_later_offers() {
    let mut join =
        JoinContainer::split(spec(false, false), ctx(), JoinContainerOptions::default())
            .expect("container");
    let (a, b) = (left_row(0), right_row(0));
    join.offer_match(&a, 0, &b, 0).expect("offer");
    join.deduplicate_matches();
    join.offer_match(&a, 0, &b, 0).expect("offer");
    join.offer_match(&a, 0, &b, 0).expect("offer");

    let out = join.finish().expect("finish");
    assert_eq!(out.tables.matches.row_count(), 2);
}

#[test]
fn dedup_rejects_offsets_beyond_32_bits() {
    let mut join =
        JoinContainer::split(spec(false, false), ctx(), JoinContainerOptions::default())
            .expect("container");
    join.deduplicate_matches();
    let err = join
        .offer_match(&left_row(0), u64::from(u32::MAX) + 1, &right_row(0), 0)
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArgumentError(_)));
}

#[test]
fn rejected_match_leaves_no_matched_offsets_behind() {
    let mut join = JoinContainer::split(spec(true, true), ctx(), JoinContainerOptions::default())
        .expect("container");
    join.deduplicate_matches();
    let wide = u64::from(u32::MAX) + 1;
    assert!(join.offer_match(&left_row(0), wide, &right_row(0), 0).is_err());

    // Right offset 0 was never marked matched, so it still counts as unmatched.
    join.offer_right_outer(&right_row(0), 0).expect("offer");

    let out = join.finish().expect("finish");
    assert_eq!(out.tables.matches.row_count(), 0);
    assert_eq!(keys(&out.tables.right_unmatched), ["?_r0"]);
}

#[test]
fn pass_through_outputs_unmatched_rows_unless_matched_before() {
    let mut join =
        JoinContainer::split(spec(true, true), ctx(), JoinContainerOptions::default())
            .expect("container");
    join.offer_match(&left_row(0), 0, &right_row(2), 2).expect("match");
    join.offer_left_outer(&left_row(1), 1).expect("left outer");
    // A later pass reports rows as unmatched that matched in an earlier one.
    join.offer_left_outer(&left_row(0), 0).expect("left outer");
    join.offer_right_outer(&right_row(2), 2).expect("right outer");
    join.offer_right_outer(&right_row(3), 3).expect("right outer");

    let out = join.finish().expect("finish");
    assert_eq!(keys(&out.tables.matches), ["l0_r2"]);
    assert_eq!(keys(&out.tables.left_unmatched), ["l1_?"]);
    assert_eq!(keys(&out.tables.right_unmatched), ["?_r3"]);
}

#[test]
fn unmatched_rows_dropped_when_not_retained() {
    let mut join = JoinContainer::split(
        spec(false, true).with_retain_matched(false),
        ctx(),
        JoinContainerOptions::default(),
    )
    .expect("container");
    join.offer_match(&left_row(0), 0, &right_row(0), 0).expect("match");
    join.offer_left_outer(&left_row(1), 1).expect("left outer");
    join.offer_right_outer(&right_row(0), 0).expect("right outer");
    join.offer_right_outer(&right_row(1), 1).expect("right outer");

    let out = join.finish().expect("finish");
    assert_eq!(out.tables.matches.row_count(), 0);
    assert_eq!(out.tables.left_unmatched.row_count(), 0);
    assert_eq!(keys(&out.tables.right_unmatched), ["?_r1"]);
}

#[test]
fn deferred_side_collects_never_matched_rows_at_finish() {
    let mut join =
        JoinContainer::split(spec(true, false), ctx(), JoinContainerOptions::default())
            .expect("container");
    join.offer_match(&left_row(0), 0, &right_row(0), 0).expect("match");
    join.defer_unmatched_rows(InputTable::Left).expect("defer");
    // Deferring a side without retention is a no-op.
    join.defer_unmatched_rows(InputTable::Right).expect("defer");
    join.offer_match(&left_row(2), 2, &right_row(1), 1).expect("match");
    join.offer_left_outer(&left_row(1), 1).expect("left outer");

    let out = join.finish().expect("finish");
    assert_eq!(keys(&out.tables.left_unmatched), ["l1_?", "l3_?"]);
    assert_eq!(keys(&out.tables.matches), ["l0_r0", "l2_r1"]);
}

#[test]
fn collect_for_result_type_only_touches_its_side() {
    let mut join =
        JoinContainer::split(spec(true, true), ctx(), JoinContainerOptions::default())
            .expect("container");
    join.defer_unmatched_rows(InputTable::Left).expect("defer");
    join.defer_unmatched_rows(InputTable::Right).expect("defer");
    join.offer_match(&left_row(1), 1, &right_row(1), 1).expect("match");

    join.collect_unmatched_rows_for(ResultType::RightOuter).expect("collect");
    join.collect_unmatched_rows_for(ResultType::RightOuter).expect("collect again");
    join.collect_unmatched_rows_for(ResultType::Matches).expect("nothing to collect");

    let out = join.finish().expect("finish");
    assert_eq!(keys(&out.tables.right_unmatched), ["?_r0", "?_r2", "?_r3"]);
    assert_eq!(keys(&out.tables.left_unmatched), ["l0_?", "l2_?", "l3_?"]);
}

#[test]
fn deferring_without_backing_table_fails() {
    let spec = JoinSpecification::new(
        JoinTableSettings::new(TableSpec::from_names(["id", "name"])).with_retain_unmatched(true),
        JoinTableSettings::for_table(right_table(1)),
    );
    let mut join =
        JoinContainer::split(spec, ctx(), JoinContainerOptions::default()).expect("container");
    let err = join.defer_unmatched_rows(InputTable::Left).unwrap_err();
    assert!(matches!(err, Error::InvalidArgumentError(_)));
}

#[test]
fn hilite_mapping_tracks_outputs_per_side() {
    let options = JoinContainerOptions::default().with_hiliting(true);
    let mut join = JoinContainer::split(spec(true, true), ctx(), options).expect("container");
    join.offer_match(&left_row(0), 0, &right_row(0), 0).expect("match");
    join.offer_left_outer(&left_row(1), 1).expect("left outer");
    join.offer_right_outer(&right_row(1), 1).expect("right outer");
    join.add_hilite_mapping(
        ResultType::Matches,
        RowKey::from("extra"),
        InputTable::Left,
        RowKey::from("l3"),
    );

    let matches = join
        .hilite_mapping(InputTable::Left, ResultType::Matches)
        .expect("hiliting enabled");
    assert_eq!(matches.len(), 2);
    assert!(matches[&RowKey::from("l0_r0")].contains(&RowKey::from("l0")));

    let outer = join
        .hilite_mapping(InputTable::Left, ResultType::LeftOuter)
        .expect("hiliting enabled");
    let all = join
        .hilite_mapping(InputTable::Left, ResultType::All)
        .expect("hiliting enabled");
    assert_eq!(all.len(), matches.len() + outer.len());
    for (output, inputs) in matches.iter().chain(outer.iter()) {
        assert!(inputs.is_subset(&all[output]));
    }

    let right_all = join
        .hilite_mapping(InputTable::Right, ResultType::All)
        .expect("hiliting enabled");
    assert!(right_all[&RowKey::from("?_r1")].contains(&RowKey::from("r1")));
    assert!(!right_all.contains_key(&RowKey::from("l1_?")));

    let out = join.finish().expect("finish");
    assert!(out.hilite.is_some());
}

#[test]
fn hilite_mapping_absent_when_disabled() {
    let mut join =
        JoinContainer::split(spec(true, true), ctx(), JoinContainerOptions::default())
            .expect("container");
    join.offer_match(&left_row(0), 0, &right_row(0), 0).expect("match");
    join.add_hilite_mapping(
        ResultType::Matches,
        RowKey::from("x"),
        InputTable::Left,
        RowKey::from("l0"),
    );
    assert!(join.hilite_mapping(InputTable::Left, ResultType::All).is_none());
    assert!(join.finish().expect("finish").hilite.is_none());
}

#[test]
fn canceled_context_stops_construction_and_collection() {
    let canceled = DefaultExecutionContext::default();
    canceled.cancel_token().cancel();
    let err = JoinContainer::split(
        spec(true, true),
        Arc::new(canceled),
        JoinContainerOptions::default(),
    )
    .err()
    .expect("canceled");
    assert!(matches!(err, Error::Canceled));

    let ctx = DefaultExecutionContext::default();
    let token = ctx.cancel_token().clone();
    let mut join =
        JoinContainer::split(spec(true, true), Arc::new(ctx), JoinContainerOptions::default())
            .expect("container");
    join.defer_unmatched_rows(InputTable::Left).expect("defer");
    join.offer_match(&left_row(0), 0, &right_row(0), 0).expect("match");
    token.cancel();
    // Offers are not polled; the deferred scan is.
    join.offer_right_outer(&right_row(1), 1).expect("right outer");
    let err = join.finish().unwrap_err();
    assert!(matches!(err, Error::Canceled));
}

#[test]
fn low_memory_spills_without_losing_rows() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let ctx = DefaultExecutionContext::new(ContainerOptions::default().with_temp_dir(tmp.path()));
    let mut join =
        JoinContainer::split(spec(true, true), Arc::new(ctx), JoinContainerOptions::default())
            .expect("container");
    join.defer_unmatched_rows(InputTable::Right).expect("defer");

    join.offer_match(&left_row(0), 0, &right_row(0), 0).expect("match");
    join.offer_left_outer(&left_row(1), 1).expect("left outer");

    // The monitor signals from its own thread; the join thread acts on it.
    let handle = join.low_memory_handle();
    thread::spawn(move || handle.signal()).join().expect("monitor");
    join.low_memory();

    join.offer_match(&left_row(2), 2, &right_row(2), 2).expect("match");
    join.offer_left_outer(&left_row(3), 3).expect("left outer");

    let out = join.finish().expect("finish");
    assert!(out.tables.matches.is_stored());
    assert!(out.tables.left_unmatched.is_stored());
    assert_eq!(keys(&out.tables.matches), ["l0_r0", "l2_r2"]);
    assert_eq!(keys(&out.tables.left_unmatched), ["l1_?", "l3_?"]);
    assert_eq!(keys(&out.tables.right_unmatched), ["?_r1", "?_r3"]);
}

#[test]
fn combined_output_pads_unmatched_rows() {
    let options = JoinContainerOptions::default().with_row_keys(RowKeyStrategy::Sequential);
    let spec = JoinSpecification::new(
        JoinTableSettings::for_table(left_table(2)).with_retain_unmatched(true),
        JoinTableSettings::for_table(right_table(2))
            .with_retain_unmatched(true)
            .with_included_column_names(["value", "id"])
            .expect("columns"),
    );
    let mut join = JoinContainer::combined(spec, ctx(), options).expect("container");
    join.offer_match(&left_row(0), 0, &right_row(0), 0).expect("match");
    join.offer_left_outer(&left_row(1), 1).expect("left outer");
    join.offer_right_outer(&right_row(1), 1).expect("right outer");

    let table = join.finish().expect("finish").tables;
    let names: Vec<&str> = table.spec().column_names().collect();
    assert_eq!(names, ["id", "name", "value", "id_1"]);

    let rows = table.rows().expect("rows");
    let row_keys: Vec<&str> = rows.iter().map(|r| r.key.as_str()).collect();
    assert_eq!(row_keys, ["Row0", "Row1", "Row2"]);
    assert_eq!(
        rows[1].cells,
        vec![
            DataCell::from(1),
            DataCell::from("left-1"),
            DataCell::Missing,
            DataCell::Missing,
        ]
    );
    assert_eq!(
        rows[2].cells,
        vec![
            DataCell::Missing,
            DataCell::Missing,
            DataCell::from(1.5),
            DataCell::from(1),
        ]
    );
}

#[test]
fn custom_key_separator() {
    let options = JoinContainerOptions::default().with_row_keys(RowKeyStrategy::Concatenate {
        separator: "+".to_string(),
    });
    let mut join = JoinContainer::split(spec(false, false), ctx(), options).expect("container");
    join.offer_match(&left_row(3), 3, &right_row(1), 1).expect("match");
    let out = join.finish().expect("finish");
    assert_eq!(keys(&out.tables.matches), ["l3+r1"]);
}
