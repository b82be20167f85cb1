mod common;

use common::{commit, controller, items, loaded, page_load};
use gridedit_core::{
    Aggregates, EditResult, Filters, GridError, LoadOutcome, SortDirection, SortSpec, TaskStatus,
    Value,
};
use gridedit_test_support::fixtures::{
    TEST_SCHEMA, TEST_TABLE, item, page, single_page, test_config,
};
use gridedit_test_support::{FakeFailure, FakeSource};
use std::time::Duration;

#[tokio::test]
async fn load_commits_rows_baseline_and_totals() {
    let source = FakeSource::new()
        .with_page(page(items(), 120, 1))
        .with_aggregates(Aggregates {
            total_le: 1500.25,
            total_euro: 30.0,
        });
    let mut grid = controller(&source);

    let outcome = grid
        .load_table(TEST_SCHEMA, TEST_TABLE)
        .await
        .expect("load should succeed");

    assert_eq!(outcome, LoadOutcome::Committed { rows: 2 });
    assert_eq!(grid.columns(), ["Item_Code", "Description", "Qty"]);
    assert_eq!(grid.rows().len(), 2);
    assert_eq!(grid.baseline().len(), 2);
    assert!(grid.rows().iter().all(|r| !r.is_selected() && !r.is_new()));
    assert_eq!(grid.aggregates().total_le, 1500.25);
    assert_eq!(grid.pagination().map(|p| p.total_pages()), Some(3));
    assert_eq!(
        grid.loaded_table().map(|t| t.qualified_name()),
        Some("BOQ.Items".to_string())
    );
    assert!(!grid.is_loading());

    let stats = source.stats();
    assert_eq!(stats.page_requests.len(), 1);
    assert_eq!(stats.aggregate_requests.len(), 1);

    let request = &stats.page_requests[0];
    assert_eq!(request.page, 1);
    assert_eq!(request.limit, 50);
    assert_eq!(request.sort_column, "Item_Code");
    assert_eq!(request.sort_direction, SortDirection::Ascending);
}

#[test]
fn stale_response_is_discarded() {
    let source = FakeSource::new();
    let mut grid = loaded(&source);

    let older = grid.refresh().expect("refresh should issue a load");
    let newer = grid.toggle_sort("Qty").expect("sort change should issue a load");
    assert!(newer.seq() > older.seq());

    let newer_page = single_page(vec![item("B1", "Newer", 1)]);
    let older_page = single_page(vec![item("C1", "Older", 2)]);

    let outcome = grid.finish_load(newer, Ok(page_load(newer_page)));
    assert!(matches!(outcome, Ok(LoadOutcome::Committed { rows: 1 })));

    let outcome = grid.finish_load(older, Ok(page_load(older_page)));
    assert!(matches!(outcome, Ok(LoadOutcome::Stale)));
    assert_eq!(grid.rows()[0].get("Item_Code"), &Value::from("B1"));
}

#[test]
fn stale_response_arriving_first_does_not_commit() {
    let source = FakeSource::new();
    let mut grid = loaded(&source);

    let older = grid.refresh().expect("refresh should issue a load");
    let newer = grid.refresh().expect("refresh should issue a load");

    let outcome = grid.finish_load(older.clone(), Ok(page_load(single_page(vec![item("C1", "Older", 2)]))));
    assert!(matches!(outcome, Ok(LoadOutcome::Stale)));
    assert!(grid.is_loading());
    assert_eq!(grid.rows()[0].get("Item_Code"), &Value::from("A1"));
    assert_eq!(
        grid.tasks().get(older.task_id()).map(|t| t.status.clone()),
        Some(TaskStatus::Superseded)
    );

    // A stale failure is dropped as well.
    let outcome = grid.finish_load(older, Err(GridError::Timeout));
    assert!(matches!(outcome, Ok(LoadOutcome::Stale)));
    assert!(grid.last_error().is_none());

    let outcome = grid.finish_load(newer, Ok(page_load(single_page(vec![item("B1", "Newer", 1)]))));
    assert!(matches!(outcome, Ok(LoadOutcome::Committed { .. })));
    assert!(!grid.is_loading());
}

#[tokio::test]
async fn failed_load_keeps_rows_and_history() {
    let source = FakeSource::new().with_page(single_page(items()));
    let mut grid = loaded(&source);
    grid.edit_cell(0, "Qty", "15");

    source.set_page_error(Some(FakeFailure::Network("connection refused".to_string())));
    let result = grid.reload().await;

    assert!(matches!(result, Err(GridError::Network(_))));
    assert!(!grid.is_loading());
    assert_eq!(grid.rows()[0].get("Qty"), &Value::Int(15));
    assert_eq!(grid.baseline()[0].get("Qty"), &Value::Int(10));
    assert!(grid.has_unsaved_changes());
    assert!(grid.can_undo());
    assert!(grid.last_error().is_some_and(|e| e.starts_with("Load failed")));
}

#[tokio::test]
async fn aggregate_failure_fails_the_whole_load() {
    let source = FakeSource::new()
        .with_page(single_page(items()))
        .with_aggregates_error(FakeFailure::Remote(500, "boom".to_string()));
    let mut grid = controller(&source);

    let result = grid.load_table(TEST_SCHEMA, TEST_TABLE).await;

    assert!(matches!(result, Err(GridError::Remote { status: 500, .. })));
    assert!(grid.rows().is_empty());
    assert!(grid.loaded_table().is_none());
}

#[tokio::test]
async fn slow_source_times_out() {
    let source = FakeSource::new()
        .with_page(single_page(items()))
        .with_delay(Duration::from_millis(200));
    let mut config = test_config();
    config.request_timeout_ms = 20;
    let mut grid = gridedit_core::GridController::new(source.clone().as_source_arc(), config);

    let result = grid.load_table(TEST_SCHEMA, TEST_TABLE).await;
    assert!(matches!(result, Err(GridError::Timeout)));
}

#[tokio::test]
async fn table_switch_resets_view_and_history() {
    let source = FakeSource::new().with_page(page(items(), 120, 1));
    let mut grid = controller(&source);
    grid.load_table(TEST_SCHEMA, TEST_TABLE)
        .await
        .expect("load should succeed");

    if let Some(ticket) = grid.apply_filters(Filters::from_inputs([("Description", "pi")])) {
        grid.run_load(ticket).await.expect("filtered load");
    }
    if let Some(ticket) = grid.toggle_sort("Qty") {
        grid.run_load(ticket).await.expect("sorted load");
    }
    assert_eq!(grid.edit_cell(0, "Qty", "99"), EditResult::Applied);

    grid.load_table(TEST_SCHEMA, "Other")
        .await
        .expect("switch should succeed");

    let params = grid.params().expect("selection");
    assert_eq!(params.table.name, "Other");
    assert!(params.filters.is_empty());
    assert_eq!(params.sort, SortSpec::asc("Item_Code"));
    assert_eq!(params.pagination.current_page, 1);
    assert!(!grid.can_undo());
    assert!(!grid.has_unsaved_changes());
}

#[test]
fn reload_of_same_table_keeps_history() {
    let source = FakeSource::new();
    let mut grid = loaded(&source);
    grid.edit_cell(0, "Qty", "15");

    let ticket = grid.refresh().expect("refresh should issue a load");
    grid.finish_load(ticket, Ok(page_load(single_page(items()))))
        .expect("reload should commit");

    assert!(grid.can_undo());
    assert!(!grid.has_unsaved_changes());
}

#[test]
fn inaccessible_schema_is_rejected() {
    let mut grid = controller(&FakeSource::new());

    let result = grid.select_table("Secret", "Items");
    assert!(matches!(result, Err(GridError::InvalidSelection(_))));

    let result = grid.select_table(TEST_SCHEMA, "  ");
    assert!(matches!(result, Err(GridError::InvalidSelection(_))));
    assert!(grid.params().is_none());
}

#[test]
fn paging_and_filters_follow_reset_rules() {
    let source = FakeSource::new();
    let mut grid = controller(&source);
    commit(&mut grid, page(items(), 120, 1));

    assert!(grid.prev_page().is_none());
    assert!(grid.set_page(4).is_none());
    assert!(grid.set_page(0).is_none());

    let ticket = grid.set_page(3).expect("page 3 exists");
    assert_eq!(ticket.params().pagination.current_page, 3);
    grid.finish_load(ticket, Ok(page_load(page(items(), 120, 3))))
        .expect("page 3 should commit");
    assert!(grid.next_page().is_none());

    let ticket = grid
        .toggle_sort("Qty")
        .expect("sort change should issue a load");
    assert_eq!(ticket.params().pagination.current_page, 3);
    grid.finish_load(ticket, Ok(page_load(page(items(), 120, 3))))
        .expect("sorted page should commit");

    let ticket = grid
        .apply_filters(Filters::from_inputs([("Description", "pipe"), ("Qty", " ")]))
        .expect("filter change should issue a load");
    let request = ticket.request();
    assert_eq!(request.page, 1);
    assert_eq!(request.sort_column, "Qty");
    assert!(
        request
            .query_pairs()
            .contains(&("filters", r#"{"Description":"pipe"}"#.to_string()))
    );
    grid.finish_load(ticket, Ok(page_load(page(items(), 2, 1))))
        .expect("filtered page should commit");

    assert!(
        grid.apply_filters(Filters::from_inputs([("Description", "pipe")]))
            .is_none()
    );

    let ticket = grid.set_rows_per_page(100).expect("page size change");
    assert_eq!(ticket.params().pagination.current_page, 1);
    assert_eq!(ticket.params().pagination.rows_per_page, 100);
    assert!(!ticket.params().filters.is_empty());
}

#[tokio::test]
async fn list_tables_filters_by_pattern() {
    let source = FakeSource::new().with_tables(["Items", "Invoices", "Contracts"]);
    let mut grid = controller(&source);

    let tables = grid
        .list_tables(TEST_SCHEMA, Some("in"))
        .await
        .expect("listing should succeed");
    let names: Vec<_> = tables.iter().map(|t| t.table_name.as_str()).collect();
    assert_eq!(names, ["Invoices"]);

    let result = grid.list_tables("Secret", None).await;
    assert!(matches!(result, Err(GridError::InvalidSelection(_))));
    assert_eq!(source.stats().list_calls.len(), 1);
}

#[tokio::test]
async fn retried_switch_after_failure_still_starts_fresh() {
    let source = FakeSource::new().with_page(single_page(items()));
    let mut grid = loaded(&source);
    grid.edit_cell(0, "Qty", "15");

    source.set_page_error(Some(FakeFailure::Timeout));
    let result = grid.load_table(TEST_SCHEMA, "Other").await;
    assert!(matches!(result, Err(GridError::Timeout)));
    assert_eq!(grid.loaded_table().map(|t| t.name.as_str()), Some(TEST_TABLE));
    assert!(grid.can_undo());

    source.set_page_error(None);
    let ticket = grid.refresh().expect("refresh should issue a load");
    assert!(ticket.is_fresh_session());
    grid.run_load(ticket).await.expect("retry should succeed");

    assert_eq!(grid.loaded_table().map(|t| t.name.as_str()), Some("Other"));
    assert!(!grid.can_undo());
}
