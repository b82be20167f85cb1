#![allow(dead_code)]

use gridedit_core::{Aggregates, GridController, LoadOutcome, PageData, PageLoad, Record};
use gridedit_test_support::FakeSource;
use gridedit_test_support::fixtures::{TEST_SCHEMA, TEST_TABLE, item, single_page, test_config};

pub fn items() -> Vec<Record> {
    vec![item("A1", "Pipe", 10), item("A2", "Valve", 5)]
}

pub fn controller(source: &FakeSource) -> GridController {
    GridController::new(source.clone().as_source_arc(), test_config())
}

/// Controller with the `items()` page committed, without touching a runtime.
pub fn loaded(source: &FakeSource) -> GridController {
    let mut grid = controller(source);
    commit(&mut grid, single_page(items()));
    grid
}

pub fn commit(grid: &mut GridController, page: PageData) {
    let ticket = grid
        .select_table(TEST_SCHEMA, TEST_TABLE)
        .expect("table should be selectable");
    let outcome = grid
        .finish_load(
            ticket,
            Ok(PageLoad {
                page,
                aggregates: Aggregates::default(),
            }),
        )
        .expect("load should commit");
    assert!(matches!(outcome, LoadOutcome::Committed { .. }));
}

pub fn page_load(page: PageData) -> PageLoad {
    PageLoad {
        page,
        aggregates: Aggregates::default(),
    }
}
