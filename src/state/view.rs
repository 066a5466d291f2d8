use std::cmp::Ordering;

use crate::state::data_model::{CellValue, Entity, EntityId};

pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const DEFAULT_FILTER_COLUMN: &str = "name";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortSpec {
    pub column: String,
    pub order: SortOrder,
}

/// Presentation state of the grid. Never touches entity values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewState {
    sort_spec: Option<SortSpec>,
    filter_column: String,
    filter_query: String,
    page_index: usize,
    page_size: usize,
}

impl Default for ViewState {
    fn default() -> Self {
        Self::new(DEFAULT_FILTER_COLUMN, DEFAULT_PAGE_SIZE)
    }
}

impl ViewState {
    pub fn new(filter_column: &str, page_size: usize) -> Self {
        Self {
            sort_spec: None,
            filter_column: filter_column.to_string(),
            filter_query: String::new(),
            page_index: 0,
            page_size: page_size.max(1),
        }
    }

    pub fn sort_spec(&self) -> Option<&SortSpec> {
        self.sort_spec.as_ref()
    }

    pub fn filter_column(&self) -> &str {
        &self.filter_column
    }

    pub fn filter_query(&self) -> &str {
        &self.filter_query
    }

    pub fn page_index(&self) -> usize {
        self.page_index
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Cycles the sort of `column`: ascending, descending, unsorted. A
    /// different column replaces the current one, starting ascending.
    pub fn toggle_sort(&mut self, column: &str) {
        self.sort_spec = match self.sort_spec.take() {
            Some(spec) if spec.column == column => match spec.order {
                SortOrder::Asc => Some(SortSpec {
                    column: spec.column,
                    order: SortOrder::Desc,
                }),
                SortOrder::Desc => None,
            },
            _ => Some(SortSpec {
                column: column.to_string(),
                order: SortOrder::Asc,
            }),
        };
    }

    pub fn set_filter(&mut self, query: &str) {
        self.filter_query = query.trim().to_string();
        self.page_index = 0;
    }

    pub fn set_page_size(&mut self, page_size: usize) {
        self.page_size = page_size.max(1);
        self.page_index = 0;
    }

    pub fn go_to_page(&mut self, page_index: usize, view: &DerivedView) {
        self.page_index = page_index.min(view.page_count - 1);
    }

    pub fn next_page(&mut self, view: &DerivedView) {
        if view.can_next() {
            self.page_index = view.page_index + 1;
        }
    }

    pub fn previous_page(&mut self, view: &DerivedView) {
        self.page_index = view.page_index.saturating_sub(1);
    }

    fn row_matches_filter(&self, entity: &Entity, needle: &str) -> bool {
        if needle.is_empty() {
            return true;
        }

        entity
            .get(&self.filter_column)
            .map(|value| value.to_string().to_lowercase().contains(needle))
            .unwrap_or(false)
    }
}

/// Rows as displayed: the filtered and sorted order across all pages, and
/// the slice shown on the current page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DerivedView {
    pub filtered_ids: Vec<EntityId>,
    pub page_ids: Vec<EntityId>,
    pub page_index: usize,
    pub page_count: usize,
    pub total: usize,
}

impl DerivedView {
    pub fn can_previous(&self) -> bool {
        self.page_index > 0
    }

    pub fn can_next(&self) -> bool {
        self.page_index + 1 < self.page_count
    }
}

/// Applies filter, sort and pagination to `rows`. Pure: the same inputs
/// always produce the same order.
pub fn derive_view(rows: &[Entity], view: &ViewState) -> DerivedView {
    let needle = view.filter_query.to_lowercase();
    let mut filtered: Vec<&Entity> = rows
        .iter()
        .filter(|entity| view.row_matches_filter(entity, &needle))
        .collect();

    if let Some(spec) = view.sort_spec.as_ref() {
        filtered.sort_by(|a, b| {
            let ordering = compare_values(a.get(&spec.column), b.get(&spec.column));
            match spec.order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });
    }

    let total = filtered.len();
    let page_count = total.div_ceil(view.page_size).max(1);
    let page_index = view.page_index.min(page_count - 1);
    let page_ids = filtered
        .iter()
        .skip(page_index * view.page_size)
        .take(view.page_size)
        .map(|entity| entity.id().clone())
        .collect();

    DerivedView {
        filtered_ids: filtered.iter().map(|entity| entity.id().clone()).collect(),
        page_ids,
        page_index,
        page_count,
        total,
    }
}

fn compare_values(a: Option<&CellValue>, b: Option<&CellValue>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(left), Some(right)) => compare_value_pair(left, right),
    }
}

fn compare_value_pair(left: &CellValue, right: &CellValue) -> Ordering {
    match (left, right) {
        (CellValue::Integer(a), CellValue::Integer(b)) => a.cmp(b),
        (CellValue::Text(a), CellValue::Text(b)) => a.to_lowercase().cmp(&b.to_lowercase()),
        (CellValue::Status(a), CellValue::Status(b)) => a.as_str().cmp(b.as_str()),
        (CellValue::Url(a), CellValue::Url(b)) => a.cmp(b),
        _ => match (left.as_f64(), right.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
            _ => type_rank(left)
                .cmp(&type_rank(right))
                .then_with(|| left.to_string().cmp(&right.to_string())),
        },
    }
}

fn type_rank(value: &CellValue) -> u8 {
    match value {
        CellValue::Url(_) => 0,
        CellValue::Number(_) | CellValue::Integer(_) => 1,
        CellValue::Status(_) => 2,
        CellValue::Text(_) => 3,
    }
}
