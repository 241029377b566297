use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::columns::{ColumnDef, ColumnSchema, Value};
use crate::domain::DEFAULT_PAGE_SIZE;
use crate::record::Record;

pub const MAX_SORT_ENTRIES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn arrow(&self) -> &'static str {
        match self {
            Direction::Asc => "↑",
            Direction::Desc => "↓",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortEntry {
    pub column: String,
    pub direction: Direction,
}

impl SortEntry {
    pub fn new(column: impl Into<String>, direction: Direction) -> Self {
        Self {
            column: column.into(),
            direction,
        }
    }
}

/// What a sort menu action asks for. `Replace` and `Add` are the single
/// and multi sort entries of the column menu, `Cycle` steps
/// ascending, descending, unsorted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortIntent {
    Replace(Direction),
    Add(Direction),
    Cycle,
    Clear,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ColumnFilter {
    Membership(BTreeSet<String>),
    Substring(String),
    Range { min: Option<f64>, max: Option<f64> },
}

impl ColumnFilter {
    /// An empty filter accepts everything and is never stored.
    pub fn is_empty(&self) -> bool {
        match self {
            ColumnFilter::Membership(values) => values.is_empty(),
            ColumnFilter::Substring(term) => term.trim().is_empty(),
            ColumnFilter::Range { min, max } => min.is_none() && max.is_none(),
        }
    }

    pub fn matches(&self, value: &Value) -> bool {
        match self {
            ColumnFilter::Membership(values) => values.contains(&value.to_string()),
            ColumnFilter::Substring(term) => value
                .to_string()
                .to_lowercase()
                .contains(&term.trim().to_lowercase()),
            ColumnFilter::Range { min, max } => match value.as_number() {
                Some(n) => min.is_none_or(|lo| n >= lo) && max.is_none_or(|hi| n <= hi),
                None => false,
            },
        }
    }

    /// Parses `min..max` with either bound optional, or a single number for
    /// an exact match.
    pub fn parse_range(input: &str) -> Option<ColumnFilter> {
        let input = input.trim();
        let bound = |s: &str| -> Result<Option<f64>, ()> {
            let s = s.trim();
            if s.is_empty() {
                Ok(None)
            } else {
                s.parse::<f64>().map(Some).map_err(|_| ())
            }
        };
        let (min, max) = match input.split_once("..") {
            Some((lo, hi)) => (bound(lo).ok()?, bound(hi).ok()?),
            None => {
                let exact = bound(input).ok()?;
                (exact, exact)
            }
        };
        Some(ColumnFilter::Range { min, max })
    }

    pub fn describe(&self) -> String {
        match self {
            ColumnFilter::Membership(values) => values.iter().cloned().collect::<Vec<_>>().join("|"),
            ColumnFilter::Substring(term) => format!("~{term}"),
            ColumnFilter::Range { min, max } => format!(
                "{}..{}",
                min.map(|v| v.to_string()).unwrap_or_default(),
                max.map(|v| v.to_string()).unwrap_or_default()
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page_index: usize,
    pub page_size: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page_index: 0,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Everything the user changed about how the records are shown.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ViewState {
    sorting: Vec<SortEntry>,
    column_filters: BTreeMap<String, ColumnFilter>,
    global_filter: String,
    visibility: BTreeMap<String, bool>,
    selection: BTreeMap<u64, bool>,
    pagination: Pagination,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VisibleColumn {
    pub id: &'static str,
    pub title: &'static str,
    pub width: u16,
    pub sortable: bool,
    pub filtered: bool,
    /// Direction and 1-based priority when the column takes part in sorting.
    pub sort: Option<(Direction, usize)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DerivedRow {
    pub index: usize,
    pub id: u64,
    pub selected: bool,
    pub cells: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FacetOption {
    pub value: String,
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageInfo {
    pub page_index: usize,
    pub page_size: usize,
    pub total_pages: usize,
    pub filtered_rows: usize,
}

/// Read only projection of the records under a view state.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedView {
    pub columns: Vec<VisibleColumn>,
    /// Record indices passing all filters, in display order.
    pub sorted: Vec<usize>,
    /// Rows of the current page.
    pub rows: Vec<DerivedRow>,
    pub facets: BTreeMap<String, Vec<FacetOption>>,
    pub page: PageInfo,
    pub total_rows: usize,
    pub selected_rows: usize,
}

impl DerivedView {
    pub fn empty() -> Self {
        DerivedView {
            columns: Vec::new(),
            sorted: Vec::new(),
            rows: Vec::new(),
            facets: BTreeMap::new(),
            page: PageInfo {
                page_index: 0,
                page_size: DEFAULT_PAGE_SIZE,
                total_pages: 1,
                filtered_rows: 0,
            },
            total_rows: 0,
            selected_rows: 0,
        }
    }

    pub fn facet_count(&self, column: &str, value: &str) -> usize {
        self.facets
            .get(column)
            .and_then(|options| options.iter().find(|o| o.value == value))
            .map(|o| o.count)
            .unwrap_or(0)
    }

    pub fn page_ids(&self) -> Vec<u64> {
        self.rows.iter().map(|r| r.id).collect()
    }
}

struct RowCheck {
    failed: Vec<usize>,
    global: bool,
}

impl ViewState {
    pub fn new(page_size: usize) -> Self {
        let mut state = ViewState::default();
        state.pagination.page_size = page_size.max(1);
        state
    }

    // -------------------- Sorting ---------------------- //

    /// Replaces the sort state. Duplicate columns keep their first entry and
    /// at most MAX_SORT_ENTRIES entries are kept.
    pub fn set_sorting(&mut self, entries: Vec<SortEntry>) {
        let mut seen = HashSet::new();
        self.sorting = entries
            .into_iter()
            .filter(|e| seen.insert(e.column.clone()))
            .take(MAX_SORT_ENTRIES)
            .collect();
        self.pagination.page_index = 0;
        trace!("Sorting: {:?}", self.sorting);
    }

    pub fn toggle_sort(&mut self, column: &str, intent: SortIntent) {
        let mut next = self.sorting.clone();
        match intent {
            SortIntent::Replace(direction) => next = vec![SortEntry::new(column, direction)],
            SortIntent::Add(direction) => {
                if let Some(entry) = next.iter_mut().find(|e| e.column == column) {
                    entry.direction = direction;
                } else {
                    next.push(SortEntry::new(column, direction));
                    if next.len() > MAX_SORT_ENTRIES {
                        next.drain(..next.len() - MAX_SORT_ENTRIES);
                    }
                }
            }
            SortIntent::Cycle => {
                next = match self.sort_direction(column) {
                    None => vec![SortEntry::new(column, Direction::Asc)],
                    Some(Direction::Asc) => vec![SortEntry::new(column, Direction::Desc)],
                    Some(Direction::Desc) => Vec::new(),
                }
            }
            SortIntent::Clear => next.retain(|e| e.column != column),
        }
        self.set_sorting(next);
    }

    pub fn clear_sorting(&mut self) {
        self.set_sorting(Vec::new());
    }

    pub fn sorting(&self) -> &[SortEntry] {
        &self.sorting
    }

    pub fn sort_direction(&self, column: &str) -> Option<Direction> {
        self.sorting
            .iter()
            .find(|e| e.column == column)
            .map(|e| e.direction)
    }

    /// 1-based priority of the column within the sort state.
    pub fn sort_priority(&self, column: &str) -> Option<usize> {
        self.sorting
            .iter()
            .position(|e| e.column == column)
            .map(|p| p + 1)
    }

    // -------------------- Filtering ---------------------- //

    /// Replaces the filter of a column, an empty filter removes it.
    pub fn set_column_filter(&mut self, column: &str, filter: ColumnFilter) {
        if filter.is_empty() {
            self.column_filters.remove(column);
        } else {
            self.column_filters.insert(column.to_string(), filter);
        }
        self.pagination.page_index = 0;
    }

    pub fn clear_column_filter(&mut self, column: &str) {
        self.column_filters.remove(column);
        self.pagination.page_index = 0;
    }

    /// Adds or removes one accepted value of a membership filter.
    pub fn toggle_filter_value(&mut self, column: &str, value: &str) {
        let mut values = match self.column_filters.get(column) {
            Some(ColumnFilter::Membership(values)) => values.clone(),
            _ => BTreeSet::new(),
        };
        if !values.remove(value) {
            values.insert(value.to_string());
        }
        self.set_column_filter(column, ColumnFilter::Membership(values));
    }

    pub fn column_filter(&self, column: &str) -> Option<&ColumnFilter> {
        self.column_filters.get(column)
    }

    pub fn column_filters(&self) -> &BTreeMap<String, ColumnFilter> {
        &self.column_filters
    }

    pub fn set_global_filter(&mut self, text: impl Into<String>) {
        self.global_filter = text.into();
        self.pagination.page_index = 0;
    }

    pub fn global_filter(&self) -> &str {
        &self.global_filter
    }

    pub fn is_filtered(&self) -> bool {
        !self.column_filters.is_empty() || !self.global_filter.trim().is_empty()
    }

    pub fn reset_filters(&mut self) {
        self.column_filters.clear();
        self.global_filter.clear();
        self.pagination.page_index = 0;
    }

    // -------------------- Visibility & selection ---------------------- //

    pub fn set_visibility(&mut self, column: &str, visible: bool) {
        self.visibility.insert(column.to_string(), visible);
    }

    pub fn toggle_visibility(&mut self, column: &str) {
        let visible = self.is_visible(column);
        self.set_visibility(column, !visible);
    }

    pub fn is_visible(&self, column: &str) -> bool {
        self.visibility.get(column).copied().unwrap_or(true)
    }

    pub fn set_selection(&mut self, row_id: u64, selected: bool) {
        if selected {
            self.selection.insert(row_id, true);
        } else {
            self.selection.remove(&row_id);
        }
    }

    pub fn toggle_selection(&mut self, row_id: u64) {
        let selected = self.is_selected(row_id);
        self.set_selection(row_id, !selected);
    }

    /// Selects all given rows, or clears them when all are selected already.
    pub fn toggle_page_selection(&mut self, row_ids: &[u64]) {
        let select = !row_ids.iter().all(|id| self.is_selected(*id));
        for id in row_ids {
            self.set_selection(*id, select);
        }
    }

    pub fn is_selected(&self, row_id: u64) -> bool {
        self.selection.get(&row_id).copied().unwrap_or(false)
    }

    pub fn selected_ids(&self) -> Vec<u64> {
        self.selection
            .iter()
            .filter(|(_, selected)| **selected)
            .map(|(id, _)| *id)
            .collect()
    }

    // -------------------- Pagination ---------------------- //

    pub fn pagination(&self) -> Pagination {
        self.pagination
    }

    pub fn set_page(&mut self, page_index: usize, total_pages: usize) {
        self.pagination.page_index = page_index.min(total_pages.saturating_sub(1));
    }

    pub fn next_page(&mut self, total_pages: usize) {
        self.set_page(self.pagination.page_index + 1, total_pages);
    }

    pub fn previous_page(&mut self) {
        self.pagination.page_index = self.pagination.page_index.saturating_sub(1);
    }

    pub fn first_page(&mut self) {
        self.pagination.page_index = 0;
    }

    pub fn last_page(&mut self, total_pages: usize) {
        self.set_page(total_pages.saturating_sub(1), total_pages);
    }

    pub fn set_page_size(&mut self, page_size: usize) {
        self.pagination.page_size = page_size.max(1);
        self.pagination.page_index = 0;
    }

    // -------------------- Derivation ---------------------- //

    /// Filters, sorts, facets and paginates `records`. Does not touch the
    /// state, calling it twice gives the same view.
    pub fn derive(&self, records: &[Record], schema: &ColumnSchema) -> DerivedView {
        let active: Vec<(&ColumnDef, &ColumnFilter)> = self
            .column_filters
            .iter()
            .filter_map(|(id, filter)| schema.get(id).map(|column| (column, filter)))
            .collect();
        let visible: Vec<&ColumnDef> = schema.iter().filter(|c| self.is_visible(c.id)).collect();
        let needle = self.global_filter.trim().to_lowercase();

        // (1) filter
        let checks: Vec<RowCheck> = records
            .par_iter()
            .map(|record| RowCheck {
                failed: active
                    .iter()
                    .enumerate()
                    .filter(|(_, (column, filter))| !filter.matches(&column.value(record)))
                    .map(|(idx, _)| idx)
                    .collect(),
                global: needle.is_empty()
                    || visible.iter().any(|column| {
                        column
                            .value(record)
                            .to_string()
                            .to_lowercase()
                            .contains(&needle)
                    }),
            })
            .collect();

        let filtered: Vec<usize> = checks
            .iter()
            .enumerate()
            .filter(|(_, check)| check.global && check.failed.is_empty())
            .map(|(idx, _)| idx)
            .collect();

        // (2) sort, stable so ties keep fetch order
        let sort_columns: Vec<(&ColumnDef, Direction)> = self
            .sorting
            .iter()
            .filter_map(|entry| {
                schema
                    .get(&entry.column)
                    .filter(|column| column.sortable)
                    .map(|column| (column, entry.direction))
            })
            .collect();
        let sorted = if sort_columns.is_empty() {
            filtered
        } else {
            let mut keyed: Vec<(usize, Vec<Value>)> = filtered
                .into_iter()
                .map(|idx| {
                    let keys = sort_columns
                        .iter()
                        .map(|(column, _)| column.value(&records[idx]))
                        .collect();
                    (idx, keys)
                })
                .collect();
            keyed.sort_by(|(_, a), (_, b)| {
                sort_columns
                    .iter()
                    .zip(a.iter().zip(b.iter()))
                    .map(|((_, direction), (va, vb))| match direction {
                        Direction::Asc => va.compare(vb),
                        Direction::Desc => vb.compare(va),
                    })
                    .find(|ord| ord.is_ne())
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            keyed.into_iter().map(|(idx, _)| idx).collect()
        };

        // (3) facets, each ignoring its own filter
        let mut facets = BTreeMap::new();
        for column in schema.iter().filter(|c| c.is_filterable()) {
            let own = active.iter().position(|(c, _)| c.id == column.id);
            let mut counts: HashMap<String, usize> = HashMap::new();
            let mut order: Vec<String> = Vec::new();
            for (record, check) in records.iter().zip(checks.iter()) {
                let passes = check.global
                    && check.failed.iter().all(|failed| Some(*failed) == own);
                if passes {
                    let value = column.value(record).to_string();
                    let count = counts.entry(value.clone()).or_insert(0);
                    if *count == 0 {
                        order.push(value);
                    }
                    *count += 1;
                }
            }
            let options = order
                .into_iter()
                .map(|value| FacetOption {
                    count: counts.get(&value).copied().unwrap_or(0),
                    label: column.option_label(&value),
                    value,
                })
                .collect();
            facets.insert(column.id.to_string(), options);
        }

        // (4) paginate
        let page_size = self.pagination.page_size.max(1);
        let total_pages = sorted.len().div_ceil(page_size).max(1);
        let page_index = self.pagination.page_index.min(total_pages - 1);
        let start = (page_index * page_size).min(sorted.len());
        let end = (start + page_size).min(sorted.len());

        let rows = sorted[start..end]
            .iter()
            .map(|&idx| {
                let record = &records[idx];
                DerivedRow {
                    index: idx,
                    id: record.id,
                    selected: self.is_selected(record.id),
                    cells: visible.iter().map(|column| column.render(record)).collect(),
                }
            })
            .collect();

        let columns = visible
            .iter()
            .map(|column| VisibleColumn {
                id: column.id,
                title: column.title,
                width: column.width,
                sortable: column.sortable,
                filtered: self.column_filters.contains_key(column.id),
                sort: self
                    .sort_direction(column.id)
                    .zip(self.sort_priority(column.id)),
            })
            .collect();

        let selected_rows = records.iter().filter(|r| self.is_selected(r.id)).count();

        DerivedView {
            columns,
            rows,
            facets,
            page: PageInfo {
                page_index,
                page_size,
                total_pages,
                filtered_rows: sorted.len(),
            },
            sorted,
            total_rows: records.len(),
            selected_rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{RawRecord, normalize};
    use chrono::{TimeZone, Utc};

    fn product(id: u64, title: &str, price: f64, category: &str, brand: Option<&str>, stock: i64) -> Record {
        normalize(
            RawRecord {
                id,
                title: title.to_string(),
                price,
                category: category.to_string(),
                brand: brand.map(str::to_string),
                stock,
                ..Default::default()
            },
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        )
    }

    fn catalog() -> Vec<Record> {
        vec![
            product(1, "Red Shirt", 20.0, "clothing", Some("Acme"), 5),
            product(2, "Blue Jeans", 50.0, "clothing", Some("Denim Co"), 0),
            product(3, "Green Hat", 20.0, "accessories", Some("Acme"), 3),
            product(4, "Sofa", 900.0, "furniture", None, 2),
            product(5, "Lamp", 50.0, "furniture", Some("Acme"), 0),
            product(6, "Scarf", 15.0, "accessories", None, 9),
        ]
    }

    fn ids(view: &DerivedView, records: &[Record]) -> Vec<u64> {
        view.sorted.iter().map(|&idx| records[idx].id).collect()
    }

    #[test]
    fn empty_sort_keeps_fetch_order() {
        let records = catalog();
        let view = ViewState::new(10).derive(&records, &ColumnSchema::products());
        assert_eq!(ids(&view, &records), [1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn sorts_prices_ascending() {
        let records = vec![
            product(1, "A", 100.0, "x", None, 1),
            product(2, "B", 50.0, "x", None, 1),
            product(3, "C", 75.0, "x", None, 1),
        ];
        let mut state = ViewState::new(10);
        state.set_sorting(vec![SortEntry::new("price", Direction::Asc)]);
        let view = state.derive(&records, &ColumnSchema::products());
        let prices: Vec<f64> = view.sorted.iter().map(|&i| records[i].price).collect();
        assert_eq!(prices, [50.0, 75.0, 100.0]);
    }

    #[test]
    fn multi_sort_uses_priority_and_stays_stable() {
        let records = catalog();
        let mut state = ViewState::new(10);
        state.toggle_sort("price", SortIntent::Replace(Direction::Desc));
        state.toggle_sort("brand", SortIntent::Add(Direction::Asc));
        let view = state.derive(&records, &ColumnSchema::products());

        // 900 | 50: Acme(5) < Denim Co(2) | 20: Acme(1), Acme(3) fetch order | 15
        assert_eq!(ids(&view, &records), [4, 5, 2, 1, 3, 6]);
        let price = view.columns.iter().find(|c| c.id == "price").unwrap();
        assert_eq!(price.sort, Some((Direction::Desc, 1)));
        let brand = view.columns.iter().find(|c| c.id == "brand").unwrap();
        assert_eq!(brand.sort, Some((Direction::Asc, 2)));
    }

    #[test]
    fn add_updates_in_place_and_caps_entries() {
        let mut state = ViewState::new(10);
        for column in ["title", "price", "category", "brand", "stock"] {
            state.toggle_sort(column, SortIntent::Add(Direction::Asc));
        }
        state.toggle_sort("price", SortIntent::Add(Direction::Desc));
        assert_eq!(state.sort_priority("price"), Some(2));
        assert_eq!(state.sort_direction("price"), Some(Direction::Desc));

        state.toggle_sort("rating", SortIntent::Add(Direction::Asc));
        let columns: Vec<&str> = state.sorting().iter().map(|e| e.column.as_str()).collect();
        assert_eq!(columns, ["price", "category", "brand", "stock", "rating"]);
    }

    #[test]
    fn set_sorting_enforces_uniqueness_and_cap() {
        let mut state = ViewState::new(10);
        let mut entries = vec![
            SortEntry::new("price", Direction::Asc),
            SortEntry::new("price", Direction::Desc),
        ];
        for column in ["a", "b", "c", "d", "e"] {
            entries.push(SortEntry::new(column, Direction::Asc));
        }
        state.set_sorting(entries);
        assert_eq!(state.sorting().len(), MAX_SORT_ENTRIES);
        assert_eq!(state.sort_direction("price"), Some(Direction::Asc));
    }

    #[test]
    fn cycle_goes_asc_desc_removed() {
        let mut state = ViewState::new(10);
        state.toggle_sort("stock", SortIntent::Add(Direction::Asc));
        state.toggle_sort("price", SortIntent::Cycle);
        assert_eq!(state.sorting(), [SortEntry::new("price", Direction::Asc)]);
        state.toggle_sort("price", SortIntent::Cycle);
        assert_eq!(state.sorting(), [SortEntry::new("price", Direction::Desc)]);
        state.toggle_sort("price", SortIntent::Cycle);
        assert!(state.sorting().is_empty());
    }

    #[test]
    fn clear_removes_single_column() {
        let mut state = ViewState::new(10);
        state.toggle_sort("price", SortIntent::Add(Direction::Asc));
        state.toggle_sort("title", SortIntent::Add(Direction::Asc));
        state.toggle_sort("price", SortIntent::Clear);
        assert_eq!(state.sorting(), [SortEntry::new("title", Direction::Asc)]);
        state.clear_sorting();
        assert!(state.sorting().is_empty());
    }

    #[test]
    fn unsortable_columns_are_ignored() {
        let records = catalog();
        let mut state = ViewState::new(10);
        state.set_sorting(vec![SortEntry::new("thumbnail", Direction::Desc)]);
        let view = state.derive(&records, &ColumnSchema::products());
        assert_eq!(ids(&view, &records), [1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn global_filter_is_case_insensitive() {
        let records = catalog();
        let schema = ColumnSchema::products();
        let mut state = ViewState::new(10);
        for term in ["red", "RED", "  rEd "] {
            state.set_global_filter(term);
            assert_eq!(ids(&state.derive(&records, &schema), &records), [1]);
        }
    }

    #[test]
    fn global_filter_only_searches_visible_columns() {
        let records = catalog();
        let schema = ColumnSchema::products();
        let mut state = ViewState::new(10);
        state.set_global_filter("red");
        state.set_visibility("title", false);
        assert!(state.derive(&records, &schema).sorted.is_empty());
    }

    #[test]
    fn blank_global_filter_is_no_filter() {
        let records = catalog();
        let mut state = ViewState::new(10);
        state.set_global_filter("   ");
        assert!(!state.is_filtered());
        assert_eq!(state.derive(&records, &ColumnSchema::products()).sorted.len(), 6);
    }

    #[test]
    fn membership_substring_and_range_filters() {
        let records = catalog();
        let schema = ColumnSchema::products();

        let mut state = ViewState::new(10);
        state.toggle_filter_value("category", "furniture");
        state.toggle_filter_value("category", "accessories");
        assert_eq!(ids(&state.derive(&records, &schema), &records), [3, 4, 5, 6]);

        state.set_column_filter("title", ColumnFilter::Substring("A".into()));
        assert_eq!(ids(&state.derive(&records, &schema), &records), [3, 4, 5, 6]);
        state.set_column_filter("title", ColumnFilter::Substring("sca".into()));
        assert_eq!(ids(&state.derive(&records, &schema), &records), [6]);

        state.reset_filters();
        state.set_column_filter("price", ColumnFilter::parse_range("20..50").unwrap());
        assert_eq!(ids(&state.derive(&records, &schema), &records), [1, 2, 3, 5]);
    }

    #[test]
    fn status_and_brand_use_normalized_values() {
        let records = catalog();
        let schema = ColumnSchema::products();
        let mut state = ViewState::new(10);
        state.toggle_filter_value("availabilityStatus", "Out of Stock");
        assert_eq!(ids(&state.derive(&records, &schema), &records), [2, 5]);

        state.reset_filters();
        state.toggle_filter_value("brand", "Unbranded");
        assert_eq!(ids(&state.derive(&records, &schema), &records), [4, 6]);
    }

    #[test]
    fn removing_all_values_equals_never_filtering() {
        let records = catalog();
        let schema = ColumnSchema::products();
        let pristine = ViewState::new(10);

        let mut state = ViewState::new(10);
        state.toggle_filter_value("category", "clothing");
        state.toggle_filter_value("category", "clothing");
        assert_eq!(state, pristine);
        assert_eq!(state.derive(&records, &schema), pristine.derive(&records, &schema));

        state.set_column_filter("brand", ColumnFilter::Membership(BTreeSet::new()));
        assert!(state.column_filter("brand").is_none());
    }

    #[test]
    fn facets_reflect_other_filters_only() {
        let records = catalog();
        let schema = ColumnSchema::products();
        let mut state = ViewState::new(10);
        state.toggle_filter_value("category", "clothing");
        state.toggle_filter_value("category", "furniture");
        state.toggle_filter_value("brand", "Acme");
        let view = state.derive(&records, &schema);

        assert_eq!(ids(&view, &records), [1, 5]);

        // Status facet: records passing category and brand.
        let statuses: Vec<(&str, usize)> = view.facets["availabilityStatus"]
            .iter()
            .map(|o| (o.value.as_str(), o.count))
            .collect();
        assert_eq!(statuses, [("In Stock", 1), ("Out of Stock", 1)]);

        // Category facet ignores the category filter: every Acme record.
        let categories: Vec<(&str, usize)> = view.facets["category"]
            .iter()
            .map(|o| (o.value.as_str(), o.count))
            .collect();
        assert_eq!(
            categories,
            [("clothing", 1), ("accessories", 1), ("furniture", 1)]
        );
        assert_eq!(view.facets["category"][0].label, "Clothing");

        // Brand facet ignores the brand filter.
        assert_eq!(view.facet_count("brand", "Acme"), 2);
        assert_eq!(view.facet_count("brand", "Denim Co"), 1);
        assert_eq!(view.facet_count("brand", "Unbranded"), 1);
    }

    #[test]
    fn paginates_and_resets_on_page_size_change() {
        let records: Vec<Record> = (1..=25)
            .map(|id| product(id, "Item", id as f64, "x", None, 1))
            .collect();
        let schema = ColumnSchema::products();
        let mut state = ViewState::new(10);

        let view = state.derive(&records, &schema);
        assert_eq!(view.page.total_pages, 3);
        state.next_page(view.page.total_pages);
        state.next_page(view.page.total_pages);
        state.next_page(view.page.total_pages);
        assert_eq!(state.pagination().page_index, 2);
        let view = state.derive(&records, &schema);
        assert_eq!(view.rows.len(), 5);
        assert_eq!(view.rows[0].id, 21);

        state.set_page_size(25);
        assert_eq!(state.pagination().page_index, 0);
        let view = state.derive(&records, &schema);
        assert_eq!(view.page.total_pages, 1);
        assert_eq!(view.rows.len(), 25);
    }

    #[test]
    fn page_index_is_clamped_after_filtering() {
        let records: Vec<Record> = (1..=25)
            .map(|id| product(id, &format!("Item {id}"), 1.0, "x", None, 1))
            .collect();
        let schema = ColumnSchema::products();
        let mut state = ViewState::new(10);
        state.last_page(3);
        assert_eq!(state.pagination().page_index, 2);

        // Filtering resets the index, a stale index is clamped on derive.
        state.set_global_filter("Item 2");
        assert_eq!(state.pagination().page_index, 0);
        state.set_page(7, 99);
        let view = state.derive(&records, &schema);
        assert_eq!(view.page.total_pages, 1);
        assert_eq!(view.page.page_index, 0);
        assert_eq!(view.page.filtered_rows, 7);

        state.previous_page();
        state.previous_page();
        state.first_page();
        assert_eq!(state.pagination().page_index, 0);
    }

    #[test]
    fn empty_result_is_a_single_empty_page() {
        let records = catalog();
        let mut state = ViewState::new(10);
        state.set_global_filter("no such product");
        let view = state.derive(&records, &ColumnSchema::products());
        assert!(view.rows.is_empty());
        assert_eq!(view.page.total_pages, 1);
        assert_eq!(view.total_rows, 6);
    }

    #[test]
    fn hidden_columns_are_not_projected() {
        let records = catalog();
        let mut state = ViewState::new(10);
        state.toggle_visibility("thumbnail");
        state.set_visibility("rating", false);
        let view = state.derive(&records, &ColumnSchema::products());
        assert_eq!(view.columns.len(), 6);
        assert!(view.rows.iter().all(|r| r.cells.len() == 6));
        assert_eq!(view.rows[0].cells[0], "Red Shirt");
        state.toggle_visibility("thumbnail");
        assert!(state.is_visible("thumbnail"));
    }

    #[test]
    fn selection_survives_filtering() {
        let records = catalog();
        let schema = ColumnSchema::products();
        let mut state = ViewState::new(10);
        state.set_selection(2, true);
        state.toggle_selection(4);
        state.set_global_filter("sofa");
        let view = state.derive(&records, &schema);
        assert_eq!(view.selected_rows, 2);
        assert!(view.rows[0].selected);

        state.reset_filters();
        state.toggle_selection(4);
        assert_eq!(state.selected_ids(), [2]);
    }

    #[test]
    fn page_selection_toggles_all_rows_of_the_page() {
        let mut state = ViewState::new(10);
        state.set_selection(1, true);
        state.toggle_page_selection(&[1, 2, 3]);
        assert_eq!(state.selected_ids(), [1, 2, 3]);
        state.toggle_page_selection(&[1, 2, 3]);
        assert!(state.selected_ids().is_empty());
    }

    #[test]
    fn derive_is_idempotent() {
        let records = catalog();
        let schema = ColumnSchema::products();
        let mut state = ViewState::new(4);
        state.toggle_sort("price", SortIntent::Replace(Direction::Asc));
        state.toggle_filter_value("brand", "Acme");
        state.set_global_filter("a");
        assert_eq!(state.derive(&records, &schema), state.derive(&records, &schema));
    }

    #[test]
    fn parses_ranges() {
        assert_eq!(
            ColumnFilter::parse_range("10..20"),
            Some(ColumnFilter::Range {
                min: Some(10.0),
                max: Some(20.0)
            })
        );
        assert_eq!(
            ColumnFilter::parse_range("..5"),
            Some(ColumnFilter::Range {
                min: None,
                max: Some(5.0)
            })
        );
        assert_eq!(
            ColumnFilter::parse_range("7"),
            Some(ColumnFilter::Range {
                min: Some(7.0),
                max: Some(7.0)
            })
        );
        assert!(ColumnFilter::parse_range("..").unwrap().is_empty());
        assert_eq!(ColumnFilter::parse_range("cheap"), None);
    }

    #[test]
    fn state_snapshot_round_trips() {
        let mut state = ViewState::new(20);
        state.toggle_sort("price", SortIntent::Replace(Direction::Desc));
        state.toggle_filter_value("category", "beauty");
        state.set_column_filter("stock", ColumnFilter::parse_range("1..").unwrap());
        state.set_global_filter("lip");
        state.set_visibility("thumbnail", false);
        state.set_selection(3, true);

        let json = serde_json::to_string(&state).unwrap();
        let restored: ViewState = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, state);
    }
}
