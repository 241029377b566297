use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use arboard::Clipboard;
use ratatui::crossterm::event::KeyEvent;
use tracing::{debug, error, info, trace, warn};

use crate::columns::{ColumnSchema, FilterKind, FilterOption, facet_options};
use crate::domain::{CMDMode, Message, PAGE_SIZES, PVConfig, PVError};
use crate::inputter::{InputResult, Inputter};
use crate::record::Record;
use crate::source::{Fetcher, PageRequest, RecordSource};
use crate::view_state::{ColumnFilter, DerivedView, Direction, SortIntent, ViewState};

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Status {
    Loading,
    Ready,
    Quitting,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    Table,
    CmdInput,
    FacetPopup,
    ColumnsPopup,
    Help,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PopupItem {
    pub label: String,
    pub checked: bool,
    pub count: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PopupData {
    pub title: String,
    pub items: Vec<PopupItem>,
    pub cursor: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BatchInfo {
    pub skip: usize,
    pub limit: usize,
    pub total: usize,
    pub loaded: usize,
}

/// Everything the ui needs to draw one frame.
pub struct UIData {
    pub name: String,
    pub loading: bool,
    pub error: Option<String>,
    pub view: DerivedView,
    pub has_records: bool,
    pub selected_row: usize,
    pub selected_column: usize,
    pub page_selected: bool,
    pub global_filter: String,
    pub filters: Vec<String>,
    pub sorting: Vec<(String, Direction)>,
    pub popup: Option<PopupData>,
    pub show_help: bool,
    pub cmdinput: InputResult,
    pub cmd_mode: Option<CMDMode>,
    pub cmd_prompt: String,
    pub active_cmdinput: bool,
    pub batch: BatchInfo,
    pub status_message: String,
}

impl UIData {
    pub fn empty() -> Self {
        UIData {
            name: String::new(),
            loading: false,
            error: None,
            view: DerivedView::empty(),
            has_records: false,
            selected_row: 0,
            selected_column: 0,
            page_selected: false,
            global_filter: String::new(),
            filters: Vec::new(),
            sorting: Vec::new(),
            popup: None,
            show_help: false,
            cmdinput: InputResult::default(),
            cmd_mode: None,
            cmd_prompt: String::new(),
            active_cmdinput: false,
            batch: BatchInfo::default(),
            status_message: String::new(),
        }
    }
}

pub struct Model {
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    schema: ColumnSchema,
    records: Vec<Record>,
    options: BTreeMap<&'static str, Vec<FilterOption>>,
    state: ViewState,
    view: DerivedView,
    fetcher: Fetcher,
    request: PageRequest,
    batch_total: usize,
    error: Option<String>,
    curser_row: usize,
    curser_column: usize,
    popup_column: Option<&'static str>,
    popup_curser: usize,
    clipboard: Option<Clipboard>,
    input: Inputter,
    cmd_mode: Option<CMDMode>,
    cmd_column: Option<&'static str>,
    last_input: InputResult,
    active_cmdinput: bool,
    global_before_input: String,
    fetch_started: Instant,
    status_message: String,
    uidata: UIData,
}

impl Model {
    pub fn init(config: &PVConfig, source: Arc<dyn RecordSource>) -> Self {
        let mut model = Self {
            status: Status::Loading,
            modus: Modus::Table,
            previous_modus: Modus::Table,
            schema: ColumnSchema::products(),
            records: Vec::new(),
            options: BTreeMap::new(),
            state: ViewState::new(config.page_size),
            view: DerivedView::empty(),
            fetcher: Fetcher::new(source),
            request: PageRequest {
                limit: config.limit.max(1),
                skip: config.skip,
            },
            batch_total: 0,
            error: None,
            curser_row: 0,
            curser_column: 0,
            popup_column: None,
            popup_curser: 0,
            clipboard: None,
            input: Inputter::default(),
            cmd_mode: None,
            cmd_column: None,
            last_input: InputResult::default(),
            active_cmdinput: false,
            global_before_input: String::new(),
            fetch_started: Instant::now(),
            status_message: "Started pv!".to_string(),
            uidata: UIData::empty(),
        };
        model.fetch();
        model.refresh();
        model
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    pub fn raw_keyevents(&self) -> bool {
        self.active_cmdinput
    }

    pub fn is_loading(&self) -> bool {
        self.fetcher.is_pending()
    }

    pub fn quit(&mut self) {
        self.status = Status::Quitting;
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), PVError> {
        let mut changed = self.receive_page();

        if let Some(msg) = message {
            changed = true;
            match self.modus {
                Modus::Table => match msg {
                    Message::Quit => self.quit(),
                    Message::MoveUp => self.move_row_up(),
                    Message::MoveDown => self.move_row_down(),
                    Message::MoveLeft => self.curser_column = self.curser_column.saturating_sub(1),
                    Message::MoveRight => self.curser_column += 1,
                    Message::NextPage => self.change_page(|state, pages| state.next_page(pages)),
                    Message::PrevPage => self.change_page(|state, _| state.previous_page()),
                    Message::FirstPage => self.change_page(|state, _| state.first_page()),
                    Message::LastPage => self.change_page(|state, pages| state.last_page(pages)),
                    Message::IncreasePageSize => self.step_page_size(true),
                    Message::DecreasePageSize => self.step_page_size(false),
                    Message::SortAscending => self.sort_current_column(SortIntent::Replace(Direction::Asc)),
                    Message::SortDescending => self.sort_current_column(SortIntent::Replace(Direction::Desc)),
                    Message::AddSortAscending => self.sort_current_column(SortIntent::Add(Direction::Asc)),
                    Message::AddSortDescending => self.sort_current_column(SortIntent::Add(Direction::Desc)),
                    Message::CycleSort => self.sort_current_column(SortIntent::Cycle),
                    Message::ClearSort => self.sort_current_column(SortIntent::Clear),
                    Message::ClearAllSorts => {
                        self.state.clear_sorting();
                        self.set_status_message("Cleared all sorts");
                    }
                    Message::Search => self.enter_cmd_mode(CMDMode::GlobalFilter),
                    Message::FilterColumn => self.filter_current_column(),
                    Message::FacetFilter => self.open_facet_popup(),
                    Message::ResetFilters => self.reset_filters(),
                    Message::ColumnVisibility => self.open_popup(Modus::ColumnsPopup, None),
                    Message::ToggleSelect => self.toggle_row_selection(),
                    Message::ToggleSelectPage => self.state.toggle_page_selection(&self.view.page_ids()),
                    Message::CopySelected => self.copy_selected(),
                    Message::Reload => self.fetch(),
                    Message::NextBatch => self.next_batch(),
                    Message::PrevBatch => self.prev_batch(),
                    Message::Help => self.show_help(),
                    Message::Resize(width, height) => trace!("UI was resized to {width}x{height}"),
                    _ => changed = false,
                },
                Modus::FacetPopup | Modus::ColumnsPopup => match msg {
                    Message::Quit => self.quit(),
                    Message::MoveUp => self.popup_curser = self.popup_curser.saturating_sub(1),
                    Message::MoveDown => {
                        self.popup_curser = (self.popup_curser + 1).min(self.popup_len().saturating_sub(1))
                    }
                    Message::ToggleSelect => self.toggle_popup_item(),
                    Message::ResetFilters => {
                        if let Some(column) = self.popup_column {
                            self.state.clear_column_filter(column);
                        }
                    }
                    Message::Exit => self.exit(),
                    _ => changed = false,
                },
                Modus::Help => match msg {
                    Message::Quit => self.quit(),
                    Message::Exit | Message::Help => self.exit(),
                    _ => changed = false,
                },
                Modus::CmdInput => {
                    if let Message::RawKey(key) = msg {
                        self.raw_input(key)
                    }
                }
            }
        }

        if changed {
            self.refresh();
        }
        Ok(())
    }

    // -------------------- Fetching ---------------------- //

    fn fetch(&mut self) {
        self.fetch_started = Instant::now();
        self.fetcher.request(self.request);
        self.status = Status::Loading;
        self.set_status_message("Loading ...");
    }

    fn receive_page(&mut self) -> bool {
        let Some((request, result)) = self.fetcher.poll() else {
            return false;
        };
        self.status = Status::Ready;
        match result {
            Ok(page) => {
                let took = self.fetch_started.elapsed().as_millis();
                info!(
                    "Loaded {} of {} products (skip {}) in {took}ms",
                    page.records.len(),
                    page.total,
                    page.skip
                );
                self.request = PageRequest {
                    limit: request.limit,
                    skip: page.skip,
                };
                self.batch_total = page.total;
                self.records = page.records;
                self.options = self
                    .schema
                    .iter()
                    .filter(|c| c.filter == Some(FilterKind::Membership))
                    .map(|c| (c.id, facet_options(c, &self.records)))
                    .collect();
                self.error = None;
                self.state.first_page();
                self.curser_row = 0;
                let message = format!("Loaded {} products in {took}ms ...", self.records.len());
                self.set_status_message(message);
            }
            Err(e) => {
                error!("Fetching products failed: {e}");
                // The last good records stay on screen.
                self.error = Some(e.to_string());
                self.set_status_message(format!("Error: {e}"));
            }
        }
        true
    }

    fn next_batch(&mut self) {
        let next = self.request.skip + self.request.limit;
        if next < self.batch_total {
            self.request.skip = next;
            self.fetch();
        } else {
            self.set_status_message("Already at the last batch");
        }
    }

    fn prev_batch(&mut self) {
        if self.request.skip > 0 {
            self.request.skip = self.request.skip.saturating_sub(self.request.limit);
            self.fetch();
        } else {
            self.set_status_message("Already at the first batch");
        }
    }

    // -------------------- Derived view ---------------------- //

    fn refresh(&mut self) {
        let start_time = Instant::now();
        self.view = self.state.derive(&self.records, &self.schema);
        trace!(
            "Derived {} of {} rows in {}us",
            self.view.page.filtered_rows,
            self.view.total_rows,
            start_time.elapsed().as_micros()
        );

        self.curser_row = self.curser_row.min(self.view.rows.len().saturating_sub(1));
        self.curser_column = self
            .curser_column
            .min(self.view.columns.len().saturating_sub(1));
        self.update_uidata();
    }

    fn update_uidata(&mut self) {
        let filters = self
            .state
            .column_filters()
            .iter()
            .map(|(id, filter)| {
                let title = self.schema.get(id).map(|c| c.title).unwrap_or("?");
                format!("{title}: {}", filter.describe())
            })
            .collect();
        let sorting = self
            .state
            .sorting()
            .iter()
            .map(|entry| {
                let title = self.schema.get(&entry.column).map(|c| c.title).unwrap_or("?");
                (title.to_string(), entry.direction)
            })
            .collect();
        let page_ids = self.view.page_ids();

        self.uidata = UIData {
            name: "Products".to_string(),
            loading: self.fetcher.is_pending(),
            error: self.error.clone(),
            view: self.view.clone(),
            has_records: !self.records.is_empty(),
            selected_row: self.curser_row,
            selected_column: self.curser_column,
            page_selected: !page_ids.is_empty()
                && page_ids.iter().all(|id| self.state.is_selected(*id)),
            global_filter: self.state.global_filter().to_string(),
            filters,
            sorting,
            popup: self.popup_data(),
            show_help: self.modus == Modus::Help,
            cmdinput: self.last_input.clone(),
            cmd_mode: self.cmd_mode,
            cmd_prompt: self.cmd_prompt(),
            active_cmdinput: self.active_cmdinput,
            batch: BatchInfo {
                skip: self.request.skip,
                limit: self.request.limit,
                total: self.batch_total,
                loaded: self.records.len(),
            },
            status_message: self.status_message.clone(),
        };
    }

    fn popup_data(&self) -> Option<PopupData> {
        let items: Vec<PopupItem> = match self.modus {
            Modus::FacetPopup => {
                let column = self.popup_column?;
                let accepted = match self.state.column_filter(column) {
                    Some(ColumnFilter::Membership(values)) => Some(values),
                    _ => None,
                };
                self.options
                    .get(column)?
                    .iter()
                    .map(|option| PopupItem {
                        label: option.label.clone(),
                        checked: accepted.is_some_and(|values| values.contains(&option.value)),
                        count: Some(self.view.facet_count(column, &option.value)),
                    })
                    .collect()
            }
            Modus::ColumnsPopup => self
                .schema
                .iter()
                .filter(|c| c.hideable)
                .map(|c| PopupItem {
                    label: c.id.to_string(),
                    checked: self.state.is_visible(c.id),
                    count: None,
                })
                .collect(),
            _ => return None,
        };
        let title = match self.popup_column.and_then(|id| self.schema.get(id)) {
            Some(column) if self.modus == Modus::FacetPopup => column.title.to_string(),
            _ => "Toggle columns".to_string(),
        };
        Some(PopupData {
            title,
            cursor: self.popup_curser.min(items.len().saturating_sub(1)),
            items,
        })
    }

    fn cmd_prompt(&self) -> String {
        match self.cmd_mode {
            Some(CMDMode::GlobalFilter) => "Search: ".to_string(),
            Some(CMDMode::ColumnFilter) => {
                let column = self.cmd_column.and_then(|id| self.schema.get(id));
                match column {
                    Some(c) if c.filter == Some(FilterKind::Range) => {
                        format!("{} (min..max): ", c.title)
                    }
                    Some(c) => format!("{} contains: ", c.title),
                    None => "Filter: ".to_string(),
                }
            }
            None => String::new(),
        }
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.uidata.status_message = self.status_message.clone();
    }

    fn current_column(&self) -> Option<&'static str> {
        self.view.columns.get(self.curser_column).map(|c| c.id)
    }

    // -------------------- Control handling functions ---------------------- //

    fn exit(&mut self) {
        match self.modus {
            Modus::FacetPopup | Modus::ColumnsPopup | Modus::Help => {
                trace!("Close popup ...");
                self.modus = self.previous_modus;
                self.previous_modus = Modus::Table;
                self.popup_column = None;
            }
            Modus::Table | Modus::CmdInput => {}
        }
    }

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::Help;
    }

    fn open_popup(&mut self, modus: Modus, column: Option<&'static str>) {
        self.previous_modus = self.modus;
        self.modus = modus;
        self.popup_column = column;
        self.popup_curser = 0;
    }

    fn open_facet_popup(&mut self) {
        let Some(column) = self.current_column() else {
            return;
        };
        if self.options.contains_key(column) {
            self.open_popup(Modus::FacetPopup, Some(column));
        } else {
            self.set_status_message(format!("Column {column} has no faceted filter"));
        }
    }

    fn popup_len(&self) -> usize {
        match self.modus {
            Modus::FacetPopup => self
                .popup_column
                .and_then(|column| self.options.get(column))
                .map_or(0, |options| options.len()),
            Modus::ColumnsPopup => self.schema.iter().filter(|c| c.hideable).count(),
            _ => 0,
        }
    }

    fn toggle_popup_item(&mut self) {
        match self.modus {
            Modus::FacetPopup => {
                let Some(column) = self.popup_column else {
                    return;
                };
                let value = self
                    .options
                    .get(column)
                    .and_then(|options| options.get(self.popup_curser))
                    .map(|option| option.value.clone());
                if let Some(value) = value {
                    debug!("Toggle filter value {column}={value}");
                    self.state.toggle_filter_value(column, &value);
                    self.curser_row = 0;
                }
            }
            Modus::ColumnsPopup => {
                let column = self
                    .schema
                    .iter()
                    .filter(|c| c.hideable)
                    .nth(self.popup_curser)
                    .map(|c| c.id);
                if let Some(column) = column {
                    self.state.toggle_visibility(column);
                }
            }
            _ => {}
        }
    }

    fn filter_current_column(&mut self) {
        let Some(column) = self.current_column().and_then(|id| self.schema.get(id)) else {
            return;
        };
        match column.filter {
            Some(FilterKind::Membership) => self.open_facet_popup(),
            Some(FilterKind::Substring) | Some(FilterKind::Range) => {
                let id = column.id;
                let existing = match self.state.column_filter(id) {
                    Some(ColumnFilter::Substring(term)) => term.clone(),
                    Some(range @ ColumnFilter::Range { .. }) => range.describe(),
                    _ => String::new(),
                };
                self.cmd_column = Some(id);
                self.enter_cmd_mode(CMDMode::ColumnFilter);
                self.input.start(&existing);
                self.last_input = self.input.get();
            }
            None => {
                let message = format!("Column {} can not be filtered", column.title);
                self.set_status_message(message);
            }
        }
    }

    fn reset_filters(&mut self) {
        if self.state.is_filtered() {
            self.state.reset_filters();
            self.curser_row = 0;
            self.set_status_message("Filters reset");
        }
    }

    fn sort_current_column(&mut self, intent: SortIntent) {
        let Some(column) = self.current_column().and_then(|id| self.schema.get(id)) else {
            return;
        };
        if !column.sortable {
            let message = format!("Column {} can not be sorted", column.title);
            self.set_status_message(message);
            return;
        }
        self.state.toggle_sort(column.id, intent);
        self.curser_row = 0;
        trace!("Sort {} with {:?}", column.id, intent);
    }

    fn change_page(&mut self, change: impl FnOnce(&mut ViewState, usize)) {
        change(&mut self.state, self.view.page.total_pages);
        self.curser_row = 0;
    }

    fn step_page_size(&mut self, grow: bool) {
        let current = self.state.pagination().page_size;
        let next = if grow {
            PAGE_SIZES.iter().copied().find(|s| *s > current)
        } else {
            PAGE_SIZES.iter().rev().copied().find(|s| *s < current)
        };
        if let Some(size) = next {
            self.state.set_page_size(size);
            self.curser_row = 0;
            self.set_status_message(format!("Showing {size} rows per page"));
        }
    }

    fn move_row_up(&mut self) {
        if self.curser_row > 0 {
            self.curser_row -= 1;
        } else if self.view.page.page_index > 0 {
            // Scroll into the previous page, landing on its last row.
            self.state.previous_page();
            self.curser_row = self.view.page.page_size - 1;
        }
    }

    fn move_row_down(&mut self) {
        if self.curser_row + 1 < self.view.rows.len() {
            self.curser_row += 1;
        } else if self.view.page.page_index + 1 < self.view.page.total_pages {
            self.state.next_page(self.view.page.total_pages);
            self.curser_row = 0;
        }
    }

    fn toggle_row_selection(&mut self) {
        if let Some(row) = self.view.rows.get(self.curser_row) {
            self.state.toggle_selection(row.id);
        }
    }

    // -------------------- Command input ---------------------- //

    fn enter_cmd_mode(&mut self, mode: CMDMode) {
        trace!("Entering command mode {mode:?} ...");
        self.previous_modus = self.modus;
        self.modus = Modus::CmdInput;
        self.cmd_mode = Some(mode);
        self.active_cmdinput = true;
        self.global_before_input = self.state.global_filter().to_string();
        self.input.start(self.state.global_filter());
        if mode != CMDMode::GlobalFilter {
            self.input.clear();
        }
        self.last_input = self.input.get();
    }

    fn raw_input(&mut self, key: KeyEvent) {
        if !self.active_cmdinput {
            return;
        }
        self.last_input = self.input.read(key);

        // The global search follows every keystroke.
        if self.cmd_mode == Some(CMDMode::GlobalFilter) {
            let text = if self.last_input.canceled {
                self.global_before_input.clone()
            } else {
                self.last_input.input.clone()
            };
            if text != self.state.global_filter() {
                self.state.set_global_filter(text);
                self.curser_row = 0;
            }
        }

        if self.last_input.finished {
            self.handle_cmd_input();
        }
    }

    fn handle_cmd_input(&mut self) {
        trace!("Handle cmd input {:?}", self.last_input);
        self.active_cmdinput = false;
        self.modus = self.previous_modus;
        self.previous_modus = Modus::CmdInput;

        let cmd_input = self.last_input.input.clone();
        match (self.cmd_mode, self.last_input.canceled) {
            (_, true) => {}
            (Some(CMDMode::GlobalFilter), false) => {
                let message = if cmd_input.trim().is_empty() {
                    "Search cleared".to_string()
                } else {
                    format!("Searching for '{}'", cmd_input.trim())
                };
                self.set_status_message(message);
            }
            (Some(CMDMode::ColumnFilter), false) => self.apply_column_filter(&cmd_input),
            (None, false) => info!("Cmd mode is none!"),
        }

        self.cmd_mode = None;
        self.cmd_column = None;
    }

    fn apply_column_filter(&mut self, text: &str) {
        let Some(column) = self.cmd_column.and_then(|id| self.schema.get(id)) else {
            return;
        };
        let filter = match column.filter {
            Some(FilterKind::Range) => ColumnFilter::parse_range(text),
            Some(FilterKind::Substring) => Some(ColumnFilter::Substring(text.trim().to_string())),
            _ => None,
        };
        match filter {
            Some(filter) => {
                debug!("Filter {} by {:?}", column.id, filter);
                self.state.set_column_filter(column.id, filter);
                self.curser_row = 0;
            }
            None => {
                warn!("Rejected filter input {text:?} for {}", column.id);
                let message = format!("Invalid range '{text}', expected min..max");
                self.set_status_message(message);
            }
        }
    }

    // -------------------- Clipboard ---------------------- //

    fn wrap_cell_content(c: &str) -> String {
        let needs_escaping = c.contains('"');
        let needs_wrapping = c.chars().any(|c| c == '"' || c == ',' || c == '\n');
        let mut out = String::from(c);

        if needs_escaping {
            out = out.replace('"', "\"\"");
        }
        if needs_wrapping {
            out = format!("\"{out}\"");
        }
        out
    }

    /// Selected records of the current batch as csv over the visible columns.
    fn selected_rows_csv(&self) -> Option<String> {
        let selected: Vec<&Record> = self
            .records
            .iter()
            .filter(|r| self.state.is_selected(r.id))
            .collect();
        if selected.is_empty() {
            return None;
        }
        let columns: Vec<_> = self
            .schema
            .iter()
            .filter(|c| self.state.is_visible(c.id))
            .collect();

        let mut lines = vec![
            columns
                .iter()
                .map(|c| Self::wrap_cell_content(c.title))
                .collect::<Vec<_>>()
                .join(","),
        ];
        for record in selected {
            lines.push(
                columns
                    .iter()
                    .map(|c| Self::wrap_cell_content(&c.value(record).to_string()))
                    .collect::<Vec<_>>()
                    .join(","),
            );
        }
        Some(lines.join("\n"))
    }

    fn copy_selected(&mut self) {
        let Some(content) = self.selected_rows_csv() else {
            self.set_status_message("No rows selected");
            return;
        };
        let rows = content.lines().count() - 1;

        if self.clipboard.is_none() {
            match Clipboard::new() {
                Ok(clipboard) => self.clipboard = Some(clipboard),
                Err(e) => {
                    warn!("Clipboard unavailable: {e:?}");
                    self.set_status_message("Clipboard unavailable");
                    return;
                }
            }
        }
        let copied = self
            .clipboard
            .as_mut()
            .map(|clipboard| clipboard.set_text(content));
        match copied {
            Some(Ok(_)) => self.set_status_message(format!("Copied {rows} rows to clipboard")),
            Some(Err(e)) => {
                warn!("Error copying to clipboard: {e:?}");
                self.set_status_message("Copying to clipboard failed");
            }
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::FileSource;
    use ratatui::crossterm::event::{KeyCode, KeyModifiers};
    use std::path::PathBuf;
    use std::thread;
    use std::time::Duration;

    fn fixture() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/products.json")
    }

    fn settle(model: &mut Model) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while model.is_loading() && Instant::now() < deadline {
            model.update(None).unwrap();
            thread::sleep(Duration::from_millis(5));
        }
        model.update(None).unwrap();
    }

    fn loaded(config: PVConfig) -> Model {
        let mut model = Model::init(&config, Arc::new(FileSource::new(fixture())));
        settle(&mut model);
        model
    }

    fn send(model: &mut Model, messages: &[Message]) {
        for message in messages {
            model.update(Some(message.clone())).unwrap();
        }
    }

    fn type_text(model: &mut Model, text: &str) {
        for c in text.chars() {
            let key = KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE);
            model.update(Some(Message::RawKey(key))).unwrap();
        }
    }

    fn key(model: &mut Model, code: KeyCode) {
        let key = KeyEvent::new(code, KeyModifiers::NONE);
        model.update(Some(Message::RawKey(key))).unwrap();
    }

    fn titles(model: &Model) -> Vec<String> {
        let ui = model.get_uidata();
        let idx = ui.view.columns.iter().position(|c| c.id == "title").unwrap();
        ui.view.rows.iter().map(|r| r.cells[idx].clone()).collect()
    }

    #[test]
    fn loads_first_batch() {
        let model = loaded(PVConfig::default());
        let ui = model.get_uidata();
        assert_eq!(model.status, Status::Ready);
        assert!(ui.error.is_none());
        assert_eq!(ui.view.total_rows, 12);
        assert_eq!(ui.view.rows.len(), 10);
        assert_eq!(ui.view.page.total_pages, 2);
        assert_eq!(ui.batch.total, 12);
        assert_eq!(model.options["category"].len(), 4);
        assert_eq!(model.options["availabilityStatus"].len(), 3);
    }

    #[test]
    fn sorts_current_column() {
        let mut model = loaded(PVConfig::default());
        // Image -> Product -> Price
        send(&mut model, &[Message::MoveRight, Message::MoveRight, Message::SortAscending]);
        assert_eq!(titles(&model)[0], "Apple");

        send(&mut model, &[Message::SortDescending]);
        assert_eq!(titles(&model)[0], "Annibale Colombo Sofa");
        assert_eq!(model.get_uidata().sorting, [("Price".to_string(), Direction::Desc)]);

        send(&mut model, &[Message::MoveLeft, Message::AddSortAscending]);
        assert_eq!(model.get_uidata().sorting.len(), 2);
        send(&mut model, &[Message::ClearAllSorts]);
        assert!(model.get_uidata().sorting.is_empty());
    }

    #[test]
    fn image_column_is_not_sortable() {
        let mut model = loaded(PVConfig::default());
        send(&mut model, &[Message::SortAscending]);
        assert!(model.get_uidata().sorting.is_empty());
        assert!(model.get_uidata().status_message.contains("can not be sorted"));
    }

    #[test]
    fn global_search_follows_keystrokes() {
        let mut model = loaded(PVConfig::default());
        send(&mut model, &[Message::Search]);
        assert!(model.raw_keyevents());
        type_text(&mut model, "RED");
        assert_eq!(titles(&model), ["Red Lipstick", "Red Nail Polish"]);
        key(&mut model, KeyCode::Enter);
        assert!(!model.raw_keyevents());
        assert_eq!(model.get_uidata().global_filter, "RED");

        // Escape restores the search from before editing.
        send(&mut model, &[Message::Search]);
        type_text(&mut model, "xyz");
        assert!(titles(&model).is_empty());
        key(&mut model, KeyCode::Esc);
        assert_eq!(model.get_uidata().global_filter, "RED");
        assert_eq!(titles(&model).len(), 2);
    }

    #[test]
    fn faceted_filter_popup() {
        let mut model = loaded(PVConfig::default());
        send(
            &mut model,
            &[Message::MoveRight, Message::MoveRight, Message::MoveRight, Message::FacetFilter],
        );
        let popup = model.get_uidata().popup.clone().unwrap();
        assert_eq!(popup.title, "Category");
        assert_eq!(popup.items[0].label, "Beauty");
        assert_eq!(popup.items[0].count, Some(5));

        send(&mut model, &[Message::MoveDown, Message::ToggleSelect]);
        let ui = model.get_uidata();
        assert_eq!(ui.view.page.filtered_rows, 3);
        assert!(ui.popup.as_ref().unwrap().items[1].checked);
        assert_eq!(ui.filters, ["Category: fragrances"]);

        send(&mut model, &[Message::Exit]);
        assert!(model.get_uidata().popup.is_none());
        send(&mut model, &[Message::ResetFilters]);
        assert_eq!(model.get_uidata().view.page.filtered_rows, 12);
    }

    #[test]
    fn range_filter_from_command_line() {
        let mut model = loaded(PVConfig::default());
        send(&mut model, &[Message::MoveRight, Message::MoveRight, Message::FilterColumn]);
        assert_eq!(model.get_uidata().cmd_prompt, "Price (min..max): ");
        type_text(&mut model, "..10");
        key(&mut model, KeyCode::Enter);
        assert_eq!(model.get_uidata().view.page.filtered_rows, 3);

        send(&mut model, &[Message::FilterColumn]);
        assert_eq!(model.get_uidata().cmdinput.input, "..10");
        let clear = KeyEvent::new(KeyCode::Char('u'), KeyModifiers::CONTROL);
        model.update(Some(Message::RawKey(clear))).unwrap();
        type_text(&mut model, "x");
        key(&mut model, KeyCode::Enter);
        assert!(model.get_uidata().status_message.starts_with("Invalid range"));
    }

    #[test]
    fn substring_filter_on_title() {
        let mut model = loaded(PVConfig::default());
        send(&mut model, &[Message::MoveRight, Message::FilterColumn]);
        type_text(&mut model, "annibale");
        key(&mut model, KeyCode::Enter);
        assert_eq!(titles(&model), ["Annibale Colombo Bed", "Annibale Colombo Sofa"]);
    }

    #[test]
    fn popup_cursor_stops_at_last_item() {
        let mut model = loaded(PVConfig::default());
        send(
            &mut model,
            &[Message::MoveRight, Message::MoveRight, Message::MoveRight, Message::FacetFilter],
        );
        for _ in 0..7 {
            send(&mut model, &[Message::MoveDown]);
        }
        send(&mut model, &[Message::ToggleSelect]);
        let popup = model.get_uidata().popup.clone().unwrap();
        assert_eq!(popup.items.len(), 4);
        assert_eq!(popup.cursor, 3);
        assert!(popup.items[3].checked);
        assert_eq!(model.get_uidata().filters, ["Category: groceries"]);

        send(&mut model, &[Message::MoveUp, Message::ToggleSelect]);
        let popup = model.get_uidata().popup.clone().unwrap();
        assert_eq!(popup.cursor, 2);
        assert!(popup.items[2].checked);
    }

    #[test]
    fn toggles_column_visibility() {
        let mut model = loaded(PVConfig::default());
        send(&mut model, &[Message::ColumnVisibility]);
        assert_eq!(model.get_uidata().popup.as_ref().unwrap().items.len(), 8);
        send(&mut model, &[Message::ToggleSelect, Message::Exit]);
        let ui = model.get_uidata();
        assert_eq!(ui.view.columns.len(), 7);
        assert_eq!(ui.view.columns[0].id, "title");
    }

    #[test]
    fn selects_and_exports_rows() {
        let mut model = loaded(PVConfig::default());
        send(&mut model, &[Message::ToggleSelect, Message::MoveDown, Message::ToggleSelect]);
        assert_eq!(model.get_uidata().view.selected_rows, 2);

        let csv = model.selected_rows_csv().unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Image,Product,Price,Category"));
        assert!(lines[1].contains("Essence Mascara Lash Princess,9.99,beauty,Essence"));

        send(&mut model, &[Message::ToggleSelectPage]);
        assert!(model.get_uidata().page_selected);
        assert_eq!(model.get_uidata().view.selected_rows, 10);
    }

    #[test]
    fn wraps_csv_cells() {
        assert_eq!(Model::wrap_cell_content("plain text"), "plain text");
        assert_eq!(Model::wrap_cell_content("a,b"), "\"a,b\"");
        assert_eq!(Model::wrap_cell_content("Dior J\"adore"), "\"Dior J\"\"adore\"");
    }

    #[test]
    fn pages_through_rows() {
        let mut model = loaded(PVConfig::default());
        send(&mut model, &[Message::NextPage]);
        let ui = model.get_uidata();
        assert_eq!(ui.view.page.page_index, 1);
        assert_eq!(ui.view.rows.len(), 2);

        send(&mut model, &[Message::NextPage]);
        assert_eq!(model.get_uidata().view.page.page_index, 1);

        send(&mut model, &[Message::IncreasePageSize]);
        let ui = model.get_uidata();
        assert_eq!(ui.view.page.page_size, 20);
        assert_eq!(ui.view.page.page_index, 0);
        assert_eq!(ui.view.page.total_pages, 1);

        send(&mut model, &[Message::DecreasePageSize, Message::DecreasePageSize]);
        assert_eq!(model.get_uidata().view.page.page_size, 10);
    }

    #[test]
    fn moving_past_the_page_end_turns_the_page() {
        let mut model = loaded(PVConfig::default());
        for _ in 0..10 {
            send(&mut model, &[Message::MoveDown]);
        }
        let ui = model.get_uidata();
        assert_eq!(ui.view.page.page_index, 1);
        assert_eq!(ui.selected_row, 0);

        send(&mut model, &[Message::MoveUp]);
        let ui = model.get_uidata();
        assert_eq!(ui.view.page.page_index, 0);
        assert_eq!(ui.selected_row, 9);
    }

    #[test]
    fn fetches_next_batch() {
        let mut model = loaded(PVConfig::default().limit(5));
        assert_eq!(model.get_uidata().view.total_rows, 5);

        send(&mut model, &[Message::NextBatch]);
        assert_eq!(model.status, Status::Loading);
        settle(&mut model);
        let ui = model.get_uidata();
        assert_eq!(ui.batch.skip, 5);
        assert_eq!(ui.view.rows[0].id, 6);

        send(&mut model, &[Message::PrevBatch]);
        settle(&mut model);
        assert_eq!(model.get_uidata().batch.skip, 0);
        send(&mut model, &[Message::PrevBatch]);
        assert!(model.get_uidata().status_message.contains("first batch"));
    }

    #[test]
    fn fetch_failure_is_reported() {
        let mut model = Model::init(
            &PVConfig::default(),
            Arc::new(FileSource::new(PathBuf::from("missing.json"))),
        );
        settle(&mut model);
        let ui = model.get_uidata();
        assert_eq!(model.status, Status::Ready);
        assert!(ui.error.as_ref().unwrap().contains("missing.json"));
        assert!(!ui.has_records);
        assert!(ui.view.rows.is_empty());
    }

    #[test]
    fn help_opens_and_closes() {
        let mut model = loaded(PVConfig::default());
        send(&mut model, &[Message::Help]);
        assert!(model.get_uidata().show_help);
        send(&mut model, &[Message::NextPage]);
        assert_eq!(model.get_uidata().view.page.page_index, 0);
        send(&mut model, &[Message::Exit]);
        assert!(!model.get_uidata().show_help);
        send(&mut model, &[Message::Quit]);
        assert_eq!(model.status, Status::Quitting);
    }
}
