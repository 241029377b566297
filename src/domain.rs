use derive_setters::Setters;
use ratatui::crossterm::event::KeyEvent;

use crate::source::SourceError;

pub const DEFAULT_URL: &str = "https://dummyjson.com/products";
pub const DEFAULT_LIMIT: usize = 194;
pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const PAGE_SIZES: [usize; 5] = [10, 20, 30, 40, 50];

pub const HELP_TEXT: &str = "\
Navigation
  ↑/↓ k/j     move row          ←/→ h/l   move column
  ] / [       next/prev page    g / G     first/last page
  + / -       page size         > / <     next/prev remote batch
  R           reload

Sorting (current column)
  s / S       sort asc/desc     a / A     add asc/desc
  t           cycle sort        x / X     clear column/all sorts

Filtering
  /           search all columns
  F           filter current column (text or min..max)
  f           faceted filter for current column
  r           reset all filters

Columns & rows
  v           toggle column visibility
  space       select row        *         select page
  y           copy selected rows

  ?           help              esc       close   q quit";

#[derive(Debug, Clone, Setters)]
pub struct PVConfig {
    pub event_poll_time: u64,
    #[setters(into)]
    pub url: String,
    pub limit: usize,
    pub skip: usize,
    pub page_size: usize,
}

impl Default for PVConfig {
    fn default() -> Self {
        Self {
            event_poll_time: 100,
            url: DEFAULT_URL.to_string(),
            limit: DEFAULT_LIMIT,
            skip: 0,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PVError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Fetch failed: {0}")]
    FetchFailure(#[from] SourceError),
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Which kind of text the command line is collecting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CMDMode {
    GlobalFilter,
    ColumnFilter,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    NextPage,
    PrevPage,
    FirstPage,
    LastPage,
    IncreasePageSize,
    DecreasePageSize,
    SortAscending,
    SortDescending,
    AddSortAscending,
    AddSortDescending,
    CycleSort,
    ClearSort,
    ClearAllSorts,
    Search,
    FilterColumn,
    FacetFilter,
    ResetFilters,
    ColumnVisibility,
    ToggleSelect,
    ToggleSelectPage,
    CopySelected,
    Reload,
    NextBatch,
    PrevBatch,
    Help,
    Exit,
    Resize(u16, u16),
    RawKey(KeyEvent),
}
