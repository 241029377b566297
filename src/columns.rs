use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;

use crate::record::Record;

/// A cell value as seen by sorting and filtering.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Number(f64),
}

impl Value {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Text(s) => s.trim().parse().ok(),
        }
    }

    /// Numbers order numerically, text case-insensitively with a byte-wise
    /// tie-break. Numbers sort before text.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a.total_cmp(b),
            (Value::Text(a), Value::Text(b)) => a
                .to_lowercase()
                .cmp(&b.to_lowercase())
                .then_with(|| a.cmp(b)),
            (Value::Number(_), Value::Text(_)) => Ordering::Less,
            (Value::Text(_), Value::Number(_)) => Ordering::Greater,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => write!(f, "{s}"),
            Value::Number(n) => write!(f, "{n}"),
        }
    }
}

/// How a column can be filtered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Membership,
    Substring,
    Range,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Plain,
    Positive,
    Negative,
}

pub struct ColumnDef {
    pub id: &'static str,
    pub title: &'static str,
    pub sortable: bool,
    pub hideable: bool,
    pub filter: Option<FilterKind>,
    pub width: u16,
    accessor: fn(&Record) -> Value,
    cell: fn(&Record) -> String,
    label: fn(&str) -> String,
}

impl ColumnDef {
    pub fn value(&self, record: &Record) -> Value {
        (self.accessor)(record)
    }

    pub fn render(&self, record: &Record) -> String {
        (self.cell)(record)
    }

    /// Human readable label for a raw filter value.
    pub fn option_label(&self, value: &str) -> String {
        (self.label)(value)
    }

    pub fn is_filterable(&self) -> bool {
        self.filter.is_some()
    }
}

/// Ordered list of columns. Ids are unique, order is display order.
pub struct ColumnSchema {
    columns: Vec<ColumnDef>,
}

impl ColumnSchema {
    pub fn new(columns: Vec<ColumnDef>) -> Self {
        debug_assert!(
            {
                let mut seen = HashSet::new();
                columns.iter().all(|c| seen.insert(c.id))
            },
            "column ids must be unique"
        );
        Self { columns }
    }

    pub fn products() -> Self {
        Self::new(vec![
            ColumnDef {
                id: "thumbnail",
                title: "Image",
                sortable: false,
                hideable: true,
                filter: None,
                width: 6,
                accessor: |r| Value::Text(r.thumbnail.clone()),
                cell: |r| initials(&r.title),
                label: verbatim,
            },
            ColumnDef {
                id: "title",
                title: "Product",
                sortable: true,
                hideable: true,
                filter: Some(FilterKind::Substring),
                width: 36,
                accessor: |r| Value::Text(r.title.clone()),
                cell: title_cell,
                label: verbatim,
            },
            ColumnDef {
                id: "price",
                title: "Price",
                sortable: true,
                hideable: true,
                filter: Some(FilterKind::Range),
                width: 22,
                accessor: |r| Value::Number(r.price),
                cell: price_cell,
                label: verbatim,
            },
            ColumnDef {
                id: "category",
                title: "Category",
                sortable: true,
                hideable: true,
                filter: Some(FilterKind::Membership),
                width: 18,
                accessor: |r| Value::Text(r.category.clone()),
                cell: |r| r.category.clone(),
                label: capitalize,
            },
            ColumnDef {
                id: "brand",
                title: "Brand",
                sortable: true,
                hideable: true,
                filter: Some(FilterKind::Membership),
                width: 18,
                accessor: |r| Value::Text(r.brand.clone()),
                cell: |r| r.brand.clone(),
                label: verbatim,
            },
            ColumnDef {
                id: "availabilityStatus",
                title: "Status",
                sortable: true,
                hideable: true,
                filter: Some(FilterKind::Membership),
                width: 14,
                accessor: |r| Value::Text(r.availability_status.clone()),
                cell: |r| r.availability_status.clone(),
                label: verbatim,
            },
            ColumnDef {
                id: "stock",
                title: "Stock",
                sortable: true,
                hideable: true,
                filter: Some(FilterKind::Range),
                width: 8,
                accessor: |r| Value::Number(r.stock as f64),
                cell: |r| r.stock.to_string(),
                label: verbatim,
            },
            ColumnDef {
                id: "rating",
                title: "Rating",
                sortable: true,
                hideable: true,
                filter: Some(FilterKind::Range),
                width: 8,
                accessor: |r| Value::Number(r.rating),
                cell: |r| format!("{:.1}", r.rating),
                label: verbatim,
            },
        ])
    }

    pub fn get(&self, id: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.id == id)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ColumnDef> {
        self.columns.iter()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterOption {
    pub label: String,
    pub value: String,
}

/// The distinct values of a column over the full record set, in the order
/// they first appear.
pub fn facet_options(column: &ColumnDef, records: &[Record]) -> Vec<FilterOption> {
    let mut seen = HashSet::new();
    records
        .iter()
        .map(|r| column.value(r).to_string())
        .filter(|v| seen.insert(v.clone()))
        .map(|value| FilterOption {
            label: column.option_label(&value),
            value,
        })
        .collect()
}

pub fn tone(status: &str) -> Tone {
    match status {
        "In Stock" | "Available" => Tone::Positive,
        "Out of Stock" | "Discontinued" => Tone::Negative,
        _ => Tone::Plain,
    }
}

fn verbatim(value: &str) -> String {
    value.to_string()
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn initials(title: &str) -> String {
    title.chars().take(2).collect::<String>().to_uppercase()
}

fn title_cell(record: &Record) -> String {
    if record.description.is_empty() {
        record.title.clone()
    } else {
        format!("{} · {}", record.title, record.description)
    }
}

fn price_cell(record: &Record) -> String {
    if record.discount_percentage > 0.0 {
        format!(
            "{} → {}",
            format_usd(record.price),
            format_usd(record.discounted_price())
        )
    } else {
        format_usd(record.price)
    }
}

pub fn format_usd(value: f64) -> String {
    let cents = (value.max(0.0) * 100.0).round() as u64;
    let digits = (cents / 100).to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, chr) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(chr);
    }
    format!("${grouped}.{:02}", cents % 100)
}
