use ratatui::{
    Frame,
    layout::{Constraint, Layout, Position, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Cell, Clear, List, ListItem, ListState, Paragraph, Row, Table, TableState},
};

use crate::columns::{Tone, tone};
use crate::domain::HELP_TEXT;
use crate::model::{PopupData, UIData};

const CHECKBOX_WIDTH: u16 = 3;

#[derive(Default)]
pub struct TableUI {
    table_state: TableState,
}

impl TableUI {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draw(&mut self, uidata: &UIData, frame: &mut Frame) {
        let sort_height = if uidata.sorting.len() > 1 { 1 } else { 0 };
        let [toolbar, sortline, body, footer, cmdline] = Layout::vertical([
            Constraint::Length(3),
            Constraint::Length(sort_height),
            Constraint::Min(3),
            Constraint::Length(2),
            Constraint::Length(1),
        ])
        .areas(frame.area());

        draw_toolbar(uidata, frame, toolbar);
        if sort_height > 0 {
            draw_sorting(uidata, frame, sortline);
        }
        self.draw_table(uidata, frame, body);
        draw_footer(uidata, frame, footer);
        draw_cmdline(uidata, frame, cmdline);

        if let Some(popup) = &uidata.popup {
            draw_popup(popup, frame);
        }
        if uidata.show_help {
            let area = centered_rect(70, 80, frame.area());
            frame.render_widget(Clear, area);
            let help = Paragraph::new(HELP_TEXT).block(Block::bordered().title(" Help "));
            frame.render_widget(help, area);
        }
    }

    fn draw_table(&mut self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let view = &uidata.view;
        if !uidata.has_records {
            let text = match (&uidata.error, uidata.loading) {
                (_, true) => Line::from("Loading products ...").italic(),
                (Some(e), false) => Line::from(format!("Error: {e}")).red(),
                (None, false) => Line::from("No products."),
            };
            let placeholder = Paragraph::new(text).centered().block(Block::bordered());
            frame.render_widget(placeholder, area);
            return;
        }

        let mut header = vec![Cell::from(checkbox(uidata.page_selected))];
        for (idx, column) in view.columns.iter().enumerate() {
            let mut title = column.title.to_string();
            if let Some((direction, priority)) = column.sort {
                title.push(' ');
                title.push_str(direction.arrow());
                if uidata.sorting.len() > 1 {
                    title.push_str(&priority.to_string());
                }
            }
            if column.filtered {
                title.push('*');
            }
            let mut style = Style::new().add_modifier(Modifier::BOLD);
            if idx == uidata.selected_column {
                style = style.add_modifier(Modifier::REVERSED);
            }
            header.push(Cell::from(title).style(style));
        }

        let rows = view.rows.iter().map(|row| {
            let mut cells = vec![Cell::from(checkbox(row.selected))];
            for (column, value) in view.columns.iter().zip(row.cells.iter()) {
                let style = match column.id {
                    "availabilityStatus" => tone_style(tone(value)),
                    _ => Style::default(),
                };
                cells.push(Cell::from(value.clone()).style(style));
            }
            Row::new(cells)
        });
        let widths = std::iter::once(Constraint::Length(CHECKBOX_WIDTH))
            .chain(view.columns.iter().map(|c| Constraint::Length(c.width)));

        let block = Block::bordered();
        let inner = block.inner(area);
        let table = Table::new(rows, widths)
            .header(Row::new(header).underlined())
            .block(block)
            .row_highlight_style(Style::new().add_modifier(Modifier::REVERSED))
            .highlight_symbol("> ");

        let selected = (!view.rows.is_empty()).then_some(uidata.selected_row);
        self.table_state.select(selected);
        frame.render_stateful_widget(table, area, &mut self.table_state);

        if view.rows.is_empty() && inner.height > 2 {
            let message_area = Rect {
                y: inner.y + 2,
                height: 1,
                ..inner
            };
            frame.render_widget(Paragraph::new("No results.").centered(), message_area);
        }
    }
}

fn draw_toolbar(uidata: &UIData, frame: &mut Frame, area: Rect) {
    let mut spans = vec![Span::from("/ ").bold()];
    if uidata.global_filter.is_empty() {
        spans.push(Span::from("Search all columns...").dark_gray());
    } else {
        spans.push(Span::from(uidata.global_filter.clone()));
    }
    for filter in &uidata.filters {
        spans.push(Span::from("  |  ").dark_gray());
        spans.push(Span::from(filter.clone()).yellow());
    }
    if !uidata.filters.is_empty() || !uidata.global_filter.trim().is_empty() {
        spans.push(Span::from("   [r] Reset").cyan());
    }

    let mut block = Block::bordered().title(Line::from(format!(" {} ", uidata.name)).bold());
    if uidata.loading {
        block = block.title(Line::from(" loading ... ").italic().right_aligned());
    }
    frame.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

fn draw_sorting(uidata: &UIData, frame: &mut Frame, area: Rect) {
    let entries = uidata
        .sorting
        .iter()
        .map(|(title, direction)| format!("{title} {}", direction.arrow()))
        .collect::<Vec<_>>()
        .join(" → ");
    let line = Line::from(vec![Span::from(" Sorted by: ").dark_gray(), Span::from(entries)]);
    frame.render_widget(Paragraph::new(line), area);
}

fn draw_footer(uidata: &UIData, frame: &mut Frame, area: Rect) {
    let view = &uidata.view;
    let page = view.page;
    let selection = Line::from(vec![
        Span::from(format!(
            " {} of {} row(s) selected.",
            view.selected_rows, view.total_rows
        )),
        Span::from(format!("    Rows per page: {}", page.page_size)).dark_gray(),
        Span::from(format!(
            "    Page {} of {}",
            page.page_index + 1,
            page.total_pages
        ))
        .bold(),
    ]);

    let batch = &uidata.batch;
    let batch_text = if batch.loaded == 0 {
        "batch -".to_string()
    } else {
        format!(
            "batch {}-{} of {}",
            batch.skip + 1,
            batch.skip + batch.loaded,
            batch.total
        )
    };
    let status = Line::from(vec![
        Span::from(format!(
            " {} of {} rows shown",
            view.rows.len(),
            page.filtered_rows
        )),
        Span::from(format!("    {batch_text}")).dark_gray(),
        Span::from(format!("    {}", uidata.status_message)).yellow(),
    ]);
    frame.render_widget(Paragraph::new(vec![selection, status]), area);
}

fn draw_cmdline(uidata: &UIData, frame: &mut Frame, area: Rect) {
    if uidata.active_cmdinput {
        let line = Line::from(vec![
            Span::from(uidata.cmd_prompt.clone()).bold(),
            Span::from(uidata.cmdinput.input.clone()),
        ]);
        frame.render_widget(Paragraph::new(line), area);

        let offset = uidata.cmd_prompt.chars().count() + uidata.cmdinput.curser_pos;
        let x = area.x.saturating_add(offset as u16).min(area.right().saturating_sub(1));
        frame.set_cursor_position(Position::new(x, area.y));
    } else {
        let hints = " ? help   / search   f facets   v columns   space select   q quit";
        frame.render_widget(Paragraph::new(hints).dark_gray(), area);
    }
}

fn draw_popup(popup: &PopupData, frame: &mut Frame) {
    let area = centered_rect(40, 60, frame.area());
    frame.render_widget(Clear, area);

    let items: Vec<ListItem> = popup
        .items
        .iter()
        .map(|item| {
            let count = item.count.map(|c| format!(" ({c})")).unwrap_or_default();
            ListItem::new(format!("{} {}{count}", checkbox(item.checked), item.label))
        })
        .collect();
    let list = List::new(items)
        .block(
            Block::bordered()
                .title(format!(" {} ", popup.title))
                .title_bottom(" space toggle  r clear  esc close "),
        )
        .highlight_style(Style::new().add_modifier(Modifier::REVERSED));

    let mut state = ListState::default().with_selected(Some(popup.cursor));
    frame.render_stateful_widget(list, area, &mut state);
}

fn checkbox(checked: bool) -> &'static str {
    if checked { "[x]" } else { "[ ]" }
}

fn tone_style(tone: Tone) -> Style {
    match tone {
        Tone::Positive => Style::default().fg(Color::Green),
        Tone::Negative => Style::default().fg(Color::Red),
        Tone::Plain => Style::default().fg(Color::Yellow),
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let [_, middle, _] = Layout::vertical([
        Constraint::Percentage((100 - percent_y) / 2),
        Constraint::Percentage(percent_y),
        Constraint::Percentage((100 - percent_y) / 2),
    ])
    .areas(area);

    let [_, center, _] = Layout::horizontal([
        Constraint::Percentage((100 - percent_x) / 2),
        Constraint::Percentage(percent_x),
        Constraint::Percentage((100 - percent_x) / 2),
    ])
    .areas(middle);
    center
}
