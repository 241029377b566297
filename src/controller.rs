use std::time::Duration;
use tracing::trace;

use crate::domain::{Message, PVConfig, PVError};
use crate::model::Model;
use ratatui::crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

pub struct Controller {
    event_poll_time: u64,
}

impl Controller {
    pub fn new(cfg: &PVConfig) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
        }
    }

    pub fn handle_event(&self, model: &Model) -> Result<Option<Message>, PVError> {
        if event::poll(Duration::from_millis(self.event_poll_time))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    return Ok(self.handle_key(key, model.raw_keyevents()));
                }
                Event::Resize(width, height) => return Ok(Some(Message::Resize(width, height))),
                _ => {}
            }
        }
        Ok(None)
    }

    fn handle_key(&self, key: KeyEvent, raw: bool) -> Option<Message> {
        if raw {
            return Some(Message::RawKey(key));
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            return match key.code {
                KeyCode::Char('c') => Some(Message::Quit),
                _ => None,
            };
        }

        let message = match key.code {
            KeyCode::Char('q') => Some(Message::Quit),
            KeyCode::Esc => Some(Message::Exit),
            KeyCode::Char('?') => Some(Message::Help),

            KeyCode::Up | KeyCode::Char('k') => Some(Message::MoveUp),
            KeyCode::Down | KeyCode::Char('j') => Some(Message::MoveDown),
            KeyCode::Left | KeyCode::Char('h') => Some(Message::MoveLeft),
            KeyCode::Right | KeyCode::Char('l') => Some(Message::MoveRight),

            KeyCode::Char(']') | KeyCode::PageDown => Some(Message::NextPage),
            KeyCode::Char('[') | KeyCode::PageUp => Some(Message::PrevPage),
            KeyCode::Char('g') | KeyCode::Home => Some(Message::FirstPage),
            KeyCode::Char('G') | KeyCode::End => Some(Message::LastPage),
            KeyCode::Char('+') => Some(Message::IncreasePageSize),
            KeyCode::Char('-') => Some(Message::DecreasePageSize),

            KeyCode::Char('s') => Some(Message::SortAscending),
            KeyCode::Char('S') => Some(Message::SortDescending),
            KeyCode::Char('a') => Some(Message::AddSortAscending),
            KeyCode::Char('A') => Some(Message::AddSortDescending),
            KeyCode::Char('t') => Some(Message::CycleSort),
            KeyCode::Char('x') => Some(Message::ClearSort),
            KeyCode::Char('X') => Some(Message::ClearAllSorts),

            KeyCode::Char('/') => Some(Message::Search),
            KeyCode::Char('F') => Some(Message::FilterColumn),
            KeyCode::Char('f') => Some(Message::FacetFilter),
            KeyCode::Char('r') => Some(Message::ResetFilters),

            KeyCode::Char('v') => Some(Message::ColumnVisibility),
            KeyCode::Char(' ') | KeyCode::Enter => Some(Message::ToggleSelect),
            KeyCode::Char('*') => Some(Message::ToggleSelectPage),
            KeyCode::Char('y') => Some(Message::CopySelected),

            KeyCode::Char('>') => Some(Message::NextBatch),
            KeyCode::Char('<') => Some(Message::PrevBatch),
            KeyCode::Char('R') => Some(Message::Reload),
            _ => None,
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> Option<Message> {
        Controller::new(&PVConfig::default()).handle_key(KeyEvent::new(code, KeyModifiers::NONE), false)
    }

    #[test]
    fn maps_navigation_keys() {
        assert_eq!(press(KeyCode::Char('j')), Some(Message::MoveDown));
        assert_eq!(press(KeyCode::Up), Some(Message::MoveUp));
        assert_eq!(press(KeyCode::Char(']')), Some(Message::NextPage));
        assert_eq!(press(KeyCode::Char('G')), Some(Message::LastPage));
        assert_eq!(press(KeyCode::Char('+')), Some(Message::IncreasePageSize));
    }

    #[test]
    fn maps_view_state_keys() {
        assert_eq!(press(KeyCode::Char('S')), Some(Message::SortDescending));
        assert_eq!(press(KeyCode::Char('a')), Some(Message::AddSortAscending));
        assert_eq!(press(KeyCode::Char('/')), Some(Message::Search));
        assert_eq!(press(KeyCode::Char('f')), Some(Message::FacetFilter));
        assert_eq!(press(KeyCode::Char(' ')), Some(Message::ToggleSelect));
        assert_eq!(press(KeyCode::Char('>')), Some(Message::NextBatch));
        assert_eq!(press(KeyCode::Char('Z')), None);
    }

    #[test]
    fn passes_raw_keys_while_typing() {
        let controller = Controller::new(&PVConfig::default());
        let key = KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE);
        assert_eq!(controller.handle_key(key, true), Some(Message::RawKey(key)));
        assert_eq!(controller.handle_key(key, false), Some(Message::Quit));
    }

    #[test]
    fn ctrl_c_quits() {
        let controller = Controller::new(&PVConfig::default());
        let key = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(controller.handle_key(key, false), Some(Message::Quit));
    }
}
