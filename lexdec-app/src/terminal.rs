use std::io::{self, Write};
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::style::Print;
use crossterm::terminal::{self, ClearType};
use crossterm::{cursor, execute, queue};
use lexdec_core::{Element, ElementId, ElementKind, KeyId};
use lexdec_experiment::{InputSignal, InputSource, StimulusDisplay};
use lexdec_timing::Timer;

/// Raw mode plus alternate screen for the lifetime of the guard.
pub struct TerminalGuard;

impl TerminalGuard {
    pub fn enter() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        execute!(io::stdout(), terminal::EnterAlternateScreen, cursor::Hide)?;
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = execute!(io::stdout(), cursor::Show, terminal::LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
    }
}

/// Keyboard presses stamped with the session clock at the moment they are read.
///
/// A termination key found while discarding stale presses is remembered and
/// reported by the next `next_signal`.
pub struct TerminalInput<T> {
    timer: T,
    terminated: bool,
}

impl<T> TerminalInput<T> {
    pub fn new(timer: T) -> Self {
        Self {
            timer,
            terminated: false,
        }
    }
}

impl<T: Timer<Timestamp = u64>> InputSource for TerminalInput<T> {
    fn next_signal(&mut self) -> io::Result<InputSignal> {
        if self.terminated {
            return Ok(InputSignal::Terminate);
        }
        loop {
            let Event::Key(key) = event::read()? else {
                continue;
            };
            let at_ns = self.timer.now();
            if let Some(signal) = map_key(key, at_ns) {
                return Ok(signal);
            }
        }
    }

    fn discard_pending(&mut self) -> io::Result<()> {
        let mut stale = Vec::new();
        while event::poll(Duration::ZERO)? {
            stale.push(event::read()?);
        }
        self.terminated |= requests_termination(stale);
        Ok(())
    }
}

/// Whether any of `events` is a termination key.
fn requests_termination(events: impl IntoIterator<Item = Event>) -> bool {
    events.into_iter().any(|event| match event {
        Event::Key(key) => map_key(key, 0) == Some(InputSignal::Terminate),
        _ => false,
    })
}

/// Esc and Ctrl-C end the session; releases and repeats are dropped.
pub fn map_key(key: KeyEvent, at_ns: u64) -> Option<InputSignal> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    match key.code {
        KeyCode::Esc => Some(InputSignal::Terminate),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(InputSignal::Terminate)
        }
        KeyCode::Char(c) => Some(InputSignal::Key {
            key: KeyId::from(c),
            at_ns,
        }),
        KeyCode::Enter => Some(InputSignal::Key {
            key: KeyId::new("ENTER"),
            at_ns,
        }),
        _ => None,
    }
}

/// Draws every shown element as a centered line, in show order.
pub struct TerminalDisplay<W: Write> {
    out: W,
    cols: u16,
    rows: u16,
    shown: Vec<(ElementId, String)>,
}

impl<W: Write> TerminalDisplay<W> {
    pub fn new(out: W, cols: u16, rows: u16) -> Self {
        Self {
            out,
            cols,
            rows,
            shown: Vec::new(),
        }
    }

    fn redraw(&mut self) -> io::Result<()> {
        queue!(self.out, terminal::Clear(ClearType::All))?;
        let width = usize::from(self.cols.saturating_sub(4)).max(1);
        let lines: Vec<String> = self
            .shown
            .iter()
            .flat_map(|(_, text)| wrap(text, width))
            .collect();
        let top = (self.rows as usize / 2).saturating_sub(lines.len() / 2);
        for (i, line) in lines.iter().enumerate() {
            let len = line.chars().count();
            let col = (self.cols as usize).saturating_sub(len) / 2;
            queue!(
                self.out,
                cursor::MoveTo(col as u16, (top + i) as u16),
                Print(line)
            )?;
        }
        self.out.flush()
    }
}

impl<W: Write> StimulusDisplay for TerminalDisplay<W> {
    fn show(&mut self, element: &Element, content: &str) -> io::Result<()> {
        let text = match element.kind {
            ElementKind::Button => format!("[ {content} ]"),
            ElementKind::Text | ElementKind::Mask => content.to_owned(),
        };
        self.shown.push((element.id.clone(), text));
        self.redraw()
    }

    fn hide(&mut self, id: &ElementId) -> io::Result<()> {
        self.shown.retain(|(shown, _)| shown != id);
        self.redraw()
    }
}

/// Greedy word wrap; words longer than `width` get a line of their own.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > width && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexdec_timing::ManualTimer;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn maps_decision_and_control_keys() {
        assert_eq!(
            map_key(press(KeyCode::Char('j')), 5),
            Some(InputSignal::Key {
                key: KeyId::new("J"),
                at_ns: 5
            })
        );
        assert_eq!(
            map_key(press(KeyCode::Char(' ')), 0),
            Some(InputSignal::Key {
                key: KeyId::new("SPACE"),
                at_ns: 0
            })
        );
        assert_eq!(map_key(press(KeyCode::Esc), 0), Some(InputSignal::Terminate));
        assert_eq!(
            map_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL), 0),
            Some(InputSignal::Terminate)
        );
        assert_eq!(map_key(press(KeyCode::Tab), 0), None);
    }

    #[test]
    fn releases_are_ignored() {
        let mut release = press(KeyCode::Char('f'));
        release.kind = KeyEventKind::Release;
        assert_eq!(map_key(release, 0), None);
    }

    #[test]
    fn escape_among_stale_presses_is_kept() {
        let stale = vec![
            Event::Key(press(KeyCode::Char('j'))),
            Event::FocusGained,
            Event::Key(press(KeyCode::Esc)),
            Event::Key(press(KeyCode::Char('f'))),
        ];
        assert!(requests_termination(stale));

        let ctrl_c = Event::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(requests_termination([ctrl_c]));
        assert!(!requests_termination([
            Event::Key(press(KeyCode::Char('j'))),
            Event::Key(press(KeyCode::Enter)),
        ]));
    }

    #[test]
    fn latched_termination_is_reported_first() {
        let mut input = TerminalInput::new(ManualTimer::new());
        input.terminated = true;
        assert_eq!(input.next_signal().unwrap(), InputSignal::Terminate);
        assert_eq!(input.next_signal().unwrap(), InputSignal::Terminate);
    }

    #[test]
    fn wraps_on_word_boundaries() {
        assert_eq!(
            wrap("press J if what you see is a word", 12),
            vec!["press J if", "what you see", "is a word"]
        );
        assert_eq!(wrap("#######", 3), vec!["#######"]);
        assert!(wrap("   ", 10).is_empty());
    }

    #[test]
    fn display_draws_only_visible_elements() {
        let mut display = TerminalDisplay::new(Vec::new(), 40, 10);
        display.show(&Element::mask("mask", "#####"), "#####").unwrap();
        display.hide(&ElementId::new("mask")).unwrap();
        display
            .show(&Element::button("close", "Close"), "Close")
            .unwrap();
        assert_eq!(display.shown.len(), 1);
        let out = String::from_utf8(display.out).unwrap();
        assert!(out.contains("#####"));
        assert!(out.ends_with("[ Close ]"));
    }
}
