use crate::client::AppSnapshot;
use color_eyre::eyre::{
    Result,
    eyre,
};
use crossterm::{
    event::{
        self,
        Event,
        KeyCode,
        KeyEventKind,
        KeyModifiers,
    },
    terminal::{
        disable_raw_mode,
        enable_raw_mode,
    },
};
use daily_gm::notice::NoticeLevel;
use ratatui::{
    prelude::*,
    widgets::*,
};
use std::{
    io::stdout,
    time::Duration,
};
use tokio::sync::mpsc;

const INPUT_POLL: Duration = Duration::from_millis(200);
const CHOOSER_ITEMS: usize = 3;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum UserEvent {
    Quit,
    Redraw,
    SayGm,
    SayGmTo(String),
    SwitchNetwork,
    OpenHome,
    OpenLastTx,
    RefreshStats,
}

#[derive(Debug, Default)]
pub struct UiState {
    mode: Mode,
    terminal: Option<Terminal<CrosstermBackend<std::io::Stdout>>>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
enum Mode {
    #[default]
    Normal,
    Chooser(usize),
    RecipientInput(String),
    QuitModal,
}

pub type InputEventReceiver = mpsc::UnboundedReceiver<std::io::Result<Event>>;

/// Reads terminal events on a blocking thread until the receiver goes away.
pub fn input_event_stream() -> InputEventReceiver {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::task::spawn_blocking(move || {
        while !tx.is_closed() {
            match event::poll(INPUT_POLL) {
                Ok(true) => {
                    if tx.send(event::read()).is_err() {
                        break;
                    }
                }
                Ok(false) => {}
                Err(err) => {
                    let _ = tx.send(Err(err));
                    break;
                }
            }
        }
    });
    rx
}

pub async fn next_raw_event(input_events: &mut InputEventReceiver) -> Result<Event> {
    match input_events.recv().await {
        Some(event) => Ok(event?),
        None => Err(eyre!("terminal input stream closed")),
    }
}

pub fn terminal_enter(state: &mut UiState) -> Result<()> {
    enable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout());
    state.terminal = Some(Terminal::new(backend)?);
    Ok(())
}

pub fn terminal_exit() -> Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::LeaveAlternateScreen)?;
    Ok(())
}

/// Back to the main screen, e.g. once a GM has landed.
pub fn close_modal(state: &mut UiState) {
    if matches!(state.mode, Mode::Chooser(_) | Mode::RecipientInput(_)) {
        state.mode = Mode::Normal;
    }
}

pub fn draw(state: &mut UiState, snap: &AppSnapshot) -> Result<()> {
    if let Some(mut term) = state.terminal.take() {
        let drawn = term.draw(|f| ui(f, &state.mode, snap)).map(|_| ());
        state.terminal = Some(term);
        drawn?;
    }
    Ok(())
}

pub fn interpret_event(state: &mut UiState, event: Event) -> Option<UserEvent> {
    let Event::Key(k) = event else {
        return matches!(event, Event::Resize(..)).then_some(UserEvent::Redraw);
    };
    if k.kind != KeyEventKind::Press {
        return None;
    }
    if k.modifiers.contains(KeyModifiers::CONTROL) && k.code == KeyCode::Char('c') {
        return Some(UserEvent::Quit);
    }
    match &mut state.mode {
        Mode::Chooser(idx) => match k.code {
            KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            KeyCode::Up | KeyCode::Char('k') => {
                *idx = idx.saturating_sub(1);
                Some(UserEvent::Redraw)
            }
            KeyCode::Down | KeyCode::Char('j') => {
                *idx = (*idx + 1).min(CHOOSER_ITEMS - 1);
                Some(UserEvent::Redraw)
            }
            KeyCode::Enter => match *idx {
                0 => Some(UserEvent::SayGm),
                1 => {
                    state.mode = Mode::RecipientInput(String::new());
                    Some(UserEvent::Redraw)
                }
                _ => {
                    state.mode = Mode::Normal;
                    Some(UserEvent::Redraw)
                }
            },
            _ => None,
        },
        Mode::RecipientInput(text) => match k.code {
            KeyCode::Esc => {
                state.mode = Mode::Chooser(1);
                Some(UserEvent::Redraw)
            }
            KeyCode::Enter => Some(UserEvent::SayGmTo(text.trim().to_string())),
            KeyCode::Backspace => {
                text.pop();
                Some(UserEvent::Redraw)
            }
            KeyCode::Char(c) if !c.is_whitespace() => {
                text.push(c);
                Some(UserEvent::Redraw)
            }
            _ => None,
        },
        Mode::QuitModal => match k.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => Some(UserEvent::Quit),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            _ => None,
        },
        Mode::Normal => match k.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                state.mode = Mode::QuitModal;
                Some(UserEvent::Redraw)
            }
            KeyCode::Char('g') => {
                state.mode = Mode::Chooser(0);
                Some(UserEvent::Redraw)
            }
            KeyCode::Char('n') => Some(UserEvent::SwitchNetwork),
            KeyCode::Char('o') => Some(UserEvent::OpenHome),
            KeyCode::Char('x') => Some(UserEvent::OpenLastTx),
            KeyCode::Char('r') => Some(UserEvent::RefreshStats),
            _ => None,
        },
    }
}

fn ui(f: &mut Frame, mode: &Mode, snap: &AppSnapshot) {
    f.render_widget(Clear, f.area());
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4), // target + platform
            Constraint::Length(3), // network indicator
            Constraint::Length(5), // stats
            Constraint::Length(3), // notice
            Constraint::Min(3),    // help
        ])
        .split(f.area());

    let platform = if !snap.platform.ready {
        "detecting...".to_string()
    } else {
        match &snap.platform.identity {
            Some(user) => format!("{} as {}", snap.platform.kind, user.label()),
            None => snap.platform.kind.to_string(),
        }
    };
    let header = Paragraph::new(vec![
        Line::from(format!("Network: {}", snap.target)),
        Line::from(format!("Platform: {platform}")),
    ])
    .block(Block::default().borders(Borders::ALL).title("Daily GM"));
    f.render_widget(header, chunks[0]);

    let network = match &snap.network {
        Some(label) if label.is_matched() => {
            Paragraph::new(label.text()).style(Style::default().fg(Color::Green))
        }
        Some(label) => Paragraph::new(label.text()).style(Style::default().fg(Color::Yellow)),
        None => Paragraph::new(""),
    };
    f.render_widget(
        network.block(Block::default().borders(Borders::ALL).title("Wallet network")),
        chunks[1],
    );

    let count = |value: Option<u64>| value.map_or_else(|| "-".to_string(), |v| v.to_string());
    let stats_lines = match snap.account {
        Some(account) => vec![
            Line::from(format!("GMs sent: {}", count(snap.stats.map(|s| s.sent)))),
            Line::from(format!("GMs received: {}", count(snap.stats.map(|s| s.received)))),
            Line::from(format!("{} said GM", account.short())),
        ],
        None => vec![Line::from("Connect a wallet to see your GMs")],
    };
    f.render_widget(
        Paragraph::new(stats_lines).block(Block::default().borders(Borders::ALL).title("Stats")),
        chunks[2],
    );

    let notice = match &snap.notice {
        Some(notice) => {
            let color = match notice.level {
                NoticeLevel::Info => Color::White,
                NoticeLevel::Loading => Color::Cyan,
                NoticeLevel::Success => Color::Green,
                NoticeLevel::Error => Color::Red,
            };
            Paragraph::new(notice.text.clone()).style(Style::default().fg(color))
        }
        None => Paragraph::new(""),
    };
    f.render_widget(
        notice.block(Block::default().borders(Borders::ALL).title("Status")),
        chunks[3],
    );

    let help = Paragraph::new(
        "g: say GM | n: switch network | o: open app | x: last tx | r: refresh | q: quit",
    )
    .wrap(Wrap { trim: true })
    .block(Block::default().borders(Borders::ALL).title("Keys"));
    f.render_widget(help, chunks[4]);

    match mode {
        Mode::Chooser(idx) => {
            let area = centered_rect(50, 40, f.area());
            let labels = [
                if snap.sending_self { "Sending..." } else { "GM" },
                "GM to a fren",
                "Cancel",
            ];
            let items: Vec<ListItem> = labels
                .iter()
                .enumerate()
                .map(|(i, label)| {
                    let style = if i == *idx {
                        Style::default().add_modifier(Modifier::REVERSED)
                    } else {
                        Style::default()
                    };
                    ListItem::new(*label).style(style)
                })
                .collect();
            let list = List::new(items)
                .block(Block::default().borders(Borders::ALL).title("Say GM"));
            f.render_widget(Clear, area);
            f.render_widget(list, area);
        }
        Mode::RecipientInput(text) => {
            let area = centered_rect(60, 30, f.area());
            let block = Block::default()
                .borders(Borders::ALL)
                .title("GM to a fren (Enter to send, Esc to go back)");
            let button = if snap.sending_recipient {
                "Sending..."
            } else {
                "Send GM"
            };
            let p = Paragraph::new(vec![
                Line::from(format!("Recipient: {text}_")),
                Line::from(""),
                Line::from(format!("[ {button} ]")),
            ]);
            f.render_widget(Clear, area);
            f.render_widget(block.clone(), area);
            f.render_widget(p, block.inner(area));
        }
        Mode::QuitModal => {
            let area = centered_rect(40, 20, f.area());
            let block = Block::default().borders(Borders::ALL).title("Confirm Quit");
            let p = Paragraph::new("Quit Daily GM? (Y/N)");
            f.render_widget(Clear, area);
            f.render_widget(block.clone(), area);
            f.render_widget(p, block.inner(area));
        }
        Mode::Normal => {}
    }
}

fn centered_rect(w_percent: u16, h_percent: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - h_percent) / 2),
            Constraint::Percentage(h_percent),
            Constraint::Percentage((100 - h_percent) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - w_percent) / 2),
            Constraint::Percentage(w_percent),
            Constraint::Percentage((100 - w_percent) / 2),
        ])
        .split(popup_layout[1])[1]
}
