//! Console stand-ins for the phone hardware.
//!
//! Development mode: the terminal keyboard plays the keypad and the hook
//! switch, and scene text is printed instead of spoken. Keys `0`–`9`, `*`,
//! and `#` map straight through; Enter lifts or cradles the handset; `h`
//! hangs up; `q`, Esc, or Ctrl-C quit.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};

use payphone_core::{InputSource, Presenter};

use crate::ring::Bell;

/// Print a line while the terminal is in raw mode.
fn say(text: &str) {
    let mut stdout = io::stdout();
    for line in text.split('\n') {
        let _ = write!(stdout, "{line}\r\n");
    }
    let _ = stdout.flush();
}

/// Terminal keyboard as the phone's input source.
pub struct ConsoleInput {
    hook: Arc<AtomicBool>,
}

impl ConsoleInput {
    /// Put the terminal in raw mode. The handset starts on the cradle;
    /// press Enter to lift it.
    pub fn new() -> io::Result<Self> {
        enable_raw_mode()?;
        say("[console phone: Enter lifts/cradles the handset, 0-9 * # dial, h hangs up, q quits]");
        Ok(Self {
            hook: Arc::new(AtomicBool::new(false)),
        })
    }

    /// A hook probe usable from other tasks (the ring scheduler).
    pub fn hook_probe(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.hook)
    }

    fn set_hook(&self, lifted: bool) {
        self.hook.store(lifted, Ordering::SeqCst);
        say(if lifted {
            "[handset lifted]"
        } else {
            "[handset on the cradle]"
        });
    }
}

impl Drop for ConsoleInput {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

impl InputSource for ConsoleInput {
    fn poll_symbol(&mut self) -> io::Result<Option<char>> {
        if !event::poll(Duration::ZERO)? {
            return Ok(None);
        }
        let Event::Key(key) = event::read()? else {
            return Ok(None);
        };
        if key.kind != KeyEventKind::Press {
            return Ok(None);
        }
        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => quit(),
            KeyCode::Char('q') | KeyCode::Esc => quit(),
            KeyCode::Enter => {
                self.set_hook(!self.hook.load(Ordering::SeqCst));
                Ok(None)
            }
            // A keyboard hang-up both sends the key and drops the hook, the
            // way cradling the real handset would.
            KeyCode::Char('h') | KeyCode::Char('H') => {
                self.set_hook(false);
                Ok(Some('h'))
            }
            KeyCode::Char(c) if c.is_ascii_digit() || c == '*' || c == '#' => Ok(Some(c)),
            _ => Ok(None),
        }
    }

    fn is_hook_lifted(&self) -> bool {
        self.hook.load(Ordering::SeqCst)
    }
}

fn quit() -> ! {
    let _ = disable_raw_mode();
    std::process::exit(0);
}

/// Printing presenter. Audio is logged rather than played, and reports as
/// finished immediately.
pub struct ConsolePresenter;

impl Presenter for ConsolePresenter {
    fn display(&self, text: &str, options: &[(u8, &str)]) {
        say("");
        say(text);
        for (digit, label) in options {
            say(&format!("  {digit}. {label}"));
        }
    }

    fn play_scene_audio(&self, scene_id: &str) {
        tracing::debug!(scene = %scene_id, "would play scene audio");
    }

    fn stop_audio(&self) {}

    fn is_audio_playing(&self) -> bool {
        false
    }

    fn notify_item_obtained(&self, item: &str) {
        say(&format!("[obtained: {item}]"));
    }

    fn notify_key_accepted(&self, _key: char) {
        // Terminal bell as the keypad feedback tone.
        let mut stdout = io::stdout();
        let _ = write!(stdout, "\x07");
        let _ = stdout.flush();
    }
}

/// Console bell for the ambient ringer.
pub struct ConsoleBell;

impl Bell for ConsoleBell {
    fn start_ring(&self) {
        say("[the payphone rings]");
    }

    fn stop_ring(&self) {
        say("[the ringing stops]");
    }
}
