//! Keypad input: raw symbol sources, debounced key reading, and code entry.
//!
//! Raw symbols come from an [`InputSource`] (a GPIO matrix scanner on the
//! real phone, a terminal keyboard in development, a script in tests). The
//! [`KeypadReader`] turns them into clean single key-presses, and
//! [`CodeEntry`] layers the `*…#` secret-code protocol on top to produce
//! [`Token`]s for the session loop.

use std::io;
use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::debug;

/// Poll interval shared by every input wait. Hook changes are observed at
/// least this often.
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A device that produces raw keypad symbols and knows the hook state.
///
/// `poll_symbol` must not block: it reports at most one symbol per call and
/// `None` when nothing is pressed. Symbols are the keypad alphabet
/// (`0`–`9`, `*`, `#`) plus `h` from keyboard-style sources.
pub trait InputSource {
    /// Non-blocking read of one raw symbol.
    fn poll_symbol(&mut self) -> io::Result<Option<char>>;

    /// Whether the handset is currently off the cradle.
    fn is_hook_lifted(&self) -> bool;
}

/// The normalized unit of player input fed into resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A single accepted key-press (digit or lone `#`).
    Key(char),
    /// A `*…#` composite code.
    Code(String),
    /// Synthesized when a timed turn's deadline passes with no input.
    Timeout,
    /// The handset went back on the cradle, or the hang-up key arrived.
    HangUp,
}

impl Token {
    /// The numbered-choice digit this token addresses, if any.
    pub fn as_digit(&self) -> Option<u8> {
        match self {
            Token::Key(key) => key.to_digit(10).map(|d| d as u8),
            Token::Code(code) => code.parse().ok(),
            _ => None,
        }
    }

    /// Whether this token ends the session outright.
    pub fn is_hang_up(&self) -> bool {
        matches!(self, Token::HangUp | Token::Key('h') | Token::Key('H'))
    }
}

/// Outcome of one debounced key wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyWait {
    /// An accepted key-press.
    Key(char),
    /// The hook dropped while waiting.
    HookDown,
    /// The deadline passed with no accepted key.
    TimedOut,
}

/// Debounced reader over an [`InputSource`].
///
/// A repeat of the last accepted symbol arriving inside `min_interval` is
/// switch bounce and is discarded; everything else is accepted.
pub struct KeypadReader<S> {
    source: S,
    min_interval: Duration,
    last_accepted: Option<(char, Instant)>,
}

impl<S: InputSource> KeypadReader<S> {
    /// Wrap a source with the given bounce-suppression interval.
    pub fn new(source: S, min_interval: Duration) -> Self {
        Self {
            source,
            min_interval,
            last_accepted: None,
        }
    }

    /// Whether the handset is currently off the cradle.
    pub fn is_hook_lifted(&self) -> bool {
        self.source.is_hook_lifted()
    }

    /// Wait for the next accepted key, a hook drop, or the deadline,
    /// whichever comes first. `on_accept` fires once per accepted key so
    /// the presenter can play feedback.
    ///
    /// Transient read errors from the source count as "no symbol this
    /// tick" and are retried silently.
    pub async fn wait_for_key(
        &mut self,
        deadline: Option<Instant>,
        on_accept: &mut impl FnMut(char),
    ) -> KeyWait {
        loop {
            if !self.source.is_hook_lifted() {
                self.last_accepted = None;
                return KeyWait::HookDown;
            }
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return KeyWait::TimedOut;
                }
            }
            match self.source.poll_symbol() {
                Ok(Some(symbol)) => {
                    if self.accept(symbol) {
                        on_accept(symbol);
                        return KeyWait::Key(symbol);
                    }
                }
                Ok(None) => {}
                Err(err) => debug!("transient input read error: {err}"),
            }
            time::sleep(POLL_INTERVAL).await;
        }
    }

    fn accept(&mut self, symbol: char) -> bool {
        let now = Instant::now();
        if let Some((last, at)) = self.last_accepted {
            if last == symbol && now.duration_since(at) < self.min_interval {
                return false;
            }
        }
        self.last_accepted = Some((symbol, now));
        true
    }
}

/// Outcome of one token wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenWait {
    /// A complete token.
    Token(Token),
    /// The hook dropped; any partial code is discarded.
    HookDown,
    /// The deadline passed; any partial code is discarded.
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum EntryState {
    #[default]
    Normal,
    Entering,
}

/// Code-entry state machine layered over a [`KeypadReader`].
///
/// `*` opens a code, digits accumulate, `#` closes it and emits the buffer
/// as one [`Token::Code`]. A second `*` cancels the buffer and keeps
/// waiting. Plain keys outside a code pass through as [`Token::Key`].
pub struct CodeEntry<S> {
    reader: KeypadReader<S>,
    state: EntryState,
    buffer: String,
}

impl<S: InputSource> CodeEntry<S> {
    /// Wrap a debounced reader.
    pub fn new(reader: KeypadReader<S>) -> Self {
        Self {
            reader,
            state: EntryState::Normal,
            buffer: String::new(),
        }
    }

    /// Whether the handset is currently off the cradle.
    pub fn is_hook_lifted(&self) -> bool {
        self.reader.is_hook_lifted()
    }

    /// Wait for the next complete token, a hook drop, or the deadline.
    pub async fn next_token(
        &mut self,
        deadline: Option<Instant>,
        on_accept: &mut impl FnMut(char),
    ) -> TokenWait {
        loop {
            let key = match self.reader.wait_for_key(deadline, &mut *on_accept).await {
                KeyWait::Key(key) => key,
                KeyWait::HookDown => {
                    self.reset();
                    return TokenWait::HookDown;
                }
                KeyWait::TimedOut => {
                    self.reset();
                    return TokenWait::TimedOut;
                }
            };
            match (self.state, key) {
                (EntryState::Normal, '*') => {
                    self.state = EntryState::Entering;
                    self.buffer.clear();
                }
                (EntryState::Normal, key) => return TokenWait::Token(Token::Key(key)),
                (EntryState::Entering, '#') => {
                    self.state = EntryState::Normal;
                    let code = std::mem::take(&mut self.buffer);
                    return TokenWait::Token(Token::Code(code));
                }
                (EntryState::Entering, '*') => {
                    // Cancelled: keep waiting, this is not a turn result.
                    self.reset();
                }
                (EntryState::Entering, key) => self.buffer.push(key),
            }
        }
    }

    fn reset(&mut self) {
        self.state = EntryState::Normal;
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedInput;

    const MIN_INTERVAL: Duration = Duration::from_millis(250);

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    fn reader(script: ScriptedInput) -> KeypadReader<ScriptedInput> {
        KeypadReader::new(script, MIN_INTERVAL)
    }

    async fn drain_keys(reader: &mut KeypadReader<ScriptedInput>, until: Duration) -> Vec<char> {
        let deadline = Instant::now() + until;
        let mut keys = Vec::new();
        loop {
            match reader.wait_for_key(Some(deadline), &mut |_| {}).await {
                KeyWait::Key(key) => keys.push(key),
                KeyWait::HookDown | KeyWait::TimedOut => return keys,
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_suppresses_identical_repeat() {
        let script = ScriptedInput::new().press(ms(0), '5').press(ms(50), '5');
        let mut reader = reader(script);
        let keys = drain_keys(&mut reader, ms(500)).await;
        assert_eq!(keys, vec!['5']);
    }

    #[tokio::test(start_paused = true)]
    async fn test_different_symbol_inside_interval_accepted() {
        let script = ScriptedInput::new().press(ms(0), '5').press(ms(50), '6');
        let mut reader = reader(script);
        let keys = drain_keys(&mut reader, ms(500)).await;
        assert_eq!(keys, vec!['5', '6']);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeat_after_interval_accepted() {
        let script = ScriptedInput::new().press(ms(0), '5').press(ms(300), '5');
        let mut reader = reader(script);
        let keys = drain_keys(&mut reader, ms(500)).await;
        assert_eq!(keys, vec!['5', '5']);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hook_drop_interrupts_wait() {
        let script = ScriptedInput::new().hook(ms(200), false).press(ms(400), '5');
        let mut reader = reader(script);
        let wait = reader.wait_for_key(None, &mut |_| {}).await;
        assert_eq!(wait, KeyWait::HookDown);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_elapses_to_timed_out() {
        let mut reader = reader(ScriptedInput::new());
        let deadline = Instant::now() + ms(300);
        let wait = reader.wait_for_key(Some(deadline), &mut |_| {}).await;
        assert_eq!(wait, KeyWait::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn test_accept_callback_fires_per_accepted_key() {
        let script = ScriptedInput::new().press(ms(0), '5').press(ms(50), '5');
        let mut reader = reader(script);
        let mut accepted = Vec::new();
        let deadline = Instant::now() + ms(500);
        loop {
            match reader
                .wait_for_key(Some(deadline), &mut |key| accepted.push(key))
                .await
            {
                KeyWait::Key(_) => {}
                _ => break,
            }
        }
        assert_eq!(accepted, vec!['5']);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_errors_are_transient() {
        struct Flaky {
            polls: u32,
        }
        impl InputSource for Flaky {
            fn poll_symbol(&mut self) -> io::Result<Option<char>> {
                self.polls += 1;
                match self.polls {
                    1 => Err(io::Error::new(io::ErrorKind::Other, "glitch")),
                    2 => Ok(Some('3')),
                    _ => Ok(None),
                }
            }
            fn is_hook_lifted(&self) -> bool {
                true
            }
        }

        let mut reader = KeypadReader::new(Flaky { polls: 0 }, MIN_INTERVAL);
        let wait = reader.wait_for_key(None, &mut |_| {}).await;
        assert_eq!(wait, KeyWait::Key('3'));
    }

    #[tokio::test(start_paused = true)]
    async fn test_code_entry_collects_star_hash() {
        let script = ScriptedInput::new().press_each(ms(0), ms(300), "*451#");
        let mut entry = CodeEntry::new(reader(script));
        let wait = entry.next_token(None, &mut |_| {}).await;
        assert_eq!(wait, TokenWait::Token(Token::Code("451".to_string())));
    }

    #[tokio::test(start_paused = true)]
    async fn test_code_entry_cancel_keeps_waiting() {
        // "* 4 *" discards the buffer; the following key arrives plain.
        let script = ScriptedInput::new().press_each(ms(0), ms(300), "*4*5");
        let mut entry = CodeEntry::new(reader(script));
        let wait = entry.next_token(None, &mut |_| {}).await;
        assert_eq!(wait, TokenWait::Token(Token::Key('5')));
    }

    #[tokio::test(start_paused = true)]
    async fn test_code_entry_forwards_plain_keys() {
        let script = ScriptedInput::new().press(ms(0), '7');
        let mut entry = CodeEntry::new(reader(script));
        let wait = entry.next_token(None, &mut |_| {}).await;
        assert_eq!(wait, TokenWait::Token(Token::Key('7')));
    }

    #[tokio::test(start_paused = true)]
    async fn test_lone_hash_is_a_plain_key() {
        let script = ScriptedInput::new().press(ms(0), '#');
        let mut entry = CodeEntry::new(reader(script));
        let wait = entry.next_token(None, &mut |_| {}).await;
        assert_eq!(wait, TokenWait::Token(Token::Key('#')));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hook_drop_discards_partial_code() {
        let script = ScriptedInput::new()
            .press_each(ms(0), ms(300), "*45")
            .hook(ms(1000), false)
            .hook(ms(1500), true)
            .press(ms(2000), '9');
        let mut entry = CodeEntry::new(reader(script));

        assert_eq!(entry.next_token(None, &mut |_| {}).await, TokenWait::HookDown);
        // After the next lift the buffered "45" is gone; the 9 is plain.
        time::sleep(ms(1600)).await;
        assert_eq!(
            entry.next_token(None, &mut |_| {}).await,
            TokenWait::Token(Token::Key('9'))
        );
    }

    #[test]
    fn test_token_digit_and_hang_up() {
        assert_eq!(Token::Key('4').as_digit(), Some(4));
        assert_eq!(Token::Code("12".to_string()).as_digit(), Some(12));
        assert_eq!(Token::Timeout.as_digit(), None);
        assert!(Token::HangUp.is_hang_up());
        assert!(Token::Key('h').is_hang_up());
        assert!(!Token::Key('4').is_hang_up());
    }
}
