//! Interactive control commands
//!
//! One line of operator input changes either the PRB selection or the MCS.
//! The first byte selects the command: `%` and `'` move the center, `&` and
//! `(` resize the band. Anything else is read as an MCS index the way C
//! `atoi` reads it, so text without leading digits selects MCS 0.

use tracing::warn;

/// Moves the center one group up
pub const KEY_CENTER_UP: u8 = 0x25;
/// Widens the selection by one group
pub const KEY_WIDTH_UP: u8 = 0x26;
/// Moves the center one group down
pub const KEY_CENTER_DOWN: u8 = 0x27;
/// Narrows the selection by one group
pub const KEY_WIDTH_DOWN: u8 = 0x28;

/// A parsed control command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    /// Move the center offset by the given number of groups
    ShiftCenter(i32),
    /// Change the width by the given number of groups
    ResizeWidth(i32),
    /// Replace the MCS index
    SetMcs(i32),
}

impl ControlCommand {
    /// Parse one input line (without its terminator). Blank lines yield `None`.
    pub fn parse(line: &[u8]) -> Option<Self> {
        let first = *line.first()?;
        match first {
            KEY_CENTER_UP => return Some(Self::ShiftCenter(1)),
            KEY_CENTER_DOWN => return Some(Self::ShiftCenter(-1)),
            KEY_WIDTH_UP => return Some(Self::ResizeWidth(1)),
            KEY_WIDTH_DOWN => return Some(Self::ResizeWidth(-1)),
            _ => {}
        }

        if line.iter().all(|b| b.is_ascii_whitespace()) {
            return None;
        }

        let (value, digits) = atoi(line);
        if digits == 0 {
            warn!(
                "Control input {:?} is not a number, using MCS 0",
                String::from_utf8_lossy(line)
            );
        }
        Some(Self::SetMcs(value))
    }
}

/// C `atoi`: skip leading whitespace, optional sign, then leading decimal
/// digits. Returns the value and the number of digits consumed. Values
/// outside the `i32` range saturate.
pub fn atoi(input: &[u8]) -> (i32, usize) {
    let mut bytes = input.iter().copied().skip_while(|b| b.is_ascii_whitespace()).peekable();

    let negative = match bytes.peek() {
        Some(b'-') => {
            bytes.next();
            true
        }
        Some(b'+') => {
            bytes.next();
            false
        }
        _ => false,
    };

    let mut value: i64 = 0;
    let mut digits = 0;
    for b in bytes.take_while(|b| b.is_ascii_digit()) {
        value = (value * 10 + (b - b'0') as i64).min(i32::MAX as i64 + 1);
        digits += 1;
    }
    if negative {
        value = -value;
    }

    (value.clamp(i32::MIN as i64, i32::MAX as i64) as i32, digits)
}
