use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// DOM-style key code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyCode(pub u32);

impl KeyCode {
    pub const ENTER: KeyCode = KeyCode(13);
    pub const ESCAPE: KeyCode = KeyCode(27);
    pub const SPACE: KeyCode = KeyCode(32);
    pub const LEFT: KeyCode = KeyCode(37);
    pub const UP: KeyCode = KeyCode(38);
    pub const RIGHT: KeyCode = KeyCode(39);
    pub const DOWN: KeyCode = KeyCode(40);

    /// Letter keys map to their upper-case ASCII code, digits to theirs
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'a'..='z' => Some(KeyCode(c.to_ascii_uppercase() as u32)),
            'A'..='Z' | '0'..='9' => Some(KeyCode(c as u32)),
            ' ' => Some(Self::SPACE),
            _ => None,
        }
    }
}

impl Default for KeyCode {
    fn default() -> Self {
        Self::SPACE
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::ENTER => f.write_str("enter"),
            Self::ESCAPE => f.write_str("escape"),
            Self::SPACE => f.write_str("space"),
            Self::LEFT => f.write_str("left"),
            Self::UP => f.write_str("up"),
            Self::RIGHT => f.write_str("right"),
            Self::DOWN => f.write_str("down"),
            KeyCode(code @ (48..=57 | 65..=90)) => {
                write!(f, "{}", (code as u8 as char).to_ascii_lowercase())
            }
            KeyCode(code) => write!(f, "{code}"),
        }
    }
}

impl FromStr for KeyCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.to_ascii_lowercase().as_str() {
            "enter" | "return" => return Ok(Self::ENTER),
            "escape" | "esc" => return Ok(Self::ESCAPE),
            "space" | "" => return Ok(Self::SPACE),
            "left" | "arrowleft" => return Ok(Self::LEFT),
            "up" | "arrowup" => return Ok(Self::UP),
            "right" | "arrowright" => return Ok(Self::RIGHT),
            "down" | "arrowdown" => return Ok(Self::DOWN),
            _ => {}
        }
        let mut chars = s.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            if let Some(code) = Self::from_char(c) {
                return Ok(code);
            }
        }
        s.parse::<u32>()
            .map(KeyCode)
            .map_err(|_| format!("unknown key: {s:?}"))
    }
}

/// A key press delivered by the input source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub code: KeyCode,
}
