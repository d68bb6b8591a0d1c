//! Input routing
//!
//! Splits the raw stdin byte stream into bytes for the focused pane and
//! prefix-key commands (tmux style: Ctrl+B, then a command key).

/// What to do with a piece of stdin
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputAction {
    /// Bytes for the focused pane
    Forward(Vec<u8>),
    FocusNext,
    FocusPrev,
    /// Zero-based pane index
    Focus(usize),
}

/// Prefix key (Ctrl + letter)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrefixKey {
    pub char: char,
}

impl PrefixKey {
    /// Parse `"b"`, `"C-b"` or `"Ctrl+b"` style names.
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        let key = name
            .strip_prefix("C-")
            .or_else(|| name.strip_prefix("Ctrl+"))
            .or_else(|| name.strip_prefix("ctrl+"))
            .unwrap_or(name);

        let mut chars = key.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii_alphabetic() => Some(Self {
                char: c.to_ascii_lowercase(),
            }),
            _ => None,
        }
    }

    /// Control byte the terminal sends for this key
    pub fn byte(&self) -> u8 {
        (self.char as u8) & 0x1F
    }
}

impl Default for PrefixKey {
    fn default() -> Self {
        Self { char: 'b' }
    }
}

/// Stateful prefix-key interpreter
#[derive(Debug, Clone)]
pub struct InputRouter {
    prefix: u8,
    /// Prefix seen, waiting for the command key
    armed: bool,
}

impl InputRouter {
    pub fn new(prefix: PrefixKey) -> Self {
        Self {
            prefix: prefix.byte(),
            armed: false,
        }
    }

    /// Route one read's worth of stdin.
    pub fn route(&mut self, bytes: &[u8]) -> Vec<InputAction> {
        let mut actions = Vec::new();
        let mut forward = Vec::new();

        for &b in bytes {
            if self.armed {
                self.armed = false;
                let action = match b {
                    b'o' => Some(InputAction::FocusNext),
                    b';' => Some(InputAction::FocusPrev),
                    b'1'..=b'9' => Some(InputAction::Focus(usize::from(b - b'1'))),
                    _ if b == self.prefix => {
                        forward.push(b);
                        None
                    }
                    _ => None,
                };
                if let Some(action) = action {
                    if !forward.is_empty() {
                        actions.push(InputAction::Forward(std::mem::take(&mut forward)));
                    }
                    actions.push(action);
                }
            } else if b == self.prefix {
                self.armed = true;
            } else {
                forward.push(b);
            }
        }

        if !forward.is_empty() {
            actions.push(InputAction::Forward(forward));
        }
        actions
    }
}
