//! Buttons, button events and per-frame input sets

use serde::{Deserialize, Serialize};

/// A button on the handheld
///
/// Each button sits on one of the two P1 select lines and pulls one of the
/// low four bits of the register when its line is selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Button {
    Right,
    Left,
    Up,
    Down,
    A,
    B,
    Select,
    Start,
}

impl Button {
    /// All buttons, in P1 bit order (directions first)
    pub const ALL: [Button; 8] = [
        Button::Right,
        Button::Left,
        Button::Up,
        Button::Down,
        Button::A,
        Button::B,
        Button::Select,
        Button::Start,
    ];

    /// P1 select line this button is wired to (bit 4 = directions, bit 5 = actions)
    pub fn line(self) -> u8 {
        match self {
            Button::Right | Button::Left | Button::Up | Button::Down => 0x10,
            Button::A | Button::B | Button::Select | Button::Start => 0x20,
        }
    }

    /// Bit this button clears in P1 when pressed and selected
    pub fn mask(self) -> u8 {
        match self {
            Button::Right | Button::A => 0x01,
            Button::Left | Button::B => 0x02,
            Button::Up | Button::Select => 0x04,
            Button::Down | Button::Start => 0x08,
        }
    }

    /// Unique bit for this button, used for compact pressed-set storage
    pub(crate) fn bit(self) -> u8 {
        let shift = if self.line() == 0x10 { 0 } else { 4 };
        self.mask() << shift
    }
}

/// A single button transition delivered to a machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ButtonEvent {
    Press(Button),
    Release(Button),
}

impl ButtonEvent {
    /// The button this event refers to
    pub fn button(self) -> Button {
        match self {
            ButtonEvent::Press(b) | ButtonEvent::Release(b) => b,
        }
    }
}

/// Button transitions issued by one player on one frame
///
/// Presses are delivered before releases.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Input {
    pub pressed: Vec<Button>,
    pub released: Vec<Button>,
}

impl Input {
    /// Input with no transitions
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create an input from pressed and released buttons
    pub fn new(pressed: Vec<Button>, released: Vec<Button>) -> Self {
        Self { pressed, released }
    }

    /// Input that only presses the given buttons
    pub fn press(buttons: impl IntoIterator<Item = Button>) -> Self {
        Self {
            pressed: buttons.into_iter().collect(),
            released: Vec::new(),
        }
    }

    /// Input that only releases the given buttons
    pub fn release(buttons: impl IntoIterator<Item = Button>) -> Self {
        Self {
            pressed: Vec::new(),
            released: buttons.into_iter().collect(),
        }
    }

    /// Check if this input carries no transitions
    pub fn is_empty(&self) -> bool {
        self.pressed.is_empty() && self.released.is_empty()
    }

    /// Events in delivery order: presses, then releases
    pub fn events(&self) -> impl Iterator<Item = ButtonEvent> + '_ {
        self.pressed
            .iter()
            .map(|b| ButtonEvent::Press(*b))
            .chain(self.released.iter().map(|b| ButtonEvent::Release(*b)))
    }
}
