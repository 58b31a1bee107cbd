//! Joypad port (P1 register at 0xFF00)

use crate::button::{Button, ButtonEvent};
use serde::{Deserialize, Serialize};

/// Address of the P1/JOYP register
pub const P1_ADDRESS: u16 = 0xFF00;

/// Emulated joypad register
///
/// Games select a line by writing bits 4-5 and read back the low nibble,
/// where a cleared bit means "pressed".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Joypad {
    /// Pressed buttons, one bit per button (see `Button::bit`)
    pressed: u8,
    /// Latched select bits
    p1: u8,
}

impl Joypad {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a button transition
    ///
    /// Returns true when the joypad interrupt should be requested.
    pub fn handle(&mut self, event: ButtonEvent) -> bool {
        match event {
            ButtonEvent::Press(button) => {
                self.pressed |= button.bit();
                true
            }
            ButtonEvent::Release(button) => {
                self.pressed &= !button.bit();
                false
            }
        }
    }

    /// Check if a button is currently held
    pub fn is_pressed(&self, button: Button) -> bool {
        self.pressed & button.bit() != 0
    }

    /// Write P1; only the select bits are latched
    pub fn write(&mut self, value: u8) {
        self.p1 = value & 0b0011_0000;
    }

    /// Read P1
    pub fn read(&self) -> u8 {
        let mut result = self.p1 | 0b1100_1111;
        for button in Button::ALL {
            if self.is_pressed(button) && button.line() & self.p1 == 0 {
                result &= !button.mask();
            }
        }
        result
    }
}
