use serde::{Deserialize, Serialize};

/// A joypad button and its bit in [`Buttons`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    Right = 0,
    Left = 1,
    Up = 2,
    Down = 3,
    A = 4,
    B = 5,
    Start = 6,
    Select = 7,
}

impl Button {
    pub fn mask(self) -> u8 {
        1 << (self as u8)
    }
}

/// Bitmask of currently held buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Buttons(u8);

impl Buttons {
    pub fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn is_pressed(self, button: Button) -> bool {
        self.0 & button.mask() != 0
    }

    pub fn set(&mut self, button: Button, pressed: bool) {
        if pressed {
            self.0 |= button.mask();
        } else {
            self.0 &= !button.mask();
        }
    }

    pub fn with(mut self, button: Button) -> Self {
        self.set(button, true);
        self
    }
}
