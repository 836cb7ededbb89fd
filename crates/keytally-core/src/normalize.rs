//! Key combination normalization
//!
//! Maps a raw key code plus the currently held modifiers to a canonical,
//! human-readable signature such as `Ctrl+Shift+A`.
//!
//! ## Code Space
//!
//! Raw codes use the Windows virtual-key numbering ([`VirtualKey`]). Input
//! backends translate their native codes into it, so the same physical
//! combination always produces the same signature regardless of where it was
//! captured.
//!
//! ## Modifier Order
//!
//! Prefixes always appear in the order Ctrl, Shift, Alt, Win, independent of
//! the order in which the modifiers were pressed:
//!
//! ```text
//! Shift down, Ctrl down, S down  ->  "Ctrl+Shift+S"
//! Ctrl down, Shift down, S down  ->  "Ctrl+Shift+S"
//! ```
//!
//! Left and right variants of a modifier are folded together. A modifier key
//! pressed on its own names itself and never prefixes itself, so holding Ctrl
//! and pressing left Shift yields `Ctrl+Shift`.

use std::fmt;

// ============================================================================
// Modifiers
// ============================================================================

/// Normalized modifier key representation.
///
/// The derived ordering is the canonical prefix order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Modifier {
    /// Control key (left or right)
    Ctrl,
    /// Shift key (left or right)
    Shift,
    /// Alt key (left or right)
    Alt,
    /// Windows/Super/Meta key (left or right)
    Win,
}

impl Modifier {
    /// All modifiers in canonical prefix order
    pub const ALL: [Modifier; 4] = [Modifier::Ctrl, Modifier::Shift, Modifier::Alt, Modifier::Win];

    fn bit(self) -> u8 {
        match self {
            Modifier::Ctrl => 0b0001,
            Modifier::Shift => 0b0010,
            Modifier::Alt => 0b0100,
            Modifier::Win => 0b1000,
        }
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Modifier::Ctrl => write!(f, "Ctrl"),
            Modifier::Shift => write!(f, "Shift"),
            Modifier::Alt => write!(f, "Alt"),
            Modifier::Win => write!(f, "Win"),
        }
    }
}

/// Set of held modifiers, stored as a small bit set so it can be sampled
/// from an atomic without allocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ModifierSet(u8);

impl ModifierSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn from_bits(bits: u8) -> Self {
        Self(bits & 0b1111)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn insert(&mut self, modifier: Modifier) {
        self.0 |= modifier.bit();
    }

    pub fn remove(&mut self, modifier: Modifier) {
        self.0 &= !modifier.bit();
    }

    pub fn with(mut self, modifier: Modifier) -> Self {
        self.insert(modifier);
        self
    }

    pub fn contains(self, modifier: Modifier) -> bool {
        self.0 & modifier.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterate the held modifiers in canonical order (Ctrl, Shift, Alt, Win)
    pub fn iter(self) -> impl Iterator<Item = Modifier> {
        Modifier::ALL.into_iter().filter(move |m| self.contains(*m))
    }
}

impl FromIterator<Modifier> for ModifierSet {
    fn from_iter<I: IntoIterator<Item = Modifier>>(iter: I) -> Self {
        let mut set = ModifierSet::empty();
        for modifier in iter {
            set.insert(modifier);
        }
        set
    }
}

// ============================================================================
// Virtual keys
// ============================================================================

/// A key in the virtual-key code space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VirtualKey(pub u32);

#[allow(missing_docs)]
impl VirtualKey {
    pub const BACK: Self = Self(0x08);
    pub const TAB: Self = Self(0x09);
    pub const RETURN: Self = Self(0x0D);
    pub const SHIFT: Self = Self(0x10);
    pub const CONTROL: Self = Self(0x11);
    pub const MENU: Self = Self(0x12);
    pub const PAUSE: Self = Self(0x13);
    pub const CAPITAL: Self = Self(0x14);
    pub const ESCAPE: Self = Self(0x1B);
    pub const SPACE: Self = Self(0x20);
    pub const PRIOR: Self = Self(0x21);
    pub const NEXT: Self = Self(0x22);
    pub const END: Self = Self(0x23);
    pub const HOME: Self = Self(0x24);
    pub const LEFT: Self = Self(0x25);
    pub const UP: Self = Self(0x26);
    pub const RIGHT: Self = Self(0x27);
    pub const DOWN: Self = Self(0x28);
    pub const SNAPSHOT: Self = Self(0x2C);
    pub const INSERT: Self = Self(0x2D);
    pub const DELETE: Self = Self(0x2E);
    pub const LWIN: Self = Self(0x5B);
    pub const RWIN: Self = Self(0x5C);
    pub const APPS: Self = Self(0x5D);
    pub const NUMPAD0: Self = Self(0x60);
    pub const MULTIPLY: Self = Self(0x6A);
    pub const ADD: Self = Self(0x6B);
    pub const SUBTRACT: Self = Self(0x6D);
    pub const DECIMAL: Self = Self(0x6E);
    pub const DIVIDE: Self = Self(0x6F);
    pub const F1: Self = Self(0x70);
    pub const NUMLOCK: Self = Self(0x90);
    pub const SCROLL: Self = Self(0x91);
    pub const LSHIFT: Self = Self(0xA0);
    pub const RSHIFT: Self = Self(0xA1);
    pub const LCONTROL: Self = Self(0xA2);
    pub const RCONTROL: Self = Self(0xA3);
    pub const LMENU: Self = Self(0xA4);
    pub const RMENU: Self = Self(0xA5);
    pub const VOLUME_MUTE: Self = Self(0xAD);
    pub const VOLUME_DOWN: Self = Self(0xAE);
    pub const VOLUME_UP: Self = Self(0xAF);
    pub const MEDIA_NEXT_TRACK: Self = Self(0xB0);
    pub const MEDIA_PREV_TRACK: Self = Self(0xB1);
    pub const MEDIA_STOP: Self = Self(0xB2);
    pub const MEDIA_PLAY_PAUSE: Self = Self(0xB3);
    pub const OEM_1: Self = Self(0xBA);
    pub const OEM_PLUS: Self = Self(0xBB);
    pub const OEM_COMMA: Self = Self(0xBC);
    pub const OEM_MINUS: Self = Self(0xBD);
    pub const OEM_PERIOD: Self = Self(0xBE);
    pub const OEM_2: Self = Self(0xBF);
    pub const OEM_3: Self = Self(0xC0);
    pub const OEM_4: Self = Self(0xDB);
    pub const OEM_5: Self = Self(0xDC);
    pub const OEM_6: Self = Self(0xDD);
    pub const OEM_7: Self = Self(0xDE);
    pub const OEM_102: Self = Self(0xE2);

    /// Virtual key for an ASCII letter or digit (`'a'`, `'Z'`, `'7'`)
    pub fn from_char(c: char) -> Option<Self> {
        let upper = c.to_ascii_uppercase();
        if upper.is_ascii_uppercase() || upper.is_ascii_digit() {
            Some(Self(upper as u32))
        } else {
            None
        }
    }

    /// Function key `F<n>` for n in 1..=24
    pub fn function(n: u32) -> Option<Self> {
        (1..=24).contains(&n).then(|| Self(Self::F1.0 + n - 1))
    }

    /// Which modifier this key is, if it is one
    pub fn modifier(self) -> Option<Modifier> {
        match self {
            Self::CONTROL | Self::LCONTROL | Self::RCONTROL => Some(Modifier::Ctrl),
            Self::SHIFT | Self::LSHIFT | Self::RSHIFT => Some(Modifier::Shift),
            Self::MENU | Self::LMENU | Self::RMENU => Some(Modifier::Alt),
            Self::LWIN | Self::RWIN => Some(Modifier::Win),
            _ => None,
        }
    }

    pub fn is_modifier(self) -> bool {
        self.modifier().is_some()
    }
}

/// Resolve the display name of a single key (no modifier prefixes).
///
/// Unknown codes fall back to `VK_<code>` with the code in upper-case hex.
pub fn key_name(key: VirtualKey) -> String {
    if let Some(modifier) = key.modifier() {
        return modifier.to_string();
    }

    let code = key.0;
    let name = match code {
        0x30..=0x39 | 0x41..=0x5A => return char::from(code as u8).to_string(),
        0x60..=0x69 => return format!("Num{}", code - 0x60),
        0x70..=0x87 => return format!("F{}", code - 0x6F),
        0x08 => "Backspace",
        0x09 => "Tab",
        0x0D => "Enter",
        0x13 => "Pause",
        0x14 => "CapsLock",
        0x1B => "Esc",
        0x20 => "Space",
        0x21 => "PageUp",
        0x22 => "PageDown",
        0x23 => "End",
        0x24 => "Home",
        0x25 => "Left",
        0x26 => "Up",
        0x27 => "Right",
        0x28 => "Down",
        0x2C => "PrintScreen",
        0x2D => "Insert",
        0x2E => "Delete",
        0x5D => "Menu",
        0x6A => "Num*",
        0x6B => "Num+",
        0x6D => "Num-",
        0x6E => "Num.",
        0x6F => "Num/",
        0x90 => "NumLock",
        0x91 => "ScrollLock",
        0xAD => "VolumeMute",
        0xAE => "VolumeDown",
        0xAF => "VolumeUp",
        0xB0 => "MediaNext",
        0xB1 => "MediaPrev",
        0xB2 => "MediaStop",
        0xB3 => "MediaPlayPause",
        0xBA => ";",
        0xBB => "=",
        0xBC => ",",
        0xBD => "-",
        0xBE => ".",
        0xBF => "/",
        0xC0 => "`",
        0xDB => "[",
        0xDC => "\\",
        0xDD => "]",
        0xDE => "'",
        0xE2 => "<>",
        _ => return format!("VK_{code:02X}"),
    };
    name.to_string()
}

/// Build the canonical signature for `key` pressed while `modifiers` are held.
pub fn normalize(key: VirtualKey, modifiers: ModifierSet) -> String {
    let own = key.modifier();
    let mut signature = String::new();

    for modifier in modifiers.iter() {
        if Some(modifier) == own {
            continue;
        }
        signature.push_str(&modifier.to_string());
        signature.push('+');
    }

    signature.push_str(&key_name(key));
    signature
}
