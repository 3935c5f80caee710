//! 组合键定义
//!
//! 修饰键集合 + 平台无关的按键标识，支持从 "Ctrl+Shift+H" 形式的字符串解析

use crate::error::HotkeyError;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

bitflags! {
    /// 修饰键集合
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct Modifiers: u8 {
        const SHIFT = 1 << 0;
        const CONTROL = 1 << 1;
        const ALT = 1 << 2;
        const SUPER = 1 << 3;
    }
}

impl Modifiers {
    /// 规范化输出顺序
    const DISPLAY_ORDER: [(Modifiers, &'static str); 4] = [
        (Modifiers::CONTROL, "Control"),
        (Modifiers::ALT, "Alt"),
        (Modifiers::SHIFT, "Shift"),
        (Modifiers::SUPER, "Super"),
    ];

    /// 解析单个修饰键名称，大小写不敏感
    pub fn parse_alias(name: &str) -> Option<Modifiers> {
        match name.to_ascii_lowercase().as_str() {
            "shift" => Some(Modifiers::SHIFT),
            "ctrl" | "control" => Some(Modifiers::CONTROL),
            "alt" | "option" => Some(Modifiers::ALT),
            "super" | "cmd" | "command" | "meta" | "win" => Some(Modifiers::SUPER),
            "cmdorctrl" | "commandorcontrol" => Some(Self::primary()),
            _ => None,
        }
    }

    /// 平台主修饰键：macOS 为 Command，其他平台为 Control
    pub fn primary() -> Modifiers {
        if cfg!(target_os = "macos") {
            Modifiers::SUPER
        } else {
            Modifiers::CONTROL
        }
    }
}

macro_rules! key_codes {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// 平台无关的按键标识
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum KeyCode {
            $($variant),+
        }

        impl KeyCode {
            /// 所有按键
            pub const ALL: &'static [KeyCode] = &[$(KeyCode::$variant),+];

            /// 规范名称
            pub fn name(&self) -> &'static str {
                match self {
                    $(KeyCode::$variant => $name),+
                }
            }
        }
    };
}

key_codes! {
    A => "A", B => "B", C => "C", D => "D", E => "E", F => "F", G => "G",
    H => "H", I => "I", J => "J", K => "K", L => "L", M => "M", N => "N",
    O => "O", P => "P", Q => "Q", R => "R", S => "S", T => "T", U => "U",
    V => "V", W => "W", X => "X", Y => "Y", Z => "Z",
    Digit0 => "0", Digit1 => "1", Digit2 => "2", Digit3 => "3", Digit4 => "4",
    Digit5 => "5", Digit6 => "6", Digit7 => "7", Digit8 => "8", Digit9 => "9",
    F1 => "F1", F2 => "F2", F3 => "F3", F4 => "F4", F5 => "F5", F6 => "F6",
    F7 => "F7", F8 => "F8", F9 => "F9", F10 => "F10", F11 => "F11", F12 => "F12",
    F13 => "F13", F14 => "F14", F15 => "F15", F16 => "F16", F17 => "F17", F18 => "F18",
    F19 => "F19", F20 => "F20", F21 => "F21", F22 => "F22", F23 => "F23", F24 => "F24",
    Space => "Space",
    Enter => "Enter",
    Tab => "Tab",
    Escape => "Escape",
    Backspace => "Backspace",
    Delete => "Delete",
    Insert => "Insert",
    Home => "Home",
    End => "End",
    PageUp => "PageUp",
    PageDown => "PageDown",
    ArrowUp => "ArrowUp",
    ArrowDown => "ArrowDown",
    ArrowLeft => "ArrowLeft",
    ArrowRight => "ArrowRight",
    Minus => "Minus",
    Equal => "Equal",
    BracketLeft => "BracketLeft",
    BracketRight => "BracketRight",
    Backslash => "Backslash",
    Semicolon => "Semicolon",
    Quote => "Quote",
    Backquote => "Backquote",
    Comma => "Comma",
    Period => "Period",
    Slash => "Slash",
    PrintScreen => "PrintScreen",
    ScrollLock => "ScrollLock",
    Pause => "Pause",
    Numpad0 => "Numpad0", Numpad1 => "Numpad1", Numpad2 => "Numpad2", Numpad3 => "Numpad3",
    Numpad4 => "Numpad4", Numpad5 => "Numpad5", Numpad6 => "Numpad6", Numpad7 => "Numpad7",
    Numpad8 => "Numpad8", Numpad9 => "Numpad9",
    NumpadAdd => "NumpadAdd",
    NumpadSubtract => "NumpadSubtract",
    NumpadMultiply => "NumpadMultiply",
    NumpadDivide => "NumpadDivide",
    NumpadDecimal => "NumpadDecimal",
    NumpadEnter => "NumpadEnter",
}

impl KeyCode {
    fn from_alias(lower: &str) -> Option<KeyCode> {
        let key = match lower {
            "esc" => KeyCode::Escape,
            "return" => KeyCode::Enter,
            "del" => KeyCode::Delete,
            "ins" => KeyCode::Insert,
            "up" => KeyCode::ArrowUp,
            "down" => KeyCode::ArrowDown,
            "left" => KeyCode::ArrowLeft,
            "right" => KeyCode::ArrowRight,
            "pgup" => KeyCode::PageUp,
            "pgdn" | "pgdown" => KeyCode::PageDown,
            "-" => KeyCode::Minus,
            "=" => KeyCode::Equal,
            "[" => KeyCode::BracketLeft,
            "]" => KeyCode::BracketRight,
            "\\" => KeyCode::Backslash,
            ";" => KeyCode::Semicolon,
            "'" => KeyCode::Quote,
            "`" => KeyCode::Backquote,
            "," => KeyCode::Comma,
            "." => KeyCode::Period,
            "/" => KeyCode::Slash,
            _ => return None,
        };
        Some(key)
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for KeyCode {
    type Err = HotkeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(HotkeyError::InvalidKey("empty key".to_string()));
        }

        let lower = trimmed.to_ascii_lowercase();
        if let Some(key) = KeyCode::from_alias(&lower) {
            return Ok(key);
        }

        // "KeyA" / "Digit1" 形式与 "A" / "1" 等价
        let bare = lower
            .strip_prefix("key")
            .filter(|rest| rest.len() == 1)
            .or_else(|| lower.strip_prefix("digit").filter(|rest| rest.len() == 1))
            .unwrap_or(lower.as_str());

        KeyCode::ALL
            .iter()
            .copied()
            .find(|key| key.name().eq_ignore_ascii_case(bare))
            .ok_or_else(|| HotkeyError::InvalidKey(trimmed.to_string()))
    }
}

/// 组合键
///
/// 创建后不可变，作为去重的天然键：修饰键集合与按键完全相同时两者相等
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HotkeyCombination {
    modifiers: Modifiers,
    key: KeyCode,
}

impl HotkeyCombination {
    pub fn new(modifiers: Modifiers, key: KeyCode) -> Self {
        Self { modifiers, key }
    }

    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    pub fn key(&self) -> KeyCode {
        self.key
    }
}

impl fmt::Display for HotkeyCombination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (flag, name) in Modifiers::DISPLAY_ORDER {
            if self.modifiers.contains(flag) {
                write!(f, "{}+", name)?;
            }
        }
        f.write_str(self.key.name())
    }
}

impl FromStr for HotkeyCombination {
    type Err = HotkeyError;

    /// 解析 "Ctrl+Shift+H" 形式的快捷键字符串
    ///
    /// 修饰键在前、按键在最后，且只能有一个非修饰键
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('+').map(str::trim).collect();
        let Some((key, modifier_parts)) = parts.split_last() else {
            return Err(HotkeyError::InvalidKey(s.to_string()));
        };

        let mut modifiers = Modifiers::empty();
        for part in modifier_parts {
            match Modifiers::parse_alias(part) {
                Some(flag) => modifiers |= flag,
                None => return Err(HotkeyError::InvalidKey(format!("{} (in '{}')", part, s))),
            }
        }

        if Modifiers::parse_alias(key).is_some() {
            return Err(HotkeyError::InvalidKey(format!("'{}' has no non-modifier key", s)));
        }

        Ok(Self::new(modifiers, key.parse()?))
    }
}

impl TryFrom<String> for HotkeyCombination {
    type Error = HotkeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HotkeyCombination> for String {
    fn from(value: HotkeyCombination) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_combination() {
        let combo: HotkeyCombination = "Ctrl+Shift+H".parse().unwrap();
        assert_eq!(combo.modifiers(), Modifiers::CONTROL | Modifiers::SHIFT);
        assert_eq!(combo.key(), KeyCode::H);
    }

    #[test]
    fn test_modifier_order_does_not_matter() {
        let a: HotkeyCombination = "Shift+Control+h".parse().unwrap();
        let b: HotkeyCombination = "control+shift+KeyH".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "Control+Shift+H");
    }

    #[test]
    fn test_duplicate_modifiers_collapse() {
        let combo: HotkeyCombination = "Ctrl+Control+Alt+F5".parse().unwrap();
        assert_eq!(combo.modifiers(), Modifiers::CONTROL | Modifiers::ALT);
        assert_eq!(combo.to_string(), "Control+Alt+F5");
    }

    #[test]
    fn test_key_aliases() {
        assert_eq!("esc".parse::<KeyCode>().unwrap(), KeyCode::Escape);
        assert_eq!("Return".parse::<KeyCode>().unwrap(), KeyCode::Enter);
        assert_eq!("Digit7".parse::<KeyCode>().unwrap(), KeyCode::Digit7);
        assert_eq!("7".parse::<KeyCode>().unwrap(), KeyCode::Digit7);
        assert_eq!("up".parse::<KeyCode>().unwrap(), KeyCode::ArrowUp);
        assert_eq!("numpadadd".parse::<KeyCode>().unwrap(), KeyCode::NumpadAdd);
        assert_eq!("f12".parse::<KeyCode>().unwrap(), KeyCode::F12);
    }

    #[test]
    fn test_modifier_aliases() {
        assert_eq!(Modifiers::parse_alias("Option"), Some(Modifiers::ALT));
        assert_eq!(Modifiers::parse_alias("cmd"), Some(Modifiers::SUPER));
        assert_eq!(Modifiers::parse_alias("WIN"), Some(Modifiers::SUPER));
        assert_eq!(Modifiers::parse_alias("ctrl"), Some(Modifiers::CONTROL));
        assert_eq!(Modifiers::parse_alias("hyper"), None);
        // bitflags 自带的按标志名查找仍然可用
        assert_eq!(Modifiers::from_name("SHIFT"), Some(Modifiers::SHIFT));
    }

    #[test]
    fn test_no_modifiers_is_allowed() {
        let combo: HotkeyCombination = "F9".parse().unwrap();
        assert!(combo.modifiers().is_empty());
        assert_eq!(combo.to_string(), "F9");
    }

    #[test]
    fn test_cmd_or_ctrl_resolves_per_platform() {
        let combo: HotkeyCombination = "CmdOrCtrl+S".parse().unwrap();
        assert_eq!(combo.modifiers(), Modifiers::primary());
    }

    #[test]
    fn test_invalid_key_rejected() {
        assert!(matches!(
            "Ctrl+Hyper".parse::<HotkeyCombination>(),
            Err(HotkeyError::InvalidKey(_))
        ));
        assert!(matches!(
            "Ctrl+".parse::<HotkeyCombination>(),
            Err(HotkeyError::InvalidKey(_))
        ));
        assert!(matches!(
            "".parse::<HotkeyCombination>(),
            Err(HotkeyError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_modifier_only_rejected() {
        assert!(matches!(
            "Ctrl+Shift".parse::<HotkeyCombination>(),
            Err(HotkeyError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_key_must_be_last() {
        assert!(matches!(
            "H+Ctrl".parse::<HotkeyCombination>(),
            Err(HotkeyError::InvalidKey(_))
        ));
        assert!(matches!(
            "A+B".parse::<HotkeyCombination>(),
            Err(HotkeyError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_display_parses_back() {
        for key in KeyCode::ALL {
            let combo = HotkeyCombination::new(Modifiers::all(), *key);
            let parsed: HotkeyCombination = combo.to_string().parse().unwrap();
            assert_eq!(parsed, combo, "{}", combo);
        }
    }

    #[test]
    fn test_serde_as_string() {
        let combo = HotkeyCombination::new(Modifiers::ALT, KeyCode::Space);
        let json = serde_json::to_string(&combo).unwrap();
        assert_eq!(json, "\"Alt+Space\"");

        let parsed: HotkeyCombination = serde_json::from_str("\"alt+space\"").unwrap();
        assert_eq!(parsed, combo);
        assert!(serde_json::from_str::<HotkeyCombination>("\"Alt+Nope\"").is_err());
    }
}
