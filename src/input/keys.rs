//! Key lookup tables for keyboard actions.
//!
//! Raw key values arrive either as printable characters or as code points in
//! the private-use range `U+E000..U+E05D`. They are resolved to a normalized
//! key name (`"Shift"`, `"ArrowLeft"`), a physical key code (`"ShiftLeft"`,
//! `"KeyA"`) and finally a Win32 virtual key.

use crate::desktop::VirtualKey;
use crate::error::{Result, WebDriverError};

/// Clears modifier state inside a send-keys string
pub const NULL: char = '\u{E000}';
pub const LEFT_SHIFT: char = '\u{E008}';

const LETTER_CODES: [&str; 26] = [
    "KeyA", "KeyB", "KeyC", "KeyD", "KeyE", "KeyF", "KeyG", "KeyH", "KeyI", "KeyJ", "KeyK",
    "KeyL", "KeyM", "KeyN", "KeyO", "KeyP", "KeyQ", "KeyR", "KeyS", "KeyT", "KeyU", "KeyV",
    "KeyW", "KeyX", "KeyY", "KeyZ",
];

const DIGIT_CODES: [&str; 10] = [
    "Digit0", "Digit1", "Digit2", "Digit3", "Digit4", "Digit5", "Digit6", "Digit7", "Digit8",
    "Digit9",
];

const NUMPAD_CODES: [&str; 10] = [
    "Numpad0", "Numpad1", "Numpad2", "Numpad3", "Numpad4", "Numpad5", "Numpad6", "Numpad7",
    "Numpad8", "Numpad9",
];

const FUNCTION_NAMES: [&str; 12] = [
    "F1", "F2", "F3", "F4", "F5", "F6", "F7", "F8", "F9", "F10", "F11", "F12",
];

fn single_char(raw: &str) -> Option<char> {
    let mut chars = raw.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

fn normalized_char(c: char) -> Option<&'static str> {
    let name = match c {
        '\u{E000}' => "Unidentified",
        '\u{E001}' => "Cancel",
        '\u{E002}' => "Help",
        '\u{E003}' => "Backspace",
        '\u{E004}' => "Tab",
        '\u{E005}' => "Clear",
        '\u{E006}' => "Return",
        '\u{E007}' => "Enter",
        '\u{E008}' | '\u{E050}' => "Shift",
        '\u{E009}' | '\u{E051}' => "Control",
        '\u{E00A}' | '\u{E052}' => "Alt",
        '\u{E00B}' => "Pause",
        '\u{E00C}' => "Escape",
        '\u{E00D}' => " ",
        '\u{E00E}' | '\u{E054}' => "PageUp",
        '\u{E00F}' | '\u{E055}' => "PageDown",
        '\u{E010}' | '\u{E056}' => "End",
        '\u{E011}' | '\u{E057}' => "Home",
        '\u{E012}' | '\u{E058}' => "ArrowLeft",
        '\u{E013}' | '\u{E059}' => "ArrowUp",
        '\u{E014}' | '\u{E05A}' => "ArrowRight",
        '\u{E015}' | '\u{E05B}' => "ArrowDown",
        '\u{E016}' | '\u{E05C}' => "Insert",
        '\u{E017}' | '\u{E05D}' => "Delete",
        '\u{E018}' => ";",
        '\u{E019}' => "=",
        '\u{E01A}'..='\u{E023}' => DIGIT_CODES[(c as u32 - 0xE01A) as usize].trim_start_matches("Digit"),
        '\u{E024}' => "*",
        '\u{E025}' => "+",
        '\u{E026}' => ",",
        '\u{E027}' => "-",
        '\u{E028}' => ".",
        '\u{E029}' => "/",
        '\u{E031}'..='\u{E03C}' => FUNCTION_NAMES[(c as u32 - 0xE031) as usize],
        '\u{E03D}' | '\u{E053}' => "Meta",
        '\u{E03E}' => "Command",
        '\u{E040}' => "ZenkakuHankaku",
        _ => return None,
    };
    Some(name)
}

fn unshifted_code(c: char) -> Option<&'static str> {
    let code = match c {
        'a'..='z' => LETTER_CODES[(c as u8 - b'a') as usize],
        '0'..='9' => DIGIT_CODES[(c as u8 - b'0') as usize],
        '`' => "Backquote",
        '\\' => "Backslash",
        '[' => "BracketLeft",
        ']' => "BracketRight",
        ',' => "Comma",
        '=' => "Equal",
        '-' => "Minus",
        '.' => "Period",
        '\'' => "Quote",
        ';' => "Semicolon",
        '/' => "Slash",
        ' ' => "Space",
        '\u{E003}' => "Backspace",
        '\u{E004}' => "Tab",
        '\u{E006}' => "Enter",
        '\u{E002}' => "Help",
        '\u{E008}' => "ShiftLeft",
        '\u{E050}' => "ShiftRight",
        '\u{E009}' => "ControlLeft",
        '\u{E051}' => "ControlRight",
        '\u{E00A}' => "AltLeft",
        '\u{E052}' => "AltRight",
        '\u{E03D}' => "MetaLeft",
        '\u{E053}' => "MetaRight",
        '\u{E00B}' => "Pause",
        '\u{E00C}' => "Escape",
        '\u{E00E}' => "PageUp",
        '\u{E00F}' => "PageDown",
        '\u{E010}' => "End",
        '\u{E011}' => "Home",
        '\u{E012}' => "ArrowLeft",
        '\u{E013}' => "ArrowUp",
        '\u{E014}' => "ArrowRight",
        '\u{E015}' => "ArrowDown",
        '\u{E016}' => "Insert",
        '\u{E017}' => "Delete",
        '\u{E031}'..='\u{E03C}' => FUNCTION_NAMES[(c as u32 - 0xE031) as usize],
        '\u{E019}' => "NumpadEqual",
        '\u{E01A}'..='\u{E023}' => NUMPAD_CODES[(c as u32 - 0xE01A) as usize],
        '\u{E024}' => "NumpadMultiply",
        '\u{E025}' => "NumpadAdd",
        '\u{E026}' => "NumpadComma",
        '\u{E027}' => "NumpadSubtract",
        '\u{E028}' => "NumpadDecimal",
        '\u{E029}' => "NumpadDivide",
        '\u{E007}' => "NumpadEnter",
        _ => return None,
    };
    Some(code)
}

fn shifted_code(c: char) -> Option<&'static str> {
    let code = match c {
        'A'..='Z' => LETTER_CODES[(c as u8 - b'A') as usize],
        ')' => "Digit0",
        '!' => "Digit1",
        '@' => "Digit2",
        '#' => "Digit3",
        '$' => "Digit4",
        '%' => "Digit5",
        '^' => "Digit6",
        '&' => "Digit7",
        '*' => "Digit8",
        '(' => "Digit9",
        '~' => "Backquote",
        '|' => "Backslash",
        '{' => "BracketLeft",
        '}' => "BracketRight",
        '<' => "Comma",
        '+' => "Equal",
        '_' => "Minus",
        '>' => "Period",
        '"' => "Quote",
        ':' => "Semicolon",
        '?' => "Slash",
        '\u{E00D}' => "Space",
        '\u{E05C}' => "Numpad0",
        '\u{E056}' => "Numpad1",
        '\u{E05B}' => "Numpad2",
        '\u{E055}' => "Numpad3",
        '\u{E058}' => "Numpad4",
        '\u{E05A}' => "Numpad6",
        '\u{E057}' => "Numpad7",
        '\u{E059}' => "Numpad8",
        '\u{E054}' => "Numpad9",
        '\u{E05D}' => "NumpadDecimal",
        _ => return None,
    };
    Some(code)
}

/// Normalized key name for a raw key value; unknown values pass through.
pub fn normalized_key(raw: &str) -> &str {
    single_char(raw).and_then(normalized_char).unwrap_or(raw)
}

/// Physical key code for a raw key value
pub fn code(raw: &str) -> Option<&'static str> {
    let c = single_char(raw)?;
    unshifted_code(c).or_else(|| shifted_code(c))
}

/// True when typing `c` requires Shift to be held
pub fn is_shifted_char(c: char) -> bool {
    shifted_code(c).is_some()
}

/// True when a grapheme cluster can be typed with a single physical key
pub fn is_typeable(cluster: &str) -> bool {
    single_char(cluster)
        .map(|c| unshifted_code(c).is_some() || shifted_code(c).is_some())
        .unwrap_or(false)
}

/// Modifier key names as listed by UI Events `key` values
pub fn is_modifier(key: &str) -> bool {
    matches!(
        key,
        "Alt"
            | "AltGraph"
            | "CapsLock"
            | "Control"
            | "Fn"
            | "FnLock"
            | "Meta"
            | "NumLock"
            | "ScrollLock"
            | "Shift"
            | "Symbol"
            | "SymbolLock"
    )
}

/// Win32 virtual key for a physical key code.
pub fn virtual_key(code: Option<&str>) -> Result<VirtualKey> {
    let code = code.unwrap_or_default();
    let unsupported =
        || WebDriverError::UnsupportedOperation(format!("Key '{}' is not supported", code));

    if let Some(letter) = code.strip_prefix("Key") {
        return single_char(letter)
            .filter(char::is_ascii_uppercase)
            .and_then(VirtualKey::letter)
            .ok_or_else(unsupported);
    }
    if let Some(n) = code.strip_prefix("Digit").and_then(|d| d.parse::<u8>().ok()) {
        if n <= 9 {
            return Ok(VirtualKey::digit(n));
        }
    }
    if let Some(n) = code.strip_prefix("Numpad").and_then(|d| d.parse::<u8>().ok()) {
        if n <= 9 {
            return Ok(VirtualKey::numpad(n));
        }
    }
    if let Some(n) = code.strip_prefix('F').and_then(|d| d.parse::<u8>().ok()) {
        return VirtualKey::function(n)
            .filter(|_| n <= 12)
            .ok_or_else(unsupported);
    }

    let key = match code {
        "Backquote" => VirtualKey::OEM_3,
        "Backslash" => VirtualKey::OEM_5,
        "Backspace" => VirtualKey::BACK,
        "BracketLeft" => VirtualKey::OEM_4,
        "BracketRight" => VirtualKey::OEM_6,
        "Comma" | "NumpadComma" => VirtualKey::OEM_COMMA,
        "Equal" => VirtualKey::OEM_PLUS,
        "IntlBackslash" => VirtualKey::OEM_102,
        "Minus" => VirtualKey::OEM_MINUS,
        "Period" => VirtualKey::OEM_PERIOD,
        "Quote" => VirtualKey::OEM_7,
        "Semicolon" => VirtualKey::OEM_1,
        "Slash" => VirtualKey::OEM_2,
        "AltLeft" | "AltRight" => VirtualKey::MENU,
        "ControlLeft" | "ControlRight" => VirtualKey::CONTROL,
        "Enter" | "NumpadEnter" => VirtualKey::RETURN,
        "Pause" => VirtualKey::PAUSE,
        "MetaLeft" => VirtualKey::LWIN,
        "MetaRight" => VirtualKey::RWIN,
        "ShiftLeft" => VirtualKey::LSHIFT,
        "ShiftRight" => VirtualKey::RSHIFT,
        "Space" => VirtualKey::SPACE,
        "Tab" => VirtualKey::TAB,
        "Delete" => VirtualKey::DELETE,
        "End" => VirtualKey::END,
        "Help" => VirtualKey::HELP,
        "Home" => VirtualKey::HOME,
        "Insert" => VirtualKey::INSERT,
        "PageDown" => VirtualKey::NEXT,
        "PageUp" => VirtualKey::PRIOR,
        "ArrowDown" => VirtualKey::DOWN,
        "ArrowLeft" => VirtualKey::LEFT,
        "ArrowRight" => VirtualKey::RIGHT,
        "ArrowUp" => VirtualKey::UP,
        "Escape" => VirtualKey::ESCAPE,
        "NumpadEqual" => VirtualKey::SEPARATOR,
        "NumpadAdd" => VirtualKey::ADD,
        "NumpadDecimal" => VirtualKey::DECIMAL,
        "NumpadDivide" => VirtualKey::DIVIDE,
        "NumpadMultiply" => VirtualKey::MULTIPLY,
        "NumpadSubtract" => VirtualKey::SUBTRACT,
        _ => return Err(unsupported()),
    };
    Ok(key)
}
