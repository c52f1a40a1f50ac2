//! Native mouse and keyboard synthesis using enigo
//!
//! A fresh `Enigo` connection is opened per call and keys are not released
//! when it is dropped, so a `key_down` stays held until the matching `key_up`.

use anyhow::{anyhow, Result};
use enigo::{Axis, Button, Coordinate, Direction, Enigo, Key, Keyboard, Mouse, Settings};

use super::backend::InputDevice;
use super::types::{MouseButton, Point, VirtualKey};

#[derive(Debug, Default)]
pub struct NativeInput;

impl NativeInput {
    pub fn new() -> Self {
        Self
    }

    fn connect() -> Result<Enigo> {
        let settings = Settings {
            release_keys_when_dropped: false,
            ..Settings::default()
        };
        Enigo::new(&settings).map_err(|e| anyhow!("Failed to create input controller: {:?}", e))
    }

    fn key(key: VirtualKey, direction: Direction) -> Result<()> {
        let mapped = to_enigo_key(key)?;
        Self::connect()?
            .key(mapped, direction)
            .map_err(|e| anyhow!("Failed to send key {:#04x}: {:?}", key.0, e))
    }

    fn button(button: MouseButton, direction: Direction) -> Result<()> {
        let mapped = to_enigo_button(button)?;
        Self::connect()?
            .button(mapped, direction)
            .map_err(|e| anyhow!("Failed to send mouse button {:?}: {:?}", button, e))
    }
}

impl InputDevice for NativeInput {
    fn key_down(&self, key: VirtualKey) -> Result<()> {
        Self::key(key, Direction::Press)
    }

    fn key_up(&self, key: VirtualKey) -> Result<()> {
        Self::key(key, Direction::Release)
    }

    fn mouse_position(&self) -> Result<Point> {
        let (x, y) = Self::connect()?
            .location()
            .map_err(|e| anyhow!("Failed to read mouse position: {:?}", e))?;
        Ok(Point::new(x, y))
    }

    fn move_mouse(&self, to: Point) -> Result<()> {
        Self::connect()?
            .move_mouse(to.x, to.y, Coordinate::Abs)
            .map_err(|e| anyhow!("Failed to move mouse: {:?}", e))
    }

    fn button_down(&self, button: MouseButton) -> Result<()> {
        Self::button(button, Direction::Press)
    }

    fn button_up(&self, button: MouseButton) -> Result<()> {
        Self::button(button, Direction::Release)
    }

    fn scroll_vertical(&self, delta: i32) -> Result<()> {
        Self::connect()?
            .scroll(delta, Axis::Vertical)
            .map_err(|e| anyhow!("Failed to scroll vertical: {:?}", e))
    }

    fn scroll_horizontal(&self, delta: i32) -> Result<()> {
        Self::connect()?
            .scroll(delta, Axis::Horizontal)
            .map_err(|e| anyhow!("Failed to scroll horizontal: {:?}", e))
    }

    fn type_text(&self, text: &str) -> Result<()> {
        Self::connect()?
            .text(text)
            .map_err(|e| anyhow!("Failed to type text: {:?}", e))
    }
}

fn to_enigo_button(button: MouseButton) -> Result<Button> {
    match button {
        MouseButton::Left => Ok(Button::Left),
        MouseButton::Middle => Ok(Button::Middle),
        MouseButton::Right => Ok(Button::Right),
        #[cfg(not(target_os = "macos"))]
        MouseButton::X1 => Ok(Button::Back),
        #[cfg(not(target_os = "macos"))]
        MouseButton::X2 => Ok(Button::Forward),
        #[cfg(target_os = "macos")]
        other => Err(anyhow!("Mouse button {:?} is not available on this platform", other)),
    }
}

/// On Windows the virtual-key code goes through untouched.
#[cfg(target_os = "windows")]
fn to_enigo_key(key: VirtualKey) -> Result<Key> {
    Ok(Key::Other(u32::from(key.0)))
}

/// Elsewhere keys are translated to enigo's named keys, or to the unshifted
/// character the key produces on a US layout.
#[cfg(not(target_os = "windows"))]
fn to_enigo_key(key: VirtualKey) -> Result<Key> {
    let named = match key {
        VirtualKey::BACK => Some(Key::Backspace),
        VirtualKey::TAB => Some(Key::Tab),
        VirtualKey::RETURN => Some(Key::Return),
        VirtualKey::SHIFT | VirtualKey::LSHIFT | VirtualKey::RSHIFT => Some(Key::Shift),
        VirtualKey::CONTROL => Some(Key::Control),
        VirtualKey::MENU => Some(Key::Alt),
        VirtualKey::ESCAPE => Some(Key::Escape),
        VirtualKey::SPACE => Some(Key::Space),
        VirtualKey::PRIOR => Some(Key::PageUp),
        VirtualKey::NEXT => Some(Key::PageDown),
        VirtualKey::END => Some(Key::End),
        VirtualKey::HOME => Some(Key::Home),
        VirtualKey::LEFT => Some(Key::LeftArrow),
        VirtualKey::UP => Some(Key::UpArrow),
        VirtualKey::RIGHT => Some(Key::RightArrow),
        VirtualKey::DOWN => Some(Key::DownArrow),
        VirtualKey::DELETE => Some(Key::Delete),
        VirtualKey::LWIN | VirtualKey::RWIN => Some(Key::Meta),
        _ => None,
    };
    if let Some(named) = named {
        return Ok(named);
    }

    let function = match key.0 {
        0x70 => Some(Key::F1),
        0x71 => Some(Key::F2),
        0x72 => Some(Key::F3),
        0x73 => Some(Key::F4),
        0x74 => Some(Key::F5),
        0x75 => Some(Key::F6),
        0x76 => Some(Key::F7),
        0x77 => Some(Key::F8),
        0x78 => Some(Key::F9),
        0x79 => Some(Key::F10),
        0x7A => Some(Key::F11),
        0x7B => Some(Key::F12),
        _ => None,
    };
    if let Some(function) = function {
        return Ok(function);
    }

    unshifted_char(key)
        .map(Key::Unicode)
        .ok_or_else(|| anyhow!("Virtual key {:#04x} is not supported on this platform", key.0))
}

#[cfg(not(target_os = "windows"))]
fn unshifted_char(key: VirtualKey) -> Option<char> {
    let c = match key.0 {
        0x30..=0x39 => char::from(key.0 as u8),
        0x41..=0x5A => char::from(key.0 as u8).to_ascii_lowercase(),
        0x60..=0x69 => char::from(b'0' + (key.0 - 0x60) as u8),
        0x6A => '*',
        0x6B => '+',
        0x6D => '-',
        0x6E => '.',
        0x6F => '/',
        0xBA => ';',
        0xBB => '=',
        0xBC => ',',
        0xBD => '-',
        0xBE => '.',
        0xBF => '/',
        0xC0 => '`',
        0xDB => '[',
        0xDC => '\\',
        0xDD => ']',
        0xDE => '\'',
        _ => return None,
    };
    Some(c)
}
