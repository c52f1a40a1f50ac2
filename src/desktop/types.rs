use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Screen coordinates in physical pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x.saturating_add(dx), self.y.saturating_add(dy))
    }
}

/// Bounding rectangle in screen coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.x + self.width / 2.0).floor() as i32,
            (self.y + self.height / 2.0).floor() as i32,
        )
    }

    pub fn top_left(&self) -> Point {
        Point::new(self.x as i32, self.y as i32)
    }

    pub fn contains(&self, point: Point) -> bool {
        let (x, y) = (point.x as f64, point.y as f64);
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }
}

/// Mouse buttons addressable by pointer actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
    X1,
    X2,
}

/// Win32 virtual-key code. Every backend receives keys in this form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VirtualKey(pub u16);

impl VirtualKey {
    pub const BACK: Self = Self(0x08);
    pub const TAB: Self = Self(0x09);
    pub const RETURN: Self = Self(0x0D);
    pub const SHIFT: Self = Self(0x10);
    pub const CONTROL: Self = Self(0x11);
    pub const MENU: Self = Self(0x12);
    pub const PAUSE: Self = Self(0x13);
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
    pub const INSERT: Self = Self(0x2D);
    pub const DELETE: Self = Self(0x2E);
    pub const HELP: Self = Self(0x2F);
    pub const LWIN: Self = Self(0x5B);
    pub const RWIN: Self = Self(0x5C);
    pub const MULTIPLY: Self = Self(0x6A);
    pub const ADD: Self = Self(0x6B);
    pub const SEPARATOR: Self = Self(0x6C);
    pub const SUBTRACT: Self = Self(0x6D);
    pub const DECIMAL: Self = Self(0x6E);
    pub const DIVIDE: Self = Self(0x6F);
    pub const LSHIFT: Self = Self(0xA0);
    pub const RSHIFT: Self = Self(0xA1);
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

    /// `0`..`9` on the main keyboard row
    pub fn digit(n: u8) -> Self {
        Self(0x30 + u16::from(n.min(9)))
    }

    /// `A`..`Z`
    pub fn letter(c: char) -> Option<Self> {
        let upper = c.to_ascii_uppercase();
        upper
            .is_ascii_uppercase()
            .then(|| Self(upper as u16))
    }

    /// `F1`..`F24`
    pub fn function(n: u8) -> Option<Self> {
        (1..=24).contains(&n).then(|| Self(0x6F + u16::from(n)))
    }

    pub fn numpad(n: u8) -> Self {
        Self(0x60 + u16::from(n.min(9)))
    }

    pub fn is_shift(self) -> bool {
        matches!(self, Self::SHIFT | Self::LSHIFT | Self::RSHIFT)
    }

    pub fn is_control(self) -> bool {
        self == Self::CONTROL || self.0 == 0xA2 || self.0 == 0xA3
    }
}

/// Opaque handle on an accessible object, owned by whichever backend
/// produced it.
#[derive(Clone)]
pub struct UiElement {
    runtime_id: Option<String>,
    native: Arc<dyn Any + Send + Sync>,
}

impl UiElement {
    pub fn new<T: Any + Send + Sync>(runtime_id: Option<String>, native: T) -> Self {
        Self {
            runtime_id,
            native: Arc::new(native),
        }
    }

    /// Backend identity hint; unique at a point in time, reusable over time.
    pub fn runtime_id(&self) -> Option<&str> {
        self.runtime_id.as_deref()
    }

    pub fn native<T: Any>(&self) -> Option<&T> {
        self.native.downcast_ref::<T>()
    }
}

impl fmt::Debug for UiElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UiElement")
            .field("runtime_id", &self.runtime_id)
            .finish_non_exhaustive()
    }
}

/// A launched or attached application process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppHandle {
    pub process_id: u32,
}

/// Process with a visible main window, as listed for attaching
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessWindow {
    pub process_id: u32,
    pub window_handle: i64,
    pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchSpec {
    pub path: String,
    pub arguments: Option<String>,
    pub working_dir: Option<String>,
}

/// Element search strategies understood by every backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocatorStrategy {
    AutomationId,
    Name,
    NameContains,
    ClassName,
    ControlType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    pub strategy: LocatorStrategy,
    pub value: String,
}

impl Locator {
    pub fn new(strategy: LocatorStrategy, value: impl Into<String>) -> Self {
        Self {
            strategy,
            value: value.into(),
        }
    }

    /// True when an element with the given properties satisfies this locator.
    pub fn matches(
        &self,
        automation_id: &str,
        name: &str,
        class_name: &str,
        control_type: &str,
    ) -> bool {
        match self.strategy {
            LocatorStrategy::AutomationId => automation_id == self.value,
            LocatorStrategy::Name => name == self.value,
            LocatorStrategy::NameContains => name.contains(&self.value),
            LocatorStrategy::ClassName => class_name == self.value,
            LocatorStrategy::ControlType => control_type.eq_ignore_ascii_case(&self.value),
        }
    }
}
