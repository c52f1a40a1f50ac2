//! In-memory desktop backend.
//!
//! Models a handful of processes with top-level windows, an element tree per
//! window, keyboard focus with a text caret at the end of the focused field,
//! and a log of every synthesized input event. Used by the test-suite and
//! selectable at runtime for dry runs.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::backend::{Automation, InputDevice, Platform};
use super::property::ElementProperty;
use super::screenshot::PixelBounds;
use super::types::{
    AppHandle, LaunchSpec, Locator, MouseButton, Point, ProcessWindow, Rect, UiElement, VirtualKey,
};

const DESKTOP_ID: u64 = 0;
const DESKTOP_COLOR: Rgba<u8> = Rgba([0, 120, 215, 255]);

/// Every input call the backend receives, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    KeyDown(VirtualKey),
    KeyUp(VirtualKey),
    MouseMove(Point),
    ButtonDown(MouseButton),
    ButtonUp(MouseButton),
    ScrollVertical(i32),
    ScrollHorizontal(i32),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
enum ClickBehavior {
    None,
    Toggle,
    Rename(String),
    Select,
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<u64>,
    children: Vec<u64>,
    process_id: u32,
    control_type: String,
    class_name: String,
    automation_id: String,
    name: String,
    rect: Rect,
    enabled: bool,
    offscreen: bool,
    value: Option<String>,
    /// Text pattern document content
    document: Option<String>,
    range_value: Option<f64>,
    /// Children carry the selection state
    selection_container: bool,
    toggled: Option<bool>,
    selected: Option<bool>,
    on_click: ClickBehavior,
    available: bool,
    identity_fails: bool,
    window_handle: Option<i64>,
}

impl Node {
    fn new(control_type: &str, automation_id: &str, name: &str, rect: Rect) -> Self {
        Self {
            parent: None,
            children: Vec::new(),
            process_id: 0,
            control_type: control_type.to_string(),
            class_name: control_type.to_string(),
            automation_id: automation_id.to_string(),
            name: name.to_string(),
            rect,
            enabled: true,
            offscreen: false,
            value: None,
            document: None,
            range_value: None,
            selection_container: false,
            toggled: None,
            selected: None,
            on_click: ClickBehavior::None,
            available: true,
            identity_fails: false,
            window_handle: None,
        }
    }

    fn class(mut self, class_name: &str) -> Self {
        self.class_name = class_name.to_string();
        self
    }

    fn value(mut self, value: &str) -> Self {
        self.value = Some(value.to_string());
        self
    }

    fn on_click(mut self, behavior: ClickBehavior) -> Self {
        self.on_click = behavior;
        self
    }
}

#[derive(Debug)]
struct SimProcess {
    exited: bool,
    windows: Vec<u64>,
    arguments: Option<String>,
    working_dir: Option<String>,
}

#[derive(Debug)]
struct DesktopState {
    nodes: BTreeMap<u64, Node>,
    next_node: u64,
    processes: BTreeMap<u32, SimProcess>,
    next_pid: u32,
    next_window_handle: i64,
    apps: HashMap<String, String>,
    focused: Option<u64>,
    pointer: Point,
    pressed: HashSet<VirtualKey>,
    buttons: HashSet<MouseButton>,
    events: Vec<InputEvent>,
    input_blocked: bool,
}

impl DesktopState {
    fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            DESKTOP_ID,
            Node::new("Pane", "", "Desktop 1", Rect::new(0.0, 0.0, 1920.0, 1080.0))
                .class("#32769"),
        );
        Self {
            nodes,
            next_node: DESKTOP_ID + 1,
            processes: BTreeMap::new(),
            next_pid: 4200,
            next_window_handle: 0x10010,
            apps: HashMap::new(),
            focused: None,
            pointer: Point::default(),
            pressed: HashSet::new(),
            buttons: HashSet::new(),
            events: Vec::new(),
            input_blocked: false,
        }
    }

    /// Paint every visible node as a flat box, parents before children.
    fn render(&self, bounds: PixelBounds) -> RgbaImage {
        let mut image = RgbaImage::from_pixel(bounds.width, bounds.height, DESKTOP_COLOR);
        for (id, node) in self.nodes.iter().filter(|(id, _)| **id != DESKTOP_ID) {
            if !node.available || node.offscreen {
                continue;
            }
            let shade = (*id % 200) as u8 + 40;
            let color = Rgba([shade, shade, shade, 255]);
            let left = (node.rect.x.round() as i64 - i64::from(bounds.x)).max(0);
            let top = (node.rect.y.round() as i64 - i64::from(bounds.y)).max(0);
            let right = (node.rect.x + node.rect.width).round() as i64 - i64::from(bounds.x);
            let bottom = (node.rect.y + node.rect.height).round() as i64 - i64::from(bounds.y);
            let right = right.min(i64::from(bounds.width));
            let bottom = bottom.min(i64::from(bounds.height));
            for y in top..bottom {
                for x in left..right {
                    image.put_pixel(x as u32, y as u32, color);
                }
            }
        }
        image
    }

    fn insert(&mut self, parent: u64, mut node: Node) -> u64 {
        let id = self.next_node;
        self.next_node += 1;
        node.parent = Some(parent);
        if node.process_id == 0 {
            node.process_id = self.nodes.get(&parent).map(|p| p.process_id).unwrap_or(0);
        }
        if let Some(parent) = self.nodes.get_mut(&parent) {
            parent.children.push(id);
        }
        self.nodes.insert(id, node);
        id
    }

    fn spawn_process(&mut self, arguments: Option<String>, working_dir: Option<String>) -> u32 {
        let pid = self.next_pid;
        self.next_pid += 1;
        self.processes.insert(
            pid,
            SimProcess {
                exited: false,
                windows: Vec::new(),
                arguments,
                working_dir,
            },
        );
        pid
    }

    fn add_window(&mut self, pid: u32, title: &str) -> (u64, i64) {
        let handle = self.next_window_handle;
        self.next_window_handle += 0x10;
        let offset = self.processes.get(&pid).map(|p| p.windows.len()).unwrap_or(0) as f64;
        let mut window = Node::new(
            "Window",
            "",
            title,
            Rect::new(100.0 + 20.0 * offset, 100.0 + 20.0 * offset, 640.0, 480.0),
        );
        window.process_id = pid;
        window.window_handle = Some(handle);
        let id = self.insert(DESKTOP_ID, window);
        if let Some(process) = self.processes.get_mut(&pid) {
            process.windows.push(id);
        }
        (id, handle)
    }

    /// The standard form every simulated application shows in its main window.
    fn populate_form(&mut self, window: u64) {
        let Some(origin) = self.nodes.get(&window).map(|w| w.rect) else {
            return;
        };
        let at = |dx: f64, dy: f64, w: f64, h: f64| Rect::new(origin.x + dx, origin.y + dy, w, h);

        self.insert(
            window,
            Node::new("Edit", "TextBox", "", at(10.0, 40.0, 200.0, 24.0))
                .class("TextBox")
                .value("Test TextBox"),
        );
        let mut disabled = Node::new("Edit", "DisabledTextBox", "", at(10.0, 70.0, 200.0, 24.0))
            .class("TextBox")
            .value("Disabled");
        disabled.enabled = false;
        self.insert(window, disabled);

        let mut checkbox = Node::new(
            "CheckBox",
            "SimpleCheckBox",
            "Test Checkbox",
            at(10.0, 100.0, 150.0, 20.0),
        )
        .on_click(ClickBehavior::Toggle);
        checkbox.toggled = Some(false);
        self.insert(window, checkbox);

        self.insert(
            window,
            Node::new("Button", "InvokableButton", "Invoke me!", at(10.0, 130.0, 120.0, 30.0))
                .on_click(ClickBehavior::Rename("Invoked!".to_string())),
        );
        self.insert(
            window,
            Node::new("Text", "Label", "Test Label", at(10.0, 170.0, 100.0, 20.0)).class("TextBlock"),
        );

        let mut list = Node::new("List", "ListBox", "", at(10.0, 200.0, 200.0, 60.0)).class("ListBox");
        list.selection_container = true;
        let list = self.insert(window, list);
        for (index, selected) in [(1, true), (2, false)] {
            let mut item = Node::new(
                "ListItem",
                &format!("ListBoxItem{}", index),
                &format!("ListBox Item #{}", index),
                at(12.0, 180.0 + 22.0 * index as f64, 196.0, 20.0),
            )
            .class("ListBoxItem")
            .on_click(ClickBehavior::Select);
            item.selected = Some(selected);
            self.insert(list, item);
        }

        let mut slider = Node::new("Slider", "Slider", "", at(250.0, 40.0, 150.0, 24.0)).class("Slider");
        slider.range_value = Some(5.0);
        self.insert(window, slider);

        let group = self.insert(
            window,
            Node::new("Group", "GroupBox", "Settings", at(250.0, 80.0, 200.0, 80.0)).class("GroupBox"),
        );
        self.insert(
            group,
            Node::new("Text", "GroupHeader", "Settings", at(255.0, 80.0, 60.0, 16.0)).class("TextBlock"),
        );
        self.insert(
            group,
            Node::new("CheckBox", "GroupCheckBox", "Enable feature", at(255.0, 100.0, 150.0, 20.0)),
        );

        let mut offscreen = Node::new(
            "Button",
            "OffscreenButton",
            "Offscreen button",
            at(10.0, 900.0, 120.0, 30.0),
        );
        offscreen.offscreen = true;
        self.insert(window, offscreen);
    }

    fn exit_process(&mut self, pid: u32) {
        let Some(process) = self.processes.get_mut(&pid) else {
            return;
        };
        process.exited = true;
        let windows = process.windows.clone();
        for window in windows {
            self.set_subtree_available(window, false);
        }
    }

    fn set_subtree_available(&mut self, id: u64, available: bool) {
        let children = match self.nodes.get_mut(&id) {
            Some(node) => {
                node.available = available;
                node.children.clone()
            }
            None => return,
        };
        for child in children {
            self.set_subtree_available(child, available);
        }
    }

    fn is_running(&self, pid: u32) -> bool {
        self.processes.get(&pid).map(|p| !p.exited).unwrap_or(false)
    }

    fn node(&self, element: &UiElement) -> Result<&Node> {
        element
            .native::<u64>()
            .and_then(|id| self.nodes.get(id))
            .filter(|node| node.available)
            .ok_or_else(|| anyhow!("Element {:?} is no longer available", element.runtime_id()))
    }

    fn node_mut(&mut self, element: &UiElement) -> Result<&mut Node> {
        element
            .native::<u64>()
            .and_then(|id| self.nodes.get_mut(id))
            .filter(|node| node.available)
            .ok_or_else(|| anyhow!("Element {:?} is no longer available", element.runtime_id()))
    }

    fn find_by_automation_id(&self, automation_id: &str) -> Option<u64> {
        self.nodes
            .iter()
            .find(|(_, node)| node.automation_id == automation_id)
            .map(|(id, _)| *id)
    }

    fn descendants(&self, root: u64, locator: &Locator, first_only: bool) -> Vec<u64> {
        let mut found = Vec::new();
        let mut stack: Vec<u64> = self
            .nodes
            .get(&root)
            .map(|n| n.children.iter().rev().copied().collect())
            .unwrap_or_default();

        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(&id).filter(|n| n.available) else {
                continue;
            };
            if locator.matches(
                &node.automation_id,
                &node.name,
                &node.class_name,
                &node.control_type,
            ) {
                found.push(id);
                if first_only {
                    break;
                }
            }
            stack.extend(node.children.iter().rev().copied());
        }
        found
    }

    fn hit_test(&self, id: u64, point: Point) -> Option<u64> {
        let node = self.nodes.get(&id).filter(|n| n.available && !n.offscreen)?;
        if id != DESKTOP_ID && !node.rect.contains(point) {
            return None;
        }
        node.children
            .iter()
            .rev()
            .find_map(|child| self.hit_test(*child, point))
            .or(Some(id))
    }

    fn click(&mut self) {
        let Some(target) = self.hit_test(DESKTOP_ID, self.pointer) else {
            return;
        };
        let Some(node) = self.nodes.get(&target).cloned() else {
            return;
        };
        if !node.enabled {
            return;
        }
        if node.value.is_some() {
            self.focused = Some(target);
        }
        match node.on_click {
            ClickBehavior::None => {}
            ClickBehavior::Toggle => {
                if let Some(n) = self.nodes.get_mut(&target) {
                    n.toggled = Some(!n.toggled.unwrap_or(false));
                }
            }
            ClickBehavior::Rename(name) => {
                if let Some(n) = self.nodes.get_mut(&target) {
                    n.name = name;
                }
            }
            ClickBehavior::Select => {
                let siblings = node
                    .parent
                    .and_then(|p| self.nodes.get(&p))
                    .map(|p| p.children.clone())
                    .unwrap_or_default();
                for sibling in siblings {
                    if let Some(n) = self.nodes.get_mut(&sibling) {
                        n.selected = Some(sibling == target);
                    }
                }
            }
        }
    }

    fn focused_text(&mut self) -> Option<&mut String> {
        let focused = self.focused?;
        self.nodes
            .get_mut(&focused)
            .filter(|n| n.available && n.enabled)
            .and_then(|n| n.value.as_mut())
    }

    fn apply_key_down(&mut self, key: VirtualKey) {
        if key.is_shift() || key.is_control() || key == VirtualKey::MENU {
            return;
        }
        let shift = self.pressed.iter().any(|k| k.is_shift());
        let control = self.pressed.iter().any(|k| k.is_control());
        let Some(text) = self.focused_text() else {
            return;
        };

        if key == VirtualKey::BACK {
            if control {
                delete_word_before_caret(text);
            } else {
                text.pop();
            }
        } else if !control {
            if let Some(c) = typed_char(key, shift) {
                text.push(c);
            }
        }
    }

    /// Text of an element, first of: document, value, range value, the
    /// selected items' texts, then the rendered names of the subtree.
    fn element_text(&self, id: u64) -> String {
        let Some(node) = self.nodes.get(&id) else {
            return String::new();
        };
        if let Some(document) = &node.document {
            return document.clone();
        }
        if let Some(value) = &node.value {
            return value.clone();
        }
        if let Some(range_value) = node.range_value {
            return range_value.to_string();
        }
        if node.selection_container {
            return node
                .children
                .iter()
                .filter(|c| self.nodes.get(c).and_then(|n| n.selected) == Some(true))
                .map(|c| self.element_text(*c))
                .collect::<Vec<_>>()
                .join(", ");
        }
        let mut out = String::new();
        self.rendered_text(id, &mut out);
        out
    }

    fn rendered_text(&self, id: u64, out: &mut String) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        if !node.name.trim().is_empty() {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(&node.name);
        }
        for child in &node.children {
            let is_text_block = self
                .nodes
                .get(child)
                .map(|c| c.class_name == "TextBlock")
                .unwrap_or(false);
            if !is_text_block {
                self.rendered_text(*child, out);
            }
        }
    }
}

/// Ctrl+Backspace: drop trailing whitespace, then the word before it.
fn delete_word_before_caret(text: &mut String) {
    let trimmed = text.trim_end_matches(char::is_whitespace);
    let keep = trimmed
        .trim_end_matches(|c: char| !c.is_whitespace())
        .len();
    text.truncate(keep);
}

/// Character a key produces on a US layout, if any.
fn typed_char(key: VirtualKey, shift: bool) -> Option<char> {
    const DIGITS_SHIFTED: [char; 10] = [')', '!', '@', '#', '$', '%', '^', '&', '*', '('];

    let pair = match key.0 {
        0x20 => (' ', ' '),
        0x30..=0x39 => {
            let digit = (key.0 - 0x30) as usize;
            (char::from(b'0' + digit as u8), DIGITS_SHIFTED[digit])
        }
        0x41..=0x5A => {
            let upper = char::from(key.0 as u8);
            (upper.to_ascii_lowercase(), upper)
        }
        0x60..=0x69 => {
            let digit = char::from(b'0' + (key.0 - 0x60) as u8);
            (digit, digit)
        }
        0x6A => ('*', '*'),
        0x6B => ('+', '+'),
        0x6D => ('-', '-'),
        0x6E => ('.', '.'),
        0x6F => ('/', '/'),
        0xBA => (';', ':'),
        0xBB => ('=', '+'),
        0xBC => (',', '<'),
        0xBD => ('-', '_'),
        0xBE => ('.', '>'),
        0xBF => ('/', '?'),
        0xC0 => ('`', '~'),
        0xDB => ('[', '{'),
        0xDC => ('\\', '|'),
        0xDD => (']', '}'),
        0xDE => ('\'', '"'),
        _ => return None,
    };
    Some(if shift { pair.1 } else { pair.0 })
}

fn element_for(id: u64) -> UiElement {
    UiElement::new(Some(format!("42.{}", id)), id)
}

type SharedState = Arc<Mutex<DesktopState>>;

fn lock(state: &SharedState) -> MutexGuard<'_, DesktopState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Simulated desktop: implements [`Platform`] and hands out the matching
/// [`Automation`] and [`InputDevice`].
#[derive(Clone)]
pub struct SimulatedDesktop {
    state: SharedState,
}

impl Default for SimulatedDesktop {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedDesktop {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(DesktopState::new())),
        }
    }

    /// Desktop with a launchable `TestApplication.exe` and a running
    /// `Untitled - Notepad` process to attach to.
    pub fn demo() -> Self {
        let desktop = Self::new();
        desktop.register_app("TestApplication.exe", "WPF Test Application");
        desktop.start_process("Untitled - Notepad");
        desktop
    }

    /// Make `path` launchable; launching it opens a window titled `title`.
    pub fn register_app(&self, path: &str, title: &str) {
        lock(&self.state)
            .apps
            .insert(path.to_string(), title.to_string());
    }

    /// Start a process that was not launched by any session.
    pub fn start_process(&self, title: &str) -> ProcessWindow {
        let mut state = lock(&self.state);
        let pid = state.spawn_process(None, None);
        let (window, handle) = state.add_window(pid, title);
        state.populate_form(window);
        ProcessWindow {
            process_id: pid,
            window_handle: handle,
            title: title.to_string(),
        }
    }

    /// Open an additional top-level window for a running process.
    pub fn add_window(&self, process_id: u32, title: &str) -> i64 {
        let mut state = lock(&self.state);
        let (window, handle) = state.add_window(process_id, title);
        state.populate_form(window);
        handle
    }

    pub fn exit_process(&self, process_id: u32) {
        lock(&self.state).exit_process(process_id);
    }

    pub fn is_running(&self, process_id: u32) -> bool {
        lock(&self.state).is_running(process_id)
    }

    pub fn running_processes(&self) -> Vec<u32> {
        let state = lock(&self.state);
        state
            .processes
            .iter()
            .filter(|(_, p)| !p.exited)
            .map(|(pid, _)| *pid)
            .collect()
    }

    pub fn process_arguments(&self, process_id: u32) -> Option<String> {
        lock(&self.state)
            .processes
            .get(&process_id)
            .and_then(|p| p.arguments.clone())
    }

    pub fn process_working_dir(&self, process_id: u32) -> Option<String> {
        lock(&self.state)
            .processes
            .get(&process_id)
            .and_then(|p| p.working_dir.clone())
    }

    pub fn set_available(&self, automation_id: &str, available: bool) {
        let mut state = lock(&self.state);
        if let Some(id) = state.find_by_automation_id(automation_id) {
            state.set_subtree_available(id, available);
        }
    }

    /// Make native identity comparisons involving the element fail.
    pub fn set_identity_failing(&self, automation_id: &str, failing: bool) {
        let mut state = lock(&self.state);
        if let Some(id) = state.find_by_automation_id(automation_id) {
            if let Some(node) = state.nodes.get_mut(&id) {
                node.identity_fails = failing;
            }
        }
    }

    pub fn set_offscreen(&self, automation_id: &str, offscreen: bool) {
        let mut state = lock(&self.state);
        if let Some(id) = state.find_by_automation_id(automation_id) {
            if let Some(node) = state.nodes.get_mut(&id) {
                node.offscreen = offscreen;
            }
        }
    }

    /// Make keyboard injection fail, as it does when a higher-integrity
    /// window has focus.
    pub fn block_input(&self, blocked: bool) {
        lock(&self.state).input_blocked = blocked;
    }

    pub fn focus(&self, automation_id: &str) {
        let mut state = lock(&self.state);
        state.focused = state.find_by_automation_id(automation_id);
    }

    pub fn value_of(&self, automation_id: &str) -> Option<String> {
        let state = lock(&self.state);
        state
            .find_by_automation_id(automation_id)
            .and_then(|id| state.nodes.get(&id))
            .and_then(|n| n.value.clone())
    }

    pub fn name_of(&self, automation_id: &str) -> Option<String> {
        let state = lock(&self.state);
        state
            .find_by_automation_id(automation_id)
            .and_then(|id| state.nodes.get(&id))
            .map(|n| n.name.clone())
    }

    pub fn is_toggled(&self, automation_id: &str) -> Option<bool> {
        let state = lock(&self.state);
        state
            .find_by_automation_id(automation_id)
            .and_then(|id| state.nodes.get(&id))
            .and_then(|n| n.toggled)
    }

    pub fn events(&self) -> Vec<InputEvent> {
        lock(&self.state).events.clone()
    }

    pub fn clear_events(&self) {
        lock(&self.state).events.clear();
    }

    pub fn pointer(&self) -> Point {
        lock(&self.state).pointer
    }

    pub fn pressed_keys(&self) -> Vec<VirtualKey> {
        lock(&self.state).pressed.iter().copied().collect()
    }

    pub fn pressed_buttons(&self) -> Vec<MouseButton> {
        lock(&self.state).buttons.iter().copied().collect()
    }

    /// Handle for `automation_id` as a backend would hand it out.
    pub fn element(&self, automation_id: &str) -> Option<UiElement> {
        lock(&self.state)
            .find_by_automation_id(automation_id)
            .map(element_for)
    }

    fn launch_registered(
        &self,
        path: &str,
        arguments: Option<String>,
        working_dir: Option<String>,
    ) -> Result<AppHandle> {
        let mut state = lock(&self.state);
        let title = state
            .apps
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow!("The system cannot find the file specified"))?;
        let pid = state.spawn_process(arguments, working_dir);
        let (window, _) = state.add_window(pid, &title);
        state.populate_form(window);
        Ok(AppHandle { process_id: pid })
    }
}

#[async_trait]
impl Platform for SimulatedDesktop {
    fn create_automation(&self) -> Result<Arc<dyn Automation>> {
        Ok(Arc::new(SimulatedAutomation {
            state: self.state.clone(),
        }))
    }

    fn input(&self) -> Arc<dyn InputDevice> {
        Arc::new(SimulatedInput {
            state: self.state.clone(),
        })
    }

    async fn launch(&self, spec: &LaunchSpec) -> Result<AppHandle> {
        self.launch_registered(&spec.path, spec.arguments.clone(), spec.working_dir.clone())
    }

    async fn launch_packaged(&self, app_id: &str, arguments: Option<&str>) -> Result<AppHandle> {
        self.launch_registered(app_id, arguments.map(str::to_string), None)
    }

    async fn processes(&self) -> Result<Vec<ProcessWindow>> {
        let state = lock(&self.state);
        Ok(state
            .processes
            .iter()
            .filter(|(_, p)| !p.exited)
            .filter_map(|(pid, p)| {
                let main = state.nodes.get(p.windows.first()?)?;
                Some(ProcessWindow {
                    process_id: *pid,
                    window_handle: main.window_handle?,
                    title: main.name.clone(),
                })
            })
            .collect())
    }

    async fn attach(&self, process_id: u32) -> Result<AppHandle> {
        if lock(&self.state).is_running(process_id) {
            Ok(AppHandle { process_id })
        } else {
            Err(anyhow!("Process {} is not running", process_id))
        }
    }

    async fn has_exited(&self, app: &AppHandle) -> bool {
        !lock(&self.state).is_running(app.process_id)
    }

    async fn close(&self, app: &AppHandle) -> Result<()> {
        lock(&self.state).exit_process(app.process_id);
        Ok(())
    }

    fn capture(&self, area: Rect) -> Result<RgbaImage> {
        let bounds = PixelBounds::of(area)?;
        Ok(lock(&self.state).render(bounds))
    }
}

pub struct SimulatedAutomation {
    state: SharedState,
}

impl SimulatedAutomation {
    fn windows_of(&self, app: &AppHandle) -> Vec<UiElement> {
        let state = lock(&self.state);
        state
            .processes
            .get(&app.process_id)
            .map(|p| {
                p.windows
                    .iter()
                    .filter(|id| state.nodes.get(id).map(|n| n.available).unwrap_or(false))
                    .map(|id| element_for(*id))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl Automation for SimulatedAutomation {
    async fn desktop(&self) -> Result<UiElement> {
        Ok(element_for(DESKTOP_ID))
    }

    async fn focused_element(&self) -> Result<UiElement> {
        let state = lock(&self.state);
        let focused = state
            .focused
            .filter(|id| state.nodes.get(id).map(|n| n.available).unwrap_or(false))
            .unwrap_or(DESKTOP_ID);
        Ok(element_for(focused))
    }

    async fn main_window(&self, app: &AppHandle, timeout: Duration) -> Result<Option<UiElement>> {
        crate::wait::until(
            timeout,
            || async { Ok(self.windows_of(app).into_iter().next()) },
            Option::is_some,
        )
        .await
    }

    async fn top_level_windows(&self, app: &AppHandle) -> Result<Vec<UiElement>> {
        Ok(self.windows_of(app))
    }

    async fn find_first(&self, root: &UiElement, locator: &Locator) -> Result<Option<UiElement>> {
        let state = lock(&self.state);
        state.node(root)?;
        let root_id = root.native::<u64>().copied().unwrap_or(DESKTOP_ID);
        Ok(state
            .descendants(root_id, locator, true)
            .into_iter()
            .next()
            .map(element_for))
    }

    async fn find_all(&self, root: &UiElement, locator: &Locator) -> Result<Vec<UiElement>> {
        let state = lock(&self.state);
        state.node(root)?;
        let root_id = root.native::<u64>().copied().unwrap_or(DESKTOP_ID);
        Ok(state
            .descendants(root_id, locator, false)
            .into_iter()
            .map(element_for)
            .collect())
    }

    async fn is_same(&self, a: &UiElement, b: &UiElement) -> Result<bool> {
        let state = lock(&self.state);
        let (left, right) = (state.node(a)?, state.node(b)?);
        if left.identity_fails || right.identity_fails {
            return Err(anyhow!("Element identity comparison failed"));
        }
        Ok(a.native::<u64>() == b.native::<u64>())
    }

    async fn is_available(&self, element: &UiElement) -> Result<bool> {
        Ok(lock(&self.state).node(element).is_ok())
    }

    async fn bounding_rect(&self, element: &UiElement) -> Result<Rect> {
        Ok(lock(&self.state).node(element)?.rect)
    }

    async fn property(
        &self,
        element: &UiElement,
        property: ElementProperty,
    ) -> Result<Option<Value>> {
        let state = lock(&self.state);
        let node = state.node(element)?;
        let value = match property {
            ElementProperty::Name => Some(json!(node.name)),
            ElementProperty::AutomationId => Some(json!(node.automation_id)),
            ElementProperty::ClassName => Some(json!(node.class_name)),
            ElementProperty::ControlType => Some(json!(node.control_type)),
            ElementProperty::LocalizedControlType => {
                Some(json!(node.control_type.to_lowercase()))
            }
            ElementProperty::FrameworkId => Some(json!("WPF")),
            ElementProperty::HelpText => Some(json!("")),
            ElementProperty::ProcessId => Some(json!(node.process_id)),
            ElementProperty::NativeWindowHandle => node.window_handle.map(|h| json!(h)),
            ElementProperty::RuntimeId => element.runtime_id().map(|id| json!(id)),
            ElementProperty::BoundingRectangle => Some(json!(node.rect)),
            ElementProperty::IsEnabled => Some(json!(node.enabled)),
            ElementProperty::IsOffscreen => Some(json!(node.offscreen)),
            ElementProperty::IsKeyboardFocusable => Some(json!(node.value.is_some())),
            ElementProperty::HasKeyboardFocus => {
                Some(json!(state.focused == element.native::<u64>().copied()))
            }
            ElementProperty::ValueValue => node.value.as_ref().map(|v| json!(v)),
            ElementProperty::ValueIsReadOnly => node.value.as_ref().map(|_| json!(!node.enabled)),
            ElementProperty::ToggleState => node
                .toggled
                .map(|on| json!(if on { "On" } else { "Off" })),
            ElementProperty::SelectionItemIsSelected => node.selected.map(|s| json!(s)),
            ElementProperty::ExpandCollapseState | ElementProperty::RangeValueValue => None,
        };
        Ok(value)
    }

    async fn text(&self, element: &UiElement) -> Result<String> {
        let state = lock(&self.state);
        state.node(element)?;
        Ok(element
            .native::<u64>()
            .map(|id| state.element_text(*id))
            .unwrap_or_default())
    }

    async fn is_offscreen(&self, element: &UiElement) -> Result<bool> {
        Ok(lock(&self.state).node(element)?.offscreen)
    }

    async fn scroll_into_view(&self, element: &UiElement) -> Result<()> {
        lock(&self.state).node(element).map(|_| ())
    }

    async fn focus(&self, element: &UiElement) -> Result<()> {
        let mut state = lock(&self.state);
        state.node(element)?;
        state.focused = element.native::<u64>().copied();
        Ok(())
    }

    async fn clear(&self, element: &UiElement) -> Result<()> {
        let mut state = lock(&self.state);
        let node = state.node_mut(element)?;
        match node.value.as_mut() {
            Some(value) => {
                value.clear();
                Ok(())
            }
            None => Err(anyhow!("Element does not support the value pattern")),
        }
    }
}

pub struct SimulatedInput {
    state: SharedState,
}

impl InputDevice for SimulatedInput {
    fn key_down(&self, key: VirtualKey) -> Result<()> {
        let mut state = lock(&self.state);
        if state.input_blocked {
            return Err(anyhow!("SendInput was blocked"));
        }
        state.events.push(InputEvent::KeyDown(key));
        state.pressed.insert(key);
        state.apply_key_down(key);
        Ok(())
    }

    fn key_up(&self, key: VirtualKey) -> Result<()> {
        let mut state = lock(&self.state);
        if state.input_blocked {
            return Err(anyhow!("SendInput was blocked"));
        }
        state.events.push(InputEvent::KeyUp(key));
        state.pressed.remove(&key);
        Ok(())
    }

    fn mouse_position(&self) -> Result<Point> {
        Ok(lock(&self.state).pointer)
    }

    fn move_mouse(&self, to: Point) -> Result<()> {
        let mut state = lock(&self.state);
        state.events.push(InputEvent::MouseMove(to));
        state.pointer = to;
        Ok(())
    }

    fn button_down(&self, button: MouseButton) -> Result<()> {
        let mut state = lock(&self.state);
        state.events.push(InputEvent::ButtonDown(button));
        state.buttons.insert(button);
        Ok(())
    }

    fn button_up(&self, button: MouseButton) -> Result<()> {
        let mut state = lock(&self.state);
        state.events.push(InputEvent::ButtonUp(button));
        let was_down = state.buttons.remove(&button);
        if was_down && button == MouseButton::Left {
            state.click();
        }
        Ok(())
    }

    fn scroll_vertical(&self, delta: i32) -> Result<()> {
        lock(&self.state).events.push(InputEvent::ScrollVertical(delta));
        Ok(())
    }

    fn scroll_horizontal(&self, delta: i32) -> Result<()> {
        lock(&self.state)
            .events
            .push(InputEvent::ScrollHorizontal(delta));
        Ok(())
    }

    fn type_text(&self, text: &str) -> Result<()> {
        let mut state = lock(&self.state);
        state.events.push(InputEvent::Text(text.to_string()));
        if let Some(value) = state.focused_text() {
            value.push_str(text);
        }
        Ok(())
    }
}
