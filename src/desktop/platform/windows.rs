#![cfg(target_os = "windows")]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use windows::{
    core::{Interface, BSTR, HSTRING},
    Win32::{
        Foundation::{CloseHandle, BOOL, HWND, LPARAM, STILL_ACTIVE},
        System::{
            Com::{
                CoCreateInstance, CoInitializeEx, CLSCTX_ALL, CLSCTX_LOCAL_SERVER,
                COINIT_MULTITHREADED,
            },
            Ole::SafeArrayDestroy,
            Threading::{
                GetExitCodeProcess, OpenProcess, TerminateProcess,
                PROCESS_QUERY_LIMITED_INFORMATION, PROCESS_TERMINATE,
            },
        },
        UI::{
            Accessibility::{
                CUIAutomation, IUIAutomation, IUIAutomationElement,
                IUIAutomationExpandCollapsePattern, IUIAutomationRangeValuePattern,
                IUIAutomationScrollItemPattern, IUIAutomationSelectionItemPattern,
                IUIAutomationSelectionPattern, IUIAutomationTextPattern,
                IUIAutomationTogglePattern, IUIAutomationValuePattern, TreeScope_Children,
                TreeScope_Descendants,
                UIA_ButtonControlTypeId, UIA_CheckBoxControlTypeId, UIA_ComboBoxControlTypeId,
                UIA_CustomControlTypeId, UIA_DataGridControlTypeId, UIA_DataItemControlTypeId,
                UIA_DocumentControlTypeId, UIA_EditControlTypeId, UIA_ExpandCollapsePatternId,
                UIA_GroupControlTypeId, UIA_HeaderControlTypeId, UIA_HyperlinkControlTypeId,
                UIA_ImageControlTypeId, UIA_ListControlTypeId, UIA_ListItemControlTypeId,
                UIA_MenuBarControlTypeId, UIA_MenuControlTypeId, UIA_MenuItemControlTypeId,
                UIA_PaneControlTypeId, UIA_ProgressBarControlTypeId, UIA_RadioButtonControlTypeId,
                UIA_RangeValuePatternId, UIA_ScrollBarControlTypeId, UIA_ScrollItemPatternId,
                UIA_SelectionItemPatternId, UIA_SelectionPatternId, UIA_SliderControlTypeId, UIA_SpinnerControlTypeId,
                UIA_SplitButtonControlTypeId, UIA_StatusBarControlTypeId, UIA_TabControlTypeId,
                UIA_TabItemControlTypeId, UIA_TableControlTypeId, UIA_TextControlTypeId,
                UIA_TextPatternId,
                UIA_ThumbControlTypeId, UIA_TitleBarControlTypeId, UIA_TogglePatternId,
                UIA_ToolBarControlTypeId, UIA_ToolTipControlTypeId, UIA_TreeControlTypeId,
                UIA_TreeItemControlTypeId, UIA_ValuePatternId, UIA_WindowControlTypeId,
                UIA_PATTERN_ID,
            },
            Shell::{ApplicationActivationManager, IApplicationActivationManager, AO_NONE},
            WindowsAndMessaging::{
                EnumWindows, GetWindow, GetWindowTextW, GetWindowThreadProcessId,
                IsWindowVisible, GW_OWNER,
            },
        },
    },
};

use crate::desktop::backend::Automation;
use crate::desktop::property::ElementProperty;
use crate::desktop::types::{AppHandle, Locator, ProcessWindow, Rect, UiElement};

/// UIA client objects live in the multithreaded apartment and may be used
/// from any thread that joined it.
#[derive(Clone)]
struct Uia<T>(T);

unsafe impl<T> Send for Uia<T> {}
unsafe impl<T> Sync for Uia<T> {}

fn init_com() {
    unsafe {
        let _ = CoInitializeEx(None, COINIT_MULTITHREADED);
    }
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        init_com();
        f()
    })
    .await
    .map_err(|e| anyhow!("Task join error: {}", e))?
}

/// Visible, unowned top-level window with a title
struct WindowEntry {
    handle: i64,
    process_id: u32,
    title: String,
}

fn enumerate_windows() -> Vec<WindowEntry> {
    let mut windows = Vec::new();

    unsafe extern "system" fn enum_callback(hwnd: HWND, lparam: LPARAM) -> BOOL {
        let windows = &mut *(lparam.0 as *mut Vec<WindowEntry>);

        if !IsWindowVisible(hwnd).as_bool() {
            return BOOL(1);
        }
        let owned = GetWindow(hwnd, GW_OWNER)
            .map(|owner| !owner.0.is_null())
            .unwrap_or(false);
        if owned {
            return BOOL(1);
        }

        let mut title_buf = [0u16; 512];
        let len = GetWindowTextW(hwnd, &mut title_buf);
        if len <= 0 {
            return BOOL(1);
        }
        let title = String::from_utf16_lossy(&title_buf[..len as usize]);

        let mut process_id: u32 = 0;
        GetWindowThreadProcessId(hwnd, Some(&mut process_id));

        windows.push(WindowEntry {
            handle: hwnd.0 as isize as i64,
            process_id,
            title,
        });
        BOOL(1)
    }

    unsafe {
        let windows_ptr = LPARAM(&mut windows as *mut Vec<WindowEntry> as isize);
        let _ = EnumWindows(Some(enum_callback), windows_ptr);
    }
    windows
}

/// First main window of every process that has one
pub async fn main_windows() -> Result<Vec<ProcessWindow>> {
    blocking(|| {
        let mut seen = std::collections::HashSet::new();
        Ok(enumerate_windows()
            .into_iter()
            .filter(|w| seen.insert(w.process_id))
            .map(|w| ProcessWindow {
                process_id: w.process_id,
                window_handle: w.handle,
                title: w.title,
            })
            .collect())
    })
    .await
}

pub fn is_process_running(process_id: u32) -> bool {
    unsafe {
        let Ok(handle) = OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, process_id) else {
            return false;
        };
        let mut code = 0u32;
        let running = GetExitCodeProcess(handle, &mut code).is_ok()
            && code == STILL_ACTIVE.0 as u32;
        let _ = CloseHandle(handle);
        running
    }
}

pub fn terminate_process(process_id: u32) -> Result<()> {
    unsafe {
        let handle = OpenProcess(PROCESS_TERMINATE, false, process_id)
            .map_err(|e| anyhow!("Failed to open process {}: {}", process_id, e))?;
        let result = TerminateProcess(handle, 0);
        let _ = CloseHandle(handle);
        result.map_err(|e| anyhow!("Failed to terminate process {}: {}", process_id, e))
    }
}

/// Activate a packaged application by its application user model id.
pub async fn activate_packaged_app(app_id: &str, arguments: Option<&str>) -> Result<u32> {
    let app_id = HSTRING::from(app_id);
    let arguments = HSTRING::from(arguments.unwrap_or(""));

    blocking(move || unsafe {
        let manager: IApplicationActivationManager =
            CoCreateInstance(&ApplicationActivationManager, None, CLSCTX_LOCAL_SERVER)
                .map_err(|e| anyhow!("Failed to create activation manager: {}", e))?;
        manager
            .ActivateApplication(&app_id, &arguments, AO_NONE)
            .map_err(|e| anyhow!("Failed to activate '{}': {}", app_id, e))
    })
    .await
}

fn control_type_name(control_type_id: i32) -> &'static str {
    match control_type_id {
        x if x == UIA_ButtonControlTypeId.0 => "Button",
        x if x == UIA_CheckBoxControlTypeId.0 => "CheckBox",
        x if x == UIA_ComboBoxControlTypeId.0 => "ComboBox",
        x if x == UIA_CustomControlTypeId.0 => "Custom",
        x if x == UIA_DataGridControlTypeId.0 => "DataGrid",
        x if x == UIA_DataItemControlTypeId.0 => "DataItem",
        x if x == UIA_DocumentControlTypeId.0 => "Document",
        x if x == UIA_EditControlTypeId.0 => "Edit",
        x if x == UIA_GroupControlTypeId.0 => "Group",
        x if x == UIA_HeaderControlTypeId.0 => "Header",
        x if x == UIA_HyperlinkControlTypeId.0 => "Hyperlink",
        x if x == UIA_ImageControlTypeId.0 => "Image",
        x if x == UIA_ListControlTypeId.0 => "List",
        x if x == UIA_ListItemControlTypeId.0 => "ListItem",
        x if x == UIA_MenuControlTypeId.0 => "Menu",
        x if x == UIA_MenuBarControlTypeId.0 => "MenuBar",
        x if x == UIA_MenuItemControlTypeId.0 => "MenuItem",
        x if x == UIA_PaneControlTypeId.0 => "Pane",
        x if x == UIA_ProgressBarControlTypeId.0 => "ProgressBar",
        x if x == UIA_RadioButtonControlTypeId.0 => "RadioButton",
        x if x == UIA_ScrollBarControlTypeId.0 => "ScrollBar",
        x if x == UIA_SliderControlTypeId.0 => "Slider",
        x if x == UIA_SpinnerControlTypeId.0 => "Spinner",
        x if x == UIA_SplitButtonControlTypeId.0 => "SplitButton",
        x if x == UIA_StatusBarControlTypeId.0 => "StatusBar",
        x if x == UIA_TabControlTypeId.0 => "Tab",
        x if x == UIA_TabItemControlTypeId.0 => "TabItem",
        x if x == UIA_TableControlTypeId.0 => "Table",
        x if x == UIA_TextControlTypeId.0 => "Text",
        x if x == UIA_ThumbControlTypeId.0 => "Thumb",
        x if x == UIA_TitleBarControlTypeId.0 => "TitleBar",
        x if x == UIA_ToolBarControlTypeId.0 => "ToolBar",
        x if x == UIA_ToolTipControlTypeId.0 => "ToolTip",
        x if x == UIA_TreeControlTypeId.0 => "Tree",
        x if x == UIA_TreeItemControlTypeId.0 => "TreeItem",
        x if x == UIA_WindowControlTypeId.0 => "Window",
        _ => "Unknown",
    }
}

unsafe fn runtime_id_of(element: &IUIAutomationElement) -> Option<String> {
    let array = element.GetRuntimeId().ok()?;
    if array.is_null() {
        return None;
    }
    let bound = (*array).rgsabound[0];
    let data = (*array).pvData as *const i32;
    let parts: Vec<String> = (0..bound.cElements as usize)
        .map(|i| (*data.add(i)).to_string())
        .collect();
    let _ = SafeArrayDestroy(array);
    (!parts.is_empty()).then(|| parts.join("."))
}

unsafe fn pattern<T: Interface>(element: &IUIAutomationElement, id: UIA_PATTERN_ID) -> Option<T> {
    element.GetCurrentPattern(id).ok()?.cast::<T>().ok()
}

unsafe fn value_of(element: &IUIAutomationElement) -> Option<String> {
    pattern::<IUIAutomationValuePattern>(element, UIA_ValuePatternId)
        .and_then(|vp| vp.CurrentValue().ok())
        .map(|s| s.to_string())
}

/// Text as a reader sees it: the document, else the value, else the range
/// value, else the selected items, else the names rendered in the subtree.
unsafe fn text_of(automation: &IUIAutomation, element: &IUIAutomationElement) -> String {
    if let Some(text) = pattern::<IUIAutomationTextPattern>(element, UIA_TextPatternId)
        .and_then(|tp| tp.DocumentRange().ok())
        .and_then(|range| range.GetText(-1).ok())
    {
        return text.to_string();
    }
    if let Some(value) = value_of(element) {
        return value;
    }
    if let Some(value) = pattern::<IUIAutomationRangeValuePattern>(element, UIA_RangeValuePatternId)
        .and_then(|rp| rp.CurrentValue().ok())
    {
        return value.to_string();
    }
    if let Some(selection) = pattern::<IUIAutomationSelectionPattern>(element, UIA_SelectionPatternId) {
        let mut texts = Vec::new();
        if let Ok(selected) = selection.GetCurrentSelection() {
            for i in 0..selected.Length().unwrap_or(0) {
                if let Ok(item) = selected.GetElement(i) {
                    texts.push(text_of(automation, &item));
                }
            }
        }
        return texts.join(", ");
    }
    let mut out = String::new();
    rendered_text(automation, element, &mut out);
    out
}

unsafe fn rendered_text(automation: &IUIAutomation, element: &IUIAutomationElement, out: &mut String) {
    let name = element.CurrentName().map(|s| s.to_string()).unwrap_or_default();
    if !name.trim().is_empty() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(&name);
    }

    let Ok(condition) = automation.CreateTrueCondition() else {
        return;
    };
    let Ok(children) = element.FindAll(TreeScope_Children, &condition) else {
        return;
    };
    for i in 0..children.Length().unwrap_or(0) {
        let Ok(child) = children.GetElement(i) else {
            continue;
        };
        // a text block's content is already its parent's name
        let class_name = child.CurrentClassName().map(|s| s.to_string()).unwrap_or_default();
        if class_name != "TextBlock" {
            rendered_text(automation, &child, out);
        }
    }
}

unsafe fn rect_of(element: &IUIAutomationElement) -> Result<Rect> {
    let rect = element
        .CurrentBoundingRectangle()
        .map_err(|e| anyhow!("Failed to get bounding rect: {}", e))?;
    Ok(Rect::new(
        rect.left as f64,
        rect.top as f64,
        (rect.right - rect.left) as f64,
        (rect.bottom - rect.top) as f64,
    ))
}

unsafe fn matches(element: &IUIAutomationElement, locator: &Locator) -> bool {
    let text = |value: windows::core::Result<BSTR>| value.map(|s| s.to_string()).unwrap_or_default();
    let control_type = element.CurrentControlType().map(|c| c.0).unwrap_or(0);
    locator.matches(
        &text(element.CurrentAutomationId()),
        &text(element.CurrentName()),
        &text(element.CurrentClassName()),
        control_type_name(control_type),
    )
}

fn wrap(element: IUIAutomationElement) -> UiElement {
    let runtime_id = unsafe { runtime_id_of(&element) };
    UiElement::new(runtime_id, Uia(element))
}

fn unwrap(element: &UiElement) -> Result<Uia<IUIAutomationElement>> {
    element
        .native::<Uia<IUIAutomationElement>>()
        .cloned()
        .ok_or_else(|| anyhow!("Element was not produced by UI Automation"))
}

/// UI Automation client for one session.
pub struct UiaAutomation {
    automation: Uia<IUIAutomation>,
}

impl UiaAutomation {
    pub fn new() -> Result<Self> {
        init_com();
        let automation: IUIAutomation = unsafe {
            CoCreateInstance(&CUIAutomation, None, CLSCTX_ALL)
                .map_err(|e| anyhow!("Failed to create UIAutomation: {}", e))?
        };
        Ok(Self {
            automation: Uia(automation),
        })
    }

    async fn with_element<T, F>(&self, element: &UiElement, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&IUIAutomation, &IUIAutomationElement) -> Result<T> + Send + 'static,
    {
        let automation = self.automation.clone();
        let element = unwrap(element)?;
        blocking(move || f(&automation.0, &element.0)).await
    }

    async fn windows_of(&self, app: &AppHandle) -> Result<Vec<UiElement>> {
        let automation = self.automation.clone();
        let process_id = app.process_id;
        blocking(move || {
            let mut found = Vec::new();
            for window in enumerate_windows() {
                if window.process_id != process_id {
                    continue;
                }
                let hwnd = HWND(window.handle as isize as *mut _);
                if let Ok(element) = unsafe { automation.0.ElementFromHandle(hwnd) } {
                    found.push(wrap(element));
                }
            }
            Ok(found)
        })
        .await
    }

    async fn find(&self, root: &UiElement, locator: &Locator, first_only: bool) -> Result<Vec<UiElement>> {
        let locator = locator.clone();
        self.with_element(root, move |automation, root| unsafe {
            let condition = automation.CreateTrueCondition()?;
            let candidates = root.FindAll(TreeScope_Descendants, &condition)?;
            let count = candidates.Length().unwrap_or(0);

            let mut found = Vec::new();
            for i in 0..count {
                let Ok(candidate) = candidates.GetElement(i) else {
                    continue;
                };
                if matches(&candidate, &locator) {
                    found.push(wrap(candidate));
                    if first_only {
                        break;
                    }
                }
            }
            Ok(found)
        })
        .await
    }
}

#[async_trait]
impl Automation for UiaAutomation {
    async fn desktop(&self) -> Result<UiElement> {
        let automation = self.automation.clone();
        blocking(move || unsafe {
            automation
                .0
                .GetRootElement()
                .map(wrap)
                .map_err(|e| anyhow!("Failed to get root element: {}", e))
        })
        .await
    }

    async fn focused_element(&self) -> Result<UiElement> {
        let automation = self.automation.clone();
        blocking(move || unsafe {
            automation
                .0
                .GetFocusedElement()
                .map(wrap)
                .map_err(|e| anyhow!("Failed to get focused element: {}", e))
        })
        .await
    }

    async fn main_window(&self, app: &AppHandle, timeout: Duration) -> Result<Option<UiElement>> {
        crate::wait::until(
            timeout,
            || async { Ok::<_, anyhow::Error>(self.windows_of(app).await?.into_iter().next()) },
            Option::is_some,
        )
        .await
    }

    async fn top_level_windows(&self, app: &AppHandle) -> Result<Vec<UiElement>> {
        self.windows_of(app).await
    }

    async fn find_first(&self, root: &UiElement, locator: &Locator) -> Result<Option<UiElement>> {
        Ok(self.find(root, locator, true).await?.into_iter().next())
    }

    async fn find_all(&self, root: &UiElement, locator: &Locator) -> Result<Vec<UiElement>> {
        self.find(root, locator, false).await
    }

    async fn is_same(&self, a: &UiElement, b: &UiElement) -> Result<bool> {
        let other = unwrap(b)?;
        self.with_element(a, move |automation, element| unsafe {
            automation
                .CompareElements(element, &other.0)
                .map(|same| same.as_bool())
                .map_err(|e| anyhow!("Failed to compare elements: {}", e))
        })
        .await
    }

    async fn is_available(&self, element: &UiElement) -> Result<bool> {
        self.with_element(element, |_, element| unsafe {
            Ok(element.CurrentProcessId().is_ok())
        })
        .await
    }

    async fn bounding_rect(&self, element: &UiElement) -> Result<Rect> {
        self.with_element(element, |_, element| unsafe { rect_of(element) })
            .await
    }

    async fn property(
        &self,
        element: &UiElement,
        property: ElementProperty,
    ) -> Result<Option<Value>> {
        self.with_element(element, move |_, element| unsafe {
            let text = |value: windows::core::Result<BSTR>| value.ok().map(|s| json!(s.to_string()));
            let flag = |value: windows::core::Result<BOOL>| value.ok().map(|b| json!(b.as_bool()));

            let value = match property {
                ElementProperty::Name => text(element.CurrentName()),
                ElementProperty::AutomationId => text(element.CurrentAutomationId()),
                ElementProperty::ClassName => text(element.CurrentClassName()),
                ElementProperty::FrameworkId => text(element.CurrentFrameworkId()),
                ElementProperty::HelpText => text(element.CurrentHelpText()),
                ElementProperty::LocalizedControlType => {
                    text(element.CurrentLocalizedControlType())
                }
                ElementProperty::ControlType => element
                    .CurrentControlType()
                    .ok()
                    .map(|c| json!(control_type_name(c.0))),
                ElementProperty::ProcessId => element.CurrentProcessId().ok().map(|p| json!(p)),
                ElementProperty::NativeWindowHandle => element
                    .CurrentNativeWindowHandle()
                    .ok()
                    .filter(|h| !h.0.is_null())
                    .map(|h| json!(h.0 as isize)),
                ElementProperty::RuntimeId => runtime_id_of(element).map(|id| json!(id)),
                ElementProperty::BoundingRectangle => rect_of(element).ok().map(|r| json!(r)),
                ElementProperty::IsEnabled => flag(element.CurrentIsEnabled()),
                ElementProperty::IsOffscreen => flag(element.CurrentIsOffscreen()),
                ElementProperty::IsKeyboardFocusable => flag(element.CurrentIsKeyboardFocusable()),
                ElementProperty::HasKeyboardFocus => flag(element.CurrentHasKeyboardFocus()),
                ElementProperty::ValueValue => value_of(element).map(|v| json!(v)),
                ElementProperty::ValueIsReadOnly => {
                    pattern::<IUIAutomationValuePattern>(element, UIA_ValuePatternId)
                        .and_then(|vp| flag(vp.CurrentIsReadOnly()))
                }
                ElementProperty::ToggleState => {
                    pattern::<IUIAutomationTogglePattern>(element, UIA_TogglePatternId)
                        .and_then(|tp| tp.CurrentToggleState().ok())
                        .map(|state| match state.0 {
                            0 => json!("Off"),
                            1 => json!("On"),
                            _ => json!("Indeterminate"),
                        })
                }
                ElementProperty::SelectionItemIsSelected => {
                    pattern::<IUIAutomationSelectionItemPattern>(element, UIA_SelectionItemPatternId)
                        .and_then(|sp| flag(sp.CurrentIsSelected()))
                }
                ElementProperty::ExpandCollapseState => {
                    pattern::<IUIAutomationExpandCollapsePattern>(
                        element,
                        UIA_ExpandCollapsePatternId,
                    )
                    .and_then(|ep| ep.CurrentExpandCollapseState().ok())
                    .map(|state| match state.0 {
                        0 => json!("Collapsed"),
                        1 => json!("Expanded"),
                        2 => json!("PartiallyExpanded"),
                        _ => json!("LeafNode"),
                    })
                }
                ElementProperty::RangeValueValue => {
                    pattern::<IUIAutomationRangeValuePattern>(element, UIA_RangeValuePatternId)
                        .and_then(|rp| rp.CurrentValue().ok())
                        .map(|v| json!(v))
                }
            };
            Ok(value)
        })
        .await
    }

    async fn text(&self, element: &UiElement) -> Result<String> {
        self.with_element(element, |automation, element| unsafe {
            Ok(text_of(automation, element))
        })
        .await
    }

    async fn is_offscreen(&self, element: &UiElement) -> Result<bool> {
        self.with_element(element, |_, element| unsafe {
            element
                .CurrentIsOffscreen()
                .map(|b| b.as_bool())
                .map_err(|e| anyhow!("Failed to read IsOffscreen: {}", e))
        })
        .await
    }

    async fn scroll_into_view(&self, element: &UiElement) -> Result<()> {
        self.with_element(element, |_, element| unsafe {
            if let Some(scroll) =
                pattern::<IUIAutomationScrollItemPattern>(element, UIA_ScrollItemPatternId)
            {
                scroll
                    .ScrollIntoView()
                    .map_err(|e| anyhow!("Failed to scroll into view: {}", e))?;
            }
            Ok(())
        })
        .await
    }

    async fn focus(&self, element: &UiElement) -> Result<()> {
        self.with_element(element, |_, element| unsafe {
            element
                .SetFocus()
                .map_err(|e| anyhow!("Failed to focus element: {}", e))
        })
        .await
    }

    async fn clear(&self, element: &UiElement) -> Result<()> {
        self.with_element(element, |_, element| unsafe {
            let value = pattern::<IUIAutomationValuePattern>(element, UIA_ValuePatternId)
                .ok_or_else(|| anyhow!("Element does not support ValuePattern"))?;
            value
                .SetValue(&BSTR::new())
                .map_err(|e| anyhow!("Failed to clear value: {}", e))
        })
        .await
    }
}
