//! Closed table of readable element properties.
//!
//! Attribute names arrive as strings on the wire (`Name`, `Toggle.ToggleState`);
//! only the names listed here are resolved, everything else reads as absent.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementProperty {
    Name,
    AutomationId,
    ClassName,
    ControlType,
    LocalizedControlType,
    FrameworkId,
    HelpText,
    ProcessId,
    NativeWindowHandle,
    RuntimeId,
    BoundingRectangle,
    IsEnabled,
    IsOffscreen,
    IsKeyboardFocusable,
    HasKeyboardFocus,
    ValueValue,
    ValueIsReadOnly,
    ToggleState,
    SelectionItemIsSelected,
    ExpandCollapseState,
    RangeValueValue,
}

const PROPERTY_NAMES: &[(&str, ElementProperty)] = &[
    ("Name", ElementProperty::Name),
    ("AutomationId", ElementProperty::AutomationId),
    ("ClassName", ElementProperty::ClassName),
    ("ControlType", ElementProperty::ControlType),
    ("LocalizedControlType", ElementProperty::LocalizedControlType),
    ("FrameworkId", ElementProperty::FrameworkId),
    ("HelpText", ElementProperty::HelpText),
    ("ProcessId", ElementProperty::ProcessId),
    ("NativeWindowHandle", ElementProperty::NativeWindowHandle),
    ("RuntimeId", ElementProperty::RuntimeId),
    ("BoundingRectangle", ElementProperty::BoundingRectangle),
    ("IsEnabled", ElementProperty::IsEnabled),
    ("IsOffscreen", ElementProperty::IsOffscreen),
    ("IsKeyboardFocusable", ElementProperty::IsKeyboardFocusable),
    ("HasKeyboardFocus", ElementProperty::HasKeyboardFocus),
    ("Value.Value", ElementProperty::ValueValue),
    ("Value.IsReadOnly", ElementProperty::ValueIsReadOnly),
    ("Toggle.ToggleState", ElementProperty::ToggleState),
    ("SelectionItem.IsSelected", ElementProperty::SelectionItemIsSelected),
    (
        "ExpandCollapse.ExpandCollapseState",
        ElementProperty::ExpandCollapseState,
    ),
    ("RangeValue.Value", ElementProperty::RangeValueValue),
];

impl ElementProperty {
    pub fn parse(name: &str) -> Option<Self> {
        PROPERTY_NAMES
            .iter()
            .find(|(candidate, _)| candidate.eq_ignore_ascii_case(name))
            .map(|(_, property)| *property)
    }

    pub fn as_str(self) -> &'static str {
        PROPERTY_NAMES
            .iter()
            .find(|(_, property)| *property == self)
            .map(|(name, _)| *name)
            .unwrap_or("Unknown")
    }
}
