use egui::{Pos2, Vec2, pos2, vec2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WidgetId(u64);

impl WidgetId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for WidgetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Scroll key used by scrollable containers that have no tabs.
pub const UNTABBED_SCROLL_KEY: &str = "";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "t", content = "c")]
pub enum WidgetKind {
    Label,
    Button,
    Checkbox,
    TextEdit,
    TextArea,
    Slider,
    ProgressBar,
    ComboBox,
    RadioGroup,
    Image,
    Separator,
    ToolBar,
    Group,
    Panel,
    ScrollBox,
    TabControl,
}

/// Static facts about a widget kind, resolved without any string lookup.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WidgetDescriptor {
    pub display_name: &'static str,
    /// Prefix for generated element names (`button1`, `panel3`, ...).
    pub name_prefix: &'static str,
    pub container: bool,
    pub tabbed: bool,
    pub scrollable: bool,
    /// Whether a finished move may change the element's parent container.
    pub reparentable: bool,
    pub default_size: Vec2,
}

impl WidgetDescriptor {
    const fn control(display_name: &'static str, name_prefix: &'static str, size: Vec2) -> Self {
        Self {
            display_name,
            name_prefix,
            container: false,
            tabbed: false,
            scrollable: false,
            reparentable: true,
            default_size: size,
        }
    }

    const fn container(display_name: &'static str, name_prefix: &'static str, size: Vec2) -> Self {
        Self {
            container: true,
            ..Self::control(display_name, name_prefix, size)
        }
    }
}

impl WidgetKind {
    pub const ALL: [WidgetKind; 16] = [
        WidgetKind::Label,
        WidgetKind::Button,
        WidgetKind::Checkbox,
        WidgetKind::TextEdit,
        WidgetKind::TextArea,
        WidgetKind::Slider,
        WidgetKind::ProgressBar,
        WidgetKind::ComboBox,
        WidgetKind::RadioGroup,
        WidgetKind::Image,
        WidgetKind::Separator,
        WidgetKind::ToolBar,
        WidgetKind::Group,
        WidgetKind::Panel,
        WidgetKind::ScrollBox,
        WidgetKind::TabControl,
    ];

    pub const fn descriptor(&self) -> WidgetDescriptor {
        use WidgetDescriptor as D;
        match self {
            WidgetKind::Label => D::control("Label", "label", vec2(140.0, 24.0)),
            WidgetKind::Button => D::control("Button", "button", vec2(120.0, 32.0)),
            WidgetKind::Checkbox => D::control("Checkbox", "checkbox", vec2(160.0, 28.0)),
            WidgetKind::TextEdit => D::control("TextEdit", "textEdit", vec2(220.0, 36.0)),
            WidgetKind::TextArea => D::control("Text Area", "textArea", vec2(280.0, 120.0)),
            WidgetKind::Slider => D::control("Slider", "slider", vec2(220.0, 24.0)),
            WidgetKind::ProgressBar => D::control("Progress Bar", "progress", vec2(220.0, 20.0)),
            WidgetKind::ComboBox => D::control("Combo Box", "comboBox", vec2(220.0, 28.0)),
            WidgetKind::RadioGroup => D::control("Radio Group", "radioGroup", vec2(200.0, 80.0)),
            WidgetKind::Image => D::control("Image", "image", vec2(150.0, 150.0)),
            WidgetKind::Separator => D::control("Separator", "separator", vec2(220.0, 20.0)),
            WidgetKind::ToolBar => WidgetDescriptor {
                reparentable: false,
                ..D::control("Tool Bar", "toolBar", vec2(400.0, 32.0))
            },
            WidgetKind::Group => D::container("Group", "group", vec2(250.0, 150.0)),
            WidgetKind::Panel => D::container("Panel", "panel", vec2(300.0, 200.0)),
            WidgetKind::ScrollBox => WidgetDescriptor {
                scrollable: true,
                ..D::container("Scroll Box", "scrollBox", vec2(240.0, 180.0))
            },
            WidgetKind::TabControl => WidgetDescriptor {
                tabbed: true,
                scrollable: true,
                ..D::container("Tab Control", "tabs", vec2(320.0, 220.0))
            },
        }
    }

    pub const fn default_size(&self) -> Vec2 {
        self.descriptor().default_size
    }

    pub const fn is_container(&self) -> bool {
        self.descriptor().container
    }

    pub const fn is_tabbed(&self) -> bool {
        self.descriptor().tabbed
    }

    /// Returns the default properties for a widget of this kind.
    pub fn default_props(&self) -> WidgetProps {
        match self {
            WidgetKind::Label => WidgetProps {
                text: "Label".into(),
                ..Default::default()
            },
            WidgetKind::Button => WidgetProps {
                text: "Button".into(),
                ..Default::default()
            },
            WidgetKind::Checkbox => WidgetProps {
                text: "Checkbox".into(),
                ..Default::default()
            },
            WidgetKind::TextEdit => WidgetProps {
                text: "Type here".into(),
                ..Default::default()
            },
            WidgetKind::TextArea => WidgetProps {
                text: "Multi-line\ntext here".into(),
                ..Default::default()
            },
            WidgetKind::Slider => WidgetProps {
                text: "Value".into(),
                min: 0.0,
                max: 100.0,
                value: 42.0,
                ..Default::default()
            },
            WidgetKind::ProgressBar => WidgetProps {
                text: "".into(),
                value: 0.25,
                ..Default::default()
            },
            WidgetKind::ComboBox => WidgetProps {
                text: "Choose one".into(),
                items: vec!["Red".into(), "Green".into(), "Blue".into()],
                ..Default::default()
            },
            WidgetKind::RadioGroup => WidgetProps {
                text: "Radio Group".into(),
                items: vec!["Option A".into(), "Option B".into(), "Option C".into()],
                ..Default::default()
            },
            WidgetKind::Image => WidgetProps {
                text: "image.png".into(),
                ..Default::default()
            },
            WidgetKind::Separator => WidgetProps {
                text: "".into(),
                ..Default::default()
            },
            WidgetKind::ToolBar => WidgetProps {
                text: "Tools".into(),
                items: vec!["New".into(), "Open".into(), "Save".into()],
                ..Default::default()
            },
            WidgetKind::Group => WidgetProps {
                text: "Group".into(),
                ..Default::default()
            },
            WidgetKind::Panel => WidgetProps {
                text: "".into(),
                ..Default::default()
            },
            WidgetKind::ScrollBox => {
                let mut p = WidgetProps {
                    text: "".into(),
                    ..Default::default()
                };
                p.scroll.insert(UNTABBED_SCROLL_KEY.into(), Vec2::ZERO);
                p
            }
            WidgetKind::TabControl => {
                let mut p = WidgetProps {
                    text: "".into(),
                    items: vec!["tab1".into(), "tab2".into()],
                    selected: 0,
                    ..Default::default()
                };
                for tab in &p.items {
                    p.scroll.insert(tab.clone(), Vec2::ZERO);
                }
                p
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WidgetProps {
    pub text: String,  // label/button caption
    pub checked: bool, // checkbox
    pub value: f32,    // slider/progress
    pub min: f32,
    pub max: f32,
    // lists (radio/combobox items, tab ids for tab controls)
    pub items: Vec<String>,
    pub selected: usize,
    pub tooltip: String,
    pub enabled: bool,
    // scrolled amount per tab id
    pub scroll: BTreeMap<String, Vec2>,
}

impl Default for WidgetProps {
    fn default() -> Self {
        Self {
            text: "Label".into(),
            checked: false,
            value: 0.5,
            min: 0.0,
            max: 1.0,
            items: vec![],
            selected: 0,
            tooltip: String::new(),
            enabled: true,
            scroll: BTreeMap::new(),
        }
    }
}

pub fn snap_pos_with_grid(p: Pos2, grid: f32) -> Pos2 {
    if grid <= 1.0 {
        return p;
    }
    pos2((p.x / grid).round() * grid, (p.y / grid).round() * grid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use egui::pos2;

    #[test]
    fn test_snap_pos_with_grid() {
        assert_eq!(snap_pos_with_grid(pos2(5.0, 5.0), 10.0), pos2(10.0, 10.0));
        assert_eq!(snap_pos_with_grid(pos2(4.9, 4.9), 10.0), pos2(0.0, 0.0));
        assert_eq!(snap_pos_with_grid(pos2(15.0, 25.0), 10.0), pos2(20.0, 30.0));
        assert_eq!(snap_pos_with_grid(pos2(12.0, 20.0), 8.0), pos2(16.0, 24.0));

        // Grid of 1 leaves fractional positions alone
        assert_eq!(snap_pos_with_grid(pos2(5.4, 3.6), 1.0), pos2(5.4, 3.6));
    }

    #[test]
    fn test_widget_kind_default_size() {
        for kind in WidgetKind::ALL {
            let size = kind.default_size();
            assert!(size.x >= 20.0, "{:?} should be at least 20 wide", kind);
            assert!(size.y >= 20.0, "{:?} should be at least 20 high", kind);
        }
    }

    #[test]
    fn test_descriptor_flags() {
        assert!(WidgetKind::Panel.is_container());
        assert!(!WidgetKind::Button.is_container());
        assert!(WidgetKind::TabControl.is_tabbed());
        assert!(!WidgetKind::ScrollBox.is_tabbed());
        assert!(WidgetKind::ScrollBox.descriptor().scrollable);
        assert!(!WidgetKind::ToolBar.descriptor().reparentable);
        assert!(WidgetKind::Label.descriptor().reparentable);
    }

    #[test]
    fn test_tab_control_default_props() {
        let props = WidgetKind::TabControl.default_props();
        assert_eq!(props.items, vec!["tab1".to_string(), "tab2".to_string()]);
        assert_eq!(props.selected, 0);
        assert_eq!(props.scroll.len(), 2);
    }

    #[test]
    fn test_widget_kind_default_props() {
        assert_eq!(WidgetKind::Label.default_props().text, "Label");
        assert_eq!(WidgetKind::Button.default_props().text, "Button");

        let slider_props = WidgetKind::Slider.default_props();
        assert!(slider_props.min < slider_props.max);
        assert!(slider_props.value >= slider_props.min);
        assert!(slider_props.value <= slider_props.max);

        let combobox_props = WidgetKind::ComboBox.default_props();
        assert!(!combobox_props.items.is_empty());
        assert!(combobox_props.selected < combobox_props.items.len());
    }

    #[test]
    fn test_widget_id_display() {
        let id = WidgetId::new(42);
        assert_eq!(format!("{}", id), "42");
        assert_eq!(id.get(), 42);
    }
}
