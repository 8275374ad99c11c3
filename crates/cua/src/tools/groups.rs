use serde::{Deserialize, Serialize};
use serde_json::json;
use strum_macros::{Display, EnumIter, EnumString};

use crate::models::tool::Tool;

/// Which generation of computer use tools is advertised to the model
#[derive(
    EnumIter, EnumString, Display, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub enum ToolVersion {
    #[strum(serialize = "computer_use_20241022")]
    #[serde(rename = "computer_use_20241022")]
    ComputerUse20241022,
    #[strum(serialize = "computer_use_20250124")]
    #[serde(rename = "computer_use_20250124")]
    ComputerUse20250124,
    #[strum(serialize = "computer_use_20250429")]
    #[serde(rename = "computer_use_20250429")]
    ComputerUse20250429,
}

impl Default for ToolVersion {
    fn default() -> Self {
        ToolVersion::ComputerUse20250124
    }
}

/// The capability behind a declared tool, independent of its versioned name
#[derive(EnumIter, Display, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[strum(serialize_all = "lowercase")]
pub enum ToolKind {
    Computer,
    Bash,
    Edit,
}

/// Screen geometry advertised with the computer tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayConfig {
    pub width: u32,
    pub height: u32,
    /// X11 display number, when there is one
    #[serde(default)]
    pub display_number: Option<u32>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 768,
            display_number: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolGroup {
    pub version: ToolVersion,
    pub tools: Vec<(ToolKind, Tool)>,
    pub beta_flag: Option<&'static str>,
}

impl ToolGroup {
    pub fn new(version: ToolVersion, display: &DisplayConfig) -> Self {
        let (computer, editor, bash, beta_flag) = match version {
            ToolVersion::ComputerUse20241022 => (
                "computer_20241022",
                ("text_editor_20241022", "str_replace_editor"),
                "bash_20241022",
                "computer-use-2024-10-22",
            ),
            ToolVersion::ComputerUse20250124 => (
                "computer_20250124",
                ("text_editor_20250124", "str_replace_editor"),
                "bash_20250124",
                "computer-use-2025-01-24",
            ),
            ToolVersion::ComputerUse20250429 => (
                "computer_20250124",
                ("text_editor_20250429", "str_replace_based_edit_tool"),
                "bash_20250124",
                "computer-use-2025-01-24",
            ),
        };

        let mut computer_tool = Tool::builtin(computer, "computer")
            .with_option("display_width_px", json!(display.width))
            .with_option("display_height_px", json!(display.height));
        if let Some(number) = display.display_number {
            computer_tool = computer_tool.with_option("display_number", json!(number));
        }

        Self {
            version,
            tools: vec![
                (ToolKind::Computer, computer_tool),
                (ToolKind::Edit, Tool::builtin(editor.0, editor.1)),
                (ToolKind::Bash, Tool::builtin(bash, "bash")),
            ],
            beta_flag: Some(beta_flag),
        }
    }

    /// Name the model uses for a capability in this group
    pub fn name_of(&self, kind: ToolKind) -> Option<&str> {
        self.tools
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, tool)| tool.name())
    }
}
