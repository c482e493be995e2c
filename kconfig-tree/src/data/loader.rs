use std::{collections::HashSet, fs, path::Path};

use serde::Deserialize;

use crate::{
    data::{
        error::ModelError,
        node::{ConfigNode, NodeKind, NodeRange, NodeValue},
    },
    help::format_help_text,
};

/// Entry of the backend-generated `kconfig_menus.json`.
#[derive(Debug, Deserialize)]
struct MenuEntry {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(rename = "type")]
    kind: NodeKind,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    help: Option<String>,
    #[serde(default)]
    range: Option<NodeRange>,
    #[serde(default)]
    depends_on: Option<String>,
    #[serde(default)]
    is_menuconfig: bool,
    #[serde(default)]
    children: Vec<MenuEntry>,
}

impl From<MenuEntry> for ConfigNode {
    fn from(entry: MenuEntry) -> Self {
        ConfigNode {
            id: entry.id,
            name: entry.name.unwrap_or_default(),
            kind: entry.kind,
            title: entry.title.unwrap_or_default(),
            help: entry
                .help
                .as_deref()
                .map(format_help_text)
                .unwrap_or_default(),
            value: NodeValue::Unset,
            visible: false,
            range: entry.range,
            depends_on: entry.depends_on.filter(|s| !s.trim().is_empty()),
            is_menuconfig: entry.is_menuconfig,
            children: entry.children.into_iter().map(ConfigNode::from).collect(),
        }
    }
}

/// Build a forest from the backend's structure description.
///
/// Dynamic state (values, visibility) starts empty and is filled in by
/// merging snapshots.
pub fn parse_menus(json: &str) -> Result<Vec<ConfigNode>, ModelError> {
    let entries: Vec<MenuEntry> = serde_json::from_str(json)?;
    let nodes: Vec<ConfigNode> = entries.into_iter().map(ConfigNode::from).collect();

    let mut seen = HashSet::new();
    for node in crate::data::node::walk(&nodes) {
        if !seen.insert(node.id.as_str()) {
            return Err(ModelError::DuplicateId(node.id.clone()));
        }
    }
    debug!("loaded {} option nodes", seen.len());
    Ok(nodes)
}

/// Read and parse a `kconfig_menus.json` file.
pub fn load_menus(path: &Path) -> Result<Vec<ConfigNode>, ModelError> {
    let content = fs::read_to_string(path).map_err(|source| ModelError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_menus(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MENUS: &str = r#"[
        {
            "id": "component-config",
            "name": null,
            "type": "menu",
            "title": "Component config",
            "help": null,
            "depends_on": null,
            "range": null,
            "children": [
                {
                    "id": "ESP_CONSOLE_UART_BAUDRATE",
                    "name": "ESP_CONSOLE_UART_BAUDRATE",
                    "type": "int",
                    "title": "UART console baud rate",
                    "help": "Baud rate.\n\nSee ``uart_param_config``.",
                    "depends_on": "ESP_CONSOLE_UART_CUSTOM",
                    "range": [1200, 4000000],
                    "children": []
                },
                {
                    "id": "ESP_TASK_WDT",
                    "name": "ESP_TASK_WDT",
                    "type": "menu",
                    "is_menuconfig": true,
                    "title": "Task watchdog",
                    "children": []
                }
            ]
        }
    ]"#;

    #[test]
    fn parses_structure() {
        let tree = parse_menus(MENUS).unwrap();
        assert_eq!(tree.len(), 1);
        let menu = &tree[0];
        assert_eq!(menu.kind, NodeKind::Menu);
        assert!(menu.name.is_empty());
        assert!(!menu.is_editable());

        let baud = &menu.children[0];
        assert_eq!(baud.range, Some(NodeRange(1200, 4000000)));
        assert_eq!(baud.depends_on.as_deref(), Some("ESP_CONSOLE_UART_CUSTOM"));
        assert_eq!(baud.help, "Baud rate.<br><br>See <span>uart_param_config</span>.");
        assert_eq!(baud.value, NodeValue::Unset);
        assert!(!baud.visible);

        assert!(menu.children[1].is_menuconfig);
        assert!(menu.children[1].is_editable());
    }

    #[test]
    fn rejects_duplicate_ids() {
        let json = r#"[
            {"id": "A", "name": "A", "type": "bool"},
            {"id": "M", "type": "menu", "children": [{"id": "A", "name": "A", "type": "bool"}]}
        ]"#;
        assert!(matches!(parse_menus(json), Err(ModelError::DuplicateId(id)) if id == "A"));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kconfig_menus.json");
        fs::write(&path, MENUS).unwrap();
        assert_eq!(load_menus(&path).unwrap().len(), 1);

        let missing = load_menus(&dir.path().join("missing.json"));
        assert!(matches!(missing, Err(ModelError::Io { .. })));
    }
}
