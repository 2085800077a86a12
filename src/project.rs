use crate::tree::{ElementNode, ElementTree};
use egui::{Vec2, vec2};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid project file: {0}")]
    Json(#[from] serde_json::Error),
}

/// On-disk form: canvas size plus every element in pre-order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub canvas_size: Vec2,
    #[serde(default)]
    pub elements: Vec<ElementNode>,
}

impl Default for Project {
    fn default() -> Self {
        Self {
            canvas_size: vec2(800.0, 600.0),
            elements: Vec::new(),
        }
    }
}

impl Project {
    pub fn from_tree(tree: &ElementTree, canvas_size: Vec2) -> Self {
        Self {
            canvas_size,
            elements: tree.to_elements(),
        }
    }

    pub fn into_tree(self) -> ElementTree {
        ElementTree::from_elements(self.elements)
    }

    pub fn to_json(&self) -> Result<String, ProjectError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, ProjectError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ProjectError> {
        let json = self.to_json()?;
        std::fs::write(path, json).map_err(|source| ProjectError::Io {
            path: path.to_owned(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ProjectError> {
        let json = std::fs::read_to_string(path).map_err(|source| ProjectError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::from_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::tests::sample_tree;
    use crate::widget::WidgetId;

    #[test]
    fn test_json_keeps_structure() {
        let tree = sample_tree();
        let json = Project::from_tree(&tree, vec2(640.0, 480.0)).to_json().unwrap();
        let project = Project::from_json(&json).unwrap();
        assert_eq!(project.canvas_size, vec2(640.0, 480.0));

        let loaded = project.into_tree();
        assert_eq!(loaded.to_elements(), tree.to_elements());
        assert_eq!(
            loaded.children(Some(WidgetId::new(3))),
            &[WidgetId::new(4), WidgetId::new(5)]
        );
    }

    #[test]
    fn test_invalid_json_is_reported() {
        assert!(matches!(
            Project::from_json("{\"canvas_size\": 3}"),
            Err(ProjectError::Json(_))
        ));
    }

    #[test]
    fn test_save_and_load_file() {
        let path = std::env::temp_dir().join(format!("form-designer-{}.json", std::process::id()));
        let tree = sample_tree();
        Project::from_tree(&tree, vec2(800.0, 600.0)).save(&path).unwrap();
        let loaded = Project::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded.canvas_size, vec2(800.0, 600.0));
        assert_eq!(loaded.into_tree().to_elements(), tree.to_elements());
    }
}
