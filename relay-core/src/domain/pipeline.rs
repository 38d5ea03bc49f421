//! Pipeline domain types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Pipeline definition
///
/// An ordered sequence of stages plus the defaults they share. Stage order is
/// execution order. Immutable once constructed: a run never rewrites it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pipeline {
    pub name: String,
    /// Base directory used by every stage that doesn't set its own.
    pub default_base_dir: String,
    #[serde(default)]
    pub default_build_env: HashMap<String, String>,
    #[serde(default)]
    pub default_run_env: HashMap<String, String>,
    #[serde(default)]
    pub stages: Vec<Stage>,
    /// Stage invoked when any regular stage fails.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_handler: Option<Stage>,
}

/// A single unit of pipeline work, backed by an image built from `dir`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stage {
    pub name: String,
    /// Image context, relative to the base directory. Its final segment is the image tag.
    pub dir: String,
    /// Overrides the pipeline's default base directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_dir: Option<String>,
    #[serde(default)]
    pub build_env: HashMap<String, String>,
    #[serde(default)]
    pub run_env: HashMap<String, String>,
}

/// Structural problems in a pipeline definition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("pipeline name cannot be empty")]
    EmptyName,

    #[error("stage '{stage}' has an empty directory")]
    EmptyDir { stage: String },

    #[error("stage '{stage}' directory '{dir}' does not end in a usable image tag")]
    InvalidTag { stage: String, dir: String },

    #[error("error handler is configured but {0}")]
    Handler(Box<ValidationError>),
}

impl Pipeline {
    /// Checks the definition's shape without touching the filesystem
    ///
    /// Only what the executors depend on is checked: every stage directory must
    /// yield an image tag. A pipeline without stages is valid and only sets up and
    /// tears down the shared volume.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }

        for stage in &self.stages {
            stage.validate()?;
        }

        if let Some(handler) = &self.error_handler {
            handler
                .validate()
                .map_err(|e| ValidationError::Handler(Box::new(e)))?;
        }

        Ok(())
    }

    /// Resolves the directory a stage is built and run from
    ///
    /// The stage's own base directory wins over the pipeline default.
    pub fn stage_dir(&self, stage: &Stage) -> PathBuf {
        let base = stage
            .base_dir
            .as_deref()
            .filter(|dir| !dir.is_empty())
            .unwrap_or(&self.default_base_dir);

        Path::new(base).join(&stage.dir)
    }

    /// Identifier used in logs and error messages: `<pipeline>/<stage>`
    pub fn stage_id(&self, stage: &Stage) -> String {
        format!("{}/{}", self.name, stage.name)
    }
}

impl Stage {
    /// Image tag: the final path segment of the stage directory
    pub fn image_tag(&self) -> Option<&str> {
        image_tag(Path::new(&self.dir))
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.dir.is_empty() {
            return Err(ValidationError::EmptyDir {
                stage: self.name.clone(),
            });
        }

        if self.image_tag().is_none() {
            return Err(ValidationError::InvalidTag {
                stage: self.name.clone(),
                dir: self.dir.clone(),
            });
        }

        Ok(())
    }
}

/// Image tag for an image context directory: its final path segment
pub fn image_tag(dir: &Path) -> Option<&str> {
    dir.file_name()
        .and_then(|segment| segment.to_str())
        .filter(|segment| !segment.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(name: &str, dir: &str) -> Stage {
        Stage {
            name: name.to_string(),
            dir: dir.to_string(),
            ..Default::default()
        }
    }

    fn pipeline(stages: Vec<Stage>) -> Pipeline {
        Pipeline {
            name: "release".to_string(),
            default_base_dir: "/srv/release".to_string(),
            stages,
            ..Default::default()
        }
    }

    #[test]
    fn test_image_tag_is_last_segment() {
        assert_eq!(stage("collect", "stages/collect").image_tag(), Some("collect"));
        assert_eq!(stage("parse", "parse").image_tag(), Some("parse"));
        assert_eq!(stage("bad", "..").image_tag(), None);
        assert_eq!(
            image_tag(Path::new("/srv/release/stages/store")),
            Some("store")
        );
    }

    #[test]
    fn test_stage_dir_uses_default_base() {
        let p = pipeline(vec![stage("collect", "collect")]);
        assert_eq!(
            p.stage_dir(&p.stages[0]),
            PathBuf::from("/srv/release/collect")
        );
    }

    #[test]
    fn test_stage_dir_prefers_stage_base() {
        let mut s = stage("collect", "collect");
        s.base_dir = Some("/opt/other".to_string());
        let p = pipeline(vec![s]);
        assert_eq!(p.stage_dir(&p.stages[0]), PathBuf::from("/opt/other/collect"));
    }

    #[test]
    fn test_validate() {
        assert!(pipeline(vec![stage("collect", "collect")]).validate().is_ok());

        assert_eq!(
            pipeline(vec![stage("collect", "")]).validate(),
            Err(ValidationError::EmptyDir {
                stage: "collect".to_string()
            })
        );

        assert_eq!(
            pipeline(vec![stage("collect", "stages/..")]).validate(),
            Err(ValidationError::InvalidTag {
                stage: "collect".to_string(),
                dir: "stages/..".to_string()
            })
        );

        let mut unnamed = pipeline(vec![stage("collect", "collect"), stage(" ", "x")]);
        assert!(unnamed.validate().is_ok());

        unnamed.name = String::new();
        assert_eq!(unnamed.validate(), Err(ValidationError::EmptyName));
    }

    #[test]
    fn test_validate_accepts_empty_pipeline() {
        assert!(pipeline(vec![]).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_handler_without_dir() {
        let mut p = pipeline(vec![stage("collect", "collect")]);
        p.error_handler = Some(stage("store-error", ""));

        let err = p.validate().unwrap_err();
        assert!(matches!(err, ValidationError::Handler(_)));
        assert!(err.to_string().contains("store-error"));
    }

    #[test]
    fn test_deserialize_definition() {
        let json = r#"{
            "name": "release",
            "defaultBaseDir": "/srv/release",
            "defaultRunEnv": { "OUTPUT_FOLDER": "/output" },
            "stages": [
                { "name": "collect", "dir": "collect", "buildEnv": { "YEAR": "2021" } },
                { "name": "store", "dir": "store", "baseDir": "/opt/store" }
            ],
            "errorHandler": { "name": "store-error", "dir": "store-error" }
        }"#;

        let p: Pipeline = serde_json::from_str(json).unwrap();
        assert_eq!(p.stages.len(), 2);
        assert_eq!(p.stages[0].build_env.get("YEAR").map(String::as_str), Some("2021"));
        assert!(p.stages[1].run_env.is_empty());
        assert_eq!(p.stages[1].base_dir.as_deref(), Some("/opt/store"));
        assert_eq!(p.error_handler.as_ref().map(|h| h.name.as_str()), Some("store-error"));
        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_deserialize_without_handler() {
        let json =
            r#"{ "name": "release", "defaultBaseDir": ".", "stages": [{ "name": "a", "dir": "a" }] }"#;
        let p: Pipeline = serde_json::from_str(json).unwrap();
        assert!(p.error_handler.is_none());
    }
}
