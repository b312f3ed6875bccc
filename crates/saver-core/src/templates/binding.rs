//! Placeholder bindings for one build run

use super::manifest::TemplateManifest;
use crate::request::BuildRequest;
use std::collections::{BTreeMap, HashSet};
use uuid::Uuid;

/// Placeholder token -> substitution value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateBinding {
    values: BTreeMap<String, String>,
}

impl TemplateBinding {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bindings for a request: names, staged video file name and one fresh
    /// identifier per placeholder listed in the manifest
    pub fn for_request(
        manifest: &TemplateManifest,
        project_name: &str,
        request: &BuildRequest,
    ) -> Self {
        let video_file = match request.video_extension() {
            Some(ext) => format!("video.{}", ext),
            None => "video".to_string(),
        };

        let mut binding = Self::new()
            .with("TARGET_NAME", request.target_name())
            .with("PRODUCT_NAME", request.display_name())
            .with("PROJECT_NAME", project_name)
            .with("VIDEO_FILE", video_file);

        let mut issued = HashSet::new();
        for placeholder in &manifest.identifiers {
            let id = loop {
                let candidate = generate_identifier();
                if issued.insert(candidate.clone()) {
                    break candidate;
                }
            };
            binding.insert(placeholder.clone(), id);
        }

        binding
    }

    pub fn with(mut self, token: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(token, value);
        self
    }

    pub fn insert(&mut self, token: impl Into<String>, value: impl Into<String>) {
        self.values.insert(token.into(), value.into());
    }

    pub fn get(&self, token: &str) -> Option<&str> {
        self.values.get(token).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Replace every `{{token}}` marker with its bound value; unknown markers stay as-is
    pub fn render(&self, template: &str) -> String {
        let mut rendered = template.to_string();
        for (token, value) in &self.values {
            let marker = format!("{{{{{}}}}}", token);
            if rendered.contains(&marker) {
                rendered = rendered.replace(&marker, value);
            }
        }
        rendered
    }
}

/// 24 uppercase hex digits, the shape Xcode uses for project object ids
pub fn generate_identifier() -> String {
    let hex = Uuid::new_v4().simple().to_string().to_uppercase();
    hex[8..].to_string()
}
