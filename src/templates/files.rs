//! Template file import/export (`.json`, `.yaml`).

use jsonschema::JSONSchema;
use lazy_static::lazy_static;
use serde_json::{json, Value};

use crate::error::{ConsoleError, Result};
use crate::models::{ApiTemplateRecord, Template, TemplateBody};

use super::convert::convert_api_template;
use super::create::{new_custom_id, validate_template_name};

lazy_static! {
    // Only the parts every accepted document shares; everything else is
    // normalized leniently afterwards.
    static ref TEMPLATE_FILE_SCHEMA: JSONSchema = {
        let schema = json!({
            "type": "object",
            "required": ["name"],
            "properties": {
                "name": { "type": "string", "minLength": 1 },
                "template_type": { "type": "string" },
                "nodes": { "type": "array" },
                "edges": { "type": "array" }
            }
        });
        JSONSchema::compile(&schema).expect("valid template file schema")
    };
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileFormat {
    Json,
    Yaml,
}

impl FileFormat {
    pub fn from_file_name(name: &str) -> Option<Self> {
        let lowered = name.to_ascii_lowercase();
        if lowered.ends_with(".json") {
            Some(FileFormat::Json)
        } else if lowered.ends_with(".yaml") || lowered.ends_with(".yml") {
            Some(FileFormat::Yaml)
        } else {
            None
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            FileFormat::Json => "json",
            FileFormat::Yaml => "yaml",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            FileFormat::Json => "application/json",
            FileFormat::Yaml => "application/x-yaml",
        }
    }
}

/// Serialize a template in the editor shape.
pub fn export_template(template: &Template, format: FileFormat) -> Result<String> {
    validate_template_name(&template.name)?;
    Ok(match format {
        FileFormat::Json => serde_json::to_string_pretty(template)?,
        FileFormat::Yaml => serde_yaml::to_string(template)?,
    })
}

fn looks_like_backend_record(doc: &Value) -> bool {
    ["agents_data", "connections_data", "template_data"]
        .iter()
        .any(|key| doc.get(*key).is_some())
}

/// Parse a template file. Both the editor shape and the backend record shape
/// are accepted; the result is always marked as a custom template.
pub fn import_template(raw: &str, format: FileFormat) -> Result<Template> {
    let doc: Value = match format {
        FileFormat::Json => serde_json::from_str(raw)?,
        FileFormat::Yaml => serde_yaml::from_str(raw)?,
    };

    if let Err(errors) = TEMPLATE_FILE_SCHEMA.validate(&doc) {
        let reasons: Vec<String> = errors.map(|e| e.to_string()).collect();
        return Err(ConsoleError::Validation(format!(
            "Invalid template file: {}",
            reasons.join("; ")
        )));
    }

    let mut template = if looks_like_backend_record(&doc) {
        let record: ApiTemplateRecord = serde_json::from_value(doc)?;
        convert_api_template(&record)
    } else {
        match serde_json::from_value::<Template>(doc.clone()) {
            Ok(template) => template,
            Err(e) => {
                log::warn!("Template file is not in editor shape ({}), normalizing", e);
                let record: ApiTemplateRecord = serde_json::from_value(doc)?;
                convert_api_template(&record)
            }
        }
    };

    // Editor-shape files bypass the converter, so clamp here as well.
    if let TemplateBody::Agent { nodes, .. } = &mut template.body {
        for node in nodes.iter_mut() {
            node.data = std::mem::take(&mut node.data).normalized();
        }
    }
    if template.id.trim().is_empty() {
        template.id = new_custom_id();
    }
    template.is_custom = true;
    Ok(template)
}
