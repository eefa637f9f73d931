//! Template normalizer.
//!
//! Converts between the backend's template records (flat columns plus JSON
//! blobs) and the node/edge shape the editors work with, builds new templates
//! from an in-memory graph and reads/writes template files. Malformed entries
//! are defaulted rather than rejected; only an unreadable document or a
//! missing name is an error.

mod convert;
mod create;
mod files;

pub use convert::{
    convert_api_template, convert_api_to_agent_template, convert_api_to_workflow_template,
    grid_position, template_to_api_record,
};
pub use create::{
    create_template_from_agent, create_template_from_workflow, infer_complexity, new_custom_id,
    validate_template_name,
};
pub use files::{export_template, import_template, FileFormat};
