use crate::documents::Document;

/// Turns a fully-built document into text.
///
/// Implementations get a document whose every value is already final;
/// they must not resolve expressions or make decisions about content.
pub trait TemplateRenderer: Send + Sync {
    fn render(&self, template: &str, document: &Document) -> Result<String, RenderError>;
}

/// Renders documents as YAML.
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlRenderer;

impl TemplateRenderer for YamlRenderer {
    fn render(&self, template: &str, document: &Document) -> Result<String, RenderError> {
        serde_yaml::to_string(document).map_err(|e| RenderError {
            template: template.to_owned(),
            detail: e.to_string(),
        })
    }
}

#[derive(Debug, thiserror::Error)]
#[error("failed to render {template} document: {detail}")]
pub struct RenderError {
    pub template: String,
    pub detail: String,
}
