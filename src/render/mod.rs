use anyhow::{Context, Result};
use minijinja::{AutoEscape, Environment, UndefinedBehavior};
use serde::Serialize;
use std::path::Path;

fn environment<'source>() -> Environment<'source> {
    let mut env = Environment::new();
    env.set_auto_escape_callback(|_| AutoEscape::None);
    env.set_keep_trailing_newline(true);
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env
}

/// Substitute `ctx` into `source`. Output is plain text: nothing is
/// escaped and an unknown variable is an error.
pub fn render_str<S: Serialize>(name: &str, source: &str, ctx: S) -> Result<String> {
    let env = environment();
    let tmpl = env
        .template_from_named_str(name, source)
        .with_context(|| format!("Failed to load template {}", name))?;
    tmpl.render(ctx)
        .with_context(|| format!("Failed to render template {}", name))
}

/// Render `template` into `output`, replacing any existing file.
pub fn render_to_file<S: Serialize>(template: &Path, output: &Path, ctx: S) -> Result<String> {
    let source = std::fs::read_to_string(template)
        .with_context(|| format!("Failed to read template: {}", template.display()))?;

    let rendered = render_str(&template.display().to_string(), &source, ctx)?;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(output, &rendered)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    Ok(rendered)
}
