use crate::{
    field::{FieldDescriptor, FieldKind},
    populate::Populate,
};
use std::{fs, path::Path};

/// Render a Markdown summary of every variable a record reads
///
/// Nested records are flattened, their fields named with a dotted path.
pub fn render_docs<T: Populate>() -> String {
    let mut md = String::new();

    md.push_str("## Environment Variables Summary\n\n");
    md.push_str("| Variable | Required | Type | Description | Default |\n");
    md.push_str("|----------|----------|------|-------------|---------|\n");
    push_rows(&mut md, "", T::FIELDS);

    md
}

/// Write configuration documentation to a markdown file
///
/// # Example
/// ```no_run
/// use layered_env::{Populate, write_docs};
///
/// #[derive(Default, Populate)]
/// struct Config {
///     #[env(key = "PORT", default = "8080", doc = "Server port")]
///     port: u16,
/// }
///
/// write_docs::<Config>("CONFIG.md").unwrap();
/// ```
pub fn write_docs<T: Populate>(path: impl AsRef<Path>) -> std::io::Result<()> {
    fs::write(path, render_docs::<T>())
}

fn push_rows(md: &mut String, prefix: &str, fields: &[FieldDescriptor]) {
    for field in fields {
        let name = if prefix.is_empty() {
            field.name.to_string()
        } else {
            format!("{}.{}", prefix, field.name)
        };

        match field.kind {
            FieldKind::Record(nested) => push_rows(md, &name, nested),
            FieldKind::Value => {
                let required_str = if field.forced { "Yes" } else { "No" };
                let description = if field.description.is_empty() {
                    name.as_str()
                } else {
                    field.description
                };
                let default_display = match field.default {
                    Some(default) if !default.is_empty() => default,
                    _ => "-",
                };
                md.push_str(&format!(
                    "| {} | {} | `{}` | {} | {} |\n",
                    field.key,
                    required_str,
                    field.type_name,
                    escape_cell(description),
                    escape_cell(default_display)
                ));
            }
        }
    }
}

/// Keep free text inside a single table cell
fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
        .replace("\r\n", "<br>")
        .replace('\n', "<br>")
}
