//! Version comparison between the builder and its template

use semver::Version;

/// Compare the builder version against the version a template declares.
/// Returns a warning when the template expects a newer builder.
pub fn check_compatibility(builder_version: &str, template_version: &str) -> Option<String> {
    // Unparseable versions can't be compared; skip the warning
    let builder = parse_version(builder_version)?;
    let template = parse_version(template_version)?;

    if builder < template {
        Some(format!(
            "Template targets builder version {} or newer; this is {}. \
             Rendered projects may not build.",
            template_version, builder_version
        ))
    } else {
        None
    }
}

/// Parse a version string, tolerating a leading `v`
fn parse_version(version: &str) -> Option<Version> {
    let cleaned = version.trim();
    let cleaned = cleaned.strip_prefix('v').unwrap_or(cleaned);
    Version::parse(cleaned).ok()
}
