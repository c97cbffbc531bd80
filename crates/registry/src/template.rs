// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command-template interpolation with shell-safe parameter sanitising.
//!
//! Templates are plain strings with two placeholder forms, `{name}` and
//! `${name}`. Substitution is literal: no nesting, no conditionals, no
//! arithmetic. Placeholders left unresolved after substitution stay in
//! the command verbatim so the container's own shell can expand
//! constructs like `${SUBJECTS_DIR}`.

use std::collections::HashMap;

/// Shell metacharacters stripped from every substituted value.
const DANGEROUS: &[char] = &[
    ';', '|', '&', '`', '$', '(', ')', '{', '}', '!', '>', '<', '\n', '\r',
];

/// Strip shell metacharacters that could enable command injection.
///
/// The output never contains `; | & ` $ ( ) { } ! > <` or CR/LF.
pub fn sanitize_param(value: &str) -> String {
    value.chars().filter(|c| !DANGEROUS.contains(c)).collect()
}

/// Substitute parameters into a command template.
///
/// Every value passes through [`sanitize_param`] first. Both `{name}`
/// and `${name}` forms are replaced for each key; unresolved
/// placeholders are intentional literals and are left alone.
pub fn render_command(template: &str, params: &HashMap<String, String>) -> String {
    let mut command = template.to_string();
    for (key, value) in params {
        let safe = sanitize_param(value);
        command = command.replace(&format!("{{{key}}}"), &safe);
        command = command.replace(&format!("${{{key}}}"), &safe);
    }
    command
}

/// Render a JSON parameter value for template substitution.
///
/// Strings keep their content without quotes; everything else uses its
/// JSON rendering.
pub fn param_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
#[path = "template_tests.rs"]
mod tests;
