//! Prompt templates for planning, generation, fixing and dialog.

use std::collections::HashMap;

use forge_core::{ErrorRecord, Platform};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{TemplateError, TemplateResult};
use crate::files::{fence_language, FileSpec};

/// Commenting rule every generated file must follow.
pub const COMMENTING_POLICY: &str = "Every function and class carries a short comment that explains WHAT it does, \
HOW it does it and WHY it exists. Do not leave placeholder comments.";

const PLAN_SYSTEM: &str = "You are a senior {{platform}} architect. You plan the files of a new project. \
Reply with a JSON array of relative file paths and nothing else.";

const PLAN_USER: &str = "Project: {{project}}\nDescription: {{description}}\nFeatures:\n{{features}}\n\n\
List every file needed for a minimal working {{platform}} project, including its manifest, \
entry point, tests and a README.";

const FILE_SYSTEM: &str = "You are an expert {{platform}} developer writing one file of the project \"{{project}}\". \
Reply with exactly one fenced code block whose info string is `{{language}} {{path}}`. \
Text outside the block is discarded. {{policy}}";

const FILE_USER: &str = "Write `{{path}}`, the {{role}} of the project.\nPurpose: {{file_description}}\n\
Project description: {{description}}\nFiles in the project:\n{{files}}";

const FIX_SYSTEM: &str = "You are an expert {{platform}} developer fixing a broken file. \
Reply with exactly one fenced code block holding the complete corrected file `{{path}}`. {{policy}}";

const FIX_USER: &str = "The file `{{path}}` has these problems:\n{{errors}}\n\nCurrent content:\n```{{language}}\n{{content}}\n```";

const DIALOG_SYSTEM: &str = "You are AppForge, an assistant that builds applications from a description. \
Answer briefly. When the user wants an app, tell them which platform you would use.";

/// A system and user message pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Replace every `{{name}}` in `template`. Unknown names are an error.
pub fn render(template: &str, vars: &HashMap<&str, String>) -> TemplateResult<String> {
    let pattern = Regex::new(r"\{\{([a-z_]+)\}\}").map_err(|e| TemplateError::RenderingFailed(e.to_string()))?;

    if let Some(missing) = pattern
        .captures_iter(template)
        .filter_map(|c| c.get(1))
        .find(|name| !vars.contains_key(name.as_str()))
    {
        return Err(TemplateError::MissingVariable(missing.as_str().to_string()));
    }

    Ok(pattern
        .replace_all(template, |caps: &regex::Captures| {
            caps.get(1)
                .and_then(|name| vars.get(name.as_str()))
                .cloned()
                .unwrap_or_default()
        })
        .into_owned())
}

fn bullet_list<'a>(items: impl IntoIterator<Item = &'a str>) -> String {
    let lines: Vec<String> = items.into_iter().map(|i| format!("- {}", i)).collect();
    if lines.is_empty() {
        "- (none)".to_string()
    } else {
        lines.join("\n")
    }
}

/// Prompt asking for a JSON list of file paths.
pub fn planning_prompt(
    platform: Platform,
    project: &str,
    description: &str,
    features: &[String],
) -> TemplateResult<Prompt> {
    let vars = HashMap::from([
        ("platform", platform.to_string()),
        ("project", project.to_string()),
        ("description", description.to_string()),
        ("features", bullet_list(features.iter().map(String::as_str))),
    ]);
    Ok(Prompt {
        system: render(PLAN_SYSTEM, &vars)?,
        user: render(PLAN_USER, &vars)?,
    })
}

/// Inputs for a single-file generation prompt.
#[derive(Debug, Clone)]
pub struct FileContext<'a> {
    pub platform: Platform,
    pub project: &'a str,
    pub description: &'a str,
    pub file: &'a FileSpec,
    pub plan: &'a [FileSpec],
}

/// Prompt generating one file.
pub fn file_prompt(ctx: &FileContext<'_>) -> TemplateResult<Prompt> {
    let vars = HashMap::from([
        ("platform", ctx.platform.to_string()),
        ("project", ctx.project.to_string()),
        ("description", ctx.description.to_string()),
        ("path", ctx.file.path.clone()),
        ("role", ctx.file.role().as_str().to_string()),
        ("file_description", ctx.file.description.clone()),
        ("language", fence_language(&ctx.file.path).to_string()),
        ("files", bullet_list(ctx.plan.iter().map(|f| f.path.as_str()))),
        ("policy", COMMENTING_POLICY.to_string()),
    ]);
    Ok(Prompt {
        system: render(FILE_SYSTEM, &vars)?,
        user: render(FILE_USER, &vars)?,
    })
}

/// Error-aware prompt regenerating one file.
pub fn fix_prompt(platform: Platform, path: &str, content: &str, errors: &[ErrorRecord]) -> TemplateResult<Prompt> {
    let described: Vec<String> = errors
        .iter()
        .map(|e| match e.line {
            Some(line) => format!("line {}: {}", line, e.message),
            None => e.message.clone(),
        })
        .collect();
    let vars = HashMap::from([
        ("platform", platform.to_string()),
        ("path", path.to_string()),
        ("language", fence_language(path).to_string()),
        ("content", content.to_string()),
        ("errors", bullet_list(described.iter().map(String::as_str))),
        ("policy", COMMENTING_POLICY.to_string()),
    ]);
    Ok(Prompt {
        system: render(FIX_SYSTEM, &vars)?,
        user: render(FIX_USER, &vars)?,
    })
}

pub fn dialog_system_prompt() -> &'static str {
    DIALOG_SYSTEM
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_core::{ErrorType, Severity};

    #[test]
    fn test_render_replaces_and_rejects_unknown() {
        let vars = HashMap::from([("name", "todo".to_string())]);
        assert_eq!(render("app {{name}}!", &vars).unwrap(), "app todo!");
        assert!(matches!(
            render("{{missing}}", &vars),
            Err(TemplateError::MissingVariable(v)) if v == "missing"
        ));
    }

    #[test]
    fn test_file_prompt_names_file_and_policy() {
        let file = FileSpec::new("lib/main.dart", "Entry point");
        let plan = vec![FileSpec::new("pubspec.yaml", ""), file.clone()];
        let prompt = file_prompt(&FileContext {
            platform: Platform::Flutter,
            project: "todo",
            description: "A to-do list",
            file: &file,
            plan: &plan,
        })
        .unwrap();
        assert!(prompt.system.contains("`dart lib/main.dart`"));
        assert!(prompt.system.contains("WHAT"));
        assert!(prompt.user.contains("entry point"));
        assert!(prompt.user.contains("- pubspec.yaml"));
    }

    #[test]
    fn test_fix_prompt_lists_errors() {
        let error = ErrorRecord::new("missing semicolon", ErrorType::Syntax, Severity::Error)
            .with_location("lib/main.dart", Some(10), Some(5));
        let prompt = fix_prompt(Platform::Flutter, "lib/main.dart", "void main() {}", &[error]).unwrap();
        assert!(prompt.user.contains("line 10: missing semicolon"));
        assert!(prompt.user.contains("```dart"));
    }

    #[test]
    fn test_planning_prompt_without_features() {
        let prompt = planning_prompt(Platform::React, "shop", "A shop", &[]).unwrap();
        assert!(prompt.user.contains("- (none)"));
        assert!(prompt.system.contains("JSON array"));
    }
}
