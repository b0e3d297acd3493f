//! Offline skeleton content.
//!
//! Used when no model is reachable. Every skeleton passes the syntax
//! validator for its extension.

use forge_core::Platform;
use serde_json::json;

use crate::files::{FileRole, FileSpec};
use crate::platform::PlatformTemplate;

/// Split an identifier or phrase into words, breaking on separators and on
/// lower-to-upper case changes.
fn words(s: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;
    for c in s.chars() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                result.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if c.is_uppercase() && prev_lower && !current.is_empty() {
            result.push(std::mem::take(&mut current));
        }
        prev_lower = c.is_lowercase() || c.is_ascii_digit();
        current.push(c);
    }
    if !current.is_empty() {
        result.push(current);
    }
    result
}

/// Convert to PascalCase.
pub fn to_pascal_case(s: &str) -> String {
    words(s)
        .iter()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                None => String::new(),
                Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
            }
        })
        .collect()
}

/// Convert to snake_case.
pub fn to_snake_case(s: &str) -> String {
    words(s).iter().map(|w| w.to_lowercase()).collect::<Vec<_>>().join("_")
}

/// Convert to kebab-case.
pub fn to_kebab_case(s: &str) -> String {
    words(s).iter().map(|w| w.to_lowercase()).collect::<Vec<_>>().join("-")
}

fn to_camel_case(s: &str) -> String {
    let pascal = to_pascal_case(s);
    let mut chars = pascal.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_lowercase().collect::<String>() + chars.as_str(),
    }
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// File name without its last extension.
fn stem(path: &str) -> &str {
    let name = file_name(path);
    name.rsplit_once('.').map(|(s, _)| s).filter(|s| !s.is_empty()).unwrap_or(name)
}

/// Skeleton content for `file`.
pub fn skeleton(template: &PlatformTemplate, file: &FileSpec, project: &str, description: &str) -> String {
    let name = file_name(&file.path).to_lowercase();
    let role = file.role();
    let pascal = to_pascal_case(stem(&file.path));
    let pascal = if pascal.is_empty() { "Module".to_string() } else { pascal };
    let doc = if file.description.is_empty() {
        format!("{} {}", project, role.as_str())
    } else {
        file.description.clone()
    };

    match name.as_str() {
        "pubspec.yaml" => return pubspec(project, description),
        "package.json" => return package_json(template.platform, project, description),
        "requirements.txt" => return "fastapi>=0.110\nuvicorn>=0.29\npytest>=8.0\n".to_string(),
        "package.swift" => return package_swift(project),
        "build.gradle.kts" => return gradle_build(),
        "settings.gradle.kts" => return format!("rootProject.name = \"{}\"\n", to_kebab_case(project)),
        "readme.md" => return readme(template, project, description),
        "index.html" => return index_html(template.platform, project),
        _ => {}
    }

    match file.extension().to_lowercase().as_str() {
        "dart" => dart(&file.path, role, &pascal, &doc, project),
        "js" | "ts" | "jsx" | "tsx" | "mjs" => script(&file.path, role, &pascal, &doc, project),
        "vue" => vue(&pascal, &doc),
        "py" => python(role, &pascal, &doc, project),
        "swift" => swift(&name, role, &pascal, &doc, project),
        "kt" => kotlin(&name, role, &pascal, &doc, project),
        "java" => format!("// {}\npublic class {} {{\n}}\n", doc, pascal),
        "css" => format!("/* {} */\nbody {{\n  font-family: system-ui, sans-serif;\n  margin: 0;\n}}\n", doc),
        "json" => "{}\n".to_string(),
        "yaml" | "yml" | "toml" => format!("# {}\n", doc),
        "md" => format!("# {}\n\n{}\n", pascal, doc),
        _ => format!("{}\n", doc),
    }
}

fn pubspec(project: &str, description: &str) -> String {
    format!(
        "name: {}\ndescription: \"{}\"\npublish_to: \"none\"\nversion: 1.0.0+1\n\n\
environment:\n  sdk: \">=3.0.0 <4.0.0\"\n\n\
dependencies:\n  flutter:\n    sdk: flutter\n\n\
dev_dependencies:\n  flutter_test:\n    sdk: flutter\n\n\
flutter:\n  uses-material-design: true\n",
        to_snake_case(project),
        description.replace('"', "'")
    )
}

fn package_json(platform: Platform, project: &str, description: &str) -> String {
    let (scripts, dependencies, dev_dependencies) = match platform {
        Platform::React => (
            json!({"dev": "vite", "build": "vite build", "test": "vitest run"}),
            json!({"react": "^18.3.1", "react-dom": "^18.3.1"}),
            json!({"vite": "^5.4.0", "@vitejs/plugin-react": "^4.3.0", "vitest": "^2.0.0"}),
        ),
        Platform::Next => (
            json!({"dev": "next dev", "build": "next build", "start": "next start"}),
            json!({"next": "^14.2.0", "react": "^18.3.1", "react-dom": "^18.3.1"}),
            json!({"typescript": "^5.5.0", "@types/react": "^18.3.0"}),
        ),
        Platform::Vue => (
            json!({"dev": "vite", "build": "vite build", "test": "vitest run"}),
            json!({"vue": "^3.4.0"}),
            json!({"vite": "^5.4.0", "@vitejs/plugin-vue": "^5.1.0", "vitest": "^2.0.0"}),
        ),
        Platform::Angular => (
            json!({"start": "ng serve", "build": "ng build", "test": "ng test"}),
            json!({
                "@angular/core": "^18.0.0",
                "@angular/common": "^18.0.0",
                "@angular/platform-browser": "^18.0.0",
                "rxjs": "^7.8.0",
                "zone.js": "^0.14.0"
            }),
            json!({"@angular/cli": "^18.0.0", "@angular/compiler-cli": "^18.0.0", "typescript": "~5.4.0"}),
        ),
        _ => (
            json!({"start": "node src/index.js", "test": "node --test"}),
            json!({"express": "^4.19.0"}),
            json!({}),
        ),
    };

    let manifest = json!({
        "name": to_kebab_case(project),
        "version": "0.1.0",
        "private": true,
        "description": description,
        "type": "module",
        "scripts": scripts,
        "dependencies": dependencies,
        "devDependencies": dev_dependencies,
    });
    serde_json::to_string_pretty(&manifest).unwrap_or_else(|_| "{}".to_string()) + "\n"
}

fn package_swift(project: &str) -> String {
    format!(
        "// swift-tools-version:5.9\nimport PackageDescription\n\n\
let package = Package(\n    name: \"{name}\",\n    targets: [\n        \
.executableTarget(name: \"App\"),\n        .testTarget(name: \"AppTests\", dependencies: [\"App\"])\n    ]\n)\n",
        name = to_pascal_case(project)
    )
}

fn gradle_build() -> String {
    "plugins {\n    kotlin(\"jvm\") version \"1.9.24\"\n    application\n}\n\n\
repositories {\n    mavenCentral()\n}\n\n\
dependencies {\n    testImplementation(kotlin(\"test\"))\n}\n\n\
application {\n    mainClass.set(\"MainKt\")\n}\n"
        .to_string()
}

fn readme(template: &PlatformTemplate, project: &str, description: &str) -> String {
    let mut out = format!("# {}\n\n{}\n\n{}.\n", project, description, template.description);
    let commands: Vec<&str> = [&template.commands.install, &template.commands.preview]
        .into_iter()
        .flatten()
        .map(String::as_str)
        .collect();
    if !commands.is_empty() {
        out.push_str("\n## Getting started\n\n```sh\n");
        for command in commands {
            out.push_str(command);
            out.push('\n');
        }
        out.push_str("```\n");
    }
    out
}

fn index_html(platform: Platform, project: &str) -> String {
    let body = match platform {
        Platform::React => "    <div id=\"root\"></div>\n    <script type=\"module\" src=\"/src/main.jsx\"></script>\n",
        Platform::Vue => "    <div id=\"app\"></div>\n    <script type=\"module\" src=\"/src/main.js\"></script>\n",
        _ => "    <main id=\"app\"></main>\n    <script src=\"script.js\"></script>\n",
    };
    let styles = if platform == Platform::Html {
        "    <link rel=\"stylesheet\" href=\"styles.css\">\n"
    } else {
        ""
    };
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n  <head>\n    <meta charset=\"UTF-8\">\n    \
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n    <title>{}</title>\n{}  </head>\n  <body>\n{}  </body>\n</html>\n",
        project, styles, body
    )
}

fn dart(path: &str, role: FileRole, pascal: &str, doc: &str, project: &str) -> String {
    if path.ends_with("main.dart") {
        return format!(
            "// {doc}\nimport 'package:flutter/material.dart';\n\nimport 'app.dart';\n\n\
/// Starts the application by mounting the root widget.\nvoid main() {{\n  runApp(const App());\n}}\n"
        );
    }
    match role {
        FileRole::Test => format!(
            "// {doc}\nimport 'package:flutter_test/flutter_test.dart';\n\n\
void main() {{\n  test('{project} starts', () {{\n    expect(1 + 1, 2);\n  }});\n}}\n"
        ),
        FileRole::Entry | FileRole::Screen | FileRole::Widget => format!(
            "// {doc}\nimport 'package:flutter/material.dart';\n\n\
/// {doc}\nclass {pascal} extends StatelessWidget {{\n  const {pascal}({{super.key}});\n\n  \
@override\n  Widget build(BuildContext context) {{\n    return const Placeholder();\n  }}\n}}\n"
        ),
        _ => format!("// {doc}\n\n/// {doc}\nclass {pascal} {{\n  const {pascal}();\n}}\n"),
    }
}

fn script(path: &str, role: FileRole, pascal: &str, doc: &str, project: &str) -> String {
    let component = path.ends_with(".jsx") || path.ends_with(".tsx");
    let lower = path.to_lowercase();

    if role == FileRole::Test {
        return format!(
            "// {doc}\nimport {{ describe, it, expect }} from 'vitest';\n\n\
describe('{pascal}', () => {{\n  it('runs', () => {{\n    expect(true).toBe(true);\n  }});\n}});\n"
        );
    }
    if lower.ends_with("src/main.jsx") || lower.ends_with("src/main.tsx") {
        return format!(
            "// {doc}\nimport React from 'react';\nimport ReactDOM from 'react-dom/client';\nimport App from './App';\n\n\
ReactDOM.createRoot(document.getElementById('root')).render(<App />);\n"
        );
    }
    if lower.ends_with("vite.config.js") || lower.ends_with("vite.config.ts") {
        return format!("// {doc}\nimport {{ defineConfig }} from 'vite';\n\nexport default defineConfig({{}});\n");
    }
    if lower.ends_with("next.config.js") {
        return format!("// {doc}\nmodule.exports = {{ reactStrictMode: true }};\n");
    }
    if lower.ends_with("src/index.js") && role == FileRole::Entry {
        return format!(
            "// {doc}\nimport express from 'express';\n\nconst app = express();\n\n\
app.get('/', (req, res) => {{\n  res.json({{ name: '{project}' }});\n}});\n\n\
app.listen(3000, () => {{\n  console.log('{project} listening on 3000');\n}});\n"
        );
    }
    if component {
        let class = to_kebab_case(pascal);
        return format!(
            "// {doc}\nexport default function {pascal}() {{\n  return <div className=\"{class}\">{pascal}</div>;\n}}\n"
        );
    }
    let function = to_camel_case(pascal);
    format!("// {doc}\nexport function {function}() {{\n  return null;\n}}\n")
}

fn vue(pascal: &str, doc: &str) -> String {
    format!(
        "<!-- {doc} -->\n<template>\n  <div class=\"{class}\">{{{{ title }}}}</div>\n</template>\n\n\
<script setup>\nconst title = '{pascal}';\n</script>\n",
        class = to_kebab_case(pascal)
    )
}

fn python(role: FileRole, pascal: &str, doc: &str, project: &str) -> String {
    match role {
        FileRole::Entry => format!(
            "\"\"\"{doc}\"\"\"\n\n\ndef main() -> None:\n    \"\"\"Start {project}.\"\"\"\n    print(\"{project}\")\n\n\n\
if __name__ == \"__main__\":\n    main()\n"
        ),
        FileRole::Test => format!(
            "\"\"\"{doc}\"\"\"\n\n\ndef test_{name}() -> None:\n    assert True\n",
            name = to_snake_case(pascal)
        ),
        _ => format!("\"\"\"{doc}\"\"\"\n\n\nclass {pascal}:\n    \"\"\"{doc}\"\"\"\n\n    pass\n"),
    }
}

fn swift(name: &str, role: FileRole, pascal: &str, doc: &str, project: &str) -> String {
    if name == "main.swift" {
        return format!("// {doc}\nprint(\"{project}\")\n");
    }
    match role {
        FileRole::Test => format!(
            "// {doc}\nimport XCTest\n\nfinal class {pascal}: XCTestCase {{\n    func testExample() {{\n        XCTAssertTrue(true)\n    }}\n}}\n"
        ),
        _ => format!("// {doc}\nimport Foundation\n\nstruct {pascal} {{\n}}\n"),
    }
}

fn kotlin(name: &str, role: FileRole, pascal: &str, doc: &str, project: &str) -> String {
    if name == "main.kt" {
        return format!("// {doc}\nfun main() {{\n    println(\"{project}\")\n}}\n");
    }
    match role {
        FileRole::Test => format!(
            "// {doc}\nimport kotlin.test.Test\nimport kotlin.test.assertTrue\n\n\
class {pascal} {{\n    @Test\n    fun works() {{\n        assertTrue(true)\n    }}\n}}\n"
        ),
        _ => format!("// {doc}\nclass {pascal}\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::builtin;

    #[test]
    fn test_case_conversions() {
        assert_eq!(to_snake_case("MyApp"), "my_app");
        assert_eq!(to_snake_case("my-app"), "my_app");
        assert_eq!(to_snake_case("Todo List"), "todo_list");
        assert_eq!(to_pascal_case("home_screen"), "HomeScreen");
        assert_eq!(to_pascal_case("item.service"), "ItemService");
        assert_eq!(to_kebab_case("ItemCard"), "item-card");
        assert_eq!(to_camel_case("api"), "api");
    }

    #[test]
    fn test_flutter_main_boots_app_widget() {
        let template = builtin(Platform::Flutter);
        let main = skeleton(&template, &FileSpec::new("lib/main.dart", "Entry"), "todo", "");
        let app = skeleton(&template, &FileSpec::new("lib/app.dart", "Root"), "todo", "");
        assert!(main.contains("runApp(const App())"));
        assert!(app.contains("class App extends StatelessWidget"));
    }

    #[test]
    fn test_package_json_is_valid_json() {
        let template = builtin(Platform::React);
        let content = skeleton(&template, &FileSpec::new("package.json", ""), "My Shop", "A shop");
        let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed["name"], "my-shop");
        assert!(parsed["dependencies"].get("react").is_some());
    }

    #[test]
    fn test_readme_lists_commands() {
        let template = builtin(Platform::Flutter);
        let readme = skeleton(&template, &FileSpec::new("README.md", ""), "todo", "A to-do list");
        assert!(readme.starts_with("# todo"));
        assert!(readme.contains("flutter pub get"));
    }

    #[test]
    fn test_every_builtin_file_has_content() {
        for platform in Platform::all() {
            let template = builtin(*platform);
            for file in template.file_plan() {
                let content = skeleton(&template, &file, "demo", "Demo app");
                assert!(!content.trim().is_empty(), "{} is empty", file.path);
            }
        }
    }
}
