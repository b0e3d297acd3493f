//! Built-in per-platform templates.

use forge_core::Platform;
use serde::{Deserialize, Serialize};

use crate::files::{order_by_priority, FileSpec};

/// A file entry of a template.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TemplateFile {
    pub path: String,
    #[serde(default)]
    pub description: String,
}

/// Commands run after generation. `None` means the step does not apply.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PostCommands {
    #[serde(default)]
    pub install: Option<String>,
    #[serde(default)]
    pub build: Option<String>,
    #[serde(default)]
    pub preview: Option<String>,
}

/// Everything the core needs to scaffold one platform.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlatformTemplate {
    pub platform: Platform,
    pub name: String,
    pub description: String,
    pub files: Vec<TemplateFile>,
    pub commands: PostCommands,
}

impl PlatformTemplate {
    /// File specs in priority order.
    pub fn file_plan(&self) -> Vec<FileSpec> {
        order_by_priority(
            self.files
                .iter()
                .map(|f| FileSpec::new(&f.path, &f.description))
                .collect(),
        )
    }
}

fn files(entries: &[(&str, &str)]) -> Vec<TemplateFile> {
    entries
        .iter()
        .map(|(path, description)| TemplateFile {
            path: path.to_string(),
            description: description.to_string(),
        })
        .collect()
}

fn commands(install: Option<&str>, build: Option<&str>, preview: Option<&str>) -> PostCommands {
    PostCommands {
        install: install.map(str::to_string),
        build: build.map(str::to_string),
        preview: preview.map(str::to_string),
    }
}

/// Built-in template for a platform.
pub fn builtin(platform: Platform) -> PlatformTemplate {
    let (name, description, file_list, post) = match platform {
        Platform::Flutter => (
            "Flutter app",
            "Cross-platform Flutter application with Material design",
            files(&[
                ("pubspec.yaml", "Package manifest with Flutter dependencies"),
                ("lib/main.dart", "Entry point that boots the app"),
                ("lib/app.dart", "Root widget with theme and routes"),
                ("lib/models/item.dart", "Item data model"),
                ("lib/services/item_service.dart", "In-memory item storage service"),
                ("lib/screens/home_screen.dart", "Home screen listing items"),
                ("lib/widgets/item_tile.dart", "List tile showing one item"),
                ("test/widget_test.dart", "Widget smoke test"),
                ("README.md", "Project overview and run instructions"),
            ]),
            commands(Some("flutter pub get"), Some("flutter build web"), Some("flutter run -d web-server")),
        ),
        Platform::React => (
            "React app",
            "React single-page application built with Vite",
            files(&[
                ("package.json", "Package manifest with React and Vite"),
                ("vite.config.js", "Vite configuration"),
                ("index.html", "HTML shell mounting the app"),
                ("src/main.jsx", "Entry point rendering the root component"),
                ("src/App.jsx", "Root component with layout"),
                ("src/models/item.js", "Item shape and helpers"),
                ("src/services/api.js", "Data access service"),
                ("src/pages/Home.jsx", "Home page listing items"),
                ("src/components/ItemCard.jsx", "Card showing one item"),
                ("src/App.test.jsx", "Component smoke test"),
                ("README.md", "Project overview and run instructions"),
            ]),
            commands(Some("npm install"), Some("npm run build"), Some("npm run dev")),
        ),
        Platform::Next => (
            "Next.js app",
            "Next.js application using the app router",
            files(&[
                ("package.json", "Package manifest with Next.js"),
                ("next.config.js", "Next.js configuration"),
                ("app/layout.tsx", "Root layout"),
                ("app/page.tsx", "Home page"),
                ("lib/types.ts", "Shared types"),
                ("lib/api.ts", "Data access helpers"),
                ("components/Header.tsx", "Site header"),
                ("__tests__/page.test.tsx", "Home page test"),
                ("README.md", "Project overview and run instructions"),
            ]),
            commands(Some("npm install"), Some("npm run build"), Some("npm run dev")),
        ),
        Platform::Vue => (
            "Vue app",
            "Vue 3 application built with Vite",
            files(&[
                ("package.json", "Package manifest with Vue and Vite"),
                ("vite.config.js", "Vite configuration"),
                ("index.html", "HTML shell mounting the app"),
                ("src/main.js", "Entry point creating the app"),
                ("src/App.vue", "Root component"),
                ("src/models/item.js", "Item shape and helpers"),
                ("src/services/api.js", "Data access service"),
                ("src/views/HomeView.vue", "Home view listing items"),
                ("src/components/ItemCard.vue", "Card showing one item"),
                ("tests/App.spec.js", "Component smoke test"),
                ("README.md", "Project overview and run instructions"),
            ]),
            commands(Some("npm install"), Some("npm run build"), Some("npm run dev")),
        ),
        Platform::Angular => (
            "Angular app",
            "Angular standalone-component application",
            files(&[
                ("package.json", "Package manifest with Angular"),
                ("angular.json", "Angular workspace configuration"),
                ("tsconfig.json", "TypeScript configuration"),
                ("src/main.ts", "Bootstrap entry point"),
                ("src/app/app.component.ts", "Root component"),
                ("src/app/models/item.ts", "Item model"),
                ("src/app/services/item.service.ts", "Item service"),
                ("src/app/pages/home.component.ts", "Home page component"),
                ("src/app/app.component.spec.ts", "Root component test"),
                ("README.md", "Project overview and run instructions"),
            ]),
            commands(Some("npm install"), Some("npx ng build"), Some("npx ng serve")),
        ),
        Platform::Python => (
            "Python app",
            "Python web service with FastAPI",
            files(&[
                ("requirements.txt", "Python dependencies"),
                ("main.py", "Entry point starting the server"),
                ("app/models.py", "Data models"),
                ("app/services.py", "Business logic"),
                ("app/routes.py", "HTTP routes"),
                ("tests/test_main.py", "API smoke test"),
                ("README.md", "Project overview and run instructions"),
            ]),
            commands(
                Some("pip install -r requirements.txt"),
                Some("python -m compileall -q ."),
                Some("python main.py"),
            ),
        ),
        Platform::Node => (
            "Node.js service",
            "Node.js HTTP service with Express",
            files(&[
                ("package.json", "Package manifest with Express"),
                ("src/index.js", "Entry point starting the server"),
                ("src/models/item.js", "Item model"),
                ("src/services/itemService.js", "Item service"),
                ("src/routes/items.js", "Item routes"),
                ("tests/items.test.js", "Route tests"),
                ("README.md", "Project overview and run instructions"),
            ]),
            commands(Some("npm install"), Some("npm run build --if-present"), Some("npm start")),
        ),
        Platform::Swift => (
            "Swift package",
            "SwiftUI application as a Swift package",
            files(&[
                ("Package.swift", "Swift package manifest"),
                ("Sources/App/main.swift", "Entry point"),
                ("Sources/App/Models/Item.swift", "Item model"),
                ("Sources/App/Services/ItemStore.swift", "Item store"),
                ("Sources/App/Views/ContentView.swift", "Main view"),
                ("Tests/AppTests/AppTests.swift", "Unit tests"),
                ("README.md", "Project overview and run instructions"),
            ]),
            commands(Some("swift package resolve"), Some("swift build"), Some("swift run")),
        ),
        Platform::Kotlin => (
            "Kotlin app",
            "Kotlin JVM application built with Gradle",
            files(&[
                ("settings.gradle.kts", "Gradle settings"),
                ("build.gradle.kts", "Gradle build script"),
                ("src/main/kotlin/Main.kt", "Entry point"),
                ("src/main/kotlin/models/Item.kt", "Item model"),
                ("src/main/kotlin/services/ItemService.kt", "Item service"),
                ("src/main/kotlin/screens/HomeScreen.kt", "Home screen"),
                ("src/test/kotlin/MainTest.kt", "Unit tests"),
                ("README.md", "Project overview and run instructions"),
            ]),
            commands(Some("gradle dependencies"), Some("gradle build"), Some("gradle run")),
        ),
        Platform::Html => (
            "Static site",
            "Static HTML, CSS and JavaScript site",
            files(&[
                ("index.html", "Main page"),
                ("styles.css", "Site styles"),
                ("script.js", "Page behaviour"),
                ("README.md", "Project overview"),
            ]),
            commands(None, None, Some("python3 -m http.server 8000")),
        ),
    };

    PlatformTemplate {
        platform,
        name: name.to_string(),
        description: description.to_string(),
        files: file_list,
        commands: post,
    }
}

/// Command committing the generated project.
pub fn commit_command(project_name: &str) -> String {
    let message = project_name.replace('"', "'");
    format!("git init -q && git add -A && git commit -q -m \"Initial commit: {}\"", message)
}
