//! Light syntax validation of generated files.
//!
//! Not a parser: brackets must balance (outside strings and comments),
//! top-level imports must be terminated, and markup tags must nest. Files
//! with an extension outside [`VALIDATED_EXTENSIONS`] always pass.

use forge_core::ErrorRecord;
use forge_templates::extension_of;
use regex::Regex;

/// Extensions that get checked.
pub const VALIDATED_EXTENSIONS: &[&str] = &["dart", "js", "ts", "jsx", "tsx", "py", "swift", "kt", "java", "html", "xml"];

/// Findings beyond this many per file are dropped.
const MAX_FINDINGS: usize = 10;

const HTML_VOID: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source", "track", "wbr",
];

/// HTML elements whose end tag may be omitted.
const HTML_OPTIONAL_END: &[&str] = &[
    "p", "li", "dt", "dd", "option", "optgroup", "tr", "td", "th", "thead", "tbody", "tfoot", "colgroup", "rt", "rp",
    "html", "head", "body",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comments {
    /// `//` and `/* */`
    CLike,
    /// `#`
    Hash,
}

/// Extension-aware syntax checks.
#[derive(Debug, Clone, Default)]
pub struct SyntaxValidator;

impl SyntaxValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn applies_to(path: &str) -> bool {
        VALIDATED_EXTENSIONS.contains(&extension_of(path).to_lowercase().as_str())
    }

    /// Problems found in `content`; empty when the file looks well formed.
    pub fn validate(&self, path: &str, content: &str) -> Vec<ErrorRecord> {
        let ext = extension_of(path).to_lowercase();
        let mut findings = match ext.as_str() {
            "dart" | "java" => {
                let interpolation = if ext == "dart" { Interpolation::Dollar } else { Interpolation::None };
                let mut f = brackets(path, content, Dialect::c_like(interpolation));
                f.extend(semicolon_imports(path, content, &ext));
                f
            }
            "js" | "ts" | "jsx" | "tsx" => {
                let mut f = brackets(path, content, Dialect::script());
                f.extend(es_imports(path, content));
                f
            }
            "swift" | "kt" => {
                let interpolation = if ext == "swift" { Interpolation::Paren } else { Interpolation::Dollar };
                let mut f = brackets(path, content, Dialect::c_like(interpolation));
                f.extend(module_imports(path, content, &ext));
                f
            }
            "py" => {
                let mut f = brackets(path, content, Dialect::python());
                f.extend(python_imports(path, content));
                f
            }
            "html" => markup(path, content, true),
            "xml" => markup(path, content, false),
            _ => Vec::new(),
        };
        findings.sort_by_key(|r| r.line);
        findings.truncate(MAX_FINDINGS);
        findings
    }
}

fn closing_for(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        _ => '}',
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interpolation {
    None,
    /// `${...}`
    Dollar,
    /// `\(...)`
    Paren,
}

/// Lexical rules the bracket scan needs for one language.
#[derive(Debug, Clone, Copy)]
struct Dialect {
    comments: Comments,
    /// Backtick strings; interpolation then only applies inside them.
    template_literals: bool,
    interpolation: Interpolation,
    regex_literals: bool,
}

impl Dialect {
    const fn c_like(interpolation: Interpolation) -> Self {
        Self {
            comments: Comments::CLike,
            template_literals: false,
            interpolation,
            regex_literals: false,
        }
    }

    const fn script() -> Self {
        Self {
            comments: Comments::CLike,
            template_literals: true,
            interpolation: Interpolation::Dollar,
            regex_literals: true,
        }
    }

    const fn python() -> Self {
        Self {
            comments: Comments::Hash,
            template_literals: false,
            interpolation: Interpolation::None,
            regex_literals: false,
        }
    }
}

/// Words after which `/` starts a regex literal.
const REGEX_KEYWORDS: &[&str] = &[
    "return", "typeof", "case", "do", "else", "in", "of", "new", "delete", "void", "throw", "instanceof", "yield",
    "await",
];

struct Scanner {
    chars: Vec<char>,
    i: usize,
    line: u32,
    dialect: Dialect,
}

impl Scanner {
    fn peek(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.i + ahead).copied()
    }

    fn opens_string(&self, c: char) -> bool {
        c == '"' || c == '\'' || (c == '`' && self.dialect.template_literals)
    }

    /// Skip the string opening at `self.i`. False when a multi-line string
    /// runs to the end of the file.
    fn skip_string(&mut self) -> bool {
        let Some(quote) = self.peek(0) else {
            return true;
        };
        let triple = self.peek(1) == Some(quote) && self.peek(2) == Some(quote);
        let multiline = triple || quote == '`';
        let interpolates = match self.dialect.interpolation {
            Interpolation::None => false,
            _ if self.dialect.template_literals => quote == '`',
            _ => true,
        };
        self.i += if triple { 3 } else { 1 };

        while let Some(s) = self.peek(0) {
            if interpolates {
                let opener = match self.dialect.interpolation {
                    Interpolation::Dollar => s == '$' && self.peek(1) == Some('{'),
                    Interpolation::Paren => s == '\\' && self.peek(1) == Some('('),
                    Interpolation::None => false,
                };
                if opener {
                    self.i += 2;
                    self.skip_interpolation();
                    continue;
                }
            }
            if s == '\\' {
                if self.peek(1) == Some('\n') {
                    self.line += 1;
                }
                self.i += 2;
                continue;
            }
            if s == '\n' {
                if !multiline {
                    // Single-line strings end at the line break.
                    return true;
                }
                self.line += 1;
            } else if s == quote && (!triple || (self.peek(1) == Some(quote) && self.peek(2) == Some(quote))) {
                self.i += if triple { 3 } else { 1 };
                return true;
            }
            self.i += 1;
        }
        !multiline
    }

    /// Skip interpolated code up to its closer; `self.i` is just past the
    /// opener. Strings inside may nest their own interpolation.
    fn skip_interpolation(&mut self) {
        let (open, close) = match self.dialect.interpolation {
            Interpolation::Paren => ('(', ')'),
            _ => ('{', '}'),
        };
        let mut depth = 1;
        while let Some(c) = self.peek(0) {
            if self.opens_string(c) {
                self.skip_string();
                continue;
            }
            if c == '\n' {
                self.line += 1;
            } else if c == open {
                depth += 1;
            } else if c == close {
                depth -= 1;
                if depth == 0 {
                    self.i += 1;
                    return;
                }
            }
            self.i += 1;
        }
    }

    /// Whether the `/` at `self.i` starts a regex literal rather than a
    /// division, judged by what precedes it.
    fn regex_can_start(&self) -> bool {
        let chars = &self.chars;
        let mut j = self.i;
        while j > 0 && chars[j - 1].is_whitespace() {
            j -= 1;
        }
        let Some(prev) = j.checked_sub(1).map(|p| chars[p]) else {
            return true;
        };
        if "=(,:;!&|?{}[+-*%~^".contains(prev) {
            return true;
        }
        let mut start = j;
        while start > 0 && (chars[start - 1].is_alphanumeric() || chars[start - 1] == '_' || chars[start - 1] == '$') {
            start -= 1;
        }
        let word: String = chars[start..j].iter().collect();
        REGEX_KEYWORDS.contains(&word.as_str())
    }

    /// Index just past the regex literal opening at `self.i`, when it
    /// closes on the same line.
    fn regex_end(&self) -> Option<usize> {
        let mut j = self.i + 1;
        let mut class = false;
        while let Some(&c) = self.chars.get(j) {
            match c {
                '\n' => return None,
                '\\' => {
                    j += 2;
                    continue;
                }
                '[' => class = true,
                ']' => class = false,
                '/' if !class => return (j > self.i + 1).then_some(j + 1),
                _ => {}
            }
            j += 1;
        }
        None
    }
}

/// Bracket balance outside strings, comments and regex literals.
fn brackets(path: &str, content: &str, dialect: Dialect) -> Vec<ErrorRecord> {
    let mut scan = Scanner {
        chars: content.chars().collect(),
        i: 0,
        line: 1,
        dialect,
    };
    let mut findings = Vec::new();
    let mut stack: Vec<(char, u32)> = Vec::new();

    while let Some(c) = scan.peek(0) {
        let next = scan.peek(1);

        if c == '\n' {
            scan.line += 1;
            scan.i += 1;
            continue;
        }

        // Comments.
        let line_comment = match dialect.comments {
            Comments::CLike => c == '/' && next == Some('/'),
            Comments::Hash => c == '#',
        };
        if line_comment {
            while scan.peek(0).is_some_and(|c| c != '\n') {
                scan.i += 1;
            }
            continue;
        }
        if dialect.comments == Comments::CLike && c == '/' && next == Some('*') {
            let start = scan.line;
            scan.i += 2;
            let mut closed = false;
            while let Some(c) = scan.peek(0) {
                if c == '\n' {
                    scan.line += 1;
                } else if c == '*' && scan.peek(1) == Some('/') {
                    scan.i += 2;
                    closed = true;
                    break;
                }
                scan.i += 1;
            }
            if !closed {
                findings.push(ErrorRecord::syntax(path, Some(start), "Unterminated block comment"));
            }
            continue;
        }

        // Strings.
        if scan.opens_string(c) {
            if c == '\'' && is_apostrophe(&scan.chars, scan.i, dialect.comments) {
                scan.i += 1;
                continue;
            }
            let start = scan.line;
            if !scan.skip_string() {
                findings.push(ErrorRecord::syntax(path, Some(start), "Unterminated string literal"));
            }
            continue;
        }

        if dialect.regex_literals && c == '/' && scan.regex_can_start() {
            if let Some(end) = scan.regex_end() {
                scan.i = end;
                continue;
            }
        }

        let line = scan.line;
        match c {
            '(' | '[' | '{' => stack.push((c, line)),
            ')' | ']' | '}' => match stack.pop() {
                Some((open, _)) if closing_for(open) == c => {}
                Some((open, opened)) => findings.push(ErrorRecord::syntax(
                    path,
                    Some(line),
                    format!("Mismatched '{}': expected '{}' to close '{}' from line {}", c, closing_for(open), open, opened),
                )),
                None => findings.push(ErrorRecord::syntax(path, Some(line), format!("Unexpected '{}'", c))),
            },
            _ => {}
        }
        scan.i += 1;
    }

    for (open, opened) in stack {
        findings.push(ErrorRecord::syntax(
            path,
            Some(opened),
            format!("Unclosed '{}' (missing '{}')", open, closing_for(open)),
        ));
    }
    findings
}

/// A `'` inside a word (`Don't`) is not a string delimiter. Python string
/// prefixes (`f'`, `rb'`) are.
fn is_apostrophe(chars: &[char], i: usize, comments: Comments) -> bool {
    let Some(prev) = i.checked_sub(1).map(|p| chars[p]) else {
        return false;
    };
    if !prev.is_alphanumeric() {
        return false;
    }
    if comments == Comments::Hash {
        let mut start = i;
        while start > 0 && chars[start - 1].is_alphanumeric() {
            start -= 1;
        }
        let prefix: String = chars[start..i].iter().collect::<String>().to_lowercase();
        if matches!(prefix.as_str(), "r" | "f" | "b" | "u" | "rb" | "br" | "fr" | "rf") {
            return false;
        }
    }
    true
}

fn strip_line_comment(line: &str) -> &str {
    match line.find("//") {
        // Only a `//` outside quotes starts a comment.
        Some(pos) if line[..pos].chars().filter(|c| *c == '\'' || *c == '"').count() % 2 == 0 => &line[..pos],
        _ => line,
    }
}

/// Dart and Java: top-level `import` / `export` / `part` / `package` end
/// with `;`.
fn semicolon_imports(path: &str, content: &str, ext: &str) -> Vec<ErrorRecord> {
    let keywords: &[&str] = if ext == "dart" {
        &["import ", "export ", "part ", "library "]
    } else {
        &["import ", "package "]
    };
    let continuations = ["show ", "hide ", "as ", "deferred ", "if ("];
    let lines: Vec<&str> = content.lines().collect();
    let mut findings = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let raw = lines[i];
        if !keywords.iter().any(|k| raw.starts_with(k)) {
            i += 1;
            continue;
        }
        let start = i;
        let mut statement = strip_line_comment(raw).trim_end().to_string();
        while ext == "dart"
            && !statement.ends_with(';')
            && lines
                .get(i + 1)
                .is_some_and(|next| continuations.iter().any(|c| next.trim_start().starts_with(c)))
        {
            i += 1;
            statement.push(' ');
            statement.push_str(strip_line_comment(lines[i]).trim());
        }
        if !statement.ends_with(';') {
            findings.push(ErrorRecord::syntax(
                path,
                Some(start as u32 + 1),
                format!("Expected ';' after '{}'", statement.trim()),
            ));
        }
        i += 1;
    }
    findings
}

/// JavaScript and TypeScript: every top-level `import` names a quoted module.
fn es_imports(path: &str, content: &str) -> Vec<ErrorRecord> {
    let (Ok(from_form), Ok(require_form)) = (
        Regex::new(r#"^import\s+(?:type\s+)?(?:.+?\s+from\s+)?["'][^"']+["']\s*;?$"#),
        Regex::new(r#"^import\s+\w+\s*=\s*require\(\s*["'][^"']+["']\s*\)\s*;?$"#),
    ) else {
        return Vec::new();
    };

    let lines: Vec<&str> = content.lines().collect();
    let mut findings = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let raw = lines[i];
        if !(raw.starts_with("import ") || raw.starts_with("import{")) {
            i += 1;
            continue;
        }
        let start = i;
        let mut statement = strip_line_comment(raw).trim().to_string();
        let mut depth = brace_depth(&statement);
        while depth > 0 && i + 1 < lines.len() {
            i += 1;
            let piece = strip_line_comment(lines[i]).trim();
            depth += brace_depth(piece);
            statement.push(' ');
            statement.push_str(piece);
        }
        // `import {a,\n b}\n from 'x'` keeps the module on the next line.
        if depth == 0
            && !statement.contains(|c| c == '"' || c == '\'')
            && lines.get(i + 1).is_some_and(|l| l.trim_start().starts_with("from "))
        {
            i += 1;
            statement.push(' ');
            statement.push_str(strip_line_comment(lines[i]).trim());
        }

        if depth > 0 {
            findings.push(ErrorRecord::syntax(path, Some(start as u32 + 1), "Unterminated import statement"));
        } else if !from_form.is_match(&statement) && !require_form.is_match(&statement) {
            findings.push(ErrorRecord::syntax(
                path,
                Some(start as u32 + 1),
                format!("Malformed import: {}", statement),
            ));
        }
        i += 1;
    }
    findings
}

fn brace_depth(text: &str) -> i32 {
    text.chars().fold(0, |depth, c| match c {
        '{' => depth + 1,
        '}' => depth - 1,
        _ => depth,
    })
}

/// Swift and Kotlin: `import` is followed by a module path.
fn module_imports(path: &str, content: &str, ext: &str) -> Vec<ErrorRecord> {
    let pattern = if ext == "swift" {
        r"^import\s+(?:(?:typealias|struct|class|enum|protocol|let|var|func)\s+)?[\w.]+\s*;?\s*$"
    } else {
        r"^import\s+[\w.]+(?:\.\*)?(?:\s+as\s+\w+)?\s*;?\s*$"
    };
    let Ok(valid) = Regex::new(pattern) else {
        return Vec::new();
    };

    content
        .lines()
        .enumerate()
        .filter(|(_, l)| *l == "import" || l.starts_with("import ") || l.starts_with("import\t"))
        .filter(|(_, l)| !valid.is_match(strip_line_comment(l).trim_end()))
        .map(|(n, l)| ErrorRecord::syntax(path, Some(n as u32 + 1), format!("Malformed import: {}", l.trim())))
        .collect()
}

/// Python: top-level `import x` / `from x import y`, including
/// parenthesized and backslash-continued forms.
fn python_imports(path: &str, content: &str) -> Vec<ErrorRecord> {
    let (Ok(plain), Ok(from)) = (
        Regex::new(r"^import\s+[\w.]+(?:\s+as\s+\w+)?(?:\s*,\s*[\w.]+(?:\s+as\s+\w+)?)*\s*(?:#.*)?$"),
        Regex::new(r"^from\s+\.*[\w.]*\s+import\s+(.+)$"),
    ) else {
        return Vec::new();
    };

    let lines: Vec<&str> = content.lines().collect();
    let mut findings = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let raw = lines[i].trim_end();
        let start = i as u32 + 1;
        if raw.starts_with("import ") {
            if !plain.is_match(raw) {
                findings.push(ErrorRecord::syntax(path, Some(start), format!("Malformed import: {}", raw)));
            }
        } else if raw.starts_with("from ") {
            match from.captures(raw).and_then(|c| c.get(1)).map(|m| m.as_str().trim()) {
                None => findings.push(ErrorRecord::syntax(path, Some(start), format!("Malformed import: {}", raw))),
                Some(names) if names.starts_with('(') && !names.contains(')') => {
                    let close = lines[i + 1..].iter().position(|l| l.contains(')'));
                    match close {
                        Some(offset) => i += offset + 1,
                        None => findings.push(ErrorRecord::syntax(
                            path,
                            Some(start),
                            "Unterminated parenthesized import",
                        )),
                    }
                }
                Some(names) if names.ends_with('\\') => {
                    while i + 1 < lines.len() && lines[i].trim_end().ends_with('\\') {
                        i += 1;
                    }
                    if lines[i].trim_end().ends_with('\\') {
                        findings.push(ErrorRecord::syntax(path, Some(start), "Import continues past end of file"));
                    }
                }
                Some(names) if names.ends_with(',') => {
                    findings.push(ErrorRecord::syntax(path, Some(start), format!("Incomplete import: {}", raw)))
                }
                Some(_) => {}
            }
        }
        i += 1;
    }
    findings
}

/// Tag nesting for HTML (lenient) and XML (strict).
fn markup(path: &str, content: &str, html: bool) -> Vec<ErrorRecord> {
    let mut blanked = content.to_string();
    let mut skip = vec![r"(?s)<!--.*?-->", r"(?s)<!\[CDATA\[.*?\]\]>", r"(?s)<\?.*?\?>", r"(?is)<!doctype[^>]*>"];
    if html {
        skip.push(r"(?is)<script\b[^>]*>.*?</script\s*>");
        skip.push(r"(?is)<style\b[^>]*>.*?</style\s*>");
    }
    for pattern in skip {
        let Ok(re) = Regex::new(pattern) else {
            continue;
        };
        // Keep line breaks so reported lines stay right.
        blanked = re
            .replace_all(&blanked, |caps: &regex::Captures| {
                caps[0].chars().filter(|c| *c == '\n').collect::<String>()
            })
            .into_owned();
    }

    let Ok(tag) = Regex::new(r"<(/?)([A-Za-z][\w:.-]*)((?:[^<>]|=\s*'[^']*'|=\s*\x22[^\x22]*\x22)*?)(/?)>") else {
        return Vec::new();
    };

    let mut findings = Vec::new();
    let mut stack: Vec<(String, u32)> = Vec::new();

    for caps in tag.captures_iter(&blanked) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let line = blanked[..whole.start()].matches('\n').count() as u32 + 1;
        let name = if html { caps[2].to_lowercase() } else { caps[2].to_string() };
        let closing = !caps[1].is_empty();
        let self_closing = !caps[4].is_empty() || (html && HTML_VOID.contains(&name.as_str()));

        if closing {
            match stack.iter().rposition(|(open, _)| *open == name) {
                Some(pos) => {
                    for (open, opened) in stack.drain(pos..).skip(1) {
                        if !(html && HTML_OPTIONAL_END.contains(&open.as_str())) {
                            findings.push(ErrorRecord::syntax(path, Some(opened), format!("Unclosed <{}>", open)));
                        }
                    }
                }
                None if html && HTML_VOID.contains(&name.as_str()) => {}
                None => findings.push(ErrorRecord::syntax(path, Some(line), format!("Unexpected </{}>", name))),
            }
        } else if !self_closing {
            stack.push((name, line));
        }
    }

    for (open, opened) in stack {
        if !(html && HTML_OPTIONAL_END.contains(&open.as_str())) {
            findings.push(ErrorRecord::syntax(path, Some(opened), format!("Unclosed <{}>", open)));
        }
    }
    findings
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(path: &str, content: &str) -> Vec<ErrorRecord> {
        SyntaxValidator::new().validate(path, content)
    }

    #[test]
    fn test_valid_dart_passes() {
        let content = "import 'package:flutter/material.dart';\n\n\
/// Entry point (see \"docs\").\nvoid main() {\n  runApp(const App()); // start {\n  final s = 'a { b';\n}\n";
        assert!(check("lib/main.dart", content).is_empty());
    }

    #[test]
    fn test_unclosed_brace_reports_opening_line() {
        let errors = check("lib/app.dart", "class App {\n  void build() {\n}\n");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].line, Some(1));
        assert!(errors[0].auto_fixable);
        assert!(errors[0].message.contains("Unclosed '{'"));
    }

    #[test]
    fn test_unterminated_dart_import() {
        let errors = check("lib/main.dart", "import 'package:flutter/material.dart'\nvoid main() {}\n");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].line, Some(1));
        // Multi-line `show` clauses are one statement.
        assert!(check("lib/a.dart", "import 'b.dart'\n    show B;\n").is_empty());
    }

    #[test]
    fn test_js_imports() {
        let ok = "import React from 'react';\nimport {\n  useState,\n  useEffect,\n} from \"react\";\nimport './index.css';\n\
const x = require('y');\nexport default function App() { return <p>Don't {x}</p>; }\n";
        assert!(check("src/App.jsx", ok).is_empty());

        let errors = check("src/main.ts", "import { a } from\nconsole.log(a);\n");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.starts_with("Malformed import"));

        let errors = check("src/main.ts", "import {\n a,\n");
        assert!(errors.iter().any(|e| e.message == "Unterminated import statement"));
    }

    #[test]
    fn test_quotes_inside_interpolation() {
        let dart = "void main() {\n  final m = {'k': 1};\n  print('${m['k']}');\n  print(\"${m.keys.map((k) => '{$k}').join()}\");\n}\n";
        assert!(check("lib/main.dart", dart).is_empty());
        assert!(!check("lib/main.dart", "void main() {\n  print('${m['k']}';\n}\n").is_empty());

        let kotlin = "fun main() {\n    val map = mapOf(\"k\" to 1)\n    println(\"${map[\"k\"]}\")\n    println(\"\"\"${if (map.isEmpty()) \"{\" else \"}\"}\"\"\")\n}\n";
        assert!(check("App.kt", kotlin).is_empty());

        let swift = "let dict = [\"k\": 1]\nprint(\"\\(dict[\"k\"]!)\")\nprint(\"total: \\((dict[\"k\"] ?? 0) + 1)\")\n";
        assert!(check("Sources/App/main.swift", swift).is_empty());

        let js = "const label = `${items.map((i) => `[${i}]`).join(')')}`;\n";
        assert!(check("src/label.js", js).is_empty());
    }

    #[test]
    fn test_js_regex_literals() {
        assert!(check("src/open.ts", "export const open = /[(]/;\n").is_empty());
        let ok = "const path = /\\/(\\d+)\\]/g;\nconst half = (a + b) / 2 / 3;\nfunction f(s) {\n  return /}/.test(s);\n}\nif (/[{]/.test(s)) {}\n";
        assert!(check("src/util.js", ok).is_empty());

        // Division is still scanned as code.
        let errors = check("src/util.js", "const a = (1 / 2;\n");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("Unclosed '('"));
    }

    #[test]
    fn test_python_checks() {
        let ok = "from typing import (\n    List,\n    Dict,\n)\nimport os, sys as system\n\n\
def main():\n    \"\"\"Print (things\"\"\"\n    print(f'{os.name}')  # )\n";
        assert!(check("main.py", ok).is_empty());

        let errors = check("main.py", "from os import\nprint(1\n");
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].line, Some(1));
        assert_eq!(errors[1].line, Some(2));
    }

    #[test]
    fn test_swift_and_kotlin_imports() {
        assert!(check("Sources/App/main.swift", "import SwiftUI\n\nstruct A {}\n").is_empty());
        assert_eq!(check("App.kt", "import\nfun main() {}\n").len(), 1);
        assert!(check("App.kt", "import kotlinx.coroutines.*\nimport a.B as C\n").is_empty());
    }

    #[test]
    fn test_html_nesting() {
        let ok = "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>T</title>\n\
<script>if (a < b) { x = '</div>'; }</script></head>\n<body>\n<ul><li>One<li>Two</ul>\n<br>\n<!-- <div> -->\n</body>\n</html>\n";
        assert!(check("index.html", ok).is_empty());

        let errors = check("index.html", "<html>\n<body>\n<div>\n<span>x</span>\n</body>\n</html>\n");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "Unclosed <div>");
        assert_eq!(errors[0].line, Some(3));
    }

    #[test]
    fn test_xml_is_strict() {
        assert!(check("AndroidManifest.xml", "<?xml version=\"1.0\"?>\n<manifest><application/></manifest>\n").is_empty());
        let errors = check("layout.xml", "<a>\n<b>\n</a>\n");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "Unclosed <b>");
    }

    #[test]
    fn test_other_extensions_pass() {
        assert!(check("styles.css", "a { color: red;").is_empty());
        assert!(check("README.md", "(").is_empty());
        assert!(!SyntaxValidator::applies_to("pubspec.yaml"));
        assert!(SyntaxValidator::applies_to("lib/main.DART"));
    }
}
