//! Error detection in tool output.
//!
//! One parser per tool family turns build and terminal output into
//! [`ErrorRecord`]s. Detection is pure: the same text always produces the
//! same records.

use std::collections::HashSet;

use forge_core::{ErrorRecord, ErrorType, Severity};
use regex::{Captures, Regex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    /// `file:line:col: [error|warning:] message` (dart, swift, gcc-style)
    Located,
    /// `file(line,col): error TS1005: message`
    Tsc,
    /// `e: file:///path/Main.kt:10:5 message`
    Kotlin,
    /// `path/Main.java:10: error: message`
    Javac,
    /// `File "main.py", line 10` followed by `XxxError: message`
    PythonTrace,
    /// `npm ERR! ...`
    Npm,
}

/// Substring rules applied to lines no parser claimed.
const SUBSTRING_RULES: &[(&str, ErrorType, Severity)] = &[
    ("permission denied", ErrorType::Permission, Severity::Fatal),
    ("eacces", ErrorType::Permission, Severity::Fatal),
    ("no space left", ErrorType::Runtime, Severity::Fatal),
    ("timed out", ErrorType::Timeout, Severity::Critical),
    ("timeout", ErrorType::Timeout, Severity::Critical),
    ("cannot find module", ErrorType::Dependency, Severity::Error),
    ("module not found", ErrorType::Dependency, Severity::Error),
    ("could not resolve", ErrorType::Dependency, Severity::Error),
    ("because every version of", ErrorType::Dependency, Severity::Error),
    ("no matching distribution", ErrorType::Dependency, Severity::Error),
];

/// Stateless, pattern-driven parser of tool output.
#[derive(Debug, Clone)]
pub struct ErrorDetector {
    parsers: Vec<(Family, Regex)>,
    python_error: Option<Regex>,
}

impl Default for ErrorDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorDetector {
    pub fn new() -> Self {
        let patterns = [
            (Family::Kotlin, r"^e:\s+(?:file://)?(?P<file>[^\s:]+?\.\w+):(?P<line>\d+):(?P<col>\d+)\s+(?P<msg>.+)$"),
            (Family::Tsc, r"^(?P<file>[^\s(]+\.\w+)\((?P<line>\d+),(?P<col>\d+)\):\s*(?P<level>error|warning)\s+(?:TS\d+:\s*)?(?P<msg>.+)$"),
            (Family::Located, r"^(?P<file>[^\s:]+\.\w+):(?P<line>\d+):(?P<col>\d+):\s*(?:(?P<level>[Ee]rror|[Ww]arning|note)\s*:\s*)?(?P<msg>.+)$"),
            (Family::Javac, r"^(?P<file>[^\s:]+\.java):(?P<line>\d+):\s*(?P<level>error|warning):\s*(?P<msg>.+)$"),
            (Family::PythonTrace, r#"^\s*File "(?P<file>[^"]+)", line (?P<line>\d+)"#),
            (Family::Npm, r"^npm (?:ERR!|error)\s*(?P<msg>.*)$"),
        ];
        let parsers = patterns
            .into_iter()
            .filter_map(|(family, pattern)| Regex::new(pattern).ok().map(|re| (family, re)))
            .collect();
        Self {
            parsers,
            python_error: Regex::new(r"^(?P<kind>\w*(?:Error|Exception)):\s*(?P<msg>.*)$").ok(),
        }
    }

    /// Parse `text` into error records, in order of appearance, without
    /// duplicates.
    pub fn detect(&self, text: &str) -> Vec<ErrorRecord> {
        let lines: Vec<&str> = text.lines().collect();
        let mut records = Vec::new();
        let mut seen = HashSet::new();
        let mut push = |record: ErrorRecord, records: &mut Vec<ErrorRecord>| {
            let key = (record.file.clone(), record.line, record.message.clone());
            if seen.insert(key) {
                records.push(record);
            }
        };

        let mut i = 0;
        while i < lines.len() {
            let line = lines[i].trim_end();
            i += 1;
            if line.trim().is_empty() {
                continue;
            }

            let matched = self
                .parsers
                .iter()
                .find_map(|(family, re)| re.captures(line).map(|caps| (*family, caps)));

            match matched {
                Some((Family::PythonTrace, caps)) => {
                    // The exception line follows the frame and its source line.
                    let (record, consumed) = self.python_frame(&caps, &lines[i..], line);
                    i += consumed;
                    if let Some(record) = record {
                        push(record, &mut records);
                    }
                }
                Some((Family::Npm, caps)) => {
                    if let Some(record) = npm_record(&caps, line) {
                        push(record, &mut records);
                    }
                }
                Some((family, caps)) => push(located_record(family, &caps, line), &mut records),
                None => {
                    if let Some(record) = substring_record(line) {
                        push(record, &mut records);
                    }
                }
            }
        }
        records
    }

    /// True when any record is at least `Error`.
    pub fn has_errors(&self, text: &str) -> bool {
        self.detect(text).iter().any(|r| r.severity >= Severity::Error)
    }

    fn python_frame(&self, caps: &Captures<'_>, rest: &[&str], raw: &str) -> (Option<ErrorRecord>, usize) {
        let file = caps.name("file").map(|m| m.as_str()).unwrap_or_default();
        let line = caps.name("line").and_then(|m| m.as_str().parse().ok());
        let Some(error_line) = self.python_error.as_ref() else {
            return (None, 0);
        };

        // Frames are followed by source lines and carets until either the
        // next frame or the exception line.
        for (offset, next) in rest.iter().enumerate() {
            let trimmed = next.trim();
            if trimmed.starts_with("File \"") {
                return (None, offset);
            }
            if let Some(exc) = error_line.captures(trimmed) {
                let kind = exc.name("kind").map(|m| m.as_str()).unwrap_or("Error");
                let msg = exc.name("msg").map(|m| m.as_str()).unwrap_or_default();
                let message = if msg.is_empty() {
                    kind.to_string()
                } else {
                    format!("{}: {}", kind, msg)
                };
                let raw = format!("{}\n{}", raw, rest[..=offset].join("\n"));
                let record = if matches!(kind, "SyntaxError" | "IndentationError" | "TabError") {
                    ErrorRecord::syntax(file, line, message).with_raw(raw)
                } else {
                    let error_type = if matches!(kind, "ModuleNotFoundError" | "ImportError") {
                        ErrorType::Dependency
                    } else {
                        ErrorType::Runtime
                    };
                    ErrorRecord::new(message, error_type, Severity::Error)
                        .with_location(file, line, None)
                        .with_raw(raw)
                };
                return (Some(record), offset + 1);
            }
        }
        (None, 0)
    }
}

fn located_record(family: Family, caps: &Captures<'_>, raw: &str) -> ErrorRecord {
    let file = caps.name("file").map(|m| m.as_str()).unwrap_or_default();
    let file = file.trim_start_matches("./");
    let line = caps.name("line").and_then(|m| m.as_str().parse().ok());
    let column = caps.name("col").and_then(|m| m.as_str().parse().ok());
    let message = caps.name("msg").map(|m| m.as_str().trim()).unwrap_or_default();
    let level = caps.name("level").map(|m| m.as_str().to_lowercase());

    match level.as_deref() {
        Some("warning") | Some("note") => ErrorRecord::new(message, ErrorType::Build, Severity::Warning)
            .with_location(file, line, column)
            .with_raw(raw),
        _ if family == Family::Kotlin && message.to_lowercase().starts_with("unresolved reference") => {
            ErrorRecord::new(message, ErrorType::Build, Severity::Error)
                .with_location(file, line, column)
                .auto_fixable(true)
                .with_raw(raw)
        }
        _ => {
            let mut record = ErrorRecord::syntax(file, line, message).with_raw(raw);
            record.column = column;
            record
        }
    }
}

fn npm_record(caps: &Captures<'_>, raw: &str) -> Option<ErrorRecord> {
    let msg = caps.name("msg").map(|m| m.as_str().trim()).unwrap_or_default();
    if msg.is_empty() || msg.starts_with("A complete log") || msg.starts_with("/") {
        return None;
    }
    let lower = msg.to_lowercase();
    if let Some(record) = substring_record(msg) {
        return Some(record.with_raw(raw));
    }
    let error_type = if lower.starts_with("code e404") || lower.contains("404 not found") || lower.contains("eresolve") {
        ErrorType::Dependency
    } else {
        ErrorType::Unknown
    };
    Some(ErrorRecord::new(msg, error_type, Severity::Error).with_raw(raw))
}

fn substring_record(line: &str) -> Option<ErrorRecord> {
    let lower = line.to_lowercase();
    SUBSTRING_RULES
        .iter()
        .find(|(needle, _, _)| lower.contains(needle))
        .map(|(_, error_type, severity)| ErrorRecord::new(line.trim(), *error_type, *severity).with_raw(line))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dart_location_is_fixable_syntax() {
        let records = ErrorDetector::new().detect("lib/main.dart:10:5: missing semicolon");
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.error_type, ErrorType::Syntax);
        assert_eq!(r.severity, Severity::Error);
        assert!(r.auto_fixable);
        assert_eq!(r.file.as_deref(), Some("lib/main.dart"));
        assert_eq!(r.line, Some(10));
        assert_eq!(r.column, Some(5));
        assert_eq!(r.message, "missing semicolon");
    }

    #[test]
    fn test_flutter_error_prefix_and_warning() {
        let text = "lib/app.dart:3:1: Error: Expected ';' after this.\n\
lib/app.dart:7:2: Warning: Unused import.";
        let records = ErrorDetector::new().detect(text);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].message, "Expected ';' after this.");
        assert!(records[0].auto_fixable);
        assert_eq!(records[1].severity, Severity::Warning);
        assert!(!records[1].auto_fixable);
    }

    #[test]
    fn test_tsc_and_kotlin() {
        let text = "src/App.tsx(12,7): error TS1005: ';' expected.\n\
e: file:///work/app/src/main/kotlin/Main.kt:4:9 Unresolved reference: foo";
        let records = ErrorDetector::new().detect(text);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].file.as_deref(), Some("src/App.tsx"));
        assert_eq!(records[0].line, Some(12));
        assert_eq!(records[1].file.as_deref(), Some("/work/app/src/main/kotlin/Main.kt"));
        assert_eq!(records[1].error_type, ErrorType::Build);
    }

    #[test]
    fn test_python_traceback() {
        let text = "Traceback (most recent call last):\n  File \"main.py\", line 3\n    print(\"hi\"\n         ^\nSyntaxError: '(' was never closed";
        let records = ErrorDetector::new().detect(text);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].error_type, ErrorType::Syntax);
        assert_eq!(records[0].file.as_deref(), Some("main.py"));
        assert_eq!(records[0].line, Some(3));

        let text = "  File \"app.py\", line 1, in <module>\n    import flask\nModuleNotFoundError: No module named 'flask'";
        let records = ErrorDetector::new().detect(text);
        assert_eq!(records[0].error_type, ErrorType::Dependency);
        assert!(!records[0].auto_fixable);
    }

    #[test]
    fn test_substring_severities() {
        let detector = ErrorDetector::new();
        let fatal = detector.detect("mkdir: cannot create directory 'x': Permission denied");
        assert_eq!(fatal[0].severity, Severity::Fatal);
        assert_eq!(fatal[0].error_type, ErrorType::Permission);
        assert_eq!(detector.detect("write error: No space left on device")[0].severity, Severity::Fatal);
        assert_eq!(detector.detect("Connection timeout while fetching")[0].severity, Severity::Critical);
    }

    #[test]
    fn test_unrecognized_npm_err_is_not_fixable() {
        let text = "npm ERR! Something odd happened\nnpm ERR! A complete log of this run can be found in: /x";
        let records = ErrorDetector::new().detect(text);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].severity, Severity::Error);
        assert!(!records[0].auto_fixable);
        assert_eq!(records[0].error_type, ErrorType::Unknown);

        let records = ErrorDetector::new().detect("npm ERR! code E404");
        assert_eq!(records[0].error_type, ErrorType::Dependency);
    }

    #[test]
    fn test_detect_is_pure_and_tolerant() {
        let detector = ErrorDetector::new();
        let text = "ok\nlib/main.dart:1:1: oops\nlib/main.dart:1:1: oops\n\u{0}\u{1f600}";
        let first = detector.detect(text);
        assert_eq!(first, ErrorDetector::new().detect(text));
        assert_eq!(first.len(), 1);
        assert!(detector.detect("").is_empty());
        assert!(detector.detect("Compiled successfully in 2.1s").is_empty());
    }
}
