//! Fenced code block extraction from model replies.

use forge_templates::normalize_path;

/// Code taken from a model reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    /// Language from the fence info string.
    pub language: Option<String>,
    /// Path from the fence info string, normalized.
    pub path: Option<String>,
    pub content: String,
    /// False when the reply had no fence and was used whole.
    pub fenced: bool,
}

impl CodeBlock {
    fn unfenced(reply: &str) -> Self {
        Self {
            language: None,
            path: None,
            content: reply.to_string(),
            fenced: false,
        }
    }
}

fn fence_marker(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    trimmed
        .strip_prefix("```")
        .or_else(|| trimmed.strip_prefix("~~~"))
}

fn looks_like_path(token: &str) -> bool {
    token.contains('/') || token.contains('.')
}

/// Split a fence info string (`dart lib/main.dart`, `path=lib/a.dart`,
/// `lib/a.dart`) into language and path.
fn parse_info(info: &str) -> (Option<String>, Option<String>) {
    let mut language = None;
    let mut path = None;

    for token in info.split_whitespace() {
        let token = token.trim_matches(|c| c == '"' || c == '\'' || c == '`');
        let (key, value) = match token.split_once('=') {
            Some((k, v)) => (Some(k), v.trim_matches(|c| c == '"' || c == '\'')),
            None => (None, token),
        };
        let value = value.trim_end_matches(':');
        if value.is_empty() {
            continue;
        }
        match key {
            Some("path" | "file" | "title" | "filename") => path = Some(normalize_path(value)),
            Some(_) => {}
            None if language.is_none() && path.is_none() && !looks_like_path(value) => {
                language = Some(value.to_lowercase());
            }
            None if path.is_none() && looks_like_path(value) => path = Some(normalize_path(value)),
            None => {}
        }
    }
    (language, path)
}

/// Extract the first fenced block of `reply`.
///
/// Without a fence the whole reply is used as-is. An unterminated fence
/// runs to the end of the reply.
pub fn extract_code_block(reply: &str) -> CodeBlock {
    let mut lines = reply.lines();
    let mut opening = None;
    for line in lines.by_ref() {
        if let Some(info) = fence_marker(line) {
            opening = Some(info);
            break;
        }
    }
    let Some(info) = opening else {
        return CodeBlock::unfenced(reply);
    };

    let (language, path) = parse_info(info);
    let mut body = Vec::new();
    for line in lines {
        if fence_marker(line).is_some_and(|rest| rest.trim().is_empty()) {
            break;
        }
        body.push(line);
    }

    let mut content = body.join("\n");
    if !content.is_empty() {
        content.push('\n');
    }
    CodeBlock {
        language,
        path,
        content,
        fenced: true,
    }
}

/// Extract the block declared for `path`, falling back to the first block.
pub fn extract_for_path(reply: &str, path: &str) -> CodeBlock {
    let wanted = normalize_path(path);
    let mut rest = reply;
    loop {
        let block = extract_code_block(rest);
        if !block.fenced {
            break;
        }
        if block.path.as_deref() == Some(wanted.as_str()) {
            return block;
        }
        // Move past this block's closing fence.
        let Some(next) = skip_block(rest) else {
            break;
        };
        rest = next;
    }
    extract_code_block(reply)
}

fn skip_block(text: &str) -> Option<&str> {
    let mut offset = 0;
    let mut inside = false;
    for line in text.split_inclusive('\n') {
        offset += line.len();
        if let Some(info) = fence_marker(line) {
            if inside && info.trim().is_empty() {
                return Some(&text[offset..]);
            }
            inside = true;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_and_path() {
        let reply = "Here you go:\n```dart lib/main.dart\nvoid main() {}\n```\nEnjoy!";
        let block = extract_code_block(reply);
        assert!(block.fenced);
        assert_eq!(block.language.as_deref(), Some("dart"));
        assert_eq!(block.path.as_deref(), Some("lib/main.dart"));
        assert_eq!(block.content, "void main() {}\n");
    }

    #[test]
    fn test_no_fence_uses_whole_reply() {
        let block = extract_code_block("print('hi')");
        assert!(!block.fenced);
        assert_eq!(block.content, "print('hi')");
    }

    #[test]
    fn test_unterminated_fence_runs_to_end() {
        let block = extract_code_block("```python\nimport os\nprint(os.name)");
        assert_eq!(block.language.as_deref(), Some("python"));
        assert_eq!(block.content, "import os\nprint(os.name)\n");
    }

    #[test]
    fn test_info_string_variants() {
        assert_eq!(
            parse_info("tsx title=\"src/App.tsx\""),
            (Some("tsx".into()), Some("src/App.tsx".into()))
        );
        assert_eq!(parse_info("./lib/app.dart"), (None, Some("lib/app.dart".into())));
        assert_eq!(parse_info(""), (None, None));
    }

    #[test]
    fn test_extract_for_path_picks_matching_block() {
        let reply = "```yaml pubspec.yaml\nname: a\n```\n\n```dart lib/main.dart\nvoid main() {}\n```\n";
        let block = extract_for_path(reply, "lib/main.dart");
        assert_eq!(block.content, "void main() {}\n");
        let first = extract_for_path(reply, "README.md");
        assert_eq!(first.content, "name: a\n");
    }
}
