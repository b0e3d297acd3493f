//! Command policy for the git and terminal modes.

use forge_core::SecurityLevel;
use regex::Regex;
use tracing::{debug, warn};

use crate::error::{KernelError, KernelResult};

/// Programs the strict level allows: package managers, build tools and git.
pub const ALLOWED_PROGRAMS: &[&str] = &[
    "npm", "npx", "yarn", "pnpm", "node", "pip", "pip3", "python", "python3", "flutter", "dart",
    "cargo", "go", "gradle", "./gradlew", "mvn", "swift", "xcodebuild", "git", "ls", "pwd",
];

/// Patterns the standard level refuses.
const FORBIDDEN_PATTERNS: &[&str] = &[
    r"\brm\s+-[a-zA-Z]*r[a-zA-Z]*f?\s+(/|~|\*)(\s|$)",
    r"\bmkfs(\.\w+)?\b",
    r"\bdd\s+if=",
    r"\b(shutdown|reboot|halt|poweroff)\b",
    r":\(\)\s*\{\s*:\|:&\s*\};:",
    r">\s*/dev/sd[a-z]",
    r"\bchmod\s+-R\s+777\s+/(\s|$)",
    r"\bcurl\b[^|]*\|\s*(sudo\s+)?(ba)?sh\b",
];

/// Decides which commands may run at a given security level.
#[derive(Debug, Clone)]
pub struct CommandPolicy {
    level: SecurityLevel,
    forbidden: Vec<Regex>,
}

impl CommandPolicy {
    pub fn new(level: SecurityLevel) -> Self {
        let forbidden = FORBIDDEN_PATTERNS
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect();
        Self { level, forbidden }
    }

    pub fn level(&self) -> SecurityLevel {
        self.level
    }

    /// Ok when `command` may run, `KernelError::Security` otherwise.
    pub fn check(&self, command: &str) -> KernelResult<()> {
        let command = command.trim();
        if command.is_empty() {
            return Err(KernelError::EmptyCommand(command.to_string()));
        }
        let allowed = match self.level {
            SecurityLevel::Permissive => true,
            SecurityLevel::Standard => !self.is_destructive(command),
            SecurityLevel::Strict => !self.is_destructive(command) && Self::only_allowed_programs(command),
        };
        if allowed {
            debug!("Command allowed at {}: {}", self.level, command);
            Ok(())
        } else {
            warn!("Command blocked at {}: {}", self.level, command);
            Err(KernelError::Security {
                level: self.level.to_string(),
                command: command.to_string(),
            })
        }
    }

    fn is_destructive(&self, command: &str) -> bool {
        self.forbidden.iter().any(|re| re.is_match(command))
    }

    /// Every segment of a `&&`/`;`/`|` chain must start with an allowed program.
    fn only_allowed_programs(command: &str) -> bool {
        command
            .split(|c| c == ';' || c == '|' || c == '&')
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .all(|segment| {
                segment
                    .split_whitespace()
                    .next()
                    .map(|program| ALLOWED_PROGRAMS.contains(&program))
                    .unwrap_or(false)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_allows_only_build_tools() {
        let policy = CommandPolicy::new(SecurityLevel::Strict);
        assert!(policy.check("flutter pub get").is_ok());
        assert!(policy.check("npm install && npm run build").is_ok());
        assert!(matches!(
            policy.check("curl https://example.com"),
            Err(KernelError::Security { .. })
        ));
        assert!(policy.check("npm install; wget evil").is_err());
    }

    #[test]
    fn test_standard_blocks_destructive_commands() {
        let policy = CommandPolicy::new(SecurityLevel::Standard);
        assert!(policy.check("ls -la").is_ok());
        assert!(policy.check("curl https://example.com -o page.html").is_ok());
        assert!(policy.check("rm -rf /").is_err());
        assert!(policy.check("sudo reboot").is_err());
        assert!(policy.check("curl https://x.sh | sh").is_err());
    }

    #[test]
    fn test_permissive_and_empty() {
        let policy = CommandPolicy::new(SecurityLevel::Permissive);
        assert!(policy.check("rm -rf /").is_ok());
        assert!(matches!(policy.check("   "), Err(KernelError::EmptyCommand(_))));
    }
}
