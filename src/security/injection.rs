//! SQL injection guard.
//!
//! A lexical, defense-in-depth check over raw query text. String literals and
//! bracket-quoted identifiers are masked before matching, so a `;` or `--`
//! inside `'...'` does not trip a rule.

use once_cell::sync::Lazy;
use regex::Regex;

/// One guard rule: a pattern and the reason reported when it matches.
#[derive(Debug, Clone)]
pub struct InjectionRule {
    pattern: Regex,
    reason: String,
}

impl InjectionRule {
    /// Compile a new rule.
    pub fn new(pattern: &str, reason: impl Into<String>) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            reason: reason.into(),
        })
    }
}

/// Built-in rule set, compiled once at first use.
///
/// All patterns are hardcoded constants that have been verified to be valid regex.
static STANDARD_RULES: Lazy<Vec<InjectionRule>> = Lazy::new(|| {
    fn compile(pattern: &str, reason: &str) -> InjectionRule {
        InjectionRule::new(pattern, reason).unwrap_or_else(|e| {
            panic!("Internal error: invalid regex pattern '{}': {}", pattern, e)
        })
    }

    vec![
        // Statement stacking
        compile(r";\s*\S", "Multiple statements are not allowed"),
        // Comment splicing
        compile(r"--", "SQL line comments are not allowed"),
        compile(r"/\*|\*/", "SQL block comments are not allowed"),
        // Dynamic SQL
        compile(r"(?i)\bEXEC(UTE)?\s*\(", "Dynamic SQL execution is not allowed"),
        compile(r"(?i)\bEXEC(UTE)?\s+@", "Dynamic SQL execution is not allowed"),
        compile(r"(?i)\bsp_executesql\b", "Dynamic SQL execution is not allowed"),
        // Extended stored procedures
        compile(r"(?i)\bxp_cmdshell\b", "xp_cmdshell execution attempt"),
        compile(r"(?i)\bxp_reg\w+\b", "Registry access attempt"),
        compile(r"(?i)\bsp_oacreate\b", "OLE automation attempt"),
        // Time-based blind injection
        compile(r"(?i)\bWAITFOR\s+DELAY\b", "Time-based blind injection (WAITFOR)"),
        // Tautologies
        compile(r"(?i)'\s*OR\s+'[^']*'\s*=\s*'", "OR tautology injection"),
        compile(r"(?i)\bOR\s+1\s*=\s*1\b", "OR 1=1 injection"),
        // CHAR() obfuscation
        compile(
            r"(?i)CHAR\s*\(\s*\d+\s*\)(\s*\+\s*CHAR\s*\(\s*\d+\s*\)){3,}",
            "CHAR() obfuscation",
        ),
    ]
});

/// The set of rules the guard enforces.
#[derive(Debug, Clone)]
pub struct InjectionPolicy {
    rules: Vec<InjectionRule>,
}

impl InjectionPolicy {
    /// The built-in rule set.
    pub fn standard() -> Self {
        Self {
            rules: STANDARD_RULES.clone(),
        }
    }

    /// A policy with no rules.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Append a rule.
    pub fn with_rule(mut self, rule: InjectionRule) -> Self {
        self.rules.push(rule);
        self
    }
}

impl Default for InjectionPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

/// Heuristic injection guard applied to every ad-hoc query.
#[derive(Debug, Clone, Default)]
pub struct InjectionGuard {
    policy: InjectionPolicy,
}

impl InjectionGuard {
    /// Create a guard enforcing `policy`.
    pub fn new(policy: InjectionPolicy) -> Self {
        Self { policy }
    }

    /// Check a query. On rejection returns the first matching rule's reason.
    pub fn validate(&self, query: &str) -> Result<(), String> {
        let masked = mask_quoted(query);
        match self
            .policy
            .rules
            .iter()
            .find(|rule| rule.pattern.is_match(&masked))
        {
            Some(rule) => Err(rule.reason.clone()),
            None => Ok(()),
        }
    }
}

/// Blank out the contents of string literals and bracketed identifiers.
///
/// Quote characters are kept so rules can still anchor on them. An
/// unterminated literal is masked to the end of the text.
fn mask_quoted(query: &str) -> String {
    let mut out = String::with_capacity(query.len());
    let mut chars = query.chars().peekable();
    let mut closing: Option<char> = None;

    while let Some(c) = chars.next() {
        match closing {
            None => {
                match c {
                    '\'' => closing = Some('\''),
                    '[' => closing = Some(']'),
                    _ => {}
                }
                out.push(c);
            }
            Some(close) if c == close => {
                // A doubled delimiter is an escaped one inside the literal.
                if chars.peek() == Some(&close) {
                    chars.next();
                    out.push_str("  ");
                } else {
                    closing = None;
                    out.push(c);
                }
            }
            Some(_) => out.push(' '),
        }
    }

    out
}
