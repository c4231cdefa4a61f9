/*!
 * Limit Parsing
 *
 * Pure functions over the budget strings. Nothing here touches the
 * environment or the filesystem, so the runtime wiring can be tested
 * separately from the syntax.
 *
 * Syntax (case insensitive):
 *   list  := entry (',' entry)*
 *   entry := pattern ':' value
 *   value := digits ('k' | 'm')?
 */

use crate::core::errors::ConfigError;
use crate::core::limits::{KB, MB};
use crate::core::types::Bytes;
use globset::{GlobBuilder, GlobMatcher};
use tracing::warn;

/// One `pattern:value` entry of the process budget list
#[derive(Debug, Clone)]
pub struct LimitEntry {
    pattern: String,
    matcher: GlobMatcher,
    bytes: Bytes,
}

impl LimitEntry {
    /// Build an entry; the pattern is anchored with a leading `*` so a bare
    /// executable name also matches a full argv[0] path
    pub fn new(pattern: &str, bytes: Bytes) -> Result<Self, ConfigError> {
        let pattern = anchor_pattern(pattern);
        let matcher = compile_pattern(&pattern)?;
        Ok(Self {
            pattern,
            matcher,
            bytes,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn bytes(&self) -> Bytes {
        self.bytes
    }

    pub fn matches(&self, process_name: &str) -> bool {
        self.matcher.is_match(process_name)
    }
}

/// Prefix with `*` and collapse wildcard runs (`**` means nothing more
/// than `*` to fnmatch-style matching)
fn anchor_pattern(pattern: &str) -> String {
    let mut anchored = String::with_capacity(pattern.len() + 1);
    anchored.push('*');
    for ch in pattern.trim().to_lowercase().chars() {
        if ch == '*' && anchored.ends_with('*') {
            continue;
        }
        anchored.push(ch);
    }
    anchored
}

/// Compile a case-insensitive glob where `*` also crosses `/`
pub fn compile_pattern(pattern: &str) -> Result<GlobMatcher, ConfigError> {
    GlobBuilder::new(pattern)
        .case_insensitive(true)
        .literal_separator(false)
        .backslash_escape(true)
        .build()
        .map(|glob| glob.compile_matcher())
        .map_err(|e| ConfigError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })
}

/// Parse `digits[k|K|m|M]` into bytes
pub fn parse_byte_value(raw: &str) -> Result<Bytes, ConfigError> {
    let value = raw.trim().to_ascii_lowercase();
    let (digits, units) = if let Some(stripped) = value.strip_suffix('k') {
        (stripped, KB)
    } else if let Some(stripped) = value.strip_suffix('m') {
        (stripped, MB)
    } else {
        (value.as_str(), 1)
    };

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ConfigError::InvalidByteValue(raw.to_string()));
    }

    digits
        .parse::<Bytes>()
        .ok()
        .and_then(|n| n.checked_mul(units))
        .ok_or_else(|| ConfigError::InvalidByteValue(raw.to_string()))
}

/// Parse a single `pattern:value` entry
pub fn parse_limit_entry(raw: &str) -> Result<LimitEntry, ConfigError> {
    let mut parts = raw.split(':');
    let (Some(pattern), Some(value), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(ConfigError::MalformedEntry(raw.to_string()));
    };
    let bytes = parse_byte_value(value)?;
    LimitEntry::new(pattern, bytes)
}

/// Parse the whole budget list, skipping entries that fail to parse
pub fn parse_limit_list(raw: &str) -> Vec<LimitEntry> {
    raw.split(',')
        .filter(|entry| !entry.trim().is_empty())
        .filter_map(|entry| match parse_limit_entry(entry) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!(entry = entry, error = %e, "Skipping memory limit entry");
                None
            }
        })
        .collect()
}

/// First entry, in list order, whose pattern matches the process name
pub fn match_process_limit(entries: &[LimitEntry], process_name: &str) -> Option<Bytes> {
    let name = process_name.to_lowercase();
    entries
        .iter()
        .find(|entry| entry.matches(&name))
        .map(LimitEntry::bytes)
}
