//! Router core - route pattern matching.
//!
//! Patterns are `/`-separated segments:
//!
//! - a literal segment must equal the path segment (case sensitivity per
//!   [`MatchOptions`]),
//! - `:name` captures the segment, subject to the [`ParamRules`] for `:name`,
//! - a trailing `?` marks a segment optional; optional segments must be
//!   contiguous at the end of the pattern,
//! - a final `*` accepts and discards any remaining path segments.
//!
//! Matching returns `Ok(None)` for no-match and `Ok(Some(params))` for a
//! match, where an empty list means "matched without parameters". A malformed
//! pattern is an `Err(ConfigError)`, never a silent no-match.

use smallvec::SmallVec;
use tracing::{debug, warn};

use super::params::{ParamCheck, ParamRules, ParamValue};
use crate::error::ConfigError;

/// Maximum number of captured parameters before heap allocation.
/// Most routes capture ≤4 values (e.g. /users/:id/posts/:post_id).
pub const MAX_INLINE_PARAMS: usize = 8;

/// Positional parameters captured by a match, in pattern order.
pub type ParamList = SmallVec<[ParamValue; MAX_INLINE_PARAMS]>;

const PARAM_SIGIL: char = ':';
const OPTIONAL_MARKER: char = '?';
const WILDCARD: &str = "*";

/// URL comparison switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchOptions {
    /// Compare literal segments case-sensitively (default `true`)
    pub case_sensitive: bool,
    /// Disable trailing-slash normalization (default `false`)
    pub strict: bool,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            case_sensitive: true,
            strict: false,
        }
    }
}

/// Check a route pattern for definition errors without matching anything.
///
/// # Errors
///
/// - [`ConfigError::EmptyPattern`] for an empty pattern
/// - [`ConfigError::MisplacedWildcard`] when `*` is not the final segment
/// - [`ConfigError::RequiredAfterOptional`] when a required segment follows
///   an optional one
pub fn validate_pattern(pattern: &str) -> Result<(), ConfigError> {
    if pattern.is_empty() {
        return Err(ConfigError::EmptyPattern);
    }
    check_wildcard(pattern)?;
    split_optional(pattern).map(|_| ())
}

/// Match a request path against a route pattern.
///
/// # Errors
///
/// Returns a [`ConfigError`] for an empty pattern or path and for malformed
/// patterns (see [`validate_pattern`]).
pub fn match_pattern(
    pattern: &str,
    path: &str,
    rules: &ParamRules,
    opts: MatchOptions,
) -> Result<Option<ParamList>, ConfigError> {
    if pattern.is_empty() {
        return Err(ConfigError::EmptyPattern);
    }
    if path.is_empty() {
        return Err(ConfigError::EmptyPath);
    }

    let has_sigil = pattern.contains(PARAM_SIGIL);
    let has_wildcard = pattern.contains('*');

    // Fast path: plain literal pattern that is byte-identical to the path
    if !has_sigil && !has_wildcard && pattern == path {
        return Ok(Some(ParamList::new()));
    }

    if has_wildcard {
        check_wildcard(pattern)?;
    }

    let path = normalize_trailing_slash(pattern, path, opts.strict);

    let (required, optional) = split_optional(pattern)?;
    if optional.is_empty() {
        return Ok(match_segments(&required, path, rules, opts));
    }

    // Try from "all optional segments present" down to "none present"
    for take in (0..=optional.len()).rev() {
        let mut segments: Vec<&str> = Vec::with_capacity(required.len() + take);
        segments.extend_from_slice(&required);
        segments.extend_from_slice(&optional[..take]);
        if let Some(params) = match_segments(&segments, path, rules, opts) {
            debug!(
                pattern = %pattern,
                path = %path,
                optional_used = take,
                "Matched with optional segments"
            );
            return Ok(Some(params));
        }
    }
    Ok(None)
}

/// Strip one trailing `/` from the path unless strict mode is on or the
/// pattern itself ends with `/` or `*`.
fn normalize_trailing_slash<'p>(pattern: &str, path: &'p str, strict: bool) -> &'p str {
    if strict || path.len() <= 1 || !path.ends_with('/') {
        return path;
    }
    if pattern.ends_with('/') || pattern.ends_with('*') {
        return path;
    }
    &path[..path.len() - 1]
}

fn check_wildcard(pattern: &str) -> Result<(), ConfigError> {
    let segments: Vec<&str> = pattern.split('/').collect();
    let last = segments.len() - 1;
    for (i, seg) in segments.iter().enumerate() {
        if seg.contains('*') && (i != last || *seg != WILDCARD) {
            warn!(pattern = %pattern, "Wildcard used outside the final segment");
            return Err(ConfigError::MisplacedWildcard {
                pattern: pattern.to_string(),
            });
        }
    }
    Ok(())
}

/// Split a pattern into its required segments and its trailing optional
/// segments (with the `?` marker removed).
fn split_optional(pattern: &str) -> Result<(Vec<&str>, Vec<&str>), ConfigError> {
    let mut required = Vec::new();
    let mut optional = Vec::new();
    for seg in pattern.split('/') {
        match seg.strip_suffix(OPTIONAL_MARKER) {
            Some(stripped) => optional.push(stripped),
            None if !optional.is_empty() => {
                return Err(ConfigError::RequiredAfterOptional {
                    pattern: pattern.to_string(),
                    segment: seg.to_string(),
                });
            }
            None => required.push(seg),
        }
    }
    Ok((required, optional))
}

/// Compare a fully required pattern segment-by-segment against the path.
fn match_segments(
    pattern: &[&str],
    path: &str,
    rules: &ParamRules,
    opts: MatchOptions,
) -> Option<ParamList> {
    let path_segments: SmallVec<[&str; 16]> = path.split('/').collect();
    let wildcard = pattern.last() == Some(&WILDCARD);
    let compared = if wildcard {
        if path_segments.len() < pattern.len() {
            return None;
        }
        &pattern[..pattern.len() - 1]
    } else {
        if path_segments.len() != pattern.len() {
            return None;
        }
        pattern
    };

    let mut params = ParamList::new();
    for (pat, raw) in compared.iter().zip(path_segments.iter()) {
        let value = match urlencoding::decode(raw) {
            Ok(v) => v,
            Err(_) => {
                debug!(segment = %raw, "Path segment is not valid UTF-8 after decoding");
                return None;
            }
        };

        let literal_match = if opts.case_sensitive {
            *pat == value.as_ref()
        } else {
            pat.to_lowercase() == value.to_lowercase()
        };
        if literal_match {
            continue;
        }

        if pat.starts_with(PARAM_SIGIL) {
            match rules.check(pat, &value) {
                ParamCheck::Valid(v) => params.push(v),
                ParamCheck::NotApplicable => params.push(ParamValue::Str(value.into_owned())),
                ParamCheck::Invalid => return None,
            }
            continue;
        }
        return None;
    }
    Some(params)
}
