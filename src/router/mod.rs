//! # Router Module
//!
//! Route pattern matching and parameter rules.
//!
//! ## Overview
//!
//! The router is responsible for:
//! - Deciding whether a registered pattern matches a request path
//! - Extracting positional parameters from the matched segments
//! - Validating and converting parameter values per named rule
//! - Holding the registered [`Route`] definitions
//!
//! ## Pattern syntax
//!
//! | Pattern            | Matches                         | Params          |
//! |--------------------|---------------------------------|-----------------|
//! | `/about`           | `/about`, `/about/`             | `[]`            |
//! | `/users/:id`       | `/users/42`                     | `["42"]`        |
//! | `/news/:y?/:m?`    | `/news`, `/news/2024`, `/news/2024/05` | 0-2 values |
//! | `/files/*`         | `/files/a/b/c`                  | `[]`            |
//!
//! ## Example
//!
//! ```rust
//! use fastsite::router::{match_pattern, MatchOptions, ParamRules, ParamValue};
//!
//! let rules = ParamRules::new();
//! let params = match_pattern("/a/:y?/:m?", "/a/2024", &rules, MatchOptions::default())
//!     .unwrap()
//!     .unwrap();
//! assert_eq!(params.as_slice(), &[ParamValue::Str("2024".into())]);
//! ```
//!
//! The matcher only returns what it found: defaulting missing optional values
//! is the controller's job.

mod core;
mod params;
mod route;

pub use core::{match_pattern, validate_pattern, MatchOptions, ParamList, MAX_INLINE_PARAMS};
pub use params::{Converter, ParamCheck, ParamRule, ParamRules, ParamValue, Validation};
pub use route::{Route, ALL_METHODS};
