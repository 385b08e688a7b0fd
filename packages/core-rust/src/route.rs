//! Ordered path-pattern route table.
//!
//! Patterns are either exact paths (`/health-check`) or a prefix ending in a
//! single wildcard segment (`/api/*`). Matching is one linear scan in
//! registration order and the first match wins. Wildcard prefixes must be
//! disjoint, which [`RouteTable::register`] enforces at startup, so the scan
//! order only decides between exact and wildcard entries.
//!
//! The table is generic over its terminal handler so that the queue-triggered
//! and HTTP-triggered entry points share one matching algorithm.

use std::fmt;

// ---------------------------------------------------------------------------
// Middleware
// ---------------------------------------------------------------------------

/// Pre-handlers applied, in order, before a route's terminal handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Middleware {
    /// Marks the request as a debug request: handler output is captured and
    /// returned as a diagnostic body.
    MarkDebug,
}

// ---------------------------------------------------------------------------
// RouteTarget
// ---------------------------------------------------------------------------

/// Terminal handlers of the standard route surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteTarget {
    /// Exact `/`.
    Root,
    /// Exact `/health-check`.
    HealthCheck,
    /// `/api/*` and `/_/api/*`.
    Api,
    /// `/wapi/*` and `/_/wapi/*`.
    WebApi,
}

impl RouteTarget {
    /// Whether this target is answered without reaching the invoker.
    #[must_use]
    pub fn is_health_check(self) -> bool {
        matches!(self, Self::Root | Self::HealthCheck)
    }
}

// ---------------------------------------------------------------------------
// RoutePattern
// ---------------------------------------------------------------------------

/// A parsed route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutePattern {
    /// Matches one path exactly.
    Exact(String),
    /// Matches every path starting with the stored prefix. The prefix keeps
    /// its trailing `/` (`/api/*` is stored as `/api/`).
    Prefix(String),
}

impl RoutePattern {
    /// Parses `"/exact"` or `"/prefix/*"`.
    ///
    /// # Errors
    ///
    /// Returns `RouteError::InvalidPattern` if the pattern does not start with
    /// `/` or uses `*` anywhere except as the whole final segment.
    pub fn parse(pattern: &str) -> Result<Self, RouteError> {
        let invalid = || RouteError::InvalidPattern {
            pattern: pattern.to_string(),
        };

        if !pattern.starts_with('/') {
            return Err(invalid());
        }

        match pattern.strip_suffix("/*") {
            Some(prefix) if !prefix.contains('*') => Ok(Self::Prefix(format!("{prefix}/"))),
            Some(_) => Err(invalid()),
            None if pattern.contains('*') => Err(invalid()),
            None => Ok(Self::Exact(pattern.to_string())),
        }
    }

    /// Returns the remainder path if `path` matches this pattern.
    ///
    /// Exact matches yield the path itself. Prefix matches yield the path with
    /// the prefix stripped and re-prefixed with `/`.
    #[must_use]
    pub fn matches(&self, path: &str) -> Option<String> {
        match self {
            Self::Exact(exact) => (exact == path).then(|| path.to_string()),
            Self::Prefix(prefix) => path
                .strip_prefix(prefix.as_str())
                .map(|rest| format!("/{rest}")),
        }
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(exact) => f.write_str(exact),
            Self::Prefix(prefix) => write!(f, "{prefix}*"),
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised while building a route table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    #[error("invalid route pattern: {pattern}")]
    InvalidPattern { pattern: String },
    #[error("wildcard route {pattern} overlaps already registered {existing}")]
    OverlappingPrefix { pattern: String, existing: String },
    #[error("exact route {pattern} is already registered")]
    DuplicateExact { pattern: String },
}

/// No registered pattern matched the path.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no route for path {path}")]
pub struct NoRoute {
    pub path: String,
}

// ---------------------------------------------------------------------------
// RouteTable
// ---------------------------------------------------------------------------

/// One registered route.
#[derive(Debug, Clone)]
pub struct RouteEntry<H> {
    pub pattern: RoutePattern,
    pub middlewares: Vec<Middleware>,
    pub handler: H,
}

/// The result of a successful match.
#[derive(Debug)]
pub struct RouteMatch<'a, H> {
    /// Path handed to the terminal handler.
    pub remainder: String,
    pub middlewares: &'a [Middleware],
    pub handler: &'a H,
}

/// Ordered route table. Precedence is registration order.
#[derive(Debug, Clone)]
pub struct RouteTable<H> {
    entries: Vec<RouteEntry<H>>,
}

impl<H> RouteTable<H> {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Register a route after all previously registered ones.
    ///
    /// # Errors
    ///
    /// Returns `RouteError` if the pattern is malformed, if a wildcard prefix
    /// and an existing wildcard prefix are prefixes of one another, or if an
    /// exact pattern is registered twice.
    pub fn register(
        &mut self,
        pattern: &str,
        middlewares: &[Middleware],
        handler: H,
    ) -> Result<(), RouteError> {
        let pattern = RoutePattern::parse(pattern)?;

        for existing in &self.entries {
            match (&pattern, &existing.pattern) {
                (RoutePattern::Prefix(new), RoutePattern::Prefix(old))
                    if new.starts_with(old.as_str()) || old.starts_with(new.as_str()) =>
                {
                    return Err(RouteError::OverlappingPrefix {
                        pattern: pattern.to_string(),
                        existing: existing.pattern.to_string(),
                    });
                }
                (RoutePattern::Exact(new), RoutePattern::Exact(old)) if new == old => {
                    return Err(RouteError::DuplicateExact {
                        pattern: pattern.to_string(),
                    });
                }
                _ => {}
            }
        }

        tracing::debug!(pattern = %pattern, middlewares = middlewares.len(), "route registered");
        self.entries.push(RouteEntry {
            pattern,
            middlewares: middlewares.to_vec(),
            handler,
        });
        Ok(())
    }

    /// Resolve `path` to the first matching route.
    ///
    /// # Errors
    ///
    /// Returns [`NoRoute`] if no registered pattern matches.
    pub fn match_path(&self, path: &str) -> Result<RouteMatch<'_, H>, NoRoute> {
        self.entries
            .iter()
            .find_map(|entry| {
                entry.pattern.matches(path).map(|remainder| RouteMatch {
                    remainder,
                    middlewares: &entry.middlewares,
                    handler: &entry.handler,
                })
            })
            .ok_or_else(|| NoRoute {
                path: path.to_string(),
            })
    }

    /// Registered entries in precedence order.
    #[must_use]
    pub fn entries(&self) -> &[RouteEntry<H>] {
        &self.entries
    }
}

impl<H> Default for RouteTable<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteTable<RouteTarget> {
    /// The fixed default route surface, in precedence order:
    ///
    /// 1. `/` (exact)
    /// 2. `/health-check` (exact)
    /// 3. `/api/*`
    /// 4. `/_/api/*` (debug)
    /// 5. `/wapi/*`
    /// 6. `/_/wapi/*` (debug)
    ///
    /// Anything else resolves to [`NoRoute`].
    ///
    /// # Errors
    ///
    /// Only fails if the built-in surface itself violated the registration
    /// rules.
    pub fn standard() -> Result<Self, RouteError> {
        let debug = [Middleware::MarkDebug];
        let mut table = Self::new();
        table.register("/", &[], RouteTarget::Root)?;
        table.register("/health-check", &[], RouteTarget::HealthCheck)?;
        table.register("/api/*", &[], RouteTarget::Api)?;
        table.register("/_/api/*", &debug, RouteTarget::Api)?;
        table.register("/wapi/*", &[], RouteTarget::WebApi)?;
        table.register("/_/wapi/*", &debug, RouteTarget::WebApi)?;
        Ok(table)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
