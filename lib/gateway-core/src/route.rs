//! Route table with compiled path-pattern matching
//!
//! Patterns are segment lists compiled once at registration time. A
//! segment beginning with `:` is a named placeholder and matches any
//! non-empty path segment; all other segments require byte equality.

use crate::service::Method;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A routable rule binding a path pattern to a backend service
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServiceRoute {
    pub path: String,
    pub method: Method,
    pub service: String,
    #[serde(default)]
    pub requires_auth: bool,
    /// Allowed role names; `None` means any authenticated caller
    #[serde(default)]
    pub roles: Option<Vec<String>>,
}

/// One compiled pattern segment
#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

#[derive(Clone, Debug)]
struct CompiledRoute {
    route: ServiceRoute,
    segments: Vec<Segment>,
}

/// Result of a successful route lookup
#[derive(Clone, Debug)]
pub struct RouteMatch {
    pub route: ServiceRoute,
    /// Values captured by `:name` placeholders
    pub params: HashMap<String, String>,
}

/// Ordered route table; first match wins
#[derive(Clone, Debug, Default)]
pub struct RouteTable {
    routes: Vec<CompiledRoute>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Append a route, compiling its pattern
    pub fn add(&mut self, route: ServiceRoute) {
        let segments = compile_pattern(&route.path);
        self.routes.push(CompiledRoute { route, segments });
    }

    /// Scan routes in registration order; method matching is exact
    pub fn find(&self, path: &str, method: Method) -> Option<RouteMatch> {
        let candidate = split_path(path);

        for compiled in &self.routes {
            if compiled.route.method != method {
                continue;
            }
            if compiled.segments.len() != candidate.len() {
                continue;
            }

            let mut params = HashMap::new();
            let matched = compiled
                .segments
                .iter()
                .zip(candidate.iter())
                .all(|(segment, value)| match segment {
                    Segment::Literal(lit) => lit == value,
                    Segment::Param(name) => {
                        if value.is_empty() {
                            return false;
                        }
                        params.insert(name.clone(), (*value).to_string());
                        true
                    }
                });

            if matched {
                return Some(RouteMatch {
                    route: compiled.route.clone(),
                    params,
                });
            }
        }

        None
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

fn compile_pattern(pattern: &str) -> Vec<Segment> {
    split_path(pattern)
        .into_iter()
        .map(|seg| match seg.strip_prefix(':') {
            Some(name) => Segment::Param(name.to_string()),
            None => Segment::Literal(seg.to_string()),
        })
        .collect()
}

// No normalization: empty segments are kept so `/a/` and `//a` do not
// alias `/a`. Pattern and path are split the same way, so the shared
// leading empty segment lines up as a literal match.
fn split_path(path: &str) -> Vec<&str> {
    path.split('/').collect()
}
