//! Redirect target validation against the page routes this app serves.

use domain::services::RouteResolver;

/// Page routes a redirect may point to. `{id}` matches a decimal id.
pub const PAGE_ROUTES: &[&str] = &["/events", "/events/{id}"];

/// Resolves redirect targets against [`PAGE_ROUTES`].
#[derive(Debug, Clone, Default)]
pub struct AppRouteResolver {
    patterns: Vec<Vec<Segment>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Id,
}

impl AppRouteResolver {
    pub fn new() -> Self {
        Self::with_routes(PAGE_ROUTES)
    }

    pub fn with_routes(routes: &[&str]) -> Self {
        let patterns = routes
            .iter()
            .map(|route| {
                split(route)
                    .map(|segment| match segment {
                        "{id}" => Segment::Id,
                        literal => Segment::Literal(literal.to_string()),
                    })
                    .collect()
            })
            .collect();
        Self { patterns }
    }

    fn matches(pattern: &[Segment], path: &str) -> bool {
        let segments: Vec<&str> = split(path).collect();
        segments.len() == pattern.len()
            && pattern.iter().zip(&segments).all(|(p, s)| match p {
                Segment::Literal(literal) => literal == s,
                Segment::Id => !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()),
            })
    }
}

impl RouteResolver for AppRouteResolver {
    fn is_valid_path(&self, target: &str) -> bool {
        // Local absolute paths only: no scheme, no host, no protocol-relative `//`.
        if !target.starts_with('/') || target.starts_with("//") || target.contains('\\') {
            return false;
        }
        // The target ends up in a Location header: printable ASCII only.
        if !target.bytes().all(|b| b.is_ascii_graphic()) {
            return false;
        }
        let path = target.split(['?', '#']).next().unwrap_or_default();
        if path.contains("//") {
            return false;
        }
        self.patterns
            .iter()
            .any(|pattern| Self::matches(pattern, path))
    }
}

fn split(path: &str) -> impl Iterator<Item = &str> {
    path.trim_start_matches('/')
        .split('/')
        .filter(|segment| !segment.is_empty())
}
