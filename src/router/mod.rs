//! Request routing: map methods and URL patterns to handlers.
//!
//! Three pattern styles are supported:
//!
//! | Pattern              | Example match              | Captured params               |
//! |----------------------|----------------------------|-------------------------------|
//! | `/users`             | `/users`                   | *(none)*                      |
//! | `/users/:id`         | `/users/42`                | `id → "42"`                   |
//! | `/files/*`           | `/files/docs/readme.txt`   | `* → "docs/readme.txt"`       |
//!
//! Patterns are normalized at registration (leading `/` added, trailing `/`
//! stripped). Incoming paths are matched as sent: `/users/` does not match
//! `/users`.
//!
//! Resolution tries an exact literal match first, then every route in
//! registration order.

use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;

use crate::http::query::percent_decode;
use crate::http::{Method, Request, Response, ResponseError};

/// Key under which a trailing wildcard stores the rest of the path.
pub const WILDCARD: &str = "*";

/// Errors a handler may return.
///
/// The connection supervisor answers `500 Internal Server Error` if the
/// handler had not started its reply, and closes the connection otherwise.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Response(#[from] ResponseError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Message(String),
}

impl HandlerError {
    /// Creates an error from a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        HandlerError::Message(message.into())
    }
}

/// What every handler returns.
pub type HandlerResult = Result<(), HandlerError>;

/// A boxed handler future.
pub type HandlerFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send>>;

/// Type-erased async handler.
///
/// Handlers are stored behind `Arc<dyn Fn(…)>` so the route table can be
/// shared across connection tasks. Register them through [`Router::get`] and
/// friends rather than building this type directly; any
/// `Fn(Request, Response) -> impl Future<Output = HandlerResult>` that is
/// `Send + Sync + 'static` will do.
pub type Handler = Arc<dyn Fn(Request, Response) -> HandlerFuture + Send + Sync + 'static>;

/// Path parameters bound by a matched route, in pattern order.
///
/// # Examples
///
/// ```
/// use hasty::router::PathParams;
///
/// let mut params = PathParams::new();
/// params.insert("id", "42");
/// assert_eq!(params.get("id"), Some("42"));
/// assert_eq!(params.wildcard(), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams {
    inner: Vec<(String, String)>,
}

impl PathParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `name`, replacing an earlier binding of the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.inner.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.inner.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// The remainder captured by a trailing `*`.
    pub fn wildcard(&self) -> Option<&str> {
        self.get(WILDCARD)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

// A single path segment, either a literal string or a named capture (`:name`).
#[derive(Debug, Clone)]
enum Segment {
    Static(String),
    Parameter(String),
}

#[derive(Debug, Clone)]
enum Pattern {
    Exact(String),
    Parameterized { segments: Vec<Segment> },
    // Prefix without the trailing `/*`; empty for a root catch-all.
    Wildcard(String),
}

// Outcome of matching one pattern.
enum Match {
    Hit(PathParams),
    Miss,
    Forbidden,
}

impl Pattern {
    fn parse(pattern: &str) -> Self {
        let pattern = normalize(pattern);

        if let Some(prefix) = pattern.strip_suffix("/*") {
            return Pattern::Wildcard(prefix.to_owned());
        }

        let segments: Vec<Segment> = pattern[1..]
            .split('/')
            .map(|s| match s.strip_prefix(':') {
                Some(name) => Segment::Parameter(name.to_owned()),
                None => Segment::Static(s.to_owned()),
            })
            .collect();

        if segments.iter().any(|s| matches!(s, Segment::Parameter(_))) {
            Pattern::Parameterized { segments }
        } else {
            Pattern::Exact(pattern)
        }
    }

    // `raw_path` supplies segment boundaries and parameter values; `path` is
    // the decoded form used for literal comparisons.
    fn matches(&self, path: &str, raw_path: &str) -> Match {
        match self {
            Pattern::Exact(p) if p == path => Match::Hit(PathParams::new()),
            Pattern::Exact(_) => Match::Miss,
            Pattern::Parameterized { segments } => {
                let raw_segments: Vec<&str> = raw_path
                    .strip_prefix('/')
                    .unwrap_or(raw_path)
                    .split('/')
                    .collect();
                if raw_segments.len() != segments.len() {
                    return Match::Miss;
                }

                let mut params = PathParams::new();
                for (segment, raw) in segments.iter().zip(raw_segments) {
                    let decoded = percent_decode(raw).unwrap_or_else(|_| raw.into());
                    match segment {
                        Segment::Static(literal) if *literal == decoded => {}
                        Segment::Static(_) => return Match::Miss,
                        Segment::Parameter(name) => params.insert(name.clone(), decoded),
                    }
                }
                Match::Hit(params)
            }
            Pattern::Wildcard(prefix) => {
                let Some(rest) = path.strip_prefix(prefix.as_str()) else {
                    return Match::Miss;
                };
                if !(rest.is_empty() || rest.starts_with('/')) {
                    return Match::Miss;
                }

                let tail = rest.trim_start_matches('/');
                if tail.split(['/', '\\']).any(|s| s == "..") {
                    return Match::Forbidden;
                }
                let mut params = PathParams::new();
                params.insert(WILDCARD, tail);
                Match::Hit(params)
            }
        }
    }
}

/// Adds a leading `/` and strips trailing ones (root stays `/`).
fn normalize(path: &str) -> String {
    let mut normalized = if path.starts_with('/') {
        path.to_owned()
    } else {
        format!("/{path}")
    };
    while normalized.len() > 1 && normalized.ends_with('/') {
        normalized.pop();
    }
    normalized
}

struct Route {
    method: Method,
    pattern: Pattern,
    handler: Handler,
}

/// Result of [`Router::resolve`].
pub enum Resolution<'a> {
    Matched {
        handler: &'a Handler,
        params: PathParams,
    },
    NotFound,
    /// A wildcard route matched but the remainder tried to climb out with `..`.
    Forbidden,
}

impl std::fmt::Debug for Resolution<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resolution::Matched { params, .. } => {
                f.debug_struct("Matched").field("params", params).finish()
            }
            Resolution::NotFound => f.write_str("NotFound"),
            Resolution::Forbidden => f.write_str("Forbidden"),
        }
    }
}

/// The route table.
///
/// Built before the server starts and shared read-only afterwards.
///
/// # Examples
///
/// ```
/// use hasty::http::Method;
/// use hasty::router::{Resolution, Router};
///
/// let mut router = Router::new();
/// router.get("/users/:id", |req, res| async move {
///     let id = req.param("id").unwrap_or_default().to_owned();
///     res.send(id).await?;
///     Ok(())
/// });
///
/// match router.resolve(Method::Get, "/users/42", "/users/42") {
///     Resolution::Matched { params, .. } => assert_eq!(params.get("id"), Some("42")),
///     other => panic!("unexpected {other:?}"),
/// }
/// ```
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Registers a handler for `GET` requests matching `path`.
    pub fn get<H, Fut>(&mut self, path: &str, handler: H)
    where
        H: Fn(Request, Response) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.add_route(Method::Get, path, handler);
    }

    /// Registers a handler for `POST` requests matching `path`.
    pub fn post<H, Fut>(&mut self, path: &str, handler: H)
    where
        H: Fn(Request, Response) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.add_route(Method::Post, path, handler);
    }

    /// Registers a handler for `PUT` requests matching `path`.
    pub fn put<H, Fut>(&mut self, path: &str, handler: H)
    where
        H: Fn(Request, Response) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.add_route(Method::Put, path, handler);
    }

    /// Registers a handler for `DELETE` requests matching `path`.
    pub fn delete<H, Fut>(&mut self, path: &str, handler: H)
    where
        H: Fn(Request, Response) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.add_route(Method::Delete, path, handler);
    }

    /// Registers a handler for `PATCH` requests matching `path`.
    pub fn patch<H, Fut>(&mut self, path: &str, handler: H)
    where
        H: Fn(Request, Response) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.add_route(Method::Patch, path, handler);
    }

    /// Registers a handler for `HEAD` requests matching `path`.
    ///
    /// The response is written as usual; its body bytes are dropped on the
    /// wire.
    pub fn head<H, Fut>(&mut self, path: &str, handler: H)
    where
        H: Fn(Request, Response) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.add_route(Method::Head, path, handler);
    }

    /// Registers a handler for `OPTIONS` requests matching `path`.
    ///
    /// An explicit route takes precedence over automatic CORS preflight
    /// handling.
    pub fn options<H, Fut>(&mut self, path: &str, handler: H)
    where
        H: Fn(Request, Response) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.add_route(Method::Options, path, handler);
    }

    /// Serves files below `root` for `GET` and `HEAD` requests under `prefix`.
    ///
    /// `prefix/a/b.css` sends `root/a/b.css`; the prefix itself, or any path
    /// ending in `/`, sends the `index.html` of that directory. A remainder
    /// containing a `..` segment is answered with `403 Forbidden`.
    pub fn static_files(&mut self, root: impl Into<PathBuf>, prefix: &str) {
        let root = Arc::new(root.into());
        let pattern = format!("{}/*", normalize(prefix).trim_end_matches('/'));

        let serve = move |req: Request, res: Response| {
            let root = Arc::clone(&root);
            async move {
                let tail = req.params().wildcard().unwrap_or_default();
                let mut path = root.join(tail);
                if tail.is_empty() || req.path().ends_with('/') {
                    path.push("index.html");
                }
                res.send_file(path).await?;
                Ok(())
            }
        };

        self.get(&pattern, serve.clone());
        self.head(&pattern, serve);
    }

    fn add_route<H, Fut>(&mut self, method: Method, path: &str, handler: H)
    where
        H: Fn(Request, Response) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let handler: Handler = Arc::new(move |req, res| -> HandlerFuture { Box::pin(handler(req, res)) });
        self.routes.push(Route {
            method,
            pattern: Pattern::parse(path),
            handler,
        });
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Finds the handler for a request.
    ///
    /// `path` is the decoded request path and `raw_path` the path as it
    /// appeared on the request line. An exact literal route for `(method,
    /// path)` wins outright; otherwise routes are tried in registration order
    /// and the first hit wins.
    pub fn resolve(&self, method: Method, path: &str, raw_path: &str) -> Resolution<'_> {
        let exact = self.routes.iter().find(|route| {
            route.method == method && matches!(&route.pattern, Pattern::Exact(p) if p == path)
        });
        if let Some(route) = exact {
            return Resolution::Matched {
                handler: &route.handler,
                params: PathParams::new(),
            };
        }

        for route in self.routes.iter().filter(|route| route.method == method) {
            match route.pattern.matches(path, raw_path) {
                Match::Hit(params) => {
                    return Resolution::Matched {
                        handler: &route.handler,
                        params,
                    };
                }
                Match::Forbidden => return Resolution::Forbidden,
                Match::Miss => {}
            }
        }

        Resolution::NotFound
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_router(routes: &[(Method, &str)]) -> Router {
        let mut router = Router::new();
        for (method, path) in routes {
            router.add_route(*method, path, |_req, _res| async { Ok(()) });
        }
        router
    }

    fn params(router: &Router, method: Method, raw: &str) -> Option<PathParams> {
        let path = percent_decode(raw).unwrap().into_owned();
        match router.resolve(method, &path, raw) {
            Resolution::Matched { params, .. } => Some(params),
            _ => None,
        }
    }

    #[test]
    fn normalize_paths() {
        assert_eq!(normalize("users"), "/users");
        assert_eq!(normalize("/users/"), "/users");
        assert_eq!(normalize("/"), "/");
        assert_eq!(normalize(""), "/");
    }

    #[test]
    fn pattern_parse_classifies() {
        assert!(matches!(Pattern::parse("/"), Pattern::Exact(s) if s == "/"));
        assert!(matches!(Pattern::parse("users/"), Pattern::Exact(s) if s == "/users"));
        assert!(matches!(Pattern::parse("/files/*"), Pattern::Wildcard(s) if s == "/files"));
        match Pattern::parse("/users/:id/posts/:post_id") {
            Pattern::Parameterized { segments } => {
                assert_eq!(segments.len(), 4);
                assert!(matches!(&segments[0], Segment::Static(s) if s == "users"));
                assert!(matches!(&segments[3], Segment::Parameter(s) if s == "post_id"));
            }
            other => panic!("expected Parameterized, got {other:?}"),
        }
    }

    #[test]
    fn exact_route() {
        let router = noop_router(&[(Method::Get, "/hello")]);
        assert!(params(&router, Method::Get, "/hello").is_some());
        assert!(params(&router, Method::Post, "/hello").is_none());
        assert!(params(&router, Method::Get, "/world").is_none());
    }

    #[test]
    fn runtime_trailing_slash_is_not_normalized() {
        let router = noop_router(&[(Method::Get, "/users/"), (Method::Get, "/items/:id")]);
        assert!(params(&router, Method::Get, "/users").is_some());
        assert!(params(&router, Method::Get, "/users/").is_none());
        assert!(params(&router, Method::Get, "/items/1/").is_none());
    }

    #[test]
    fn single_parameter() {
        let router = noop_router(&[(Method::Get, "/users/:id")]);
        let p = params(&router, Method::Get, "/users/42").unwrap();
        assert_eq!(p.get("id"), Some("42"));
        assert_eq!(p.len(), 1);
    }

    #[test]
    fn parameter_count_matches_pattern() {
        let router = noop_router(&[(Method::Get, "/users/:id/posts/:post_id")]);
        let p = params(&router, Method::Get, "/users/7/posts/99").unwrap();
        assert_eq!(p.iter().collect::<Vec<_>>(), vec![("id", "7"), ("post_id", "99")]);
        assert!(params(&router, Method::Get, "/users/7/posts").is_none());
        assert!(params(&router, Method::Get, "/users/7/comments/99").is_none());
    }

    #[test]
    fn parameters_are_decoded_once() {
        let router = noop_router(&[(Method::Get, "/files/:name")]);
        let p = params(&router, Method::Get, "/files/a%2Fb%2520c").unwrap();
        assert_eq!(p.get("name"), Some("a/b%20c"));
    }

    #[test]
    fn exact_route_beats_earlier_parameterized_route() {
        let mut router = Router::new();
        router.get("/users/:id", |_req, _res| async { Err(HandlerError::msg("param")) });
        router.get("/users/me", |_req, _res| async { Ok(()) });
        match router.resolve(Method::Get, "/users/me", "/users/me") {
            Resolution::Matched { params, .. } => assert!(params.is_empty()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn registration_order_among_patterns() {
        let router = noop_router(&[(Method::Get, "/a/:x"), (Method::Get, "/:y/b")]);
        let p = params(&router, Method::Get, "/a/b").unwrap();
        assert_eq!(p.get("x"), Some("b"));
        assert_eq!(p.get("y"), None);
    }

    #[test]
    fn wildcard_tail() {
        let router = noop_router(&[(Method::Get, "/static/*")]);
        let p = params(&router, Method::Get, "/static/css/site.css").unwrap();
        assert_eq!(p.wildcard(), Some("css/site.css"));
        assert_eq!(params(&router, Method::Get, "/static").unwrap().wildcard(), Some(""));
        assert!(params(&router, Method::Get, "/staticky/x").is_none());
    }

    #[test]
    fn wildcard_traversal_is_forbidden() {
        let router = noop_router(&[(Method::Get, "/static/*")]);
        for raw in ["/static/../secret", "/static/a/%2E%2E/b", "/static/a\\..\\b"] {
            let path = percent_decode(raw).unwrap().into_owned();
            assert!(
                matches!(router.resolve(Method::Get, &path, raw), Resolution::Forbidden),
                "{raw}"
            );
        }
        assert!(params(&router, Method::Get, "/static/a..b").is_some());
    }

    #[test]
    fn nothing_registered() {
        let router = Router::new();
        assert!(router.is_empty());
        assert!(matches!(
            router.resolve(Method::Get, "/", "/"),
            Resolution::NotFound
        ));
    }

    #[test]
    fn static_files_registers_get_and_head() {
        let mut router = Router::new();
        router.static_files("/srv/www", "/assets/");
        assert_eq!(router.len(), 2);
        assert!(params(&router, Method::Head, "/assets/app.js").is_some());
        assert!(params(&router, Method::Post, "/assets/app.js").is_none());
    }
}
