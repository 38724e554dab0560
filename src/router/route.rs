use std::fmt;
use std::sync::Arc;

use http::Method;

use crate::handlers::{Context, Filter, FilterOutcome, Handler};

/// Methods a route registered for "any method" answers to, in `Allow` order.
pub const ALL_METHODS: [Method; 7] = [
    Method::DELETE,
    Method::GET,
    Method::HEAD,
    Method::OPTIONS,
    Method::PATCH,
    Method::POST,
    Method::PUT,
];

/// A registered route: pattern, optional method, controller and filter chain.
///
/// Routes are created by the registration methods on
/// [`Application`](crate::app::Application) and only the filter list can be
/// extended afterwards, through the chainable [`Route::filter`].
#[derive(Clone)]
pub struct Route {
    pattern: String,
    method: Option<Method>,
    controller: Arc<dyn Handler>,
    filters: Vec<Arc<dyn Filter>>,
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("pattern", &self.pattern)
            .field("method", &self.method)
            .field("filters", &self.filters.len())
            .finish()
    }
}

impl Route {
    pub(crate) fn new(pattern: &str, method: Option<Method>, controller: Arc<dyn Handler>) -> Self {
        Self {
            pattern: pattern.to_string(),
            method,
            controller,
            filters: Vec::new(),
        }
    }

    /// Append a filter that runs before the controller.
    ///
    /// ```rust,ignore
    /// app.get("/admin", admin_page).filter(require_login);
    /// ```
    pub fn filter<F>(&mut self, filter: F) -> &mut Self
    where
        F: Fn(&mut Context<'_>) -> anyhow::Result<FilterOutcome> + Send + Sync + 'static,
    {
        self.filters.push(Arc::new(filter));
        self
    }

    /// Append a filter implemented as a type rather than a closure
    pub fn filter_with(&mut self, filter: Arc<dyn Filter>) -> &mut Self {
        self.filters.push(filter);
        self
    }

    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// `None` means the route accepts any method
    #[must_use]
    pub fn method(&self) -> Option<&Method> {
        self.method.as_ref()
    }

    #[must_use]
    pub fn controller(&self) -> &Arc<dyn Handler> {
        &self.controller
    }

    #[must_use]
    pub fn filters(&self) -> &[Arc<dyn Filter>] {
        &self.filters
    }

    /// Whether a request made with `method` may be served by this route.
    ///
    /// A GET route also answers HEAD requests.
    #[must_use]
    pub fn accepts(&self, method: &Method) -> bool {
        match &self.method {
            None => true,
            Some(m) if m == method => true,
            Some(m) => *m == Method::GET && *method == Method::HEAD,
        }
    }

    /// Methods this route contributes to an `Allow` list
    #[must_use]
    pub fn allowed_methods(&self) -> Vec<Method> {
        match &self.method {
            None => ALL_METHODS.to_vec(),
            Some(m) if *m == Method::GET => vec![Method::GET, Method::HEAD],
            Some(m) => vec![m.clone()],
        }
    }
}
