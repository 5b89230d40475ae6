use super::HttpServer;
use crate::handler::HttpHandler;
use crate::protocol::Method;

/// Registrar that prefixes every pattern with a common path.
///
/// Obtained from [`HttpServer::grouped`]. Groups nest; each level holds the
/// accumulated prefix and writes into the same route table, so registration
/// order across groups and plain registrations is preserved.
pub struct RouteGroup<'a> {
    server: &'a HttpServer,
    prefix: String,
}

impl<'a> RouteGroup<'a> {
    pub(crate) fn new(server: &'a HttpServer, prefix: &str) -> Self {
        Self {
            server,
            prefix: trim_slashes(prefix).to_string(),
        }
    }

    /// A sub-group under this group's prefix.
    pub fn grouped(&self, prefix: &str) -> RouteGroup<'a> {
        RouteGroup {
            server: self.server,
            prefix: format!("{}/{}", self.prefix, trim_slashes(prefix)),
        }
    }

    pub fn register(
        &self,
        method: Option<Method>,
        pattern: &str,
        handler: impl HttpHandler + 'static,
    ) {
        let pattern = format!("{}/{}", self.prefix, trim_slashes(pattern));
        self.server.register(method, &pattern, handler);
    }

    pub fn get(&self, pattern: &str, handler: impl HttpHandler + 'static) {
        self.register(Some(Method::Get), pattern, handler);
    }

    pub fn post(&self, pattern: &str, handler: impl HttpHandler + 'static) {
        self.register(Some(Method::Post), pattern, handler);
    }

    pub fn put(&self, pattern: &str, handler: impl HttpHandler + 'static) {
        self.register(Some(Method::Put), pattern, handler);
    }

    pub fn delete(&self, pattern: &str, handler: impl HttpHandler + 'static) {
        self.register(Some(Method::Delete), pattern, handler);
    }

    pub fn patch(&self, pattern: &str, handler: impl HttpHandler + 'static) {
        self.register(Some(Method::Patch), pattern, handler);
    }

    pub fn head(&self, pattern: &str, handler: impl HttpHandler + 'static) {
        self.register(Some(Method::Head), pattern, handler);
    }

    pub fn any(&self, pattern: &str, handler: impl HttpHandler + 'static) {
        self.register(None, pattern, handler);
    }
}

fn trim_slashes(path: &str) -> &str {
    path.trim_matches('/')
}
