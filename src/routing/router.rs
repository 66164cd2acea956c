//! Route registration and lookup.
//!
//! # Responsibilities
//! - Store registered services in a segment trie
//! - Resolve the most specific service for a request path
//! - Return matched route or explicit no-match
//!
//! # Design Decisions
//! - Built with `&mut self` before serving, then shared immutably (no locks)
//! - Every prefix of the path is a candidate, not only the deepest one
//! - Priority is the registration depth; ties keep the first candidate found
//! - Exact children are explored before the wildcard child

use std::collections::HashMap;

use axum::http::Method;
use thiserror::Error;

use crate::config::ServiceConfig;
use crate::routing::matcher::{is_wildcard, split_path, MethodFilter};

/// A registered backend service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRoute {
    pub name: String,
    /// Base URL (scheme + authority) requests are forwarded to.
    pub target: String,
    pub methods: MethodFilter,
    pub skip_auth: bool,
    /// Number of segments in the registration path. Set by the router.
    pub priority: usize,
}

impl ServiceRoute {
    pub fn new(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            methods: MethodFilter::default(),
            skip_auth: false,
            priority: 0,
        }
    }

    pub fn with_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.methods = MethodFilter::new(methods);
        self
    }

    pub fn skip_auth(mut self, skip: bool) -> Self {
        self.skip_auth = skip;
        self
    }

    pub fn allows_method(&self, method: &Method) -> bool {
        self.methods.allows(method)
    }
}

impl From<&ServiceConfig> for ServiceRoute {
    fn from(config: &ServiceConfig) -> Self {
        ServiceRoute::new(&config.name, &config.target)
            .with_methods(&config.methods)
            .skip_auth(config.skip_auth)
    }
}

/// Error raised when a registration would overwrite an existing route.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("path '{path}' for service '{service}' collides with service '{existing}'")]
pub struct RegistrationError {
    pub path: String,
    pub service: String,
    pub existing: String,
}

/// A trie node. Each node exclusively owns its children.
#[derive(Debug, Default)]
struct RouteNode {
    children: HashMap<String, RouteNode>,
    /// Shared child for every wildcard segment registered at this level.
    wildcard: Option<Box<RouteNode>>,
    route: Option<ServiceRoute>,
    is_wildcard: bool,
}

impl RouteNode {
    fn wildcard() -> Self {
        Self {
            is_wildcard: true,
            ..Self::default()
        }
    }

    fn child_for(&mut self, segment: &str) -> &mut RouteNode {
        if is_wildcard(segment) {
            &mut **self.wildcard.get_or_insert_with(|| Box::new(RouteNode::wildcard()))
        } else {
            self.children.entry(segment.to_string()).or_default()
        }
    }

    fn collect<'a>(&'a self, segments: &[&str], candidates: &mut Vec<&'a ServiceRoute>) {
        if let Some(route) = &self.route {
            candidates.push(route);
        }

        let Some((segment, rest)) = segments.split_first() else {
            return;
        };

        if let Some(child) = self.children.get(*segment) {
            child.collect(rest, candidates);
        }
        if let Some(child) = &self.wildcard {
            child.collect(rest, candidates);
        }
    }
}

/// Segment-trie router mapping request paths to services.
#[derive(Debug, Default)]
pub struct Router {
    root: RouteNode,
    len: usize,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a router from the service registry.
    pub fn from_services(services: &[ServiceConfig]) -> Result<Self, RegistrationError> {
        let mut router = Self::new();
        for service in services {
            router.register(&service.base_path, ServiceRoute::from(service))?;
        }
        Ok(router)
    }

    /// Register a route under `path`, setting its priority to the path depth.
    pub fn register(&mut self, path: &str, mut route: ServiceRoute) -> Result<(), RegistrationError> {
        let segments = split_path(path);
        route.priority = segments.len();

        let mut node = &mut self.root;
        for segment in &segments {
            node = node.child_for(segment);
        }

        if let Some(existing) = &node.route {
            return Err(RegistrationError {
                path: path.to_string(),
                service: route.name,
                existing: existing.name.clone(),
            });
        }

        tracing::debug!(
            path = %path,
            service = %route.name,
            priority = route.priority,
            wildcard = node.is_wildcard,
            "Route registered"
        );
        node.route = Some(route);
        self.len += 1;
        Ok(())
    }

    /// Find the highest-priority route matching `path`.
    pub fn resolve(&self, path: &str) -> Option<&ServiceRoute> {
        let segments = split_path(path);
        let mut candidates = Vec::new();
        self.root.collect(&segments, &mut candidates);

        let mut iter = candidates.into_iter();
        let first = iter.next()?;
        // Strictly greater keeps the earliest candidate on ties.
        Some(iter.fold(first, |best, c| if c.priority > best.priority { c } else { best }))
    }

    /// Number of registered routes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
