//! Named route patterns
//!
//! Patterns are `/`-separated paths whose `:name` segments are filled from a
//! parameter map when a route is resolved.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::plugin::display_value;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteTable {
    routes: BTreeMap<String, String>,
}

/// Why a route could not be resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteMiss {
    UnknownRoute(String),
    MissingParam { route: String, param: String },
}

impl std::fmt::Display for RouteMiss {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RouteMiss::UnknownRoute(name) => write!(f, "\"{name}\" not found"),
            RouteMiss::MissingParam { route, param } => {
                write!(f, "route \"{route}\" needs parameter `{param}`")
            }
        }
    }
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a named pattern
    pub fn bind(&mut self, name: impl Into<String>, pattern: impl Into<String>) -> Option<String> {
        self.routes.insert(name.into(), pattern.into())
    }

    pub fn pattern(&self, name: &str) -> Option<&str> {
        self.routes.get(name).map(String::as_str)
    }

    /// Every registered route, name to pattern
    pub fn tables(&self) -> &BTreeMap<String, String> {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Fill a pattern's parameters and append an encoded query
    ///
    /// ```
    /// use serde_json::{json, Map};
    /// use viewflux_core::routes::RouteTable;
    ///
    /// let mut routes = RouteTable::new();
    /// routes.bind("user", "/users/:id/posts");
    ///
    /// let params: Map<_, _> = json!({ "id": "kim lee" }).as_object().cloned().unwrap();
    /// assert_eq!(
    ///     routes.resolve("user", &params, Some("page=2")).unwrap(),
    ///     "/users/kim%20lee/posts?page%3D2"
    /// );
    /// ```
    pub fn resolve(
        &self,
        name: &str,
        params: &Map<String, Value>,
        query: Option<&str>,
    ) -> Result<String, RouteMiss> {
        let pattern = self
            .pattern(name)
            .ok_or_else(|| RouteMiss::UnknownRoute(name.to_string()))?;

        let segments = pattern
            .split('/')
            .map(|segment| match segment.strip_prefix(':') {
                Some(param) => params
                    .get(param)
                    .filter(|value| !value.is_null())
                    .map(|value| urlencoding::encode(&display_value(value)).into_owned())
                    .ok_or_else(|| RouteMiss::MissingParam {
                        route: name.to_string(),
                        param: param.to_string(),
                    }),
                None => Ok(segment.to_string()),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut path = segments.join("/");
        if let Some(query) = query {
            path.push('?');
            path.push_str(&urlencoding::encode(query));
        }
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_static_route() {
        let mut routes = RouteTable::new();
        routes.bind("home", "/");
        assert_eq!(routes.resolve("home", &Map::new(), None).unwrap(), "/");
        assert_eq!(routes.len(), 1);
    }

    #[test]
    fn test_params_are_encoded() {
        let mut routes = RouteTable::new();
        routes.bind("item", "/shop/:shop/items/:id");
        let path = routes
            .resolve("item", &params(json!({ "shop": "a/b", "id": 42 })), None)
            .unwrap();
        assert_eq!(path, "/shop/a%2Fb/items/42");
    }

    #[test]
    fn test_misses() {
        let mut routes = RouteTable::new();
        routes.bind("item", "/items/:id");
        assert_eq!(
            routes.resolve("nope", &Map::new(), None),
            Err(RouteMiss::UnknownRoute("nope".into()))
        );
        assert_eq!(
            routes.resolve("item", &params(json!({ "id": null })), None),
            Err(RouteMiss::MissingParam {
                route: "item".into(),
                param: "id".into()
            })
        );
        assert_eq!(RouteMiss::UnknownRoute("x".into()).to_string(), "\"x\" not found");
    }

    #[test]
    fn test_rebind_replaces() {
        let mut routes = RouteTable::new();
        routes.bind("a", "/one");
        assert_eq!(routes.bind("a", "/two").as_deref(), Some("/one"));
        assert_eq!(routes.tables().get("a").map(String::as_str), Some("/two"));
    }
}
