//! Script resolution: which program, if any, serves a request.
//!
//! Applications implement [`ScriptResolver`] (or pass a closure). For the
//! common case of mapping URL prefixes to programs there is
//! [`PrefixResolver`], a static table that can be deserialized from
//! configuration.

use std::collections::BTreeMap;

use serde::Deserialize;
use thiserror::Error;
use tracing::trace;

use crate::protocol::{ExecutionDescriptor, RequestHead, ResolveError};

type InnerRouter<T> = matchit::Router<T>;

const PATH_INFO_PARAM: &str = "path_info";

/// Decides whether a request is served by a CGI program.
///
/// `Ok(None)` means no program applies and the gateway answers 404 without
/// spawning anything.
#[cfg_attr(test, mockall::automock)]
pub trait ScriptResolver: Send + Sync {
    fn resolve(&self, head: &RequestHead) -> Result<Option<ExecutionDescriptor>, ResolveError>;
}

impl<F> ScriptResolver for F
where
    F: Fn(&RequestHead) -> Result<Option<ExecutionDescriptor>, ResolveError> + Send + Sync,
{
    fn resolve(&self, head: &RequestHead) -> Result<Option<ExecutionDescriptor>, ResolveError> {
        (self)(head)
    }
}

/// One entry of a [`PrefixResolver`] table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CgiRoute {
    /// URL prefix, matched on whole path segments; becomes `SCRIPT_NAME`.
    pub prefix: String,
    /// Program to execute.
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Extra environment, applied after the standard CGI variables.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl CgiRoute {
    pub fn new<P: Into<String>, C: Into<String>>(prefix: P, command: C) -> Self {
        Self { prefix: prefix.into(), command: command.into(), args: Vec::new(), env: BTreeMap::new() }
    }

    #[must_use]
    pub fn arg<A: Into<String>>(mut self, arg: A) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn env<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    fn descriptor(&self, script_name: &str, path_info: String) -> ExecutionDescriptor {
        ExecutionDescriptor::new(script_name, path_info, self.command.as_str())
            .args(self.args.iter().cloned())
            .envs(self.env.iter().map(|(k, v)| (k.clone(), v.clone())))
    }
}

#[derive(Error, Debug)]
pub enum RouterBuildError {
    #[error("route prefix '{prefix}' must start with '/'")]
    RelativePrefix { prefix: String },

    #[error("route prefix '{prefix}' must not contain '{{' or '}}'")]
    ReservedCharacter { prefix: String },

    #[error("route prefix '{prefix}' conflicts with an earlier route: {source}")]
    Conflict { prefix: String, source: matchit::InsertError },
}

/// Maps URL prefixes to CGI programs.
///
/// A request matches a route when its path equals the prefix or continues
/// it with a `/`; `/cgi` matches `/cgi` and `/cgi/x` but not `/cgix`. The
/// prefix becomes `SCRIPT_NAME` and the rest of the path `PATH_INFO`.
/// Longer prefixes take precedence over shorter ones.
#[derive(Debug)]
pub struct PrefixResolver {
    inner_router: InnerRouter<usize>,
    routes: Vec<(String, CgiRoute)>,
}

impl PrefixResolver {
    pub fn new<I: IntoIterator<Item = CgiRoute>>(routes: I) -> Result<Self, RouterBuildError> {
        let mut inner_router = InnerRouter::new();
        let mut table = Vec::new();

        for route in routes {
            let prefix = route.prefix.as_str();
            if !prefix.starts_with('/') {
                return Err(RouterBuildError::RelativePrefix { prefix: route.prefix });
            }
            if prefix.contains(['{', '}']) {
                return Err(RouterBuildError::ReservedCharacter { prefix: route.prefix });
            }

            let script_name = prefix.trim_end_matches('/').to_owned();
            let index = table.len();

            let mut patterns = Vec::with_capacity(3);
            if !script_name.is_empty() {
                patterns.push(script_name.clone());
            }
            patterns.push(format!("{script_name}/"));
            patterns.push(format!("{script_name}/{{*{PATH_INFO_PARAM}}}"));

            for pattern in patterns {
                inner_router
                    .insert(pattern, index)
                    .map_err(|source| RouterBuildError::Conflict { prefix: route.prefix.clone(), source })?;
            }

            table.push((script_name, route));
        }

        Ok(Self { inner_router, routes: table })
    }

    /// Resolves a bare path.
    pub fn at(&self, path: &str) -> Option<ExecutionDescriptor> {
        let matched = self.inner_router.at(path).ok()?;
        let (script_name, route) = self.routes.get(*matched.value)?;

        let path_info = match matched.params.get(PATH_INFO_PARAM) {
            Some(rest) => format!("/{rest}"),
            None => path[script_name.len()..].to_owned(),
        };

        trace!(path, script_name = %script_name, path_info = %path_info, command = %route.command, "resolved cgi route");
        Some(route.descriptor(script_name, path_info))
    }
}

impl ScriptResolver for PrefixResolver {
    fn resolve(&self, head: &RequestHead) -> Result<Option<ExecutionDescriptor>, ResolveError> {
        Ok(self.at(head.path()))
    }
}
