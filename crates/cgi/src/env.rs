//! CGI/1.1 environment for a single request.
//!
//! The environment is built in three layers, later layers replacing earlier
//! entries with the same name:
//!
//! 1. the fixed meta-variables (`GATEWAY_INTERFACE` .. `CONTENT_LENGTH`);
//!    unknown values become empty strings
//! 2. one `HTTP_<NAME>` entry per inbound header name, upper-cased with `-`
//!    replaced by `_`; values of a repeated header are joined with `,`
//! 3. the descriptor's environment overrides
//!
//! Building is pure: the same head and descriptor always yield the same map.

use std::collections::BTreeMap;

use http::header::HOST;
use http::uri::Authority;

use crate::protocol::{ExecutionDescriptor, RequestHead};

pub const GATEWAY_INTERFACE: &str = "GATEWAY_INTERFACE";
pub const SERVER_PROTOCOL: &str = "SERVER_PROTOCOL";
pub const SERVER_SOFTWARE: &str = "SERVER_SOFTWARE";
pub const SERVER_NAME: &str = "SERVER_NAME";
pub const SERVER_PORT: &str = "SERVER_PORT";
pub const REMOTE_ADDR: &str = "REMOTE_ADDR";
pub const REMOTE_HOST: &str = "REMOTE_HOST";
pub const REMOTE_IDENT: &str = "REMOTE_IDENT";
pub const REMOTE_USER: &str = "REMOTE_USER";
pub const AUTH_TYPE: &str = "AUTH_TYPE";
pub const REQUEST_METHOD: &str = "REQUEST_METHOD";
pub const SCRIPT_NAME: &str = "SCRIPT_NAME";
pub const PATH_INFO: &str = "PATH_INFO";
pub const PATH_TRANSLATED: &str = "PATH_TRANSLATED";
pub const QUERY_STRING: &str = "QUERY_STRING";
pub const CONTENT_TYPE: &str = "CONTENT_TYPE";
pub const CONTENT_LENGTH: &str = "CONTENT_LENGTH";

const CGI_VERSION: &str = "CGI/1.1";
const HTTP_PREFIX: &str = "HTTP_";

/// Environment variables handed to a CGI program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CgiEnvironment {
    vars: BTreeMap<String, String>,
}

impl CgiEnvironment {
    /// Builds the environment for `head` running `descriptor`.
    pub fn build(head: &RequestHead, descriptor: &ExecutionDescriptor, server_software: &str) -> Self {
        let mut vars = BTreeMap::new();

        let (server_name, server_port) = server_name_and_port(head);
        let identity = head.identity();

        vars.insert(GATEWAY_INTERFACE.into(), CGI_VERSION.into());
        vars.insert(SERVER_PROTOCOL.into(), format!("{:?}", head.version()));
        vars.insert(SERVER_SOFTWARE.into(), server_software.into());
        vars.insert(SERVER_NAME.into(), server_name);
        vars.insert(SERVER_PORT.into(), server_port);
        vars.insert(REMOTE_ADDR.into(), head.remote_addr().map(|addr| addr.ip().to_string()).unwrap_or_default());
        vars.insert(REMOTE_HOST.into(), String::new());
        vars.insert(REMOTE_IDENT.into(), String::new());
        vars.insert(REMOTE_USER.into(), identity.map(|i| i.name.clone()).unwrap_or_default());
        vars.insert(AUTH_TYPE.into(), identity.map(|i| i.auth_type.clone()).unwrap_or_default());
        vars.insert(REQUEST_METHOD.into(), head.method().as_str().into());
        vars.insert(SCRIPT_NAME.into(), descriptor.script_name().into());
        vars.insert(PATH_INFO.into(), descriptor.path_info().into());
        vars.insert(PATH_TRANSLATED.into(), String::new());
        vars.insert(QUERY_STRING.into(), head.query().into());
        vars.insert(
            CONTENT_TYPE.into(),
            head.headers()
                .get(http::header::CONTENT_TYPE)
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
                .unwrap_or_default(),
        );
        vars.insert(CONTENT_LENGTH.into(), head.content_length().map(|len| len.to_string()).unwrap_or_default());

        for name in head.headers().keys() {
            let value = head
                .headers()
                .get_all(name)
                .iter()
                .map(|v| String::from_utf8_lossy(v.as_bytes()))
                .collect::<Vec<_>>()
                .join(",");
            vars.insert(http_variable_name(name.as_str()), value);
        }

        for (key, value) in descriptor.environment_overrides() {
            vars.insert(key.clone(), value.clone());
        }

        Self { vars }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<'a> IntoIterator for &'a CgiEnvironment {
    type Item = (&'a String, &'a String);
    type IntoIter = std::collections::btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.vars.iter()
    }
}

/// `X-Foo` becomes `HTTP_X_FOO`.
fn http_variable_name(header_name: &str) -> String {
    let mut name = String::with_capacity(HTTP_PREFIX.len() + header_name.len());
    name.push_str(HTTP_PREFIX);
    name.extend(header_name.chars().map(|c| if c == '-' { '_' } else { c.to_ascii_uppercase() }));
    name
}

fn server_name_and_port(head: &RequestHead) -> (String, String) {
    let authority = head
        .headers()
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<Authority>().ok())
        .or_else(|| head.uri().authority().cloned());

    match (authority, head.local_addr()) {
        (Some(authority), local) => {
            let port = authority.port_u16().or(local.map(|addr| addr.port()));
            (authority.host().to_owned(), port.map(|p| p.to_string()).unwrap_or_default())
        }
        (None, Some(local)) => (local.ip().to_string(), local.port().to_string()),
        (None, None) => (String::new(), String::new()),
    }
}
