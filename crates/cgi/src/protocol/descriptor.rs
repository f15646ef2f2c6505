use std::collections::BTreeMap;

/// The program resolved for one request.
///
/// Produced once per request by a [`ScriptResolver`](crate::resolver::ScriptResolver)
/// and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionDescriptor {
    script_name: String,
    path_info: String,
    command_path: String,
    command_args: Vec<String>,
    environment_overrides: BTreeMap<String, String>,
}

impl ExecutionDescriptor {
    pub fn new<S, P, C>(script_name: S, path_info: P, command_path: C) -> Self
    where
        S: Into<String>,
        P: Into<String>,
        C: Into<String>,
    {
        Self {
            script_name: script_name.into(),
            path_info: path_info.into(),
            command_path: command_path.into(),
            command_args: Vec::new(),
            environment_overrides: BTreeMap::new(),
        }
    }

    /// Literal process arguments, passed without any shell interpretation.
    #[must_use]
    pub fn args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        self.command_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Adds an environment entry applied after the standard CGI variables.
    #[must_use]
    pub fn env<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.environment_overrides.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.environment_overrides.extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn script_name(&self) -> &str {
        &self.script_name
    }

    pub fn path_info(&self) -> &str {
        &self.path_info
    }

    pub fn command_path(&self) -> &str {
        &self.command_path
    }

    pub fn command_args(&self) -> &[String] {
        &self.command_args
    }

    pub fn environment_overrides(&self) -> &BTreeMap<String, String> {
        &self.environment_overrides
    }
}
