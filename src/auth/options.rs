/// A single mutation applied to [`Options`].
#[derive(Debug, Clone)]
pub enum AuthOption {
    /// Use this client for every outbound call of the operation.
    HttpClient(reqwest::Client),
    /// Scopes (or audiences) requested for the cloud access token.
    Scopes(Vec<String>),
    /// Permit credential sources that invoke local CLIs (e.g. `az`).
    AllowShellOut,
}

/// Per-call configuration shared by every provider.
///
/// Built by folding a list of [`AuthOption`]s over the default value:
///
/// ```rust
/// use artifact_auth::auth::{AuthOption, Options};
///
/// let opts = Options::apply([
///     AuthOption::Scopes(vec!["https://example.com/.default".to_string()]),
///     AuthOption::AllowShellOut,
/// ]);
/// assert!(opts.allow_shell_out());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Options {
    http_client: Option<reqwest::Client>,
    scopes: Vec<String>,
    allow_shell_out: bool,
}

impl Options {
    pub fn apply(opts: impl IntoIterator<Item = AuthOption>) -> Self {
        opts.into_iter().fold(Self::default(), Self::with)
    }

    /// Apply one more option on top of these.
    pub fn with(mut self, opt: AuthOption) -> Self {
        match opt {
            AuthOption::HttpClient(client) => self.http_client = Some(client),
            AuthOption::Scopes(scopes) => self.scopes = scopes,
            AuthOption::AllowShellOut => self.allow_shell_out = true,
        }
        self
    }

    pub fn http_client(&self) -> Option<&reqwest::Client> {
        self.http_client.as_ref()
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// Configured scopes, or `default` when none were set.
    pub fn scopes_or<'a>(&'a self, default: &'a str) -> Vec<&'a str> {
        if self.scopes.is_empty() {
            vec![default]
        } else {
            self.scopes.iter().map(String::as_str).collect()
        }
    }

    pub fn allow_shell_out(&self) -> bool {
        self.allow_shell_out
    }
}
