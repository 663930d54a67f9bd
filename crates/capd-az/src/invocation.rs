//! # Invocations
//!
//! An [`Invocation`] is a program plus its argument vector. Its `Display`
//! output is what appears in logs and error messages, so values following a
//! secret-bearing flag are replaced with `***`. For `--secrets` the `name=`
//! prefix is kept so the operator can still tell which secret was passed.

/// Flags whose values must never be rendered.
const SECRET_FLAGS: &[&str] = &[
    "--password",
    "--registry-password",
    "--logs-workspace-key",
    "--secrets",
];

/// Flag whose values are `name=value` pairs; only the value is secret.
const NAMED_SECRETS_FLAG: &str = "--secrets";

const REDACTED: &str = "***";

/// A program invocation.
#[derive(Clone, PartialEq, Eq)]
pub struct Invocation {
    program: String,
    args: Vec<String>,
}

impl Invocation {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// An `az` invocation.
    pub fn az<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new("az", args)
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Append `flag value`.
    pub fn opt(self, flag: &str, value: impl Into<String>) -> Self {
        self.arg(flag).arg(value)
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Raw arguments, unredacted.
    pub fn args_slice(&self) -> &[String] {
        &self.args
    }

    /// Arguments with secret values redacted.
    ///
    /// The token after a single-value secret flag is redacted whatever it
    /// looks like. After `--secrets`, every token up to the next `--flag` is
    /// a `name=value` pair.
    pub fn redacted_args(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(self.args.len());
        let mut pending = Pending::Nothing;
        for arg in &self.args {
            match pending {
                Pending::Value => {
                    out.push(REDACTED.to_string());
                    pending = Pending::Nothing;
                    continue;
                }
                Pending::NamedValues if !is_long_flag(arg) => {
                    out.push(redact_named(arg));
                    continue;
                }
                _ => pending = Pending::Nothing,
            }
            if is_long_flag(arg) {
                if let Some((flag, _)) = arg.split_once('=') {
                    if SECRET_FLAGS.contains(&flag) {
                        out.push(format!("{flag}={REDACTED}"));
                        continue;
                    }
                }
                if arg == NAMED_SECRETS_FLAG {
                    pending = Pending::NamedValues;
                } else if SECRET_FLAGS.contains(&arg.as_str()) {
                    pending = Pending::Value;
                }
            }
            out.push(arg.clone());
        }
        out
    }
}

/// What the tokens following a secret flag hold.
#[derive(Clone, Copy)]
enum Pending {
    Nothing,
    Value,
    NamedValues,
}

fn is_long_flag(arg: &str) -> bool {
    arg.starts_with("--")
}

/// `--secrets name=value` pairs keep their names.
fn redact_named(value: &str) -> String {
    match value.split_once('=') {
        Some((name, _)) => format!("{name}={REDACTED}"),
        None => REDACTED.to_string(),
    }
}

fn quote(arg: &str) -> String {
    if arg.is_empty() || arg.chars().any(|c| c.is_whitespace() || c == '\'' || c == '"') {
        format!("'{}'", arg.replace('\'', r"'\''"))
    } else {
        arg.to_string()
    }
}

impl std::fmt::Display for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.program)?;
        for arg in self.redacted_args() {
            write!(f, " {}", quote(&arg))?;
        }
        Ok(())
    }
}

/// `Debug` renders the redacted form so invocations are safe to log.
impl std::fmt::Debug for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invocation")
            .field("program", &self.program)
            .field("args", &self.redacted_args())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_invocation_renders_verbatim() {
        let inv = Invocation::az(["group", "show", "--name", "rg-bank-churn"]);
        assert_eq!(inv.to_string(), "az group show --name rg-bank-churn");
    }

    #[test]
    fn whitespace_args_are_quoted() {
        let inv = Invocation::az(["account", "list-locations"])
            .opt("--query", "[?metadata.regionType=='Physical'].name");
        assert_eq!(
            inv.to_string(),
            "az account list-locations --query '[?metadata.regionType=='\\''Physical'\\''].name'"
        );
    }

    #[test]
    fn dash_leading_secret_values_are_redacted() {
        let inv = Invocation::az(["containerapp", "registry", "set"])
            .opt("--password", "-Xk9secret")
            .opt("--logs-workspace-key", "--weird")
            .opt("--server", "acrbankchurn.azurecr.io");
        let rendered = inv.to_string();
        assert!(!rendered.contains("Xk9secret"));
        assert!(!rendered.contains("weird"));
        assert_eq!(
            rendered,
            "az containerapp registry set --password *** --logs-workspace-key *** \
             --server acrbankchurn.azurecr.io"
        );
    }

    #[test]
    fn named_secrets_end_at_next_long_flag() {
        let inv = Invocation::az(["containerapp", "create", "--secrets"])
            .args(["conn=-abc", "-raw"])
            .opt("--target-port", "8000");
        assert_eq!(
            inv.redacted_args(),
            ["containerapp", "create", "--secrets", "conn=***", "***", "--target-port", "8000"]
        );
    }

    #[test]
    fn secret_flag_values_are_redacted() {
        let inv = Invocation::az(["containerapp", "create"])
            .opt("--registry-username", "acrbankchurn")
            .opt("--registry-password", "s3cr3t")
            .opt("--target-port", "8000");
        let rendered = inv.to_string();
        assert!(!rendered.contains("s3cr3t"));
        assert!(rendered.contains("--registry-password ***"));
        assert!(rendered.contains("--registry-username acrbankchurn"));
        assert!(rendered.contains("--target-port 8000"));
    }

    #[test]
    fn multi_value_secrets_keep_names() {
        let inv = Invocation::az(["containerapp", "create", "--secrets"])
            .args(["appinsights-conn=InstrumentationKey=abc", "other=xyz"])
            .opt("--env-vars", "APPLICATIONINSIGHTS_CONNECTION_STRING=secretref:appinsights-conn");
        let args = inv.redacted_args();
        assert_eq!(args[3], "appinsights-conn=***");
        assert_eq!(args[4], "other=***");
        assert_eq!(
            args[6],
            "APPLICATIONINSIGHTS_CONNECTION_STRING=secretref:appinsights-conn"
        );
    }

    #[test]
    fn inline_secret_form_is_redacted() {
        let inv = Invocation::new("docker", ["login", "--password=hunter2", "myacr.azurecr.io"]);
        assert_eq!(inv.to_string(), "docker login --password=*** myacr.azurecr.io");
    }

    #[test]
    fn debug_is_redacted() {
        let inv = Invocation::az(["x"]).opt("--logs-workspace-key", "c2VjcmV0a2V5==");
        let dbg = format!("{inv:?}");
        assert!(!dbg.contains("c2VjcmV0a2V5"));
        assert!(dbg.contains("***"));
    }

    #[test]
    fn raw_args_are_untouched() {
        let inv = Invocation::az(["x"]).opt("--password", "p");
        assert_eq!(inv.args_slice(), ["x", "--password", "p"]);
    }
}
