//! Command-line source.

use crate::distconf::error::Result;
use crate::distconf::reader::Reader;

/// Scans arguments for `prefix + key + "=" + value`; the first match wins.
#[derive(Debug, Clone, Default)]
pub struct CommandLine {
    prefix: String,
    source: Option<Vec<String>>,
}

impl CommandLine {
    /// Read from the process arguments.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            source: None,
        }
    }

    /// Read from an explicit argument list.
    pub fn with_args<I, S>(prefix: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prefix: prefix.into(),
            source: Some(args.into_iter().map(Into::into).collect()),
        }
    }

    fn find(&self, arg_prefix: &str, args: impl Iterator<Item = String>) -> Option<Vec<u8>> {
        args.into_iter()
            .find_map(|arg| arg.strip_prefix(arg_prefix).map(|v| v.as_bytes().to_vec()))
    }
}

impl Reader for CommandLine {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let arg_prefix = format!("{}{}=", self.prefix, key);
        let found = match &self.source {
            Some(args) => self.find(&arg_prefix, args.iter().cloned()),
            None => self.find(&arg_prefix, std::env::args()),
        };
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_match_wins() {
        let cmd = CommandLine::with_args(
            "--conf.",
            ["hebe-bot", "--conf.Port=8080", "--conf.Port=9090", "--conf.Host=a=b"],
        );
        assert_eq!(cmd.get("Port").unwrap(), Some(b"8080".to_vec()));
        assert_eq!(cmd.get("Host").unwrap(), Some(b"a=b".to_vec()));
    }

    #[test]
    fn test_exact_prefix_required() {
        let cmd = CommandLine::with_args("--conf.", ["--conf.PortX=1", "Port=2", "--conf.Port"]);
        assert_eq!(cmd.get("Port").unwrap(), None);
    }

    #[test]
    fn test_empty_value_is_present() {
        let cmd = CommandLine::with_args("", ["Debug="]);
        assert_eq!(cmd.get("Debug").unwrap(), Some(Vec::new()));
    }
}
