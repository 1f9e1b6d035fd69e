/// Token-level helpers for the `subcommand [positional...] [--flag value]...`
/// grammar
use super::error::{ChainError, ChainResult};

pub struct CommandArgs<'a> {
    tokens: &'a [String],
}

impl<'a> CommandArgs<'a> {
    pub fn new(tokens: &'a [String]) -> Self {
        Self { tokens }
    }

    pub fn subcommand(&self) -> Option<&'a str> {
        self.tokens.first().map(String::as_str)
    }

    /// Value following the first exact occurrence of `name`
    pub fn flag(&self, name: &str) -> Option<&'a str> {
        let pos = self.tokens.iter().position(|t| t == name)?;
        self.tokens.get(pos + 1).map(String::as_str)
    }

    pub fn has_flag(&self, name: &str) -> bool {
        self.tokens.iter().any(|t| t == name)
    }

    /// Token at `index` unless it is missing or a flag
    pub fn arg(&self, index: usize) -> Option<&'a str> {
        self.tokens
            .get(index)
            .map(String::as_str)
            .filter(|t| !t.starts_with("--"))
    }

    pub fn require(&self, index: usize, what: &'static str) -> ChainResult<&'a str> {
        self.arg(index).ok_or(ChainError::MissingArgument(what))
    }

    /// Tokens from `start` up to (not including) the first flag
    pub fn positional(&self, start: usize) -> Vec<String> {
        self.tokens
            .iter()
            .skip(start)
            .take_while(|t| !t.starts_with("--"))
            .cloned()
            .collect()
    }

    pub fn require_flag(&self, name: &'static str) -> ChainResult<&'a str> {
        self.flag(name).ok_or(ChainError::MissingFlag { flag: name })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(line: &str) -> Vec<String> {
        line.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn test_flag_lookup() {
        let t = tokens("call 0xabc f(uint256) 1 --rpc-url http://node --ether");
        let args = CommandArgs::new(&t);
        assert_eq!(args.subcommand(), Some("call"));
        assert_eq!(args.flag("--rpc-url"), Some("http://node"));
        assert!(args.has_flag("--ether"));
        // a trailing flag has no value
        assert_eq!(args.flag("--ether"), None);
        assert_eq!(args.flag("--private-key"), None);
    }

    #[test]
    fn test_positional_stops_at_first_flag() {
        let t = tokens("rpc eth_getBalance \"0xabc\" latest --rpc-url http://node extra");
        let args = CommandArgs::new(&t);
        assert_eq!(args.positional(2), vec!["\"0xabc\"", "latest"]);
        assert_eq!(args.arg(4), None);
    }

    #[test]
    fn test_require_reports_missing() {
        let t = tokens("balance --rpc-url http://node");
        let args = CommandArgs::new(&t);
        assert!(matches!(args.require(1, "address"), Err(ChainError::MissingArgument("address"))));
        assert!(matches!(
            args.require_flag("--private-key"),
            Err(ChainError::MissingFlag { flag: "--private-key" })
        ));
    }
}
