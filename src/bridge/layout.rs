/// Guest-side paths of the bridge protocol, rooted at one directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeLayout {
    base: String,
}

pub const REQUEST_SUFFIX: &str = ".json";
pub const READY_SUFFIX: &str = ".ready";

impl BridgeLayout {
    pub fn new(base: impl Into<String>) -> Self {
        let base = base.into();
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn requests_dir(&self) -> String {
        format!("{}/requests", self.base)
    }

    pub fn responses_dir(&self) -> String {
        format!("{}/responses", self.base)
    }

    pub fn stop_marker(&self) -> String {
        format!("{}/stop", self.base)
    }

    pub fn request_file(&self, id: &str) -> String {
        format!("{}/{}{}", self.requests_dir(), id, REQUEST_SUFFIX)
    }

    pub fn request_marker(&self, id: &str) -> String {
        format!("{}/{}{}", self.requests_dir(), id, READY_SUFFIX)
    }

    pub fn response_file(&self, id: &str) -> String {
        format!("{}/{}{}", self.responses_dir(), id, REQUEST_SUFFIX)
    }

    pub fn response_marker(&self, id: &str) -> String {
        format!("{}/{}{}", self.responses_dir(), id, READY_SUFFIX)
    }

    pub fn staging_file(&self, id: &str) -> String {
        format!("{}/_resp_{}.b64", self.base, id)
    }
}

/// Ids that have both a descriptor and a readiness marker in `names`
pub fn ready_ids(names: &[String]) -> Vec<String> {
    let mut ids: Vec<String> = names
        .iter()
        .filter_map(|name| name.strip_suffix(READY_SUFFIX))
        .filter(|id| is_valid_id(id))
        .filter(|id| names.iter().any(|n| n.strip_suffix(REQUEST_SUFFIX) == Some(*id)))
        .map(str::to_string)
        .collect();
    ids.sort();
    ids
}

/// Ids become file names; keep them to a single plain path segment
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id != "."
        && id != ".."
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        let layout = BridgeLayout::new("/tmp/bridge/");
        assert_eq!(layout.request_file("abc"), "/tmp/bridge/requests/abc.json");
        assert_eq!(layout.response_marker("abc"), "/tmp/bridge/responses/abc.ready");
        assert_eq!(layout.staging_file("abc"), "/tmp/bridge/_resp_abc.b64");
        assert_eq!(layout.stop_marker(), "/tmp/bridge/stop");
    }

    #[test]
    fn test_ready_ids_need_both_files() {
        let names: Vec<String> = ["a.json", "a.ready", "b.json", "c.ready", "bad id.json", "bad id.ready"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(ready_ids(&names), vec!["a"]);
    }
}
