#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogTailRequest {
    pub group: String,
    pub stream: String,
    pub limit: usize,
    pub start_from_head: bool,
}

pub trait LogTailReader {
    /// Returns log lines in the order the log store reports them.
    fn read_tail(&self, request: &LogTailRequest) -> Result<Vec<String>, String>;
}
