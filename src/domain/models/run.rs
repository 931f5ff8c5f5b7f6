#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowRun {
    pub id: u64,
    pub name: String,
}

impl WorkflowRun {
    /// Workflow names are compared without regard to case.
    pub fn matches_name(&self, name: &str) -> bool {
        self.name.to_lowercase() == name.to_lowercase()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub id: u64,
    pub name: String,
    pub archive_download_url: String,
}
