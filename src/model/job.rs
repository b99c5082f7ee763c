use serde::{Deserialize, Serialize};

/// Links shown alongside a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectLink {
  pub project_preview_link: String,
  pub query_preview_link: String,
}

/// The work item threads and tickets hang off. Owned elsewhere; read-only here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
  pub do_shop_id: String,
  pub business_name: String,
  pub business_email: String,
  pub project_name: String,
  pub project_description: String,
  pub project_duration: Option<String>,
  pub project_type: String,
  pub job_type: String,
  pub project_status: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub amount: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub project_link: Option<ProjectLink>,
}

impl Job {
  /// Completed and rejected jobs accept no further actions.
  pub fn is_closed(&self) -> bool {
    let status = self.project_status.to_lowercase();
    status == "completed" || status == "rejected"
  }
}
