use crate::types::*;
use uuid::Uuid;

pub type JobId = Uuid;

/// Lifecycle of one rotation job.
///
/// ```text
/// Pending -> Generating -> Staged -> Verifying -> Committed
///    |            |                       |
///    +-> Failed   +-> Failed              +-> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobState {
    Pending,
    Generating,
    Staged,
    Verifying,
    Committed,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Committed | JobState::Failed)
    }

    /// Whether the state machine permits moving to `next`.
    pub fn can_transition_to(self, next: JobState) -> bool {
        matches!(
            (self, next),
            (JobState::Pending, JobState::Generating)
                | (JobState::Pending, JobState::Failed)
                | (JobState::Generating, JobState::Staged)
                | (JobState::Generating, JobState::Failed)
                | (JobState::Staged, JobState::Verifying)
                | (JobState::Verifying, JobState::Committed)
                | (JobState::Verifying, JobState::Failed)
        )
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobState::Pending => "pending",
            JobState::Generating => "generating",
            JobState::Staged => "staged",
            JobState::Verifying => "verifying",
            JobState::Committed => "committed",
            JobState::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// What started a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobTrigger {
    /// The scheduler found the entry past `next_rotation_at`.
    Due,
    /// An explicit caller request.
    Manual,
}

/// Point-in-time view of one rotation job.
#[derive(Debug, Clone, Serialize)]
pub struct RotationJob {
    pub id: JobId,
    pub project: String,
    pub key: String,
    pub state: JobState,
    pub trigger: JobTrigger,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub attempt: u32,
    /// Version installed on commit.
    pub new_version: Option<u32>,
}

impl RotationJob {
    pub fn new(project: &str, key: &str, trigger: JobTrigger) -> Self {
        Self {
            id: Uuid::new_v4(),
            project: project.to_string(),
            key: key.to_string(),
            state: JobState::Pending,
            trigger,
            started_at: Utc::now(),
            completed_at: None,
            error: None,
            attempt: 1,
            new_version: None,
        }
    }

    /// `project/key` label for logs and CLI output.
    pub fn target(&self) -> String {
        format!("{}/{}", self.project, self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_follow_the_machine() {
        use JobState::*;
        assert!(Pending.can_transition_to(Generating));
        assert!(Pending.can_transition_to(Failed));
        assert!(Generating.can_transition_to(Staged));
        assert!(Generating.can_transition_to(Failed));
        assert!(Staged.can_transition_to(Verifying));
        assert!(Verifying.can_transition_to(Committed));
        assert!(Verifying.can_transition_to(Failed));

        assert!(!Pending.can_transition_to(Staged));
        assert!(!Staged.can_transition_to(Failed));
        assert!(!Committed.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Pending));
    }

    #[test]
    fn terminal_states() {
        assert!(JobState::Committed.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(!JobState::Pending.is_terminal());
        assert!(!JobState::Verifying.is_terminal());
    }
}
