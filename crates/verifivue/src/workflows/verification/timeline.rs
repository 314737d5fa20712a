use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The four canonical verification stages, in timeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Submission,
    Analysis,
    Outreach,
    Final,
}

impl Stage {
    pub const fn ordered() -> [Self; 4] {
        [Self::Submission, Self::Analysis, Self::Outreach, Self::Final]
    }

    pub const fn index(self) -> usize {
        match self {
            Self::Submission => 0,
            Self::Analysis => 1,
            Self::Outreach => 2,
            Self::Final => 3,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Submission => "Request Submitted",
            Self::Analysis => "Document Analysis",
            Self::Outreach => "Institution Outreach",
            Self::Final => "Final Verification",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Upcoming,
    Current,
    Completed,
    Error,
}

impl StepStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Upcoming => "Upcoming",
            Self::Current => "Current",
            Self::Completed => "Completed",
            Self::Error => "Error",
        }
    }

    /// A step that has been left behind, successfully or not.
    pub const fn is_settled(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

/// One stage record on a request timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineStep {
    pub stage: Stage,
    pub label: String,
    pub description: String,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
}

impl TimelineStep {
    fn upcoming(stage: Stage, description: &str) -> Self {
        Self {
            stage,
            label: stage.label().to_string(),
            description: description.to_string(),
            status: StepStatus::Upcoming,
            date: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimelineError {
    #[error("timeline is closed; {0:?} can no longer change")]
    Closed(Stage),
    #[error("cannot mark {stage:?} as {status:?} while neighbouring stages are out of order")]
    OutOfOrder { stage: Stage, status: StepStatus },
    #[error("{0:?} cannot return to upcoming")]
    Regression(Stage),
    #[error("timeline must contain the four canonical stages in order")]
    Malformed,
}

/// Fixed four-slot stage record list. Slots are never added, removed, or reordered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<TimelineStep>", into = "Vec<TimelineStep>")]
pub struct Timeline {
    steps: [TimelineStep; 4],
}

impl Timeline {
    /// Fresh timeline for a just-submitted request: submission done, analysis underway.
    pub fn initialize(now: DateTime<Utc>) -> Self {
        let mut submission =
            TimelineStep::upcoming(Stage::Submission, "Request received and logged in the system.");
        submission.status = StepStatus::Completed;
        submission.date = Some(now);

        let mut analysis =
            TimelineStep::upcoming(Stage::Analysis, "AI-powered initial document verification.");
        analysis.status = StepStatus::Current;
        analysis.date = Some(now);

        Self {
            steps: [
                submission,
                analysis,
                TimelineStep::upcoming(
                    Stage::Outreach,
                    "Contacting the issuing institution for confirmation.",
                ),
                TimelineStep::upcoming(Stage::Final, "Final status update and report generation."),
            ],
        }
    }

    pub fn steps(&self) -> &[TimelineStep] {
        &self.steps
    }

    pub fn step(&self, stage: Stage) -> &TimelineStep {
        &self.steps[stage.index()]
    }

    /// Closed once the final step has completed.
    pub fn is_closed(&self) -> bool {
        self.step(Stage::Final).status == StepStatus::Completed
    }

    /// Stage the request is currently sitting in: the last step that has left `upcoming`.
    pub fn active_stage(&self) -> Option<Stage> {
        if self.is_closed() {
            return None;
        }

        self.steps
            .iter()
            .rev()
            .find(|step| step.status != StepStatus::Upcoming)
            .map(|step| step.stage)
    }

    pub fn current_step(&self) -> Option<&TimelineStep> {
        self.steps
            .iter()
            .find(|step| step.status == StepStatus::Current)
    }

    /// Replace exactly one step's status, description, and date.
    pub fn advance(
        &mut self,
        stage: Stage,
        status: StepStatus,
        description: impl Into<String>,
        date: DateTime<Utc>,
    ) -> Result<(), TimelineError> {
        if self.is_closed() {
            return Err(TimelineError::Closed(stage));
        }
        if status == StepStatus::Upcoming {
            return Err(TimelineError::Regression(stage));
        }

        let index = stage.index();
        let earlier_settled = self.steps[..index]
            .iter()
            .all(|step| step.status.is_settled());
        let later_upcoming = self.steps[index + 1..]
            .iter()
            .all(|step| step.status == StepStatus::Upcoming);
        if !earlier_settled || !later_upcoming {
            return Err(TimelineError::OutOfOrder { stage, status });
        }

        let step = &mut self.steps[index];
        step.status = status;
        step.description = description.into();
        step.date = Some(date);
        Ok(())
    }

    /// Complete the final step and close the timeline. No-op when already closed.
    pub fn mark_terminal(
        &mut self,
        description: impl Into<String>,
        date: DateTime<Utc>,
    ) -> Result<(), TimelineError> {
        if self.is_closed() {
            return Ok(());
        }
        self.advance(Stage::Final, StepStatus::Completed, description, date)
    }

    /// Single-current-stage invariant: settled steps, then at most one current, then upcoming.
    pub fn is_consistent(&self) -> bool {
        let mut seen_unsettled = false;
        let mut current_count = 0;
        for step in &self.steps {
            match step.status {
                StepStatus::Completed | StepStatus::Error if seen_unsettled => return false,
                StepStatus::Completed | StepStatus::Error => {}
                StepStatus::Current if seen_unsettled => return false,
                StepStatus::Current => {
                    current_count += 1;
                    seen_unsettled = true;
                }
                StepStatus::Upcoming => seen_unsettled = true,
            }
        }
        current_count <= 1
    }
}

impl TryFrom<Vec<TimelineStep>> for Timeline {
    type Error = TimelineError;

    fn try_from(steps: Vec<TimelineStep>) -> Result<Self, Self::Error> {
        let steps: [TimelineStep; 4] = steps.try_into().map_err(|_| TimelineError::Malformed)?;
        let ordered = steps
            .iter()
            .zip(Stage::ordered())
            .all(|(step, stage)| step.stage == stage);
        if !ordered {
            return Err(TimelineError::Malformed);
        }
        Ok(Self { steps })
    }
}

impl From<Timeline> for Vec<TimelineStep> {
    fn from(timeline: Timeline) -> Self {
        timeline.steps.into()
    }
}
