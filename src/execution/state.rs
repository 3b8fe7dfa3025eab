use std::fmt;

/// Lifecycle state of a [`super::Job`].
///
/// `Created -> Reading -> Mapping -> Grouping -> Reducing -> Done`, with `Failed` reachable
/// from every state except `Done`. No state is ever re-entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobState {
    Created,
    Reading,
    Mapping,
    Grouping,
    Reducing,
    Done,
    Failed,
}

impl JobState {
    /// Returns `true` if the driver may move from `self` to `next`.
    pub fn can_transition_to(self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, next),
            (Created, Reading)
                | (Reading, Mapping)
                | (Mapping, Grouping)
                | (Grouping, Reducing)
                | (Reducing, Done)
                | (Created | Reading | Mapping | Grouping | Reducing, Failed)
        )
    }

    /// Returns `true` for `Done` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Done | JobState::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobState::Created => "CREATED",
            JobState::Reading => "READING",
            JobState::Mapping => "MAPPING",
            JobState::Grouping => "GROUPING",
            JobState::Reducing => "REDUCING",
            JobState::Done => "DONE",
            JobState::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::JobState::{self, *};

    const ALL: [JobState; 7] = [Created, Reading, Mapping, Grouping, Reducing, Done, Failed];

    #[test]
    fn happy_path_is_strictly_forward() {
        let path = [Created, Reading, Mapping, Grouping, Reducing, Done];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
        assert!(!Mapping.can_transition_to(Reducing));
        assert!(!Reducing.can_transition_to(Mapping));
    }

    #[test]
    fn failed_reachable_from_every_non_terminal_state() {
        for s in ALL {
            assert_eq!(s.can_transition_to(Failed), !s.is_terminal(), "{s}");
        }
    }

    #[test]
    fn no_state_is_reentered() {
        for s in ALL {
            assert!(!s.can_transition_to(s), "{s}");
        }
        for s in ALL {
            assert!(!Done.can_transition_to(s));
            assert!(!Failed.can_transition_to(s));
        }
    }
}
