use crate::app::BuildViewModel;
use crate::model::{Build, BuildState};

/// Describe what changed between two snapshots of the same build, if worth telling
/// the user about. Output-only changes are not.
pub fn describe_transition(previous: &Build, next: &Build) -> Option<String> {
    if previous.id != next.id {
        return None;
    }
    let label = build_label(next);

    if previous.state != next.state {
        return Some(match &next.state {
            BuildState::Finished if next.success => format!("{label} passed"),
            BuildState::Finished => format!("{label} failed"),
            BuildState::Cancelled => format!("{label} was cancelled"),
            BuildState::InProgress(state) => format!("{label}: {state}"),
        });
    }

    let new_failure = next
        .commands()
        .iter()
        .enumerate()
        .find(|(i, cmd)| {
            cmd.exit_code.is_some_and(|code| code != 0)
                && previous
                    .commands()
                    .get(*i)
                    .is_none_or(|old| old.exit_code != cmd.exit_code)
        })
        .map(|(_, cmd)| cmd);
    if let Some(cmd) = new_failure {
        return Some(format!("{label}: {} failed", cmd.label()));
    }

    match (previous.error_message(), next.error_message()) {
        (None, Some(error)) => Some(format!("{label}: {error}")),
        _ => None,
    }
}

pub fn build_label(build: &Build) -> String {
    match &build.project {
        Some(project) => format!("{project} #{}", build.id),
        None => format!("Build #{}", build.id),
    }
}

/// Push a notification for the change from `previous` to the view model's current build.
/// The first snapshot of a session has nothing to compare against and is silent.
pub fn detect_changes(vm: &mut BuildViewModel, previous: Option<&Build>) {
    let Some(previous) = previous else {
        return;
    };
    let Some(message) = vm.build().and_then(|next| describe_transition(previous, next)) else {
        return;
    };
    tracing::debug!(%message, "build transition");
    vm.add_notification(message);
}
