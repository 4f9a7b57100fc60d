use crate::diff::build_label;
use crate::model::{Build, BuildState};
use notify_rust::{Notification, Urgency};

pub fn send_desktop(build: &Build) {
    let (summary, icon, urgency) = match build.state {
        BuildState::Finished if build.success => {
            ("Docs build passed", "dialog-information", Urgency::Normal)
        }
        BuildState::Finished => ("Docs build failed", "dialog-error", Urgency::Critical),
        _ => ("Docs build cancelled", "dialog-information", Urgency::Normal),
    };

    let body = match build.error_message() {
        Some(error) => format!("{}\n{error}", build_label(build)),
        None => build_label(build),
    };

    if let Err(e) = Notification::new()
        .summary(summary)
        .body(&body)
        .icon(icon)
        .urgency(urgency)
        .show()
    {
        tracing::debug!("desktop notification failed: {e}");
    }
}
