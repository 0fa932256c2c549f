//! Rendering of resource state for stdout.

use std::io::Write;

use serde::Serialize;

use nostrap_core::{ReadOutcome, ResourceState};

use crate::AppError;

/// Printed form of [`ResourceState`]; the secret is opt-in.
#[derive(Debug, Serialize)]
struct StateView<'a> {
    id: &'a str,
    accessor_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    secret_id: Option<&'a str>,
}

impl<'a> StateView<'a> {
    fn new(state: &'a ResourceState, show_secret: bool) -> Self {
        Self {
            id: &state.id,
            accessor_id: &state.accessor_id,
            secret_id: show_secret.then_some(state.secret_id.as_str()),
        }
    }
}

pub(crate) fn write_state(
    out: &mut impl Write,
    state: &ResourceState,
    show_secret: bool,
) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(&StateView::new(state, show_secret))
        .map_err(AppError::Render)?;
    writeln!(out, "{rendered}").map_err(AppError::Write)
}

pub(crate) fn write_outcome(
    out: &mut impl Write,
    outcome: &ReadOutcome,
    show_secret: bool,
) -> Result<(), AppError> {
    let Some(state) = outcome.state() else {
        return writeln!(out, "absent").map_err(AppError::Write);
    };
    write_state(out, state, show_secret)
}
