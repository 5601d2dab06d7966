//! Notes the assistant leaves for the human team.

use async_trait::async_trait;
use database::{assistant, validation::validate_note};

use crate::error::ToolError;
use crate::tool::{ParamKind, ParamSpec, Tool, ToolArgs, ToolOutput};

pub struct AddTeamNote;

#[async_trait]
impl Tool for AddTeamNote {
    fn name(&self) -> &str {
        "add_team_note"
    }

    fn description(&self) -> &str {
        "Leave a note for the team about this call."
    }

    fn params(&self) -> &'static [ParamSpec] {
        const PARAMS: &[ParamSpec] = &[ParamSpec::required(
            "note",
            ParamKind::String,
            "Note text",
        )];
        PARAMS
    }

    async fn execute(&self, args: ToolArgs) -> Result<ToolOutput, ToolError> {
        let note = args.get_string("note")?;
        validate_note(&note).map_err(|e| ToolError::invalid("note", e.to_string()))?;

        let scope = &args.ctx.scope;
        assistant::add_team_note(
            &args.ctx.services.pool,
            &scope.assistant_id,
            &note,
            scope.call_id.as_deref(),
        )
        .await?;
        Ok(ToolOutput::success("Note saved for the team."))
    }
}
