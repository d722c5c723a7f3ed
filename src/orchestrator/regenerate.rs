use crate::{AgentId, Error, MessageRecord, ModelId, Role};

/// What a regeneration replays, borrowed from the fetched history.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegenerationTarget<'a> {
    /// Messages preceding the trigger, oldest first.
    pub prior: &'a [MessageRecord],
    /// User message whose answer is regenerated.
    pub trigger: &'a MessageRecord,
    /// Most recent assistant message, the one being replaced.
    pub replaced: &'a MessageRecord,
}

impl RegenerationTarget<'_> {
    /// Model for the new answer: the explicit override, else the replaced message's model.
    pub fn model_id(&self, requested: Option<ModelId>) -> Result<ModelId, Error> {
        requested
            .or(self.replaced.model_id)
            .filter(|id| id.0 > 0)
            .ok_or_else(|| {
                Error::validation(format!(
                    "cannot determine model for regeneration (original: {:?}, requested: {:?})",
                    self.replaced.model_id, requested
                ))
            })
    }

    pub fn agent_id(&self) -> Option<AgentId> {
        self.replaced.agent_id
    }
}

/// Locate the latest assistant message and the user message that prompted it.
pub fn find_regeneration_target(history: &[MessageRecord]) -> Result<RegenerationTarget<'_>, Error> {
    let replaced_idx = history
        .iter()
        .rposition(|m| m.role == Role::Assistant)
        .ok_or_else(|| Error::validation("no previous assistant message to regenerate"))?;

    let before = &history[..replaced_idx];
    let resubmit = match before.iter().rposition(|m| m.role == Role::User) {
        Some(trigger_idx) => &before[..=trigger_idx],
        None => before,
    };

    let (trigger, prior) = resubmit
        .split_last()
        .ok_or_else(|| Error::validation("no suitable history to regenerate from"))?;
    if trigger.role != Role::User {
        return Err(Error::validation("last message must be from a user"));
    }

    Ok(RegenerationTarget {
        prior,
        trigger,
        replaced: &history[replaced_idx],
    })
}
