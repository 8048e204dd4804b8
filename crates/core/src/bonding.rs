//! Bonding state and the threshold decision rule.
//!
//! Pure logic, no I/O. [`required_action`] is edge-triggered: it only
//! returns an action when the reading sits on the opposite side of the
//! threshold from the current state. Repeated readings on the same side
//! yield `None`, which is what keeps the webhook quiet between crossings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Default client-count threshold.
pub const DEFAULT_THRESHOLD: u32 = 30;

/// Status of the downstream bonding feature as last confirmed by the webhook.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BondingState {
    /// Bonding is on. Also the startup state ("not yet disabled").
    #[default]
    Enabled,
    Disabled,
}

impl BondingState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Enabled => "ENABLED",
            Self::Disabled => "DISABLED",
        }
    }
}

impl fmt::Display for BondingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body value sent to the webhook receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WebhookState {
    Up,
    Down,
}

impl WebhookState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Up => "UP",
            Self::Down => "DOWN",
        }
    }
}

impl fmt::Display for WebhookState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WebhookState {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "UP" => Ok(Self::Up),
            "DOWN" => Ok(Self::Down),
            _ => Err(CoreError::UnknownState(s.to_string())),
        }
    }
}

/// A state change the monitor wants to make.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BondingAction {
    EnableBonding,
    DisableBonding,
}

impl BondingAction {
    /// State the machine moves to once the webhook confirms this action.
    pub fn target_state(self) -> BondingState {
        match self {
            Self::EnableBonding => BondingState::Enabled,
            Self::DisableBonding => BondingState::Disabled,
        }
    }

    /// Webhook body that carries out this action.
    pub fn webhook_state(self) -> WebhookState {
        match self {
            Self::EnableBonding => WebhookState::Up,
            Self::DisableBonding => WebhookState::Down,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::EnableBonding => "ENABLE_BONDING",
            Self::DisableBonding => "DISABLE_BONDING",
        }
    }
}

impl fmt::Display for BondingAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BondingAction {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ENABLE_BONDING" => Ok(Self::EnableBonding),
            "DISABLE_BONDING" => Ok(Self::DisableBonding),
            _ => Err(CoreError::UnknownAction(s.to_string())),
        }
    }
}

/// Decide whether `count` crosses `threshold` relative to `current`.
///
/// `count == threshold` counts as above the threshold, so it enables (or
/// keeps enabled) bonding.
pub fn required_action(current: BondingState, count: u32, threshold: u32) -> Option<BondingAction> {
    match (current, count >= threshold) {
        (BondingState::Enabled, false) => Some(BondingAction::DisableBonding),
        (BondingState::Disabled, true) => Some(BondingAction::EnableBonding),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn initial_state_is_enabled() {
        assert_eq!(BondingState::default(), BondingState::Enabled);
    }

    #[test]
    fn below_threshold_while_enabled_disables() {
        assert_eq!(
            required_action(BondingState::Enabled, 25, 30),
            Some(BondingAction::DisableBonding)
        );
    }

    #[test]
    fn above_threshold_while_enabled_is_noop() {
        for count in [40, 35, 32, 31] {
            assert_eq!(required_action(BondingState::Enabled, count, 30), None);
        }
    }

    #[test]
    fn below_threshold_while_disabled_is_noop() {
        for count in [25, 20, 10, 0] {
            assert_eq!(required_action(BondingState::Disabled, count, 30), None);
        }
    }

    #[test]
    fn boundary_counts_as_above() {
        assert_eq!(
            required_action(BondingState::Disabled, 30, 30),
            Some(BondingAction::EnableBonding)
        );
        assert_eq!(required_action(BondingState::Enabled, 30, 30), None);
        assert_eq!(
            required_action(BondingState::Enabled, 29, 30),
            Some(BondingAction::DisableBonding)
        );
    }

    #[test]
    fn action_maps_to_state_and_webhook_body() {
        assert_eq!(BondingAction::DisableBonding.target_state(), BondingState::Disabled);
        assert_eq!(BondingAction::DisableBonding.webhook_state(), WebhookState::Down);
        assert_eq!(BondingAction::EnableBonding.target_state(), BondingState::Enabled);
        assert_eq!(BondingAction::EnableBonding.webhook_state(), WebhookState::Up);
    }

    #[test]
    fn serde_names_match_wire_format() {
        assert_eq!(serde_json::to_string(&WebhookState::Up).unwrap(), "\"UP\"");
        assert_eq!(serde_json::to_string(&WebhookState::Down).unwrap(), "\"DOWN\"");
        assert_eq!(
            serde_json::to_string(&BondingAction::DisableBonding).unwrap(),
            "\"DISABLE_BONDING\""
        );
        assert_eq!(serde_json::to_string(&BondingState::Disabled).unwrap(), "\"DISABLED\"");
    }

    #[test]
    fn action_parses_from_stored_name() {
        assert_eq!(
            "ENABLE_BONDING".parse::<BondingAction>().unwrap(),
            BondingAction::EnableBonding
        );
        assert_matches!(
            "TOGGLE".parse::<BondingAction>(),
            Err(CoreError::UnknownAction(name)) if name == "TOGGLE"
        );
    }

    #[test]
    fn webhook_state_parse_is_case_insensitive() {
        assert_eq!("down".parse::<WebhookState>().unwrap(), WebhookState::Down);
        assert_matches!("sideways".parse::<WebhookState>(), Err(CoreError::UnknownState(_)));
    }
}
