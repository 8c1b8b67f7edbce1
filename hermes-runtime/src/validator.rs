//! §4.F Field validator.
//!
//! Grounded on `examples/original_source/.../message_validator.py`: mandatory
//! fields that are missing or malformed abort the scenario
//! ([`ValidationError`]); soft bound violations (barcodes, measurement
//! ranges, a `LaneId`/`Severity` mismatch) only raise a [`CbEvt::Warning`]
//! through the environment's callback channel and never fail the scenario
//! on their own.
//!
//! The original's decimal-places check inverts its own stated intent
//! (`if decimals <= max: warn "more than max decimals"`); this is
//! implemented as the message text actually describes -- warn when a
//! measurement carries *more* than two decimal digits -- recorded as a
//! resolved discrepancy in DESIGN.md rather than reproduced literally.

use hermes_message::{BoardQuality, FlippedBoard, Message, NotificationCode, SeverityType, Tag};
use regex::Regex;
use std::sync::OnceLock;

use crate::environment::ScenarioSkipped;
use crate::{CbEvt, Environment, ValidationError};

/// Any failure path through a validator: either a hard field violation, or
/// the callback channel being unanswered when a validator needs to warn
/// or report something (e.g. `HERMES_VERSION`).
#[derive(Debug, thiserror::Error)]
pub enum FieldError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Skipped(#[from] ScenarioSkipped),
}

fn version_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[1-9][0-9]{0,2}\.[0-9]{1,3}$").expect("static pattern"))
}

fn board_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$").expect("static pattern")
    })
}

/// Validate a received `ServiceDescription` and return its `Version`.
pub fn validate_service_description(env: &Environment, msg: &Message) -> Result<String, FieldError> {
    let version = msg
        .get("Version")
        .ok_or_else(|| ValidationError::new("IPC-Hermes version is missing in ServiceDescription"))?
        .to_string();
    if let Some(evt) = crate::hermes_version_event(msg) {
        env.run_callback(evt)?;
    }
    tracing::info!(%version, "system under test states IPC-Hermes version");
    if !version_regex().is_match(&version) {
        return Err(ValidationError::new(format!(
            "IPC-Hermes version in ServiceDescription has not the correct format xxx.yyy, found: {version}"
        ))
        .into());
    }

    let machine_id = msg
        .get("MachineId")
        .ok_or_else(|| ValidationError::new("MachineId is missing in ServiceDescription"))?;
    if machine_id.trim().is_empty() {
        env.run_callback(CbEvt::Warning {
            text: "Be kind to loggers, don't leave MachineId in ServiceDescription as empty string".to_string(),
        })?;
    }

    let lane_id = msg
        .get("LaneId")
        .ok_or_else(|| ValidationError::new("LaneId is missing in ServiceDescription"))?;
    let lane_id: u32 = lane_id
        .parse()
        .map_err(|_| ValidationError::new("LaneId in ServiceDescription is not greater than zero"))?;
    if lane_id == 0 {
        return Err(ValidationError::new("LaneId in ServiceDescription is not greater than zero").into());
    }
    if lane_id != env.lane_id {
        env.run_callback(CbEvt::Warning {
            text: format!(
                "Received LaneId ({lane_id}) in ServiceDescription, not the same as the harness's own configuration ({})",
                env.lane_id
            ),
        })?;
    }

    Ok(version)
}

/// Validate a received `Notification` against the `NotificationCode` and
/// `Severity` a scenario expects. A `Severity` mismatch is only a warning,
/// per §4.F.
pub fn validate_notification(
    env: &Environment,
    msg: &Message,
    expected_code: NotificationCode,
    expected_severity: SeverityType,
) -> Result<(), FieldError> {
    let code = mandatory_enum(msg, "NotificationCode", NotificationCode::from_code)?;
    if code.code() != expected_code.code() {
        return Err(ValidationError::new(format!(
            "NotificationCode should be {} ({:?}), found {} ({:?})",
            expected_code.code(),
            expected_code,
            code.code(),
            code
        ))
        .into());
    }

    let severity = mandatory_enum(msg, "Severity", SeverityType::from_code)?;
    if severity.code() != expected_severity.code() {
        env.run_callback(CbEvt::Warning {
            text: format!(
                "Notification was sent according to standard, but it's recommended to use Severity {} ({:?}), received {} ({:?})",
                expected_severity.code(),
                expected_severity,
                severity.code(),
                severity
            ),
        })?;
    }
    Ok(())
}

/// Validate the board-info payload of a `BoardAvailable`, `BoardForecast`,
/// or populated `MachineReady`.
pub fn validate_board_info(env: &Environment, msg: &Message) -> Result<(), FieldError> {
    let board_id = msg
        .get("BoardId")
        .ok_or_else(|| ValidationError::new(format!("Mandatory BoardId is missing in {}", msg.tag())))?;
    if !board_id_regex().is_match(board_id) {
        return Err(ValidationError::new(format!(
            "BoardId has not the correct GUID format xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx, found: {board_id}"
        ))
        .into());
    }

    let created_by = msg
        .get("BoardIdCreatedBy")
        .ok_or_else(|| ValidationError::new(format!("Mandatory BoardIdCreatedBy is missing in {}", msg.tag())))?;
    if created_by.trim().is_empty() {
        return Err(ValidationError::new("BoardIdCreatedBy is present but an empty string in board info").into());
    }

    mandatory_enum(msg, "FailedBoard", BoardQuality::from_code)?;
    mandatory_enum(msg, "FlippedBoard", FlippedBoard::from_code)?;

    validate_barcode(env, msg, "TopBarcode")?;
    validate_barcode(env, msg, "BottomBarcode")?;

    validate_float(env, msg, "Length", Some(2.0), Some(2000.0))?;
    validate_float(env, msg, "Width", Some(2.0), Some(2000.0))?;
    validate_float(env, msg, "Thickness", Some(0.1), Some(100.0))?;
    validate_float(env, msg, "ConveyorSpeed", Some(6.0), Some(600.0))?;
    validate_float(env, msg, "TopClearanceHeight", None, Some(100.0))?;
    validate_float(env, msg, "BottomClearanceHeight", None, Some(100.0))?;
    validate_float(env, msg, "Weight", Some(1.0), Some(10000.0))?;

    Ok(())
}

fn mandatory_enum<T: std::fmt::Debug>(
    msg: &Message,
    field_name: &str,
    decode: impl Fn(u32) -> Option<T>,
) -> Result<T, ValidationError> {
    let raw = msg
        .get(field_name)
        .ok_or_else(|| ValidationError::new(format!("Mandatory {field_name} is missing in {}", msg.tag())))?;
    let code: u32 = raw.parse().map_err(|_| {
        ValidationError::new(format!(
            "{field_name} enum value in {} is not an integer, found: {raw}",
            msg.tag()
        ))
    })?;
    decode(code).ok_or_else(|| {
        ValidationError::new(format!("{field_name} enum value in {} is not valid, found: {raw}", msg.tag()))
    })
}

fn validate_barcode(env: &Environment, msg: &Message, field_name: &str) -> Result<(), ScenarioSkipped> {
    let Some(barcode) = msg.get(field_name) else {
        return Ok(());
    };
    if barcode.trim().is_empty() {
        env.run_callback(CbEvt::Warning { text: format!("Barcode {field_name} in board info is empty string") })?;
    }
    if barcode.to_lowercase().contains("error") {
        env.run_callback(CbEvt::Warning {
            text: format!("Barcode {field_name} in board info has the text 'error' in it"),
        })?;
    }
    Ok(())
}

fn validate_float(
    env: &Environment,
    msg: &Message,
    field_name: &str,
    min_warning: Option<f64>,
    max_warning: Option<f64>,
) -> Result<(), FieldError> {
    let Some(raw) = msg.get(field_name) else {
        return Ok(());
    };
    let value: f64 = raw
        .parse()
        .map_err(|_| ValidationError::new(format!("{field_name} in board info is not a positive float")))?;
    if value <= 0.0 {
        return Err(ValidationError::new(format!("{field_name} in board info is not a positive float")).into());
    }

    if let Some((_, fraction)) = raw.split_once('.') {
        if fraction.len() > 2 {
            env.run_callback(CbEvt::Warning {
                text: format!("{field_name} in board info has more than 2 decimals"),
            })?;
        }
    }
    if let Some(min) = min_warning {
        if value < min {
            env.run_callback(CbEvt::Warning {
                text: format!("{field_name} in board info is smaller than {min}, found: {value}"),
            })?;
        }
    }
    if let Some(max) = max_warning {
        if value > max {
            env.run_callback(CbEvt::Warning {
                text: format!("{field_name} in board info is larger than {max}, found: {value}"),
            })?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hermes_message::BoardAttributes;

    fn env_with_callback() -> Environment {
        let env = Environment::for_test();
        env.register_callback(Box::new(|_evt| {}));
        env
    }

    #[test]
    fn service_description_accepts_well_formed_message() {
        let env = env_with_callback();
        let msg = Message::service_description("Machine1", 2, None, "1.2", &[]);
        let version = validate_service_description(&env, &msg).unwrap();
        assert_eq!(version, "1.2");
    }

    #[test]
    fn service_description_rejects_malformed_version() {
        let env = env_with_callback();
        let msg = Message::service_description("Machine1", 2, None, "v1", &[]);
        let err = validate_service_description(&env, &msg).unwrap_err();
        assert!(matches!(err, FieldError::Validation(_)));
    }

    #[test]
    fn service_description_warns_without_failing_on_lane_mismatch() {
        let env = env_with_callback();
        let msg = Message::service_description("Machine1", 9, None, "1.2", &[]);
        assert!(validate_service_description(&env, &msg).is_ok());
    }

    #[test]
    fn notification_mismatch_on_code_fails() {
        let env = env_with_callback();
        let msg = Message::notification(NotificationCode::ConnectionReset, SeverityType::Error, "x");
        let err = validate_notification(&env, &msg, NotificationCode::ProtocolError, SeverityType::Fatal)
            .unwrap_err();
        assert!(matches!(err, FieldError::Validation(_)));
    }

    #[test]
    fn notification_mismatch_on_severity_only_warns() {
        let env = env_with_callback();
        let msg = Message::notification(NotificationCode::ProtocolError, SeverityType::Warning, "x");
        assert!(validate_notification(&env, &msg, NotificationCode::ProtocolError, SeverityType::Fatal).is_ok());
    }

    #[test]
    fn board_info_accepts_well_formed_uuid() {
        let env = env_with_callback();
        let msg = Message::board_available(
            "f47ac10b-58cc-4372-a567-0e02b2c3d479",
            "Upstream",
            BoardAttributes::default(),
        );
        assert!(validate_board_info(&env, &msg).is_ok());
    }

    #[test]
    fn board_info_rejects_malformed_board_id() {
        let env = env_with_callback();
        let msg = Message::board_available("not-a-guid", "Upstream", BoardAttributes::default());
        let err = validate_board_info(&env, &msg).unwrap_err();
        assert!(matches!(err, FieldError::Validation(_)));
    }

    #[test]
    fn board_info_warns_on_out_of_range_weight_without_failing() {
        let env = env_with_callback();
        let mut attrs = BoardAttributes::default();
        attrs.weight = Some(99999.0);
        let msg = Message::board_available("f47ac10b-58cc-4372-a567-0e02b2c3d479", "Upstream", attrs);
        assert!(validate_board_info(&env, &msg).is_ok());
    }

    #[test]
    fn missing_callback_turns_a_warning_path_into_a_skip() {
        let env = Environment::for_test();
        let mut attrs = BoardAttributes::default();
        attrs.weight = Some(99999.0);
        let msg = Message::board_available("f47ac10b-58cc-4372-a567-0e02b2c3d479", "Upstream", attrs);
        let err = validate_board_info(&env, &msg).unwrap_err();
        assert!(matches!(err, FieldError::Skipped(_)));
    }
}
