use std::borrow::Cow;

use chrono::Utc;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;

use crate::error::ParseError;
use crate::tag::{
    BoardQuality, CheckAliveType, FlippedBoard, NotificationCode, SeverityType, Tag,
    TransferState,
};

const ROOT_TAG: &str = "Hermes";
const TIMESTAMP_ATTR: &str = "Timestamp";
const SUPPORTED_FEATURES_TAG: &str = "SupportedFeatures";

/// A single `<Hermes><Tag .../></Hermes>` document.
///
/// Attributes are kept in insertion order, the way the original XML tree
/// keeps the order its caller set them in. Order has no protocol meaning;
/// [`Message::to_canonical_string`] sorts attributes for comparisons that
/// shouldn't depend on it.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    timestamp: String,
    tag: Tag,
    attributes: Vec<(String, String)>,
    supported_features: Option<Vec<String>>,
}

/// Optional attributes shared by the board-info bearing messages
/// (`BoardAvailable`, `BoardForecast`, `MachineReady`). Not every field
/// applies to every message -- each constructor only consumes the subset
/// IPC-HERMES-9852 actually defines for it.
#[derive(Debug, Clone)]
pub struct BoardAttributes {
    pub product_type_id: Option<String>,
    pub failed_board: BoardQuality,
    pub flipped_board: FlippedBoard,
    pub top_barcode: Option<String>,
    pub bottom_barcode: Option<String>,
    pub length: Option<f64>,
    pub width: Option<f64>,
    pub thickness: Option<f64>,
    pub conveyor_speed: Option<f64>,
    pub top_clearance_height: Option<f64>,
    pub bottom_clearance_height: Option<f64>,
    pub weight: Option<f64>,
    pub work_order_id: Option<String>,
}

impl Default for BoardAttributes {
    fn default() -> Self {
        BoardAttributes {
            product_type_id: None,
            failed_board: BoardQuality::AnyOrUnknown,
            flipped_board: FlippedBoard::SideUpIsUnknown,
            top_barcode: None,
            bottom_barcode: None,
            length: None,
            width: None,
            thickness: None,
            conveyor_speed: None,
            top_clearance_height: None,
            bottom_clearance_height: None,
            weight: None,
            work_order_id: None,
        }
    }
}

impl Message {
    fn new(tag: Tag) -> Self {
        Message {
            timestamp: Utc::now().format("%Y-%m-%dT%H:%M:%S%.3f").to_string(),
            tag,
            attributes: Vec::new(),
            supported_features: None,
        }
    }

    fn set(&mut self, name: &str, value: impl ToString) -> &mut Self {
        self.attributes.push((name.to_string(), value.to_string()));
        self
    }

    fn set_opt(&mut self, name: &str, value: Option<impl ToString>) -> &mut Self {
        if let Some(value) = value {
            self.set(name, value);
        }
        self
    }

    pub fn tag(&self) -> &Tag {
        &self.tag
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn supported_features(&self) -> Option<&[String]> {
        self.supported_features.as_deref()
    }

    // --- constructors, one per tag in the closed set ---

    pub fn check_alive(kind: Option<CheckAliveType>, id: Option<u64>) -> Self {
        let mut msg = Self::new(Tag::CheckAlive);
        msg.set_opt("Type", kind.map(|k| k.code()));
        msg.set_opt("Id", id);
        msg
    }

    pub fn service_description(
        machine_id: &str,
        lane_id: u32,
        interface_id: Option<&str>,
        version: &str,
        supported_features: &[&str],
    ) -> Self {
        let mut msg = Self::new(Tag::ServiceDescription);
        msg.set("MachineId", machine_id);
        msg.set("LaneId", lane_id);
        msg.set("Version", version);
        msg.set_opt("InterfaceId", interface_id);
        msg.supported_features = Some(supported_features.iter().map(|s| s.to_string()).collect());
        msg
    }

    pub fn notification(code: NotificationCode, severity: SeverityType, description: &str) -> Self {
        let mut msg = Self::new(Tag::Notification);
        msg.set("NotificationCode", code.code());
        msg.set("Severity", severity.code());
        msg.set("Description", description);
        msg
    }

    pub fn board_available(board_id: &str, board_id_created_by: &str, attrs: BoardAttributes) -> Self {
        let mut msg = Self::new(Tag::BoardAvailable);
        msg.set("BoardId", board_id);
        msg.set("BoardIdCreatedBy", board_id_created_by);
        msg.set_opt("ProductTypeId", attrs.product_type_id);
        msg.set("FailedBoard", attrs.failed_board.code());
        msg.set("FlippedBoard", attrs.flipped_board.code());
        msg.set_opt("TopBarcode", attrs.top_barcode);
        msg.set_opt("BottomBarcode", attrs.bottom_barcode);
        msg.set_opt("Length", attrs.length);
        msg.set_opt("Width", attrs.width);
        msg.set_opt("Thickness", attrs.thickness);
        msg.set_opt("ConveyorSpeed", attrs.conveyor_speed);
        msg.set_opt("TopClearanceHeight", attrs.top_clearance_height);
        msg.set_opt("BottomClearanceHeight", attrs.bottom_clearance_height);
        msg.set_opt("Weight", attrs.weight);
        msg.set_opt("WorkOrderId", attrs.work_order_id);
        msg
    }

    pub fn board_forecast(
        forecast_id: Option<&str>,
        time_until_available: Option<f64>,
        board_id: Option<&str>,
        board_id_created_by: Option<&str>,
        attrs: BoardAttributes,
    ) -> Self {
        let mut msg = Self::new(Tag::BoardForecast);
        msg.set_opt("ForecastId", forecast_id);
        msg.set_opt("TimeUntilAvailable", time_until_available);
        msg.set_opt("BoardId", board_id);
        msg.set_opt("BoardIdCreatedBy", board_id_created_by);
        msg.set_opt("ProductTypeId", attrs.product_type_id);
        msg.set("FailedBoard", attrs.failed_board.code());
        msg.set("FlippedBoard", attrs.flipped_board.code());
        msg.set_opt("TopBarcode", attrs.top_barcode);
        msg.set_opt("BottomBarcode", attrs.bottom_barcode);
        msg.set_opt("Length", attrs.length);
        msg.set_opt("Width", attrs.width);
        msg.set_opt("Thickness", attrs.thickness);
        msg.set_opt("ConveyorSpeed", attrs.conveyor_speed);
        msg.set_opt("TopClearanceHeight", attrs.top_clearance_height);
        msg.set_opt("BottomClearanceHeight", attrs.bottom_clearance_height);
        msg.set_opt("Weight", attrs.weight);
        msg.set_opt("WorkOrderId", attrs.work_order_id);
        msg
    }

    pub fn revoke_board_available() -> Self {
        Self::new(Tag::RevokeBoardAvailable)
    }

    pub fn machine_ready(forecast_id: Option<&str>, board_id: Option<&str>, attrs: BoardAttributes) -> Self {
        let mut msg = Self::new(Tag::MachineReady);
        msg.set("FailedBoard", attrs.failed_board.code());
        msg.set_opt("ForecastId", forecast_id);
        msg.set_opt("BoardId", board_id);
        msg.set_opt("ProductTypeId", attrs.product_type_id);
        msg.set("FlippedBoard", attrs.flipped_board.code());
        msg.set_opt("Length", attrs.length);
        msg.set_opt("Width", attrs.width);
        msg.set_opt("Thickness", attrs.thickness);
        msg.set_opt("ConveyorSpeed", attrs.conveyor_speed);
        msg.set_opt("TopClearanceHeight", attrs.top_clearance_height);
        msg.set_opt("BottomClearanceHeight", attrs.bottom_clearance_height);
        msg.set_opt("Weight", attrs.weight);
        msg.set_opt("WorkOrderId", attrs.work_order_id);
        msg
    }

    pub fn revoke_machine_ready() -> Self {
        Self::new(Tag::RevokeMachineReady)
    }

    pub fn start_transport(board_id: &str, conveyor_speed: Option<f64>) -> Self {
        let mut msg = Self::new(Tag::StartTransport);
        msg.set("BoardId", board_id);
        msg.set_opt("ConveyorSpeed", conveyor_speed);
        msg
    }

    pub fn stop_transport(transfer_state: TransferState, board_id: &str) -> Self {
        let mut msg = Self::new(Tag::StopTransport);
        msg.set("TransferState", transfer_state.code());
        msg.set("BoardId", board_id);
        msg
    }

    pub fn transport_finished(transfer_state: TransferState, board_id: &str) -> Self {
        let mut msg = Self::new(Tag::TransportFinished);
        msg.set("TransferState", transfer_state.code());
        msg.set("BoardId", board_id);
        msg
    }

    /// Best-effort reconstruction -- see SPEC_FULL.md Open Question 4.
    pub fn query_board_info(board_id: &str) -> Self {
        let mut msg = Self::new(Tag::QueryBoardInfo);
        msg.set("BoardId", board_id);
        msg
    }

    /// Best-effort reconstruction -- see SPEC_FULL.md Open Question 4.
    pub fn send_board_info(board_id: &str, board_id_created_by: Option<&str>, attrs: BoardAttributes) -> Self {
        let mut msg = Self::new(Tag::SendBoardInfo);
        msg.set("BoardId", board_id);
        msg.set_opt("BoardIdCreatedBy", board_id_created_by);
        msg.set_opt("ProductTypeId", attrs.product_type_id);
        msg.set("FailedBoard", attrs.failed_board.code());
        msg.set("FlippedBoard", attrs.flipped_board.code());
        msg.set_opt("TopBarcode", attrs.top_barcode);
        msg.set_opt("BottomBarcode", attrs.bottom_barcode);
        msg.set_opt("Length", attrs.length);
        msg.set_opt("Width", attrs.width);
        msg.set_opt("Weight", attrs.weight);
        msg
    }

    /// Best-effort reconstruction -- see SPEC_FULL.md Open Question 4.
    pub fn set_configuration(lane_id: u32, config: &[(String, String)]) -> Self {
        let mut msg = Self::new(Tag::SetConfiguration);
        msg.set("LaneId", lane_id);
        for (key, value) in config {
            msg.set(key, value);
        }
        msg
    }

    /// Best-effort reconstruction -- see SPEC_FULL.md Open Question 4.
    pub fn get_configuration() -> Self {
        Self::new(Tag::GetConfiguration)
    }

    /// Best-effort reconstruction -- see SPEC_FULL.md Open Question 4.
    pub fn current_configuration(lane_id: u32, config: &[(String, String)]) -> Self {
        let mut msg = Self::new(Tag::CurrentConfiguration);
        msg.set("LaneId", lane_id);
        for (key, value) in config {
            msg.set(key, value);
        }
        msg
    }

    /// Serialize to the bytes sent on the wire.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = Writer::new(Vec::new());
        let mut root = BytesStart::new(ROOT_TAG);
        root.push_attribute((TIMESTAMP_ATTR, self.timestamp.as_str()));
        writer.write_event(Event::Start(root)).expect("in-memory writer cannot fail");

        let mut data = BytesStart::new(self.tag.as_str());
        for (key, value) in &self.attributes {
            data.push_attribute((key.as_str(), value.as_str()));
        }

        if let Some(features) = &self.supported_features {
            writer.write_event(Event::Start(data)).expect("in-memory writer cannot fail");
            writer
                .write_event(Event::Start(BytesStart::new(SUPPORTED_FEATURES_TAG)))
                .expect("in-memory writer cannot fail");
            for feature in features {
                writer
                    .write_event(Event::Empty(BytesStart::new(feature.as_str())))
                    .expect("in-memory writer cannot fail");
            }
            writer
                .write_event(Event::End(BytesEnd::new(SUPPORTED_FEATURES_TAG)))
                .expect("in-memory writer cannot fail");
            writer
                .write_event(Event::End(BytesEnd::new(self.tag.as_str())))
                .expect("in-memory writer cannot fail");
        } else {
            writer.write_event(Event::Empty(data)).expect("in-memory writer cannot fail");
        }

        writer
            .write_event(Event::End(BytesEnd::new(ROOT_TAG)))
            .expect("in-memory writer cannot fail");
        writer.into_inner()
    }

    /// Render the message the way tests compare it: attributes sorted by
    /// name, no incidental inter-element whitespace. Never used on the wire.
    pub fn to_canonical_string(&self) -> String {
        let mut attrs: Vec<(&str, &str)> = self
            .attributes
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        attrs.sort_by_key(|(k, _)| *k);
        let attr_str: String = attrs
            .iter()
            .map(|(k, v)| format!(" {}=\"{}\"", k, v))
            .collect();
        match &self.supported_features {
            Some(features) => {
                let mut features = features.clone();
                features.sort();
                let inner: String = features
                    .iter()
                    .map(|f| format!("<{f}></{f}>"))
                    .collect();
                format!(
                    "<Hermes><{tag}{attr_str}><{sf}>{inner}</{sf}></{tag}></Hermes>",
                    tag = self.tag.as_str(),
                    sf = SUPPORTED_FEATURES_TAG,
                )
            }
            None => format!(
                "<Hermes><{tag}{attr_str}></{tag}></Hermes>",
                tag = self.tag.as_str()
            ),
        }
    }

    /// Parse a single `<Hermes>...</Hermes>` document.
    pub fn parse(bytes: &[u8]) -> Result<Self, ParseError> {
        let mut reader = Reader::from_reader(bytes);
        reader.config_mut().trim_text(true);

        let mut timestamp = String::new();
        let mut tag: Option<Tag> = None;
        let mut attributes = Vec::new();
        let mut supported_features: Option<Vec<String>> = None;
        let mut depth = 0usize;
        let mut in_supported_features = false;
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Eof => break,
                Event::Start(e) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    dispatch_open_tag(
                        depth,
                        &name,
                        &e,
                        &mut timestamp,
                        &mut tag,
                        &mut attributes,
                        &mut supported_features,
                        &mut in_supported_features,
                    )?;
                    depth += 1;
                }
                Event::Empty(e) => {
                    // A self-closing element has no matching `End`, so it is
                    // evaluated at the current depth, not one deeper.
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    dispatch_open_tag(
                        depth,
                        &name,
                        &e,
                        &mut timestamp,
                        &mut tag,
                        &mut attributes,
                        &mut supported_features,
                        &mut in_supported_features,
                    )?;
                }
                Event::End(e) => {
                    depth = depth.saturating_sub(1);
                    if e.name().as_ref() == SUPPORTED_FEATURES_TAG.as_bytes() {
                        in_supported_features = false;
                    }
                }
                _ => {}
            }
            buf.clear();
        }

        Ok(Message {
            timestamp,
            tag: tag.ok_or(ParseError::MissingDataElement)?,
            attributes,
            supported_features,
        })
    }
}

fn decode_attr(value: Cow<[u8]>) -> Result<String, ParseError> {
    String::from_utf8(value.into_owned()).map_err(|_| ParseError::InvalidAttributeEncoding("<attribute>".to_string()))
}

/// Shared `Start`/`Empty` handling for [`Message::parse`], run at `depth`
/// (the depth an already-open element is at -- `Empty` never descends, so
/// it is dispatched at the depth it was found rather than one deeper).
#[allow(clippy::too_many_arguments)]
fn dispatch_open_tag(
    depth: usize,
    name: &str,
    e: &BytesStart,
    timestamp: &mut String,
    tag: &mut Option<Tag>,
    attributes: &mut Vec<(String, String)>,
    supported_features: &mut Option<Vec<String>>,
    in_supported_features: &mut bool,
) -> Result<(), ParseError> {
    if depth == 0 {
        if name != ROOT_TAG {
            return Err(ParseError::WrongRootElement(name.to_string()));
        }
        for attr in e.attributes().flatten() {
            if attr.key.as_ref() == TIMESTAMP_ATTR.as_bytes() {
                *timestamp = decode_attr(attr.value)?;
            }
        }
    } else if depth == 1 {
        if tag.is_some() {
            return Err(ParseError::ExtraDataElement(name.to_string()));
        }
        *tag = Some(name.parse().unwrap());
        for attr in e.attributes().flatten() {
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = decode_attr(attr.value)?;
            attributes.push((key, value));
        }
    } else if depth == 2 && name == SUPPORTED_FEATURES_TAG {
        *in_supported_features = true;
        *supported_features = Some(Vec::new());
    } else if *in_supported_features {
        supported_features.get_or_insert_with(Vec::new).push(name.to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_description_round_trips_through_bytes() {
        let msg = Message::service_description("Machine1", 2, None, "1.1", &["MessageFolding"]);
        let bytes = msg.to_bytes();
        let parsed = Message::parse(&bytes).unwrap();
        assert_eq!(parsed.tag(), &Tag::ServiceDescription);
        assert_eq!(parsed.get("MachineId"), Some("Machine1"));
        assert_eq!(parsed.get("LaneId"), Some("2"));
        assert_eq!(parsed.supported_features(), Some(["MessageFolding".to_string()].as_slice()));
    }

    #[test]
    fn board_available_carries_mandatory_and_optional_attributes() {
        let mut attrs = BoardAttributes::default();
        attrs.length = Some(250.5);
        let msg = Message::board_available("f47ac10b-58cc-4372-a567-0e02b2c3d479", "Upstream", attrs);
        assert_eq!(msg.get("BoardId"), Some("f47ac10b-58cc-4372-a567-0e02b2c3d479"));
        assert_eq!(msg.get("FailedBoard"), Some("0"));
        assert_eq!(msg.get("Length"), Some("250.5"));
        assert_eq!(msg.get("TopBarcode"), None);
    }

    #[test]
    fn canonical_string_sorts_attributes() {
        let msg = Message::notification(
            NotificationCode::ConnectionRefused,
            SeverityType::Error,
            "busy",
        );
        let canonical = msg.to_canonical_string();
        assert!(canonical.contains("Description=\"busy\""));
        assert!(canonical.starts_with("<Hermes><Notification "));
    }

    #[test]
    fn parse_rejects_non_hermes_root() {
        let err = Message::parse(b"<NotHermes></NotHermes>").unwrap_err();
        assert!(matches!(err, ParseError::WrongRootElement(_)));
    }

    #[test]
    fn parse_rejects_hermes_with_no_child() {
        let err = Message::parse(b"<Hermes Timestamp=\"2024-01-01T00:00:00.000\"></Hermes>").unwrap_err();
        assert!(matches!(err, ParseError::MissingDataElement));
    }

    #[test]
    fn parse_rejects_hermes_with_two_children() {
        let err = Message::parse(
            b"<Hermes Timestamp=\"2024-01-01T00:00:00.000\"><CheckAlive/><CheckAlive/></Hermes>",
        )
        .unwrap_err();
        assert!(matches!(err, ParseError::ExtraDataElement(_)));
    }
}
