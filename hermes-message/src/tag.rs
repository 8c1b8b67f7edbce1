//! Message tags and the small closed enumerations IPC-HERMES-9852 attaches
//! to individual attributes (`FailedBoard`, `Severity`, and so on).

use std::fmt;
use std::str::FromStr;

/// Name of the top-level element directly under `<Hermes>`.
///
/// The wire format never actually constrains this to a closed set -- an
/// unrecognized element is still a legal (if useless) thing to receive, so
/// [`Tag::Other`] carries it through rather than failing to parse. The state
/// machine and scenario bodies only ever match against the named variants.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tag {
    Unknown,
    CheckAlive,
    ServiceDescription,
    Notification,
    BoardAvailable,
    RevokeBoardAvailable,
    MachineReady,
    RevokeMachineReady,
    StartTransport,
    StopTransport,
    TransportFinished,
    BoardForecast,
    QueryBoardInfo,
    SendBoardInfo,
    SetConfiguration,
    GetConfiguration,
    CurrentConfiguration,
    /// An element name outside the closed set above.
    Other(String),
}

impl Tag {
    pub fn as_str(&self) -> &str {
        match self {
            Tag::Unknown => "Unknown",
            Tag::CheckAlive => "CheckAlive",
            Tag::ServiceDescription => "ServiceDescription",
            Tag::Notification => "Notification",
            Tag::BoardAvailable => "BoardAvailable",
            Tag::RevokeBoardAvailable => "RevokeBoardAvailable",
            Tag::MachineReady => "MachineReady",
            Tag::RevokeMachineReady => "RevokeMachineReady",
            Tag::StartTransport => "StartTransport",
            Tag::StopTransport => "StopTransport",
            Tag::TransportFinished => "TransportFinished",
            Tag::BoardForecast => "BoardForecast",
            Tag::QueryBoardInfo => "QueryBoardInfo",
            Tag::SendBoardInfo => "SendBoardInfo",
            Tag::SetConfiguration => "SetConfiguration",
            Tag::GetConfiguration => "GetConfiguration",
            Tag::CurrentConfiguration => "CurrentConfiguration",
            Tag::Other(s) => s.as_str(),
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tag {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "Unknown" => Tag::Unknown,
            "CheckAlive" => Tag::CheckAlive,
            "ServiceDescription" => Tag::ServiceDescription,
            "Notification" => Tag::Notification,
            "BoardAvailable" => Tag::BoardAvailable,
            "RevokeBoardAvailable" => Tag::RevokeBoardAvailable,
            "MachineReady" => Tag::MachineReady,
            "RevokeMachineReady" => Tag::RevokeMachineReady,
            "StartTransport" => Tag::StartTransport,
            "StopTransport" => Tag::StopTransport,
            "TransportFinished" => Tag::TransportFinished,
            "BoardForecast" => Tag::BoardForecast,
            "QueryBoardInfo" => Tag::QueryBoardInfo,
            "SendBoardInfo" => Tag::SendBoardInfo,
            "SetConfiguration" => Tag::SetConfiguration,
            "GetConfiguration" => Tag::GetConfiguration,
            "CurrentConfiguration" => Tag::CurrentConfiguration,
            other => Tag::Other(other.to_string()),
        })
    }
}

/// `NotificationCode` attribute of a `Notification` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationCode {
    ProtocolError,
    ConnectionRefused,
    ConnectionReset,
    ConfigurationError,
    MachineShutdown,
    BoardForecastError,
}

impl NotificationCode {
    pub fn code(self) -> u32 {
        match self {
            NotificationCode::ProtocolError => 1,
            NotificationCode::ConnectionRefused => 2,
            NotificationCode::ConnectionReset => 3,
            NotificationCode::ConfigurationError => 4,
            NotificationCode::MachineShutdown => 5,
            NotificationCode::BoardForecastError => 6,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            1 => NotificationCode::ProtocolError,
            2 => NotificationCode::ConnectionRefused,
            3 => NotificationCode::ConnectionReset,
            4 => NotificationCode::ConfigurationError,
            5 => NotificationCode::MachineShutdown,
            6 => NotificationCode::BoardForecastError,
            _ => return None,
        })
    }
}

/// `Severity` attribute of a `Notification` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeverityType {
    Fatal,
    Error,
    Warning,
    Information,
}

impl SeverityType {
    pub fn code(self) -> u32 {
        match self {
            SeverityType::Fatal => 1,
            SeverityType::Error => 2,
            SeverityType::Warning => 3,
            SeverityType::Information => 4,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            1 => SeverityType::Fatal,
            2 => SeverityType::Error,
            3 => SeverityType::Warning,
            4 => SeverityType::Information,
            _ => return None,
        })
    }
}

/// `Type` attribute of a `CheckAlive` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckAliveType {
    Ping,
    Pong,
}

impl CheckAliveType {
    pub fn code(self) -> u32 {
        match self {
            CheckAliveType::Ping => 1,
            CheckAliveType::Pong => 2,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            1 => CheckAliveType::Ping,
            2 => CheckAliveType::Pong,
            _ => return None,
        })
    }
}

/// `FailedBoard` attribute carried by board-info messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardQuality {
    /// Also used as "don't care" in a `MachineReady` request.
    AnyOrUnknown,
    Good,
    Bad,
}

impl BoardQuality {
    pub fn code(self) -> u32 {
        match self {
            BoardQuality::AnyOrUnknown => 0,
            BoardQuality::Good => 1,
            BoardQuality::Bad => 2,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            0 => BoardQuality::AnyOrUnknown,
            1 => BoardQuality::Good,
            2 => BoardQuality::Bad,
            _ => return None,
        })
    }
}

/// `FlippedBoard` attribute carried by board-info messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlippedBoard {
    SideUpIsUnknown,
    TopSideIsUp,
    BottomSideIsUp,
}

impl FlippedBoard {
    pub fn code(self) -> u32 {
        match self {
            FlippedBoard::SideUpIsUnknown => 0,
            FlippedBoard::TopSideIsUp => 1,
            FlippedBoard::BottomSideIsUp => 2,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            0 => FlippedBoard::SideUpIsUnknown,
            1 => FlippedBoard::TopSideIsUp,
            2 => FlippedBoard::BottomSideIsUp,
            _ => return None,
        })
    }
}

/// `TransferState` attribute of `StopTransport`/`TransportFinished`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    NotStarted,
    Incomplete,
    Complete,
}

impl TransferState {
    pub fn code(self) -> u32 {
        match self {
            TransferState::NotStarted => 1,
            TransferState::Incomplete => 2,
            TransferState::Complete => 3,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            1 => TransferState::NotStarted,
            2 => TransferState::Incomplete,
            3 => TransferState::Complete,
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_round_trips_through_display_and_fromstr() {
        for tag in [
            Tag::CheckAlive,
            Tag::ServiceDescription,
            Tag::BoardAvailable,
            Tag::StartTransport,
        ] {
            let rendered = tag.to_string();
            let parsed: Tag = rendered.parse().unwrap();
            assert_eq!(tag, parsed);
        }
    }

    #[test]
    fn unrecognized_tag_is_preserved_not_rejected() {
        let parsed: Tag = "SomeFutureElement".parse().unwrap();
        assert_eq!(parsed, Tag::Other("SomeFutureElement".to_string()));
    }

    #[test]
    fn notification_code_round_trips() {
        assert_eq!(
            NotificationCode::from_code(NotificationCode::ConnectionRefused.code()),
            Some(NotificationCode::ConnectionRefused)
        );
        assert_eq!(NotificationCode::from_code(99), None);
    }
}
