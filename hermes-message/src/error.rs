use thiserror::Error;

/// Failure to turn a byte slice into a [`crate::Message`].
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("<Hermes> envelope has no child element")]
    MissingDataElement,

    #[error("<Hermes> envelope has more than one child element (second was <{0}>)")]
    ExtraDataElement(String),

    #[error("root element is <{0}>, expected <Hermes>")]
    WrongRootElement(String),

    #[error("attribute {0} is not valid UTF-8")]
    InvalidAttributeEncoding(String),
}
