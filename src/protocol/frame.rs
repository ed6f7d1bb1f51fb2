//! Header frames
//!
//! Client headers are single lines of pipe-delimited fields, classified by
//! the token before the first `|`. Anything without a recognized prefix is a
//! plain chat line. Server notifications are encoded here as well so every
//! outbound line is built in one place.

use bytes::{BufMut, Bytes, BytesMut};

use super::constants::*;
use crate::error::ProtocolError;

/// Kind of binary transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    /// `FILE`: individual or group target
    File,
    /// `IMAGE`: individual target only
    Image,
}

impl TransferKind {
    /// Wire prefix for this transfer kind
    pub fn prefix(self) -> &'static str {
        match self {
            TransferKind::File => PREFIX_FILE,
            TransferKind::Image => PREFIX_IMAGE,
        }
    }

    /// Whether a group name is an acceptable target
    pub fn allows_group(self) -> bool {
        matches!(self, TransferKind::File)
    }
}

/// A parsed client header line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientFrame {
    /// Plain broadcast chat text
    Chat(String),
    /// `PRIVATE|<target>|<text>`
    Private { target: String, text: String },
    /// `GROUP|<group>|<text>`
    Group { group: String, text: String },
    /// `CREATEGROUP|<group>|<n1,n2,...>`
    CreateGroup { group: String, members: Vec<String> },
    /// `FILE|...` or `IMAGE|...`; the body follows on the stream
    Transfer {
        kind: TransferKind,
        target: String,
        filename: String,
        length: u64,
    },
}

impl ClientFrame {
    /// Parse a header line (terminator already stripped)
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let token = match line.split_once(FIELD_SEPARATOR) {
            Some((token, _)) => token,
            None => line,
        };

        match token {
            PREFIX_PRIVATE => {
                let fields = split_fields(line, PREFIX_PRIVATE, PRIVATE_FIELDS)?;
                Ok(ClientFrame::Private {
                    target: fields[1].trim().to_string(),
                    text: fields[2].to_string(),
                })
            }
            PREFIX_GROUP => {
                let fields = split_fields(line, PREFIX_GROUP, GROUP_FIELDS)?;
                Ok(ClientFrame::Group {
                    group: fields[1].trim().to_string(),
                    text: fields[2].trim().to_string(),
                })
            }
            PREFIX_CREATE_GROUP => {
                let fields = split_fields(line, PREFIX_CREATE_GROUP, CREATE_GROUP_FIELDS)?;
                let members = fields[2]
                    .split(LIST_SEPARATOR)
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(String::from)
                    .collect();
                Ok(ClientFrame::CreateGroup {
                    group: fields[1].trim().to_string(),
                    members,
                })
            }
            PREFIX_FILE => parse_transfer(line, TransferKind::File),
            PREFIX_IMAGE => parse_transfer(line, TransferKind::Image),
            _ => Ok(ClientFrame::Chat(line.to_string())),
        }
    }
}

fn split_fields<'a>(
    line: &'a str,
    prefix: &'static str,
    expected: usize,
) -> Result<Vec<&'a str>, ProtocolError> {
    let fields: Vec<&str> = line.splitn(expected, FIELD_SEPARATOR).collect();
    if fields.len() < expected {
        return Err(ProtocolError::MissingFields {
            prefix,
            expected,
            found: fields.len(),
        });
    }
    Ok(fields)
}

/// Target is the second field and the length the last; the filename is
/// everything in between, pipes included, so the body stays framed
fn parse_transfer(line: &str, kind: TransferKind) -> Result<ClientFrame, ProtocolError> {
    let fields: Vec<&str> = line.splitn(3, FIELD_SEPARATOR).collect();
    let tail = fields
        .get(2)
        .and_then(|rest| rest.rsplit_once(FIELD_SEPARATOR));

    let (Some(target), Some((filename, raw_length))) = (fields.get(1), tail) else {
        return Err(ProtocolError::MissingFields {
            prefix: kind.prefix(),
            expected: TRANSFER_FIELDS,
            found: line.split(FIELD_SEPARATOR).count(),
        });
    };

    let raw_length = raw_length.trim();
    let length = raw_length
        .parse::<u64>()
        .map_err(|_| ProtocolError::InvalidLength(raw_length.to_string()))?;

    Ok(ClientFrame::Transfer {
        kind,
        target: target.trim().to_string(),
        filename: filename.to_string(),
        length,
    })
}

/// A server-originated line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// `<sender>: <text>`
    Chat { sender: String, text: String },
    /// `PRIVATE FROM <sender>: <text>`
    Private { sender: String, text: String },
    /// `GROUP FROM <group>|<sender>: <text>`
    Group {
        group: String,
        sender: String,
        text: String,
    },
    /// `CLIENTLIST|<names>`
    ClientList(Vec<String>),
    /// `GROUPLIST|<groups>`
    GroupList(Vec<String>),
    /// `GROUPADDED|<group>|<members>`
    GroupAdded { group: String, members: Vec<String> },
    /// Re-tagged `FILE|<sender>|<filename>|<len>` or `IMAGE|...` header
    TransferHeader {
        kind: TransferKind,
        sender: String,
        filename: String,
        length: u64,
    },
}

impl ServerMessage {
    /// Render the line without its terminator
    pub fn to_line(&self) -> String {
        let list = |names: &[String]| names.join(",");
        match self {
            ServerMessage::Chat { sender, text } => format!("{}: {}", sender, text),
            ServerMessage::Private { sender, text } => {
                format!("PRIVATE FROM {}: {}", sender, text)
            }
            ServerMessage::Group {
                group,
                sender,
                text,
            } => format!("GROUP FROM {}|{}: {}", group, sender, text),
            ServerMessage::ClientList(names) => {
                format!("{}|{}", NOTICE_CLIENT_LIST, list(names))
            }
            ServerMessage::GroupList(groups) => {
                format!("{}|{}", NOTICE_GROUP_LIST, list(groups))
            }
            ServerMessage::GroupAdded { group, members } => {
                format!("{}|{}|{}", NOTICE_GROUP_ADDED, group, list(members))
            }
            ServerMessage::TransferHeader {
                kind,
                sender,
                filename,
                length,
            } => format!("{}|{}|{}|{}", kind.prefix(), sender, filename, length),
        }
    }

    /// Encode as a terminated line
    pub fn encode(&self) -> Bytes {
        let line = self.to_line();
        let mut buf = BytesMut::with_capacity(line.len() + 1);
        buf.put_slice(line.as_bytes());
        buf.put_u8(LINE_TERMINATOR);
        buf.freeze()
    }

    /// Encode as a terminated line followed by a raw body
    ///
    /// The result is one contiguous frame, so queueing it never interleaves
    /// other lines between header and body.
    pub fn encode_with_body(&self, body: &[u8]) -> Bytes {
        let line = self.to_line();
        let mut buf = BytesMut::with_capacity(line.len() + 1 + body.len());
        buf.put_slice(line.as_bytes());
        buf.put_u8(LINE_TERMINATOR);
        buf.put_slice(body);
        buf.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_chat() {
        assert_eq!(
            ClientFrame::parse("Hello there").unwrap(),
            ClientFrame::Chat("Hello there".into())
        );
    }

    #[test]
    fn test_unknown_prefix_is_chat() {
        // Only exact tokens are commands
        assert_eq!(
            ClientFrame::parse("PRIVATELY|Bob|hi").unwrap(),
            ClientFrame::Chat("PRIVATELY|Bob|hi".into())
        );
        assert_eq!(
            ClientFrame::parse("a|b|c").unwrap(),
            ClientFrame::Chat("a|b|c".into())
        );
    }

    #[test]
    fn test_parse_private_keeps_pipes_in_text() {
        let frame = ClientFrame::parse("PRIVATE|Bob|a|b").unwrap();
        assert_eq!(
            frame,
            ClientFrame::Private {
                target: "Bob".into(),
                text: "a|b".into()
            }
        );
    }

    #[test]
    fn test_parse_private_missing_fields() {
        let err = ClientFrame::parse("PRIVATE|Bob").unwrap_err();
        assert_eq!(
            err,
            ProtocolError::MissingFields {
                prefix: PREFIX_PRIVATE,
                expected: 3,
                found: 2
            }
        );

        assert!(ClientFrame::parse("PRIVATE").is_err());
    }

    #[test]
    fn test_parse_group_trims() {
        let frame = ClientFrame::parse("GROUP| Team | Status update ").unwrap();
        assert_eq!(
            frame,
            ClientFrame::Group {
                group: "Team".into(),
                text: "Status update".into()
            }
        );
    }

    #[test]
    fn test_parse_create_group() {
        let frame = ClientFrame::parse("CREATEGROUP|Team|Bob, Carol,,").unwrap();
        assert_eq!(
            frame,
            ClientFrame::CreateGroup {
                group: "Team".into(),
                members: vec!["Bob".into(), "Carol".into()]
            }
        );
    }

    #[test]
    fn test_parse_create_group_missing_members() {
        assert!(matches!(
            ClientFrame::parse("CREATEGROUP|Team"),
            Err(ProtocolError::MissingFields { expected: 3, .. })
        ));
    }

    #[test]
    fn test_parse_file_and_image() {
        assert_eq!(
            ClientFrame::parse("FILE|Bob|report.pdf|2048").unwrap(),
            ClientFrame::Transfer {
                kind: TransferKind::File,
                target: "Bob".into(),
                filename: "report.pdf".into(),
                length: 2048
            }
        );
        assert_eq!(
            ClientFrame::parse("IMAGE|Bob|cat.png|0").unwrap(),
            ClientFrame::Transfer {
                kind: TransferKind::Image,
                target: "Bob".into(),
                filename: "cat.png".into(),
                length: 0
            }
        );
    }

    #[test]
    fn test_parse_filename_with_pipes() {
        assert_eq!(
            ClientFrame::parse("FILE|Carol|a|b.txt|7").unwrap(),
            ClientFrame::Transfer {
                kind: TransferKind::File,
                target: "Carol".into(),
                filename: "a|b.txt".into(),
                length: 7
            }
        );
        assert_eq!(
            ClientFrame::parse("FILE|Bob|x|lots").unwrap_err(),
            ProtocolError::InvalidLength("lots".into())
        );
    }

    #[test]
    fn test_parse_transfer_bad_length() {
        assert_eq!(
            ClientFrame::parse("FILE|Bob|a.txt|-5").unwrap_err(),
            ProtocolError::InvalidLength("-5".into())
        );
        assert!(matches!(
            ClientFrame::parse("IMAGE|Bob|a.png"),
            Err(ProtocolError::MissingFields { expected: 4, .. })
        ));
    }

    #[test]
    fn test_encode_notifications() {
        let list = ServerMessage::ClientList(vec!["Alice".into(), "Bob".into()]);
        assert_eq!(&list.encode()[..], b"CLIENTLIST|Alice,Bob\n");

        let empty = ServerMessage::ClientList(Vec::new());
        assert_eq!(&empty.encode()[..], b"CLIENTLIST|\n");

        let added = ServerMessage::GroupAdded {
            group: "Team".into(),
            members: vec!["Alice".into(), "Bob".into(), "Carol".into()],
        };
        assert_eq!(&added.encode()[..], b"GROUPADDED|Team|Alice,Bob,Carol\n");
    }

    #[test]
    fn test_encode_messages() {
        let chat = ServerMessage::Chat {
            sender: "Alice".into(),
            text: "Hello".into(),
        };
        assert_eq!(chat.to_line(), "Alice: Hello");

        let private = ServerMessage::Private {
            sender: "Alice".into(),
            text: "Hi".into(),
        };
        assert_eq!(private.to_line(), "PRIVATE FROM Alice: Hi");

        let group = ServerMessage::Group {
            group: "Team".into(),
            sender: "Alice".into(),
            text: "Status update".into(),
        };
        assert_eq!(group.to_line(), "GROUP FROM Team|Alice: Status update");
    }

    #[test]
    fn test_encode_with_body() {
        let header = ServerMessage::TransferHeader {
            kind: TransferKind::File,
            sender: "Alice".into(),
            filename: "a.bin".into(),
            length: 3,
        };
        let frame = header.encode_with_body(&[0x00, 0x0A, 0xFF]);
        assert_eq!(&frame[..], b"FILE|Alice|a.bin|3\n\x00\x0a\xff");
    }
}
