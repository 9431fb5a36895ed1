//! `OP_MSG` payload parsing: flag bits, checksum reservation, and section
//! kinds 0/1 (spec.md §4.3).

use super::bson_doc::{read_document, read_documents_until_exhausted};
use super::wire::read_cstring;
use crate::error::{Error, Result};

const CHECKSUM_PRESENT: u32 = 1;

/// Keys that never name the command itself — `$db` supplies the database,
/// the rest are session/transaction metadata riding alongside the command.
const FRAMEWORK_KEYS: &[&str] = &["$db", "lsid", "txnNumber", "$clusterTime"];

#[derive(Debug, Default, Clone)]
pub struct OpMsgSections {
    pub documents: Vec<bson::Document>,
    pub sequences: Vec<(String, Vec<bson::Document>)>,
}

/// Parse every section of an `OP_MSG` payload (the opcode's own payload,
/// i.e. the bytes after the 16-byte wire header). Stops, rather than
/// erroring, at an unrecognized section kind — whatever sections parsed
/// before it are still returned.
pub fn parse_sections(payload: &[u8]) -> Result<OpMsgSections> {
    if payload.len() < 4 {
        return Err(Error::UnexpectedEof);
    }
    let flag_bits = u32::from_le_bytes(payload[0..4].try_into().unwrap());
    let mut body = &payload[4..];

    if flag_bits & CHECKSUM_PRESENT != 0 {
        if body.len() < 4 {
            return Err(Error::UnexpectedEof);
        }
        let end = body.len() - 4;
        body = &body[..end];
    }

    let mut sections = OpMsgSections::default();
    while !body.is_empty() {
        let kind = body[0];
        body = &body[1..];
        match kind {
            0x00 => {
                let (doc, rest) = read_document(body)?;
                sections.documents.push(doc);
                body = rest;
            }
            0x01 => {
                if body.len() < 4 {
                    return Err(Error::UnexpectedEof);
                }
                let size = i32::from_le_bytes(body[0..4].try_into().unwrap());
                if size < 5 || body.len() < size as usize {
                    return Err(Error::UnexpectedEof);
                }
                let size = size as usize;
                let sequence_bytes = &body[4..size];
                let (identifier, docs_bytes) = read_cstring(sequence_bytes)?;
                let docs = read_documents_until_exhausted(docs_bytes)?;
                sections.sequences.push((identifier, docs));
                body = &body[size..];
            }
            _ => break,
        }
    }

    Ok(sections)
}

/// Command name, target collection, and database derived from a kind-0
/// section document, per spec.md §4.3's "first non-framework key" rule.
#[derive(Debug, Default, Clone)]
pub struct CommandInfo {
    pub command_name: Option<String>,
    pub collection: Option<String>,
    pub database: Option<String>,
}

pub fn extract_command_info(doc: &bson::Document) -> CommandInfo {
    let mut info = CommandInfo::default();
    for (key, value) in doc.iter() {
        if FRAMEWORK_KEYS.contains(&key.as_str()) {
            continue;
        }
        info.command_name = Some(key.clone());
        if let bson::Bson::String(s) = value {
            info.collection = Some(s.clone());
        }
        break;
    }
    info.database = doc.get_str("$db").ok().map(str::to_string);
    info
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn encode(doc: &bson::Document) -> Vec<u8> {
        let mut buf = Vec::new();
        doc.to_writer(&mut buf).unwrap();
        buf
    }

    #[test]
    fn parses_single_kind_zero_section() {
        let doc = doc! { "ping": 1 };
        let mut payload = 0u32.to_le_bytes().to_vec();
        payload.push(0x00);
        payload.extend(encode(&doc));

        let sections = parse_sections(&payload).unwrap();
        assert_eq!(sections.documents, vec![doc]);
        assert!(sections.sequences.is_empty());
    }

    #[test]
    fn checksum_flag_reserves_last_four_bytes() {
        let doc = doc! { "ping": 1 };
        let mut payload = CHECKSUM_PRESENT.to_le_bytes().to_vec();
        payload.push(0x00);
        payload.extend(encode(&doc));
        payload.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]);

        let sections = parse_sections(&payload).unwrap();
        assert_eq!(sections.documents, vec![doc]);
    }

    #[test]
    fn parses_kind_one_document_sequence() {
        let a = doc! { "x": 1 };
        let b = doc! { "x": 2 };
        let mut docs_bytes = encode(&a);
        docs_bytes.extend(encode(&b));

        let identifier = b"documents\0";
        let size = 4 + identifier.len() + docs_bytes.len();

        let mut payload = 0u32.to_le_bytes().to_vec();
        payload.push(0x01);
        payload.extend_from_slice(&(size as i32).to_le_bytes());
        payload.extend_from_slice(identifier);
        payload.extend(docs_bytes);

        let sections = parse_sections(&payload).unwrap();
        assert_eq!(sections.sequences.len(), 1);
        assert_eq!(sections.sequences[0].0, "documents");
        assert_eq!(sections.sequences[0].1, vec![a, b]);
    }

    #[test]
    fn unknown_section_kind_stops_parsing() {
        let doc = doc! { "ping": 1 };
        let mut payload = 0u32.to_le_bytes().to_vec();
        payload.push(0x00);
        payload.extend(encode(&doc));
        payload.push(0x02); // unrecognized kind

        let sections = parse_sections(&payload).unwrap();
        assert_eq!(sections.documents, vec![doc]);
    }

    #[test]
    fn extracts_command_name_collection_and_database() {
        let doc = doc! { "insert": "orders", "$db": "shop", "documents": [] };
        let info = extract_command_info(&doc);
        assert_eq!(info.command_name.as_deref(), Some("insert"));
        assert_eq!(info.collection.as_deref(), Some("orders"));
        assert_eq!(info.database.as_deref(), Some("shop"));
    }
}
