//! Length-prefixed BSON document framing (spec.md §4.3's closing paragraph).

use std::io::Cursor;

use crate::error::{Error, Result};

const MAX_DOCUMENT_LEN: i32 = 16 * 1024 * 1024;

/// Read one leading 4-byte LE length, then exactly that many bytes
/// (including the length prefix) as one document. Rejects documents larger
/// than 16 MiB or with a declared length of 4 or less.
pub fn read_document(data: &[u8]) -> Result<(bson::Document, &[u8])> {
    if data.len() < 4 {
        return Err(Error::UnexpectedEof);
    }
    let len = i32::from_le_bytes(data[0..4].try_into().unwrap());
    if len <= 4 || len > MAX_DOCUMENT_LEN {
        return Err(Error::DocumentTooLarge(len));
    }
    let len = len as usize;
    if data.len() < len {
        return Err(Error::UnexpectedEof);
    }

    let doc_bytes = &data[..len];
    let doc = bson::Document::from_reader(&mut Cursor::new(doc_bytes))?;
    Ok((doc, &data[len..]))
}

/// Read consecutive documents until `data` is exhausted (used for OP_MSG
/// section-kind-1 document sequences).
pub fn read_documents_until_exhausted(mut data: &[u8]) -> Result<Vec<bson::Document>> {
    let mut docs = Vec::new();
    while !data.is_empty() {
        let (doc, rest) = read_document(data)?;
        docs.push(doc);
        data = rest;
    }
    Ok(docs)
}
