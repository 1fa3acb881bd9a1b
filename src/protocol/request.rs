use bson::Document;

use crate::protocol::opcode::OpCode;

/// Opcode-specific details recovered while decoding a request.
///
/// Fields that do not apply to the request's opcode stay at their defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestMeta {
    /// Request id from the message header
    pub request_id: i32,
    /// Raw flag word at the start of the body
    pub flags: u32,
    /// `db.collection` namespace (OP_QUERY, OP_INSERT)
    pub namespace: Option<String>,
    pub num_to_skip: Option<i32>,
    pub num_to_return: Option<i32>,
    /// Namespace ends in `.$cmd` (OP_QUERY only)
    pub is_command: bool,
    /// From `$db` for OP_MSG, from the namespace prefix otherwise
    pub database: Option<String>,
    /// Identifiers of kind-1 sections, in wire order (OP_MSG)
    pub sequence_ids: Vec<String>,
    /// Trailing CRC-32C when the checksum flag is set (OP_MSG)
    pub checksum: Option<u32>,
    /// Client asked for no reply (OP_MSG moreToCome)
    pub more_to_come: bool,
    /// Documents after the first one in a batch insert (OP_INSERT)
    pub extra_documents: Vec<Document>,
    /// Encoded size of the largest document carried by the request
    pub largest_document: usize,
}

/// A request decoded into its canonical form.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedRequest {
    pub opcode: OpCode,
    pub query: Document,
    pub meta: RequestMeta,
}

impl DecodedRequest {
    pub fn request_id(&self) -> i32 {
        self.meta.request_id
    }

    /// Name of the command: the first key of the query.
    pub fn command_name(&self) -> &str {
        command_name(&self.query)
    }
}

/// First key of a document, or an empty string for an empty document.
pub fn command_name(query: &Document) -> &str {
    query.keys().next().map(String::as_str).unwrap_or("")
}

/// Database part of a `db.collection` namespace.
pub(crate) fn database_of(namespace: &str) -> Option<String> {
    namespace
        .split_once('.')
        .map(|(db, _)| db)
        .filter(|db| !db.is_empty())
        .map(str::to_owned)
}
