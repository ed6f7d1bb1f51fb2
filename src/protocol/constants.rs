//! Wire protocol constants

/// Header field separator
pub const FIELD_SEPARATOR: char = '|';

/// Separator inside list fields (member names, client list)
pub const LIST_SEPARATOR: char = ',';

/// Header line terminator
pub const LINE_TERMINATOR: u8 = b'\n';

pub const PREFIX_PRIVATE: &str = "PRIVATE";
pub const PREFIX_GROUP: &str = "GROUP";
pub const PREFIX_CREATE_GROUP: &str = "CREATEGROUP";
pub const PREFIX_FILE: &str = "FILE";
pub const PREFIX_IMAGE: &str = "IMAGE";

pub const NOTICE_CLIENT_LIST: &str = "CLIENTLIST";
pub const NOTICE_GROUP_LIST: &str = "GROUPLIST";
pub const NOTICE_GROUP_ADDED: &str = "GROUPADDED";

/// Field counts (including the prefix) for each recognized header
pub const PRIVATE_FIELDS: usize = 3;
pub const GROUP_FIELDS: usize = 3;
pub const CREATE_GROUP_FIELDS: usize = 3;
pub const TRANSFER_FIELDS: usize = 4;

/// Default maximum header line length
pub const DEFAULT_MAX_HEADER_LEN: usize = 64 * 1024;

/// Default maximum declared body length (64MB)
pub const DEFAULT_MAX_TRANSFER_SIZE: u64 = 64 * 1024 * 1024;

/// Largest step by which a body buffer grows while it is being received
pub const BODY_CHUNK_SIZE: usize = 64 * 1024;

/// Default per-connection outbound queue capacity, in frames
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 256;
