use redb::TableDefinition;

/// Subject records: id -> Subject (msgpack)
pub const SUBJECTS: TableDefinition<&str, &[u8]> = TableDefinition::new("subjects");

/// Subject code index: code -> subject id (codes are unique)
pub const SUBJECT_CODES: TableDefinition<&str, &str> = TableDefinition::new("subject_codes");

/// Note records: uuid -> Note (msgpack)
pub const NOTES: TableDefinition<&str, &[u8]> = TableDefinition::new("notes");

/// Subject index: subject_id -> msgpack Vec of note UUIDs
pub const SUBJECT_NOTES: TableDefinition<&str, &[u8]> = TableDefinition::new("subject_notes");
