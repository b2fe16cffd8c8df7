// @awa-component: DB-UUIDv7
// Helper for generating UUIDv7 (timestamp-sortable UUIDs)
//
// Users created through the in-memory directory get app-side v7 ids so
// they sort by creation time. The `users` table keeps gen_random_uuid()
// (v4); audit entries use a BIGSERIAL id instead of a UUID.

use uuid::Uuid;

/// Generate a new UUIDv7 (timestamp-sortable).
pub fn uuidv7() -> Uuid {
    Uuid::now_v7()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuidv7_is_valid() {
        let id = uuidv7();
        assert_eq!(id.get_version(), Some(uuid::Version::SortRand));
    }

    #[test]
    fn uuidv7_is_monotonic() {
        let a = uuidv7();
        let b = uuidv7();
        assert!(b >= a);
    }
}
