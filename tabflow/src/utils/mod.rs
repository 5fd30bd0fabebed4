//! Small helpers shared by every stage: memory sampling and file checks.

mod fs;
mod memory;

pub use fs::{delete_file, file_exists_check, file_sha256};
pub use memory::{memory_usage_percent, parse_meminfo_percent};

use uuid::Uuid;

/// Generates a new run identifier.
#[must_use]
pub fn generate_run_id() -> Uuid {
    Uuid::new_v4()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_run_id_is_v4() {
        let id = generate_run_id();
        assert_eq!(id.get_version_num(), 4);
    }
}
