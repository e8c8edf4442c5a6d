// Curriculum data loading
//
// Concept records are curated offline into a JSON array; this module turns
// that file into typed records validated at load time.

pub mod loader;
pub mod record;

pub use loader::{load_records, parse_records, CurriculumLoader, CurriculumStats};
pub use record::ConceptRecord;
