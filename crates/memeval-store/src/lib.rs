pub mod store;

pub use store::{
    append_evidence, evidence_file_name, load_evidence_items, load_personas, person_id_from_path,
};
