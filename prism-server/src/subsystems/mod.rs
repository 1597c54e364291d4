pub mod feedback;
pub mod organize;
pub mod preferences;
