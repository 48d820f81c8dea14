pub mod clinical_notes;
pub mod join;
pub mod window_guard;

pub use clinical_notes::ClinicalNoteService;
pub use join::join_decision;
pub use window_guard::BookingWindowGuard;
