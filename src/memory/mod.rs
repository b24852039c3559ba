pub mod clock;
pub mod reflection_id;
pub mod sanitize;
pub mod slide_id;
pub mod store;
pub mod types;
