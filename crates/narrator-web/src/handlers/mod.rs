pub mod audio;
pub mod feedback;
pub mod sessions;
