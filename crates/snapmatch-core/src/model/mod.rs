pub mod event;
pub mod face;
pub mod ids;
pub mod photo;

pub use event::Event;
pub use face::{BoundingBox, FaceEmbedding};
pub use ids::{EventId, FaceId, PhotoId};
pub use photo::Photo;
