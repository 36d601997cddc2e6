mod minilm;
mod mock;

pub use minilm::MiniLmEmbedder;
pub use mock::MockEmbedder;
