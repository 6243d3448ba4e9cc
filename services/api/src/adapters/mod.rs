pub mod db;
pub mod embeddings;
pub mod llm;
pub mod pinecone;

pub use db::DbAdapter;
pub use embeddings::OpenAiEmbeddingAdapter;
pub use llm::OpenAiGenerationAdapter;
pub use pinecone::PineconeAdapter;
