pub mod chunk;
pub mod domain;
pub mod pipeline;
pub mod ports;

pub use chunk::{split_with_overlap, ChunkingConfig};
pub use domain::{
    ChunkMetadata, DocumentChunk, ImageAttachment, Message, MessageRole, RetrievedDocument, Role,
    Thread, User, UserCredentials,
};
pub use pipeline::{ChatPipeline, ChatTurn, DEFAULT_TOP_K};
pub use ports::{
    DatabaseService, EmbeddingService, GenerationService, PortError, PortResult,
    VectorIndexService,
};
