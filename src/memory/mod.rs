//! 记忆层：记忆服务契约与实现（内存 / JSONL 文件）、会话日志、共享知识库

pub mod file_store;
pub mod in_memory;
pub mod keyword;
pub mod knowledge;
pub mod service;
pub mod session_store;

pub use file_store::FileMemoryService;
pub use in_memory::InMemoryMemoryService;
pub use knowledge::{KnowledgeBase, Lesson};
pub use service::{MemoryService, Record, SessionId};
pub use session_store::{SessionStore, LAST_SESSION_FILE, SCRATCHPAD};
