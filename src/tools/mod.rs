//! 工具层：Worker 可调用的沙箱工具（文件读写、目录列表、Shell）

pub mod call;
pub mod filesystem;
pub mod registry;
pub mod shell;

use std::path::Path;

use crate::config::ShellSection;

pub use call::{parse_tool_call, LlmReply, ToolCall};
pub use filesystem::{ListDirTool, ReadFileTool, SafeFs, WriteFileTool};
pub use registry::{Tool, ToolRegistry};
pub use shell::ShellTool;

/// 文件类工具（read_file / write_file / list_dir）
pub fn file_tools(workspace: &Path) -> ToolRegistry {
    let fs = SafeFs::new(workspace);
    let mut registry = ToolRegistry::new();
    registry.register(ReadFileTool::new(fs.clone()));
    registry.register(WriteFileTool::new(fs.clone()));
    registry.register(ListDirTool::new(fs));
    registry
}

/// 命令类工具（shell），在工作区目录下执行
pub fn command_tools(workspace: &Path, shell: &ShellSection) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(ShellTool::new(
        shell.allowed_commands.clone(),
        shell.timeout_secs,
        workspace,
    ));
    registry
}
