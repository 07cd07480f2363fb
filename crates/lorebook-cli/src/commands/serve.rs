use std::path::Path;

use anyhow::{Context, Result};

pub fn run(dir: &Path) -> Result<()> {
    let data_dir = dir.to_path_buf();
    let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
    rt.block_on(async {
        lorebook_mcp::run_stdio(data_dir)
            .await
            .map_err(|e| anyhow::anyhow!("MCP server error: {e}"))
    })
}
