// serve.rs — Start the MCP gateway on stdio.

use rmcp::ServiceExt;

use pw_gateway::{GatewayConfig, PwGatewayServer};

pub fn execute(role_flag: Option<&str>) -> anyhow::Result<()> {
    let config = GatewayConfig::from_env(role_flag)
        .map_err(|e| anyhow::anyhow!("launch configuration invalid: {}", e))?;
    tracing::info!(role = %config.role, "starting Planward gateway");
    let server = PwGatewayServer::new(config);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let transport = rmcp::transport::stdio();
        let server_handle = server
            .serve(transport)
            .await
            .map_err(|e| anyhow::anyhow!("MCP server error: {}", e))?;
        let _ = server_handle.waiting().await;
        Ok::<(), anyhow::Error>(())
    })
}
