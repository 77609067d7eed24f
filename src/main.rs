//! pixelparts: Pixel device extras as an MCP server
//!
//! Torch on shake, auto high brightness mode, battery info, fast charge and
//! display saturation, driven through kernel sysfs nodes.
//!
//! Layers:
//! - control: pure decision logic (shake detector, ambient light threshold, battery telemetry)
//! - sensors: sysfs port, IIO sample sources, battery node reader
//! - actuators: torch LED, HBM node, fast charge node, SurfaceFlinger saturation
//! - services: background loops wiring sensors through control into actuators

use std::sync::Arc;

use clap::{Parser, Subcommand};
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters, ServerHandler},
    model::*,
    ErrorData as McpError,
    ServiceExt,
};
use schemars::JsonSchema;
use serde::Deserialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// === Modules ===

mod actuators;
mod config;
mod control;
mod error;
mod parts;
mod sensors;
mod services;
mod shared;

use crate::control::telemetry::{derive, TemperatureUnit};
use crate::parts::PixelParts;
use crate::sensors::sysfs::Sysfs;

// === CLI ===

#[derive(Parser)]
#[command(name = "pixelparts")]
#[command(about = "Pixel device extras as an MCP server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the settings file in your editor
    Config,
    /// Print battery info and exit
    Battery {
        /// Show temperature in Fahrenheit
        #[arg(long)]
        fahrenheit: bool,
        /// Keep refreshing at the configured battery info interval
        #[arg(long)]
        watch: bool,
    },
}

// === Common Parameter Types ===

#[derive(Debug, Deserialize, JsonSchema)]
pub struct EmptyParams {}

// === Server ===

#[derive(Debug)]
pub struct PixelPartsServer {
    pub tool_router: ToolRouter<Self>,
    pub parts: Arc<PixelParts>,
}

impl PixelPartsServer {
    pub fn new(parts: Arc<PixelParts>) -> Self {
        Self {
            tool_router: Self::tool_router(),
            parts,
        }
    }
}

// Tool implementations
#[rmcp::tool_router]
impl PixelPartsServer {
    // --- battery info ---
    #[rmcp::tool(description = "Get battery info: technology, status, USB type, temperature, capacity, current, voltage, wattage, health, cycle count")]
    pub async fn get_battery_info(
        &self,
        Parameters(params): Parameters<sensors::battery::BatteryInfoParams>,
    ) -> Result<CallToolResult, McpError> {
        sensors::battery::get_battery_info(&self.parts, params).await
    }

    // --- pixel torch ---
    #[rmcp::tool(description = "Get torch-on-shake settings and service status")]
    pub async fn get_pixel_torch(&self, Parameters(_params): Parameters<EmptyParams>) -> Result<CallToolResult, McpError> {
        services::torch::get_pixel_torch(&self.parts).await
    }

    #[rmcp::tool(description = "Enable or disable toggling the torch by shaking the device")]
    pub async fn set_pixel_torch(
        &self,
        Parameters(params): Parameters<services::torch::SetEnabledParams>,
    ) -> Result<CallToolResult, McpError> {
        services::torch::set_pixel_torch(&self.parts, params).await
    }

    #[rmcp::tool(description = "Change torch strength, shake threshold (ms) or shake sensitivity")]
    pub async fn set_pixel_torch_settings(
        &self,
        Parameters(params): Parameters<services::torch::TorchSettingsParams>,
    ) -> Result<CallToolResult, McpError> {
        services::torch::set_pixel_torch_settings(&self.parts, params).await
    }

    // --- auto hbm ---
    #[rmcp::tool(description = "Get auto high brightness mode status: current lux, threshold, HBM state")]
    pub async fn get_auto_hbm(&self, Parameters(_params): Parameters<EmptyParams>) -> Result<CallToolResult, McpError> {
        services::auto_hbm::get_auto_hbm(&self.parts).await
    }

    #[rmcp::tool(description = "Enable or disable switching high brightness mode from ambient light")]
    pub async fn set_auto_hbm(
        &self,
        Parameters(params): Parameters<services::torch::SetEnabledParams>,
    ) -> Result<CallToolResult, McpError> {
        services::auto_hbm::set_auto_hbm(&self.parts, params).await
    }

    #[rmcp::tool(description = "Set the ambient light level (lux) at which high brightness mode turns on")]
    pub async fn set_auto_hbm_threshold(
        &self,
        Parameters(params): Parameters<services::auto_hbm::SetThresholdParams>,
    ) -> Result<CallToolResult, McpError> {
        services::auto_hbm::set_auto_hbm_threshold(&self.parts, params).await
    }

    // --- fast charge ---
    #[rmcp::tool(description = "Check whether forced fast charging is on")]
    pub async fn get_fast_charge(&self, Parameters(_params): Parameters<EmptyParams>) -> Result<CallToolResult, McpError> {
        actuators::fast_charge::get_fast_charge(&self.parts).await
    }

    #[rmcp::tool(description = "Turn forced fast charging on or off")]
    pub async fn set_fast_charge(
        &self,
        Parameters(params): Parameters<actuators::fast_charge::SetFastChargeParams>,
    ) -> Result<CallToolResult, McpError> {
        actuators::fast_charge::set_fast_charge(&self.parts, params).await
    }

    // --- saturation ---
    #[rmcp::tool(description = "Get the display saturation level")]
    pub async fn get_saturation(&self, Parameters(_params): Parameters<EmptyParams>) -> Result<CallToolResult, McpError> {
        actuators::saturation::get_saturation(&self.parts).await
    }

    #[rmcp::tool(description = "Set the display saturation level (0-100, 100 is stock)")]
    pub async fn set_saturation(
        &self,
        Parameters(params): Parameters<actuators::saturation::SetSaturationParams>,
    ) -> Result<CallToolResult, McpError> {
        actuators::saturation::set_saturation(&self.parts, params).await
    }

    // --- composite ---
    #[rmcp::tool(description = "Get everything at once as JSON: service states, latest torch and HBM activity, saved settings")]
    pub async fn get_status(&self, Parameters(_params): Parameters<EmptyParams>) -> Result<CallToolResult, McpError> {
        services::get_status(&self.parts).await
    }
}

#[rmcp::tool_handler]
impl ServerHandler for PixelPartsServer {
    fn get_info(&self) -> ServerInfo {
        let description = String::from(
            "pixelparts: Pixel device extras.\n\
             - battery info from power_supply nodes\n\
             - torch on shake, auto high brightness mode\n\
             - fast charge, display saturation\n",
        );

        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(description),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Config) => {
            run_config_command()?;
        }
        Some(Commands::Battery { fahrenheit, watch }) => {
            run_battery_command(fahrenheit, watch).await?;
        }
        None => {
            run_server().await?;
        }
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Open config file in user's editor
fn run_config_command() -> anyhow::Result<()> {
    let config_path = config::Config::path()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

    // Create config dir if needed
    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Create config file from template if it doesn't exist
    if !config_path.exists() {
        let template = include_str!("../pixelparts.toml.example");
        std::fs::write(&config_path, template)?;
        println!("Created config file: {}", config_path.display());
    }

    let editor = std::env::var("EDITOR")
        .or_else(|_| std::env::var("VISUAL"))
        .unwrap_or_else(|_| "nano".to_string());

    println!("Opening {} with {}", config_path.display(), editor);

    std::process::Command::new(&editor)
        .arg(&config_path)
        .status()?;

    Ok(())
}

/// Print derived battery info, once or on the battery info refresh interval
async fn run_battery_command(fahrenheit: bool, watch: bool) -> anyhow::Result<()> {
    init_tracing();

    let config = config::Config::load();
    let unit = if fahrenheit {
        TemperatureUnit::Fahrenheit
    } else {
        config.battery_info.temperature_unit
    };

    let mut ticker = tokio::time::interval(config.battery_info.refresh_interval());
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => break,
        }

        let sample = sensors::battery::read_sample(&Sysfs, &config.nodes);
        print!("{}", derive(&sample).report(unit));

        if !watch {
            break;
        }
        println!();
    }

    Ok(())
}

/// Run the MCP server
async fn run_server() -> anyhow::Result<()> {
    init_tracing();

    tracing::info!("Starting pixelparts server");

    let config = config::Config::load();
    let parts = Arc::new(PixelParts::new(Arc::new(Sysfs), config, config::Config::path()));
    parts.restore().await;

    let server = PixelPartsServer::new(parts.clone());
    let service = server.serve(rmcp::transport::stdio()).await?;
    service.waiting().await?;

    parts.shutdown().await;
    tracing::info!("pixelparts server stopped");
    Ok(())
}
