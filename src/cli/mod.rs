pub mod controller;

use std::error::Error;

use clap::{Parser, Subcommand};
use controller::{handle_lightbar, handle_list, handle_monitor, handle_rumble};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Option<Commands>,
    /// Controller configuration in YAML format
    #[arg(short, long, global = true)]
    pub config: Option<String>,
    /// Index of the controller to use, overrides the configuration
    #[arg(short, long, global = true)]
    pub index: Option<usize>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// List connected DualSense controllers (default)
    List,
    /// Log input changes until stdin is closed (Ctrl+D)
    Monitor,
    /// Set the color of the lightbar
    Lightbar {
        red: u8,
        green: u8,
        blue: u8,
        /// How long to keep the session open so the color is sent
        #[arg(long, default_value_t = 500)]
        duration_ms: u64,
    },
    /// Rumble both motors, in units of the configured mapping
    Rumble {
        left: f64,
        right: f64,
        #[arg(long, default_value_t = 1000)]
        duration_ms: u64,
    },
}

pub fn main_cli(args: Args) -> Result<(), Box<dyn Error>> {
    let cmd = args.cmd.clone().unwrap_or(Commands::List);
    match cmd {
        Commands::List => handle_list()?,
        Commands::Monitor => handle_monitor(&args)?,
        Commands::Lightbar {
            red,
            green,
            blue,
            duration_ms,
        } => handle_lightbar(&args, red, green, blue, duration_ms)?,
        Commands::Rumble {
            left,
            right,
            duration_ms,
        } => handle_rumble(&args, left, right, duration_ms)?,
    }

    Ok(())
}
