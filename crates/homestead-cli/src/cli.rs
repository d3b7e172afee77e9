use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use homestead_core::models::{ListingFilter, ListingStatus};

#[derive(Debug, Parser)]
#[command(name = "homestead", version, about = "Browse and manage property listings")]
pub struct Cli {
    /// API base URL (overrides config and HOMESTEAD_API_URL)
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Write logs to daily files in this directory instead of stderr
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sign in with email and password
    Login {
        #[arg(long)]
        email: Option<String>,
    },
    /// Sign out and forget stored tokens
    Logout,
    /// Create a new account
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
    },
    /// Show who is signed in
    Whoami,
    /// Search and manage listings
    #[command(subcommand)]
    Listings(ListingsCommand),
}

#[derive(Debug, Subcommand)]
pub enum ListingsCommand {
    /// Search listings
    List(FilterArgs),
    /// Show one listing
    Show { id: i64 },
    /// Create a listing
    Create {
        #[command(flatten)]
        fields: ListingFields,
        /// Image files to upload and attach
        #[arg(long = "image")]
        images: Vec<PathBuf>,
    },
    /// Edit a listing; unspecified fields keep their current values
    Update {
        id: i64,
        #[command(flatten)]
        fields: ListingFields,
        /// Replace the listing's images with these files
        #[arg(long = "image")]
        images: Vec<PathBuf>,
    },
    /// Delete a listing
    Delete {
        id: i64,
        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

#[derive(Debug, Clone, Default, Args)]
pub struct FilterArgs {
    /// Address, city or state contains this text
    #[arg(long)]
    pub location: Option<String>,
    #[arg(long)]
    pub min_price: Option<f64>,
    #[arg(long)]
    pub max_price: Option<f64>,
    #[arg(long)]
    pub min_size: Option<u32>,
    #[arg(long)]
    pub max_size: Option<u32>,
    /// Minimum number of bedrooms
    #[arg(long)]
    pub bedrooms: Option<u32>,
    #[arg(long)]
    pub city: Option<String>,
    #[arg(long)]
    pub state: Option<String>,
    #[arg(long)]
    pub zip_code: Option<String>,
    #[arg(long)]
    pub status: Option<ListingStatus>,
}

impl From<FilterArgs> for ListingFilter {
    fn from(args: FilterArgs) -> Self {
        ListingFilter {
            location: args.location,
            min_price: args.min_price,
            max_price: args.max_price,
            min_size: args.min_size,
            max_size: args.max_size,
            bedrooms: args.bedrooms,
            city: args.city,
            state: args.state,
            zip_code: args.zip_code,
            status: args.status,
        }
    }
}

#[derive(Debug, Clone, Default, Args)]
pub struct ListingFields {
    #[arg(long)]
    pub address: Option<String>,
    #[arg(long)]
    pub city: Option<String>,
    #[arg(long)]
    pub state: Option<String>,
    #[arg(long)]
    pub zip_code: Option<String>,
    #[arg(long)]
    pub price: Option<f64>,
    #[arg(long)]
    pub bedrooms: Option<u32>,
    #[arg(long)]
    pub bathrooms: Option<f64>,
    /// Living area in square feet
    #[arg(long)]
    pub size: Option<u32>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub status: Option<ListingStatus>,
}
