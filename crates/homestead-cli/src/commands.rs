//! Command handlers.

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use tracing::warn;

use homestead_core::api::ReqwestTransport;
use homestead_core::models::{Listing, ListingDraft, ListingFilter};
use homestead_core::utils::{
    format_bathrooms, format_date, format_optional, format_price, truncate_string,
};
use homestead_core::{ApiError, Config, MediaUploader, Session};

use crate::cli::{Command, ListingFields, ListingsCommand};

/// Maximum length for email input.
const MAX_EMAIL_LENGTH: usize = 254;

/// Width of the address column in listing tables.
const ADDRESS_COLUMN_WIDTH: usize = 40;

pub async fn run(command: Command, session: &Session, config: &mut Config) -> Result<()> {
    match command {
        Command::Login { email } => login(session, config, email).await,
        Command::Logout => {
            session.logout();
            println!("Signed out.");
            Ok(())
        }
        Command::Register { username, email } => register(session, &username, &email).await,
        Command::Whoami => {
            match session.identity() {
                Some(identity) => println!(
                    "{} <{}> (id {})",
                    identity.display_name(),
                    identity.email,
                    identity.id
                ),
                None => println!("Not signed in."),
            }
            Ok(())
        }
        Command::Listings(command) => listings(command, session, config).await,
    }
}

async fn login(session: &Session, config: &mut Config, email: Option<String>) -> Result<()> {
    let email = match email {
        Some(email) => email,
        None => prompt_email(config.last_email.as_deref())?,
    };
    let password = rpassword::prompt_password("Password: ").context("Failed to read password")?;

    match session.login(&email, &password).await {
        Ok(identity) => {
            config.last_email = Some(email);
            if let Err(e) = config.save() {
                warn!(error = %e, "Failed to save config");
            }
            println!("Signed in as {}.", identity.display_name());
            Ok(())
        }
        Err(e) => Err(anyhow!(e.detail())),
    }
}

async fn register(session: &Session, username: &str, email: &str) -> Result<()> {
    let password = rpassword::prompt_password("Password: ").context("Failed to read password")?;
    let confirmation =
        rpassword::prompt_password("Confirm password: ").context("Failed to read password")?;

    match session.register(username, email, &password, &confirmation).await {
        Ok(()) => {
            println!("Account created. Run `homestead login --email {}` to sign in.", email);
            Ok(())
        }
        Err(ApiError::Validation(fields)) => {
            for (field, messages) in fields.iter() {
                eprintln!("  {}: {}", field, messages.join(" "));
            }
            bail!("Registration failed")
        }
        Err(e) => Err(anyhow!(e.detail())),
    }
}

async fn listings(command: ListingsCommand, session: &Session, config: &Config) -> Result<()> {
    let api = session.api();
    match command {
        ListingsCommand::List(args) => {
            let filter = ListingFilter::from(args);
            let listings = api.list_listings(&filter).await.map_err(user_error)?;
            print_listing_table(&listings);
            Ok(())
        }
        ListingsCommand::Show { id } => {
            let listing = api.get_listing(id).await.map_err(user_error)?;
            print_listing(&listing, session);
            Ok(())
        }
        ListingsCommand::Create { fields, images } => {
            require_login(session)?;
            let mut draft = apply_fields(ListingDraft::default(), fields);
            if draft.address.is_empty() {
                bail!("--address is required");
            }
            draft.image_urls = upload_images(session, config, &images).await?;

            let listing = api.create_listing(&draft).await.map_err(user_error)?;
            println!("Created listing {}.", listing.id);
            print_listing(&listing, session);
            Ok(())
        }
        ListingsCommand::Update { id, fields, images } => {
            require_login(session)?;
            let current = api.get_listing(id).await.map_err(user_error)?;
            let mut draft = apply_fields(ListingDraft::from_listing(&current), fields);
            draft.image_urls = upload_images(session, config, &images).await?;

            let listing = api.update_listing(id, &draft).await.map_err(user_error)?;
            println!("Updated listing {}.", listing.id);
            print_listing(&listing, session);
            Ok(())
        }
        ListingsCommand::Delete { id, yes } => {
            require_login(session)?;
            if !yes && !confirm(&format!("Delete listing {}?", id))? {
                println!("Cancelled.");
                return Ok(());
            }
            api.delete_listing(id).await.map_err(|e| match e {
                ApiError::AccessDenied(_) | ApiError::NotFound(_) => {
                    anyhow!("Failed to delete listing {}. You may not be the owner.", id)
                }
                other => user_error(other),
            })?;
            println!("Deleted listing {}.", id);
            Ok(())
        }
    }
}

/// Upload images (if any) and return their URLs for the draft.
async fn upload_images(
    session: &Session,
    config: &Config,
    images: &[PathBuf],
) -> Result<Option<Vec<String>>> {
    if images.is_empty() {
        return Ok(None);
    }
    let transport = ReqwestTransport::new(config.timeout()).context("Failed to create HTTP client")?;
    let uploader = MediaUploader::new(
        transport.client().clone(),
        config.media_base_url.clone(),
        config.upload_folder.clone(),
    );
    println!("Uploading {} image(s)...", images.len());
    let urls = uploader
        .upload_all(session.api(), images)
        .await
        .map_err(user_error)?;
    Ok(Some(urls))
}

fn apply_fields(mut draft: ListingDraft, fields: ListingFields) -> ListingDraft {
    if let Some(v) = fields.address {
        draft.address = v;
    }
    if let Some(v) = fields.city {
        draft.city = v;
    }
    if let Some(v) = fields.state {
        draft.state = v;
    }
    if let Some(v) = fields.zip_code {
        draft.zip_code = v;
    }
    if let Some(v) = fields.price {
        draft.price = v;
    }
    if let Some(v) = fields.bedrooms {
        draft.bedrooms = v;
    }
    if let Some(v) = fields.bathrooms {
        draft.bathrooms = v;
    }
    if let Some(v) = fields.size {
        draft.size = v;
    }
    if fields.description.is_some() {
        draft.description = fields.description;
    }
    if let Some(v) = fields.status {
        draft.status = v;
    }
    draft
}

fn require_login(session: &Session) -> Result<()> {
    if session.snapshot().is_authenticated() {
        Ok(())
    } else {
        bail!("You need to sign in first. Run `homestead login`.")
    }
}

fn user_error(error: ApiError) -> anyhow::Error {
    anyhow!(error.detail())
}

fn print_listing_table(listings: &[Listing]) {
    if listings.is_empty() {
        println!("No properties found matching your criteria.");
        return;
    }
    println!(
        "{:>6}  {:<width$}  {:>12}  {:>4}  {:>5}  {:>7}  {}",
        "ID", "ADDRESS", "PRICE", "BEDS", "BATHS", "SQFT", "STATUS",
        width = ADDRESS_COLUMN_WIDTH
    );
    for listing in listings {
        println!(
            "{:>6}  {:<width$}  {:>12}  {:>4}  {:>5}  {:>7}  {}",
            listing.id,
            truncate_string(&listing.full_address(), ADDRESS_COLUMN_WIDTH),
            format_price(&listing.price),
            listing.bedrooms,
            format_bathrooms(&listing.bathrooms),
            listing.size,
            listing.status.display_name(),
            width = ADDRESS_COLUMN_WIDTH
        );
    }
}

fn print_listing(listing: &Listing, session: &Session) {
    println!("{}", listing.full_address());
    println!("  Price:       {}", format_price(&listing.price));
    println!(
        "  Layout:      {} bd / {} ba / {} sqft",
        listing.bedrooms,
        format_bathrooms(&listing.bathrooms),
        listing.size
    );
    println!("  Status:      {}", listing.status.display_name());
    println!("  Listed by:   {}", format_optional(&listing.owner_username, "unknown"));
    println!("  Listed on:   {}", format_date(listing.created_at.as_ref()));
    if let Some(ref description) = listing.description {
        println!();
        println!("  {}", description);
    }
    for url in listing.image_urls() {
        println!("  Photo:       {}", url);
    }
    if let Some(identity) = session.identity() {
        if listing.is_owned_by(&identity) {
            println!();
            println!("  You own this listing (homestead listings update/delete {}).", listing.id);
        }
    }
}

fn prompt_email(last_email: Option<&str>) -> Result<String> {
    match last_email {
        Some(last) => print!("Email [{}]: ", last),
        None => print!("Email: "),
    }
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim();

    let email = match (input.is_empty(), last_email) {
        (true, Some(last)) => last.to_string(),
        (true, None) => bail!("Email is required"),
        (false, _) => input.to_string(),
    };
    if email.len() > MAX_EMAIL_LENGTH {
        bail!("Email is too long");
    }
    Ok(email)
}

fn confirm(question: &str) -> Result<bool> {
    print!("{} [y/N]: ", question);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}
